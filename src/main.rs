use clap::Parser;
use classifieds_gateway::config::Args;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // parse cli arguments
    let args = Args::parse();

    if let Err(e) = classifieds_gateway::run(args).await {
        tracing::error!(error = %e, "Gateway stopped");
        std::process::exit(1);
    }
}

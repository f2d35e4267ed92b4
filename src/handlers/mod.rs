mod health;
mod metrics;
mod session;

pub use health::health_handler;
pub use metrics::metrics_handler;
pub use session::{logout_handler, session_handler};

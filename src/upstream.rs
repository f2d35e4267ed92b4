use reqwest::{StatusCode, Url};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::error::GatewayError;
use crate::metrics::UPSTREAM_LATENCY;
use crate::models::Session;

const SESSION_PATH: &str = "/auth/v1/user";

// Client for the hosted auth backend
#[derive(Clone, Debug)]
pub struct AuthBackend {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl AuthBackend {
    // Accepts "host:port" or a full URL, add http:// if not present
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, GatewayError> {
        let trimmed = base_url.trim().trim_end_matches('/');
        let base_url = if trimmed.contains("://") {
            trimmed.to_string()
        } else {
            format!("http://{}", trimmed)
        };

        let invalid = |reason: String| GatewayError::InvalidUpstream {
            url: base_url.clone(),
            reason,
        };
        let parsed = Url::parse(&base_url).map_err(|e| invalid(e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme {}", parsed.scheme())));
        }
        if parsed.host_str().is_none_or(str::is_empty) {
            return Err(invalid("missing host".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn fetch_session(&self, token: &str) -> Result<Session, GatewayError> {
        let url = format!("{}{}", self.base_url, SESSION_PATH);
        let start = Instant::now();

        let result = self
            .client
            .get(&url)
            .bearer_auth(token)
            .timeout(self.timeout)
            .send()
            .await;
        UPSTREAM_LATENCY.observe(start.elapsed().as_secs_f64());

        let res = result.inspect_err(|e| warn!(url = %url, error = %e, "Auth backend unreachable"))?;

        match res.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                debug!(status = %res.status(), "Auth backend rejected token");
                Err(GatewayError::Unauthorized)
            }
            _ => {
                let res = res
                    .error_for_status()
                    .inspect_err(|e| warn!(error = %e, "Auth backend returned an error"))?;
                Ok(res.json::<Session>().await?)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(1);

    #[test]
    fn test_base_url_normalised() {
        let backend = AuthBackend::new("localhost:54321", TIMEOUT).unwrap();
        assert_eq!(backend.base_url(), "http://localhost:54321");

        let backend = AuthBackend::new(" https://auth.example.com/ ", TIMEOUT).unwrap();
        assert_eq!(backend.base_url(), "https://auth.example.com");
    }

    #[test]
    fn test_malformed_url_rejected() {
        for url in ["bad host:::", "", "ftp://auth.example.com", "http://:8080"] {
            let result = AuthBackend::new(url, TIMEOUT);
            assert!(
                matches!(result, Err(GatewayError::InvalidUpstream { .. })),
                "{url:?} should be rejected"
            );
        }
    }
}

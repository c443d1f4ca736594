use std::time::Duration;

use stocksync_batch::Retriable;
use thiserror::Error;

/// Errors returned by the Square API client.
#[derive(Debug, Error)]
pub enum SquareError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("rate limited by Square")]
    RateLimited { retry_after_secs: Option<u64> },

    /// Non-2xx response; `messages` come from the `errors` array.
    #[error("Square API error {status} from {url}: {}", messages.join("; "))]
    Api {
        status: u16,
        url: String,
        messages: Vec<String>,
    },

    #[error("SQUARE_ACCESS_TOKEN is not set")]
    MissingAccessToken,

    #[error("invalid base URL \"{url}\": {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}

impl Retriable for SquareError {
    fn is_retriable(&self) -> bool {
        match self {
            SquareError::RateLimited { .. } => true,
            SquareError::Http(e) => {
                e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
            }
            SquareError::Api { status, .. } => *status >= 500,
            SquareError::Deserialize { .. }
            | SquareError::MissingAccessToken
            | SquareError::InvalidBaseUrl { .. } => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            SquareError::RateLimited { retry_after_secs } => retry_after_secs.map(Duration::from_secs),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_throttling_and_server_errors_retry() {
        assert!(SquareError::RateLimited {
            retry_after_secs: None
        }
        .is_retriable());
        let api = |status| SquareError::Api {
            status,
            url: "https://connect.squareup.com/v2/locations".to_owned(),
            messages: vec![],
        };
        assert!(api(502).is_retriable());
        assert!(!api(401).is_retriable());
        assert!(!SquareError::MissingAccessToken.is_retriable());
    }
}

use std::time::Duration;

use stocksync_batch::Retriable;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShopifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// HTTP 429, or a GraphQL `THROTTLED` error.
    #[error("rate limited by Shopify")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("not found: {url}")]
    NotFound { url: String },

    #[error("unexpected HTTP status {status} from {url}: {body}")]
    UnexpectedStatus {
        status: u16,
        url: String,
        body: String,
    },

    /// Top-level `errors` array in a GraphQL response.
    #[error("GraphQL error: {}", messages.join("; "))]
    GraphQl { messages: Vec<String> },

    /// `userErrors` returned by a GraphQL mutation.
    #[error("{operation} rejected: {}", messages.join("; "))]
    UserErrors {
        operation: String,
        messages: Vec<String>,
    },

    #[error("invalid shop origin \"{origin}\": {reason}")]
    InvalidOrigin { origin: String, reason: String },
}

impl Retriable for ShopifyError {
    fn is_retriable(&self) -> bool {
        match self {
            ShopifyError::RateLimited { .. } => true,
            ShopifyError::Http(e) => {
                e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
            }
            ShopifyError::UnexpectedStatus { status, .. } => *status >= 500,
            ShopifyError::Deserialize { .. }
            | ShopifyError::NotFound { .. }
            | ShopifyError::GraphQl { .. }
            | ShopifyError::UserErrors { .. }
            | ShopifyError::InvalidOrigin { .. } => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            ShopifyError::RateLimited { retry_after_secs } => {
                retry_after_secs.map(Duration::from_secs)
            }
            _ => None,
        }
    }
}

use std::path::PathBuf;

/// Which Square API host the credentials belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SquareEnvironment {
    Production,
    Sandbox,
}

impl SquareEnvironment {
    #[must_use]
    pub fn base_url(self) -> &'static str {
        match self {
            SquareEnvironment::Production => "https://connect.squareup.com",
            SquareEnvironment::Sandbox => "https://connect.squareupsandbox.com",
        }
    }
}

impl std::fmt::Display for SquareEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SquareEnvironment::Production => write!(f, "production"),
            SquareEnvironment::Sandbox => write!(f, "sandbox"),
        }
    }
}

/// Per-run configuration. Built once in `main` and passed to every job.
#[derive(Clone)]
pub struct AppConfig {
    pub shopify_access_token: String,
    pub shopify_shop_domain: String,
    pub shopify_api_version: String,
    pub shopify_location_id: Option<String>,
    pub square_access_token: Option<String>,
    pub square_location_id: Option<String>,
    pub square_environment: SquareEnvironment,
    pub log_level: String,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub max_retries: u32,
    pub retry_backoff_base_ms: u64,
    pub rate_limit_wait_ms: u64,
    pub fetch_max_retries: u32,
    pub page_delay_ms: u64,
    pub item_delay_ms: u64,
    pub batch_size: usize,
    pub batch_pause_ms: u64,
    pub failure_pause_ms: u64,
    pub checkpoint_dir: PathBuf,
}

impl AppConfig {
    /// Origin of the Shopify Admin API, e.g. `https://my-shop.myshopify.com`.
    ///
    /// Accepts a bare domain or a value that already carries a scheme.
    #[must_use]
    pub fn shopify_origin(&self) -> String {
        let domain = self.shopify_shop_domain.trim_end_matches('/');
        if domain.starts_with("http://") || domain.starts_with("https://") {
            domain.to_owned()
        } else {
            format!("https://{domain}")
        }
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("shopify_access_token", &"[redacted]")
            .field("shopify_shop_domain", &self.shopify_shop_domain)
            .field("shopify_api_version", &self.shopify_api_version)
            .field("shopify_location_id", &self.shopify_location_id)
            .field(
                "square_access_token",
                &self.square_access_token.as_ref().map(|_| "[redacted]"),
            )
            .field("square_location_id", &self.square_location_id)
            .field("square_environment", &self.square_environment)
            .field("log_level", &self.log_level)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_base_ms", &self.retry_backoff_base_ms)
            .field("rate_limit_wait_ms", &self.rate_limit_wait_ms)
            .field("fetch_max_retries", &self.fetch_max_retries)
            .field("page_delay_ms", &self.page_delay_ms)
            .field("item_delay_ms", &self.item_delay_ms)
            .field("batch_size", &self.batch_size)
            .field("batch_pause_ms", &self.batch_pause_ms)
            .field("failure_pause_ms", &self.failure_pause_ms)
            .field("checkpoint_dir", &self.checkpoint_dir)
            .finish()
    }
}

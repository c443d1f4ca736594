use crate::app_config::{AppConfig, SquareEnvironment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so it can be tested with a `HashMap`
/// lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    // Empty values count as missing: a blank `SHOPIFY_ACCESS_TOKEN=` line in
    // `.env` must not produce a client that fails on the first request.
    let present = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_owned())
            .filter(|v| !v.is_empty())
    };

    let require = |var: &str| -> Result<String, ConfigError> {
        present(var).ok_or_else(|| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default =
        |var: &str, default: &str| -> String { present(var).unwrap_or_else(|| default.to_string()) };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u32>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<usize>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let shopify_access_token = require("SHOPIFY_ACCESS_TOKEN")?;
    let shopify_shop_domain = require("SHOPIFY_SHOP_DOMAIN")?;
    let shopify_api_version = or_default("SHOPIFY_API_VERSION", "2024-01");
    let shopify_location_id = present("SHOPIFY_LOCATION_ID");

    let square_access_token = present("SQUARE_ACCESS_TOKEN");
    let square_location_id = present("SQUARE_LOCATION_ID");
    let square_environment = parse_square_environment(&or_default("SQUARE_ENVIRONMENT", "production"))?;

    let log_level = or_default("STOCKSYNC_LOG_LEVEL", "info");
    let request_timeout_secs = parse_u64("STOCKSYNC_REQUEST_TIMEOUT_SECS", "30")?;
    let user_agent = or_default("STOCKSYNC_USER_AGENT", "stocksync/0.1 (inventory-sync)");

    let max_retries = parse_u32("STOCKSYNC_MAX_RETRIES", "3")?;
    let retry_backoff_base_ms = parse_u64("STOCKSYNC_RETRY_BACKOFF_BASE_MS", "15000")?;
    let rate_limit_wait_ms = parse_u64("STOCKSYNC_RATE_LIMIT_WAIT_MS", "10000")?;
    let fetch_max_retries = parse_u32("STOCKSYNC_FETCH_MAX_RETRIES", "10")?;
    let page_delay_ms = parse_u64("STOCKSYNC_PAGE_DELAY_MS", "1000")?;

    let item_delay_ms = parse_u64("STOCKSYNC_ITEM_DELAY_MS", "500")?;
    let batch_size = parse_usize("STOCKSYNC_BATCH_SIZE", "5")?;
    if batch_size == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "STOCKSYNC_BATCH_SIZE".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    let batch_pause_ms = parse_u64("STOCKSYNC_BATCH_PAUSE_MS", "30000")?;
    let failure_pause_ms = parse_u64("STOCKSYNC_FAILURE_PAUSE_MS", "60000")?;
    let checkpoint_dir = PathBuf::from(or_default("STOCKSYNC_CHECKPOINT_DIR", "./.stocksync"));

    Ok(AppConfig {
        shopify_access_token,
        shopify_shop_domain,
        shopify_api_version,
        shopify_location_id,
        square_access_token,
        square_location_id,
        square_environment,
        log_level,
        request_timeout_secs,
        user_agent,
        max_retries,
        retry_backoff_base_ms,
        rate_limit_wait_ms,
        fetch_max_retries,
        page_delay_ms,
        item_delay_ms,
        batch_size,
        batch_pause_ms,
        failure_pause_ms,
        checkpoint_dir,
    })
}

/// Parse `SQUARE_ENVIRONMENT`. Unknown values are rejected rather than
/// silently pointing production credentials at the sandbox.
fn parse_square_environment(s: &str) -> Result<SquareEnvironment, ConfigError> {
    match s.to_ascii_lowercase().as_str() {
        "production" => Ok(SquareEnvironment::Production),
        "sandbox" => Ok(SquareEnvironment::Sandbox),
        other => Err(ConfigError::InvalidEnvVar {
            var: "SQUARE_ENVIRONMENT".to_string(),
            reason: format!("expected \"production\" or \"sandbox\", got \"{other}\""),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

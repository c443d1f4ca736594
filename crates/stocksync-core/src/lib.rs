pub mod app_config;
pub mod config;
pub mod matcher;
pub mod records;
pub mod stock;

pub use app_config::{AppConfig, SquareEnvironment};
pub use config::{load_app_config, load_app_config_from_env};
pub use matcher::{match_product, match_variant, MatchResult, MatchRule, MatchTarget, SourceItem};
pub use records::{
    parse_inventory_json, parse_inventory_tsv, read_inventory_file, InventoryRecord, RecordsError,
};
pub use stock::{LowStockDecision, LowStockPolicy, ProductStatus};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

mod catalog;
mod context;
mod inventory;
mod locations;
mod products;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::context::JobContext;
use crate::inventory::InventoryCommands;
use crate::products::ProductsCommands;

#[derive(Debug, Parser)]
#[command(name = "stocksync")]
#[command(about = "Square to Shopify inventory and catalog sync jobs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Set, verify and reconcile stock levels
    Inventory {
        #[command(subcommand)]
        command: InventoryCommands,
    },
    /// Bulk product maintenance
    Products {
        #[command(subcommand)]
        command: ProductsCommands,
    },
    /// List Shopify and Square locations
    Locations,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = stocksync_core::load_app_config()?;

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let ctx = JobContext::new(config);

    match cli.command {
        Commands::Inventory { command } => inventory::run(&ctx, command).await,
        Commands::Products { command } => products::run(&ctx, command).await,
        Commands::Locations => locations::run_locations(&ctx).await,
    }
}

#[cfg(test)]
mod tests;

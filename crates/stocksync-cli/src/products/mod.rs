//! Product maintenance command handlers for the CLI.

mod import;
mod low_stock;
mod pos;
mod sale_prices;
mod variants;

use clap::Subcommand;

use crate::context::{CheckpointArgs, JobContext};

/// Sub-commands available under `products`.
#[derive(Debug, Subcommand)]
pub enum ProductsCommands {
    /// Draft sold-out products, re-activate restocked drafts and tag low stock
    TagLowStock {
        /// Tag applied to products with little stock left
        #[arg(long, default_value = "Last Piece")]
        tag: String,
        /// Largest total quantity that still counts as low stock
        #[arg(long, default_value = "2")]
        threshold: i64,
        /// Products per GraphQL page
        #[arg(long, default_value = "50")]
        page_size: u32,
        /// Stop after this many pages
        #[arg(long)]
        max_pages: Option<usize>,
        #[arg(long)]
        dry_run: bool,
        #[command(flatten)]
        checkpoint: CheckpointArgs,
    },
    /// Turn on Shopify inventory tracking for every variant
    EnableTracking {
        /// Products updated concurrently within a batch
        #[arg(long, default_value = "5")]
        concurrency: usize,
        #[arg(long)]
        dry_run: bool,
        #[command(flatten)]
        checkpoint: CheckpointArgs,
    },
    /// Mark every variant taxable
    EnableTax {
        #[arg(long)]
        dry_run: bool,
        #[command(flatten)]
        checkpoint: CheckpointArgs,
    },
    /// Publish every product of a collection to all sales channels, POS included
    EnablePos {
        /// Collection title
        #[arg(long)]
        collection: String,
        #[arg(long)]
        dry_run: bool,
        #[command(flatten)]
        checkpoint: CheckpointArgs,
    },
    /// Remove compare-at prices from every variant in a collection
    ClearSalePrices {
        /// Collection title
        #[arg(long)]
        collection: String,
        #[arg(long)]
        dry_run: bool,
        #[command(flatten)]
        checkpoint: CheckpointArgs,
    },
    /// Create Shopify products for in-stock Square items that match nothing
    ImportSquare {
        #[arg(long)]
        dry_run: bool,
        #[command(flatten)]
        checkpoint: CheckpointArgs,
    },
}

pub(crate) async fn run(ctx: &JobContext, command: ProductsCommands) -> anyhow::Result<()> {
    match command {
        ProductsCommands::TagLowStock {
            tag,
            threshold,
            page_size,
            max_pages,
            dry_run,
            checkpoint,
        } => {
            let policy = stocksync_core::LowStockPolicy { tag, threshold };
            let walk = low_stock::WalkOptions {
                page_size,
                max_pages,
            };
            low_stock::run_tag_low_stock(ctx, &policy, walk, dry_run, &checkpoint).await
        }
        ProductsCommands::EnableTracking {
            concurrency,
            dry_run,
            checkpoint,
        } => {
            variants::run_variant_fix(
                ctx,
                variants::VariantFix::Tracking,
                concurrency,
                dry_run,
                &checkpoint,
            )
            .await
        }
        ProductsCommands::EnableTax {
            dry_run,
            checkpoint,
        } => variants::run_variant_fix(ctx, variants::VariantFix::Tax, 1, dry_run, &checkpoint).await,
        ProductsCommands::EnablePos {
            collection,
            dry_run,
            checkpoint,
        } => pos::run_enable_pos(ctx, &collection, dry_run, &checkpoint).await,
        ProductsCommands::ClearSalePrices {
            collection,
            dry_run,
            checkpoint,
        } => sale_prices::run_clear_sale_prices(ctx, &collection, dry_run, &checkpoint).await,
        ProductsCommands::ImportSquare {
            dry_run,
            checkpoint,
        } => import::run_import_square(ctx, dry_run, &checkpoint).await,
    }
}

//! Inventory command handlers for the CLI.
//!
//! `set` and `verify` work from a SKU batch file; `sync-square` and
//! `compare` reconcile the Square catalog against Shopify.

mod reconcile;
mod set;
mod verify;

use std::path::PathBuf;

use clap::{Subcommand, ValueEnum};

use crate::context::{CheckpointArgs, JobContext};

/// How `inventory set` applies a target quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SetMode {
    /// Write the quantity as the new level (idempotent)
    Absolute,
    /// Adjust by the difference to the current level and verify the result
    Delta,
}

impl SetMode {
    fn as_str(self) -> &'static str {
        match self {
            SetMode::Absolute => "absolute",
            SetMode::Delta => "delta",
        }
    }
}

/// Sub-commands available under `inventory`.
#[derive(Debug, Subcommand)]
pub enum InventoryCommands {
    /// Set stock levels from a SKU batch file (`SKU<TAB>QTY` lines or a JSON map)
    Set {
        /// Batch input file
        #[arg(long)]
        input: PathBuf,
        #[arg(long, value_enum, default_value = "absolute")]
        mode: SetMode,
        /// Log intended changes without writing anything
        #[arg(long)]
        dry_run: bool,
        #[command(flatten)]
        checkpoint: CheckpointArgs,
    },
    /// Compare current stock levels against a SKU batch file
    Verify {
        #[arg(long)]
        input: PathBuf,
    },
    /// Copy Square quantities onto matching Shopify variants
    SyncSquare {
        #[arg(long)]
        dry_run: bool,
        #[command(flatten)]
        checkpoint: CheckpointArgs,
    },
    /// Report Square items missing from Shopify and quantity mismatches
    Compare,
}

pub(crate) async fn run(ctx: &JobContext, command: InventoryCommands) -> anyhow::Result<()> {
    match command {
        InventoryCommands::Set {
            input,
            mode,
            dry_run,
            checkpoint,
        } => set::run_inventory_set(ctx, &input, mode, dry_run, &checkpoint).await,
        InventoryCommands::Verify { input } => verify::run_inventory_verify(ctx, &input).await,
        InventoryCommands::SyncSquare {
            dry_run,
            checkpoint,
        } => reconcile::run_sync_square(ctx, dry_run, &checkpoint).await,
        InventoryCommands::Compare => reconcile::run_compare(ctx).await,
    }
}

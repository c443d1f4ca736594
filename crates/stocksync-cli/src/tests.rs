use super::*;
use crate::context::CheckpointArgs;
use crate::inventory::SetMode;

#[test]
fn parses_inventory_set_defaults() {
    let cli = Cli::try_parse_from(["stocksync", "inventory", "set", "--input", "batch.tsv"])
        .expect("expected valid cli args");

    match cli.command {
        Commands::Inventory {
            command:
                InventoryCommands::Set {
                    input,
                    mode,
                    dry_run,
                    checkpoint,
                },
        } => {
            assert_eq!(input, std::path::PathBuf::from("batch.tsv"));
            assert_eq!(mode, SetMode::Absolute);
            assert!(!dry_run);
            assert!(checkpoint.run_id.is_none());
            assert!(!checkpoint.fresh);
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn parses_inventory_set_delta_with_checkpoint_flags() {
    let cli = Cli::try_parse_from([
        "stocksync",
        "inventory",
        "set",
        "--input",
        "batch.json",
        "--mode",
        "delta",
        "--run-id",
        "nightly",
        "--fresh",
        "--dry-run",
    ])
    .unwrap();
    assert!(matches!(
        cli.command,
        Commands::Inventory {
            command: InventoryCommands::Set {
                mode: SetMode::Delta,
                dry_run: true,
                checkpoint: CheckpointArgs { run_id: Some(ref id), fresh: true },
                ..
            }
        } if id == "nightly"
    ));
}

#[test]
fn inventory_set_requires_input() {
    assert!(Cli::try_parse_from(["stocksync", "inventory", "set"]).is_err());
}

#[test]
fn rejects_unknown_set_mode() {
    assert!(Cli::try_parse_from(["stocksync", "inventory", "set", "--input", "f", "--mode", "relative"]).is_err());
}

#[test]
fn parses_inventory_read_only_commands() {
    let cli = Cli::try_parse_from(["stocksync", "inventory", "compare"]).unwrap();
    assert!(matches!(
        cli.command,
        Commands::Inventory {
            command: InventoryCommands::Compare
        }
    ));

    let cli = Cli::try_parse_from(["stocksync", "inventory", "verify", "--input", "batch.tsv"]).unwrap();
    assert!(matches!(
        cli.command,
        Commands::Inventory {
            command: InventoryCommands::Verify { .. }
        }
    ));
}

#[test]
fn parses_sync_square() {
    let cli = Cli::try_parse_from(["stocksync", "inventory", "sync-square", "--dry-run"]).unwrap();
    assert!(matches!(
        cli.command,
        Commands::Inventory {
            command: InventoryCommands::SyncSquare { dry_run: true, .. }
        }
    ));
}

#[test]
fn tag_low_stock_defaults() {
    let cli = Cli::try_parse_from(["stocksync", "products", "tag-low-stock"]).unwrap();
    match cli.command {
        Commands::Products {
            command:
                ProductsCommands::TagLowStock {
                    tag,
                    threshold,
                    page_size,
                    max_pages,
                    dry_run,
                    ..
                },
        } => {
            assert_eq!(tag, "Last Piece");
            assert_eq!(threshold, 2);
            assert_eq!(page_size, 50);
            assert_eq!(max_pages, None);
            assert!(!dry_run);
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn tag_low_stock_overrides() {
    let cli = Cli::try_parse_from([
        "stocksync",
        "products",
        "tag-low-stock",
        "--tag",
        "Almost Gone",
        "--threshold",
        "3",
        "--max-pages",
        "2",
    ])
    .unwrap();
    assert!(matches!(
        cli.command,
        Commands::Products {
            command: ProductsCommands::TagLowStock {
                ref tag,
                threshold: 3,
                max_pages: Some(2),
                ..
            }
        } if tag == "Almost Gone"
    ));
}

#[test]
fn enable_tracking_defaults_to_five_concurrent() {
    let cli = Cli::try_parse_from(["stocksync", "products", "enable-tracking"]).unwrap();
    assert!(matches!(
        cli.command,
        Commands::Products {
            command: ProductsCommands::EnableTracking {
                concurrency: 5,
                dry_run: false,
                ..
            }
        }
    ));
}

#[test]
fn parses_enable_tax() {
    let cli = Cli::try_parse_from(["stocksync", "products", "enable-tax", "--run-id", "tax-1"]).unwrap();
    assert!(matches!(
        cli.command,
        Commands::Products {
            command: ProductsCommands::EnableTax {
                checkpoint: CheckpointArgs { run_id: Some(ref id), .. },
                ..
            }
        } if id == "tax-1"
    ));
}

#[test]
fn collection_jobs_require_collection() {
    assert!(Cli::try_parse_from(["stocksync", "products", "enable-pos"]).is_err());
    assert!(Cli::try_parse_from(["stocksync", "products", "clear-sale-prices"]).is_err());

    let cli = Cli::try_parse_from(["stocksync", "products", "enable-pos", "--collection", "Summer Sale"]).unwrap();
    assert!(matches!(
        cli.command,
        Commands::Products {
            command: ProductsCommands::EnablePos { ref collection, .. }
        } if collection == "Summer Sale"
    ));

    let cli = Cli::try_parse_from([
        "stocksync",
        "products",
        "clear-sale-prices",
        "--collection",
        "Clearance",
        "--dry-run",
    ])
    .unwrap();
    assert!(matches!(
        cli.command,
        Commands::Products {
            command: ProductsCommands::ClearSalePrices { dry_run: true, .. }
        }
    ));
}

#[test]
fn parses_import_square() {
    let cli = Cli::try_parse_from(["stocksync", "products", "import-square", "--fresh"]).unwrap();
    assert!(matches!(
        cli.command,
        Commands::Products {
            command: ProductsCommands::ImportSquare {
                dry_run: false,
                checkpoint: CheckpointArgs { fresh: true, .. }
            }
        }
    ));
}

#[test]
fn parses_locations() {
    let cli = Cli::try_parse_from(["stocksync", "locations"]).unwrap();
    assert!(matches!(cli.command, Commands::Locations));
}

#[test]
fn subcommand_is_required() {
    assert!(Cli::try_parse_from(["stocksync"]).is_err());
}

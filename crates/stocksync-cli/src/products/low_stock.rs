use stocksync_batch::{
    load_cursor, run_batch, save_cursor, BatchReport, CheckpointStore, CursorProgress, ItemOutcome,
    PageWalker,
};
use stocksync_core::{LowStockDecision, LowStockPolicy};
use stocksync_shopify::StockedProduct;

use crate::context::{print_report, CheckpointArgs, ItemError, JobContext};

#[derive(Debug, Clone, Copy)]
pub(crate) struct WalkOptions {
    pub page_size: u32,
    pub max_pages: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ProductChange {
    id: String,
    title: String,
    decision: LowStockDecision,
}

fn plan_page(policy: &LowStockPolicy, products: &[StockedProduct]) -> Vec<ProductChange> {
    products
        .iter()
        .filter_map(|p| {
            let decision = policy.evaluate(p.quantities(), p.status, &p.tags);
            (!decision.is_noop()).then(|| ProductChange {
                id: p.id.clone(),
                title: p.title.clone(),
                decision,
            })
        })
        .collect()
}

fn absorb(total: &mut BatchReport, page: BatchReport) {
    total.submitted += page.submitted;
    total.skipped += page.skipped;
    total.updated += page.updated;
    total.unchanged += page.unchanged;
    total.not_found += page.not_found;
    total.errored += page.errored;
    total.failures.extend(page.failures);
}

/// Walk every product page, drafting sold-out products, re-activating
/// restocked drafts and keeping the low-stock tag in line with the total
/// variant quantity.
///
/// The page cursor is checkpointed after each page, so an interrupted run
/// resumes at the next unprocessed page. The checkpoint also remembers
/// whether any earlier page had a failed product; a walk that reaches the
/// end with a failure anywhere keeps a checkpoint without a cursor, and the
/// next run starts over from the first page.
///
/// # Errors
///
/// Returns an error if a page cannot be fetched after retries or the
/// checkpoint cannot be written. Per-product failures are reported.
pub(crate) async fn run_tag_low_stock(
    ctx: &JobContext,
    policy: &LowStockPolicy,
    walk: WalkOptions,
    dry_run: bool,
    checkpoint: &CheckpointArgs,
) -> anyhow::Result<()> {
    let client = ctx.shopify()?;
    let client = &client;
    let run_id = checkpoint.resolve(
        "tag-low-stock",
        &[policy.tag.as_bytes(), policy.threshold.to_string().as_bytes()],
    );

    let mut progress = if dry_run {
        CursorProgress::default()
    } else {
        load_cursor(&ctx.store, &run_id, checkpoint.fresh)?
    };
    if progress.cursor.is_none() {
        progress.total_fetched = 0;
        progress.had_failures = false;
    }

    let mut walker = PageWalker::resume_from(progress.cursor.clone(), ctx.page_options(walk.max_pages));
    let settings = ctx.batch_settings();
    let mut totals = BatchReport::default();

    while let Some(page) = walker
        .next_page(|cursor: Option<String>| async move {
            client
                .products_with_inventory_page(cursor.as_deref(), walk.page_size)
                .await
        })
        .await?
    {
        progress.total_fetched += page.items.len();
        let changes = plan_page(policy, &page.items);
        tracing::info!(
            page = walker.pages_fetched(),
            products = page.items.len(),
            changes = changes.len(),
            "evaluated page"
        );

        if dry_run {
            for change in &changes {
                println!(
                    "dry-run: {} (total {}): status {:?}, tags {:?}",
                    change.title, change.decision.total, change.decision.new_status, change.decision.new_tags
                );
            }
            continue;
        }

        let report = run_batch(
            &changes,
            &settings,
            None,
            |c: &ProductChange| c.id.clone(),
            move |c: &ProductChange| {
                let change = c.clone();
                async move {
                    client
                        .update_product(
                            &change.id,
                            change.decision.new_tags.as_deref(),
                            change.decision.new_status,
                        )
                        .await
                        .map_err(ItemError::from)?;
                    tracing::info!(
                        product = %change.title,
                        total = change.decision.total,
                        status = ?change.decision.new_status,
                        "product updated"
                    );
                    Ok::<_, ItemError>(ItemOutcome::Updated)
                }
            },
        )
        .await?;
        progress.had_failures |= report.failed() > 0;
        absorb(&mut totals, report);

        progress.cursor = walker.cursor().map(str::to_owned);
        save_cursor(&ctx.store, &run_id, &progress)?;
    }

    if dry_run {
        println!("tag-low-stock (dry-run): {} products scanned", progress.total_fetched);
        return Ok(());
    }

    if walker.cursor().is_none() && !progress.had_failures {
        ctx.store.delete(&run_id)?;
        totals.checkpoint_cleared = true;
    } else if progress.had_failures {
        println!("checkpoint kept; a product failed on this or an earlier resumed run");
    }
    println!("tag-low-stock: {} products scanned", progress.total_fetched);
    print_report("tag-low-stock", &totals);
    Ok(())
}

//! `stocksync locations`: ids to put in `SHOPIFY_LOCATION_ID` and
//! `SQUARE_LOCATION_ID`.

use stocksync_batch::retry_with_backoff;

use crate::context::JobContext;

/// Print Shopify locations, then Square locations when a Square token is
/// configured.
///
/// # Errors
///
/// Returns an error if a client cannot be built or a listing fails.
pub(crate) async fn run_locations(ctx: &JobContext) -> anyhow::Result<()> {
    let shopify = ctx.shopify()?;
    let locations = retry_with_backoff(&ctx.fetch_retry(), || shopify.locations()).await?;

    println!("Shopify locations:");
    for l in &locations {
        let address = [l.address1.as_deref(), l.city.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(", ");
        let state = if l.active { "active" } else { "inactive" };
        println!("  {:<14} {:<30} {state:<9} {address}", l.id, l.name);
    }

    if ctx.config.square_access_token.is_none() {
        tracing::info!("SQUARE_ACCESS_TOKEN not set, skipping Square locations");
        return Ok(());
    }
    let square = ctx.square()?;
    let locations = retry_with_backoff(&ctx.fetch_retry(), || square.list_locations()).await?;

    println!("Square locations:");
    for l in &locations {
        let address = l
            .address
            .as_ref()
            .map(|a| {
                [a.address_line_1.as_deref(), a.locality.as_deref()]
                    .into_iter()
                    .flatten()
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or_default();
        println!(
            "  {:<14} {:<30} {:<9} {address}",
            l.id,
            l.name,
            l.status.as_deref().unwrap_or("-").to_lowercase()
        );
    }
    Ok(())
}

//! HTTP client for the Square Catalog, Inventory and Locations APIs.
//!
//! Wraps `reqwest` with bearer-token auth, the pinned `Square-Version`
//! header and typed error mapping. Like the Shopify client it does not
//! retry on its own; wrap calls in `stocksync_batch::retry_with_backoff`.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use stocksync_batch::{fetch_all_pages, Page, PageOptions, RetryPolicy};
use stocksync_core::AppConfig;

use crate::error::SquareError;
use crate::types::{
    BatchRetrieveCountsRequest, BatchRetrieveCountsResponse, CatalogListResponse, CatalogObject,
    ErrorBody, InventoryCount, LocationsResponse, SquareLocation,
};

/// API version every request is pinned to.
pub const SQUARE_VERSION: &str = "2024-01-18";

/// Most catalog object ids `batch-retrieve` accepts per request.
pub const COUNTS_CHUNK_SIZE: usize = 100;

const CHUNK_DELAY: Duration = Duration::from_millis(100);

/// Client for one Square seller account.
///
/// Use [`SquareClient::new`] in production or [`SquareClient::with_base_url`]
/// to point at a mock server in tests.
pub struct SquareClient {
    client: Client,
    access_token: String,
    base_url: Url,
}

impl SquareClient {
    /// Builds a client for the configured environment.
    ///
    /// # Errors
    ///
    /// Returns [`SquareError::MissingAccessToken`] when `SQUARE_ACCESS_TOKEN`
    /// is not set, or [`SquareError::Http`] if the `reqwest::Client` cannot
    /// be constructed.
    pub fn new(config: &AppConfig) -> Result<Self, SquareError> {
        let token = config
            .square_access_token
            .as_deref()
            .ok_or(SquareError::MissingAccessToken)?;
        Self::with_base_url(
            token,
            config.square_environment.base_url(),
            config.request_timeout_secs,
            &config.user_agent,
        )
    }

    /// Builds a client against an explicit base URL (e.g. a wiremock server).
    ///
    /// # Errors
    ///
    /// Returns [`SquareError::InvalidBaseUrl`] if `base_url` does not parse,
    /// or [`SquareError::Http`] if the `reqwest::Client` cannot be built.
    pub fn with_base_url(
        access_token: &str,
        base_url: &str,
        timeout_secs: u64,
        user_agent: &str,
    ) -> Result<Self, SquareError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;

        // A trailing slash keeps `Url::join` from replacing the last segment.
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised).map_err(|e| SquareError::InvalidBaseUrl {
            url: base_url.to_owned(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            client,
            access_token: access_token.to_owned(),
            base_url,
        })
    }

    /// One page of `GET /v2/catalog/list` for the given comma-separated
    /// object `types` (e.g. `"ITEM,CATEGORY"`).
    ///
    /// # Errors
    ///
    /// - [`SquareError::RateLimited`] on HTTP 429.
    /// - [`SquareError::Api`] on any other non-2xx status.
    /// - [`SquareError::Deserialize`] if the body does not match.
    pub async fn list_catalog_page(
        &self,
        types: &str,
        cursor: Option<&str>,
    ) -> Result<Page<CatalogObject>, SquareError> {
        let mut query = vec![("types", types)];
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor));
        }
        let request = self.get("v2/catalog/list")?.query(&query);
        let body: CatalogListResponse = self.send(request, "catalog list").await?;
        Ok(Page::new(body.objects, body.cursor))
    }

    /// One page of in-stock counts for up to [`COUNTS_CHUNK_SIZE`] catalog
    /// object ids at one location.
    ///
    /// # Errors
    ///
    /// Same as [`SquareClient::list_catalog_page`].
    pub async fn batch_retrieve_counts(
        &self,
        catalog_object_ids: &[String],
        location_id: &str,
        cursor: Option<&str>,
    ) -> Result<Page<InventoryCount>, SquareError> {
        let payload = BatchRetrieveCountsRequest {
            catalog_object_ids,
            location_ids: vec![location_id],
            states: vec!["IN_STOCK"],
            cursor,
        };
        let request = self
            .post("v2/inventory/counts/batch-retrieve")?
            .json(&payload);
        let body: BatchRetrieveCountsResponse = self.send(request, "inventory counts").await?;
        Ok(Page::new(body.counts, body.cursor))
    }

    /// Whole-unit in-stock quantity per catalog object id at `location_id`.
    ///
    /// Ids are sent in chunks of [`COUNTS_CHUNK_SIZE`] with a short pause
    /// between chunks; each request is retried under `retry`. Ids with no
    /// count are absent from the map.
    ///
    /// # Errors
    ///
    /// The first error that survives `retry`.
    pub async fn inventory_counts(
        &self,
        catalog_object_ids: &[String],
        location_id: &str,
        retry: RetryPolicy,
    ) -> Result<HashMap<String, i64>, SquareError> {
        let options = PageOptions {
            max_pages: None,
            page_delay: Duration::ZERO,
            retry,
        };
        let mut quantities = HashMap::with_capacity(catalog_object_ids.len());

        for (index, chunk) in catalog_object_ids.chunks(COUNTS_CHUNK_SIZE).enumerate() {
            if index > 0 {
                tokio::time::sleep(CHUNK_DELAY).await;
            }
            let counts = fetch_all_pages(None, options, |cursor: Option<String>| async move {
                self.batch_retrieve_counts(chunk, location_id, cursor.as_deref())
                    .await
            })
            .await?;
            for count in counts {
                quantities.insert(count.catalog_object_id.clone(), count.whole_quantity());
            }
        }

        tracing::debug!(
            requested = catalog_object_ids.len(),
            counted = quantities.len(),
            location_id,
            "retrieved Square inventory counts"
        );
        Ok(quantities)
    }

    /// # Errors
    ///
    /// Same as [`SquareClient::list_catalog_page`].
    pub async fn list_locations(&self) -> Result<Vec<SquareLocation>, SquareError> {
        let request = self.get("v2/locations")?;
        let body: LocationsResponse = self.send(request, "locations").await?;
        Ok(body.locations)
    }

    fn endpoint(&self, path: &str) -> Result<Url, SquareError> {
        self.base_url
            .join(path)
            .map_err(|e| SquareError::InvalidBaseUrl {
                url: format!("{}{path}", self.base_url),
                reason: e.to_string(),
            })
    }

    fn get(&self, path: &str) -> Result<RequestBuilder, SquareError> {
        Ok(self.authorized(self.client.get(self.endpoint(path)?)))
    }

    fn post(&self, path: &str) -> Result<RequestBuilder, SquareError> {
        Ok(self.authorized(self.client.post(self.endpoint(path)?)))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(&self.access_token)
            .header("Square-Version", SQUARE_VERSION)
            .header(reqwest::header::ACCEPT, "application/json")
    }

    /// Sends the request, mapping 429 and other non-2xx statuses to typed
    /// errors, and decodes the JSON body.
    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        context: &str,
    ) -> Result<T, SquareError> {
        let response = request.send().await?;
        let status = response.status();
        let url = response.url().to_string();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<u64>().ok());
            tracing::debug!(context, ?retry_after_secs, "Square returned 429");
            return Err(SquareError::RateLimited { retry_after_secs });
        }

        let body = response.text().await?;

        if !status.is_success() {
            let parsed: ErrorBody = serde_json::from_str(&body).unwrap_or_default();
            let mut messages: Vec<String> = parsed.errors.iter().map(|e| e.describe()).collect();
            if messages.is_empty() {
                messages.push(format!("{context} failed"));
            }
            return Err(SquareError::Api {
                status: status.as_u16(),
                url,
                messages,
            });
        }

        serde_json::from_str(&body).map_err(|e| SquareError::Deserialize {
            context: context.to_owned(),
            source: e,
        })
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;

//! HTTP client for the Shopify Admin API.
//!
//! REST endpoints live in [`rest`], GraphQL operations in [`graphql`]. Both
//! share [`ShopifyClient::send`], which maps 429 / 404 / other non-2xx
//! responses to typed [`ShopifyError`] variants and captures the `Link`
//! header for cursor pagination.
//!
//! The client does not retry. Callers wrap calls in
//! `stocksync_batch::retry_with_backoff` (directly, or through the paginated
//! fetcher and mutator) so every request of a job shares one retry policy.

mod graphql;
mod rest;

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use stocksync_core::AppConfig;

use crate::error::ShopifyError;

pub use graphql::SetQuantityResult;

const ACCESS_TOKEN_HEADER: &str = "X-Shopify-Access-Token";

/// Longest response body kept in [`ShopifyError::UnexpectedStatus`].
const MAX_ERROR_BODY: usize = 500;

/// Client for one shop's Admin API at a fixed API version.
///
/// Use [`ShopifyClient::new`] in production or
/// [`ShopifyClient::with_base_url`] to point at a mock server in tests.
pub struct ShopifyClient {
    client: Client,
    access_token: String,
    /// `https://{shop}/admin/api/{version}`, no trailing slash.
    api_base: String,
}

impl ShopifyClient {
    /// Builds a client from the loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ShopifyError::InvalidOrigin`] if the shop domain does not
    /// form a valid URL, or [`ShopifyError::Http`] if the `reqwest::Client`
    /// cannot be constructed.
    pub fn new(config: &AppConfig) -> Result<Self, ShopifyError> {
        Self::with_base_url(
            &config.shopify_access_token,
            &config.shopify_origin(),
            &config.shopify_api_version,
            config.request_timeout_secs,
            &config.user_agent,
        )
    }

    /// Builds a client against an explicit origin (e.g. a wiremock server).
    ///
    /// # Errors
    ///
    /// Same as [`ShopifyClient::new`].
    pub fn with_base_url(
        access_token: &str,
        origin: &str,
        api_version: &str,
        timeout_secs: u64,
        user_agent: &str,
    ) -> Result<Self, ShopifyError> {
        let origin = origin.trim_end_matches('/');
        Url::parse(origin).map_err(|e| ShopifyError::InvalidOrigin {
            origin: origin.to_owned(),
            reason: e.to_string(),
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;

        Ok(Self {
            client,
            access_token: access_token.to_owned(),
            api_base: format!("{origin}/admin/api/{api_version}"),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path.trim_start_matches('/'))
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.authorized(self.client.get(self.endpoint(path)))
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.authorized(self.client.post(self.endpoint(path)))
    }

    fn put(&self, path: &str) -> RequestBuilder {
        self.authorized(self.client.put(self.endpoint(path)))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header(ACCESS_TOKEN_HEADER, &self.access_token)
            .header(reqwest::header::ACCEPT, "application/json")
    }

    /// Sends `request` and decodes a JSON body, returning it together with
    /// the raw `Link` header if one was present.
    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        context: &str,
    ) -> Result<(T, Option<String>), ShopifyError> {
        let response = request.send().await?;
        let status = response.status();
        let url = response.url().to_string();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            // Shopify sends fractional seconds, e.g. "2.0".
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<f64>().ok())
                .filter(|secs| secs.is_finite() && *secs >= 0.0)
                .map(whole_seconds);
            tracing::debug!(context, ?retry_after_secs, "Shopify returned 429");
            return Err(ShopifyError::RateLimited { retry_after_secs });
        }

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ShopifyError::NotFound { url });
        }

        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let cut = (0..=MAX_ERROR_BODY)
                    .rev()
                    .find(|i| body.is_char_boundary(*i))
                    .unwrap_or(0);
                body.truncate(cut);
            }
            return Err(ShopifyError::UnexpectedStatus {
                status: status.as_u16(),
                url,
                body,
            });
        }

        let link_header = response
            .headers()
            .get(reqwest::header::LINK)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        let body = response.text().await?;
        let parsed = serde_json::from_str::<T>(&body).map_err(|e| ShopifyError::Deserialize {
            context: context.to_owned(),
            source: e,
        })?;

        Ok((parsed, link_header))
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn whole_seconds(secs: f64) -> u64 {
    secs.ceil() as u64
}

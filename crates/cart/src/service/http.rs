//! HTTP Cart Service client.
//!
//! Talks to the REST cart endpoints with `reqwest`. Every response uses the
//! `{ success, message, data }` envelope; the bearer token identifies the
//! customer whose cart is addressed.

use std::sync::Arc;

use cartwright_core::ProductKey;
use secrecy::{ExposeSecret, SecretString};
use serde::de::{DeserializeOwned, IgnoredAny};
use tracing::{debug, instrument};
use url::Url;
use uuid::Uuid;

use super::types::{Ack, CartPayload, Envelope, LineRequest};
use super::{CartService, ServiceError};
use crate::config::CartConfig;

const REQUEST_ID_HEADER: &str = "X-Request-Id";
const MAX_LOGGED_BODY: usize = 500;

/// Client for the REST Cart Service.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Clone)]
pub struct HttpCartService {
    inner: Arc<HttpCartServiceInner>,
}

struct HttpCartServiceInner {
    client: reqwest::Client,
    cart_endpoint: Url,
    add_endpoint: Url,
    remove_endpoint: Url,
    update_endpoint: Url,
    clear_endpoint: Url,
    api_token: Option<SecretString>,
}

impl HttpCartService {
    /// Create a new Cart Service client.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint URLs can't be derived from the
    /// configured base URL or the HTTP client can't be built.
    pub fn new(config: &CartConfig) -> Result<Self, ServiceError> {
        let base = &config.service_url;
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(HttpCartServiceInner {
                client,
                cart_endpoint: base.join("cart")?,
                add_endpoint: base.join("cart/add")?,
                remove_endpoint: base.join("cart/remove")?,
                update_endpoint: base.join("cart/update")?,
                clear_endpoint: base.join("cart/clear")?,
                api_token: config.api_token.clone(),
            }),
        })
    }

    /// `{base}/cart/remove/{key}` with the key percent-encoded as one segment.
    fn remove_url(&self, key: &ProductKey) -> Url {
        let mut url = self.inner.remove_endpoint.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(key.as_str());
        }
        url
    }

    /// Send a request and decode the response envelope.
    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<Envelope<T>, ServiceError> {
        let request_id = Uuid::new_v4().to_string();
        let request = match &self.inner.api_token {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        };

        let response = request
            .header(REQUEST_ID_HEADER, &request_id)
            .send()
            .await?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(ServiceError::RateLimited(retry_after));
        }

        // Read the body as text first for better error diagnostics
        let response_text = response.text().await?;

        if !status.is_success() {
            tracing::error!(
                status = %status,
                request_id = %request_id,
                body = %response_text.chars().take(MAX_LOGGED_BODY).collect::<String>(),
                "Cart Service returned non-success status"
            );
            return Err(ServiceError::Status {
                status: status.as_u16(),
                body: response_text.chars().take(200).collect(),
            });
        }

        serde_json::from_str(&response_text).map_err(|e| {
            tracing::error!(
                error = %e,
                request_id = %request_id,
                body = %response_text.chars().take(MAX_LOGGED_BODY).collect::<String>(),
                "Failed to parse Cart Service response"
            );
            ServiceError::Parse(e)
        })
    }

    /// Send a mutating request whose payload is ignored.
    async fn send_ack(&self, request: reqwest::RequestBuilder) -> Result<Ack, ServiceError> {
        let envelope: Envelope<IgnoredAny> = self.send(request).await?;
        Ok(envelope.into_parts().0)
    }
}

impl CartService for HttpCartService {
    #[instrument(skip(self))]
    async fn get_cart(&self) -> Result<CartPayload, ServiceError> {
        let request = self.inner.client.get(self.inner.cart_endpoint.clone());
        let (ack, data) = self.send::<CartPayload>(request).await?.into_parts();
        ack.into_result()?;

        let payload = data.unwrap_or_default();
        debug!(lines = payload.len(), "Fetched cart");
        Ok(payload)
    }

    #[instrument(skip(self), fields(product_key = %key))]
    async fn add_to_cart(&self, key: &ProductKey, quantity: u32) -> Result<Ack, ServiceError> {
        let request = self
            .inner
            .client
            .post(self.inner.add_endpoint.clone())
            .json(&LineRequest {
                product_id: key.as_str(),
                quantity,
            });
        self.send_ack(request).await
    }

    #[instrument(skip(self), fields(product_key = %key))]
    async fn remove_item(&self, key: &ProductKey) -> Result<Ack, ServiceError> {
        let request = self.inner.client.delete(self.remove_url(key));
        self.send_ack(request).await
    }

    #[instrument(skip(self), fields(product_key = %key))]
    async fn update_quantity(&self, key: &ProductKey, quantity: u32) -> Result<Ack, ServiceError> {
        let request = self
            .inner
            .client
            .put(self.inner.update_endpoint.clone())
            .json(&LineRequest {
                product_id: key.as_str(),
                quantity,
            });
        self.send_ack(request).await
    }

    #[instrument(skip(self))]
    async fn clear_cart(&self) -> Result<Ack, ServiceError> {
        let request = self.inner.client.delete(self.inner.clear_endpoint.clone());
        self.send_ack(request).await
    }
}

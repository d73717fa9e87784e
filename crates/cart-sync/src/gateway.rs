//! Remote cart gateway: the authoritative per-identity cart API.
//!
//! The trait returns domain types; the HTTP implementation normalizes wire
//! DTOs at ingestion (see [`crate::dto`]). There is no bulk/clear endpoint -
//! clearing a cart is N individual removes, which the state machine drives.

use std::future::Future;

use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::instrument;
use url::Url;

use reloved_core::{Condition, ProductId};

use crate::cart::Cart;
use crate::config::GatewayConfig;
use crate::dto::{AddItemRequest, CartPayload, UpdateQuantityRequest, ingest_cart};
use crate::identity::IdentityKeyResolver;

/// Errors from the remote cart API.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// No credential is held, or the server rejected the one presented.
    #[error("not authenticated")]
    Unauthenticated,

    /// The server rejected the request as invalid (e.g. insufficient
    /// stock).
    #[error("rejected by server: {0}")]
    Validation(String),

    /// The server failed.
    #[error("server error: {0}")]
    Server(String),

    /// HTTP transport failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// External collaborator contract for the authoritative server-side cart.
pub trait RemoteCartGateway: Send + Sync {
    /// Current server cart for the active credential.
    fn fetch(&self) -> impl Future<Output = Result<Cart, GatewayError>> + Send;

    /// Add `quantity` units (the server endpoint increments, so this is
    /// always the delta, never the resulting total). Returns the canonical
    /// updated cart.
    fn add_item(
        &self,
        product_id: &ProductId,
        quantity: u32,
        condition: Option<&Condition>,
    ) -> impl Future<Output = Result<Cart, GatewayError>> + Send;

    /// Set a line's quantity to an absolute value.
    fn update_quantity(
        &self,
        product_id: &ProductId,
        quantity: u32,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;

    /// Remove a line.
    fn remove_item(
        &self,
        product_id: &ProductId,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;
}

// =============================================================================
// HttpCartGateway
// =============================================================================

/// HTTP/JSON implementation of [`RemoteCartGateway`].
///
/// Requests carry `Authorization: Bearer <token>` resolved per call, so a
/// token refresh between calls is picked up automatically.
#[derive(Debug, Clone)]
pub struct HttpCartGateway<I> {
    client: reqwest::Client,
    base_url: Url,
    timeout: std::time::Duration,
    identity: I,
}

impl<I: IdentityKeyResolver> HttpCartGateway<I> {
    /// Create a new gateway client.
    #[must_use]
    pub fn new(config: &GatewayConfig, identity: I) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.clone(),
            timeout: config.timeout,
            identity,
        }
    }

    fn bearer(&self) -> Result<SecretString, GatewayError> {
        self.identity
            .auth_token()
            .ok_or(GatewayError::Unauthenticated)
    }

    fn cart_url(&self, product_id: Option<&ProductId>) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("cart");
            if let Some(id) = product_id {
                segments.push(id.as_str());
            }
        }
        url
    }

    /// Map a non-success response to an error, preferring the server's
    /// `message` field over the raw body.
    fn error_for_status(status: StatusCode, body: &str) -> GatewayError {
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| {
                v.get("message")
                    .or_else(|| v.get("error"))
                    .and_then(serde_json::Value::as_str)
                    .map(str::to_string)
            })
            .unwrap_or_else(|| body.chars().take(200).collect());

        if status == StatusCode::UNAUTHORIZED {
            GatewayError::Unauthenticated
        } else if status.is_client_error() {
            GatewayError::Validation(message)
        } else {
            GatewayError::Server(format!("HTTP {status}: {message}"))
        }
    }

    /// Send a request and return the body text, mapping non-success
    /// statuses. Body is read as text first for better error diagnostics.
    async fn execute(&self, request: reqwest::RequestBuilder) -> Result<String, GatewayError> {
        let token = self.bearer()?;
        let response = request
            .bearer_auth(token.expose_secret())
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            tracing::error!(
                status = %status,
                body = %text.chars().take(500).collect::<String>(),
                "cart API returned non-success status"
            );
            return Err(Self::error_for_status(status, &text));
        }

        Ok(text)
    }

    fn parse_cart(text: &str) -> Result<Cart, GatewayError> {
        let payload: CartPayload = serde_json::from_str(text)?;
        Ok(ingest_cart(payload))
    }
}

impl<I: IdentityKeyResolver> RemoteCartGateway for HttpCartGateway<I> {
    #[instrument(skip(self))]
    async fn fetch(&self) -> Result<Cart, GatewayError> {
        let text = self.execute(self.client.get(self.cart_url(None))).await?;
        Self::parse_cart(&text)
    }

    #[instrument(skip(self, condition), fields(product_id = %product_id))]
    async fn add_item(
        &self,
        product_id: &ProductId,
        quantity: u32,
        condition: Option<&Condition>,
    ) -> Result<Cart, GatewayError> {
        let body = AddItemRequest {
            product_id: product_id.clone(),
            quantity,
            selected_condition: condition.cloned(),
        };
        let text = self
            .execute(self.client.post(self.cart_url(None)).json(&body))
            .await?;
        Self::parse_cart(&text)
    }

    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn update_quantity(
        &self,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<(), GatewayError> {
        let body = UpdateQuantityRequest { quantity };
        self.execute(
            self.client
                .put(self.cart_url(Some(product_id)))
                .json(&body),
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn remove_item(&self, product_id: &ProductId) -> Result<(), GatewayError> {
        self.execute(self.client.delete(self.cart_url(Some(product_id))))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Guest;

    #[test]
    fn test_cart_urls() {
        let config = GatewayConfig::new(Url::parse("https://api.reloved.shop/v1/").expect("url"));
        let gateway = HttpCartGateway::new(&config, Guest);

        assert_eq!(
            gateway.cart_url(None).as_str(),
            "https://api.reloved.shop/v1/cart"
        );
        assert_eq!(
            gateway.cart_url(Some(&ProductId::new("p1"))).as_str(),
            "https://api.reloved.shop/v1/cart/p1"
        );
    }

    #[test]
    fn test_error_mapping() {
        let err = HttpCartGateway::<Guest>::error_for_status(
            StatusCode::UNAUTHORIZED,
            r#"{"message": "token expired"}"#,
        );
        assert!(matches!(err, GatewayError::Unauthenticated));

        let err = HttpCartGateway::<Guest>::error_for_status(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"message": "insufficient stock"}"#,
        );
        assert!(matches!(err, GatewayError::Validation(m) if m == "insufficient stock"));

        let err =
            HttpCartGateway::<Guest>::error_for_status(StatusCode::BAD_GATEWAY, "upstream down");
        assert!(matches!(err, GatewayError::Server(m) if m.contains("upstream down")));
    }

    #[tokio::test]
    async fn test_guest_calls_fail_fast_without_network() {
        // Unroutable port; the Unauthenticated check fires before any I/O.
        let config = GatewayConfig::new(Url::parse("http://127.0.0.1:1/").expect("url"));
        let gateway = HttpCartGateway::new(&config, Guest);

        assert!(matches!(
            gateway.fetch().await,
            Err(GatewayError::Unauthenticated)
        ));
    }
}

use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::webhooks::events::{METADATA_ORDER_ID, METADATA_USER_ID};
use crate::webhooks::CheckoutMetadata;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{error, info, instrument};

/// One line of a hosted checkout, priced in minor currency units
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutLineItem {
    pub name: String,
    pub unit_amount: i64,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSessionRequest {
    pub currency: String,
    pub line_items: Vec<CheckoutLineItem>,
    pub success_url: String,
    pub cancel_url: String,
    pub metadata: CheckoutMetadata,
}

/// Session created by the gateway; `url` is where the customer is redirected
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

/// Hosted-checkout payment processor
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, ServiceError>;
}

/// Stripe Checkout over its form-encoded REST API
#[derive(Clone)]
pub struct StripeGateway {
    client: reqwest::Client,
    api_base: String,
    secret_key: String,
}

impl std::fmt::Debug for StripeGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeGateway")
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    #[serde(default)]
    message: Option<String>,
}

impl StripeGateway {
    pub fn new(
        api_base: impl Into<String>,
        secret_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::InternalError(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            secret_key: secret_key.into(),
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, ServiceError> {
        Self::new(
            config.payment_api_base.clone(),
            config.payment_secret_key.clone(),
            config.payment_timeout(),
        )
    }

    fn form_params(request: &CheckoutSessionRequest) -> Vec<(String, String)> {
        let mut params = vec![
            ("mode".to_string(), "payment".to_string()),
            ("success_url".to_string(), request.success_url.clone()),
            ("cancel_url".to_string(), request.cancel_url.clone()),
            (
                format!("metadata[{}]", METADATA_ORDER_ID),
                request.metadata.order_id.to_string(),
            ),
            (
                format!("metadata[{}]", METADATA_USER_ID),
                request.metadata.user_id.to_string(),
            ),
        ];

        for (i, item) in request.line_items.iter().enumerate() {
            let prefix = format!("line_items[{}]", i);
            params.push((
                format!("{}[price_data][currency]", prefix),
                request.currency.clone(),
            ));
            params.push((
                format!("{}[price_data][product_data][name]", prefix),
                item.name.clone(),
            ));
            params.push((
                format!("{}[price_data][unit_amount]", prefix),
                item.unit_amount.to_string(),
            ));
            params.push((format!("{}[quantity]", prefix), item.quantity.to_string()));
        }

        params
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    #[instrument(skip(self, request), fields(order_id = %request.metadata.order_id))]
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, ServiceError> {
        let url = format!("{}/v1/checkout/sessions", self.api_base);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.secret_key)
            .form(&Self::form_params(request))
            .send()
            .await
            .map_err(|e| {
                error!("Checkout session request failed: {}", e);
                ServiceError::PaymentGateway(format!("request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .json::<StripeErrorBody>()
                .await
                .ok()
                .and_then(|body| body.error.message)
                .unwrap_or_else(|| "no error detail".to_string());
            error!(status = %status, "Checkout session rejected: {}", detail);
            return Err(ServiceError::PaymentGateway(format!(
                "gateway returned {}: {}",
                status, detail
            )));
        }

        let session: CheckoutSession = response.json().await.map_err(|e| {
            error!("Unreadable checkout session response: {}", e);
            ServiceError::PaymentGateway(format!("invalid response: {}", e))
        })?;

        info!(session_id = %session.id, "Checkout session created");
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use uuid::Uuid;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> CheckoutSessionRequest {
        CheckoutSessionRequest {
            currency: "usd".into(),
            line_items: vec![
                CheckoutLineItem {
                    name: "Apple".into(),
                    unit_amount: 10000,
                    quantity: 2,
                },
                CheckoutLineItem {
                    name: "Tax (2%)".into(),
                    unit_amount: 400,
                    quantity: 1,
                },
            ],
            success_url: "https://shop.example.com/loader?next=my-orders".into(),
            cancel_url: "https://shop.example.com/cart".into(),
            metadata: CheckoutMetadata {
                order_id: Uuid::new_v4(),
                user_id: Uuid::new_v4(),
            },
        }
    }

    #[tokio::test]
    async fn creates_session_with_form_encoded_line_items() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/checkout/sessions"))
            .and(header("authorization", "Bearer sk_test_123"))
            .and(body_string_contains("mode=payment"))
            .and(body_string_contains("line_items%5B0%5D%5Bprice_data%5D%5Bunit_amount%5D=10000"))
            .and(body_string_contains("line_items%5B1%5D%5Bquantity%5D=1"))
            .and(body_string_contains("metadata%5BorderId%5D="))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "cs_test_abc",
                "object": "checkout.session",
                "url": "https://checkout.stripe.com/c/pay/cs_test_abc"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let gateway =
            StripeGateway::new(server.uri(), "sk_test_123", Duration::from_secs(5)).unwrap();
        let session = gateway.create_checkout_session(&request()).await.unwrap();

        assert_eq!(session.id, "cs_test_abc");
        assert_eq!(session.url, "https://checkout.stripe.com/c/pay/cs_test_abc");
    }

    #[tokio::test]
    async fn gateway_rejection_maps_to_payment_gateway_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/checkout/sessions"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": {"message": "Invalid API Key provided"}
            })))
            .mount(&server)
            .await;

        let gateway =
            StripeGateway::new(server.uri(), "sk_test_bad", Duration::from_secs(5)).unwrap();
        let err = gateway.create_checkout_session(&request()).await.unwrap_err();
        assert_matches!(err, ServiceError::PaymentGateway(ref msg) if msg.contains("Invalid API Key"));
    }

    #[tokio::test]
    async fn unreachable_gateway_is_payment_gateway_error() {
        let gateway = StripeGateway::new(
            "http://127.0.0.1:9",
            "sk_test_123",
            Duration::from_millis(500),
        )
        .unwrap();
        assert_matches!(
            gateway.create_checkout_session(&request()).await,
            Err(ServiceError::PaymentGateway(_))
        );
    }
}

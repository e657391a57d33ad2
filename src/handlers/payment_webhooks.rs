use crate::{
    errors::ServiceError,
    services::orders::NotificationOutcome,
    webhooks::{parse_notification, SIGNATURE_HEADER},
    AppState,
};
use axum::{extract::State, http::HeaderMap, Json};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WebhookAck {
    pub received: bool,
}

/// Payment gateway notifications. The raw body is verified before it is parsed.
#[utoipa::path(
    post,
    path = "/api/order/webhook",
    request_body = String,
    responses(
        (status = 200, description = "Notification accepted", body = WebhookAck),
        (status = 400, description = "Bad signature or malformed notification", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 500, description = "Processing failed", body = crate::errors::ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, ServiceError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    if let Err(e) = state.webhook_verifier.verify(signature, &body) {
        warn!(error = %e, "Payment webhook signature verification failed");
        return Err(e);
    }

    let notification = parse_notification(&body)?;
    let outcome = state
        .services
        .orders
        .handle_notification(&notification)
        .await?;

    match outcome {
        NotificationOutcome::Confirmed { order_id } => {
            info!(order_id = %order_id, "Webhook confirmed payment")
        }
        NotificationOutcome::Expired { order_id } => {
            info!(order_id = %order_id, "Webhook expired order")
        }
        NotificationOutcome::Skipped { reason } => {
            info!(reason = ?reason, event_type = %notification.event.event_type(), "Webhook acknowledged without changes")
        }
    }

    Ok(Json(WebhookAck { received: true }))
}

use crate::errors::ServiceError;
use serde::Deserialize;
use std::collections::HashMap;
use uuid::Uuid;

pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";
pub const CHECKOUT_EXPIRED: &str = "checkout.session.expired";

/// Metadata keys attached to every checkout session at creation
pub const METADATA_ORDER_ID: &str = "orderId";
pub const METADATA_USER_ID: &str = "userId";

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    id: Option<String>,
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    data: Option<EnvelopeData>,
}

#[derive(Debug, Deserialize)]
struct EnvelopeData {
    object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct SessionObject {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    metadata: Option<HashMap<String, String>>,
}

/// The checkout session a notification refers to, as echoed back by the gateway
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionReference {
    pub session_id: Option<String>,
    pub order_id: Option<String>,
    pub user_id: Option<String>,
}

/// Correlation pair recovered from a completed session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckoutMetadata {
    pub order_id: Uuid,
    pub user_id: Uuid,
}

impl SessionReference {
    /// Both ids are required to confirm a payment.
    pub fn require_metadata(&self) -> Result<CheckoutMetadata, ServiceError> {
        let order_id = parse_id(self.order_id.as_deref(), METADATA_ORDER_ID)?;
        let user_id = parse_id(self.user_id.as_deref(), METADATA_USER_ID)?;
        Ok(CheckoutMetadata { order_id, user_id })
    }

    /// Order id when present and well formed
    pub fn order_id(&self) -> Option<Uuid> {
        self.order_id
            .as_deref()
            .and_then(|raw| Uuid::parse_str(raw.trim()).ok())
    }
}

fn parse_id(raw: Option<&str>, key: &str) -> Result<Uuid, ServiceError> {
    let raw = raw
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ServiceError::MalformedNotification(format!("missing metadata {}", key)))?;
    Uuid::parse_str(raw)
        .map_err(|_| ServiceError::MalformedNotification(format!("invalid metadata {}", key)))
}

/// Verified gateway event, reduced to what the order workflow acts on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEvent {
    CheckoutCompleted(SessionReference),
    CheckoutExpired(SessionReference),
    Other(String),
}

impl GatewayEvent {
    pub fn event_type(&self) -> &str {
        match self {
            GatewayEvent::CheckoutCompleted(_) => CHECKOUT_COMPLETED,
            GatewayEvent::CheckoutExpired(_) => CHECKOUT_EXPIRED,
            GatewayEvent::Other(event_type) => event_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayNotification {
    /// Gateway event id, used for log correlation
    pub id: Option<String>,
    pub event: GatewayEvent,
}

fn session_reference(data: Option<EnvelopeData>) -> Result<SessionReference, ServiceError> {
    let object = data
        .map(|d| d.object)
        .ok_or_else(|| ServiceError::MalformedNotification("missing data.object".into()))?;
    let session: SessionObject = serde_json::from_value(object)
        .map_err(|e| ServiceError::MalformedNotification(format!("invalid session object: {}", e)))?;
    let mut metadata = session.metadata.unwrap_or_default();

    Ok(SessionReference {
        session_id: session.id,
        order_id: metadata.remove(METADATA_ORDER_ID),
        user_id: metadata.remove(METADATA_USER_ID),
    })
}

/// Parses a notification body whose signature has already been verified.
pub fn parse_notification(payload: &[u8]) -> Result<GatewayNotification, ServiceError> {
    let envelope: Envelope = serde_json::from_slice(payload)
        .map_err(|e| ServiceError::MalformedNotification(format!("invalid JSON: {}", e)))?;

    let event = match envelope.event_type.as_str() {
        CHECKOUT_COMPLETED => GatewayEvent::CheckoutCompleted(session_reference(envelope.data)?),
        CHECKOUT_EXPIRED => GatewayEvent::CheckoutExpired(session_reference(envelope.data)?),
        _ => GatewayEvent::Other(envelope.event_type),
    };

    Ok(GatewayNotification {
        id: envelope.id,
        event,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[test]
    fn parses_completed_session_metadata() {
        let order_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let body = json!({
            "id": "evt_1",
            "type": "checkout.session.completed",
            "data": {"object": {
                "id": "cs_test_1",
                "payment_status": "paid",
                "metadata": {"orderId": order_id.to_string(), "userId": user_id.to_string()}
            }}
        });

        let notification = parse_notification(body.to_string().as_bytes()).unwrap();
        assert_eq!(notification.id.as_deref(), Some("evt_1"));
        let GatewayEvent::CheckoutCompleted(reference) = notification.event else {
            panic!("expected completed event");
        };
        assert_eq!(reference.session_id.as_deref(), Some("cs_test_1"));
        assert_eq!(
            reference.require_metadata().unwrap(),
            CheckoutMetadata { order_id, user_id }
        );
    }

    #[test]
    fn missing_metadata_is_malformed_for_completion() {
        let body = json!({
            "type": "checkout.session.completed",
            "data": {"object": {"id": "cs_test_2", "metadata": {"orderId": Uuid::new_v4().to_string()}}}
        });
        let notification = parse_notification(body.to_string().as_bytes()).unwrap();
        let GatewayEvent::CheckoutCompleted(reference) = notification.event else {
            panic!("expected completed event");
        };
        assert_matches!(
            reference.require_metadata(),
            Err(ServiceError::MalformedNotification(_))
        );
    }

    #[test]
    fn expired_without_metadata_still_parses() {
        let body = json!({
            "type": "checkout.session.expired",
            "data": {"object": {"id": "cs_test_3"}}
        });
        let notification = parse_notification(body.to_string().as_bytes()).unwrap();
        assert_matches!(
            notification.event,
            GatewayEvent::CheckoutExpired(ref reference) if reference.order_id().is_none()
        );
    }

    #[test]
    fn unknown_event_types_are_passed_through() {
        let body = json!({"type": "invoice.paid", "data": {"object": {"amount": 1}}});
        let notification = parse_notification(body.to_string().as_bytes()).unwrap();
        assert_eq!(notification.event, GatewayEvent::Other("invoice.paid".into()));
    }

    #[test]
    fn garbage_body_is_malformed() {
        assert_matches!(
            parse_notification(b"not json"),
            Err(ServiceError::MalformedNotification(_))
        );
    }
}

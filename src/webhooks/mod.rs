//! Inbound payment gateway notifications: signature checks, payload parsing
//! and the payment confirmation state machine.

pub mod events;
pub mod payment_state;
pub mod signature;

pub use events::{parse_notification, CheckoutMetadata, GatewayEvent, GatewayNotification};
pub use payment_state::{transition, NoopReason, PaymentState, Transition};
pub use signature::{SignatureVerifier, SIGNATURE_HEADER};

//! Payment confirmation state machine.
//!
//! An order row is either awaiting payment, confirmed, or (for cash on
//! delivery) outside the online payment flow entirely. Expiry deletes the row,
//! so "expired" is represented by absence rather than a state.

use super::events::GatewayEvent;
use crate::entities::order::{self, PaymentType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentState {
    AwaitingPayment,
    Confirmed,
    CashOnDelivery,
}

impl PaymentState {
    pub fn of(order: &order::Model) -> Self {
        match (order.payment_type, order.is_paid) {
            (PaymentType::CashOnDelivery, _) => PaymentState::CashOnDelivery,
            (PaymentType::Online, true) => PaymentState::Confirmed,
            (PaymentType::Online, false) => PaymentState::AwaitingPayment,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoopReason {
    AlreadyConfirmed,
    NotAnOnlineOrder,
    UnhandledEvent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Mark paid and clear the customer's cart
    Confirm,
    /// Delete the abandoned order
    Expire,
    Noop(NoopReason),
}

pub fn transition(state: PaymentState, event: &GatewayEvent) -> Transition {
    match (state, event) {
        (PaymentState::AwaitingPayment, GatewayEvent::CheckoutCompleted(_)) => Transition::Confirm,
        (PaymentState::AwaitingPayment, GatewayEvent::CheckoutExpired(_)) => Transition::Expire,
        (PaymentState::Confirmed, GatewayEvent::CheckoutCompleted(_))
        | (PaymentState::Confirmed, GatewayEvent::CheckoutExpired(_)) => {
            Transition::Noop(NoopReason::AlreadyConfirmed)
        }
        (PaymentState::CashOnDelivery, GatewayEvent::CheckoutCompleted(_))
        | (PaymentState::CashOnDelivery, GatewayEvent::CheckoutExpired(_)) => {
            Transition::Noop(NoopReason::NotAnOnlineOrder)
        }
        (_, GatewayEvent::Other(_)) => Transition::Noop(NoopReason::UnhandledEvent),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webhooks::events::SessionReference;
    use rstest::rstest;

    fn completed() -> GatewayEvent {
        GatewayEvent::CheckoutCompleted(SessionReference::default())
    }

    fn expired() -> GatewayEvent {
        GatewayEvent::CheckoutExpired(SessionReference::default())
    }

    fn other() -> GatewayEvent {
        GatewayEvent::Other("payment_intent.created".into())
    }

    #[rstest]
    #[case(PaymentState::AwaitingPayment, completed(), Transition::Confirm)]
    #[case(PaymentState::AwaitingPayment, expired(), Transition::Expire)]
    #[case(PaymentState::AwaitingPayment, other(), Transition::Noop(NoopReason::UnhandledEvent))]
    #[case(PaymentState::Confirmed, completed(), Transition::Noop(NoopReason::AlreadyConfirmed))]
    #[case(PaymentState::Confirmed, expired(), Transition::Noop(NoopReason::AlreadyConfirmed))]
    #[case(PaymentState::CashOnDelivery, completed(), Transition::Noop(NoopReason::NotAnOnlineOrder))]
    #[case(PaymentState::CashOnDelivery, expired(), Transition::Noop(NoopReason::NotAnOnlineOrder))]
    #[case(PaymentState::CashOnDelivery, other(), Transition::Noop(NoopReason::UnhandledEvent))]
    fn transition_table(
        #[case] state: PaymentState,
        #[case] event: GatewayEvent,
        #[case] expected: Transition,
    ) {
        assert_eq!(transition(state, &event), expected);
    }
}

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

use crate::payments::{
    stripe_client::StripeEvent,
    stripe_objects::{
        StripeCheckoutSession, StripeDeletedSubscription, StripeInvoice, StripeSubscription,
    },
};

pub const CHECKOUT_SESSION_COMPLETED: &str = "checkout.session.completed";
pub const CUSTOMER_SUBSCRIPTION_CREATED: &str = "customer.subscription.created";
pub const CUSTOMER_SUBSCRIPTION_UPDATED: &str = "customer.subscription.updated";
pub const CUSTOMER_SUBSCRIPTION_DELETED: &str = "customer.subscription.deleted";
pub const INVOICE_PAYMENT_SUCCEEDED: &str = "invoice.payment_succeeded";
pub const INVOICE_PAYMENT_FAILED: &str = "invoice.payment_failed";

/// Subscription lifecycle events the backend reacts to, with typed payloads.
#[derive(Debug, Clone)]
pub enum PaymentEvent {
    CheckoutCompleted(StripeCheckoutSession),
    SubscriptionCreated(StripeSubscription),
    SubscriptionUpdated(StripeSubscription),
    SubscriptionDeleted(StripeDeletedSubscription),
    InvoicePaymentSucceeded(StripeInvoice),
    InvoicePaymentFailed(StripeInvoice),
    Unhandled { event_type: String },
}

impl PaymentEvent {
    pub fn event_type(&self) -> &str {
        match self {
            PaymentEvent::CheckoutCompleted(_) => CHECKOUT_SESSION_COMPLETED,
            PaymentEvent::SubscriptionCreated(_) => CUSTOMER_SUBSCRIPTION_CREATED,
            PaymentEvent::SubscriptionUpdated(_) => CUSTOMER_SUBSCRIPTION_UPDATED,
            PaymentEvent::SubscriptionDeleted(_) => CUSTOMER_SUBSCRIPTION_DELETED,
            PaymentEvent::InvoicePaymentSucceeded(_) => INVOICE_PAYMENT_SUCCEEDED,
            PaymentEvent::InvoicePaymentFailed(_) => INVOICE_PAYMENT_FAILED,
            PaymentEvent::Unhandled { event_type } => event_type,
        }
    }
}

impl TryFrom<StripeEvent> for PaymentEvent {
    type Error = anyhow::Error;

    fn try_from(event: StripeEvent) -> Result<Self> {
        let object = event.data.object;

        let parsed = match event.type_.as_str() {
            CHECKOUT_SESSION_COMPLETED => PaymentEvent::CheckoutCompleted(payload(object)?),
            CUSTOMER_SUBSCRIPTION_CREATED => PaymentEvent::SubscriptionCreated(payload(object)?),
            CUSTOMER_SUBSCRIPTION_UPDATED => PaymentEvent::SubscriptionUpdated(payload(object)?),
            CUSTOMER_SUBSCRIPTION_DELETED => PaymentEvent::SubscriptionDeleted(payload(object)?),
            INVOICE_PAYMENT_SUCCEEDED => PaymentEvent::InvoicePaymentSucceeded(payload(object)?),
            INVOICE_PAYMENT_FAILED => PaymentEvent::InvoicePaymentFailed(payload(object)?),
            _ => PaymentEvent::Unhandled {
                event_type: event.type_,
            },
        };

        Ok(parsed)
    }
}

fn payload<T: DeserializeOwned>(object: serde_json::Value) -> Result<T> {
    serde_json::from_value(object).with_context(|| {
        format!(
            "event payload is not a valid {}",
            std::any::type_name::<T>()
                .rsplit("::")
                .next()
                .unwrap_or("object")
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(type_: &str, object: serde_json::Value) -> StripeEvent {
        serde_json::from_value(json!({
            "id": "evt_1",
            "object": "event",
            "type": type_,
            "data": { "object": object }
        }))
        .unwrap()
    }

    #[test]
    fn subscription_events_carry_typed_payloads() {
        let parsed = PaymentEvent::try_from(event(
            CUSTOMER_SUBSCRIPTION_UPDATED,
            json!({ "id": "sub_1", "customer": "cus_1", "status": "past_due" }),
        ))
        .unwrap();

        match parsed {
            PaymentEvent::SubscriptionUpdated(subscription) => {
                assert_eq!(subscription.id, "sub_1");
                assert_eq!(subscription.customer.id(), "cus_1");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn unknown_types_are_kept_as_unhandled() {
        let parsed =
            PaymentEvent::try_from(event("customer.created", json!({ "id": "cus_1" }))).unwrap();
        assert_eq!(parsed.event_type(), "customer.created");
        assert!(matches!(parsed, PaymentEvent::Unhandled { .. }));
    }

    #[test]
    fn malformed_payload_for_known_type_is_an_error() {
        let err = PaymentEvent::try_from(event(
            CUSTOMER_SUBSCRIPTION_DELETED,
            json!({ "id": "sub_1", "status": "active" }),
        ))
        .unwrap_err();
        assert!(err.to_string().contains("StripeDeletedSubscription"), "{err}");
    }

    #[test]
    fn deletion_with_foreign_status_still_decodes() {
        let parsed = PaymentEvent::try_from(event(
            CUSTOMER_SUBSCRIPTION_DELETED,
            json!({ "id": "sub_1", "customer": "cus_1", "status": "paused" }),
        ))
        .unwrap();

        assert!(matches!(parsed, PaymentEvent::SubscriptionDeleted(_)));
    }

    #[test]
    fn update_with_foreign_status_is_an_error() {
        let err = PaymentEvent::try_from(event(
            CUSTOMER_SUBSCRIPTION_UPDATED,
            json!({ "id": "sub_1", "customer": "cus_1", "status": "paused" }),
        ))
        .unwrap_err();
        assert!(err.to_string().contains("StripeSubscription"), "{err}");
    }
}

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use anyhow::{Context, anyhow};
use crates::{
    domain::{
        entities::users::UserEntity,
        repositories::users::UserRepository,
        value_objects::{
            enums::subscription_statuses::SubscriptionStatus, subscriptions::SubscriptionSnapshot,
        },
    },
    payments::{
        events::{
            CHECKOUT_SESSION_COMPLETED, CUSTOMER_SUBSCRIPTION_DELETED, INVOICE_PAYMENT_FAILED,
            INVOICE_PAYMENT_SUCCEEDED, PaymentEvent,
        },
        stripe_client::StripeEvent,
        stripe_objects::{
            StripeCheckoutSession, StripeDeletedSubscription, StripeInvoice, StripeSubscription,
        },
    },
};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::stripe_gateway::StripeGateway;

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("missing stripe-signature header")]
    MissingSignature,
    #[error("invalid webhook signature")]
    InvalidSignature,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl WebhookError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            WebhookError::MissingSignature | WebhookError::InvalidSignature => {
                StatusCode::BAD_REQUEST
            }
            WebhookError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type WebhookResult<T> = std::result::Result<T, WebhookError>;

/// Keeps each user's embedded subscription snapshot in line with Stripe's view.
///
/// Every write is a full overwrite (or the idempotent past-due flip), so a
/// redelivered event re-applies the same state.
pub struct SubscriptionReconciler<U, G>
where
    U: UserRepository + Send + Sync + 'static,
    G: StripeGateway + Send + Sync + 'static,
{
    user_repo: Arc<U>,
    stripe: Arc<G>,
    dropped_events: AtomicU64,
}

impl<U, G> SubscriptionReconciler<U, G>
where
    U: UserRepository + Send + Sync + 'static,
    G: StripeGateway + Send + Sync + 'static,
{
    pub fn new(user_repo: Arc<U>, stripe: Arc<G>) -> Self {
        Self {
            user_repo,
            stripe,
            dropped_events: AtomicU64::new(0),
        }
    }

    /// Events acknowledged without a write because no user owns the customer id.
    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    pub async fn handle_webhook(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> WebhookResult<()> {
        let signature = signature
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| {
                warn!("webhook: request without stripe-signature header");
                WebhookError::MissingSignature
            })?;

        self.stripe
            .verify_webhook_signature(payload, signature)
            .map_err(|err| {
                warn!(error = %err, "webhook: signature verification failed");
                WebhookError::InvalidSignature
            })?;

        let raw_event: StripeEvent =
            serde_json::from_slice(payload).context("webhook body is not a Stripe event")?;
        let event_id = raw_event.id.clone();
        let livemode = raw_event.livemode;
        let created = raw_event.created;
        let event = PaymentEvent::try_from(raw_event)
            .with_context(|| format!("failed to decode stripe event {event_id}"))?;

        let event_type = event.event_type().to_string();
        info!(
            event_id = %event_id,
            event_type = %event_type,
            livemode = ?livemode,
            created = ?created,
            "webhook: stripe event verified"
        );

        match event {
            PaymentEvent::CheckoutCompleted(session) => {
                self.on_checkout_completed(&session).await?
            }
            PaymentEvent::SubscriptionCreated(subscription)
            | PaymentEvent::SubscriptionUpdated(subscription) => {
                let snapshot = subscription.to_snapshot()?;
                self.upsert_snapshot(subscription.customer.id(), snapshot, &event_type)
                    .await?
            }
            PaymentEvent::SubscriptionDeleted(subscription) => {
                self.on_subscription_deleted(&subscription).await?
            }
            PaymentEvent::InvoicePaymentSucceeded(invoice) => {
                self.on_invoice_paid(&invoice).await?
            }
            PaymentEvent::InvoicePaymentFailed(invoice) => {
                self.on_invoice_failed(&invoice).await?
            }
            PaymentEvent::Unhandled { .. } => {
                debug!(event_type = %event_type, "webhook: unhandled stripe event type");
            }
        }

        Ok(())
    }

    async fn on_checkout_completed(&self, session: &StripeCheckoutSession) -> WebhookResult<()> {
        let Some(customer_id) = session.customer.as_ref().map(|c| c.id()) else {
            debug!(session_id = %session.id, "webhook: checkout session without customer");
            return Ok(());
        };
        if !session.is_subscription_mode() {
            debug!(session_id = %session.id, "webhook: checkout session is not subscription mode");
            return Ok(());
        }

        let subscription_id = session
            .subscription
            .as_ref()
            .map(|s| s.id())
            .ok_or_else(|| anyhow!("checkout session {} has no subscription", session.id))?;

        let subscription = self.fetch_subscription(subscription_id).await?;
        let snapshot = subscription.to_snapshot()?;
        self.upsert_snapshot(customer_id, snapshot, CHECKOUT_SESSION_COMPLETED)
            .await
    }

    async fn on_subscription_deleted(
        &self,
        subscription: &StripeDeletedSubscription,
    ) -> WebhookResult<()> {
        let snapshot = subscription.to_canceled_snapshot()?;
        self.upsert_snapshot(
            subscription.customer.id(),
            snapshot,
            CUSTOMER_SUBSCRIPTION_DELETED,
        )
        .await
    }

    async fn on_invoice_paid(&self, invoice: &StripeInvoice) -> WebhookResult<()> {
        let (Some(customer_id), Some(subscription_id)) =
            (invoice.customer_id(), invoice.subscription_id())
        else {
            debug!(invoice_id = ?invoice.id, "webhook: paid invoice without subscription");
            return Ok(());
        };

        let subscription = self.fetch_subscription(subscription_id).await?;
        let snapshot = subscription.to_snapshot()?;
        self.upsert_snapshot(customer_id, snapshot, INVOICE_PAYMENT_SUCCEEDED)
            .await
    }

    async fn on_invoice_failed(&self, invoice: &StripeInvoice) -> WebhookResult<()> {
        let Some(customer_id) = invoice.customer_id() else {
            debug!(invoice_id = ?invoice.id, "webhook: failed invoice without customer");
            return Ok(());
        };

        let Some(user) = self.find_user(customer_id, INVOICE_PAYMENT_FAILED).await? else {
            return Ok(());
        };

        if user.subscription.is_none() {
            info!(
                user_id = %user.uid,
                customer_id,
                "webhook: payment failed for user without subscription snapshot"
            );
            return Ok(());
        }

        self.user_repo
            .update_subscription_status(&user.uid, SubscriptionStatus::PastDue)
            .await
            .map_err(|err| {
                error!(
                    user_id = %user.uid,
                    db_error = ?err,
                    "webhook: failed to mark subscription past due"
                );
                WebhookError::Internal(err)
            })?;

        info!(user_id = %user.uid, customer_id, "webhook: subscription marked past due");
        Ok(())
    }

    async fn fetch_subscription(&self, subscription_id: &str) -> WebhookResult<StripeSubscription> {
        self.stripe
            .retrieve_subscription(subscription_id)
            .await
            .map_err(|err| {
                error!(
                    subscription_id,
                    error = ?err,
                    "webhook: failed to retrieve subscription from stripe"
                );
                WebhookError::Internal(err)
            })
    }

    async fn find_user(
        &self,
        customer_id: &str,
        event_type: &str,
    ) -> WebhookResult<Option<UserEntity>> {
        let user = self
            .user_repo
            .find_by_stripe_customer_id(customer_id)
            .await
            .map_err(|err| {
                error!(customer_id, db_error = ?err, "webhook: failed to look up customer");
                WebhookError::Internal(err)
            })?;

        if user.is_none() {
            let total = self.dropped_events.fetch_add(1, Ordering::Relaxed) + 1;
            warn!(
                customer_id,
                event_type,
                dropped_total = total,
                "webhook: no user for stripe customer; event dropped"
            );
        }

        Ok(user)
    }

    async fn upsert_snapshot(
        &self,
        customer_id: &str,
        snapshot: SubscriptionSnapshot,
        event_type: &str,
    ) -> WebhookResult<()> {
        let Some(user) = self.find_user(customer_id, event_type).await? else {
            return Ok(());
        };

        let status = snapshot.status;
        let subscription_id = snapshot.id.clone();

        self.user_repo
            .replace_subscription(&user.uid, snapshot)
            .await
            .map_err(|err| {
                error!(
                    user_id = %user.uid,
                    db_error = ?err,
                    "webhook: failed to store subscription snapshot"
                );
                WebhookError::Internal(err)
            })?;

        info!(
            user_id = %user.uid,
            customer_id,
            subscription_id = %subscription_id,
            status = %status,
            event_type,
            "webhook: subscription snapshot replaced"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecases::stripe_gateway::MockStripeGateway;
    use chrono::{TimeZone, Utc};
    use crates::{
        domain::repositories::users::MockUserRepository,
        payments::stripe_objects::StripeSubscription,
    };
    use serde_json::{Value, json};
    use std::sync::Mutex;

    const PERIOD_END: i64 = 1_735_689_600;

    fn user(uid: &str, subscription: Option<SubscriptionSnapshot>) -> UserEntity {
        let now = Utc::now();
        UserEntity {
            uid: uid.to_string(),
            email: format!("{uid}@example.com"),
            display_name: None,
            photo_url: None,
            stripe_customer_id: Some("cus_1".to_string()),
            subscription,
            created_at: now,
            updated_at: now,
        }
    }

    fn subscription_json(status: &str, cancel_at_period_end: bool) -> Value {
        json!({
            "id": "sub_1",
            "object": "subscription",
            "customer": "cus_1",
            "status": status,
            "cancel_at_period_end": cancel_at_period_end,
            "current_period_end": PERIOD_END,
            "items": { "data": [ { "price": { "id": "price_monthly" } } ] }
        })
    }

    fn event_body(event_type: &str, object: Value) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "id": "evt_1",
            "object": "event",
            "type": event_type,
            "data": { "object": object }
        }))
        .unwrap()
    }

    fn accepting_gateway() -> MockStripeGateway {
        let mut gateway = MockStripeGateway::new();
        gateway
            .expect_verify_webhook_signature()
            .returning(|_, _| Ok(()));
        gateway
    }

    fn period_end() -> chrono::DateTime<Utc> {
        Utc.timestamp_opt(PERIOD_END, 0).unwrap()
    }

    #[tokio::test]
    async fn missing_signature_is_rejected_before_verification() {
        let reconciler = SubscriptionReconciler::new(
            Arc::new(MockUserRepository::new()),
            Arc::new(MockStripeGateway::new()),
        );

        let body = event_body("customer.subscription.updated", subscription_json("active", false));
        let err = reconciler.handle_webhook(&body, None).await.unwrap_err();

        assert!(matches!(err, WebhookError::MissingSignature));
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn bad_signature_is_rejected_without_touching_users() {
        let mut gateway = MockStripeGateway::new();
        gateway
            .expect_verify_webhook_signature()
            .times(1)
            .returning(|_, _| Err(anyhow!("invalid webhook signature")));

        // No expectations: any repository call panics.
        let user_repo = MockUserRepository::new();
        let reconciler = SubscriptionReconciler::new(Arc::new(user_repo), Arc::new(gateway));

        let body = event_body("customer.subscription.updated", subscription_json("active", false));
        let err = reconciler
            .handle_webhook(&body, Some("t=1,v1=deadbeef"))
            .await
            .unwrap_err();

        assert!(matches!(err, WebhookError::InvalidSignature));
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn replaying_subscription_updated_gives_same_snapshot() {
        let written = Arc::new(Mutex::new(Vec::<SubscriptionSnapshot>::new()));

        let mut user_repo = MockUserRepository::new();
        user_repo
            .expect_find_by_stripe_customer_id()
            .withf(|customer_id| customer_id == "cus_1")
            .times(2)
            .returning(|_| Ok(Some(user("uid_1", None))));
        let sink = Arc::clone(&written);
        user_repo
            .expect_replace_subscription()
            .withf(|uid, _| uid == "uid_1")
            .times(2)
            .returning(move |_, snapshot| {
                sink.lock().unwrap().push(snapshot);
                Ok(())
            });

        let reconciler =
            SubscriptionReconciler::new(Arc::new(user_repo), Arc::new(accepting_gateway()));
        let body = event_body("customer.subscription.updated", subscription_json("trialing", true));

        reconciler.handle_webhook(&body, Some("sig")).await.unwrap();
        reconciler.handle_webhook(&body, Some("sig")).await.unwrap();

        let written = written.lock().unwrap();
        assert_eq!(written.len(), 2);
        assert_eq!(written[0], written[1]);
        assert_eq!(
            written[0],
            SubscriptionSnapshot {
                id: "sub_1".to_string(),
                status: SubscriptionStatus::Trialing,
                price_id: "price_monthly".to_string(),
                current_period_end: period_end(),
                cancel_at_period_end: true,
            }
        );
    }

    #[tokio::test]
    async fn unknown_customer_is_acknowledged_and_counted() {
        let mut user_repo = MockUserRepository::new();
        user_repo
            .expect_find_by_stripe_customer_id()
            .times(1)
            .returning(|_| Ok(None));
        user_repo.expect_replace_subscription().never();
        user_repo.expect_create().never();

        let reconciler =
            SubscriptionReconciler::new(Arc::new(user_repo), Arc::new(accepting_gateway()));
        let body = event_body("customer.subscription.created", subscription_json("active", false));

        reconciler.handle_webhook(&body, Some("sig")).await.unwrap();

        assert_eq!(reconciler.dropped_events(), 1);
    }

    #[tokio::test]
    async fn deletion_forces_canceled_state() {
        let mut user_repo = MockUserRepository::new();
        user_repo
            .expect_find_by_stripe_customer_id()
            .returning(|_| Ok(Some(user("uid_1", None))));
        user_repo
            .expect_replace_subscription()
            .withf(|uid, snapshot| {
                uid == "uid_1"
                    && snapshot.status == SubscriptionStatus::Canceled
                    && snapshot.cancel_at_period_end
                    && snapshot.price_id == "price_monthly"
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let reconciler =
            SubscriptionReconciler::new(Arc::new(user_repo), Arc::new(accepting_gateway()));
        // Payload still claims the subscription is active.
        let body = event_body("customer.subscription.deleted", subscription_json("active", false));

        reconciler.handle_webhook(&body, Some("sig")).await.unwrap();
    }

    #[tokio::test]
    async fn deletion_with_status_outside_known_set_is_still_canceled() {
        let mut user_repo = MockUserRepository::new();
        user_repo
            .expect_find_by_stripe_customer_id()
            .withf(|customer_id| customer_id == "cus_1")
            .returning(|_| Ok(Some(user("uid_1", None))));
        user_repo
            .expect_replace_subscription()
            .withf(|uid, snapshot| {
                uid == "uid_1"
                    && *snapshot
                        == SubscriptionSnapshot {
                            id: "sub_1".to_string(),
                            status: SubscriptionStatus::Canceled,
                            price_id: "price_monthly".to_string(),
                            current_period_end: period_end(),
                            cancel_at_period_end: true,
                        }
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let reconciler =
            SubscriptionReconciler::new(Arc::new(user_repo), Arc::new(accepting_gateway()));
        let body = event_body("customer.subscription.deleted", subscription_json("paused", false));

        reconciler.handle_webhook(&body, Some("sig")).await.unwrap();
    }

    #[tokio::test]
    async fn deletion_for_unknown_customer_is_acknowledged_and_counted() {
        let mut user_repo = MockUserRepository::new();
        user_repo
            .expect_find_by_stripe_customer_id()
            .times(1)
            .returning(|_| Ok(None));
        user_repo.expect_replace_subscription().never();
        user_repo.expect_create().never();

        let reconciler =
            SubscriptionReconciler::new(Arc::new(user_repo), Arc::new(accepting_gateway()));
        let body = event_body("customer.subscription.deleted", subscription_json("canceled", true));

        reconciler.handle_webhook(&body, Some("sig")).await.unwrap();

        assert_eq!(reconciler.dropped_events(), 1);
    }

    #[tokio::test]
    async fn payment_failure_for_unknown_customer_is_acknowledged_and_counted() {
        let mut user_repo = MockUserRepository::new();
        user_repo
            .expect_find_by_stripe_customer_id()
            .withf(|customer_id| customer_id == "cus_gone")
            .times(1)
            .returning(|_| Ok(None));
        user_repo.expect_update_subscription_status().never();
        user_repo.expect_replace_subscription().never();
        user_repo.expect_create().never();

        let reconciler =
            SubscriptionReconciler::new(Arc::new(user_repo), Arc::new(accepting_gateway()));
        let body = event_body("invoice.payment_failed", json!({ "customer": "cus_gone" }));

        reconciler.handle_webhook(&body, Some("sig")).await.unwrap();

        assert_eq!(reconciler.dropped_events(), 1);
    }

    #[tokio::test]
    async fn payment_failure_only_changes_status() {
        let existing = SubscriptionSnapshot {
            id: "sub_1".to_string(),
            status: SubscriptionStatus::Active,
            price_id: "price_monthly".to_string(),
            current_period_end: period_end(),
            cancel_at_period_end: false,
        };

        let mut user_repo = MockUserRepository::new();
        user_repo
            .expect_find_by_stripe_customer_id()
            .withf(|customer_id| customer_id == "cus_1")
            .returning(move |_| Ok(Some(user("uid_1", Some(existing.clone())))));
        user_repo
            .expect_update_subscription_status()
            .withf(|uid, status| uid == "uid_1" && *status == SubscriptionStatus::PastDue)
            .times(1)
            .returning(|_, _| Ok(()));
        user_repo.expect_replace_subscription().never();

        let reconciler =
            SubscriptionReconciler::new(Arc::new(user_repo), Arc::new(accepting_gateway()));
        let body = event_body(
            "invoice.payment_failed",
            json!({ "id": "in_1", "customer": "cus_1", "subscription": "sub_1" }),
        );

        reconciler.handle_webhook(&body, Some("sig")).await.unwrap();
    }

    #[tokio::test]
    async fn payment_failure_without_snapshot_is_a_no_op() {
        let mut user_repo = MockUserRepository::new();
        user_repo
            .expect_find_by_stripe_customer_id()
            .returning(|_| Ok(Some(user("uid_1", None))));
        user_repo.expect_update_subscription_status().never();

        let reconciler =
            SubscriptionReconciler::new(Arc::new(user_repo), Arc::new(accepting_gateway()));
        let body = event_body("invoice.payment_failed", json!({ "customer": "cus_1" }));

        reconciler.handle_webhook(&body, Some("sig")).await.unwrap();
    }

    #[tokio::test]
    async fn checkout_completion_fetches_subscription_then_stores_it() {
        let mut gateway = accepting_gateway();
        gateway
            .expect_retrieve_subscription()
            .withf(|id| id == "sub_1")
            .times(1)
            .returning(|_| {
                Ok(serde_json::from_value::<StripeSubscription>(subscription_json(
                    "active", false,
                ))
                .unwrap())
            });

        let mut user_repo = MockUserRepository::new();
        user_repo
            .expect_find_by_stripe_customer_id()
            .withf(|customer_id| customer_id == "cus_1")
            .returning(|_| Ok(Some(user("uid_1", None))));
        user_repo
            .expect_replace_subscription()
            .withf(|uid, snapshot| {
                uid == "uid_1" && snapshot.status == SubscriptionStatus::Active
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let reconciler = SubscriptionReconciler::new(Arc::new(user_repo), Arc::new(gateway));
        let body = event_body(
            "checkout.session.completed",
            json!({
                "id": "cs_1",
                "mode": "subscription",
                "customer": "cus_1",
                "subscription": "sub_1"
            }),
        );

        reconciler.handle_webhook(&body, Some("sig")).await.unwrap();
    }

    #[tokio::test]
    async fn payment_mode_checkout_is_ignored() {
        let mut gateway = accepting_gateway();
        gateway.expect_retrieve_subscription().never();

        let reconciler =
            SubscriptionReconciler::new(Arc::new(MockUserRepository::new()), Arc::new(gateway));
        let body = event_body(
            "checkout.session.completed",
            json!({ "id": "cs_1", "mode": "payment", "customer": "cus_1" }),
        );

        reconciler.handle_webhook(&body, Some("sig")).await.unwrap();
    }

    #[tokio::test]
    async fn paid_invoice_refreshes_snapshot_from_stripe() {
        let mut gateway = accepting_gateway();
        gateway
            .expect_retrieve_subscription()
            .withf(|id| id == "sub_1")
            .times(1)
            .returning(|_| {
                Ok(serde_json::from_value::<StripeSubscription>(subscription_json(
                    "active", false,
                ))
                .unwrap())
            });

        let mut user_repo = MockUserRepository::new();
        user_repo
            .expect_find_by_stripe_customer_id()
            .returning(|_| Ok(Some(user("uid_1", None))));
        user_repo
            .expect_replace_subscription()
            .times(1)
            .returning(|_, _| Ok(()));

        let reconciler = SubscriptionReconciler::new(Arc::new(user_repo), Arc::new(gateway));
        let body = event_body(
            "invoice.payment_succeeded",
            json!({
                "id": "in_1",
                "customer": "cus_1",
                "parent": { "subscription_details": { "subscription": "sub_1" } }
            }),
        );

        reconciler.handle_webhook(&body, Some("sig")).await.unwrap();
    }

    #[tokio::test]
    async fn unrecognised_event_is_acknowledged() {
        let reconciler = SubscriptionReconciler::new(
            Arc::new(MockUserRepository::new()),
            Arc::new(accepting_gateway()),
        );
        let body = event_body("customer.created", json!({ "id": "cus_1" }));

        reconciler.handle_webhook(&body, Some("sig")).await.unwrap();
    }

    #[tokio::test]
    async fn storage_failure_is_internal() {
        let mut user_repo = MockUserRepository::new();
        user_repo
            .expect_find_by_stripe_customer_id()
            .returning(|_| Err(anyhow!("connection refused")));

        let reconciler =
            SubscriptionReconciler::new(Arc::new(user_repo), Arc::new(accepting_gateway()));
        let body = event_body("customer.subscription.updated", subscription_json("active", false));

        let err = reconciler
            .handle_webhook(&body, Some("sig"))
            .await
            .unwrap_err();

        assert_eq!(
            err.status_code(),
            axum::http::StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use crates::payments::{stripe_client::StripeClient, stripe_objects::StripeSubscription};

/// The subset of the Stripe API the use cases depend on.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StripeGateway: Send + Sync {
    async fn create_customer(&self, email: &str, name: Option<String>) -> AnyResult<String>;

    async fn create_checkout_session(
        &self,
        customer_id: &str,
        price_id: &str,
        success_url: &str,
        cancel_url: &str,
    ) -> AnyResult<String>;

    async fn create_billing_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> AnyResult<String>;

    async fn retrieve_subscription(&self, subscription_id: &str) -> AnyResult<StripeSubscription>;

    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> AnyResult<()>;
}

#[async_trait]
impl StripeGateway for StripeClient {
    async fn create_customer(&self, email: &str, name: Option<String>) -> AnyResult<String> {
        self.create_customer(email, name.as_deref()).await
    }

    async fn create_checkout_session(
        &self,
        customer_id: &str,
        price_id: &str,
        success_url: &str,
        cancel_url: &str,
    ) -> AnyResult<String> {
        self.create_checkout_session(customer_id, price_id, success_url, cancel_url)
            .await
    }

    async fn create_billing_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> AnyResult<String> {
        self.create_billing_portal_session(customer_id, return_url)
            .await
    }

    async fn retrieve_subscription(&self, subscription_id: &str) -> AnyResult<StripeSubscription> {
        self.retrieve_subscription(subscription_id).await
    }

    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> AnyResult<()> {
        self.verify_webhook_signature(payload, signature)
    }
}

use std::sync::Arc;

use crates::domain::{
    entities::users::UserEntity,
    repositories::users::UserRepository,
    value_objects::billing::{CreateCheckoutRequest, CustomerPortalRequest, RedirectResponse},
};
use thiserror::Error;
use tracing::{error, info, warn};

use super::stripe_gateway::StripeGateway;

#[derive(Debug, Error)]
pub enum BillingError {
    #[error("price_id is required")]
    MissingPriceId,
    #[error("user not found")]
    UserNotFound,
    #[error("no Stripe customer found")]
    NoStripeCustomer,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl BillingError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            BillingError::MissingPriceId => StatusCode::BAD_REQUEST,
            BillingError::UserNotFound | BillingError::NoStripeCustomer => StatusCode::NOT_FOUND,
            BillingError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type BillingResult<T> = std::result::Result<T, BillingError>;

/// Where Stripe sends the browser back when the caller does not say.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingRedirects {
    pub success_url: String,
    pub cancel_url: String,
    pub portal_return_url: String,
}

impl BillingRedirects {
    pub fn from_frontend_url(frontend_url: &str) -> Self {
        let base = frontend_url.trim_end_matches('/');
        Self {
            success_url: format!("{base}/dashboard?checkout=success"),
            cancel_url: format!("{base}/pricing?checkout=canceled"),
            portal_return_url: format!("{base}/dashboard"),
        }
    }
}

pub struct BillingUseCase<U, G>
where
    U: UserRepository + Send + Sync + 'static,
    G: StripeGateway + Send + Sync + 'static,
{
    user_repo: Arc<U>,
    stripe: Arc<G>,
    redirects: BillingRedirects,
}

impl<U, G> BillingUseCase<U, G>
where
    U: UserRepository + Send + Sync + 'static,
    G: StripeGateway + Send + Sync + 'static,
{
    pub fn new(user_repo: Arc<U>, stripe: Arc<G>, redirects: BillingRedirects) -> Self {
        Self {
            user_repo,
            stripe,
            redirects,
        }
    }

    pub async fn create_checkout_session(
        &self,
        uid: &str,
        request: CreateCheckoutRequest,
    ) -> BillingResult<RedirectResponse> {
        let price_id = request.price_id.trim();
        if price_id.is_empty() {
            return Err(BillingError::MissingPriceId);
        }

        let user = self.load_user(uid).await?;
        let customer_id = self.ensure_customer(&user).await?;

        let success_url = non_empty(&request.success_url).unwrap_or(&self.redirects.success_url);
        let cancel_url = non_empty(&request.cancel_url).unwrap_or(&self.redirects.cancel_url);

        let url = self
            .stripe
            .create_checkout_session(&customer_id, price_id, success_url, cancel_url)
            .await
            .map_err(|err| {
                error!(
                    user_id = %uid,
                    customer_id = %customer_id,
                    price_id,
                    error = ?err,
                    "billing: failed to create checkout session"
                );
                BillingError::Internal(err)
            })?;

        info!(
            user_id = %uid,
            customer_id = %customer_id,
            price_id,
            "billing: checkout session created"
        );
        Ok(RedirectResponse { url })
    }

    pub async fn create_customer_portal_session(
        &self,
        uid: &str,
        request: CustomerPortalRequest,
    ) -> BillingResult<RedirectResponse> {
        let user = self.load_user(uid).await?;
        let customer_id = user
            .stripe_customer_id
            .as_deref()
            .ok_or(BillingError::NoStripeCustomer)?;

        let return_url = non_empty(&request.return_url).unwrap_or(&self.redirects.portal_return_url);

        let url = self
            .stripe
            .create_billing_portal_session(customer_id, return_url)
            .await
            .map_err(|err| {
                error!(
                    user_id = %uid,
                    customer_id,
                    error = ?err,
                    "billing: failed to create customer portal session"
                );
                BillingError::Internal(err)
            })?;

        info!(user_id = %uid, customer_id, "billing: customer portal session created");
        Ok(RedirectResponse { url })
    }

    async fn load_user(&self, uid: &str) -> BillingResult<UserEntity> {
        self.user_repo
            .find_by_uid(uid)
            .await
            .map_err(|err| {
                error!(user_id = %uid, db_error = ?err, "billing: failed to load user");
                BillingError::Internal(err)
            })?
            .ok_or(BillingError::UserNotFound)
    }

    /// Returns the user's Stripe customer id, creating and storing one first if needed.
    /// The id is persisted before any checkout session refers to it.
    async fn ensure_customer(&self, user: &UserEntity) -> BillingResult<String> {
        if let Some(customer_id) = user.stripe_customer_id.as_ref() {
            return Ok(customer_id.clone());
        }

        let created = self
            .stripe
            .create_customer(&user.email, user.display_name.clone())
            .await
            .map_err(|err| {
                error!(user_id = %user.uid, error = ?err, "billing: failed to create stripe customer");
                BillingError::Internal(err)
            })?;

        let stored = self
            .user_repo
            .set_stripe_customer_id(&user.uid, &created)
            .await
            .map_err(|err| {
                error!(
                    user_id = %user.uid,
                    customer_id = %created,
                    db_error = ?err,
                    "billing: failed to store stripe customer id"
                );
                BillingError::Internal(err)
            })?;

        if stored {
            info!(user_id = %user.uid, customer_id = %created, "billing: stripe customer created");
            return Ok(created);
        }

        // A concurrent request linked a customer first; use that one.
        let winner = self
            .load_user(&user.uid)
            .await?
            .stripe_customer_id
            .ok_or_else(|| anyhow::anyhow!("stripe customer id vanished for {}", user.uid))?;
        warn!(
            user_id = %user.uid,
            orphaned_customer_id = %created,
            customer_id = %winner,
            "billing: customer id already linked; orphaned customer left in stripe"
        );
        Ok(winner)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecases::stripe_gateway::MockStripeGateway;
    use anyhow::anyhow;
    use chrono::Utc;
    use crates::domain::repositories::users::MockUserRepository;
    use mockall::Sequence;

    fn user(stripe_customer_id: Option<&str>) -> UserEntity {
        let now = Utc::now();
        UserEntity {
            uid: "uid_1".to_string(),
            email: "ada@example.com".to_string(),
            display_name: Some("Ada".to_string()),
            photo_url: None,
            stripe_customer_id: stripe_customer_id.map(str::to_string),
            subscription: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn redirects() -> BillingRedirects {
        BillingRedirects::from_frontend_url("https://app.example.com/")
    }

    fn checkout(price_id: &str) -> CreateCheckoutRequest {
        CreateCheckoutRequest {
            price_id: price_id.to_string(),
            success_url: None,
            cancel_url: None,
        }
    }

    #[test]
    fn redirects_are_built_from_frontend_url() {
        let redirects = redirects();
        assert_eq!(
            redirects.success_url,
            "https://app.example.com/dashboard?checkout=success"
        );
        assert_eq!(redirects.portal_return_url, "https://app.example.com/dashboard");
    }

    #[tokio::test]
    async fn customer_id_is_persisted_before_checkout_session_is_created() {
        let mut seq = Sequence::new();
        let mut user_repo = MockUserRepository::new();
        let mut stripe = MockStripeGateway::new();

        user_repo
            .expect_find_by_uid()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(Some(user(None))));
        stripe
            .expect_create_customer()
            .withf(|email, name| email == "ada@example.com" && name.as_deref() == Some("Ada"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok("cus_new".to_string()));
        user_repo
            .expect_set_stripe_customer_id()
            .withf(|uid, customer_id| uid == "uid_1" && customer_id == "cus_new")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(true));
        stripe
            .expect_create_checkout_session()
            .withf(|customer_id, price_id, success_url, _| {
                customer_id == "cus_new"
                    && price_id == "price_monthly"
                    && success_url == "https://app.example.com/dashboard?checkout=success"
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _, _| Ok("https://checkout.stripe.com/c/pay/cs_1".to_string()));

        let usecase = BillingUseCase::new(Arc::new(user_repo), Arc::new(stripe), redirects());

        let response = usecase
            .create_checkout_session("uid_1", checkout("price_monthly"))
            .await
            .unwrap();

        assert_eq!(response.url, "https://checkout.stripe.com/c/pay/cs_1");
    }

    #[tokio::test]
    async fn existing_customer_is_reused_with_caller_urls() {
        let mut user_repo = MockUserRepository::new();
        let mut stripe = MockStripeGateway::new();

        user_repo
            .expect_find_by_uid()
            .returning(|_| Ok(Some(user(Some("cus_1")))));
        user_repo.expect_set_stripe_customer_id().never();
        stripe.expect_create_customer().never();
        stripe
            .expect_create_checkout_session()
            .withf(|customer_id, _, success_url, cancel_url| {
                customer_id == "cus_1"
                    && success_url == "https://app.example.com/thanks"
                    && cancel_url == "https://app.example.com/back"
            })
            .times(1)
            .returning(|_, _, _, _| Ok("https://checkout.stripe.com/c/pay/cs_2".to_string()));

        let usecase = BillingUseCase::new(Arc::new(user_repo), Arc::new(stripe), redirects());

        let request = CreateCheckoutRequest {
            price_id: "price_annual".to_string(),
            success_url: Some("https://app.example.com/thanks".to_string()),
            cancel_url: Some("https://app.example.com/back".to_string()),
        };
        usecase.create_checkout_session("uid_1", request).await.unwrap();
    }

    #[tokio::test]
    async fn lost_customer_race_uses_stored_customer() {
        let mut user_repo = MockUserRepository::new();
        let mut stripe = MockStripeGateway::new();
        let mut seq = Sequence::new();

        user_repo
            .expect_find_by_uid()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(Some(user(None))));
        stripe
            .expect_create_customer()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok("cus_orphan".to_string()));
        user_repo
            .expect_set_stripe_customer_id()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(false));
        user_repo
            .expect_find_by_uid()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(Some(user(Some("cus_winner")))));
        stripe
            .expect_create_checkout_session()
            .withf(|customer_id, _, _, _| customer_id == "cus_winner")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _, _| Ok("https://checkout.stripe.com/c/pay/cs_3".to_string()));

        let usecase = BillingUseCase::new(Arc::new(user_repo), Arc::new(stripe), redirects());

        usecase
            .create_checkout_session("uid_1", checkout("price_monthly"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn empty_price_id_is_bad_request() {
        let usecase = BillingUseCase::new(
            Arc::new(MockUserRepository::new()),
            Arc::new(MockStripeGateway::new()),
            redirects(),
        );

        let err = usecase
            .create_checkout_session("uid_1", checkout("  "))
            .await
            .unwrap_err();

        assert!(matches!(err, BillingError::MissingPriceId));
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn checkout_for_unknown_user_is_not_found() {
        let mut user_repo = MockUserRepository::new();
        user_repo.expect_find_by_uid().returning(|_| Ok(None));

        let usecase = BillingUseCase::new(
            Arc::new(user_repo),
            Arc::new(MockStripeGateway::new()),
            redirects(),
        );

        let err = usecase
            .create_checkout_session("uid_1", checkout("price_monthly"))
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), axum::http::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn stripe_failure_is_internal() {
        let mut user_repo = MockUserRepository::new();
        let mut stripe = MockStripeGateway::new();
        user_repo
            .expect_find_by_uid()
            .returning(|_| Ok(Some(user(Some("cus_1")))));
        stripe
            .expect_create_checkout_session()
            .returning(|_, _, _, _| Err(anyhow!("stripe unavailable")));

        let usecase = BillingUseCase::new(Arc::new(user_repo), Arc::new(stripe), redirects());

        let err = usecase
            .create_checkout_session("uid_1", checkout("price_monthly"))
            .await
            .unwrap_err();

        assert_eq!(
            err.status_code(),
            axum::http::StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn portal_requires_customer_id() {
        let mut user_repo = MockUserRepository::new();
        user_repo.expect_find_by_uid().returning(|_| Ok(Some(user(None))));

        let mut stripe = MockStripeGateway::new();
        stripe.expect_create_billing_portal_session().never();

        let usecase = BillingUseCase::new(Arc::new(user_repo), Arc::new(stripe), redirects());

        let err = usecase
            .create_customer_portal_session("uid_1", CustomerPortalRequest::default())
            .await
            .unwrap_err();

        assert!(matches!(err, BillingError::NoStripeCustomer));
        assert_eq!(err.status_code(), axum::http::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn portal_falls_back_to_dashboard_return_url() {
        let mut user_repo = MockUserRepository::new();
        user_repo
            .expect_find_by_uid()
            .returning(|_| Ok(Some(user(Some("cus_1")))));

        let mut stripe = MockStripeGateway::new();
        stripe
            .expect_create_billing_portal_session()
            .withf(|customer_id, return_url| {
                customer_id == "cus_1" && return_url == "https://app.example.com/dashboard"
            })
            .times(1)
            .returning(|_, _| Ok("https://billing.stripe.com/p/session/bps_1".to_string()));

        let usecase = BillingUseCase::new(Arc::new(user_repo), Arc::new(stripe), redirects());

        let response = usecase
            .create_customer_portal_session(
                "uid_1",
                CustomerPortalRequest {
                    return_url: Some(" ".to_string()),
                },
            )
            .await
            .unwrap();

        assert_eq!(response.url, "https://billing.stripe.com/p/session/bps_1");
    }
}

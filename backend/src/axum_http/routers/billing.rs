use std::sync::Arc;

use axum::{Json, Router, extract::State, response::IntoResponse, routing::post};
use crates::domain::{
    repositories::users::UserRepository,
    value_objects::billing::{CreateCheckoutRequest, CustomerPortalRequest},
};

use crate::{
    auth::AuthUser,
    axum_http::error_responses::AppError,
    usecases::{billing::BillingUseCase, stripe_gateway::StripeGateway},
};

pub fn routes<U, G>(usecase: Arc<BillingUseCase<U, G>>) -> Router
where
    U: UserRepository + Send + Sync + 'static,
    G: StripeGateway + Send + Sync + 'static,
{
    Router::new()
        .route("/checkout-session", post(create_checkout_session::<U, G>))
        .route("/customer-portal", post(create_customer_portal::<U, G>))
        .with_state(usecase)
}

pub async fn create_checkout_session<U, G>(
    State(usecase): State<Arc<BillingUseCase<U, G>>>,
    auth: AuthUser,
    Json(request): Json<CreateCheckoutRequest>,
) -> Result<impl IntoResponse, AppError>
where
    U: UserRepository + Send + Sync + 'static,
    G: StripeGateway + Send + Sync + 'static,
{
    let redirect = usecase.create_checkout_session(&auth.uid, request).await?;
    Ok(Json(redirect))
}

pub async fn create_customer_portal<U, G>(
    State(usecase): State<Arc<BillingUseCase<U, G>>>,
    auth: AuthUser,
    request: Option<Json<CustomerPortalRequest>>,
) -> Result<impl IntoResponse, AppError>
where
    U: UserRepository + Send + Sync + 'static,
    G: StripeGateway + Send + Sync + 'static,
{
    let request = request.map(|Json(request)| request).unwrap_or_default();
    let redirect = usecase
        .create_customer_portal_session(&auth.uid, request)
        .await?;
    Ok(Json(redirect))
}

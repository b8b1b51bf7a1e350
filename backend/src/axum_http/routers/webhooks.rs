use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::IntoResponse,
    routing::post,
};
use crates::domain::repositories::users::UserRepository;
use serde_json::json;

use crate::{
    axum_http::error_responses::AppError,
    usecases::{stripe_gateway::StripeGateway, subscription_reconciler::SubscriptionReconciler},
};

pub const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";

pub fn routes<U, G>(reconciler: Arc<SubscriptionReconciler<U, G>>) -> Router
where
    U: UserRepository + Send + Sync + 'static,
    G: StripeGateway + Send + Sync + 'static,
{
    Router::new()
        .route("/stripe", post(stripe_webhook::<U, G>))
        .with_state(reconciler)
}

/// Takes the raw body: the signature covers the exact bytes Stripe sent.
pub async fn stripe_webhook<U, G>(
    State(reconciler): State<Arc<SubscriptionReconciler<U, G>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError>
where
    U: UserRepository + Send + Sync + 'static,
    G: StripeGateway + Send + Sync + 'static,
{
    let signature = headers
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    reconciler.handle_webhook(&body, signature).await?;

    Ok(Json(json!({ "received": true })))
}

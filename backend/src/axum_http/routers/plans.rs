use std::sync::Arc;

use axum::{Json, Router, extract::State, response::IntoResponse, routing::get};
use crates::domain::value_objects::plans::PlanCatalog;

pub fn routes(catalog: Arc<PlanCatalog>) -> Router {
    Router::new()
        .route("/", get(list_plans))
        .with_state(catalog)
}

pub async fn list_plans(State(catalog): State<Arc<PlanCatalog>>) -> impl IntoResponse {
    Json(catalog.plans().to_vec())
}

use std::sync::Arc;

use axum::{Json, Router, extract::State, response::IntoResponse, routing::get};
use crates::domain::{
    repositories::{usage_stats::UsageStatsRepository, users::UserRepository},
    value_objects::usage_stats::RecordUsageModel,
};

use crate::{
    auth::AuthUser, axum_http::error_responses::AppError, usecases::usage_stats::UsageStatsUseCase,
};

pub fn routes<S, U>(usecase: Arc<UsageStatsUseCase<S, U>>) -> Router
where
    S: UsageStatsRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
{
    Router::new()
        .route("/", get(current_usage::<S, U>).post(record_usage::<S, U>))
        .with_state(usecase)
}

pub async fn current_usage<S, U>(
    State(usecase): State<Arc<UsageStatsUseCase<S, U>>>,
    auth: AuthUser,
) -> Result<impl IntoResponse, AppError>
where
    S: UsageStatsRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
{
    let stats = usecase.current_usage(&auth.uid).await?;
    Ok(Json(stats))
}

pub async fn record_usage<S, U>(
    State(usecase): State<Arc<UsageStatsUseCase<S, U>>>,
    auth: AuthUser,
    Json(model): Json<RecordUsageModel>,
) -> Result<impl IntoResponse, AppError>
where
    S: UsageStatsRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
{
    let stats = usecase.record_usage(&auth.uid, model).await?;
    Ok(Json(stats))
}

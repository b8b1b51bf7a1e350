use std::sync::Arc;

use axum::{Json, Router, extract::State, response::IntoResponse, routing::get};
use crates::domain::repositories::users::UserRepository;

use crate::{auth::AuthUser, axum_http::error_responses::AppError, usecases::users::UserUseCase};

pub fn routes<U>(usecase: Arc<UserUseCase<U>>) -> Router
where
    U: UserRepository + Send + Sync + 'static,
{
    Router::new()
        .route("/users", get(list_users::<U>))
        .with_state(usecase)
}

pub async fn list_users<U>(
    State(usecase): State<Arc<UserUseCase<U>>>,
    auth: AuthUser,
) -> Result<impl IntoResponse, AppError>
where
    U: UserRepository + Send + Sync + 'static,
{
    let users = usecase.list_users_for_admin(&auth.uid).await?;
    Ok(Json(users))
}

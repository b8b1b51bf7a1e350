use std::sync::Arc;

use axum::{Json, Router, extract::State, response::IntoResponse, routing::get};
use crates::domain::{
    repositories::users::UserRepository,
    value_objects::users::{UpdateUserProfileModel, UpsertUserModel},
};

use crate::{auth::AuthUser, axum_http::error_responses::AppError, usecases::users::UserUseCase};

pub fn routes<U>(usecase: Arc<UserUseCase<U>>) -> Router
where
    U: UserRepository + Send + Sync + 'static,
{
    Router::new()
        .route(
            "/",
            get(current_user::<U>)
                .post(upsert_user::<U>)
                .put(update_user::<U>),
        )
        .with_state(usecase)
}

pub async fn current_user<U>(
    State(usecase): State<Arc<UserUseCase<U>>>,
    auth: AuthUser,
) -> Result<impl IntoResponse, AppError>
where
    U: UserRepository + Send + Sync + 'static,
{
    let user = usecase.get_current_user(&auth.uid).await?;
    Ok(Json(user))
}

pub async fn upsert_user<U>(
    State(usecase): State<Arc<UserUseCase<U>>>,
    auth: AuthUser,
    Json(model): Json<UpsertUserModel>,
) -> Result<impl IntoResponse, AppError>
where
    U: UserRepository + Send + Sync + 'static,
{
    let user = usecase.upsert_current_user(&auth, model).await?;
    Ok(Json(user))
}

pub async fn update_user<U>(
    State(usecase): State<Arc<UserUseCase<U>>>,
    auth: AuthUser,
    Json(model): Json<UpdateUserProfileModel>,
) -> Result<impl IntoResponse, AppError>
where
    U: UserRepository + Send + Sync + 'static,
{
    let user = usecase.update_current_user(&auth.uid, model).await?;
    Ok(Json(user))
}

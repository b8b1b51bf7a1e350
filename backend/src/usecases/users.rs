use std::sync::Arc;

use chrono::Utc;
use crates::domain::{
    entities::users::{InsertUserEntity, UpdateUserProfileEntity},
    repositories::users::UserRepository,
    value_objects::users::{AdminUserDto, UpdateUserProfileModel, UpsertUserModel, UserDto},
};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::{auth::AuthUser, config::config_model::Admin};

pub const ADMIN_USER_LIST_LIMIT: i64 = 100;

#[derive(Debug, Error)]
pub enum UserError {
    #[error("user not found")]
    NotFound,
    #[error("email is required to create a user")]
    MissingEmail,
    #[error("email is already registered to another user")]
    EmailTaken,
    #[error("admin access required")]
    Forbidden,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl UserError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            UserError::NotFound => StatusCode::NOT_FOUND,
            UserError::MissingEmail => StatusCode::BAD_REQUEST,
            UserError::EmailTaken => StatusCode::CONFLICT,
            UserError::Forbidden => StatusCode::FORBIDDEN,
            UserError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type UserResult<T> = std::result::Result<T, UserError>;

pub struct UserUseCase<U>
where
    U: UserRepository + Send + Sync + 'static,
{
    user_repo: Arc<U>,
    admin: Admin,
}

impl<U> UserUseCase<U>
where
    U: UserRepository + Send + Sync + 'static,
{
    pub fn new(user_repo: Arc<U>, admin: Admin) -> Self {
        Self { user_repo, admin }
    }

    pub async fn get_current_user(&self, uid: &str) -> UserResult<UserDto> {
        let user = self
            .user_repo
            .find_by_uid(uid)
            .await
            .map_err(|err| {
                error!(user_id = %uid, db_error = ?err, "users: failed to load user");
                UserError::Internal(err)
            })?
            .ok_or(UserError::NotFound)?;

        Ok(user.into())
    }

    /// Called after sign-in: creates the record on first visit, otherwise refreshes
    /// the profile fields the caller sent with non-empty values.
    pub async fn upsert_current_user(
        &self,
        auth: &AuthUser,
        model: UpsertUserModel,
    ) -> UserResult<UserDto> {
        let existing = self.user_repo.find_by_uid(&auth.uid).await.map_err(|err| {
            error!(user_id = %auth.uid, db_error = ?err, "users: failed to load user");
            UserError::Internal(err)
        })?;

        let display_name = non_empty(model.display_name);
        let photo_url = non_empty(model.photo_url);

        if existing.is_some() {
            let changes = UpdateUserProfileEntity {
                display_name,
                photo_url,
                updated_at: Utc::now(),
            };
            let user = self
                .user_repo
                .update_profile(&auth.uid, changes)
                .await
                .map_err(|err| {
                    error!(user_id = %auth.uid, db_error = ?err, "users: failed to refresh profile");
                    UserError::Internal(err)
                })?;
            info!(user_id = %auth.uid, "users: profile refreshed");
            return Ok(user.into());
        }

        let email = auth
            .email
            .clone()
            .or_else(|| non_empty(model.email))
            .ok_or(UserError::MissingEmail)?;

        if let Some(owner) = self.user_repo.find_by_email(&email).await.map_err(|err| {
            error!(user_id = %auth.uid, db_error = ?err, "users: failed to check email");
            UserError::Internal(err)
        })? {
            warn!(
                user_id = %auth.uid,
                owner_id = %owner.uid,
                "users: email already belongs to another user"
            );
            return Err(UserError::EmailTaken);
        }

        let insert = InsertUserEntity {
            uid: auth.uid.clone(),
            email,
            display_name: display_name.or_else(|| auth.name.clone()),
            photo_url: photo_url.or_else(|| auth.picture.clone()),
        };

        let user = self.user_repo.create(insert).await.map_err(|err| {
            error!(user_id = %auth.uid, db_error = ?err, "users: failed to create user");
            UserError::Internal(err)
        })?;

        info!(user_id = %auth.uid, "users: user created");
        Ok(user.into())
    }

    pub async fn update_current_user(
        &self,
        uid: &str,
        model: UpdateUserProfileModel,
    ) -> UserResult<UserDto> {
        let existing = self
            .user_repo
            .find_by_uid(uid)
            .await
            .map_err(|err| {
                error!(user_id = %uid, db_error = ?err, "users: failed to load user");
                UserError::Internal(err)
            })?
            .ok_or(UserError::NotFound)?;

        if model.is_empty() {
            return Ok(existing.into());
        }

        let user = self
            .user_repo
            .update_profile(uid, model.to_entity())
            .await
            .map_err(|err| {
                error!(user_id = %uid, db_error = ?err, "users: failed to update profile");
                UserError::Internal(err)
            })?;

        info!(user_id = %uid, "users: profile updated");
        Ok(user.into())
    }

    pub async fn list_users_for_admin(&self, uid: &str) -> UserResult<Vec<AdminUserDto>> {
        if !self.admin.is_admin(uid) {
            warn!(user_id = %uid, "users: non-admin requested user listing");
            return Err(UserError::Forbidden);
        }

        let users = self
            .user_repo
            .list_users(ADMIN_USER_LIST_LIMIT)
            .await
            .map_err(|err| {
                error!(user_id = %uid, db_error = ?err, "users: failed to list users");
                UserError::Internal(err)
            })?;

        info!(user_id = %uid, user_count = users.len(), "users: admin listing served");
        Ok(users.into_iter().map(AdminUserDto::from).collect())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

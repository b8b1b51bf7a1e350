use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::usecases::{
    billing::BillingError, subscription_reconciler::WebhookError, usage_stats::UsageError,
    users::UserError,
};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: u16,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if let AppError::Internal(cause) = &self {
            error!(error = ?cause, "http: request failed");
        }

        // Display of Internal is the generic message; the cause stays in the log.
        let body = Json(ErrorResponse {
            code: status.as_u16(),
            message: self.to_string(),
        });

        (status, body).into_response()
    }
}

impl From<WebhookError> for AppError {
    fn from(err: WebhookError) -> Self {
        match err {
            WebhookError::MissingSignature => AppError::BadRequest("No signature provided".into()),
            WebhookError::InvalidSignature => AppError::BadRequest("Invalid signature".into()),
            WebhookError::Internal(cause) => AppError::Internal(cause),
        }
    }
}

impl From<BillingError> for AppError {
    fn from(err: BillingError) -> Self {
        match err {
            BillingError::MissingPriceId => AppError::BadRequest(err.to_string()),
            BillingError::UserNotFound | BillingError::NoStripeCustomer => {
                AppError::NotFound(err.to_string())
            }
            BillingError::Internal(cause) => AppError::Internal(cause),
        }
    }
}

impl From<UserError> for AppError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::NotFound => AppError::NotFound(err.to_string()),
            UserError::MissingEmail => AppError::BadRequest(err.to_string()),
            UserError::EmailTaken => AppError::Conflict(err.to_string()),
            UserError::Forbidden => AppError::Forbidden(err.to_string()),
            UserError::Internal(cause) => AppError::Internal(cause),
        }
    }
}

impl From<UsageError> for AppError {
    fn from(err: UsageError) -> Self {
        match err {
            UsageError::InvalidInput(message) => AppError::BadRequest(message),
            UsageError::Internal(cause) => AppError::Internal(cause),
        }
    }
}

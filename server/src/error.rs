//! Error types for the node

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::contract::ContractError;
use crate::fhe::FheError;
use crate::services::chain::ChainError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    /// Contract revert with its reason string
    #[error("{0}")]
    Reverted(String),

    #[error("Invalid input proof")]
    InvalidProof,

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<FheError> for AppError {
    fn from(err: FheError) -> Self {
        match err {
            FheError::InvalidProof => AppError::InvalidProof,
            FheError::UnknownHandle(_) => AppError::NotFound(err.to_string()),
            FheError::NotAllowed { .. } | FheError::ContractNotAuthorized(_) => {
                AppError::Forbidden(err.to_string())
            }
            FheError::InvalidSignature(_)
            | FheError::AuthorizationExpired
            | FheError::AuthorizationTooLong { .. } => AppError::Unauthorized(err.to_string()),
            FheError::EmptyRequest => AppError::BadRequest(err.to_string()),
        }
    }
}

impl From<ContractError> for AppError {
    fn from(err: ContractError) -> Self {
        match err {
            ContractError::NoGuessSubmitted => AppError::Reverted(err.to_string()),
            ContractError::Fhe(FheError::InvalidProof) => AppError::InvalidProof,
            ContractError::Fhe(inner) => AppError::Reverted(inner.to_string()),
        }
    }
}

impl From<ChainError> for AppError {
    fn from(err: ChainError) -> Self {
        match err {
            ChainError::Contract(inner) => inner.into(),
            ChainError::Fhe(inner) => inner.into(),
            ChainError::InvalidSignature(_) | ChainError::SignerMismatch { .. } => {
                AppError::Unauthorized(err.to_string())
            }
            ChainError::NonceMismatch { .. } => AppError::Conflict(err.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::Reverted(_) => (StatusCode::UNPROCESSABLE_ENTITY, self.to_string()),
            AppError::InvalidProof => (StatusCode::UNPROCESSABLE_ENTITY, self.to_string()),
            AppError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, self.to_string()),
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, self.to_string()),
            AppError::Conflict(_) => (StatusCode::CONFLICT, self.to_string()),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".to_string()),
        };

        let body = Json(json!({
            "error": error_message,
            "code": status.as_u16()
        }));

        (status, body).into_response()
    }
}

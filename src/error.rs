// src/error.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::{auth::AuthError, config::ConfigError, store::StoreError};

/// Failures that stop the server from starting or keep it from serving.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("auth client error: {0}")]
    Auth(#[from] AuthError),

    #[error("invalid CORS origin: {0}")]
    Cors(#[from] http::header::InvalidHeaderValue),

    #[error("invalid bind address {0:?}")]
    Address(String),

    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("Invalid payload: {0}")]
    MalformedPayload(String),

    #[error("User not authenticated")]
    Unauthenticated,

    #[error("{0}")]
    NotFound(&'static str),

    #[error("You have already voted on this poll")]
    AlreadyVoted,

    #[error("This poll is closed")]
    PollClosed,

    #[error("Option does not belong to this poll")]
    InvalidOption,

    /// A datastore call failed. Only `message` reaches the client.
    #[error("{message}")]
    Remote {
        message: &'static str,
        #[source]
        source: StoreError,
    },
}

impl AppError {
    pub fn remote(message: &'static str, source: StoreError) -> Self {
        AppError::Remote { message, source }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Validation(_) | AppError::MalformedPayload(_) | AppError::InvalidOption => {
                StatusCode::BAD_REQUEST
            }
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::AlreadyVoted | AppError::PollClosed => StatusCode::CONFLICT,
            AppError::Remote { message, source } => {
                tracing::error!("{message}: {source:?}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = match &self {
            AppError::Validation(details) => json!({
                "success": false,
                "error": self.to_string(),
                "details": details,
            }),
            _ => json!({ "success": false, "error": self.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}

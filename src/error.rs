use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

use crate::schemas::ItemId;

#[derive(Debug, Error)]
pub enum TripError {
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: ItemId },

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("trip {trip} was modified concurrently (expected version {expected})")]
    Conflict { trip: String, expected: u64 },

    #[error("store error: {0}")]
    Store(#[from] mongodb::error::Error),

    #[error("failed to encode json: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TripError>;

impl TripError {
    pub fn not_found(kind: &'static str, id: ItemId) -> Self {
        TripError::NotFound { kind, id }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        TripError::Validation(message.into())
    }
}

impl ResponseError for TripError {
    fn status_code(&self) -> StatusCode {
        match self {
            TripError::NotFound { .. } => StatusCode::NOT_FOUND,
            TripError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            TripError::Conflict { .. } => StatusCode::CONFLICT,
            TripError::Store(_) | TripError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "error": self.to_string() }))
    }
}

//! Error taxonomy shared by the rule layer and the HTTP handlers.

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{error, warn};

use courier_db::DbError;
use courier_types::api::ErrorResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed or contradictory input.
    #[error("bad request: {0}")]
    BadRequest(&'static str),

    /// Missing or unknown bearer identity.
    #[error("unauthorized")]
    Unauthorized,

    /// Authenticated, but not a permitted actor.
    #[error("forbidden")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0} already exists")]
    Conflict(&'static str),

    /// Storage or serialization failure; details are logged, never returned.
    #[error("internal server error")]
    Internal,
}

pub type Result<T> = std::result::Result<T, ApiError>;

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Conflict { entity } => ApiError::Conflict(entity),
            other => {
                error!("Storage failure: {}", other);
                ApiError::Internal
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        warn!("Rejected JSON body: {}", rejection.body_text());
        ApiError::BadRequest("malformed JSON body")
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        warn!("Rejected path: {}", rejection.body_text());
        ApiError::BadRequest("malformed path parameter")
    }
}

impl From<QueryRejection> for ApiError {
    fn from(_: QueryRejection) -> Self {
        ApiError::BadRequest("malformed query string")
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        warn!("Rejected multipart body: {}", err.body_text());
        ApiError::BadRequest("malformed multipart body")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

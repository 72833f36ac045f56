use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use crate::models::{ErrorBody, ErrorKind};
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Idea not found")]
    NotFound,

    #[error("Vote limit exceeded")]
    VoteLimitExceeded,

    #[error("Already voted for this idea")]
    AlreadyVoted,

    #[error("Failed to reset votes")]
    ResetFailed(#[source] StoreError),

    #[error("Unable to determine client IP")]
    NoClientIp,

    #[error("Too many requests, retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Internal server error")]
    Internal(#[from] StoreError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::VoteLimitExceeded | AppError::AlreadyVoted => StatusCode::CONFLICT,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::ResetFailed(_) | AppError::NoClientIp | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::NotFound => ErrorKind::NotFound,
            AppError::VoteLimitExceeded => ErrorKind::VoteLimitExceeded,
            AppError::AlreadyVoted => ErrorKind::AlreadyVoted,
            AppError::RateLimited { .. } => ErrorKind::RateLimited,
            AppError::ResetFailed(_) | AppError::NoClientIp | AppError::Internal(_) => {
                ErrorKind::Internal
            }
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            status_code: self.status().as_u16(),
            message: self.to_string(),
            kind: self.kind(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::ResetFailed(source) | AppError::Internal(source) => {
                error!("{self}: {source}");
            }
            AppError::NoClientIp => error!("{self}"),
            _ => {}
        }

        let mut response = (self.status(), Json(self.body())).into_response();
        if let AppError::RateLimited { retry_after_secs } = self {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }
        response
    }
}

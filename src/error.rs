use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use log::error;
use serde_json::json;
use thiserror::Error;

use crate::validation::{FieldError, ValidationErrors};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid data. Please correct the errors and try again.")]
    Validation(#[from] ValidationErrors),

    #[error("{0}")]
    MalformedPayload(&'static str),

    #[error("You need to be logged in to access this page. Please login below!")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("{0}")]
    NotFound(&'static str),

    #[error("{0}")]
    Duplicate(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Blocking task failed: {0}")]
    Blocking(#[from] actix_web::error::BlockingError),
}

impl From<FieldError> for AppError {
    fn from(error: FieldError) -> Self {
        AppError::Validation(error.into())
    }
}

impl AppError {
    fn is_internal(&self) -> bool {
        matches!(self, AppError::Database(_) | AppError::Io(_) | AppError::Blocking(_))
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::MalformedPayload(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Duplicate(_) => StatusCode::CONFLICT,
            AppError::Database(_) | AppError::Io(_) | AppError::Blocking(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        if self.is_internal() {
            error!("[SERVER ERROR] {:?}", self);
            return HttpResponse::build(self.status_code())
                .json(json!({ "success": false, "error": "Internal server error" }));
        }

        let body = match self {
            AppError::Validation(fields) => json!({
                "success": false,
                "error": self.to_string(),
                "fields": fields,
            }),
            _ => json!({ "success": false, "error": self.to_string() }),
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}

/// True when `err` is a UNIQUE/PRIMARY KEY violation.
pub fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(AppError::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AppError::Duplicate("You have already reviewed this project.").status_code(),
            StatusCode::CONFLICT
        );
        let validation: AppError = FieldError::new("file", "too big").into();
        assert_eq!(validation.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::Database(rusqlite::Error::QueryReturnedNoRows).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}

//! HTTP mapping of [`Error`].
//!
//! Every failure leaves the API as `{"message": ...}` with the status code of its kind.
//! Internal failures are logged in full and answered with a generic message.

use crate::errors::{Error, ErrorKind};
use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;

const INTERNAL_MESSAGE: &str = "Something went wrong. Please try again later.";

#[derive(Debug, Serialize)]
struct ErrorBody {
    message: String,
}

impl ErrorKind {
    #[must_use]
    pub const fn status_code(self) -> StatusCode {
        match self {
            Self::Validation => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Conflict => StatusCode::CONFLICT,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let message = if kind == ErrorKind::Internal {
            error!(error = %self, "Request failed");
            INTERNAL_MESSAGE.to_string()
        } else {
            self.to_string()
        };

        (kind.status_code(), Json(ErrorBody { message })).into_response()
    }
}

impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        Self::validation(rejection.body_text())
    }
}

impl From<QueryRejection> for Error {
    fn from(rejection: QueryRejection) -> Self {
        Self::validation(rejection.body_text())
    }
}

impl From<PathRejection> for Error {
    fn from(rejection: PathRejection) -> Self {
        Self::validation(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            Error::validation("bad").into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::BookingWindowExceeded { days: 30 }.into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::not_found("Service", 1).into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            Error::conflict("full").into_response().status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            Error::Unauthenticated.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            Error::forbidden("no").into_response().status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            Error::Internal {
                message: "secret".to_string()
            }
            .into_response()
            .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}

//! HTTP mapping of `TimetableError`, plus JSON / query / path extractors
//! whose rejections come back as validation errors in the same body shape.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use timetable_core::TimetableError;
use tracing::{error, warn};

use crate::models::ErrorResponse;
use crate::store::StoreError;

#[derive(Debug)]
pub struct ApiError(pub TimetableError);

pub type ApiResult<T> = Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        match &self.0 {
            TimetableError::Internal(detail) => error!(error = %detail, "Request failed"),
            TimetableError::Solver(detail) => warn!(error = %detail, "Solver call failed"),
            _ => {}
        }

        let body = ErrorResponse {
            error: self.0.public_message(),
            details: self.0.details(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<TimetableError> for ApiError {
    fn from(err: TimetableError) -> Self {
        Self(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self(err.into())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(TimetableError::validation(rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self(TimetableError::validation(rejection.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self(TimetableError::validation(rejection.body_text()))
    }
}

/// `Json` whose rejection is a 400 `{error}` body.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct AppJson<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct AppQuery<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct AppPath<T>(pub T);

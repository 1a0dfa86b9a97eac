//! Body extractors whose rejections use the JSON error envelope.
//!
//! axum's own `Json` and `Form` answer malformed bodies with plain-text
//! 400/415/422 responses. These wrappers route the same rejections
//! through [`AppError::BadRequest`].

use axum::extract::rejection::{FormRejection, JsonRejection};
use axum::extract::FromRequest;

use crate::error::AppError;

/// `application/json` request body.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// `application/x-www-form-urlencoded` request body.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Form), rejection(AppError))]
pub struct ApiForm<T>(pub T);

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<FormRejection> for AppError {
    fn from(rejection: FormRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

//! Request extractors whose rejections answer with the `AppError` JSON body
//! instead of axum's plain-text default.

use axum::extract::{FromRequest, FromRequestParts};
use serde::{Deserialize, Deserializer};

use crate::errors::AppError;

/// `axum::Json` with a `VALIDATION_ERROR` body for malformed or mistyped input.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

/// `axum::extract::Path` with a `VALIDATION_ERROR` body for unparseable segments.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct AppPath<T>(pub T);

/// For `#[serde(default, deserialize_with = "nullable")]` on patch fields:
/// absent is `None`, an explicit `null` is `Some(None)`.
pub fn nullable<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

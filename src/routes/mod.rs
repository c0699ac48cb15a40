pub mod auth;
pub mod comments;
pub mod posts;
pub mod users;

use std::path::Path;

use axum::extract::multipart::MultipartError;
use serde::Serialize;

use crate::error::{AppError, AppResult};

/// `{ "id": ... }` body returned after a write.
#[derive(Debug, Serialize)]
pub struct IdResponse {
    pub id: String,
}

/// Unwraps a required text input. Missing or blank values are a 400.
pub fn required(value: Option<String>, field: &str) -> AppResult<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(AppError::BadRequest(format!("Missing {}", field))),
    }
}

/// Passwords are kept verbatim: only a missing or empty value is a 400.
pub fn required_password(value: Option<String>) -> AppResult<String> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing password".into()))
}

/// Like [`required`] but treats a blank value as absent instead of an error.
pub fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn multipart_error(err: MultipartError) -> AppError {
    AppError::BadRequest(format!("Malformed multipart body: {}", err.body_text()))
}

/// File extension for an upload, from its file name or failing that its content type.
pub fn upload_extension(file_name: Option<&str>, content_type: Option<&str>) -> Option<String> {
    let from_name = file_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .map(str::to_string);

    from_name.or_else(|| {
        content_type
            .and_then(mime_guess::get_mime_extensions_str)
            .and_then(|exts| exts.first())
            .map(|ext| ext.to_string())
    })
}

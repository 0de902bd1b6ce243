// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::error;

/// Body of every non-200 response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApiError {
    /// No `file` part in the request
    NoFileProvided,
    /// `file` part with an empty filename
    NoFileSelected,
    InvalidRequest(String),
    /// Detection service failed to load at startup
    ServiceUnavailable(String),
    /// Anything that went wrong while handling a valid upload
    Processing(String),
}

impl ApiError {
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            error: self.to_string(),
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::NoFileProvided | ApiError::NoFileSelected | ApiError::InvalidRequest(_) => 400,
            ApiError::ServiceUnavailable(_) | ApiError::Processing(_) => 500,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::NoFileProvided => write!(f, "No file provided"),
            ApiError::NoFileSelected => write!(f, "No file selected"),
            ApiError::InvalidRequest(msg) => write!(f, "{}", msg),
            ApiError::ServiceUnavailable(msg) => write!(f, "Detection model not loaded: {}", msg),
            ApiError::Processing(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        // Outermost context first, then the causes
        ApiError::Processing(format!("{:#}", err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }
        (status, Json(self.to_response())).into_response()
    }
}

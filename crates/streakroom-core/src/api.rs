//! JSON response envelope shared by every surface.

use serde::{Deserialize, Serialize};

use crate::error::ClaimError;

/// `{ "success": bool, "data"?: T, "error"?: string }`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Map an operation result to a status code and envelope.
///
/// Server-side failures are logged here with their detail, and the caller
/// only sees a generic message.
pub fn respond<T>(result: Result<T, ClaimError>) -> (u16, ApiResponse<T>) {
    match result {
        Ok(data) => (200, ApiResponse::ok(data)),
        Err(err) => {
            let status = err.status_code();
            if status >= 500 {
                tracing::error!(error = %err, "request failed");
                (status, ApiResponse::err("Internal server error"))
            } else {
                (status, ApiResponse::err(err.to_string()))
            }
        }
    }
}

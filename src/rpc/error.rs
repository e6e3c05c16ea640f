//! RPC error mapping
//!
//! Server side: domain errors become an HTTP status plus an [`ApiResponse`]
//! envelope. Client side: [`RpcError`] covers everything that can go wrong
//! on the wire before a domain error is decoded.

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::Value;
use thiserror::Error;

use super::types::ApiResponse;
use crate::account::BalanceError;
use crate::core_types::ParseError;
use crate::transfer::TransferError;

/// Client-side transport failures
#[derive(Error, Debug)]
pub enum RpcError {
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Malformed response: {0}")]
    Decode(String),

    #[error("Remote error {status} {code}: {msg}")]
    Remote { status: i32, code: String, msg: String },
}

impl RpcError {
    pub fn code(&self) -> &'static str {
        match self {
            RpcError::Transport(_) => "TRANSPORT_ERROR",
            RpcError::Decode(_) => "DECODE_ERROR",
            RpcError::Remote { .. } => "REMOTE_ERROR",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            RpcError::Transport(_) | RpcError::Remote { .. } => 503,
            RpcError::Decode(_) => 502,
        }
    }
}

impl From<RpcError> for BalanceError {
    fn from(e: RpcError) -> Self {
        BalanceError::DownstreamUnavailable(e.to_string())
    }
}

/// Server-side error response
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ApiResponse<Value>,
}

fn status_from(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

impl ApiError {
    pub fn new(status: u16, error_code: &str, msg: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            status: status_from(status),
            body: ApiResponse::error(i32::from(status), error_code, msg, data),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::new(400, "VALIDATION_ERROR", msg, None)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<BalanceError> for ApiError {
    fn from(e: BalanceError) -> Self {
        // The typed error rides in `data` so a remote keeper client can rebuild it
        let data = serde_json::to_value(&e).ok();
        ApiError::new(e.http_status(), e.code(), e.to_string(), data)
    }
}

impl From<TransferError> for ApiError {
    fn from(e: TransferError) -> Self {
        let data = e
            .transaction()
            .and_then(|tx| serde_json::to_value(tx).ok());
        ApiError::new(e.http_status(), e.code(), e.to_string(), data)
    }
}

impl From<ParseError> for ApiError {
    fn from(e: ParseError) -> Self {
        ApiError::validation(e.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ApiError::validation(e.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(e: QueryRejection) -> Self {
        ApiError::validation(e.body_text())
    }
}

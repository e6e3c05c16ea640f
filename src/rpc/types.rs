//! RPC envelope and request/response DTOs

use serde::{Deserialize, Serialize};

use crate::account::AccountStatus;

/// Standard response envelope.
///
/// `code` is 0 on success and the HTTP status otherwise; `error_code` is the
/// stable machine-readable reason. Error responses may still carry `data`
/// (the typed error detail, or the transaction a failed transfer left behind).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub msg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: 0,
            msg: "ok".to_string(),
            error_code: None,
            data: Some(data),
        }
    }

    pub fn error(code: i32, error_code: &str, msg: impl Into<String>, data: Option<T>) -> Self {
        Self {
            code,
            msg: msg.into(),
            error_code: Some(error_code.to_string()),
            data,
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: AccountStatus,
}

/// `ListTransactions` paging; absent values fall back to the defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub role: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_success_shape() {
        let json = serde_json::to_value(ApiResponse::success(5)).unwrap();
        assert_eq!(json["code"], 0);
        assert_eq!(json["msg"], "ok");
        assert_eq!(json["data"], 5);
        assert!(json.get("error_code").is_none());
    }

    #[test]
    fn test_envelope_error_shape() {
        let resp: ApiResponse<()> = ApiResponse::error(404, "NOT_FOUND", "missing", None);
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["code"], 404);
        assert_eq!(json["error_code"], "NOT_FOUND");
        assert!(json.get("data").is_none());
        assert!(!resp.is_success());
    }
}

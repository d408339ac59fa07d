//! NATS message types

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

/// Generic request wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request<T> {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub payload: T,
}

/// Generic success response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessResponse<T> {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub payload: T,
}

impl<T> SuccessResponse<T> {
    pub fn new(request_id: Uuid, payload: T) -> Self {
        Self {
            id: request_id,
            timestamp: Utc::now(),
            payload,
        }
    }
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(request_id: Uuid, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: request_id,
            timestamp: Utc::now(),
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
            },
        }
    }
}

/// Empty payload (`{}`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmptyPayload {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_parses_empty_payload() {
        let json = r#"{
            "id": "123e4567-e89b-12d3-a456-426614174000",
            "timestamp": "2026-03-02T10:00:00Z",
            "payload": {}
        }"#;
        let request: Request<EmptyPayload> = serde_json::from_str(json).unwrap();
        assert_eq!(request.id.to_string(), "123e4567-e89b-12d3-a456-426614174000");
    }

    #[test]
    fn test_error_response_shape() {
        let response = ErrorResponse::new(Uuid::nil(), "EMPTY_DATE_RANGE", "no business days");
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["error"]["code"], "EMPTY_DATE_RANGE");
        assert_eq!(value["error"]["message"], "no business days");
        assert_eq!(value["error"].as_object().map(|o| o.len()), Some(2));
    }
}

// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorCode {
    InvalidPayload,
    MissingField,
    Unauthorized,
    NotFound,
    Conflict,
    UpstreamUnavailable,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
    pub details: Value,
}

impl ApiError {
    #[must_use]
    pub fn new(code: ApiErrorCode, message: impl Into<String>, details: Value) -> Self {
        Self {
            code,
            message: message.into(),
            details,
        }
    }

    #[must_use]
    pub fn invalid_payload(field: &str, reason: &str) -> Self {
        Self::new(
            ApiErrorCode::InvalidPayload,
            format!("invalid payload field: {field}"),
            json!({"field": field, "reason": reason}),
        )
    }

    #[must_use]
    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ApiErrorCode::MissingField,
            format!("missing required field: {field}"),
            json!({"field": field}),
        )
    }

    #[must_use]
    pub fn unauthorized(reason: &str) -> Self {
        Self::new(
            ApiErrorCode::Unauthorized,
            "authorization required",
            json!({"reason": reason}),
        )
    }

    #[must_use]
    pub fn not_found(kind: &str, id: &str) -> Self {
        Self::new(
            ApiErrorCode::NotFound,
            format!("{kind} not found"),
            json!({"id": id}),
        )
    }

    #[must_use]
    pub fn conflict(kind: &str, id: &str) -> Self {
        Self::new(
            ApiErrorCode::Conflict,
            format!("{kind} already exists"),
            json!({"id": id}),
        )
    }

    #[must_use]
    pub fn upstream(message: &str, details: Value) -> Self {
        Self::new(ApiErrorCode::UpstreamUnavailable, message, details)
    }

    #[must_use]
    pub fn internal(message: &str) -> Self {
        Self::new(ApiErrorCode::Internal, message, json!({}))
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}

const _: fn() = || {
    fn assert_traits<T: serde::Serialize + for<'de> serde::Deserialize<'de>>() {}
    assert_traits::<ApiErrorCode>();
};

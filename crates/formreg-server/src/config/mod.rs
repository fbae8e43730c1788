// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

pub const CONFIG_SCHEMA_VERSION: &str = "1";

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub max_body_bytes: usize,
    pub max_upload_bytes: usize,
    pub request_timeout: Duration,
    pub slow_request_threshold: Duration,
    pub auth_required: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 256 * 1024,
            max_upload_bytes: 16 * 1024 * 1024,
            request_timeout: Duration::from_secs(10),
            slow_request_threshold: Duration::from_millis(500),
            auth_required: true,
        }
    }
}

pub fn validate_startup_config(
    api: &ApiConfig,
    pets: &crate::pets::PetsConfig,
) -> Result<(), String> {
    if api.max_body_bytes == 0 || api.max_upload_bytes == 0 {
        return Err("api size limits must be > 0".to_string());
    }
    if api.max_upload_bytes < api.max_body_bytes {
        return Err("upload limit must be >= body limit".to_string());
    }
    if api.request_timeout.is_zero() {
        return Err("request timeout must be > 0".to_string());
    }
    let base = pets.base_url.trim();
    if base.is_empty() {
        return Err("pets base url must not be empty".to_string());
    }
    if !base.starts_with("http://") && !base.starts_with("https://") {
        return Err("pets base url must be http(s)".to_string());
    }
    Ok(())
}

// SPDX-License-Identifier: Apache-2.0

//! Client for the external document-templating service (PETS). PETS stores
//! the binary office templates and renders them; the registry only keeps the
//! returned template UUIDs.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::instrument;

#[derive(Debug)]
pub struct PetsError {
    pub message: String,
    pub status: Option<u16>,
}

impl PetsError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
        }
    }

    fn with_status(message: impl Into<String>, status: u16) -> Self {
        Self {
            message: message.into(),
            status: Some(status),
        }
    }
}

impl std::fmt::Display for PetsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} (status={status})", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for PetsError {}

/// Binary document returned by PETS, with the content type it reported.
#[derive(Debug, Clone)]
pub struct PetsDocument {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff_ms: 120,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PetsConfig {
    pub base_url: String,
    pub auth_bearer: Option<String>,
    pub retry: RetryPolicy,
    pub request_timeout: Duration,
}

impl PetsConfig {
    #[must_use]
    pub fn new(base_url: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_bearer: None,
            retry: RetryPolicy::default(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[async_trait]
pub trait PetsBackend: Send + Sync + 'static {
    /// Store a template file; returns the UUID PETS assigned to it.
    async fn upload_template(
        &self,
        filename: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String, PetsError>;

    /// Fetch the raw template file back.
    async fn download_template(&self, template_uuid: &str) -> Result<PetsDocument, PetsError>;

    /// Render the template with the given data payload.
    async fn render(&self, template_uuid: &str, payload: Value) -> Result<PetsDocument, PetsError>;
}

/// Merge the fixed render options into the caller's data payload. PETS is
/// always asked for PDF output with overwrite enabled.
#[must_use]
pub fn render_payload(data: Value) -> Value {
    let mut payload = match data {
        Value::Object(map) => Value::Object(map),
        other => json!({ "data": other }),
    };
    payload["options"] = json!({"convertTo": "pdf", "overwrite": true});
    payload
}

pub struct HttpPetsBackend {
    cfg: PetsConfig,
}

impl HttpPetsBackend {
    #[must_use]
    pub fn new(cfg: PetsConfig) -> Self {
        Self { cfg }
    }

    fn client(&self) -> reqwest::Client {
        reqwest::Client::builder()
            .timeout(self.cfg.request_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap_or_else(|_| reqwest::Client::new())
    }

    fn template_url(&self, suffix: &str) -> String {
        format!("{}/api/v2/template{suffix}", self.cfg.base_url)
    }

    fn auth_headers(&self) -> Result<HeaderMap, PetsError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &self.cfg.auth_bearer {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| PetsError::new(format!("invalid auth header: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }
        Ok(headers)
    }

    #[instrument(name = "pets_get_with_retry", skip(self))]
    async fn get_with_retry(&self, url: &str) -> Result<PetsDocument, PetsError> {
        let client = self.client();
        let headers = self.auth_headers()?;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let req = client.get(url).headers(headers.clone());
            match req.send().await {
                Ok(resp) if resp.status().is_success() => {
                    let content_type = resp
                        .headers()
                        .get(CONTENT_TYPE)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("application/octet-stream")
                        .to_string();
                    let bytes = resp
                        .bytes()
                        .await
                        .map(|b| b.to_vec())
                        .map_err(|e| PetsError::new(format!("read body failed: {e}")))?;
                    return Ok(PetsDocument {
                        content_type,
                        bytes,
                    });
                }
                Ok(resp) => {
                    if attempt >= self.cfg.retry.max_attempts {
                        return Err(PetsError::with_status(
                            format!("pets download failed url={url}"),
                            resp.status().as_u16(),
                        ));
                    }
                }
                Err(e) => {
                    if attempt >= self.cfg.retry.max_attempts {
                        return Err(PetsError::new(format!("pets download failed url={url}: {e}")));
                    }
                }
            }
            tokio::time::sleep(Duration::from_millis(
                self.cfg.retry.base_backoff_ms.saturating_mul(attempt as u64),
            ))
            .await;
        }
    }
}

#[async_trait]
impl PetsBackend for HttpPetsBackend {
    // Uploads and renders are not idempotent on the PETS side, so both run
    // as single attempts; only downloads retry.
    #[instrument(name = "pets_upload_template", skip(self, bytes))]
    async fn upload_template(
        &self,
        filename: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String, PetsError> {
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str(content_type)
            .map_err(|e| PetsError::new(format!("invalid template content type: {e}")))?;
        let form = reqwest::multipart::Form::new().part("template", part);

        let resp = self
            .client()
            .post(self.template_url(""))
            .headers(self.auth_headers()?)
            .multipart(form)
            .send()
            .await
            .map_err(|e| PetsError::new(format!("pets upload failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(PetsError::with_status(
                "pets upload rejected",
                resp.status().as_u16(),
            ));
        }
        let uuid = resp
            .text()
            .await
            .map_err(|e| PetsError::new(format!("read upload response failed: {e}")))?
            .trim()
            .to_string();
        if uuid.is_empty() {
            return Err(PetsError::new("pets upload returned empty template uuid"));
        }
        Ok(uuid)
    }

    async fn download_template(&self, template_uuid: &str) -> Result<PetsDocument, PetsError> {
        let url = self.template_url(&format!("/{template_uuid}?download=true"));
        self.get_with_retry(&url).await
    }

    #[instrument(name = "pets_render", skip(self, payload))]
    async fn render(&self, template_uuid: &str, payload: Value) -> Result<PetsDocument, PetsError> {
        let url = self.template_url(&format!("/{template_uuid}/render"));
        let resp = self
            .client()
            .post(&url)
            .headers(self.auth_headers()?)
            .json(&payload)
            .send()
            .await
            .map_err(|e| PetsError::new(format!("pets render failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(PetsError::with_status(
                "pets render rejected",
                resp.status().as_u16(),
            ));
        }
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = resp
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| PetsError::new(format!("read render body failed: {e}")))?;
        Ok(PetsDocument {
            content_type,
            bytes,
        })
    }
}

pub mod fake {
    use super::{PetsBackend, PetsDocument, PetsError};
    use async_trait::async_trait;
    use serde_json::Value;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use tokio::sync::Mutex;

    /// In-memory PETS double for tests and local development.
    pub struct FakePets {
        pub templates: Mutex<HashMap<String, PetsDocument>>,
        pub render_calls: Mutex<Vec<(String, Value)>>,
        pub upload_seq: AtomicU64,
        pub fail_all: AtomicBool,
        /// Artificial per-call latency, for exercising timeout handling.
        pub delay_ms: AtomicU64,
    }

    impl Default for FakePets {
        fn default() -> Self {
            Self {
                templates: Mutex::new(HashMap::new()),
                render_calls: Mutex::new(Vec::new()),
                upload_seq: AtomicU64::new(1),
                fail_all: AtomicBool::new(false),
                delay_ms: AtomicU64::new(0),
            }
        }
    }

    impl FakePets {
        async fn check_outage(&self) -> Result<(), PetsError> {
            let delay_ms = self.delay_ms.load(Ordering::Relaxed);
            if delay_ms > 0 {
                tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
            }
            if self.fail_all.load(Ordering::Relaxed) {
                return Err(PetsError {
                    message: "pets outage (fake)".to_string(),
                    status: Some(503),
                });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl PetsBackend for FakePets {
        async fn upload_template(
            &self,
            _filename: &str,
            content_type: &str,
            bytes: Vec<u8>,
        ) -> Result<String, PetsError> {
            self.check_outage().await?;
            let seq = self.upload_seq.fetch_add(1, Ordering::Relaxed);
            let uuid = format!("fake-pets-{seq:04}");
            self.templates.lock().await.insert(
                uuid.clone(),
                PetsDocument {
                    content_type: content_type.to_string(),
                    bytes,
                },
            );
            Ok(uuid)
        }

        async fn download_template(&self, template_uuid: &str) -> Result<PetsDocument, PetsError> {
            self.check_outage().await?;
            self.templates
                .lock()
                .await
                .get(template_uuid)
                .cloned()
                .ok_or_else(|| PetsError {
                    message: format!("unknown template: {template_uuid}"),
                    status: Some(404),
                })
        }

        async fn render(
            &self,
            template_uuid: &str,
            payload: Value,
        ) -> Result<PetsDocument, PetsError> {
            self.check_outage().await?;
            if !self.templates.lock().await.contains_key(template_uuid) {
                return Err(PetsError {
                    message: format!("unknown template: {template_uuid}"),
                    status: Some(404),
                });
            }
            self.render_calls
                .lock()
                .await
                .push((template_uuid.to_string(), payload));
            Ok(PetsDocument {
                content_type: "application/pdf".to_string(),
                bytes: b"%PDF-1.7 fake".to_vec(),
            })
        }
    }
}

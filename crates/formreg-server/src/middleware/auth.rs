// SPDX-License-Identifier: Apache-2.0

//! Bearer-token gate for the `/api` surface. Tokens come from the SSO
//! collaborator; this layer only checks them through its introspection
//! contract and never inspects token contents itself.

use async_trait::async_trait;
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use serde::Deserialize;
use std::time::Duration;
use tracing::instrument;

#[derive(Debug)]
pub struct AuthError(pub String);

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for AuthError {}

#[async_trait]
pub trait TokenVerifier: Send + Sync + 'static {
    /// Ok(true) when the token is active, Ok(false) when it is rejected,
    /// Err when the verdict could not be obtained.
    async fn verify(&self, token: &str) -> Result<bool, AuthError>;
}

/// Extract the bearer token from an Authorization header, if present.
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let raw = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = raw.strip_prefix("Bearer ").or_else(|| raw.strip_prefix("bearer "))?;
    let token = token.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// Verifier backed by the SSO provider's token-introspection endpoint.
pub struct SsoTokenVerifier {
    introspection_url: String,
    client_credentials: Option<(String, String)>,
    request_timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct IntrospectionResponse {
    active: bool,
}

impl SsoTokenVerifier {
    #[must_use]
    pub fn new(
        introspection_url: String,
        client_credentials: Option<(String, String)>,
    ) -> Self {
        Self {
            introspection_url,
            client_credentials,
            request_timeout: Duration::from_secs(5),
        }
    }

    fn client(&self) -> reqwest::Client {
        reqwest::Client::builder()
            .timeout(self.request_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap_or_else(|_| reqwest::Client::new())
    }
}

#[async_trait]
impl TokenVerifier for SsoTokenVerifier {
    #[instrument(name = "sso_introspect", skip(self, token))]
    async fn verify(&self, token: &str) -> Result<bool, AuthError> {
        let mut req = self
            .client()
            .post(&self.introspection_url)
            .form(&[("token", token)]);
        if let Some((id, secret)) = &self.client_credentials {
            req = req.basic_auth(id, Some(secret));
        }
        let resp = req
            .send()
            .await
            .map_err(|e| AuthError(format!("sso introspection failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(AuthError(format!(
                "sso introspection returned status {}",
                resp.status()
            )));
        }
        let verdict: IntrospectionResponse = resp
            .json()
            .await
            .map_err(|e| AuthError(format!("sso introspection parse failed: {e}")))?;
        Ok(verdict.active)
    }
}

/// Allow-list verifier for tests and local development.
pub struct StaticTokenVerifier {
    allowed: Vec<String>,
}

impl StaticTokenVerifier {
    #[must_use]
    pub fn new(allowed: Vec<String>) -> Self {
        Self { allowed }
    }
}

#[async_trait]
impl TokenVerifier for StaticTokenVerifier {
    async fn verify(&self, token: &str) -> Result<bool, AuthError> {
        Ok(self.allowed.iter().any(|t| t == token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_token_extraction_handles_casing_and_blanks() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        assert_eq!(bearer_token(&headers), Some("abc123"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("bearer xyz"));
        assert_eq!(bearer_token(&headers), Some("xyz"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer   "));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcg=="));
        assert_eq!(bearer_token(&headers), None);
    }

    #[tokio::test]
    async fn static_verifier_matches_exact_tokens_only() {
        let verifier = StaticTokenVerifier::new(vec!["good".to_string()]);
        assert!(verifier.verify("good").await.expect("verdict"));
        assert!(!verifier.verify("good ").await.expect("verdict"));
        assert!(!verifier.verify("bad").await.expect("verdict"));
    }
}

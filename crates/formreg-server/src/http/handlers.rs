// SPDX-License-Identifier: Apache-2.0

use crate::middleware::auth::bearer_token;
use crate::pets::PetsDocument;
use crate::AppState;
use axum::body::Body;
use axum::extract::{FromRequest, Request, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use formreg_api::{map_error, ApiError};
use serde_json::json;
use std::sync::atomic::Ordering;
use std::time::Instant;
use tracing::warn;

pub(crate) fn api_error_response(err: ApiError) -> Response {
    let status = StatusCode::from_u16(map_error(&err).status_code)
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, axum::Json(json!({"error": err}))).into_response()
}

pub(crate) fn make_request_id(state: &AppState) -> String {
    let id = state.request_id_seed.fetch_add(1, Ordering::Relaxed);
    format!("req-{id:016x}")
}

pub(crate) fn propagated_request_id(headers: &HeaderMap, state: &AppState) -> String {
    if let Some(raw) = headers.get("x-request-id").and_then(|v| v.to_str().ok()) {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    make_request_id(state)
}

pub(crate) fn with_request_id(mut response: Response, request_id: &str) -> Response {
    if let Ok(v) = HeaderValue::from_str(request_id) {
        response.headers_mut().insert("x-request-id", v);
    }
    response
}

/// Request body extractor that keeps rejections inside the error envelope.
/// Malformed JSON or a body that fails the DTO's field rules answers 400
/// with an `invalid_payload` error instead of the framework default.
pub(crate) struct ApiJson<T>(pub T);

#[async_trait::async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: serde::de::DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        use axum::extract::rejection::JsonRejection;

        match axum::Json::<T>::from_request(req, state).await {
            Ok(axum::Json(value)) => Ok(Self(value)),
            Err(rejection) => {
                let status = match &rejection {
                    // Bad field values and broken JSON are both contract
                    // violations and answer 400; size and media-type
                    // rejections keep their own statuses.
                    JsonRejection::JsonDataError(_) | JsonRejection::JsonSyntaxError(_) => {
                        StatusCode::BAD_REQUEST
                    }
                    other => other.status(),
                };
                let err = ApiError::invalid_payload("body", &rejection.body_text());
                Err((status, axum::Json(json!({"error": err}))).into_response())
            }
        }
    }
}

/// Record the request outcome in the metrics, flag slow requests, and stamp
/// the response with the request id.
pub(crate) async fn observed(
    state: &AppState,
    route: &str,
    request_id: &str,
    started: Instant,
    resp: Response,
) -> Response {
    let status = resp.status();
    state
        .metrics
        .observe_request(route, status, started.elapsed())
        .await;
    if started.elapsed() > state.api.slow_request_threshold {
        warn!(request_id = %request_id, route, status = status.as_u16(), "slow request");
    }
    with_request_id(resp, request_id)
}

/// Gate for the `/api` surface. The gate is disabled when the config says
/// so or when no verifier is wired (local development); otherwise a valid
/// bearer token is required.
pub(crate) async fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    if !state.api.auth_required {
        return Ok(());
    }
    let Some(verifier) = &state.verifier else {
        return Ok(());
    };
    let token =
        bearer_token(headers).ok_or_else(|| ApiError::unauthorized("missing bearer token"))?;
    match verifier.verify(token).await {
        Ok(true) => Ok(()),
        Ok(false) => Err(ApiError::unauthorized("token rejected")),
        Err(e) => Err(ApiError::upstream(
            "token verification unavailable",
            json!({"message": e.to_string()}),
        )),
    }
}

/// File extension for the attachment filename, derived from the content
/// type PETS reported.
pub(crate) fn attachment_extension(content_type: &str) -> &'static str {
    if content_type.contains("opendocument") {
        "odt"
    } else if content_type.contains("wordprocessingml") {
        "docx"
    } else if content_type.contains("pdf") {
        "pdf"
    } else {
        "bin"
    }
}

/// Binary proxy response: pass the content type through and attach a
/// download filename keyed by the PETS template uuid.
pub(crate) fn document_response(doc: PetsDocument, filename_stem: &str) -> Response {
    let extension = attachment_extension(&doc.content_type);
    let mut response = Response::new(Body::from(doc.bytes));
    let content_type = HeaderValue::from_str(&doc.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    response.headers_mut().insert("content-type", content_type);
    if let Ok(disposition) = HeaderValue::from_str(&format!(
        "attachment; filename=\"{filename_stem}.{extension}\""
    )) {
        response
            .headers_mut()
            .insert("content-disposition", disposition);
    }
    response
}

pub(crate) async fn healthz_handler(State(state): State<AppState>) -> impl IntoResponse {
    let request_id = make_request_id(&state);
    let started = Instant::now();
    let resp = (StatusCode::OK, "ok").into_response();
    state
        .metrics
        .observe_request("/healthz", StatusCode::OK, started.elapsed())
        .await;
    with_request_id(resp, &request_id)
}

pub(crate) async fn readyz_handler(State(state): State<AppState>) -> impl IntoResponse {
    let request_id = make_request_id(&state);
    let started = Instant::now();
    let store_ok = state.registry.ping().await.is_ok();
    let (status, body) = if state.ready.load(Ordering::Relaxed) && store_ok {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not-ready")
    };
    let resp = (status, body).into_response();
    state
        .metrics
        .observe_request("/readyz", status, started.elapsed())
        .await;
    with_request_id(resp, &request_id)
}

pub(crate) async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    let body = state.metrics.render_text().await;
    let mut resp = (StatusCode::OK, body).into_response();
    resp.headers_mut().insert(
        "content-type",
        HeaderValue::from_static("text/plain; version=0.0.4"),
    );
    resp
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attachment_extension_follows_content_type_families() {
        assert_eq!(
            attachment_extension("application/vnd.oasis.opendocument.text"),
            "odt"
        );
        assert_eq!(
            attachment_extension(
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            ),
            "docx"
        );
        assert_eq!(attachment_extension("application/pdf"), "pdf");
        assert_eq!(attachment_extension("application/octet-stream"), "bin");
    }

    #[test]
    fn document_response_sets_disposition_from_stem() {
        let doc = PetsDocument {
            content_type: "application/pdf".to_string(),
            bytes: b"%PDF".to_vec(),
        };
        let resp = document_response(doc, "u-123");
        assert_eq!(
            resp.headers()
                .get("content-disposition")
                .and_then(|v| v.to_str().ok()),
            Some("attachment; filename=\"u-123.pdf\"")
        );
        assert_eq!(
            resp.headers()
                .get("content-type")
                .and_then(|v| v.to_str().ok()),
            Some("application/pdf")
        );
    }
}

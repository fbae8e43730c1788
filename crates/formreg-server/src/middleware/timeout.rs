// SPDX-License-Identifier: Apache-2.0

use crate::http::handlers::api_error_response;
use crate::AppState;
use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;
use formreg_api::ApiError;
use tracing::warn;

/// Caps end-to-end request handling at the configured timeout. A request
/// that overruns it is dropped and answered with the error envelope.
pub(crate) async fn request_timeout_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let route = request.uri().path().to_string();
    match tokio::time::timeout(state.api.request_timeout, next.run(request)).await {
        Ok(response) => response,
        Err(_) => {
            warn!(
                route = %route,
                timeout_ms = state.api.request_timeout.as_millis() as u64,
                "request timed out"
            );
            api_error_response(ApiError::internal("request timed out"))
        }
    }
}

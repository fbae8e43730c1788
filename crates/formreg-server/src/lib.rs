// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::Router;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

pub mod config;
mod http;
pub mod middleware;
pub mod pets;
pub mod store;

pub use config::{validate_startup_config, ApiConfig, CONFIG_SCHEMA_VERSION};
pub use middleware::auth::{
    bearer_token, AuthError, SsoTokenVerifier, StaticTokenVerifier, TokenVerifier,
};
pub use pets::fake::FakePets;
pub use pets::{
    render_payload, HttpPetsBackend, PetsBackend, PetsConfig, PetsDocument, PetsError, RetryPolicy,
};
pub use store::{Registry, StoreError};

pub const CRATE_NAME: &str = "formreg-server";

#[derive(Default)]
pub(crate) struct RequestMetrics {
    counts: Mutex<HashMap<(String, u16), u64>>,
    latency_ns: Mutex<HashMap<String, Vec<u64>>>,
}

impl RequestMetrics {
    pub(crate) async fn observe_request(&self, route: &str, status: StatusCode, latency: Duration) {
        let mut counts = self.counts.lock().await;
        *counts
            .entry((route.to_string(), status.as_u16()))
            .or_insert(0) += 1;
        drop(counts);
        let mut latency_map = self.latency_ns.lock().await;
        latency_map
            .entry(route.to_string())
            .or_insert_with(Vec::new)
            .push(latency.as_nanos() as u64);
    }

    pub(crate) async fn render_text(&self) -> String {
        let mut out = String::new();
        out.push_str("# TYPE formreg_requests_total counter\n");
        let counts = self.counts.lock().await;
        let mut count_rows: Vec<_> = counts.iter().collect();
        count_rows.sort_by(|a, b| a.0.cmp(b.0));
        for ((route, status), n) in count_rows {
            out.push_str(&format!(
                "formreg_requests_total{{route=\"{route}\",status=\"{status}\"}} {n}\n"
            ));
        }
        drop(counts);

        out.push_str("# TYPE formreg_request_latency_seconds gauge\n");
        let latency = self.latency_ns.lock().await;
        let mut routes: Vec<_> = latency.keys().cloned().collect();
        routes.sort();
        for route in routes {
            let mut samples = latency.get(&route).cloned().unwrap_or_default();
            if samples.is_empty() {
                continue;
            }
            samples.sort_unstable();
            for (label, q) in [("0.5", 0.50_f64), ("0.95", 0.95_f64)] {
                let idx = ((samples.len() as f64) * q).ceil() as usize;
                let value = samples[idx.saturating_sub(1).min(samples.len() - 1)];
                out.push_str(&format!(
                    "formreg_request_latency_seconds{{route=\"{route}\",quantile=\"{label}\"}} {:.9}\n",
                    value as f64 / 1e9
                ));
            }
        }
        out
    }
}

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub pets: Arc<dyn PetsBackend>,
    pub verifier: Option<Arc<dyn TokenVerifier>>,
    pub api: ApiConfig,
    pub ready: Arc<AtomicBool>,
    pub(crate) metrics: Arc<RequestMetrics>,
    pub(crate) request_id_seed: Arc<AtomicU64>,
}

impl AppState {
    #[must_use]
    pub fn new(
        registry: Arc<Registry>,
        pets: Arc<dyn PetsBackend>,
        verifier: Option<Arc<dyn TokenVerifier>>,
        api: ApiConfig,
    ) -> Self {
        Self {
            registry,
            pets,
            verifier,
            api,
            ready: Arc::new(AtomicBool::new(true)),
            metrics: Arc::new(RequestMetrics::default()),
            request_id_seed: Arc::new(AtomicU64::new(1)),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(http::handlers::healthz_handler))
        .route("/readyz", get(http::handlers::readyz_handler))
        .route("/metrics", get(http::handlers::metrics_handler))
        .route("/api/forms", post(http::forms::create_form_handler))
        .route("/api/forms/update", put(http::forms::update_deployment_handler))
        .route("/api/forms/:id", get(http::forms::form_by_id_handler))
        .route(
            "/api/forms/form_id/:form_id",
            get(http::forms::form_by_form_id_handler),
        )
        .route("/api/forms-list", get(http::forms::forms_list_handler))
        .route(
            "/api/pdf-templates-list",
            get(http::pdf::pdf_templates_list_handler),
        )
        // The upload route is the only one allowed to carry a full template
        // file; everything else stays under the JSON body limit.
        .route(
            "/api/pdf-templates",
            post(http::pdf::upload_pdf_template_handler)
                .layer(DefaultBodyLimit::max(state.api.max_upload_bytes)),
        )
        .route(
            "/api/template/:template_uuid",
            get(http::pdf::download_template_handler),
        )
        .route("/api/pdf-render/:id", post(http::pdf::render_pdf_handler))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::timeout::request_timeout_middleware,
        ))
        .layer(DefaultBodyLimit::max(state.api.max_body_bytes))
        .with_state(state)
}

// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

use formreg_server::{
    build_router, validate_startup_config, ApiConfig, AppState, HttpPetsBackend, PetsConfig,
    Registry, RetryPolicy, SsoTokenVerifier, StaticTokenVerifier, TokenVerifier,
};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn env_bool(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .and_then(|v| match v.as_str() {
            "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
            "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default)
}

fn env_duration_ms(name: &str, default_ms: u64) -> Duration {
    Duration::from_millis(env_u64(name, default_ms))
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if env_bool("FORMREG_LOG_JSON", true) {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

fn build_verifier() -> Result<Option<Arc<dyn TokenVerifier>>, String> {
    if env_bool("FORMREG_AUTH_DISABLED", false) {
        return Ok(None);
    }
    let static_tokens: Vec<String> = env::var("FORMREG_STATIC_TOKENS")
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect();
    if !static_tokens.is_empty() {
        return Ok(Some(Arc::new(StaticTokenVerifier::new(static_tokens))));
    }
    let introspection_url = env::var("FORMREG_SSO_INTROSPECTION_URL").map_err(|_| {
        "FORMREG_SSO_INTROSPECTION_URL is required unless auth is disabled or \
         FORMREG_STATIC_TOKENS is set"
            .to_string()
    })?;
    let credentials = match (
        env::var("FORMREG_SSO_CLIENT_ID").ok(),
        env::var("FORMREG_SSO_CLIENT_SECRET").ok(),
    ) {
        (Some(id), Some(secret)) => Some((id, secret)),
        _ => None,
    };
    Ok(Some(Arc::new(SsoTokenVerifier::new(
        introspection_url,
        credentials,
    ))))
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("register SIGTERM");
        let mut sigint = signal(SignalKind::interrupt()).expect("register SIGINT");
        tokio::select! {
            _ = sigterm.recv() => {}
            _ = sigint.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[tokio::main]
async fn main() -> Result<(), String> {
    init_tracing();

    let bind_addr = env::var("FORMREG_BIND").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let db_path = PathBuf::from(
        env::var("FORMREG_DB_PATH").unwrap_or_else(|_| "data/formreg.sqlite".to_string()),
    );

    let api_cfg = ApiConfig {
        max_body_bytes: env_usize("FORMREG_MAX_BODY_BYTES", 256 * 1024),
        max_upload_bytes: env_usize("FORMREG_MAX_UPLOAD_BYTES", 16 * 1024 * 1024),
        request_timeout: env_duration_ms("FORMREG_REQUEST_TIMEOUT_MS", 10_000),
        slow_request_threshold: env_duration_ms("FORMREG_SLOW_REQUEST_THRESHOLD_MS", 500),
        auth_required: !env_bool("FORMREG_AUTH_DISABLED", false),
    };

    let pets_cfg = PetsConfig {
        base_url: env::var("FORMREG_PETS_BASE_URL")
            .map_err(|_| "FORMREG_PETS_BASE_URL is required".to_string())?
            .trim_end_matches('/')
            .to_string(),
        auth_bearer: env::var("FORMREG_PETS_BEARER").ok(),
        retry: RetryPolicy {
            max_attempts: env_usize("FORMREG_PETS_RETRY_ATTEMPTS", 3),
            base_backoff_ms: env_u64("FORMREG_PETS_RETRY_BASE_MS", 120),
        },
        request_timeout: env_duration_ms("FORMREG_PETS_TIMEOUT_MS", 30_000),
    };
    validate_startup_config(&api_cfg, &pets_cfg)?;

    let registry =
        Arc::new(Registry::open(&db_path).map_err(|e| format!("registry open failed: {e}"))?);
    let pets = Arc::new(HttpPetsBackend::new(pets_cfg));
    let verifier = build_verifier()?;

    let state = AppState::new(registry, pets, verifier, api_cfg);
    let app = build_router(state);

    let addr: std::net::SocketAddr = bind_addr
        .parse()
        .map_err(|e| format!("invalid bind addr {bind_addr}: {e}"))?;
    let socket = if addr.is_ipv4() {
        tokio::net::TcpSocket::new_v4().map_err(|e| format!("socket v4 failed: {e}"))?
    } else {
        tokio::net::TcpSocket::new_v6().map_err(|e| format!("socket v6 failed: {e}"))?
    };
    socket
        .set_reuseaddr(true)
        .map_err(|e| format!("set_reuseaddr failed: {e}"))?;
    socket.bind(addr).map_err(|e| format!("bind failed: {e}"))?;
    let listener: TcpListener = socket
        .listen(1024)
        .map_err(|e| format!("listen failed: {e}"))?;
    info!("formreg-server listening on {bind_addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            wait_for_shutdown_signal().await;
            let drain_ms = env_u64("FORMREG_SHUTDOWN_DRAIN_MS", 3000);
            tokio::time::sleep(Duration::from_millis(drain_ms)).await;
        })
        .await
        .map_err(|e| format!("server failed: {e}"))
}

// SPDX-License-Identifier: Apache-2.0

// Each integration test binary compiles its own copy of this module and
// uses a different slice of it.
#![allow(dead_code)]

use formreg_server::{
    build_router, ApiConfig, AppState, FakePets, Registry, StaticTokenVerifier, TokenVerifier,
};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

pub const TEST_TOKEN: &str = "itest-token";

pub struct TestServer {
    pub addr: std::net::SocketAddr,
    pub pets: Arc<FakePets>,
    pub registry: Arc<Registry>,
    pub ready: Arc<AtomicBool>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }
}

pub async fn spawn_server() -> TestServer {
    spawn_server_with(ApiConfig::default(), true).await
}

pub async fn spawn_server_with_auth(auth: bool) -> TestServer {
    spawn_server_with(ApiConfig::default(), auth).await
}

pub async fn spawn_server_with(api: ApiConfig, auth: bool) -> TestServer {
    let registry = Arc::new(Registry::open_in_memory().expect("open registry"));
    let pets = Arc::new(FakePets::default());
    let verifier: Option<Arc<dyn TokenVerifier>> = if auth {
        Some(Arc::new(StaticTokenVerifier::new(vec![
            TEST_TOKEN.to_string()
        ])))
    } else {
        None
    };
    let state = AppState::new(Arc::clone(&registry), pets.clone(), verifier, api);
    let ready = Arc::clone(&state.ready);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve app");
    });

    TestServer {
        addr,
        pets,
        registry,
        ready,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .build()
        .expect("build http client")
}

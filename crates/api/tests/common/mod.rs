//! Shared fixtures for API integration tests.
//!
//! The app is built over in-memory stores, a stub generation backend and the
//! `sh` runtime, so no database, model provider or Python is needed.

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use scriptforge_api::config::ServerConfig;
use scriptforge_api::middleware::caller::CALLER_HEADER;
use scriptforge_api::router::build_app_router;
use scriptforge_api::state::AppState;
use scriptforge_core::prompt::PromptTemplates;
use scriptforge_core::script::{NewScript, Script};
use scriptforge_core::scripting::runtime::ScriptRuntime;
use scriptforge_core::store::memory::{MemoryExecutionStore, MemoryJobStore, MemoryScriptStore};
use scriptforge_llm::{BackendError, GenerationBackend, ModelGateway};
use scriptforge_pipeline::{ExecutionConfig, ExecutionEngine, JobProcessor};

/// Name of the stub backend registered in every test app.
pub const STUB_BACKEND: &str = "stub";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
    }
}

/// Backend that answers every prompt with a fixed script.
struct FixedBackend(&'static str);

#[async_trait]
impl GenerationBackend for FixedBackend {
    fn name(&self) -> &str {
        STUB_BACKEND
    }

    async fn generate(&self, _prompt: &str) -> Result<String, BackendError> {
        Ok(self.0.to_string())
    }
}

/// A running test application plus handles for seeding it.
pub struct TestApp {
    pub router: Router,
    pub scripts: Arc<MemoryScriptStore>,
    workspace_root: tempfile::TempDir,
}

impl TestApp {
    /// Seed a shell script that can then be executed through the API.
    pub async fn script(&self, source: &str) -> Script {
        self.scripts
            .insert(NewScript {
                name: "test".into(),
                source: source.into(),
                dependencies: Vec::new(),
                timeout_secs: None,
            })
            .await
    }

    pub fn app(&self) -> Router {
        self.router.clone()
    }
}

/// Build the full application router over in-memory stores.
pub fn build_test_app(generated: &'static str) -> TestApp {
    let config = test_config();
    let workspace_root = tempfile::tempdir().expect("workspace root");

    let scripts = Arc::new(MemoryScriptStore::new());
    let gateway = ModelGateway::new().with_backend(Arc::new(FixedBackend(generated)));
    let jobs = Arc::new(JobProcessor::new(
        Arc::new(MemoryJobStore::new()),
        gateway,
        PromptTemplates::default(),
        vec![STUB_BACKEND.to_string()],
    ));
    let engine = Arc::new(ExecutionEngine::with_runtime(
        scripts.clone(),
        Arc::new(MemoryExecutionStore::new()),
        ExecutionConfig {
            default_timeout_secs: 5,
            max_timeout_secs: 10,
            ..ExecutionConfig::default()
        },
        ScriptRuntime::shell().with_workspace_root(workspace_root.path()),
    ));

    let state = AppState {
        pool: None,
        config: Arc::new(config.clone()),
        jobs,
        engine,
    };

    TestApp {
        router: build_app_router(state, &config),
        scripts,
        workspace_root,
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

/// Send a request, optionally as `caller`, with an optional JSON body.
pub async fn send(
    app: Router,
    method: Method,
    uri: &str,
    caller: Option<i64>,
    body: Option<Value>,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(caller) = caller {
        builder = builder.header(CALLER_HEADER, caller.to_string());
    }
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    app.oneshot(builder.body(body).unwrap()).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, None, None).await
}

pub async fn get_as(app: Router, uri: &str, caller: i64) -> Response<Body> {
    send(app, Method::GET, uri, Some(caller), None).await
}

pub async fn post_json_as(app: Router, uri: &str, caller: i64, body: Value) -> Response<Body> {
    send(app, Method::POST, uri, Some(caller), Some(body)).await
}

/// POST a body that is sent byte-for-byte, labelled as JSON.
pub async fn post_raw_as(app: Router, uri: &str, caller: i64, body: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(CALLER_HEADER, caller.to_string())
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

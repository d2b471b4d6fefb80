#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use portal_api::auth::jwt::{generate_access_token, JwtConfig};
use portal_api::config::ServerConfig;
use portal_api::router::build_app_router;
use portal_api::state::AppState;
use portal_core::lifecycle::{LifecycleEvent, SubmissionContext};
use portal_core::roles::Role;
use portal_core::types::DbId;
use portal_events::{DispatchError, LifecycleNotifier};
use sqlx::PgPool;
use tower::ServiceExt;

pub const TEST_SECRET: &str = "test-secret-for-integration-tests";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:3001".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        jwt: JwtConfig {
            secret: TEST_SECRET.to_string(),
            access_token_expiry_mins: 15,
        },
    }
}

/// Records every notification instead of calling a webhook.
#[derive(Default)]
pub struct RecordingNotifier {
    pub calls: Mutex<Vec<(Vec<String>, LifecycleEvent)>>,
    pub fail: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.calls.lock().unwrap().iter().map(|(_, e)| *e).collect()
    }
}

#[async_trait]
impl LifecycleNotifier for RecordingNotifier {
    async fn notify(
        &self,
        workflow_ids: &[String],
        context: &SubmissionContext,
    ) -> Result<(), DispatchError> {
        self.calls
            .lock()
            .unwrap()
            .push((workflow_ids.to_vec(), context.event));
        if self.fail {
            return Err(DispatchError::Failed(workflow_ids.to_vec()));
        }
        Ok(())
    }
}

/// Build the full application router through the same builder `main.rs`
/// uses, so tests exercise the production middleware stack.
pub fn build_test_app(pool: PgPool) -> Router {
    build_test_app_with(pool, Arc::new(RecordingNotifier::default()))
}

pub fn build_test_app_with(pool: PgPool, notifier: Arc<RecordingNotifier>) -> Router {
    let config = test_config();
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        notifier,
    };
    build_app_router(state, &config)
}

/// A pool that never connects until first used; for requests rejected
/// before any query runs.
pub fn lazy_pool() -> PgPool {
    PgPool::connect_lazy("postgres://localhost/portal_test").unwrap()
}

pub fn token_for(user_id: DbId, role: Role) -> String {
    generate_access_token(
        user_id,
        &format!("{}@example.de", role.as_str()),
        "Erika Muster",
        role.as_str(),
        &test_config().jwt,
    )
    .unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header("Authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn send_json_auth(
    app: Router,
    method: Method,
    uri: &str,
    body: serde_json::Value,
    token: &str,
) -> Response<Body> {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("Authorization", format!("Bearer {token}"))
        .header("Content-Type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json_auth(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    token: &str,
) -> Response<Body> {
    send_json_auth(app, Method::POST, uri, body, token).await
}

pub async fn put_json_auth(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    token: &str,
) -> Response<Body> {
    send_json_auth(app, Method::PUT, uri, body, token).await
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

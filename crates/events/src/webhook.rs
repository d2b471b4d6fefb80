//! Webhook dispatch to the external automation engine (n8n).
//!
//! Each bound workflow is called with
//! `POST {N8N_URL}/webhook/{workflow_id}`, header `X-API-KEY` and body
//! `{"submissionContext": ...}`. Targets are called concurrently; every
//! attempt is bounded by the client timeout and a failed attempt is retried
//! exactly once.

use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use portal_core::error::CoreError;
use portal_core::lifecycle::SubmissionContext;
use serde_json::{json, Value};

/// Default timeout for a single webhook attempt.
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Pause before the single retry.
const RETRY_DELAY: Duration = Duration::from_millis(250);

/// Header carrying the shared secret.
pub const API_KEY_HEADER: &str = "X-API-KEY";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failure of a single webhook call.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    /// The underlying HTTP request failed (network, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The remote server returned a non-2xx status code.
    #[error("Webhook returned HTTP {0}")]
    HttpStatus(u16),
}

/// Failure of a dispatch as a whole.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Konfigurationsfehler: {0}")]
    Configuration(String),

    /// Ids of the external workflows that still failed after the retry.
    #[error("Benachrichtigung fehlgeschlagen für: {}", .0.join(", "))]
    Failed(Vec<String>),
}

impl From<DispatchError> for CoreError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Configuration(msg) => CoreError::Configuration(msg),
            other => CoreError::Internal(other.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Connection settings for the automation engine.
#[derive(Debug, Clone)]
pub struct N8nConfig {
    /// Base URL without trailing slash.
    pub base_url: String,
    pub api_key: String,
    pub timeout: Duration,
}

impl N8nConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Load from environment variables. Returns `None` if `N8N_URL` or
    /// `N8N_API_KEY` is unset, in which case any non-empty dispatch fails
    /// with a configuration error.
    ///
    /// | Env Var            | Required | Default |
    /// |--------------------|----------|---------|
    /// | `N8N_URL`          | yes      | --      |
    /// | `N8N_API_KEY`      | yes      | --      |
    /// | `N8N_TIMEOUT_SECS` | no       | `10`    |
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var("N8N_URL").ok().filter(|v| !v.is_empty())?;
        let api_key = std::env::var("N8N_API_KEY").ok().filter(|v| !v.is_empty())?;
        let timeout_secs = std::env::var("N8N_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        Some(Self::new(base_url, api_key).with_timeout(Duration::from_secs(timeout_secs)))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn webhook_url(&self, workflow_id: &str) -> String {
        format!("{}/webhook/{workflow_id}", self.base_url)
    }
}

// ---------------------------------------------------------------------------
// Notifier seam
// ---------------------------------------------------------------------------

/// Something that can notify external workflows about a lifecycle step.
#[async_trait]
pub trait LifecycleNotifier: Send + Sync {
    async fn notify(
        &self,
        workflow_ids: &[String],
        context: &SubmissionContext,
    ) -> Result<(), DispatchError>;
}

// ---------------------------------------------------------------------------
// WebhookDispatcher
// ---------------------------------------------------------------------------

pub struct WebhookDispatcher {
    client: reqwest::Client,
    config: Option<N8nConfig>,
}

impl WebhookDispatcher {
    /// Build a dispatcher. A missing config is only reported when a dispatch
    /// actually has targets.
    pub fn new(config: Option<N8nConfig>) -> Result<Self, DispatchError> {
        let timeout = config
            .as_ref()
            .map(|c| c.timeout)
            .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DispatchError::Configuration(format!("HTTP-Client: {e}")))?;
        Ok(Self { client, config })
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_some()
    }

    /// Call every target concurrently. All targets are attempted even if some
    /// fail; the error lists the ids that failed after their retry.
    pub async fn dispatch(
        &self,
        workflow_ids: &[String],
        context: &SubmissionContext,
    ) -> Result<(), DispatchError> {
        if workflow_ids.is_empty() {
            return Ok(());
        }
        let config = self.config.as_ref().ok_or_else(|| {
            DispatchError::Configuration("N8N_URL oder N8N_API_KEY ist nicht gesetzt".into())
        })?;

        let body = json!({ "submissionContext": context });
        let results = join_all(
            workflow_ids
                .iter()
                .map(|id| self.deliver(config, id, &body)),
        )
        .await;

        let failed: Vec<String> = workflow_ids
            .iter()
            .zip(results)
            .filter_map(|(id, result)| result.err().map(|_| id.clone()))
            .collect();

        if failed.is_empty() {
            tracing::debug!(
                event = %context.event,
                workflow_run_id = context.workflow_run_id,
                targets = workflow_ids.len(),
                "Webhooks dispatched"
            );
            Ok(())
        } else {
            Err(DispatchError::Failed(failed))
        }
    }

    /// One attempt plus one retry.
    async fn deliver(
        &self,
        config: &N8nConfig,
        workflow_id: &str,
        body: &Value,
    ) -> Result<(), WebhookError> {
        let url = config.webhook_url(workflow_id);
        match self.try_send(&url, &config.api_key, body).await {
            Ok(()) => Ok(()),
            Err(first) => {
                tracing::warn!(workflow_id, error = %first, "Webhook attempt failed, retrying");
                tokio::time::sleep(RETRY_DELAY).await;
                self.try_send(&url, &config.api_key, body)
                    .await
                    .inspect_err(|e| {
                        tracing::error!(workflow_id, error = %e, "Webhook failed after retry");
                    })
            }
        }
    }

    /// Execute a single POST request and check the response status.
    async fn try_send(&self, url: &str, api_key: &str, body: &Value) -> Result<(), WebhookError> {
        let response = self
            .client
            .post(url)
            .header(API_KEY_HEADER, api_key)
            .json(body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(WebhookError::HttpStatus(response.status().as_u16()));
        }
        Ok(())
    }
}

#[async_trait]
impl LifecycleNotifier for WebhookDispatcher {
    async fn notify(
        &self,
        workflow_ids: &[String],
        context: &SubmissionContext,
    ) -> Result<(), DispatchError> {
        self.dispatch(workflow_ids, context).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use portal_core::lifecycle::{LifecycleEvent, SubmissionUser};
    use portal_core::types::FormData;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn context() -> SubmissionContext {
        let mut data = FormData::new();
        data.insert("betrag".into(), json!(120));
        SubmissionContext {
            event: LifecycleEvent::Complete,
            workflow_id: 1,
            workflow_name: "Reisekosten".into(),
            workflow_run_id: 7,
            process_run_id: Some(9),
            process_name: Some("Antrag".into()),
            user: SubmissionUser {
                id: 3,
                email: "erika@example.de".into(),
                name: "Erika".into(),
            },
            data,
            message: None,
        }
    }

    fn dispatcher(server: &MockServer) -> WebhookDispatcher {
        let config = N8nConfig::new(format!("{}/", server.uri()), "geheim")
            .with_timeout(Duration::from_secs(2));
        WebhookDispatcher::new(Some(config)).unwrap()
    }

    #[tokio::test]
    async fn posts_context_with_api_key_to_every_target() {
        let server = MockServer::start().await;
        for id in ["a", "b"] {
            Mock::given(method("POST"))
                .and(path(format!("/webhook/{id}")))
                .and(header(API_KEY_HEADER, "geheim"))
                .respond_with(ResponseTemplate::new(200))
                .expect(1)
                .mount(&server)
                .await;
        }

        dispatcher(&server)
            .dispatch(&["a".into(), "b".into()], &context())
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        let body: Value = requests[0].body_json().unwrap();
        assert_eq!(body["submissionContext"]["workflowRunId"], 7);
        assert_eq!(body["submissionContext"]["event"], "complete");
        assert_eq!(body["submissionContext"]["data"]["betrag"], 120);
    }

    #[tokio::test]
    async fn failing_target_is_retried_once_and_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/webhook/kaputt"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/webhook/ok"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let err = dispatcher(&server)
            .dispatch(&["kaputt".into(), "ok".into()], &context())
            .await
            .unwrap_err();
        match err {
            DispatchError::Failed(ids) => assert_eq!(ids, vec!["kaputt".to_string()]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn empty_target_list_needs_no_config() {
        let dispatcher = WebhookDispatcher::new(None).unwrap();
        assert!(!dispatcher.is_configured());
        assert!(dispatcher.dispatch(&[], &context()).await.is_ok());
    }

    #[tokio::test]
    async fn missing_config_is_a_configuration_error() {
        let dispatcher = WebhookDispatcher::new(None).unwrap();
        let err = dispatcher
            .dispatch(&["a".into()], &context())
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("Konfigurationsfehler: "));
        assert!(matches!(CoreError::from(err), CoreError::Configuration(_)));
    }

    #[test]
    fn webhook_url_strips_trailing_slash() {
        let config = N8nConfig::new("http://n8n.local/", "k");
        assert_eq!(config.webhook_url("abc"), "http://n8n.local/webhook/abc");
    }

    #[test]
    fn webhook_error_display_http_status() {
        let err = WebhookError::HttpStatus(502);
        assert_eq!(err.to_string(), "Webhook returned HTTP 502");
    }
}

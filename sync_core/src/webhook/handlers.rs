//! The webhook receiver: a single endpoint that accepts a remote-side
//! change notification, authenticates it, rate-limits it by source IP,
//! resolves which module owns the affected remote model, and turns it into
//! a `pull` job on the queue. Mapping the notification body into the right
//! local entity is a per-domain transform and stays out of scope — this
//! only captures enough to enqueue work the matching `SyncModule` can
//! later act on.

use super::auth::authenticate;
use super::rate_limit::new_webhook_rate_limiter;
use crate::errors::SyncError;
use crate::module::ModuleRegistry;
use crate::queue::{EnqueueOutcome, NewJob, QueueRepository};
use crate::settings::SettingsStore;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_client_ip::SecureClientIp;
use entities::sea_orm_active_enums::{JobAction, JobDirection};
use rate_counter::RateCounter;
use serde::Deserialize;
use serde_json::json;
use std::net::IpAddr;
use std::sync::Arc;

pub struct WebhookState {
    pub queue: Arc<dyn QueueRepository>,
    pub modules: Arc<ModuleRegistry>,
    pub settings: Arc<dyn SettingsStore>,
    pub rate_limiter: Arc<RateCounter<IpAddr>>,
}

impl WebhookState {
    pub fn new(
        queue: Arc<dyn QueueRepository>,
        modules: Arc<ModuleRegistry>,
        settings: Arc<dyn SettingsStore>,
    ) -> Self {
        Self {
            queue,
            modules,
            settings,
            rate_limiter: new_webhook_rate_limiter(),
        }
    }
}

pub fn router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route("/webhook", post(receive))
        .route("/webhook/test", get(test))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    pub model: String,
    pub id: i64,
    pub action: String,
}

fn parse_action(action: &str) -> Result<JobAction, WebhookError> {
    match action {
        "create" => Ok(JobAction::Create),
        "update" => Ok(JobAction::Update),
        "delete" => Ok(JobAction::Delete),
        other => Err(WebhookError(SyncError::ValidationError(format!(
            "unrecognized webhook action: {other}"
        )))),
    }
}

struct WebhookError(SyncError);

impl From<SyncError> for WebhookError {
    fn from(err: SyncError) -> Self {
        Self(err)
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            SyncError::ValidationError(_) | SyncError::ConfigurationMissing(_) => StatusCode::BAD_REQUEST,
            SyncError::UnknownModule(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, self.0.to_string()).into_response()
    }
}

async fn test() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"status": "alive"})))
}

async fn receive(
    State(state): State<Arc<WebhookState>>,
    SecureClientIp(ip): SecureClientIp,
    headers: HeaderMap,
    Json(payload): Json<WebhookPayload>,
) -> Response {
    if !state.rate_limiter.try_acquire(&ip) {
        return StatusCode::TOO_MANY_REQUESTS.into_response();
    }

    let presented_token = headers.get("x-auth-token").and_then(|v| v.to_str().ok());

    // Auth failure never leaks detail into the body, and is reported as
    // 401 regardless of whether the token was missing or simply wrong.
    let tenant = match authenticate(state.settings.as_ref(), presented_token).await {
        Ok(tenant) => tenant,
        Err(_) => return StatusCode::UNAUTHORIZED.into_response(),
    };

    let action = match parse_action(&payload.action) {
        Ok(action) => action,
        Err(err) => return err.into_response(),
    };

    let Some(module) = state.modules.resolve_by_remote_model(&payload.model) else {
        tracing::debug!(model = payload.model.as_str(), "webhook model not owned by any module, ignoring");
        return StatusCode::NO_CONTENT.into_response();
    };

    let entity_type = module
        .remote_models()
        .iter()
        .find(|(_, remote_model)| **remote_model == payload.model)
        .map(|(entity_type, _)| entity_type.to_string())
        .unwrap_or_else(|| module.entity_type().to_string());

    let job = NewJob {
        tenant: tenant.as_str().to_string(),
        module: module.id().to_string(),
        entity_type,
        direction: JobDirection::Pull,
        action,
        local_id: None,
        remote_id: Some(payload.id),
        payload: serde_json::Value::Null,
        priority: 10,
        max_attempts: 5,
    };

    let outcome = match state.queue.enqueue(job).await {
        Ok(outcome) => outcome,
        Err(err) => return WebhookError(err).into_response(),
    };

    let job_id = match outcome {
        EnqueueOutcome::Inserted(id) => id,
        EnqueueOutcome::Deduplicated(id) => id,
    };

    (StatusCode::ACCEPTED, Json(json!({"job_id": job_id}))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_three_recognised_actions() {
        assert!(matches!(parse_action("create"), Ok(JobAction::Create)));
        assert!(matches!(parse_action("update"), Ok(JobAction::Update)));
        assert!(matches!(parse_action("delete"), Ok(JobAction::Delete)));
    }

    #[test]
    fn rejects_an_unrecognised_action() {
        assert!(parse_action("archive").is_err());
    }
}

//! Admin failure-threshold notifications: once a module's circuit breaker
//! opens for a tenant, page whoever owns the integration rather than
//! letting it fail silently until someone notices the queue backing up.

use crate::errors::SyncResult;
use async_trait::async_trait;
use pagerduty_rs::eventsv2::EventsV2;
use pagerduty_rs::types::{AlertTrigger, AlertTriggerPayload, Event, Severity};

#[async_trait]
pub trait AdminNotifier: Send + Sync {
    async fn notify_circuit_open(&self, tenant: &str, module: &str, reason: &str) -> SyncResult<()>;
}

pub struct PagerDutyNotifier {
    client: EventsV2,
}

impl PagerDutyNotifier {
    pub fn new(routing_key: String) -> anyhow::Result<Self> {
        Ok(Self {
            client: EventsV2::new(routing_key, Some("sync-core".to_string()))?,
        })
    }
}

#[async_trait]
impl AdminNotifier for PagerDutyNotifier {
    async fn notify_circuit_open(&self, tenant: &str, module: &str, reason: &str) -> SyncResult<()> {
        let event = Event::AlertTrigger(AlertTrigger {
            payload: AlertTriggerPayload {
                severity: Severity::Critical,
                summary: format!("sync circuit open for tenant={tenant} module={module}: {reason}"),
                source: "sync-core".to_string(),
                timestamp: None,
                component: Some(module.to_string()),
                group: Some(tenant.to_string()),
                class: Some("sync-circuit-breaker".to_string()),
                custom_details: None::<()>,
            },
            dedup_key: Some(format!("{tenant}:{module}:circuit-open")),
            images: None,
            links: None,
            client: None,
            client_url: None,
        });

        self.client
            .event(event)
            .await
            .map_err(|e| crate::errors::SyncError::Other(anyhow::anyhow!("pagerduty notification failed: {e}")))?;

        Ok(())
    }
}

/// No-op notifier for deployments without PagerDuty configured, and for
/// tests that don't want to exercise the real HTTP client.
pub struct NullNotifier;

#[async_trait]
impl AdminNotifier for NullNotifier {
    async fn notify_circuit_open(&self, _tenant: &str, _module: &str, _reason: &str) -> SyncResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_notifier_is_a_no_op() {
        let notifier = NullNotifier;
        notifier.notify_circuit_open("acme", "contacts", "threshold exceeded").await.unwrap();
    }
}

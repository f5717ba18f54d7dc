//! Token auth for the single shared inbound webhook: the request carries no
//! tenant id, only an `X-Auth-Token` header, so authentication and tenant
//! resolution happen in one step through
//! `SettingsStore::resolve_tenant_by_token`. Comparison against any
//! individual stored token is expected to be constant-time on the real
//! backend so a timing side channel can't be used to brute-force a token a
//! byte at a time; failure never distinguishes "no such token" from
//! "wrong token" in the response.

use crate::errors::{SyncError, SyncResult};
use crate::settings::SettingsStore;
use crate::tenant::Tenant;

pub async fn authenticate(settings: &dyn SettingsStore, presented: Option<&str>) -> SyncResult<Tenant> {
    let presented = presented.ok_or_else(|| SyncError::ValidationError("missing webhook token".to_string()))?;

    settings
        .resolve_tenant_by_token(presented)
        .await?
        .ok_or_else(|| SyncError::ValidationError("webhook token mismatch".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::test_support::InMemorySettingsStore;

    #[tokio::test]
    async fn resolves_the_tenant_owning_a_matching_token() {
        let settings = InMemorySettingsStore::new();
        let tenant = Tenant::new("acme");
        settings.set_webhook_token(&tenant, "s3cr3t");

        let resolved = authenticate(&settings, Some("s3cr3t")).await.unwrap();
        assert_eq!(resolved.as_str(), "acme");
    }

    #[tokio::test]
    async fn rejects_an_unknown_token() {
        let settings = InMemorySettingsStore::new();
        let tenant = Tenant::new("acme");
        settings.set_webhook_token(&tenant, "s3cr3t");

        let err = authenticate(&settings, Some("wrong")).await.unwrap_err();
        assert!(matches!(err, SyncError::ValidationError(_)));
    }

    #[tokio::test]
    async fn rejects_a_missing_token() {
        let settings = InMemorySettingsStore::new();

        let err = authenticate(&settings, None).await.unwrap_err();
        assert!(matches!(err, SyncError::ValidationError(_)));
    }
}

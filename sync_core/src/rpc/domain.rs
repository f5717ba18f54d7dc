//! `execute_kw`-style RPC over either JSON-RPC or XML-RPC, modeled on the
//! common/object split most ERP XML-RPC/JSON-RPC gateways expose: a
//! `common` service for `authenticate`, an `object` service for
//! `execute_kw`. Session (`uid`) is cached per tenant and re-acquired once,
//! transparently, on a `SessionError` — callers only ever see `call`.

use super::RpcClient;
use crate::context::Context;
use crate::crypto::store::DecryptedCredential;
use crate::errors::{SyncError, SyncResult};
use crate::transport::{json_rpc, xml_rpc, Transport};
use async_trait::async_trait;
use entities::sea_orm_active_enums::Protocol;
use latency::PeriodicLatency;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub struct DomainRpcClient {
    transport: Arc<dyn Transport>,
    sessions: Mutex<HashMap<String, i64>>,
    next_id: AtomicU64,
    latency: PeriodicLatency,
}

impl DomainRpcClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            sessions: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            latency: PeriodicLatency::new(),
        }
    }

    pub fn observed_latency(&self) -> Duration {
        self.latency.as_duration()
    }

    async fn authenticate(
        &self,
        credential: &DecryptedCredential,
        timeout: Duration,
    ) -> SyncResult<i64> {
        let args = json!([credential.database, credential.username, credential.api_key.as_str(), {}]);

        let result = self
            .dispatch(credential, "common", "authenticate", args, timeout)
            .await?;

        match result.as_i64() {
            Some(uid) if uid > 0 => Ok(uid),
            _ => Err(SyncError::SessionError(
                "authentication rejected by remote ERP".to_string(),
            )),
        }
    }

    async fn session_uid(
        &self,
        tenant_key: &str,
        credential: &DecryptedCredential,
        timeout: Duration,
    ) -> SyncResult<i64> {
        if let Some(uid) = self.sessions.lock().get(tenant_key).copied() {
            return Ok(uid);
        }

        let uid = self.authenticate(credential, timeout).await?;
        self.sessions.lock().insert(tenant_key.to_string(), uid);

        Ok(uid)
    }

    async fn dispatch(
        &self,
        credential: &DecryptedCredential,
        service: &str,
        method: &str,
        args: Value,
        timeout: Duration,
    ) -> SyncResult<Value> {
        let started = Instant::now();
        let result = match credential.protocol {
            Protocol::JsonRpc => self.dispatch_json(credential, service, method, args, timeout).await,
            Protocol::XmlRpc => self.dispatch_xml(credential, service, method, args, timeout).await,
        };
        self.latency.record(started.elapsed());
        result
    }

    async fn dispatch_json(
        &self,
        credential: &DecryptedCredential,
        service: &str,
        method: &str,
        args: Value,
        timeout: Duration,
    ) -> SyncResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let envelope = json!({"service": service, "method": method, "args": args});
        let body = json_rpc::encode_request(id, "call", envelope);

        let response = self
            .transport
            .post(&format!("{}/jsonrpc", credential.url), "application/json", body, timeout)
            .await?;

        json_rpc::decode_response(&response.body)
    }

    async fn dispatch_xml(
        &self,
        credential: &DecryptedCredential,
        service: &str,
        method: &str,
        args: Value,
        timeout: Duration,
    ) -> SyncResult<Value> {
        let params: Vec<Value> = args.as_array().cloned().unwrap_or_else(|| vec![args]);
        let body = xml_rpc::encode_call(method, &params);

        let response = self
            .transport
            .post(
                &format!("{}/xmlrpc/2/{service}", credential.url),
                "text/xml",
                body,
                timeout,
            )
            .await?;

        xml_rpc::decode_response(&response.body)
    }
}

#[async_trait]
impl RpcClient for DomainRpcClient {
    async fn call(
        &self,
        ctx: &Context,
        credential: &DecryptedCredential,
        model: &str,
        method: &str,
        args: Value,
        kwargs: Value,
    ) -> SyncResult<Value> {
        let timeout = Duration::from_secs(credential.timeout_seconds as u64);
        let tenant_key = ctx.tenant.as_str().to_string();

        let uid = self.session_uid(&tenant_key, credential, timeout).await?;

        let call_args = json!([
            credential.database,
            uid,
            credential.api_key.as_str(),
            model,
            method,
            args,
            kwargs,
        ]);

        let result = self
            .dispatch(credential, "object", "execute_kw", call_args, timeout)
            .await;

        // `create` is never retried automatically: a session expiry gives us
        // no way to tell a lost response apart from a duplicate remote
        // record, so we surface the session error instead of risking a
        // double-create.
        if method == "create" {
            return result;
        }

        match result {
            Err(SyncError::SessionError(_)) => {
                // Session recovery: drop the stale uid, re-authenticate once,
                // retry exactly once.
                self.sessions.lock().remove(&tenant_key);
                let uid = self.session_uid(&tenant_key, credential, timeout).await?;

                let retried_args = json!([
                    credential.database,
                    uid,
                    credential.api_key.as_str(),
                    model,
                    method,
                    args,
                    kwargs,
                ]);

                self.dispatch(credential, "object", "execute_kw", retried_args, timeout)
                    .await
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity_map::SeaOrmEntityMapRepository;
    use crate::tenant::Tenant;
    use crate::transport::RawResponse;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::sync::atomic::AtomicU32;

    struct ScriptedTransport {
        responses: Mutex<Vec<Result<RawResponse, SyncError>>>,
        calls: AtomicU32,
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn post(
            &self,
            _url: &str,
            _content_type: &str,
            _body: Vec<u8>,
            _timeout: Duration,
        ) -> SyncResult<RawResponse> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            self.responses.lock().remove(0)
        }
    }

    fn credential() -> DecryptedCredential {
        DecryptedCredential {
            url: "https://erp.example.com".to_string(),
            database: "acme_prod".to_string(),
            username: "sync-bot".to_string(),
            api_key: zeroize::Zeroizing::new("key".to_string()),
            protocol: Protocol::JsonRpc,
            timeout_seconds: 30,
        }
    }

    fn context() -> Context {
        let db = MockDatabase::new(DatabaseBackend::MySql).into_connection();
        let repo = Arc::new(SeaOrmEntityMapRepository::new(db));
        Context::new(Tenant::new("acme"), Duration::from_secs(30), repo)
    }

    fn json_response(value: Value) -> RawResponse {
        RawResponse {
            status: 200,
            body: serde_json::to_vec(&json!({"jsonrpc": "2.0", "id": 1, "result": value})).unwrap(),
        }
    }

    #[tokio::test]
    async fn authenticates_once_then_reuses_session() {
        let transport = Arc::new(ScriptedTransport {
            responses: Mutex::new(vec![
                Ok(json_response(json!(7))),
                Ok(json_response(json!({"id": 99}))),
                Ok(json_response(json!({"id": 100}))),
            ]),
            calls: AtomicU32::new(0),
        });

        let client = DomainRpcClient::new(transport.clone());
        let ctx = context();
        let cred = credential();

        let first = client
            .call(&ctx, &cred, "res.partner", "read", json!([[1]]), json!({}))
            .await
            .unwrap();
        assert_eq!(first["id"], 99);

        let second = client
            .call(&ctx, &cred, "res.partner", "read", json!([[2]]), json!({}))
            .await
            .unwrap();
        assert_eq!(second["id"], 100);

        // authenticate + read + read == 3 calls, not 4: session was reused.
        assert_eq!(transport.calls.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn session_error_triggers_single_reauthentication_retry() {
        let transport = Arc::new(ScriptedTransport {
            responses: Mutex::new(vec![
                Ok(json_response(json!(7))), // initial auth
                Err(SyncError::SessionError("expired".into())), // first execute_kw fails
                Ok(json_response(json!(7))), // re-auth
                Ok(json_response(json!({"id": 1}))), // retried execute_kw succeeds
            ]),
            calls: AtomicU32::new(0),
        });

        let client = DomainRpcClient::new(transport);
        let ctx = context();
        let cred = credential();

        let result = client
            .call(&ctx, &cred, "res.partner", "read", json!([[1]]), json!({}))
            .await
            .unwrap();

        assert_eq!(result["id"], 1);
    }

    #[tokio::test]
    async fn create_session_error_is_not_retried() {
        let transport = Arc::new(ScriptedTransport {
            responses: Mutex::new(vec![
                Ok(json_response(json!(7))), // initial auth
                Err(SyncError::SessionError("expired".into())), // execute_kw fails, create never retries
            ]),
            calls: AtomicU32::new(0),
        });

        let client = DomainRpcClient::new(transport.clone());
        let ctx = context();
        let cred = credential();

        let result = client
            .call(&ctx, &cred, "res.partner", "create", json!([{"name": "Acme"}]), json!({}))
            .await;

        assert!(matches!(result, Err(SyncError::SessionError(_))));
        // auth + one execute_kw attempt == 2 calls, no re-authentication or retry.
        assert_eq!(transport.calls.load(Ordering::Relaxed), 2);
    }
}

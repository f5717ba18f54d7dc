//! The protocol-abstracted RPC client: one `call` surface regardless of
//! whether the tenant's ERP speaks JSON-RPC or XML-RPC, with session
//! authentication and recovery handled in-band so callers above this layer
//! never see a `uid`/session token at all. The CRUD operations below are
//! default methods built on top of `call` — a module never has to hand-roll
//! an `execute_kw` envelope itself.

pub mod domain;
pub mod relation;
pub mod search_domain;

use crate::context::Context;
use crate::crypto::store::DecryptedCredential;
use crate::errors::{SyncError, SyncResult};
use async_trait::async_trait;
use serde_json::{json, Value};

pub use relation::{encode_many2one, encode_relation_commands, RelationCommand};
pub use search_domain::{encode_domain, Domain};

#[async_trait]
pub trait RpcClient: Send + Sync {
    /// Invokes `method` on `model` with positional `args` and keyword
    /// `kwargs`, authenticating (or re-authenticating, on session expiry)
    /// as needed. `args`/`kwargs` and the returned `Value` are the
    /// protocol-neutral payload shape — callers never see the
    /// `execute_kw`/session envelope underneath.
    async fn call(
        &self,
        ctx: &Context,
        credential: &DecryptedCredential,
        model: &str,
        method: &str,
        args: Value,
        kwargs: Value,
    ) -> SyncResult<Value>;

    async fn search(
        &self,
        ctx: &Context,
        credential: &DecryptedCredential,
        model: &str,
        domain: &Domain,
    ) -> SyncResult<Vec<i64>> {
        let result = self
            .call(ctx, credential, model, "search", json!([encode_domain(domain)]), json!({}))
            .await?;

        parse_ids(result)
    }

    async fn search_read(
        &self,
        ctx: &Context,
        credential: &DecryptedCredential,
        model: &str,
        domain: &Domain,
        fields: &[&str],
    ) -> SyncResult<Vec<Value>> {
        let result = self
            .call(
                ctx,
                credential,
                model,
                "search_read",
                json!([encode_domain(domain)]),
                json!({ "fields": fields }),
            )
            .await?;

        parse_records(result)
    }

    async fn read(
        &self,
        ctx: &Context,
        credential: &DecryptedCredential,
        model: &str,
        ids: &[i64],
        fields: &[&str],
    ) -> SyncResult<Vec<Value>> {
        let result = self
            .call(ctx, credential, model, "read", json!([ids]), json!({ "fields": fields }))
            .await?;

        parse_records(result)
    }

    async fn create(
        &self,
        ctx: &Context,
        credential: &DecryptedCredential,
        model: &str,
        values: Value,
    ) -> SyncResult<i64> {
        let result = self
            .call(ctx, credential, model, "create", json!([values]), json!({}))
            .await?;

        result
            .as_i64()
            .ok_or_else(|| SyncError::ProtocolFault("create did not return an id".to_string()))
    }

    async fn create_batch(
        &self,
        ctx: &Context,
        credential: &DecryptedCredential,
        model: &str,
        values: Vec<Value>,
    ) -> SyncResult<Vec<i64>> {
        let result = self
            .call(ctx, credential, model, "create", json!([values]), json!({}))
            .await?;

        parse_ids(result)
    }

    async fn write(
        &self,
        ctx: &Context,
        credential: &DecryptedCredential,
        model: &str,
        ids: &[i64],
        values: Value,
    ) -> SyncResult<bool> {
        let result = self
            .call(ctx, credential, model, "write", json!([ids, values]), json!({}))
            .await?;

        Ok(result.as_bool().unwrap_or(true))
    }

    async fn unlink(
        &self,
        ctx: &Context,
        credential: &DecryptedCredential,
        model: &str,
        ids: &[i64],
    ) -> SyncResult<bool> {
        let result = self
            .call(ctx, credential, model, "unlink", json!([ids]), json!({}))
            .await?;

        Ok(result.as_bool().unwrap_or(true))
    }

    async fn search_count(
        &self,
        ctx: &Context,
        credential: &DecryptedCredential,
        model: &str,
        domain: &Domain,
    ) -> SyncResult<i64> {
        let result = self
            .call(
                ctx,
                credential,
                model,
                "search_count",
                json!([encode_domain(domain)]),
                json!({}),
            )
            .await?;

        result
            .as_i64()
            .ok_or_else(|| SyncError::ProtocolFault("search_count did not return a number".to_string()))
    }

    async fn fields_get(
        &self,
        ctx: &Context,
        credential: &DecryptedCredential,
        model: &str,
    ) -> SyncResult<Value> {
        self.call(
            ctx,
            credential,
            model,
            "fields_get",
            json!([]),
            json!({ "attributes": ["string", "type", "required"] }),
        )
        .await
    }

    /// Escape hatch for a method the convenience surface above doesn't
    /// cover, with the same session handling as every other call.
    async fn execute(
        &self,
        ctx: &Context,
        credential: &DecryptedCredential,
        model: &str,
        method: &str,
        args: Value,
        kwargs: Value,
    ) -> SyncResult<Value> {
        self.call(ctx, credential, model, method, args, kwargs).await
    }
}

fn parse_ids(value: Value) -> SyncResult<Vec<i64>> {
    value
        .as_array()
        .map(|items| items.iter().filter_map(Value::as_i64).collect())
        .ok_or_else(|| SyncError::ProtocolFault("expected an array of ids".to_string()))
}

fn parse_records(value: Value) -> SyncResult<Vec<Value>> {
    value
        .as_array()
        .cloned()
        .ok_or_else(|| SyncError::ProtocolFault("expected an array of records".to_string()))
}

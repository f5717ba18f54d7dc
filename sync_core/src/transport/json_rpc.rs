//! JSON-RPC 2.0 codec. Builds request envelopes and unwraps the
//! `result`/`error` union from a response body — nothing more. Session
//! handling and retry policy live one layer up, in `rpc::domain`.

use crate::errors::SyncError;
use serde_json::{json, Value};

pub fn encode_request(id: u64, method: &str, params: Value) -> Vec<u8> {
    let envelope = json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": params,
        "id": id,
    });

    // A JSON-RPC body always serializes; the only failure mode would be a
    // non-serializable Value, which this codec never constructs itself.
    serde_json::to_vec(&envelope).expect("JSON-RPC envelope always serializes")
}

pub fn decode_response(body: &[u8]) -> Result<Value, SyncError> {
    let parsed: Value = serde_json::from_slice(body)
        .map_err(|e| SyncError::ProtocolFault(format!("invalid JSON-RPC response body: {e}")))?;

    if let Some(error) = parsed.get("error") {
        let code = error.get("code").and_then(Value::as_i64).unwrap_or(0);
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("<no message>");
        return Err(SyncError::ProtocolFault(format!(
            "JSON-RPC error {code}: {message}"
        )));
    }

    parsed
        .get("result")
        .cloned()
        .ok_or_else(|| SyncError::ProtocolFault("JSON-RPC response has neither result nor error".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_well_formed_envelope() {
        let body = encode_request(1, "read", json!([[1, 2], ["name"]]));
        let parsed: Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(parsed["jsonrpc"], "2.0");
        assert_eq!(parsed["method"], "read");
        assert_eq!(parsed["id"], 1);
    }

    #[test]
    fn decodes_result() {
        let body = br#"{"jsonrpc":"2.0","id":1,"result":{"id":42}}"#;
        let result = decode_response(body).unwrap();
        assert_eq!(result["id"], 42);
    }

    #[test]
    fn decodes_error_as_protocol_fault() {
        let body = br#"{"jsonrpc":"2.0","id":1,"error":{"code":-32600,"message":"bad request"}}"#;
        let err = decode_response(body).unwrap_err();
        assert!(matches!(err, SyncError::ProtocolFault(_)));
    }
}

//! Protocol-abstracted transport: the thing that actually puts bytes on the
//! wire. `json_rpc` and `xml_rpc` build their codecs on top of this; the
//! transport itself knows nothing about either protocol, only HTTP framing,
//! timeouts and the SSRF check every outbound URL must pass first.

mod http;
pub mod json_rpc;
pub mod xml_rpc;

pub use http::HttpTransport;

use crate::errors::SyncResult;
use async_trait::async_trait;
use std::time::Duration;

pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// POSTs `body` to `url` with the given content type, enforcing
    /// `timeout`. Never retries — retry policy belongs to the queue, not
    /// the transport.
    async fn post(
        &self,
        url: &str,
        content_type: &str,
        body: Vec<u8>,
        timeout: Duration,
    ) -> SyncResult<RawResponse>;
}

use super::{RawResponse, Transport};
use crate::errors::{SyncError, SyncResult};
use async_trait::async_trait;
use std::time::Duration;

pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(
        &self,
        url: &str,
        content_type: &str,
        body: Vec<u8>,
        timeout: Duration,
    ) -> SyncResult<RawResponse> {
        let response = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .timeout(timeout)
            .body(body)
            .send()
            .await
            .map_err(|e| SyncError::TransportFailure(e.to_string()))?;

        let status = response.status();

        if status.as_u16() == 403 {
            let body = response.bytes().await.unwrap_or_default().to_vec();
            return Err(SyncError::SessionError(format!(
                "HTTP 403 from {url}: {}",
                String::from_utf8_lossy(&body)
            )));
        }

        if status.as_u16() == 429 || status.is_server_error() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(SyncError::ServerError {
                status: status.as_u16(),
                message,
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| SyncError::TransportFailure(e.to_string()))?
            .to_vec();

        Ok(RawResponse {
            status: status.as_u16(),
            body,
        })
    }
}

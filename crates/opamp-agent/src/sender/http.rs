//! Transport round-tripper: one POST, retried until it yields a final outcome.
//!
//! Outcome per attempt:
//! - connect/IO failure: `on_connect_failed`, back off, retry
//! - 200: `on_connect`, return the body
//! - 429/503: back off (at least as long as `Retry-After` says), retry
//! - anything else: give up on this envelope
//!
//! Cancellation is checked at every suspension point (backoff sleep, request,
//! body read) and is never reported as a connect failure.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use opamp_core::error::{OpampError, Result};
use opamp_core::protocol::codec;
use opamp_core::protocol::AgentToServer;

use crate::callbacks::Callbacks;
use crate::sender::backoff::{apply_retry_hint, parse_retry_after, ExponentialBackoff};
use crate::settings::TlsSettings;

pub struct HttpSender {
    client: Client,
    url: String,
    header: HeaderMap,
    callbacks: Arc<dyn Callbacks>,
    backoff: ExponentialBackoff,
}

impl HttpSender {
    pub fn new(
        url: impl Into<String>,
        tls: Option<&TlsSettings>,
        callbacks: Arc<dyn Callbacks>,
        backoff: ExponentialBackoff,
    ) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(tls) = tls {
            if let Some(pem) = &tls.ca_cert_pem {
                let cert = reqwest::Certificate::from_pem(pem)
                    .map_err(|e| OpampError::Config(format!("invalid CA certificate: {e}")))?;
                builder = builder.add_root_certificate(cert);
            }
            builder = builder.danger_accept_invalid_certs(tls.accept_invalid_certs);
        }
        let client = builder
            .build()
            .map_err(|e| OpampError::Config(format!("failed to create HTTP client: {e}")))?;

        let mut sender = Self {
            client,
            url: url.into(),
            header: HeaderMap::new(),
            callbacks,
            backoff,
        };
        sender.set_request_header(HeaderMap::new());
        Ok(sender)
    }

    /// Replace the extra headers. The content type is always ours.
    pub fn set_request_header(&mut self, header: HeaderMap) {
        self.header = header;
        self.header
            .insert(CONTENT_TYPE, HeaderValue::from_static(codec::CONTENT_TYPE));
    }

    pub fn request_header(&self) -> &HeaderMap {
        &self.header
    }

    /// Send one envelope, retrying transient failures forever.
    ///
    /// `Ok(None)`: the envelope was empty, nothing went on the wire.
    pub async fn send_with_retries(
        &self,
        msg: &AgentToServer,
        cancel: &CancellationToken,
    ) -> Result<Option<Bytes>> {
        if msg.is_empty() {
            return Ok(None);
        }
        let body = codec::encode_agent_to_server(msg).map_err(|e| {
            error!(error = %e, "failed to prepare request, will not try anymore");
            e
        })?;

        let mut backoff = self.backoff.clone();
        backoff.reset();
        let mut interval = Duration::ZERO;
        let mut attempt: u32 = 0;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(stopped()),
                _ = tokio::time::sleep(interval) => {}
            }
            interval = backoff.next_backoff();
            attempt += 1;

            let request = self
                .client
                .post(&self.url)
                .headers(self.header.clone())
                .body(body.clone());
            let sent = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(stopped()),
                sent = request.send() => sent,
            };

            let err = match sent {
                Ok(resp) => match resp.status() {
                    StatusCode::OK => {
                        self.callbacks.on_connect().await;
                        let read = tokio::select! {
                            biased;
                            _ = cancel.cancelled() => return Err(stopped()),
                            read = resp.bytes() => read,
                        };
                        return read.map(Some).map_err(|e| {
                            error!(error = %e, "cannot read response body");
                            OpampError::Decoding(format!("cannot read response body: {e}"))
                        });
                    }
                    status @ (StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE) => {
                        let retry_after = retry_after_hint(resp.headers());
                        interval = apply_retry_hint(interval, retry_after);
                        OpampError::Backpressure {
                            status: status.as_u16(),
                            retry_after,
                        }
                    }
                    status => {
                        let err = OpampError::Protocol {
                            status: status.as_u16(),
                        };
                        error!(error = %err, attempt, "request rejected, will not try anymore");
                        return Err(err);
                    }
                },
                Err(e) => OpampError::Transport(e.to_string()),
            };

            warn!(
                error = %err,
                kind = err.kind().as_str(),
                attempt,
                retry_in_ms = interval.as_millis() as u64,
                "request failed, will retry"
            );
            self.callbacks.on_connect_failed(&err).await;
        }
    }
}

fn stopped() -> OpampError {
    debug!("client is stopped, will not try anymore");
    OpampError::Cancelled
}

fn retry_after_hint(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| parse_retry_after(v, chrono::Utc::now()))
}

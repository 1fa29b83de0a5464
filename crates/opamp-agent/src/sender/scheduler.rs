//! Scheduler: the per-channel run loop.
//!
//! ```text
//! Idle --(update pending)--------------> Sending --(any outcome)--> Idle
//! Idle --(polling deadline: no-op update)--> Idle (next turn sends)
//! Idle/Sending --(cancel)--> Stopped
//! ```
//!
//! Only this loop issues requests, and it awaits each round trip before
//! looking at the readiness signal again, so at most one request is in flight.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use opamp_core::error::OpampError;

use crate::dispatch::{ReceivedProcessor, SyncedState};
use crate::sender::http::HttpSender;
use crate::sender::next_message::NextMessage;

/// Polling interval shared between the loop and runtime setters.
///
/// Read once at the top of every loop iteration.
#[derive(Debug)]
pub struct PollingInterval {
    millis: AtomicU64,
}

impl PollingInterval {
    pub fn new(interval: Duration) -> Self {
        Self {
            millis: AtomicU64::new(to_millis(interval)),
        }
    }

    pub fn get(&self) -> Duration {
        Duration::from_millis(self.millis.load(Ordering::Relaxed))
    }

    /// Takes effect from the next polling cycle.
    pub fn set(&self, interval: Duration) {
        self.millis.store(to_millis(interval), Ordering::Relaxed);
    }
}

fn to_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX).max(1)
}

pub struct Scheduler {
    sender: HttpSender,
    next_message: Arc<NextMessage>,
    polling_interval: Arc<PollingInterval>,
    processor: ReceivedProcessor,
}

impl Scheduler {
    pub fn new(
        sender: HttpSender,
        next_message: Arc<NextMessage>,
        polling_interval: Arc<PollingInterval>,
        processor: ReceivedProcessor,
    ) -> Self {
        Self {
            sender,
            next_message,
            polling_interval,
            processor,
        }
    }

    /// Run until `cancel` fires, then hand back the synced state.
    ///
    /// Consumes the scheduler, so one channel cannot be run twice.
    pub async fn run(mut self, cancel: CancellationToken) -> SyncedState {
        let next_message = Arc::clone(&self.next_message);
        loop {
            let polling = self.polling_interval.get();
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = next_message.notified() => {
                    self.round_trip(&cancel).await;
                }
                _ = tokio::time::sleep(polling) => {
                    debug!(interval_ms = polling.as_millis() as u64, "polling interval elapsed, forcing status report");
                    // Leaves a permit behind: the next iteration takes the send path.
                    next_message.update(|_| {});
                }
            }
        }
        debug!("scheduler stopped");
        self.processor.into_synced_state()
    }

    async fn round_trip(&mut self, cancel: &CancellationToken) {
        let Some(msg) = self.next_message.pop_pending() else {
            return;
        };
        match self.sender.send_with_retries(&msg, cancel).await {
            Ok(Some(body)) => {
                self.next_message.mark_reported(&msg);
                self.processor.process_bytes(&body).await;
            }
            Ok(None) | Err(OpampError::Cancelled) => {}
            Err(e) => {
                error!(error = %e, kind = e.kind().as_str(), "round trip abandoned");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn polling_interval_round_trips_and_never_hits_zero() {
        let p = PollingInterval::new(Duration::from_secs(30));
        assert_eq!(p.get(), Duration::from_secs(30));
        p.set(Duration::from_millis(250));
        assert_eq!(p.get(), Duration::from_millis(250));
        p.set(Duration::ZERO);
        assert_eq!(p.get(), Duration::from_millis(1));
    }
}

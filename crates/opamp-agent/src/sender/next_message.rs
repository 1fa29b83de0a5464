//! Envelope accumulator + readiness signal.
//!
//! Callers merge field changes into one pending `AgentToServer`; the scheduler
//! pops it whole. Every `update` leaves one wakeup permit behind, and a burst
//! of updates before the pop collapses into that single permit.
//!
//! The lock is a plain mutex held only for the merge or the swap, never across
//! an `.await`, so `update` does not wait behind an in-flight send.

use parking_lot::Mutex;
use tokio::sync::Notify;

use opamp_core::protocol::AgentToServer;

#[derive(Debug, Default)]
struct Inner {
    msg: AgentToServer,
    has_update: bool,
    /// Status fields of everything the server accepted (for full-state reports).
    reported: AgentToServer,
}

/// The one outgoing envelope of a channel.
#[derive(Debug, Default)]
pub struct NextMessage {
    inner: Mutex<Inner>,
    pending: Notify,
}

impl NextMessage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a change into the pending envelope and wake the scheduler.
    ///
    /// A mutator that changes nothing still wakes the scheduler; that is how
    /// a heartbeat is forced.
    pub fn update<F>(&self, mutate: F)
    where
        F: FnOnce(&mut AgentToServer),
    {
        {
            let mut inner = self.inner.lock();
            mutate(&mut inner.msg);
            inner.has_update = true;
        }
        self.pending.notify_one();
    }

    /// Take the pending envelope, leaving a fresh one that keeps identity
    /// (`instance_uid`, `capabilities`).
    ///
    /// Returns `None` when nothing was updated since the last pop, or when the
    /// envelope equals the default message.
    pub fn pop_pending(&self) -> Option<AgentToServer> {
        let mut inner = self.inner.lock();
        if !inner.has_update {
            return None;
        }
        inner.has_update = false;

        let fresh = AgentToServer {
            instance_uid: inner.msg.instance_uid.clone(),
            capabilities: inner.msg.capabilities,
            ..Default::default()
        };
        let popped = std::mem::replace(&mut inner.msg, fresh);
        if popped.is_empty() {
            return None;
        }
        Some(popped)
    }

    /// Record the status fields of an envelope the server accepted (200).
    ///
    /// Envelopes abandoned on a fatal status never reach this, so a later
    /// full-state report does not resend what the server refused.
    pub fn mark_reported(&self, sent: &AgentToServer) {
        remember_status(&mut self.inner.lock().reported, sent);
    }

    /// Resolves once an update is pending. Consumes the permit.
    pub async fn notified(&self) {
        self.pending.notified().await
    }

    /// Queue every status field accepted so far (see `mark_reported`),
    /// without overwriting fields that already have a newer pending value.
    pub fn request_full_state(&self) {
        {
            let mut inner = self.inner.lock();
            let reported = inner.reported.clone();
            fill_missing_status(&mut inner.msg, reported);
            inner.has_update = true;
        }
        self.pending.notify_one();
    }

    pub fn instance_uid(&self) -> String {
        self.inner.lock().msg.instance_uid.clone()
    }

    /// Snapshot of the last reported status fields.
    pub fn reported(&self) -> AgentToServer {
        self.inner.lock().reported.clone()
    }
}

fn fill_missing_status(msg: &mut AgentToServer, reported: AgentToServer) {
    if msg.agent_description.is_none() {
        msg.agent_description = reported.agent_description;
    }
    if msg.health.is_none() {
        msg.health = reported.health;
    }
    if msg.effective_config.is_none() {
        msg.effective_config = reported.effective_config;
    }
    if msg.remote_config_status.is_none() {
        msg.remote_config_status = reported.remote_config_status;
    }
    if msg.package_statuses.is_none() {
        msg.package_statuses = reported.package_statuses;
    }
    if msg.connection_settings_status.is_none() {
        msg.connection_settings_status = reported.connection_settings_status;
    }
}

fn remember_status(reported: &mut AgentToServer, sent: &AgentToServer) {
    if sent.agent_description.is_some() {
        reported.agent_description = sent.agent_description.clone();
    }
    if sent.health.is_some() {
        reported.health = sent.health.clone();
    }
    if sent.effective_config.is_some() {
        reported.effective_config = sent.effective_config.clone();
    }
    if sent.remote_config_status.is_some() {
        reported.remote_config_status = sent.remote_config_status.clone();
    }
    if sent.package_statuses.is_some() {
        reported.package_statuses = sent.package_statuses.clone();
    }
    if sent.connection_settings_status.is_some() {
        reported.connection_settings_status = sent.connection_settings_status.clone();
    }
}

//! What this session has already told the server and applied from it.
//!
//! Owned by the scheduler task and mutated only by the response processor, so
//! it carries no lock. The embedder seeds it at start and gets it back from
//! `OpampClient::stop`.

use opamp_core::protocol::RemoteConfigStatus;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncedState {
    remote_config_status: Option<RemoteConfigStatus>,
    last_connection_settings_hash: Vec<u8>,
}

impl SyncedState {
    /// Seed from saved state. The status hash is recomputed from content.
    pub fn new(
        remote_config_status: Option<RemoteConfigStatus>,
        last_connection_settings_hash: Vec<u8>,
    ) -> Self {
        let mut state = Self {
            remote_config_status: None,
            last_connection_settings_hash,
        };
        if let Some(status) = remote_config_status {
            state.set_remote_config_status(status);
        }
        state
    }

    pub fn remote_config_status(&self) -> Option<&RemoteConfigStatus> {
        self.remote_config_status.as_ref()
    }

    /// Hash of the last remote config we tried to apply; empty if none.
    pub fn last_remote_config_hash(&self) -> &[u8] {
        self.remote_config_status
            .as_ref()
            .map(|s| s.last_remote_config_hash.as_slice())
            .unwrap_or_default()
    }

    pub fn last_connection_settings_hash(&self) -> &[u8] {
        &self.last_connection_settings_hash
    }

    pub(crate) fn set_remote_config_status(&mut self, mut status: RemoteConfigStatus) -> &RemoteConfigStatus {
        status.update_hash();
        self.remote_config_status.insert(status)
    }

    pub(crate) fn set_last_connection_settings_hash(&mut self, hash: Vec<u8>) {
        self.last_connection_settings_hash = hash;
    }
}

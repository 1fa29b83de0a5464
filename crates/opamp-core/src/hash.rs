//! Content hashes (SHA-256).
//!
//! Hashes are always recomputed locally from content. A hash that arrives from
//! outside (a caller-supplied status, a persisted snapshot) is overwritten.

use sha2::{Digest, Sha256};

use crate::protocol::{
    AgentConfigMap, AgentRemoteConfig, ConnectionSettingsOffers, RemoteConfigStatus,
};

/// Length-prefix each field so ("ab","c") and ("a","bc") hash differently.
fn feed(hasher: &mut Sha256, field: &[u8]) {
    hasher.update((field.len() as u64).to_le_bytes());
    hasher.update(field);
}

impl RemoteConfigStatus {
    pub fn compute_hash(&self) -> Vec<u8> {
        let mut h = Sha256::new();
        feed(&mut h, &self.last_remote_config_hash);
        feed(&mut h, self.status.as_str().as_bytes());
        feed(&mut h, self.error_message.as_bytes());
        h.finalize().to_vec()
    }

    /// Recompute `hash` from the other fields.
    pub fn update_hash(&mut self) {
        self.hash = self.compute_hash();
    }
}

impl AgentConfigMap {
    /// Hash of every file, in key order. Servers use this as `config_hash`.
    pub fn compute_hash(&self) -> Vec<u8> {
        let mut h = Sha256::new();
        for (name, file) in &self.config_map {
            feed(&mut h, name.as_bytes());
            feed(&mut h, file.content_type.as_bytes());
            feed(&mut h, &file.body);
        }
        h.finalize().to_vec()
    }
}

impl AgentRemoteConfig {
    /// `config_hash` when the server set one, else the hash of `config`.
    pub fn effective_hash(&self) -> Vec<u8> {
        if self.config_hash.is_empty() {
            self.config.compute_hash()
        } else {
            self.config_hash.clone()
        }
    }
}

impl ConnectionSettingsOffers {
    /// Used when the server leaves `hash` empty.
    pub fn compute_hash(&self) -> Vec<u8> {
        let mut h = Sha256::new();
        if let Some(opamp) = &self.opamp {
            feed(&mut h, opamp.destination_endpoint.as_bytes());
            for (name, value) in &opamp.headers {
                feed(&mut h, name.as_bytes());
                feed(&mut h, value.as_bytes());
            }
            feed(&mut h, &opamp.heartbeat_interval_seconds.to_le_bytes());
        }
        h.finalize().to_vec()
    }

    /// The server's hash when present, else one derived from content.
    pub fn effective_hash(&self) -> Vec<u8> {
        if self.hash.is_empty() {
            self.compute_hash()
        } else {
            self.hash.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{AgentConfigFile, RemoteConfigStatuses};

    fn status(err: &str) -> RemoteConfigStatus {
        RemoteConfigStatus {
            last_remote_config_hash: vec![1, 2, 3],
            status: RemoteConfigStatuses::Failed,
            error_message: err.into(),
            hash: vec![],
        }
    }

    #[test]
    fn status_hash_ignores_stale_hash_field() {
        let mut a = status("boom");
        let mut b = status("boom");
        b.hash = vec![0xff; 32];
        a.update_hash();
        b.update_hash();
        assert_eq!(a.hash, b.hash);
        assert_eq!(a.hash.len(), 32);
    }

    #[test]
    fn status_hash_tracks_content() {
        assert_ne!(status("boom").compute_hash(), status("bang").compute_hash());

        let mut applied = status("boom");
        applied.status = RemoteConfigStatuses::Applied;
        assert_ne!(applied.compute_hash(), status("boom").compute_hash());
    }

    #[test]
    fn config_map_hash_is_field_boundary_safe() {
        let mut a = AgentConfigMap::default();
        a.config_map.insert(
            "ab".into(),
            AgentConfigFile { body: b"c".to_vec(), content_type: String::new() },
        );
        let mut b = AgentConfigMap::default();
        b.config_map.insert(
            "a".into(),
            AgentConfigFile { body: b"bc".to_vec(), content_type: String::new() },
        );
        assert_ne!(a.compute_hash(), b.compute_hash());
    }

    #[test]
    fn empty_config_map_hash_is_sha256_of_nothing() {
        assert_eq!(
            hex::encode(AgentConfigMap::default().compute_hash()),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}

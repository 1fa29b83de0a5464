//! Response dispatcher: decode a reply and route each capability to its handler.
//!
//! Handlers compare the server's content hash against `SyncedState`; on a
//! change they apply through the embedder's callbacks, record the new hash and
//! queue an acknowledgement with `NextMessage::update`. The acknowledgement
//! goes out on the next scheduler iteration, never inside this round trip.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use opamp_core::protocol::codec::decode_server_to_agent;
use opamp_core::protocol::{
    AgentCapabilities, AgentRemoteConfig, AgentToServerFlags, ConnectionSettingsOffers,
    ConnectionSettingsStatus, ConnectionSettingsStatuses, PackageStatuses, PackagesAvailable,
    RemoteConfigStatus, RemoteConfigStatuses, ServerToAgent, ServerToAgentFlags,
};

use crate::callbacks::{Callbacks, Capability, PackagesStateProvider};
use crate::dispatch::SyncedState;
use crate::sender::next_message::NextMessage;
use crate::sender::scheduler::PollingInterval;

pub struct ReceivedProcessor {
    callbacks: Arc<dyn Callbacks>,
    next_message: Arc<NextMessage>,
    polling_interval: Arc<PollingInterval>,
    packages: Option<Arc<dyn PackagesStateProvider>>,
    capabilities: AgentCapabilities,
    synced: SyncedState,
}

impl ReceivedProcessor {
    pub fn new(
        callbacks: Arc<dyn Callbacks>,
        next_message: Arc<NextMessage>,
        polling_interval: Arc<PollingInterval>,
        packages: Option<Arc<dyn PackagesStateProvider>>,
        capabilities: AgentCapabilities,
        synced: SyncedState,
    ) -> Self {
        Self {
            callbacks,
            next_message,
            polling_interval,
            packages,
            capabilities,
            synced,
        }
    }

    pub fn synced_state(&self) -> &SyncedState {
        &self.synced
    }

    pub fn into_synced_state(self) -> SyncedState {
        self.synced
    }

    /// Decode and process a 200 body. Malformed bytes are logged and dropped:
    /// the request itself succeeded, so nothing is resent.
    pub async fn process_bytes(&mut self, body: &[u8]) {
        match decode_server_to_agent(body) {
            Ok(msg) => self.process(msg).await,
            Err(e) => error!(error = %e, len = body.len(), "cannot decode response, dropping"),
        }
    }

    pub async fn process(&mut self, msg: ServerToAgent) {
        if let Some(err) = &msg.error_response {
            warn!(kind = ?err.error_type, message = %err.error_message, "server returned an error response");
            self.callbacks.on_error(err).await;
        }

        if let Some(ident) = &msg.agent_identification {
            self.rcv_agent_identification(&ident.new_instance_uid).await;
        }

        if msg.flags.contains(ServerToAgentFlags::REPORT_FULL_STATE) {
            self.report_full_state().await;
        }

        if let Some(remote_config) = &msg.remote_config {
            if self.accepts(AgentCapabilities::ACCEPTS_REMOTE_CONFIG, "remote_config") {
                self.rcv_remote_config(remote_config).await;
            }
        }

        if let Some(offers) = &msg.connection_settings {
            if self.accepts(AgentCapabilities::ACCEPTS_OPAMP_CONNECTION_SETTINGS, "connection_settings") {
                self.rcv_connection_settings(offers).await;
            }
        }

        if let Some(available) = &msg.packages_available {
            if self.accepts(AgentCapabilities::ACCEPTS_PACKAGES, "packages_available") {
                self.rcv_packages_available(available).await;
            }
        }

        if let Some(command) = &msg.command {
            if self.accepts(AgentCapabilities::ACCEPTS_RESTART_COMMAND, "command") {
                info!(command = ?command.command_type, "server command received");
                self.callbacks.on_command(command).await;
                self.callbacks.on_message_applied(Capability::Command).await;
            }
        }

        if let Some(custom) = &msg.custom_message {
            self.callbacks.on_custom_message(custom).await;
            self.callbacks.on_message_applied(Capability::CustomMessage).await;
        }
    }

    fn accepts(&self, cap: AgentCapabilities, what: &'static str) -> bool {
        let ok = self.capabilities.contains(cap);
        if !ok {
            warn!(field = what, "ignoring offer for a capability this agent did not announce");
        }
        ok
    }

    async fn rcv_agent_identification(&mut self, new_uid: &str) {
        if new_uid.is_empty() {
            warn!("empty instance uid in agent identification, ignoring");
            return;
        }
        if new_uid == self.next_message.instance_uid() {
            return;
        }
        info!(instance_uid = %new_uid, "server assigned a new instance uid");
        let uid = new_uid.to_string();
        self.next_message.update(move |m| {
            m.instance_uid = uid;
            m.flags.remove(AgentToServerFlags::REQUEST_INSTANCE_UID);
        });
        self.callbacks.on_instance_uid(new_uid).await;
        self.callbacks
            .on_message_applied(Capability::AgentIdentification)
            .await;
    }

    async fn report_full_state(&mut self) {
        debug!("server requested full state");
        self.next_message.request_full_state();
        self.refresh_effective_config().await;
        self.callbacks.on_message_applied(Capability::FullState).await;
    }

    async fn refresh_effective_config(&self) {
        if !self
            .capabilities
            .contains(AgentCapabilities::REPORTS_EFFECTIVE_CONFIG)
        {
            return;
        }
        if let Some(effective) = self.callbacks.effective_config().await {
            self.next_message
                .update(move |m| m.effective_config = Some(effective));
        }
    }

    async fn rcv_remote_config(&mut self, remote: &AgentRemoteConfig) {
        let offered = remote.effective_hash();
        if offered.as_slice() == self.synced.last_remote_config_hash() {
            debug!("remote config unchanged");
            return;
        }

        let mut status = RemoteConfigStatus {
            last_remote_config_hash: offered,
            ..Default::default()
        };
        match self.callbacks.on_remote_config(&remote.config).await {
            Ok(()) => {
                info!(files = remote.config.config_map.len(), "remote config applied");
                status.status = RemoteConfigStatuses::Applied;
            }
            Err(e) => {
                error!(error = %e, "failed to apply remote config");
                status.status = RemoteConfigStatuses::Failed;
                status.error_message = e.to_string();
            }
        }
        let applied = status.status == RemoteConfigStatuses::Applied;

        let status = self.synced.set_remote_config_status(status).clone();
        self.callbacks.save_remote_config_status(&status).await;
        self.next_message
            .update(move |m| m.remote_config_status = Some(status));

        if applied {
            self.refresh_effective_config().await;
            self.callbacks
                .on_message_applied(Capability::RemoteConfig)
                .await;
        }
    }

    async fn rcv_connection_settings(&mut self, offers: &ConnectionSettingsOffers) {
        let hash = offers.effective_hash();
        if hash.as_slice() == self.synced.last_connection_settings_hash() {
            debug!("connection settings unchanged");
            return;
        }
        let Some(settings) = &offers.opamp else {
            self.synced.set_last_connection_settings_hash(hash);
            return;
        };

        let mut status = ConnectionSettingsStatus {
            last_connection_settings_hash: hash.clone(),
            ..Default::default()
        };
        match self.callbacks.on_connection_settings(settings).await {
            Ok(()) => {
                if settings.heartbeat_interval_seconds > 0 {
                    let interval = Duration::from_secs(settings.heartbeat_interval_seconds);
                    info!(interval_s = settings.heartbeat_interval_seconds, "polling interval changed by server");
                    self.polling_interval.set(interval);
                }
                status.status = ConnectionSettingsStatuses::Applied;
            }
            Err(e) => {
                error!(error = %e, "failed to apply connection settings");
                status.status = ConnectionSettingsStatuses::Failed;
                status.error_message = e.to_string();
            }
        }
        let applied = status.status == ConnectionSettingsStatuses::Applied;

        self.synced.set_last_connection_settings_hash(hash);
        self.next_message
            .update(move |m| m.connection_settings_status = Some(status));
        if applied {
            self.callbacks
                .on_message_applied(Capability::ConnectionSettings)
                .await;
        }
    }

    async fn rcv_packages_available(&mut self, available: &PackagesAvailable) {
        let Some(provider) = self.packages.clone() else {
            warn!("packages offered but no package state provider is configured");
            return;
        };

        let last = provider.last_reported_statuses().await;
        if last.as_ref().is_some_and(|s| {
            !available.all_packages_hash.is_empty()
                && s.server_provided_all_packages_hash == available.all_packages_hash
        }) {
            debug!("packages unchanged");
            return;
        }

        let (statuses, applied) = match provider.sync(available).await {
            Ok(statuses) => (statuses, true),
            Err(e) => {
                error!(error = %e, "package sync failed");
                let statuses = PackageStatuses {
                    server_provided_all_packages_hash: available.all_packages_hash.clone(),
                    error_message: e.to_string(),
                    ..last.unwrap_or_default()
                };
                (statuses, false)
            }
        };
        if self
            .capabilities
            .contains(AgentCapabilities::REPORTS_PACKAGE_STATUSES)
        {
            self.next_message
                .update(move |m| m.package_statuses = Some(statuses));
        }
        if applied {
            self.callbacks.on_message_applied(Capability::Packages).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use parking_lot::Mutex;

    use opamp_core::error::{OpampError, Result};
    use opamp_core::protocol::codec::encode_server_to_agent;
    use opamp_core::protocol::{
        AgentConfigFile, AgentConfigMap, AgentIdentification, EffectiveConfig,
        OpampConnectionSettings, PackageStatus, RemoteConfigStatus,
    };

    use super::*;

    #[derive(Default)]
    struct Recording {
        applied: Mutex<Vec<Capability>>,
        configs: Mutex<Vec<AgentConfigMap>>,
        saved: Mutex<Vec<RemoteConfigStatus>>,
        uids: Mutex<Vec<String>>,
        fail_config: bool,
    }

    #[async_trait]
    impl Callbacks for Recording {
        async fn on_remote_config(&self, config: &AgentConfigMap) -> Result<()> {
            self.configs.lock().push(config.clone());
            if self.fail_config {
                return Err(OpampError::Config("bad pipeline".into()));
            }
            Ok(())
        }

        async fn save_remote_config_status(&self, status: &RemoteConfigStatus) {
            self.saved.lock().push(status.clone());
        }

        async fn effective_config(&self) -> Option<EffectiveConfig> {
            self.configs
                .lock()
                .last()
                .cloned()
                .map(|config_map| EffectiveConfig { config_map })
        }

        async fn on_instance_uid(&self, uid: &str) {
            self.uids.lock().push(uid.to_string());
        }

        async fn on_message_applied(&self, capability: Capability) {
            self.applied.lock().push(capability);
        }
    }

    struct Packages {
        reported: Mutex<Option<PackageStatuses>>,
        syncs: Mutex<u32>,
    }

    #[async_trait]
    impl PackagesStateProvider for Packages {
        async fn last_reported_statuses(&self) -> Option<PackageStatuses> {
            self.reported.lock().clone()
        }

        async fn sync(&self, available: &PackagesAvailable) -> Result<PackageStatuses> {
            *self.syncs.lock() += 1;
            let statuses = PackageStatuses {
                packages: available
                    .packages
                    .keys()
                    .map(|name| {
                        (
                            name.clone(),
                            PackageStatus {
                                name: name.clone(),
                                ..Default::default()
                            },
                        )
                    })
                    .collect(),
                server_provided_all_packages_hash: available.all_packages_hash.clone(),
                error_message: String::new(),
            };
            *self.reported.lock() = Some(statuses.clone());
            Ok(statuses)
        }
    }

    struct Harness {
        callbacks: Arc<Recording>,
        next: Arc<NextMessage>,
        polling: Arc<PollingInterval>,
        processor: ReceivedProcessor,
    }

    fn harness(callbacks: Recording, capabilities: AgentCapabilities) -> Harness {
        harness_with_packages(callbacks, capabilities, None)
    }

    fn harness_with_packages(
        callbacks: Recording,
        capabilities: AgentCapabilities,
        packages: Option<Arc<dyn PackagesStateProvider>>,
    ) -> Harness {
        let callbacks = Arc::new(callbacks);
        let next = Arc::new(NextMessage::new());
        next.update(|m| {
            m.instance_uid = "agent-1".into();
            m.capabilities = capabilities;
        });
        next.pop_pending();
        let polling = Arc::new(PollingInterval::new(Duration::from_secs(30)));
        let processor = ReceivedProcessor::new(
            callbacks.clone(),
            Arc::clone(&next),
            Arc::clone(&polling),
            packages,
            capabilities,
            SyncedState::default(),
        );
        Harness {
            callbacks,
            next,
            polling,
            processor,
        }
    }

    fn remote_config(body: &str) -> AgentRemoteConfig {
        let mut config = AgentConfigMap::default();
        config.config_map.insert(
            "collector.yaml".into(),
            AgentConfigFile {
                body: body.as_bytes().to_vec(),
                content_type: "text/yaml".into(),
            },
        );
        AgentRemoteConfig {
            config,
            config_hash: Vec::new(),
        }
    }

    fn config_caps() -> AgentCapabilities {
        AgentCapabilities::REPORTS_STATUS
            | AgentCapabilities::ACCEPTS_REMOTE_CONFIG
            | AgentCapabilities::REPORTS_EFFECTIVE_CONFIG
            | AgentCapabilities::REPORTS_REMOTE_CONFIG
    }

    #[tokio::test]
    async fn remote_config_is_applied_once_per_hash() {
        let mut h = harness(Recording::default(), config_caps());
        let reply = ServerToAgent {
            remote_config: Some(remote_config("receivers: {}")),
            ..Default::default()
        };

        h.processor.process(reply.clone()).await;
        let ack = h.next.pop_pending().expect("ack queued");
        let status = ack.remote_config_status.expect("status");
        assert_eq!(status.status, RemoteConfigStatuses::Applied);
        assert_eq!(
            status.last_remote_config_hash,
            remote_config("receivers: {}").effective_hash()
        );
        assert_eq!(status.hash, status.compute_hash());
        assert!(ack.effective_config.is_some(), "effective config follows the apply");
        assert_eq!(*h.callbacks.applied.lock(), vec![Capability::RemoteConfig]);
        assert_eq!(h.callbacks.saved.lock().len(), 1);

        h.processor.process(reply).await;
        assert!(h.next.pop_pending().is_none(), "same hash is not re-applied");
        assert_eq!(h.callbacks.configs.lock().len(), 1);
    }

    #[tokio::test]
    async fn failed_apply_is_reported_and_not_retried() {
        let recording = Recording {
            fail_config: true,
            ..Default::default()
        };
        let mut h = harness(recording, config_caps());
        let reply = ServerToAgent {
            remote_config: Some(remote_config("broken")),
            ..Default::default()
        };

        h.processor.process(reply.clone()).await;
        let status = h
            .next
            .pop_pending()
            .and_then(|m| m.remote_config_status)
            .expect("status");
        assert_eq!(status.status, RemoteConfigStatuses::Failed);
        assert!(status.error_message.contains("bad pipeline"));
        assert!(h.callbacks.applied.lock().is_empty());
        assert_eq!(
            h.processor.synced_state().remote_config_status(),
            Some(&status)
        );

        h.processor.process(reply).await;
        assert_eq!(h.callbacks.configs.lock().len(), 1);
    }

    #[tokio::test]
    async fn offer_for_undeclared_capability_is_ignored() {
        let mut h = harness(Recording::default(), AgentCapabilities::REPORTS_STATUS);
        h.processor
            .process(ServerToAgent {
                remote_config: Some(remote_config("receivers: {}")),
                ..Default::default()
            })
            .await;

        assert!(h.callbacks.configs.lock().is_empty());
        assert!(h.next.pop_pending().is_none());
    }

    #[tokio::test]
    async fn connection_settings_change_the_polling_interval() {
        let caps = AgentCapabilities::REPORTS_STATUS
            | AgentCapabilities::ACCEPTS_OPAMP_CONNECTION_SETTINGS;
        let mut h = harness(Recording::default(), caps);
        let offers = ConnectionSettingsOffers {
            hash: b"v1".to_vec(),
            opamp: Some(OpampConnectionSettings {
                heartbeat_interval_seconds: 7,
                ..Default::default()
            }),
        };
        h.processor
            .process(ServerToAgent {
                connection_settings: Some(offers.clone()),
                ..Default::default()
            })
            .await;

        assert_eq!(h.polling.get(), Duration::from_secs(7));
        assert_eq!(h.processor.synced_state().last_connection_settings_hash(), b"v1");
        let status = h
            .next
            .pop_pending()
            .and_then(|m| m.connection_settings_status)
            .expect("status");
        assert_eq!(status.status, ConnectionSettingsStatuses::Applied);

        h.polling.set(Duration::from_secs(30));
        h.processor
            .process(ServerToAgent {
                connection_settings: Some(offers),
                ..Default::default()
            })
            .await;
        assert_eq!(h.polling.get(), Duration::from_secs(30), "same hash is a no-op");
    }

    #[tokio::test]
    async fn server_assigned_uid_replaces_ours() {
        let mut h = harness(Recording::default(), AgentCapabilities::REPORTS_STATUS);
        h.next
            .update(|m| m.flags.insert(AgentToServerFlags::REQUEST_INSTANCE_UID));
        h.next.pop_pending();

        h.processor
            .process(ServerToAgent {
                agent_identification: Some(AgentIdentification {
                    new_instance_uid: "agent-2".into(),
                }),
                ..Default::default()
            })
            .await;

        assert_eq!(h.next.instance_uid(), "agent-2");
        assert_eq!(*h.callbacks.uids.lock(), vec!["agent-2".to_string()]);
        let msg = h.next.pop_pending().expect("queued");
        assert!(!msg.flags.contains(AgentToServerFlags::REQUEST_INSTANCE_UID));
    }

    #[tokio::test]
    async fn full_state_request_requeues_reported_status() {
        let mut h = harness(Recording::default(), config_caps());
        h.processor
            .process(ServerToAgent {
                remote_config: Some(remote_config("a: 1")),
                ..Default::default()
            })
            .await;
        let first = h.next.pop_pending().expect("ack");
        h.next.mark_reported(&first);

        h.processor
            .process(ServerToAgent {
                flags: ServerToAgentFlags::REPORT_FULL_STATE,
                ..Default::default()
            })
            .await;
        let full = h.next.pop_pending().expect("full state");
        assert_eq!(full.remote_config_status, first.remote_config_status);
        assert_eq!(full.effective_config, first.effective_config);
        assert!(h.callbacks.applied.lock().contains(&Capability::FullState));
    }

    #[tokio::test]
    async fn packages_sync_once_per_all_packages_hash() {
        let provider = Arc::new(Packages {
            reported: Mutex::new(None),
            syncs: Mutex::new(0),
        });
        let caps = AgentCapabilities::REPORTS_STATUS
            | AgentCapabilities::ACCEPTS_PACKAGES
            | AgentCapabilities::REPORTS_PACKAGE_STATUSES;
        let mut h = harness_with_packages(Recording::default(), caps, Some(provider.clone()));

        let mut available = PackagesAvailable {
            all_packages_hash: b"all-1".to_vec(),
            ..Default::default()
        };
        available
            .packages
            .insert("otelcol".into(), Default::default());
        let reply = ServerToAgent {
            packages_available: Some(available),
            ..Default::default()
        };

        h.processor.process(reply.clone()).await;
        let statuses = h
            .next
            .pop_pending()
            .and_then(|m| m.package_statuses)
            .expect("statuses");
        assert!(statuses.packages.contains_key("otelcol"));
        assert_eq!(statuses.server_provided_all_packages_hash, b"all-1");

        h.processor.process(reply).await;
        assert_eq!(*provider.syncs.lock(), 1);
        assert_eq!(*h.callbacks.applied.lock(), vec![Capability::Packages]);
    }

    #[tokio::test]
    async fn undecodable_body_changes_nothing() {
        let mut h = harness(Recording::default(), config_caps());
        h.processor.process_bytes(b"\xff\x00garbage").await;
        assert!(h.next.pop_pending().is_none());

        let body = encode_server_to_agent(&ServerToAgent {
            remote_config: Some(remote_config("ok")),
            ..Default::default()
        })
        .expect("encode");
        h.processor.process_bytes(&body).await;
        assert!(h.next.pop_pending().is_some());
    }
}

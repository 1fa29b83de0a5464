//! Embedder-facing hooks.
//!
//! Every callback runs inline on the scheduler task, so an implementation that
//! blocks stalls the whole channel. Long work belongs on a spawned task.

use async_trait::async_trait;

use opamp_core::error::{OpampError, Result};
use opamp_core::protocol::{
    AgentConfigMap, CustomMessage, EffectiveConfig, OpampConnectionSettings, PackageStatuses,
    PackagesAvailable, RemoteConfigStatus, ServerErrorResponse, ServerToAgentCommand,
};

/// Category of server-driven update, reported through `on_message_applied`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    RemoteConfig,
    ConnectionSettings,
    Packages,
    AgentIdentification,
    Command,
    CustomMessage,
    FullState,
}

impl Capability {
    pub fn as_str(self) -> &'static str {
        match self {
            Capability::RemoteConfig => "remote_config",
            Capability::ConnectionSettings => "connection_settings",
            Capability::Packages => "packages",
            Capability::AgentIdentification => "agent_identification",
            Capability::Command => "command",
            Capability::CustomMessage => "custom_message",
            Capability::FullState => "full_state",
        }
    }
}

/// Hooks invoked by the round-tripper and the response dispatcher.
///
/// All methods have no-op defaults.
#[async_trait]
pub trait Callbacks: Send + Sync {
    /// A request got a 200 reply.
    async fn on_connect(&self) {}

    /// One attempt failed and will be retried.
    async fn on_connect_failed(&self, _err: &OpampError) {}

    /// The server put an error response in its reply.
    async fn on_error(&self, _err: &ServerErrorResponse) {}

    /// Apply a new remote config. `Err` is reported back as a failed status.
    async fn on_remote_config(&self, _config: &AgentConfigMap) -> Result<()> {
        Ok(())
    }

    /// Persist the status so a restart does not re-announce it.
    async fn save_remote_config_status(&self, _status: &RemoteConfigStatus) {}

    /// Apply new connection settings for the OpAMP channel itself.
    async fn on_connection_settings(&self, _settings: &OpampConnectionSettings) -> Result<()> {
        Ok(())
    }

    /// Current effective config, asked for after a config change or when the
    /// server wants a full report.
    async fn effective_config(&self) -> Option<EffectiveConfig> {
        None
    }

    async fn on_command(&self, _command: &ServerToAgentCommand) {}

    async fn on_custom_message(&self, _msg: &CustomMessage) {}

    async fn on_instance_uid(&self, _uid: &str) {}

    /// A capability's update was applied and an acknowledgement queued.
    async fn on_message_applied(&self, _capability: Capability) {}
}

/// Callbacks that do nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCallbacks;

#[async_trait]
impl Callbacks for NoopCallbacks {}

/// Local package state and the installer behind it.
///
/// When none is configured, package capabilities are switched off.
#[async_trait]
pub trait PackagesStateProvider: Send + Sync {
    /// Statuses last reported to the server, if any.
    async fn last_reported_statuses(&self) -> Option<PackageStatuses>;

    /// Bring local packages in line with the offer.
    async fn sync(&self, available: &PackagesAvailable) -> Result<PackageStatuses>;
}

//! Demo agent.
//!
//! - Loads `opamp-agent.yaml` (or the path given as first argument)
//! - Reports status until Ctrl-C
//! - Applies remote config by echoing it back as effective config

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing_subscriber::{fmt, EnvFilter};

use opamp_agent::{config, Callbacks, Capability, OpampClient};
use opamp_core::error::{OpampError, Result};
use opamp_core::protocol::{
    AgentConfigMap, ComponentHealth, EffectiveConfig, OpampConnectionSettings, RemoteConfigStatus,
    ServerErrorResponse, ServerToAgentCommand,
};

#[derive(Default)]
struct DemoCallbacks {
    applied: Mutex<Option<AgentConfigMap>>,
}

#[async_trait]
impl Callbacks for DemoCallbacks {
    async fn on_connect(&self) {
        tracing::debug!("connected to server");
    }

    async fn on_connect_failed(&self, err: &OpampError) {
        tracing::warn!(error = %err, "connect failed");
    }

    async fn on_error(&self, err: &ServerErrorResponse) {
        tracing::error!(message = %err.error_message, "server error response");
    }

    async fn on_remote_config(&self, config: &AgentConfigMap) -> Result<()> {
        for (name, file) in &config.config_map {
            tracing::info!(file = %name, bytes = file.body.len(), content_type = %file.content_type, "remote config file");
        }
        *self.applied.lock() = Some(config.clone());
        Ok(())
    }

    async fn save_remote_config_status(&self, status: &RemoteConfigStatus) {
        tracing::info!(status = status.status.as_str(), "remote config status");
    }

    async fn on_connection_settings(&self, settings: &OpampConnectionSettings) -> Result<()> {
        tracing::info!(endpoint = %settings.destination_endpoint, "connection settings offered");
        Ok(())
    }

    async fn effective_config(&self) -> Option<EffectiveConfig> {
        self.applied
            .lock()
            .clone()
            .map(|config_map| EffectiveConfig { config_map })
    }

    async fn on_command(&self, command: &ServerToAgentCommand) {
        tracing::warn!(command = ?command.command_type, "restart requested; demo agent ignores it");
    }

    async fn on_message_applied(&self, capability: Capability) {
        tracing::debug!(capability = capability.as_str(), "applied");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "opamp-agent.yaml".to_string());
    let cfg = config::load_from_file(&path)?;
    let settings = cfg.into_start_settings(Arc::new(DemoCallbacks::default()))?;

    let mut client = OpampClient::new(settings)?;
    client.start().await?;
    client.set_health(ComponentHealth {
        healthy: true,
        status: "running".into(),
        ..Default::default()
    });

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| OpampError::Internal(format!("signal handler failed: {e}")))?;

    let synced = client.stop().await?;
    tracing::info!(
        remote_config = ?synced.remote_config_status().map(|s| s.status),
        "agent stopped"
    );
    Ok(())
}

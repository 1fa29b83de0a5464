//! Client facade: owns one channel and its scheduler task.
//!
//! Lifecycle:
//! - `new` validates settings (no I/O)
//! - `start` queues the initial report and spawns the scheduler
//! - `stop` cancels, joins, and returns the final `SyncedState`
//!
//! Status setters only touch the envelope, so they are safe from any task at
//! any time. Header replacement needs `&mut self` and is refused once started.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::HeaderMap;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, Instrument};

use opamp_core::error::{OpampError, Result};
use opamp_core::protocol::{
    AgentDescription, AgentToServer, AgentToServerFlags, ComponentHealth, CustomMessage,
    EffectiveConfig,
};

use crate::dispatch::{ReceivedProcessor, SyncedState};
use crate::sender::{HttpSender, NextMessage, PollingInterval, Scheduler};
use crate::settings::StartSettings;

struct Running {
    cancel: CancellationToken,
    handle: JoinHandle<SyncedState>,
}

pub struct OpampClient {
    settings: StartSettings,
    next_message: Arc<NextMessage>,
    polling_interval: Arc<PollingInterval>,
    running: Option<Running>,
}

impl OpampClient {
    pub fn new(settings: StartSettings) -> Result<Self> {
        validate_url(&settings.server_url)?;
        let polling_interval = Arc::new(PollingInterval::new(settings.polling_interval));
        Ok(Self {
            settings,
            next_message: Arc::new(NextMessage::new()),
            polling_interval,
            running: None,
        })
    }

    /// Queue the initial status report and spawn the scheduler.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn start(&mut self) -> Result<()> {
        if self.running.is_some() {
            return Err(OpampError::AlreadyStarted);
        }
        let settings = &self.settings;
        let capabilities = settings.effective_capabilities();

        let sender = HttpSender::new(
            settings.server_url.clone(),
            settings.tls.as_ref(),
            Arc::clone(&settings.callbacks),
            settings.backoff.clone(),
        )
        .map(|mut sender| {
            sender.set_request_header(settings.header.clone());
            sender
        })?;

        let synced = SyncedState::new(
            settings.remote_config_status.clone(),
            settings.last_connection_settings_hash.clone(),
        );

        let package_statuses = match &settings.packages_state_provider {
            Some(provider) => provider.last_reported_statuses().await,
            None => None,
        };

        let (instance_uid, request_uid) = if settings.instance_uid.is_empty() {
            (uuid::Uuid::new_v4().to_string(), true)
        } else {
            (settings.instance_uid.clone(), false)
        };

        // Seed the first report on top of whatever was queued before start.
        let uid = instance_uid.clone();
        let description = settings.agent_description.clone();
        let remote_config_status = synced.remote_config_status().cloned();
        self.next_message.update(move |m| {
            m.instance_uid = uid;
            m.capabilities = capabilities;
            if request_uid {
                m.flags.insert(AgentToServerFlags::REQUEST_INSTANCE_UID);
            }
            if m.agent_description.is_none() {
                m.agent_description = description;
            }
            if m.remote_config_status.is_none() {
                m.remote_config_status = remote_config_status;
            }
            if m.package_statuses.is_none() {
                m.package_statuses = package_statuses;
            }
        });

        let processor = ReceivedProcessor::new(
            Arc::clone(&settings.callbacks),
            Arc::clone(&self.next_message),
            Arc::clone(&self.polling_interval),
            settings.packages_state_provider.clone(),
            capabilities,
            synced,
        );
        let scheduler = Scheduler::new(
            sender,
            Arc::clone(&self.next_message),
            Arc::clone(&self.polling_interval),
            processor,
        );

        let cancel = CancellationToken::new();
        let span = tracing::info_span!("opamp", instance_uid = %instance_uid, url = %settings.server_url);
        let handle = tokio::spawn(scheduler.run(cancel.clone()).instrument(span));
        info!(instance_uid = %instance_uid, capabilities = ?capabilities, "opamp client started");

        self.running = Some(Running { cancel, handle });
        Ok(())
    }

    /// Stop the scheduler and return what the session learned.
    pub async fn stop(&mut self) -> Result<SyncedState> {
        let running = self.running.take().ok_or(OpampError::NotStarted)?;
        running.cancel.cancel();
        let synced = running
            .handle
            .await
            .map_err(|e| OpampError::Internal(format!("scheduler task failed: {e}")))?;
        info!("opamp client stopped");
        Ok(synced)
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Merge an arbitrary change into the next report.
    pub fn update<F>(&self, mutate: F)
    where
        F: FnOnce(&mut AgentToServer),
    {
        self.next_message.update(mutate);
    }

    pub fn set_agent_description(&self, description: AgentDescription) {
        self.update(move |m| m.agent_description = Some(description));
    }

    pub fn set_health(&self, health: ComponentHealth) {
        self.update(move |m| m.health = Some(health));
    }

    pub fn update_effective_config(&self, config: EffectiveConfig) {
        self.update(move |m| m.effective_config = Some(config));
    }

    pub fn send_custom_message(&self, msg: CustomMessage) {
        self.update(move |m| m.custom_message = Some(msg));
    }

    /// Safe while running; applies from the next polling cycle.
    pub fn set_polling_interval(&self, interval: Duration) {
        self.polling_interval.set(interval);
    }

    pub fn polling_interval(&self) -> Duration {
        self.polling_interval.get()
    }

    /// Replace the extra request headers. Only before `start`.
    pub fn set_request_header(&mut self, header: HeaderMap) -> Result<()> {
        if self.running.is_some() {
            return Err(OpampError::AlreadyStarted);
        }
        self.settings.header = header;
        Ok(())
    }

    pub fn instance_uid(&self) -> String {
        self.next_message.instance_uid()
    }
}

fn validate_url(url: &str) -> Result<()> {
    let parsed = reqwest::Url::parse(url)
        .map_err(|e| OpampError::Config(format!("invalid server url {url:?}: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(OpampError::Config(format!(
            "server url scheme must be http or https, got {other:?}"
        ))),
    }
}

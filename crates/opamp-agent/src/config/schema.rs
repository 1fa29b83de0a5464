use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::header::{HeaderName, HeaderValue};
use serde::Deserialize;

use opamp_core::error::{OpampError, Result};
use opamp_core::protocol::AgentCapabilities;

use crate::sender::backoff::ExponentialBackoff;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentFileConfig {
    pub version: u32,

    pub server: ServerSection,

    #[serde(default)]
    pub agent: AgentSection,
}

impl AgentFileConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(OpampError::Config(format!(
                "unsupported config version {}",
                self.version
            )));
        }
        self.server.validate()?;
        self.agent.validate()?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    pub url: String,

    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    #[serde(default = "default_polling_interval_ms")]
    pub polling_interval_ms: u64,

    #[serde(default)]
    pub tls: Option<TlsSection>,

    #[serde(default)]
    pub backoff: BackoffSection,
}

impl ServerSection {
    pub fn validate(&self) -> Result<()> {
        let url = reqwest::Url::parse(&self.url)
            .map_err(|e| OpampError::Config(format!("server.url is invalid: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(OpampError::Config(
                "server.url must use http or https".into(),
            ));
        }
        if !(1_000..=86_400_000).contains(&self.polling_interval_ms) {
            return Err(OpampError::Config(
                "server.polling_interval_ms must be between 1000 and 86400000".into(),
            ));
        }
        for (name, value) in &self.headers {
            HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| OpampError::Config(format!("server.headers: invalid name {name:?}")))?;
            HeaderValue::from_str(value)
                .map_err(|_| OpampError::Config(format!("server.headers: invalid value for {name:?}")))?;
        }
        self.backoff.validate()?;
        Ok(())
    }

    pub fn polling_interval(&self) -> Duration {
        Duration::from_millis(self.polling_interval_ms)
    }
}

fn default_polling_interval_ms() -> u64 {
    30_000
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TlsSection {
    /// PEM file with an extra root certificate.
    #[serde(default)]
    pub ca_file: Option<String>,

    #[serde(default)]
    pub accept_invalid_certs: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackoffSection {
    #[serde(default = "default_initial_interval_ms")]
    pub initial_interval_ms: u64,

    #[serde(default = "default_max_interval_ms")]
    pub max_interval_ms: u64,

    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    #[serde(default = "default_randomization_factor")]
    pub randomization_factor: f64,
}

impl Default for BackoffSection {
    fn default() -> Self {
        Self {
            initial_interval_ms: default_initial_interval_ms(),
            max_interval_ms: default_max_interval_ms(),
            multiplier: default_multiplier(),
            randomization_factor: default_randomization_factor(),
        }
    }
}

impl BackoffSection {
    pub fn validate(&self) -> Result<()> {
        if self.initial_interval_ms == 0 || self.initial_interval_ms > self.max_interval_ms {
            return Err(OpampError::Config(
                "server.backoff.initial_interval_ms must be in 1..=max_interval_ms".into(),
            ));
        }
        if !(1.0..=10.0).contains(&self.multiplier) {
            return Err(OpampError::Config(
                "server.backoff.multiplier must be between 1.0 and 10.0".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.randomization_factor) {
            return Err(OpampError::Config(
                "server.backoff.randomization_factor must be between 0.0 and 1.0".into(),
            ));
        }
        Ok(())
    }

    pub fn to_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff::new()
            .with_initial_interval(Duration::from_millis(self.initial_interval_ms))
            .with_max_interval(Duration::from_millis(self.max_interval_ms))
            .with_multiplier(self.multiplier)
            .with_randomization_factor(self.randomization_factor)
    }
}

fn default_initial_interval_ms() -> u64 {
    500
}
fn default_max_interval_ms() -> u64 {
    60_000
}
fn default_multiplier() -> f64 {
    1.5
}
fn default_randomization_factor() -> f64 {
    0.5
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentSection {
    /// Empty: generate one at start and ask the server to assign.
    #[serde(default)]
    pub instance_uid: String,

    #[serde(default = "default_service_name")]
    pub service_name: String,

    #[serde(default = "default_service_version")]
    pub service_version: String,

    #[serde(default = "default_capabilities")]
    pub capabilities: Vec<CapabilityName>,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            instance_uid: String::new(),
            service_name: default_service_name(),
            service_version: default_service_version(),
            capabilities: default_capabilities(),
        }
    }
}

impl AgentSection {
    pub fn validate(&self) -> Result<()> {
        if self.service_name.trim().is_empty() {
            return Err(OpampError::Config("agent.service_name must not be empty".into()));
        }
        if !self.capabilities.contains(&CapabilityName::ReportsStatus) {
            return Err(OpampError::Config(
                "agent.capabilities must include reports_status".into(),
            ));
        }
        Ok(())
    }

    pub fn capability_bits(&self) -> AgentCapabilities {
        self.capabilities
            .iter()
            .fold(AgentCapabilities::empty(), |acc, c| acc | c.bits())
    }
}

fn default_service_name() -> String {
    "opamp-agent".into()
}
fn default_service_version() -> String {
    env!("CARGO_PKG_VERSION").into()
}
fn default_capabilities() -> Vec<CapabilityName> {
    vec![CapabilityName::ReportsStatus]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityName {
    ReportsStatus,
    AcceptsRemoteConfig,
    ReportsEffectiveConfig,
    AcceptsPackages,
    ReportsPackageStatuses,
    ReportsOwnTraces,
    ReportsOwnMetrics,
    ReportsOwnLogs,
    AcceptsOpampConnectionSettings,
    AcceptsRestartCommand,
    ReportsHealth,
    ReportsRemoteConfig,
}

impl CapabilityName {
    pub fn bits(self) -> AgentCapabilities {
        match self {
            CapabilityName::ReportsStatus => AgentCapabilities::REPORTS_STATUS,
            CapabilityName::AcceptsRemoteConfig => AgentCapabilities::ACCEPTS_REMOTE_CONFIG,
            CapabilityName::ReportsEffectiveConfig => AgentCapabilities::REPORTS_EFFECTIVE_CONFIG,
            CapabilityName::AcceptsPackages => AgentCapabilities::ACCEPTS_PACKAGES,
            CapabilityName::ReportsPackageStatuses => AgentCapabilities::REPORTS_PACKAGE_STATUSES,
            CapabilityName::ReportsOwnTraces => AgentCapabilities::REPORTS_OWN_TRACES,
            CapabilityName::ReportsOwnMetrics => AgentCapabilities::REPORTS_OWN_METRICS,
            CapabilityName::ReportsOwnLogs => AgentCapabilities::REPORTS_OWN_LOGS,
            CapabilityName::AcceptsOpampConnectionSettings => {
                AgentCapabilities::ACCEPTS_OPAMP_CONNECTION_SETTINGS
            }
            CapabilityName::AcceptsRestartCommand => AgentCapabilities::ACCEPTS_RESTART_COMMAND,
            CapabilityName::ReportsHealth => AgentCapabilities::REPORTS_HEALTH,
            CapabilityName::ReportsRemoteConfig => AgentCapabilities::REPORTS_REMOTE_CONFIG,
        }
    }
}

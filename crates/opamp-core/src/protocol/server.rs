//! Server -> Agent message.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::agent::{AgentConfigMap, CustomMessage};
use super::flags::{ServerCapabilities, ServerToAgentFlags};

/// Incoming message. Every capability is optional; absent means "no change".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerToAgent {
    pub instance_uid: String,
    pub error_response: Option<ServerErrorResponse>,
    pub remote_config: Option<AgentRemoteConfig>,
    pub connection_settings: Option<ConnectionSettingsOffers>,
    pub packages_available: Option<PackagesAvailable>,
    pub flags: ServerToAgentFlags,
    pub capabilities: ServerCapabilities,
    pub agent_identification: Option<AgentIdentification>,
    pub command: Option<ServerToAgentCommand>,
    pub custom_message: Option<CustomMessage>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerErrorResponseType {
    #[default]
    Unknown,
    BadRequest,
    Unavailable,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerErrorResponse {
    #[serde(rename = "type")]
    pub error_type: ServerErrorResponseType,
    pub error_message: String,
    /// Only meaningful with `Unavailable`.
    pub retry_after_nanoseconds: Option<u64>,
}

/// Remote config offer. `config_hash` identifies the content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentRemoteConfig {
    pub config: AgentConfigMap,
    pub config_hash: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpampConnectionSettings {
    pub destination_endpoint: String,
    pub headers: BTreeMap<String, String>,
    /// 0 = keep the current polling interval.
    pub heartbeat_interval_seconds: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettingsOffers {
    pub hash: Vec<u8>,
    pub opamp: Option<OpampConnectionSettings>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PackageType {
    #[default]
    TopLevel,
    Addon,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadableFile {
    pub download_url: String,
    pub content_hash: Vec<u8>,
    pub signature: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageAvailable {
    #[serde(rename = "type")]
    pub package_type: PackageType,
    pub version: String,
    pub file: Option<DownloadableFile>,
    pub hash: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackagesAvailable {
    pub packages: BTreeMap<String, PackageAvailable>,
    pub all_packages_hash: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentIdentification {
    pub new_instance_uid: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandType {
    #[default]
    Restart,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerToAgentCommand {
    #[serde(rename = "type")]
    pub command_type: CommandType,
}

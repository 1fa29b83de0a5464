//! Agent -> Server message (the outgoing envelope) and its status payloads.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::flags::{AgentCapabilities, AgentToServerFlags};

/// Outgoing message. "Nothing to send" means `== AgentToServer::default()`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentToServer {
    pub instance_uid: String,
    pub sequence_num: u64,
    pub agent_description: Option<AgentDescription>,
    pub capabilities: AgentCapabilities,
    pub health: Option<ComponentHealth>,
    pub effective_config: Option<EffectiveConfig>,
    pub remote_config_status: Option<RemoteConfigStatus>,
    pub package_statuses: Option<PackageStatuses>,
    pub connection_settings_status: Option<ConnectionSettingsStatus>,
    pub flags: AgentToServerFlags,
    pub custom_message: Option<CustomMessage>,
}

impl AgentToServer {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AnyValue {
    String(String),
    Bool(bool),
    Int(i64),
    Double(f64),
    Bytes(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    pub value: AnyValue,
}

impl KeyValue {
    pub fn string(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: AnyValue::String(value.into()),
        }
    }
}

/// Attributes describing the agent (service.name, host.name, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentDescription {
    pub identifying_attributes: Vec<KeyValue>,
    pub non_identifying_attributes: Vec<KeyValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComponentHealth {
    pub healthy: bool,
    pub start_time_unix_nano: u64,
    pub last_error: String,
    pub status: String,
    pub status_time_unix_nano: u64,
    pub component_health_map: BTreeMap<String, ComponentHealth>,
}

/// One named config file. `BTreeMap` keeps encoding and hashing order-stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfigFile {
    pub body: Vec<u8>,
    pub content_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfigMap {
    pub config_map: BTreeMap<String, AgentConfigFile>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectiveConfig {
    pub config_map: AgentConfigMap,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoteConfigStatuses {
    #[default]
    Unset,
    Applied,
    Applying,
    Failed,
}

impl RemoteConfigStatuses {
    pub fn as_str(self) -> &'static str {
        match self {
            RemoteConfigStatuses::Unset => "UNSET",
            RemoteConfigStatuses::Applied => "APPLIED",
            RemoteConfigStatuses::Applying => "APPLYING",
            RemoteConfigStatuses::Failed => "FAILED",
        }
    }
}

/// Result of the last remote config the agent tried to apply.
///
/// `hash` is derived from the other fields (see `crate::hash`) and is never
/// trusted from outside.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfigStatus {
    pub last_remote_config_hash: Vec<u8>,
    pub status: RemoteConfigStatuses,
    pub error_message: String,
    pub hash: Vec<u8>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PackageStatusEnum {
    #[default]
    Installed,
    InstallPending,
    Installing,
    InstallFailed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageStatus {
    pub name: String,
    pub agent_has_version: String,
    pub agent_has_hash: Vec<u8>,
    pub server_offered_version: String,
    pub server_offered_hash: Vec<u8>,
    pub status: PackageStatusEnum,
    pub error_message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageStatuses {
    pub packages: BTreeMap<String, PackageStatus>,
    pub server_provided_all_packages_hash: Vec<u8>,
    pub error_message: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionSettingsStatuses {
    #[default]
    Unset,
    Applied,
    Applying,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettingsStatus {
    pub last_connection_settings_hash: Vec<u8>,
    pub status: ConnectionSettingsStatuses,
    pub error_message: String,
}

/// Opaque message for a custom capability. Shared by both directions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomMessage {
    pub capability: String,
    #[serde(rename = "type")]
    pub msg_type: String,
    pub data: Vec<u8>,
}

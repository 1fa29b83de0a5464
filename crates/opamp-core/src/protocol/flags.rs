//! Capability and flag bit sets.
//!
//! Bit values follow the OpAMP protocol numbering so a capability mask logged
//! by the agent can be compared directly against server-side tooling. On the
//! wire every set is its raw `u64`.

use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// What the agent can do, announced in every full report.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentCapabilities(u64);

bitflags! {
    impl AgentCapabilities: u64 {
        const REPORTS_STATUS = 0x0000_0001;
        const ACCEPTS_REMOTE_CONFIG = 0x0000_0002;
        const REPORTS_EFFECTIVE_CONFIG = 0x0000_0004;
        const ACCEPTS_PACKAGES = 0x0000_0008;
        const REPORTS_PACKAGE_STATUSES = 0x0000_0010;
        const REPORTS_OWN_TRACES = 0x0000_0020;
        const REPORTS_OWN_METRICS = 0x0000_0040;
        const REPORTS_OWN_LOGS = 0x0000_0080;
        const ACCEPTS_OPAMP_CONNECTION_SETTINGS = 0x0000_0100;
        const ACCEPTS_OTHER_CONNECTION_SETTINGS = 0x0000_0200;
        const ACCEPTS_RESTART_COMMAND = 0x0000_0400;
        const REPORTS_HEALTH = 0x0000_0800;
        const REPORTS_REMOTE_CONFIG = 0x0000_1000;
    }
}

/// What the server can do.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerCapabilities(u64);

bitflags! {
    impl ServerCapabilities: u64 {
        const ACCEPTS_STATUS = 0x0000_0001;
        const OFFERS_REMOTE_CONFIG = 0x0000_0002;
        const ACCEPTS_EFFECTIVE_CONFIG = 0x0000_0004;
        const OFFERS_PACKAGES = 0x0000_0008;
        const ACCEPTS_PACKAGES_STATUS = 0x0000_0010;
        const OFFERS_CONNECTION_SETTINGS = 0x0000_0020;
    }
}

#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentToServerFlags(u64);

bitflags! {
    impl AgentToServerFlags: u64 {
        /// Ask the server to assign a new instance uid.
        const REQUEST_INSTANCE_UID = 0x0000_0001;
    }
}

#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerToAgentFlags(u64);

bitflags! {
    impl ServerToAgentFlags: u64 {
        /// The server lost track of us: resend every status field.
        const REPORT_FULL_STATE = 0x0000_0001;
    }
}

// "A | B", unknown bits as hex.
impl fmt::Debug for AgentCapabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        bitflags::parser::to_writer(self, f)
    }
}

impl fmt::Debug for ServerCapabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        bitflags::parser::to_writer(self, f)
    }
}

impl fmt::Debug for AgentToServerFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        bitflags::parser::to_writer(self, f)
    }
}

impl fmt::Debug for ServerToAgentFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        bitflags::parser::to_writer(self, f)
    }
}

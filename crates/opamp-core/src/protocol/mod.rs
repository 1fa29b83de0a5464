//! Protocol modules (message schema + binary codec).
//!
//! This module hosts the two message directions of one poll exchange:
//! - `agent`: the Agent -> Server envelope and the status payloads it carries.
//! - `server`: the Server -> Agent reply, one optional field per capability.
//!
//! Decoding is panic-free: malformed bytes are reported as
//! `OpampError::Decoding` instead of panicking, so one bad reply never takes
//! the agent down.

pub mod agent;
pub mod codec;
pub mod flags;
pub mod server;

pub use agent::*;
pub use flags::{AgentCapabilities, AgentToServerFlags, ServerCapabilities, ServerToAgentFlags};
pub use server::*;

//! Binary wire codec (CBOR).
//!
//! Encoding is deterministic: every map on the wire is a `BTreeMap`, so the
//! same message always produces the same bytes.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{OpampError, Result};

use super::agent::AgentToServer;
use super::server::ServerToAgent;

/// Content type sent with every request.
pub const CONTENT_TYPE: &str = "application/cbor";

fn encode<T: Serialize>(msg: &T) -> Result<Bytes> {
    let mut buf = Vec::with_capacity(128);
    ciborium::into_writer(msg, &mut buf).map_err(|e| OpampError::Encoding(e.to_string()))?;
    Ok(Bytes::from(buf))
}

fn decode<T: DeserializeOwned>(buf: &[u8]) -> Result<T> {
    if buf.is_empty() {
        return Err(OpampError::Decoding("empty body".into()));
    }
    ciborium::from_reader(buf).map_err(|e| OpampError::Decoding(e.to_string()))
}

pub fn encode_agent_to_server(msg: &AgentToServer) -> Result<Bytes> {
    encode(msg)
}

pub fn decode_agent_to_server(buf: &[u8]) -> Result<AgentToServer> {
    decode(buf)
}

pub fn encode_server_to_agent(msg: &ServerToAgent) -> Result<Bytes> {
    encode(msg)
}

pub fn decode_server_to_agent(buf: &[u8]) -> Result<ServerToAgent> {
    decode(buf)
}

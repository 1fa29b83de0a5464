//! opamp core: runtime-free protocol types, codec, hashing, and errors.
//!
//! This crate defines the wire-level contracts and error surface shared by
//! the agent engine and any server-side tooling. It intentionally carries no
//! transport or runtime dependencies so it can be reused in multiple contexts.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here.
//! All fallible paths surface as `OpampError`/`Result`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

pub mod error;
pub mod hash;
pub mod protocol;

/// Shared result type.
pub use error::{ErrorKind, OpampError, Result};

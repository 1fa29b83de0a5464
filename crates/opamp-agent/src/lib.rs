//! opamp agent library entry.
//!
//! This crate wires the envelope accumulator, the HTTP round-tripper, the
//! scheduler loop, and the response dispatcher into one client. It is
//! consumed by the demo binary (`main.rs`) and by integration tests.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

pub mod callbacks;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod sender;
pub mod settings;

pub use callbacks::{Callbacks, Capability, NoopCallbacks, PackagesStateProvider};
pub use client::OpampClient;
pub use dispatch::SyncedState;
pub use sender::ExponentialBackoff;
pub use settings::{StartSettings, TlsSettings};

//! Top-level facade crate for the OpAMP agent engine.
//!
//! Re-exports the protocol crate and the agent library so embedders can depend on a single crate.

pub mod core {
    pub use opamp_core::*;
}

pub mod agent {
    pub use opamp_agent::*;
}

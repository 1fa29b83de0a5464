//! Response processing and the session state it maintains.

pub mod processor;
pub mod synced_state;

pub use processor::ReceivedProcessor;
pub use synced_state::SyncedState;

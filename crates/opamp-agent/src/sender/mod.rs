//! Outgoing side of the channel.
//!
//! - `next_message`: envelope accumulator + readiness signal
//! - `backoff`: retry delays and `Retry-After` handling
//! - `http`: one request/response exchange with retries
//! - `scheduler`: the run loop that owns the single in-flight request

pub mod backoff;
pub mod http;
pub mod next_message;
pub mod scheduler;

pub use backoff::ExponentialBackoff;
pub use http::HttpSender;
pub use next_message::NextMessage;
pub use scheduler::{PollingInterval, Scheduler};

//! SEMPv2 client for the queue balancer.
//!
//! Reads queue depth and consumer flows through the monitor API and moves single
//! messages through the action API (copy to the target queue, then delete from the source).

mod client;
mod config;
mod error;
mod types;

pub use client::SempClient;
pub use config::{SempConfig, SempEndpoints, DEFAULT_REQUEST_TIMEOUT_MS, DEFAULT_SCAN_DEPTH};
pub use error::{Error, Result};
pub use types::{QueueMsg, SempErrorInfo};

//! Mesh LED control: multicast light control and a packet success rate demo
//!
//! Nodes share a UDP/IPv6 port and a site-local multicast group. A sender
//! transmits numbered fixed-size test packets to one receiver, which counts
//! them and reports the share that arrived. Light-control commands toggle an
//! LED on every node of the addressed group.
pub mod core;

pub mod console;
pub mod network;
pub mod node;
pub mod protocol;
pub mod util;

// Re-export commonly used items
pub use crate::core::{Error, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

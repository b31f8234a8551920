//! Core types and constants for the LED control node
//!
//! This module contains the fundamental building blocks used throughout the library.

use std::net::Ipv6Addr;

pub mod error;
pub mod types;
pub mod serde;

pub use self::error::{Error, Result};
pub use self::types::{
    Config,
    ReceiveReport,
    ReceiveStatistics,
    Role,
    SessionConfig,
};

/// Default UDP port for both control and test traffic
pub const DEFAULT_PORT: u16 = 1234;

/// Multicast group every node joins
pub const MULTICAST_GROUP: Ipv6Addr = Ipv6Addr::new(0xff15, 0, 0, 0, 0, 0, 0x810a, 0x64d1);

/// How many hops a multicast datagram may travel
pub const MULTICAST_HOPS: u32 = 10;

/// Prefix completed by the operator's short destination suffix
pub const DESTINATION_PREFIX: &str = "fd00:db8::ff:fe00:";

/// Group that addresses every node
pub const MASTER_GROUP: u16 = 0;

/// Group this node belongs to
pub const MY_GROUP: u16 = 1;

/// Group value when a light-control message names none
pub const UNKNOWN_GROUP: u16 = 0xFFFF;

/// Size of the datagram receive buffer
pub const RECEIVE_BUFFER_SIZE: usize = 256;

/// Longest console line accepted before it is rejected
pub const CONSOLE_LINE_LIMIT: usize = 128;

/// Largest filler payload a test packet carries
pub const MAX_PAYLOAD_LEN: usize = 127;

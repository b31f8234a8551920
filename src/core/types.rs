use std::fmt;
use std::net::{Ipv6Addr, SocketAddr, SocketAddrV6};
use std::path::Path;
use std::time::Duration;

use serde::{Serialize, Deserialize};

use super::{Error, Result};

/// Which half of the demo this process plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// Counts incoming test packets and reports the success rate
    Receiver,
    /// Transmits sequenced test packets at a fixed interval
    Sender,
}

impl Role {
    /// Maps the operator's action mode to a role; only `1` selects the sender
    pub fn from_mode(mode: i64) -> Self {
        if mode == 1 {
            Role::Sender
        } else {
            Role::Receiver
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Receiver => write!(f, "receiver"),
            Role::Sender => write!(f, "sender"),
        }
    }
}

/// Configuration for the LED control node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// UDP port to bind and to send to
    pub bind_port: u16,
    /// Multicast group to join and broadcast light control on
    pub multicast_group: Ipv6Addr,
    /// Multicast hop limit
    pub multicast_hops: u32,
    /// Group this node answers to besides the master group
    pub local_group: u16,
    /// Address prefix completed by the operator's suffix
    pub destination_prefix: String,
    /// Bytes reserved for each received datagram
    pub receive_buffer_size: usize,
    /// Hard limit on a single console line
    pub console_line_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind_port: super::DEFAULT_PORT,
            multicast_group: super::MULTICAST_GROUP,
            multicast_hops: super::MULTICAST_HOPS,
            local_group: super::MY_GROUP,
            destination_prefix: super::DESTINATION_PREFIX.to_string(),
            receive_buffer_size: super::RECEIVE_BUFFER_SIZE,
            console_line_limit: super::CONSOLE_LINE_LIMIT,
        }
    }
}

impl Config {
    /// Parses a JSON document; missing fields keep their defaults
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&text)
    }

    /// Rejects values the node cannot run with
    pub fn validate(&self) -> Result<()> {
        if !self.multicast_group.is_multicast() {
            return Err(Error::config(format!(
                "{} is not a multicast address",
                self.multicast_group
            )));
        }
        // Room for the 21-byte test packet header plus the terminating byte.
        if self.receive_buffer_size < 22 {
            return Err(Error::config("receive buffer must hold at least 22 bytes"));
        }
        if self.console_line_limit == 0 {
            return Err(Error::config("console line limit must be positive"));
        }
        Ok(())
    }

    /// Socket address light-control broadcasts go to
    pub fn multicast_target(&self) -> SocketAddr {
        SocketAddr::V6(SocketAddrV6::new(self.multicast_group, self.bind_port, 0, 0))
    }
}

/// Parameters the operator enters before a send session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Unicast destination of the test packets
    pub destination: Ipv6Addr,
    /// Filler bytes after the header
    pub payload_length: usize,
    /// Time between two transmissions
    #[serde(serialize_with = "super::serde::serialize_duration")]
    #[serde(deserialize_with = "super::serde::deserialize_duration")]
    pub send_interval: Duration,
    /// Number of packets to send before stopping
    pub total_send_attempts: i64,
}

impl SessionConfig {
    /// Builds a session from the raw operator answers.
    ///
    /// The destination is `prefix` followed by `suffix`. Payload length is
    /// clamped to `0..=MAX_PAYLOAD_LEN` and the interval to at least one second.
    pub fn from_operator(
        prefix: &str,
        suffix: &str,
        payload_length: i64,
        send_interval_secs: i64,
        total_send_attempts: i64,
    ) -> Result<Self> {
        let destination = Self::parse_destination(prefix, suffix)?;
        let payload_length = payload_length.clamp(0, super::MAX_PAYLOAD_LEN as i64) as usize;
        let send_interval = Duration::from_secs(send_interval_secs.max(1) as u64);

        Ok(SessionConfig {
            destination,
            payload_length,
            send_interval,
            total_send_attempts,
        })
    }

    /// Completes `prefix` with the operator's `suffix` into an address
    pub fn parse_destination(prefix: &str, suffix: &str) -> Result<Ipv6Addr> {
        let text = format!("{}{}", prefix, suffix.trim());
        text.parse()
            .map_err(|_| Error::config(format!("invalid destination address {:?}", text)))
    }

    /// Socket address of the destination on the given port
    pub fn target(&self, port: u16) -> SocketAddr {
        SocketAddr::V6(SocketAddrV6::new(self.destination, port, 0, 0))
    }
}

/// Counters kept while a receive session is active
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiveStatistics {
    /// Number of packets the operator expects
    pub goal_count: i64,
    /// Number of datagrams seen so far
    pub received_count: i64,
}

impl ReceiveStatistics {
    /// Starts a fresh count towards `goal_count`
    pub fn begin(goal_count: i64) -> Self {
        ReceiveStatistics {
            goal_count,
            received_count: 0,
        }
    }

    pub fn record(&mut self) {
        self.received_count += 1;
    }

    /// Success rate in percent; zero when no goal was set
    pub fn success_rate(&self) -> f64 {
        if self.goal_count == 0 {
            return 0.0;
        }
        self.received_count as f64 / self.goal_count as f64 * 100.0
    }

    /// Snapshot of the counters as a report
    pub fn report(&self) -> ReceiveReport {
        ReceiveReport {
            goal_count: self.goal_count,
            received_count: self.received_count,
            success_rate: self.success_rate(),
        }
    }

    pub fn reset(&mut self) {
        *self = ReceiveStatistics::default();
    }
}

/// Outcome of a finished receive session
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReceiveReport {
    pub goal_count: i64,
    pub received_count: i64,
    /// Percentage of the goal that arrived
    pub success_rate: f64,
}

impl fmt::Display for ReceiveReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Goal count = {} , receive = {}  , success rate = {:.3} %",
            self.goal_count, self.received_count, self.success_rate
        )
    }
}

use bytes::Bytes;

use crate::core::{Error, Result, UNKNOWN_GROUP, MAX_PAYLOAD_LEN};
use crate::util::parse_decimal_prefix;

/// Exact size of every test packet datagram on the wire
pub const TEST_DATAGRAM_LEN: usize = 50;

/// Width of the sequence and goal fields of a test packet
pub const FIELD_WIDTH: usize = 10;

/// Offset of the goal field, just past the `/` separator
pub const GOAL_FIELD_OFFSET: usize = FIELD_WIDTH + 1;

/// Byte the test packet payload is filled with
pub const PAYLOAD_FILL: u8 = b'A';

/// Command telling a group of nodes to switch their indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightControlMessage {
    /// Target group; 0 addresses every node
    pub group_id: u16,
    /// Requested indicator state
    pub state: bool,
}

impl LightControlMessage {
    pub fn new(group_id: u16, state: bool) -> Self {
        LightControlMessage { group_id, state }
    }

    /// The NUL-terminated wire form
    pub fn encode(&self) -> Vec<u8> {
        encode_light_control(self.group_id, self.state)
    }

    /// Writes the wire form into `buf`, returning the number of bytes used
    pub fn encode_into(&self, buf: &mut [u8]) -> Result<usize> {
        let wire = self.encode();
        if buf.len() < wire.len() {
            return Err(Error::BufferTooSmall {
                needed: wire.len(),
                available: buf.len(),
            });
        }
        buf[..wire.len()].copy_from_slice(&wire);
        Ok(wire.len())
    }
}

/// Builds `t:lights;g:<group>;s:<0|1>;` followed by a NUL byte.
pub fn encode_light_control(group_id: u16, state: bool) -> Vec<u8> {
    let text = format!("t:lights;g:{:03};s:{};", group_id, if state { 1 } else { 0 });
    let mut wire = text.into_bytes();
    wire.push(0);
    wire
}

/// Splits a message into its `key:value;` pairs.
///
/// The message ends at the first NUL. Only segments closed by `;` count, and
/// a segment without `:` is skipped.
fn pairs(bytes: &[u8]) -> impl Iterator<Item = (&[u8], &[u8])> {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    let text = &bytes[..end];
    let closed = text.iter().rposition(|&b| b == b';').map_or(0, |i| i + 1);

    text[..closed]
        .split(|&b| b == b';')
        .filter_map(|segment| {
            let colon = segment.iter().position(|&b| b == b':')?;
            Some((&segment[..colon], &segment[colon + 1..]))
        })
}

/// Decodes a light-control message.
///
/// Returns `None` unless a `t:lights` pair is present. A missing or unusable
/// `s` pair keeps `prior_state`; a missing `g` pair yields [`UNKNOWN_GROUP`].
pub fn decode_light_control(bytes: &[u8], prior_state: bool) -> Option<LightControlMessage> {
    let mut is_lights = false;
    let mut state = None;
    let mut group = None;

    for (key, value) in pairs(bytes) {
        match key {
            b"t" if value == b"lights" => is_lights = true,
            b"s" if state.is_none() => {
                state = match value {
                    b"1" => Some(true),
                    b"0" => Some(false),
                    _ => None,
                };
            }
            b"g" if group.is_none() => {
                let parsed = parse_decimal_prefix(value).clamp(0, i64::from(u16::MAX));
                group = Some(parsed as u16);
            }
            _ => {}
        }
    }

    if !is_lights {
        return None;
    }

    Some(LightControlMessage {
        group_id: group.unwrap_or(UNKNOWN_GROUP),
        state: state.unwrap_or(prior_state),
    })
}

/// A sequenced filler datagram used to measure delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestPacket {
    /// Position of this packet, starting at 1
    pub sequence_number: i64,
    /// Total number of packets the sender intends to send
    pub goal_count: i64,
    pub payload: Bytes,
}

impl TestPacket {
    /// Creates a packet with `payload_length` filler bytes (at most 127)
    pub fn new(sequence_number: i64, goal_count: i64, payload_length: usize) -> Self {
        let payload = vec![PAYLOAD_FILL; payload_length.min(MAX_PAYLOAD_LEN)];
        TestPacket {
            sequence_number,
            goal_count,
            payload: Bytes::from(payload),
        }
    }

    /// The fixed-size datagram
    pub fn encode(&self) -> [u8; TEST_DATAGRAM_LEN] {
        encode_test_packet(self.sequence_number, self.goal_count, &self.payload)
    }

    /// Length of the formatted text before truncation or padding
    pub fn formatted_len(&self) -> usize {
        header_text(self.sequence_number, self.goal_count).len() + self.payload.len()
    }
}

fn header_text(sequence_number: i64, goal_count: i64) -> String {
    format!("{:>10}/{:>10}:", sequence_number, goal_count)
}

/// Formats `%10lld/%10lld:<payload>` into exactly [`TEST_DATAGRAM_LEN`] bytes.
///
/// Longer text is truncated and shorter text is padded with zero bytes.
pub fn encode_test_packet(
    sequence_number: i64,
    goal_count: i64,
    payload: &[u8],
) -> [u8; TEST_DATAGRAM_LEN] {
    let mut datagram = [0u8; TEST_DATAGRAM_LEN];
    let header = header_text(sequence_number, goal_count);
    let text = header.as_bytes().iter().chain(payload.iter());
    for (slot, &b) in datagram.iter_mut().zip(text) {
        *slot = b;
    }
    datagram
}

/// Sequence and goal fields read back from a received test packet
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TestPacketHeader {
    pub sequence_number: i64,
    pub goal_count: i64,
}

fn field(bytes: &[u8], start: usize) -> &[u8] {
    let start = start.min(bytes.len());
    let end = (start + FIELD_WIDTH).min(bytes.len());
    &bytes[start..end]
}

/// Reads the sequence from bytes 0..10 and the goal from bytes 11..21.
///
/// The separator is not checked and malformed fields read as 0.
pub fn decode_test_packet_header(bytes: &[u8]) -> TestPacketHeader {
    TestPacketHeader {
        sequence_number: parse_decimal_prefix(field(bytes, 0)),
        goal_count: parse_decimal_prefix(field(bytes, GOAL_FIELD_OFFSET)),
    }
}

/// True when bytes 0..10 equal bytes 11..21 pairwise.
///
/// This happens on the packet whose sequence equals its goal, i.e. the last
/// one a sender transmits. Bytes past the end of a short datagram count as 0.
pub fn is_end_marker(bytes: &[u8]) -> bool {
    let at = |i: usize| bytes.get(i).copied().unwrap_or(0);
    (0..FIELD_WIDTH).all(|i| at(i) == at(i + GOAL_FIELD_OFFSET))
}

/// A received datagram, classified for the local role
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Datagram {
    /// Light-control command (sender role)
    LightControl(LightControlMessage),
    /// Test packet (receiver role)
    Test {
        header: TestPacketHeader,
        /// Whether the datagram carries the end-of-session pattern
        end_marker: bool,
        len: usize,
    },
    /// Anything the local role does not interpret
    Unrecognised { len: usize },
}

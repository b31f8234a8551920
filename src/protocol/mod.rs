//! Protocol implementation module
//!
//! This module defines the light-control and test-packet wire messages,
//! their encoding/decoding, the group filter and the session state machine.

pub mod codec;
pub mod filter;
pub mod message;
pub mod state;

pub use self::codec::WireCodec;
pub use self::filter::GroupFilter;
pub use self::message::{
    decode_light_control, decode_test_packet_header, encode_light_control,
    encode_test_packet, is_end_marker, Datagram, LightControlMessage, TestPacket,
    TestPacketHeader, TEST_DATAGRAM_LEN,
};
pub use self::state::{DatagramOutcome, LedState, SendTick, Session, SessionState, TriggerOutcome};

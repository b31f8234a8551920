use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::core::{Error, Role};
use super::message::{
    decode_light_control, decode_test_packet_header, is_end_marker, Datagram,
    LightControlMessage, TestPacket,
};

/// Datagram codec for the LED control wire protocol.
///
/// Each call to `decode` consumes the whole buffer as one datagram and
/// classifies it for the local role.
#[derive(Debug, Clone)]
pub struct WireCodec {
    role: Role,
    /// State assumed when a light-control message omits `s:`
    carry_state: bool,
}

impl WireCodec {
    /// Creates a new codec for the given role
    pub fn new(role: Role) -> Self {
        WireCodec {
            role,
            carry_state: false,
        }
    }

    /// Updates the state light-control messages without `s:` fall back to
    pub fn set_carry_state(&mut self, state: bool) {
        self.carry_state = state;
    }
}

impl Decoder for WireCodec {
    type Item = Datagram;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }

        let frame = src.split_to(src.len());
        let len = frame.len();

        let datagram = match self.role {
            Role::Sender => match decode_light_control(&frame, self.carry_state) {
                Some(message) => Datagram::LightControl(message),
                None => Datagram::Unrecognised { len },
            },
            Role::Receiver => Datagram::Test {
                header: decode_test_packet_header(&frame),
                end_marker: is_end_marker(&frame),
                len,
            },
        };

        Ok(Some(datagram))
    }
}

impl<'a> Encoder<&'a TestPacket> for WireCodec {
    type Error = Error;

    fn encode(&mut self, item: &'a TestPacket, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.put_slice(&item.encode());
        Ok(())
    }
}

impl<'a> Encoder<&'a LightControlMessage> for WireCodec {
    type Error = Error;

    fn encode(
        &mut self,
        item: &'a LightControlMessage,
        dst: &mut BytesMut,
    ) -> Result<(), Self::Error> {
        dst.put_slice(&item.encode());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::message::{TestPacketHeader, TEST_DATAGRAM_LEN};

    #[test]
    fn test_codec_encodes_fixed_size_test_packet() {
        let mut codec = WireCodec::new(Role::Sender);
        let mut bytes = BytesMut::new();

        codec.encode(&TestPacket::new(2, 9, 3), &mut bytes).unwrap();
        assert_eq!(bytes.len(), TEST_DATAGRAM_LEN);
        assert_eq!(&bytes[..25], b"         2/         9:AAA");
    }

    #[test]
    fn test_codec_sender_decodes_light_control() {
        let mut codec = WireCodec::new(Role::Sender);
        let mut bytes = BytesMut::new();
        codec.encode(&LightControlMessage::new(0, true), &mut bytes).unwrap();

        let decoded = codec.decode(&mut bytes).unwrap();
        assert_eq!(decoded, Some(Datagram::LightControl(LightControlMessage::new(0, true))));
        assert!(bytes.is_empty());
        assert_eq!(codec.decode(&mut bytes).unwrap(), None);
    }

    #[test]
    fn test_codec_sender_uses_carry_state() {
        let mut codec = WireCodec::new(Role::Sender);
        codec.set_carry_state(true);

        let mut bytes = BytesMut::from(&b"t:lights;g:001;"[..]);
        match codec.decode(&mut bytes).unwrap() {
            Some(Datagram::LightControl(message)) => assert!(message.state),
            other => panic!("Expected light control, got {:?}", other),
        }

        let mut bytes = BytesMut::from(&b"hello"[..]);
        assert_eq!(
            codec.decode(&mut bytes).unwrap(),
            Some(Datagram::Unrecognised { len: 5 })
        );
    }

    #[test]
    fn test_codec_receiver_decodes_test_packet() {
        let mut codec = WireCodec::new(Role::Receiver);
        let mut bytes = BytesMut::new();
        codec.encode(&TestPacket::new(4, 4, 10), &mut bytes).unwrap();

        match codec.decode(&mut bytes).unwrap() {
            Some(Datagram::Test { header, end_marker, len }) => {
                assert_eq!(header, TestPacketHeader { sequence_number: 4, goal_count: 4 });
                assert!(end_marker);
                assert_eq!(len, TEST_DATAGRAM_LEN);
            }
            other => panic!("Expected test packet, got {:?}", other),
        }
    }
}

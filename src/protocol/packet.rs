//! Typed packet subset for protocol 340 (Minecraft 1.12.2).
//!
//! Full parsing of the protocol is _not_ implemented. Only the packets
//! (and, for some, only the leading fields) needed for session tracking
//! and world replay are decoded. Everything else is relayed as an opaque
//! [`RawFrame`](crate::protocol::RawFrame), which retains its original
//! wire bytes for lossless retransmission.

use crate::protocol::{Decode, DecodeError, Decoder, RawFrame};

pub mod clientbound;
pub mod serverbound;

/// A packet type with a fixed protocol id.
pub trait PacketId {
    const ID: i32;
}

/// Decodes `frame` as `P`, failing if the frame's id is not `P::ID`.
///
/// Used by the login state machines, where the next packet type is
/// prescribed by the exchange.
pub fn expect<P: PacketId + Decode>(frame: &RawFrame) -> Result<P, DecodeError> {
    if frame.id() != P::ID {
        return Err(DecodeError::InvalidPacketId {
            expected: P::ID,
            actual: frame.id(),
        });
    }
    P::decode(&mut Decoder::new(frame.fields()))
}

/// Asserts that a packet survives encode/decode untouched, plain and
/// at both sides of the compression boundary. Test-only.
#[cfg(test)]
pub(crate) fn assert_round_trip<P>(packet: P)
where
    P: PacketId + crate::protocol::Encode + Decode + PartialEq + std::fmt::Debug,
{
    use crate::protocol::{encode_frame, CompressionThreshold, RecvCodec};

    let frame = crate::protocol::test_frame(&packet);
    assert_eq!(expect::<P>(&frame).unwrap(), packet);

    // threshold 0 forces deflate; a large threshold forces the
    // zero-indicator framing
    for threshold in [0, 1 << 20] {
        let threshold = CompressionThreshold::new(threshold);
        let mut data = encode_frame(Some(threshold), &packet).unwrap();
        let mut codec = RecvCodec::new();
        codec.enable_compression(threshold);
        codec.give_data(&mut data);
        let frame = codec.next_frame().unwrap().expect("whole frame was given");
        assert_eq!(expect::<P>(&frame).unwrap(), packet);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::test_frame;

    #[test]
    fn expect_rejects_wrong_id() {
        let frame = test_frame(&serverbound::play::KeepAlive { id: 1 });
        let result = expect::<serverbound::play::TeleportConfirm>(&frame);
        assert!(matches!(
            result,
            Err(DecodeError::InvalidPacketId {
                expected: 0x00,
                actual: 0x0B
            })
        ));
    }

    #[test]
    fn expect_decodes_matching_id() {
        let frame = test_frame(&serverbound::login::Handshake {
            protocol_version: 340,
            server_address: "mc.example.org".to_owned(),
            server_port: 25565,
            next_state: 2,
        });
        let handshake: serverbound::login::Handshake = expect(&frame).unwrap();
        assert_eq!(handshake.protocol_version, 340);
        assert_eq!(handshake.server_address, "mc.example.org");
        assert_eq!(handshake.server_port, 25565);
        assert_eq!(handshake.next_state, 2);
    }
}

//! Packets sent by the client (or synthesized by the proxy acting as one).

/// Login-state packets.
pub mod login {
    use crate::protocol::{
        packet::PacketId, Decode, DecodeError, Decoder, Encode, Encoder,
    };

    #[derive(Debug, Clone, PartialEq)]
    pub struct Handshake {
        pub protocol_version: i32,
        pub server_address: String,
        pub server_port: u16,
        pub next_state: i32,
    }

    impl Handshake {
        /// `next_state` value requesting a login exchange.
        pub const NEXT_STATE_LOGIN: i32 = 2;
    }

    impl PacketId for Handshake {
        const ID: i32 = 0x00;
    }

    impl Encode for Handshake {
        fn encode(&self, encoder: &mut Encoder) {
            encoder.write_var_int(self.protocol_version);
            encoder.write_string(&self.server_address);
            encoder.write_u16(self.server_port);
            encoder.write_var_int(self.next_state);
        }
    }

    impl Decode for Handshake {
        fn decode(decoder: &mut Decoder) -> Result<Self, DecodeError> {
            Ok(Self {
                protocol_version: decoder.read_var_int()?,
                server_address: decoder.read_string()?.to_owned(),
                server_port: decoder.read_u16()?,
                next_state: decoder.read_var_int()?,
            })
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    pub struct LoginStart {
        pub name: String,
    }

    impl PacketId for LoginStart {
        const ID: i32 = 0x00;
    }

    impl Encode for LoginStart {
        fn encode(&self, encoder: &mut Encoder) {
            encoder.write_string(&self.name);
        }
    }

    impl Decode for LoginStart {
        fn decode(decoder: &mut Decoder) -> Result<Self, DecodeError> {
            Ok(Self {
                name: decoder.read_string()?.to_owned(),
            })
        }
    }

    /// Both fields are encrypted with the server's RSA public key.
    #[derive(Debug, Clone, PartialEq)]
    pub struct EncryptionResponse {
        pub shared_secret: Vec<u8>,
        pub verify_token: Vec<u8>,
    }

    impl PacketId for EncryptionResponse {
        const ID: i32 = 0x01;
    }

    impl Encode for EncryptionResponse {
        fn encode(&self, encoder: &mut Encoder) {
            encoder.write_byte_array(&self.shared_secret);
            encoder.write_byte_array(&self.verify_token);
        }
    }

    impl Decode for EncryptionResponse {
        fn decode(decoder: &mut Decoder) -> Result<Self, DecodeError> {
            Ok(Self {
                shared_secret: decoder.read_byte_array()?.to_vec(),
                verify_token: decoder.read_byte_array()?.to_vec(),
            })
        }
    }
}

/// Play-state packets.
pub mod play {
    use crate::protocol::{
        packet::PacketId, Decode, DecodeError, Decoder, Encode, Encoder, RawFrame,
    };

    /// The typed serverbound subset the proxy inspects while relaying
    /// client traffic upstream. Every other id is forwarded opaque.
    #[derive(Debug, Clone, strum::AsRefStr)]
    pub enum Packet {
        TeleportConfirm(TeleportConfirm),
        PlayerPosition(PlayerPosition),
        PlayerPositionAndLook(PlayerPositionAndLook),
        PlayerAbilities(PlayerAbilities),
        HeldItemChange(HeldItemChange),
    }

    impl Packet {
        /// Decodes the typed subset needed for client-side bookkeeping.
        /// Returns `None` for ids outside the subset.
        pub fn classify(frame: &RawFrame) -> Result<Option<Self>, DecodeError> {
            let mut decoder = Decoder::new(frame.fields());
            let packet = match frame.id() {
                TeleportConfirm::ID => {
                    Packet::TeleportConfirm(TeleportConfirm::decode(&mut decoder)?)
                }
                PlayerPosition::ID => {
                    Packet::PlayerPosition(PlayerPosition::decode(&mut decoder)?)
                }
                PlayerPositionAndLook::ID => {
                    Packet::PlayerPositionAndLook(PlayerPositionAndLook::decode(&mut decoder)?)
                }
                PlayerAbilities::ID => {
                    Packet::PlayerAbilities(PlayerAbilities::decode(&mut decoder)?)
                }
                HeldItemChange::ID => {
                    Packet::HeldItemChange(HeldItemChange::decode(&mut decoder)?)
                }
                _ => return Ok(None),
            };
            Ok(Some(packet))
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    pub struct TeleportConfirm {
        pub teleport_id: i32,
    }

    impl PacketId for TeleportConfirm {
        const ID: i32 = 0x00;
    }

    impl Encode for TeleportConfirm {
        fn encode(&self, encoder: &mut Encoder) {
            encoder.write_var_int(self.teleport_id);
        }
    }

    impl Decode for TeleportConfirm {
        fn decode(decoder: &mut Decoder) -> Result<Self, DecodeError> {
            Ok(Self {
                teleport_id: decoder.read_var_int()?,
            })
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    pub struct ChatMessage {
        pub message: String,
    }

    impl PacketId for ChatMessage {
        const ID: i32 = 0x02;
    }

    impl Encode for ChatMessage {
        fn encode(&self, encoder: &mut Encoder) {
            encoder.write_string(&self.message);
        }
    }

    /// `action_id` 0 requests a (re)spawn.
    #[derive(Debug, Clone, PartialEq)]
    pub struct ClientStatus {
        pub action_id: i32,
    }

    impl ClientStatus {
        pub const ACTION_RESPAWN: i32 = 0;
    }

    impl PacketId for ClientStatus {
        const ID: i32 = 0x03;
    }

    impl Encode for ClientStatus {
        fn encode(&self, encoder: &mut Encoder) {
            encoder.write_var_int(self.action_id);
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    pub struct KeepAlive {
        pub id: i64,
    }

    impl PacketId for KeepAlive {
        const ID: i32 = 0x0B;
    }

    impl Encode for KeepAlive {
        fn encode(&self, encoder: &mut Encoder) {
            encoder.write_i64(self.id);
        }
    }

    impl Decode for KeepAlive {
        fn decode(decoder: &mut Decoder) -> Result<Self, DecodeError> {
            Ok(Self {
                id: decoder.read_i64()?,
            })
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    pub struct PlayerPosition {
        pub x: f64,
        pub y: f64,
        pub z: f64,
        pub on_ground: bool,
    }

    impl PacketId for PlayerPosition {
        const ID: i32 = 0x0D;
    }

    impl Encode for PlayerPosition {
        fn encode(&self, encoder: &mut Encoder) {
            encoder.write_f64(self.x);
            encoder.write_f64(self.y);
            encoder.write_f64(self.z);
            encoder.write_bool(self.on_ground);
        }
    }

    impl Decode for PlayerPosition {
        fn decode(decoder: &mut Decoder) -> Result<Self, DecodeError> {
            Ok(Self {
                x: decoder.read_f64()?,
                y: decoder.read_f64()?,
                z: decoder.read_f64()?,
                on_ground: decoder.read_bool()?,
            })
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    pub struct PlayerPositionAndLook {
        pub x: f64,
        pub y: f64,
        pub z: f64,
        pub yaw: f32,
        pub pitch: f32,
        pub on_ground: bool,
    }

    impl PacketId for PlayerPositionAndLook {
        const ID: i32 = 0x0E;
    }

    impl Encode for PlayerPositionAndLook {
        fn encode(&self, encoder: &mut Encoder) {
            encoder.write_f64(self.x);
            encoder.write_f64(self.y);
            encoder.write_f64(self.z);
            encoder.write_f32(self.yaw);
            encoder.write_f32(self.pitch);
            encoder.write_bool(self.on_ground);
        }
    }

    impl Decode for PlayerPositionAndLook {
        fn decode(decoder: &mut Decoder) -> Result<Self, DecodeError> {
            Ok(Self {
                x: decoder.read_f64()?,
                y: decoder.read_f64()?,
                z: decoder.read_f64()?,
                yaw: decoder.read_f32()?,
                pitch: decoder.read_f32()?,
                on_ground: decoder.read_bool()?,
            })
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    pub struct PlayerLook {
        pub yaw: f32,
        pub pitch: f32,
        pub on_ground: bool,
    }

    impl PacketId for PlayerLook {
        const ID: i32 = 0x0F;
    }

    impl Encode for PlayerLook {
        fn encode(&self, encoder: &mut Encoder) {
            encoder.write_f32(self.yaw);
            encoder.write_f32(self.pitch);
            encoder.write_bool(self.on_ground);
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    pub struct PlayerAbilities {
        pub flags: i8,
        pub flying_speed: f32,
        pub walking_speed: f32,
    }

    impl PacketId for PlayerAbilities {
        const ID: i32 = 0x13;
    }

    impl Encode for PlayerAbilities {
        fn encode(&self, encoder: &mut Encoder) {
            encoder.write_i8(self.flags);
            encoder.write_f32(self.flying_speed);
            encoder.write_f32(self.walking_speed);
        }
    }

    impl Decode for PlayerAbilities {
        fn decode(decoder: &mut Decoder) -> Result<Self, DecodeError> {
            Ok(Self {
                flags: decoder.read_i8()?,
                flying_speed: decoder.read_f32()?,
                walking_speed: decoder.read_f32()?,
            })
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    pub struct HeldItemChange {
        pub slot: i16,
    }

    impl PacketId for HeldItemChange {
        const ID: i32 = 0x1A;
    }

    impl Encode for HeldItemChange {
        fn encode(&self, encoder: &mut Encoder) {
            encoder.write_i16(self.slot);
        }
    }

    impl Decode for HeldItemChange {
        fn decode(decoder: &mut Decoder) -> Result<Self, DecodeError> {
            Ok(Self {
                slot: decoder.read_i16()?,
            })
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    pub struct Animation {
        pub hand: i32,
    }

    impl PacketId for Animation {
        const ID: i32 = 0x1D;
    }

    impl Encode for Animation {
        fn encode(&self, encoder: &mut Encoder) {
            encoder.write_var_int(self.hand);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{login, play};
    use crate::protocol::{packet::assert_round_trip, test_frame};

    #[test]
    fn login_packets_round_trip() {
        assert_round_trip(login::Handshake {
            protocol_version: 340,
            server_address: "play.example.org".to_owned(),
            server_port: 25565,
            next_state: 2,
        });
        assert_round_trip(login::LoginStart {
            name: "Notch".to_owned(),
        });
        assert_round_trip(login::EncryptionResponse {
            shared_secret: vec![1; 128],
            verify_token: vec![2; 128],
        });
    }

    #[test]
    fn play_packets_round_trip() {
        assert_round_trip(play::TeleportConfirm { teleport_id: 19 });
        assert_round_trip(play::KeepAlive { id: 123_456_789 });
        assert_round_trip(play::PlayerPosition {
            x: 0.5,
            y: 64.0,
            z: 0.5,
            on_ground: true,
        });
        assert_round_trip(play::PlayerPositionAndLook {
            x: -10.0,
            y: 80.5,
            z: 3.25,
            yaw: 359.0,
            pitch: 15.0,
            on_ground: false,
        });
        assert_round_trip(play::PlayerAbilities {
            flags: 0,
            flying_speed: 0.05,
            walking_speed: 0.1,
        });
        assert_round_trip(play::HeldItemChange { slot: 4 });
    }

    #[test]
    fn classify_covers_the_bookkeeping_subset() {
        let cases: Vec<(crate::protocol::RawFrame, &str)> = vec![
            (
                test_frame(&play::TeleportConfirm { teleport_id: 1 }),
                "TeleportConfirm",
            ),
            (
                test_frame(&play::PlayerPosition {
                    x: 0.0,
                    y: 0.0,
                    z: 0.0,
                    on_ground: true,
                }),
                "PlayerPosition",
            ),
            (
                test_frame(&play::PlayerPositionAndLook {
                    x: 0.0,
                    y: 0.0,
                    z: 0.0,
                    yaw: 0.0,
                    pitch: 0.0,
                    on_ground: true,
                }),
                "PlayerPositionAndLook",
            ),
            (
                test_frame(&play::PlayerAbilities {
                    flags: 0,
                    flying_speed: 0.0,
                    walking_speed: 0.0,
                }),
                "PlayerAbilities",
            ),
            (
                test_frame(&play::HeldItemChange { slot: 0 }),
                "HeldItemChange",
            ),
        ];
        for (frame, expected) in cases {
            let packet = play::Packet::classify(&frame)
                .unwrap()
                .expect("subset id must classify");
            assert_eq!(packet.as_ref(), expected);
        }

        let chat = test_frame(&play::ChatMessage {
            message: "/help".to_owned(),
        });
        assert!(play::Packet::classify(&chat).unwrap().is_none());
    }
}

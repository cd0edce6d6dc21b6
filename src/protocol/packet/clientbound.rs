//! Packets sent by the server.

/// Login-state packets.
pub mod login {
    use crate::protocol::{
        packet::PacketId, Decode, DecodeError, Decoder, Encode, Encoder,
    };

    #[derive(Debug, Clone, PartialEq)]
    pub struct Disconnect {
        pub reason: String,
    }

    impl PacketId for Disconnect {
        const ID: i32 = 0x00;
    }

    impl Decode for Disconnect {
        fn decode(decoder: &mut Decoder) -> Result<Self, DecodeError> {
            Ok(Self {
                reason: decoder.read_string()?.to_owned(),
            })
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    pub struct EncryptionRequest {
        pub server_id: String,
        pub public_key: Vec<u8>,
        pub verify_token: Vec<u8>,
    }

    impl PacketId for EncryptionRequest {
        const ID: i32 = 0x01;
    }

    impl Encode for EncryptionRequest {
        fn encode(&self, encoder: &mut Encoder) {
            encoder.write_string(&self.server_id);
            encoder.write_byte_array(&self.public_key);
            encoder.write_byte_array(&self.verify_token);
        }
    }

    impl Decode for EncryptionRequest {
        fn decode(decoder: &mut Decoder) -> Result<Self, DecodeError> {
            Ok(Self {
                server_id: decoder.read_string()?.to_owned(),
                public_key: decoder.read_byte_array()?.to_vec(),
                verify_token: decoder.read_byte_array()?.to_vec(),
            })
        }
    }

    /// The uuid is transmitted as a hyphenated string in this
    /// protocol version, not as raw bytes.
    #[derive(Debug, Clone, PartialEq)]
    pub struct LoginSuccess {
        pub uuid: String,
        pub username: String,
    }

    impl PacketId for LoginSuccess {
        const ID: i32 = 0x02;
    }

    impl Encode for LoginSuccess {
        fn encode(&self, encoder: &mut Encoder) {
            encoder.write_string(&self.uuid);
            encoder.write_string(&self.username);
        }
    }

    impl Decode for LoginSuccess {
        fn decode(decoder: &mut Decoder) -> Result<Self, DecodeError> {
            Ok(Self {
                uuid: decoder.read_string()?.to_owned(),
                username: decoder.read_string()?.to_owned(),
            })
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    pub struct SetCompression {
        pub threshold: i32,
    }

    impl PacketId for SetCompression {
        const ID: i32 = 0x03;
    }

    impl Encode for SetCompression {
        fn encode(&self, encoder: &mut Encoder) {
            encoder.write_var_int(self.threshold);
        }
    }

    impl Decode for SetCompression {
        fn decode(decoder: &mut Decoder) -> Result<Self, DecodeError> {
            Ok(Self {
                threshold: decoder.read_var_int()?,
            })
        }
    }
}

/// Play-state packets.
pub mod play {
    use crate::protocol::{
        packet::PacketId, Decode, DecodeError, Decoder, Encode, Encoder, RawFrame,
    };
    use uuid::Uuid;

    /// Singleton packets retained "latest wins" for the world-join
    /// replay, in the order they must be replayed. ServerDifficulty,
    /// SpawnPosition and Experience are never field-decoded; their ids
    /// only key the replay log.
    pub const JOIN_LOG_IDS: [i32; 5] = [
        JoinGame::ID,
        SERVER_DIFFICULTY_ID,
        SPAWN_POSITION_ID,
        Respawn::ID,
        EXPERIENCE_ID,
    ];

    pub const SERVER_DIFFICULTY_ID: i32 = 0x0D;
    pub const SPAWN_POSITION_ID: i32 = 0x46;
    pub const EXPERIENCE_ID: i32 = 0x40;

    /// The typed clientbound subset the proxy inspects. Every other id
    /// is forwarded opaque.
    #[derive(Debug, Clone, strum::AsRefStr)]
    pub enum Packet {
        SpawnEntity(SpawnEntity),
        ChatMessage(ChatMessage),
        SetSlot(SetSlot),
        Disconnect(Disconnect),
        UnloadChunk(UnloadChunk),
        ChangeGameState(ChangeGameState),
        KeepAlive(KeepAlive),
        ChunkData(ChunkData),
        JoinGame(JoinGame),
        PlayerAbilities(PlayerAbilities),
        PlayerListItem(PlayerListItem),
        PlayerPositionAndLook(PlayerPositionAndLook),
        DestroyEntities(DestroyEntities),
        Respawn(Respawn),
        HeldItemChange(HeldItemChange),
        UpdateHealth(UpdateHealth),
        TimeUpdate(TimeUpdate),
    }

    impl Packet {
        /// Decodes the typed subset needed for state tracking.
        /// Returns `None` for ids outside the subset.
        pub fn classify(frame: &RawFrame) -> Result<Option<Self>, DecodeError> {
            let mut decoder = Decoder::new(frame.fields());
            let packet = match frame.id() {
                id if SpawnEntity::IDS.contains(&id) => {
                    Packet::SpawnEntity(SpawnEntity::decode(&mut decoder)?)
                }
                ChatMessage::ID => Packet::ChatMessage(ChatMessage::decode(&mut decoder)?),
                SetSlot::ID => Packet::SetSlot(SetSlot::decode(&mut decoder)?),
                Disconnect::ID => Packet::Disconnect(Disconnect::decode(&mut decoder)?),
                UnloadChunk::ID => Packet::UnloadChunk(UnloadChunk::decode(&mut decoder)?),
                ChangeGameState::ID => {
                    Packet::ChangeGameState(ChangeGameState::decode(&mut decoder)?)
                }
                KeepAlive::ID => Packet::KeepAlive(KeepAlive::decode(&mut decoder)?),
                ChunkData::ID => Packet::ChunkData(ChunkData::decode(&mut decoder)?),
                JoinGame::ID => Packet::JoinGame(JoinGame::decode(&mut decoder)?),
                PlayerAbilities::ID => {
                    Packet::PlayerAbilities(PlayerAbilities::decode(&mut decoder)?)
                }
                PlayerListItem::ID => {
                    Packet::PlayerListItem(PlayerListItem::decode(&mut decoder)?)
                }
                PlayerPositionAndLook::ID => {
                    Packet::PlayerPositionAndLook(PlayerPositionAndLook::decode(&mut decoder)?)
                }
                DestroyEntities::ID => {
                    Packet::DestroyEntities(DestroyEntities::decode(&mut decoder)?)
                }
                Respawn::ID => Packet::Respawn(Respawn::decode(&mut decoder)?),
                HeldItemChange::ID => {
                    Packet::HeldItemChange(HeldItemChange::decode(&mut decoder)?)
                }
                UpdateHealth::ID => Packet::UpdateHealth(UpdateHealth::decode(&mut decoder)?),
                TimeUpdate::ID => Packet::TimeUpdate(TimeUpdate::decode(&mut decoder)?),
                _ => return Ok(None),
            };
            Ok(Some(packet))
        }
    }

    /// The family of "spawn X" packets. Only the leading entity id is
    /// decoded; the remainder of the layout varies per variant and is
    /// kept opaque.
    #[derive(Debug, Clone, PartialEq)]
    pub struct SpawnEntity {
        pub entity_id: i32,
    }

    impl SpawnEntity {
        /// SpawnObject, SpawnExperienceOrb, SpawnMob, SpawnPainting,
        /// SpawnPlayer, Entity.
        pub const IDS: [i32; 6] = [0x00, 0x01, 0x03, 0x04, 0x05, 0x25];
    }

    impl Decode for SpawnEntity {
        fn decode(decoder: &mut Decoder) -> Result<Self, DecodeError> {
            Ok(Self {
                entity_id: decoder.read_var_int()?,
            })
        }
    }

    /// The chat field is the raw JSON component; the proxy only logs it.
    #[derive(Debug, Clone, PartialEq)]
    pub struct ChatMessage {
        pub chat: String,
        pub position: i8,
    }

    impl PacketId for ChatMessage {
        const ID: i32 = 0x0F;
    }

    impl Encode for ChatMessage {
        fn encode(&self, encoder: &mut Encoder) {
            encoder.write_string(&self.chat);
            encoder.write_i8(self.position);
        }
    }

    impl Decode for ChatMessage {
        fn decode(decoder: &mut Decoder) -> Result<Self, DecodeError> {
            Ok(Self {
                chat: decoder.read_string()?.to_owned(),
                position: decoder.read_i8()?,
            })
        }
    }

    /// Only the window and slot indices are decoded; the trailing slot
    /// data varies by item and is not needed.
    #[derive(Debug, Clone, PartialEq)]
    pub struct SetSlot {
        pub window_id: i8,
        pub slot: i16,
    }

    impl PacketId for SetSlot {
        const ID: i32 = 0x16;
    }

    impl Encode for SetSlot {
        fn encode(&self, encoder: &mut Encoder) {
            encoder.write_i8(self.window_id);
            encoder.write_i16(self.slot);
        }
    }

    impl Decode for SetSlot {
        fn decode(decoder: &mut Decoder) -> Result<Self, DecodeError> {
            Ok(Self {
                window_id: decoder.read_i8()?,
                slot: decoder.read_i16()?,
            })
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    pub struct Disconnect {
        pub reason: String,
    }

    impl PacketId for Disconnect {
        const ID: i32 = 0x1A;
    }

    impl Encode for Disconnect {
        fn encode(&self, encoder: &mut Encoder) {
            encoder.write_string(&self.reason);
        }
    }

    impl Decode for Disconnect {
        fn decode(decoder: &mut Decoder) -> Result<Self, DecodeError> {
            Ok(Self {
                reason: decoder.read_string()?.to_owned(),
            })
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    pub struct UnloadChunk {
        pub chunk_x: i32,
        pub chunk_z: i32,
    }

    impl PacketId for UnloadChunk {
        const ID: i32 = 0x1D;
    }

    impl Encode for UnloadChunk {
        fn encode(&self, encoder: &mut Encoder) {
            encoder.write_i32(self.chunk_x);
            encoder.write_i32(self.chunk_z);
        }
    }

    impl Decode for UnloadChunk {
        fn decode(decoder: &mut Decoder) -> Result<Self, DecodeError> {
            Ok(Self {
                chunk_x: decoder.read_i32()?,
                chunk_z: decoder.read_i32()?,
            })
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    pub struct ChangeGameState {
        pub reason: u8,
        pub value: f32,
    }

    impl ChangeGameState {
        /// Reason code for a gamemode change.
        pub const REASON_GAMEMODE: u8 = 3;
    }

    impl PacketId for ChangeGameState {
        const ID: i32 = 0x1E;
    }

    impl Encode for ChangeGameState {
        fn encode(&self, encoder: &mut Encoder) {
            encoder.write_u8(self.reason);
            encoder.write_f32(self.value);
        }
    }

    impl Decode for ChangeGameState {
        fn decode(decoder: &mut Decoder) -> Result<Self, DecodeError> {
            Ok(Self {
                reason: decoder.read_u8()?,
                value: decoder.read_f32()?,
            })
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    pub struct KeepAlive {
        pub id: i64,
    }

    impl PacketId for KeepAlive {
        const ID: i32 = 0x1F;
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

    /// Only the chunk coordinates are decoded; the section data is
    /// relayed opaque.
    #[derive(Debug, Clone, PartialEq)]
    pub struct ChunkData {
        pub chunk_x: i32,
        pub chunk_z: i32,
    }

    impl PacketId for ChunkData {
        const ID: i32 = 0x20;
    }

    impl Encode for ChunkData {
        fn encode(&self, encoder: &mut Encoder) {
            encoder.write_i32(self.chunk_x);
            encoder.write_i32(self.chunk_z);
        }
    }

    impl Decode for ChunkData {
        fn decode(decoder: &mut Decoder) -> Result<Self, DecodeError> {
            Ok(Self {
                chunk_x: decoder.read_i32()?,
                chunk_z: decoder.read_i32()?,
            })
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    pub struct JoinGame {
        pub entity_id: i32,
        pub gamemode: u8,
        pub dimension: i32,
        pub difficulty: u8,
        pub max_players: u8,
        pub level_type: String,
        pub reduced_debug_info: bool,
    }

    impl PacketId for JoinGame {
        const ID: i32 = 0x23;
    }

    impl Encode for JoinGame {
        fn encode(&self, encoder: &mut Encoder) {
            encoder.write_i32(self.entity_id);
            encoder.write_u8(self.gamemode);
            encoder.write_i32(self.dimension);
            encoder.write_u8(self.difficulty);
            encoder.write_u8(self.max_players);
            encoder.write_string(&self.level_type);
            encoder.write_bool(self.reduced_debug_info);
        }
    }

    impl Decode for JoinGame {
        fn decode(decoder: &mut Decoder) -> Result<Self, DecodeError> {
            Ok(Self {
                entity_id: decoder.read_i32()?,
                gamemode: decoder.read_u8()?,
                dimension: decoder.read_i32()?,
                difficulty: decoder.read_u8()?,
                max_players: decoder.read_u8()?,
                level_type: decoder.read_string()?.to_owned(),
                reduced_debug_info: decoder.read_bool()?,
            })
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    pub struct PlayerAbilities {
        pub flags: i8,
        pub flying_speed: f32,
        pub fov_modifier: f32,
    }

    impl PacketId for PlayerAbilities {
        const ID: i32 = 0x2C;
    }

    impl Encode for PlayerAbilities {
        fn encode(&self, encoder: &mut Encoder) {
            encoder.write_i8(self.flags);
            encoder.write_f32(self.flying_speed);
            encoder.write_f32(self.fov_modifier);
        }
    }

    impl Decode for PlayerAbilities {
        fn decode(decoder: &mut Decoder) -> Result<Self, DecodeError> {
            Ok(Self {
                flags: decoder.read_i8()?,
                flying_speed: decoder.read_f32()?,
                fov_modifier: decoder.read_f32()?,
            })
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    pub struct PlayerListItem {
        pub entries: Vec<PlayerListEntry>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub struct PlayerListEntry {
        pub uuid: Uuid,
        pub action: PlayerListAction,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum PlayerListAction {
        Add {
            name: String,
            gamemode: i32,
            ping: i32,
            display_name: Option<String>,
        },
        UpdateGamemode(i32),
        UpdateLatency(i32),
        UpdateDisplayName(Option<String>),
        Remove,
    }

    impl PacketId for PlayerListItem {
        const ID: i32 = 0x2E;
    }

    impl Decode for PlayerListItem {
        fn decode(decoder: &mut Decoder) -> Result<Self, DecodeError> {
            let action = decoder.read_var_int()?;
            let count = usize::try_from(decoder.read_var_int()?)?;
            let mut entries = Vec::with_capacity(count.min(1024));
            for _ in 0..count {
                let uuid = decoder.read_uuid()?;
                let action = match action {
                    0 => {
                        let name = decoder.read_string()?.to_owned();
                        let properties = usize::try_from(decoder.read_var_int()?)?;
                        for _ in 0..properties {
                            decoder.read_string()?;
                            decoder.read_string()?;
                            if decoder.read_bool()? {
                                decoder.read_string()?;
                            }
                        }
                        let gamemode = decoder.read_var_int()?;
                        let ping = decoder.read_var_int()?;
                        let display_name = if decoder.read_bool()? {
                            Some(decoder.read_string()?.to_owned())
                        } else {
                            None
                        };
                        PlayerListAction::Add {
                            name,
                            gamemode,
                            ping,
                            display_name,
                        }
                    }
                    1 => PlayerListAction::UpdateGamemode(decoder.read_var_int()?),
                    2 => PlayerListAction::UpdateLatency(decoder.read_var_int()?),
                    3 => {
                        let display_name = if decoder.read_bool()? {
                            Some(decoder.read_string()?.to_owned())
                        } else {
                            None
                        };
                        PlayerListAction::UpdateDisplayName(display_name)
                    }
                    4 => PlayerListAction::Remove,
                    other => return Err(DecodeError::InvalidPlayerListAction(other)),
                };
                entries.push(PlayerListEntry { uuid, action });
            }
            Ok(Self { entries })
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    pub struct PlayerPositionAndLook {
        pub x: f64,
        pub y: f64,
        pub z: f64,
        pub yaw: f32,
        pub pitch: f32,
        pub flags: i8,
        pub teleport_id: i32,
    }

    impl PacketId for PlayerPositionAndLook {
        const ID: i32 = 0x2F;
    }

    impl Encode for PlayerPositionAndLook {
        fn encode(&self, encoder: &mut Encoder) {
            encoder.write_f64(self.x);
            encoder.write_f64(self.y);
            encoder.write_f64(self.z);
            encoder.write_f32(self.yaw);
            encoder.write_f32(self.pitch);
            encoder.write_i8(self.flags);
            encoder.write_var_int(self.teleport_id);
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
                flags: decoder.read_i8()?,
                teleport_id: decoder.read_var_int()?,
            })
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    pub struct DestroyEntities {
        pub entity_ids: Vec<i32>,
    }

    impl PacketId for DestroyEntities {
        const ID: i32 = 0x32;
    }

    impl Encode for DestroyEntities {
        fn encode(&self, encoder: &mut Encoder) {
            encoder.write_var_int_array(&self.entity_ids);
        }
    }

    impl Decode for DestroyEntities {
        fn decode(decoder: &mut Decoder) -> Result<Self, DecodeError> {
            Ok(Self {
                entity_ids: decoder.read_var_int_array()?,
            })
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    pub struct Respawn {
        pub dimension: i32,
        pub difficulty: u8,
        pub gamemode: u8,
        pub level_type: String,
    }

    impl PacketId for Respawn {
        const ID: i32 = 0x35;
    }

    impl Encode for Respawn {
        fn encode(&self, encoder: &mut Encoder) {
            encoder.write_i32(self.dimension);
            encoder.write_u8(self.difficulty);
            encoder.write_u8(self.gamemode);
            encoder.write_string(&self.level_type);
        }
    }

    impl Decode for Respawn {
        fn decode(decoder: &mut Decoder) -> Result<Self, DecodeError> {
            Ok(Self {
                dimension: decoder.read_i32()?,
                difficulty: decoder.read_u8()?,
                gamemode: decoder.read_u8()?,
                level_type: decoder.read_string()?.to_owned(),
            })
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    pub struct HeldItemChange {
        pub slot: i8,
    }

    impl PacketId for HeldItemChange {
        const ID: i32 = 0x3A;
    }

    impl Encode for HeldItemChange {
        fn encode(&self, encoder: &mut Encoder) {
            encoder.write_i8(self.slot);
        }
    }

    impl Decode for HeldItemChange {
        fn decode(decoder: &mut Decoder) -> Result<Self, DecodeError> {
            Ok(Self {
                slot: decoder.read_i8()?,
            })
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    pub struct UpdateHealth {
        pub health: f32,
        pub food: i32,
        pub food_saturation: f32,
    }

    impl PacketId for UpdateHealth {
        const ID: i32 = 0x41;
    }

    impl Encode for UpdateHealth {
        fn encode(&self, encoder: &mut Encoder) {
            encoder.write_f32(self.health);
            encoder.write_var_int(self.food);
            encoder.write_f32(self.food_saturation);
        }
    }

    impl Decode for UpdateHealth {
        fn decode(decoder: &mut Decoder) -> Result<Self, DecodeError> {
            Ok(Self {
                health: decoder.read_f32()?,
                food: decoder.read_var_int()?,
                food_saturation: decoder.read_f32()?,
            })
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    pub struct TimeUpdate {
        pub world_age: i64,
        pub time_of_day: i64,
    }

    impl PacketId for TimeUpdate {
        const ID: i32 = 0x47;
    }

    impl Encode for TimeUpdate {
        fn encode(&self, encoder: &mut Encoder) {
            encoder.write_i64(self.world_age);
            encoder.write_i64(self.time_of_day);
        }
    }

    impl Decode for TimeUpdate {
        fn decode(decoder: &mut Decoder) -> Result<Self, DecodeError> {
            Ok(Self {
                world_age: decoder.read_i64()?,
                time_of_day: decoder.read_i64()?,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{login, play};
    use crate::protocol::{
        packet::{assert_round_trip, PacketId},
        test_frame, test_frame_raw,
    };

    #[test]
    fn login_packets_round_trip() {
        assert_round_trip(login::EncryptionRequest {
            server_id: String::new(),
            public_key: vec![0x30, 0x81, 0x9F, 0x00],
            verify_token: vec![9, 8, 7, 6],
        });
        assert_round_trip(login::LoginSuccess {
            uuid: "069a79f4-44e9-4726-a5be-fca90e38aaf5".to_owned(),
            username: "Notch".to_owned(),
        });
        assert_round_trip(login::SetCompression { threshold: 256 });
    }

    #[test]
    fn play_packets_round_trip() {
        assert_round_trip(play::ChatMessage {
            chat: r#"{"text":"hello"}"#.to_owned(),
            position: 1,
        });
        assert_round_trip(play::SetSlot {
            window_id: 0,
            slot: 36,
        });
        assert_round_trip(play::Disconnect {
            reason: r#"{"text":"kicked"}"#.to_owned(),
        });
        assert_round_trip(play::UnloadChunk {
            chunk_x: -3,
            chunk_z: 12,
        });
        assert_round_trip(play::ChangeGameState {
            reason: 3,
            value: 1.0,
        });
        assert_round_trip(play::KeepAlive { id: -77 });
        assert_round_trip(play::ChunkData {
            chunk_x: 100,
            chunk_z: -100,
        });
        assert_round_trip(play::JoinGame {
            entity_id: 321,
            gamemode: 1,
            dimension: -1,
            difficulty: 2,
            max_players: 20,
            level_type: "default".to_owned(),
            reduced_debug_info: false,
        });
        assert_round_trip(play::PlayerAbilities {
            flags: 0x04,
            flying_speed: 0.05,
            fov_modifier: 0.1,
        });
        assert_round_trip(play::PlayerPositionAndLook {
            x: 7.5,
            y: 70.0,
            z: -12.25,
            yaw: 180.0,
            pitch: -90.0,
            flags: 0,
            teleport_id: 5,
        });
        assert_round_trip(play::DestroyEntities {
            entity_ids: vec![1, 300, 70000],
        });
        assert_round_trip(play::Respawn {
            dimension: 1,
            difficulty: 0,
            gamemode: 0,
            level_type: "flat".to_owned(),
        });
        assert_round_trip(play::HeldItemChange { slot: 8 });
        assert_round_trip(play::UpdateHealth {
            health: 9.5,
            food: 17,
            food_saturation: 2.0,
        });
        assert_round_trip(play::TimeUpdate {
            world_age: 8_640_000,
            time_of_day: 13_000,
        });
    }

    #[test]
    fn classify_maps_every_spawn_variant() {
        for id in play::SpawnEntity::IDS {
            let frame = test_frame_raw(id, |encoder| {
                encoder.write_var_int(42);
                encoder.write_slice(&[0; 20]);
            });
            match play::Packet::classify(&frame).unwrap() {
                Some(play::Packet::SpawnEntity(spawn)) => assert_eq!(spawn.entity_id, 42),
                other => panic!("id {id:#04x} classified as {other:?}"),
            }
        }
    }

    #[test]
    fn classify_ignores_unknown_ids() {
        let frame = test_frame_raw(0x4B, |encoder| encoder.write_slice(&[0xFF; 4]));
        assert!(play::Packet::classify(&frame).unwrap().is_none());
    }

    #[test]
    fn classify_keeps_opaque_tails_intact() {
        let frame = test_frame_raw(play::ChunkData::ID, |encoder| {
            encoder.write_i32(2);
            encoder.write_i32(-2);
            encoder.write_slice(&[0xBE; 200]);
        });
        let packet = play::Packet::classify(&frame).unwrap();
        assert!(matches!(
            packet,
            Some(play::Packet::ChunkData(play::ChunkData {
                chunk_x: 2,
                chunk_z: -2
            }))
        ));
        // the stored wire bytes still carry the full section data
        assert_eq!(frame.fields().len(), 8 + 200);
    }

    #[test]
    fn player_list_decodes_every_action() {
        use play::{PlayerListAction, PlayerListItem};
        use uuid::Uuid;

        let uuid = Uuid::new_v4();
        let frame = test_frame_raw(PlayerListItem::ID, |encoder| {
            encoder.write_var_int(0); // add
            encoder.write_var_int(1);
            encoder.write_uuid(uuid);
            encoder.write_string("Alex");
            encoder.write_var_int(1); // one property
            encoder.write_string("textures");
            encoder.write_string("dGV4dHVyZQ==");
            encoder.write_bool(true);
            encoder.write_string("c2lnbmF0dXJl");
            encoder.write_var_int(2); // gamemode
            encoder.write_var_int(30); // ping
            encoder.write_bool(true);
            encoder.write_string(r#"{"text":"Alex"}"#);
        });
        let packet = match play::Packet::classify(&frame).unwrap() {
            Some(play::Packet::PlayerListItem(packet)) => packet,
            other => panic!("classified as {other:?}"),
        };
        assert_eq!(packet.entries.len(), 1);
        assert_eq!(packet.entries[0].uuid, uuid);
        match &packet.entries[0].action {
            PlayerListAction::Add {
                name,
                gamemode,
                ping,
                display_name,
            } => {
                assert_eq!(name, "Alex");
                assert_eq!(*gamemode, 2);
                assert_eq!(*ping, 30);
                assert_eq!(display_name.as_deref(), Some(r#"{"text":"Alex"}"#));
            }
            other => panic!("decoded action {other:?}"),
        }
    }

    #[test]
    fn login_success_uuid_is_a_string() {
        let frame = test_frame(&login::LoginSuccess {
            uuid: "069a79f4-44e9-4726-a5be-fca90e38aaf5".to_owned(),
            username: "Notch".to_owned(),
        });
        // varint id + varint-prefixed 36-char uuid + varint-prefixed name
        assert_eq!(frame.fields().len(), 1 + 36 + 1 + 5);
    }
}

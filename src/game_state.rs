//! Last-known world snapshot built from the clientbound packet stream.
//!
//! The snapshot is everything needed to resynchronize a freshly attached
//! client without a true login: singleton "latest wins" packets, the
//! loaded chunk set, visible entities, the player list and inventory,
//! plus a handful of scalar facts. All mutation and every point-in-time
//! read (replay assembly) happens with the owning mutex held.

use crate::protocol::{
    encode_frame,
    packet::{clientbound, serverbound, PacketId},
    CompressionThreshold, DecodeError, RawFrame,
};
use ahash::AHashMap;
use uuid::Uuid;

/// A serverbound reply owed to the destination server as a result of
/// applying a clientbound packet.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Confirm a server-initiated teleport.
    TeleportConfirm { teleport_id: i32 },
    /// The player died; request an immediate respawn.
    PerformRespawn,
}

/// The packets replayed to a newly attached client, in order, plus the
/// packets owed upstream as part of the same exchange.
#[derive(Debug, Default)]
pub struct ReplayBurst {
    pub to_client: Vec<Vec<u8>>,
    pub to_upstream: Vec<Vec<u8>>,
}

#[derive(Default)]
pub struct GameState {
    pub held_item_slot: i8,
    pub last_yaw: f32,
    pub last_pitch: f32,
    pub player_pos: Option<(f64, f64, f64)>,
    pub received_position: bool,
    pub gamemode: Option<i32>,
    pub client_uuid: Option<String>,
    pub client_username: Option<String>,
    pub abilities: Option<clientbound::play::PlayerAbilities>,
    pub update_health: Option<clientbound::play::UpdateHealth>,
    /// Strictly increasing within one upstream session. Ids are issued
    /// pre-incremented: the first replay sends 1. The client silently
    /// ignores confirms for stale ids, so an id must never be reused.
    teleport_id: i32,
    /// Singleton "latest wins" packets, keyed by id.
    packet_log: AHashMap<i32, RawFrame>,
    chunks: AHashMap<(i32, i32), RawFrame>,
    entities: AHashMap<i32, RawFrame>,
    player_list: AHashMap<Uuid, RawFrame>,
    inventory: AHashMap<i16, RawFrame>,
}

impl GameState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one clientbound frame to the snapshot, returning any
    /// serverbound replies it triggers. KeepAlive never reaches this
    /// dispatch; it is echoed on the relay task itself.
    pub fn apply(&mut self, frame: &RawFrame) -> Result<Vec<Reply>, DecodeError> {
        use clientbound::play::{Packet, PlayerListAction};

        if clientbound::play::JOIN_LOG_IDS.contains(&frame.id()) {
            self.packet_log.insert(frame.id(), frame.clone());
        }

        let Some(packet) = Packet::classify(frame)? else {
            return Ok(Vec::new());
        };
        tracing::trace!(packet = packet.as_ref(), "applying clientbound packet");

        let mut replies = Vec::new();
        match packet {
            Packet::SpawnEntity(spawn) => {
                // first-seen id wins; respawns of a tracked id keep the
                // original spawn frame
                self.entities
                    .entry(spawn.entity_id)
                    .or_insert_with(|| frame.clone());
            }
            Packet::ChatMessage(chat) => {
                tracing::info!("chat: {}", chat.chat);
            }
            Packet::SetSlot(set_slot) => {
                self.inventory.insert(set_slot.slot, frame.clone());
            }
            Packet::Disconnect(disconnect) => {
                tracing::warn!("server disconnected us: {}", disconnect.reason);
            }
            Packet::UnloadChunk(unload) => {
                self.chunks.remove(&(unload.chunk_x, unload.chunk_z));
            }
            Packet::ChangeGameState(change) => {
                if change.reason == clientbound::play::ChangeGameState::REASON_GAMEMODE {
                    tracing::info!("gamemode changed to {}", change.value);
                    self.gamemode = Some(change.value as i32);
                }
            }
            Packet::KeepAlive(keep_alive) => {
                tracing::debug!("keep-alive {} reached the state dispatch", keep_alive.id);
            }
            Packet::ChunkData(chunk) => {
                self.chunks
                    .insert((chunk.chunk_x, chunk.chunk_z), frame.clone());
            }
            Packet::JoinGame(join) => {
                // bit 0x8 is the hardcore flag
                self.gamemode = Some(i32::from(join.gamemode & 0x3));
            }
            Packet::PlayerAbilities(abilities) => {
                self.abilities = Some(abilities);
            }
            Packet::PlayerListItem(list) => {
                for entry in list.entries {
                    match entry.action {
                        PlayerListAction::Add { .. } => {
                            self.player_list.insert(entry.uuid, frame.clone());
                        }
                        PlayerListAction::UpdateGamemode(gamemode) => {
                            if self.is_own_uuid(entry.uuid) {
                                self.gamemode = Some(gamemode);
                            }
                        }
                        PlayerListAction::Remove => {
                            self.player_list.remove(&entry.uuid);
                        }
                        PlayerListAction::UpdateLatency(_)
                        | PlayerListAction::UpdateDisplayName(_) => {
                            tracing::trace!("unpersisted player list update for {}", entry.uuid);
                        }
                    }
                }
            }
            Packet::PlayerPositionAndLook(pos) => {
                self.packet_log
                    .insert(clientbound::play::PlayerPositionAndLook::ID, frame.clone());
                self.player_pos = Some((pos.x, pos.y, pos.z));
                self.last_yaw = pos.yaw;
                self.last_pitch = pos.pitch;
                self.received_position = true;
                replies.push(Reply::TeleportConfirm {
                    teleport_id: pos.teleport_id,
                });
            }
            Packet::DestroyEntities(destroy) => {
                for entity_id in destroy.entity_ids {
                    self.entities.remove(&entity_id);
                }
            }
            Packet::Respawn(respawn) => {
                self.gamemode = Some(i32::from(respawn.gamemode));
            }
            Packet::HeldItemChange(held) => {
                self.held_item_slot = held.slot;
            }
            Packet::UpdateHealth(health) => {
                let dead = health.health <= 0.0;
                self.update_health = Some(health);
                if dead {
                    tracing::info!("player died, requesting respawn");
                    replies.push(Reply::PerformRespawn);
                }
            }
            Packet::TimeUpdate(_) => {
                self.packet_log
                    .insert(clientbound::play::TimeUpdate::ID, frame.clone());
            }
        }
        Ok(replies)
    }

    /// Bookkeeping for packets an attached client sends upstream.
    pub fn apply_client(&mut self, packet: &serverbound::play::Packet) {
        use serverbound::play::Packet;

        match packet {
            // swallowed by the relay; the proxy owns teleport ids
            Packet::TeleportConfirm(_) => {}
            Packet::PlayerPosition(pos) => {
                self.player_pos = Some((pos.x, pos.y, pos.z));
            }
            Packet::PlayerPositionAndLook(pos) => {
                self.player_pos = Some((pos.x, pos.y, pos.z));
                self.last_yaw = pos.yaw;
                self.last_pitch = pos.pitch;
            }
            Packet::PlayerAbilities(abilities) => {
                self.abilities = Some(clientbound::play::PlayerAbilities {
                    flags: abilities.flags,
                    flying_speed: abilities.flying_speed,
                    fov_modifier: abilities.walking_speed,
                });
            }
            Packet::HeldItemChange(held) => {
                self.held_item_slot = held.slot as i8;
            }
        }
    }

    /// Assembles the world-join burst for a newly attached client.
    ///
    /// Must be called with the state lock held for the whole assembly so
    /// the burst is a point-in-time-consistent view. Logged frames are
    /// replayed verbatim from their retained wire bytes; synthesized
    /// packets are encoded at the session threshold.
    pub fn assemble_replay(
        &mut self,
        compression: Option<CompressionThreshold>,
    ) -> anyhow::Result<ReplayBurst> {
        use clientbound::play;

        let mut burst = ReplayBurst::default();

        for id in play::JOIN_LOG_IDS {
            if let Some(frame) = self.packet_log.get(&id) {
                burst.to_client.push(frame.wire().to_vec());
            }
        }

        if let Some(health) = &self.update_health {
            burst.to_client.push(encode_frame(compression, health)?);
        }
        if let Some(abilities) = &self.abilities {
            burst.to_client.push(encode_frame(compression, abilities)?);
        }

        if self.packet_log.contains_key(&play::PlayerPositionAndLook::ID) {
            match self.player_pos {
                Some((x, y, z)) => {
                    self.teleport_id += 1;
                    let position = play::PlayerPositionAndLook {
                        x,
                        y,
                        z,
                        yaw: self.last_yaw,
                        pitch: self.last_pitch,
                        flags: 0,
                        teleport_id: self.teleport_id,
                    };
                    burst.to_client.push(encode_frame(compression, &position)?);
                }
                None => {
                    if let Some(frame) = self.packet_log.get(&play::PlayerPositionAndLook::ID) {
                        burst.to_client.push(frame.wire().to_vec());
                    }
                }
            }
        }

        if let Some(frame) = self.packet_log.get(&play::TimeUpdate::ID) {
            burst.to_client.push(frame.wire().to_vec());
        }
        for frame in self.player_list.values() {
            burst.to_client.push(frame.wire().to_vec());
        }
        for frame in self.chunks.values() {
            burst.to_client.push(frame.wire().to_vec());
        }
        for frame in self.entities.values() {
            burst.to_client.push(frame.wire().to_vec());
        }

        // resets replay-relevant server-side state, e.g. open windows
        burst.to_upstream.push(encode_frame(
            compression,
            &serverbound::play::ClientStatus {
                action_id: serverbound::play::ClientStatus::ACTION_RESPAWN,
            },
        )?);

        burst.to_client.push(encode_frame(
            compression,
            &play::HeldItemChange {
                slot: self.held_item_slot,
            },
        )?);

        if let Some(gamemode) = self.gamemode {
            burst.to_client.push(encode_frame(
                compression,
                &play::ChangeGameState {
                    reason: play::ChangeGameState::REASON_GAMEMODE,
                    value: gamemode as f32,
                },
            )?);
        }

        for frame in self.inventory.values() {
            burst.to_client.push(frame.wire().to_vec());
        }

        Ok(burst)
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn tracked_chunks(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        self.chunks.keys().copied()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    fn is_own_uuid(&self, uuid: Uuid) -> bool {
        self.client_uuid
            .as_deref()
            .and_then(|own| Uuid::parse_str(own).ok())
            .is_some_and(|own| own == uuid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{
        packet::{self, clientbound::play},
        test_frame, test_frame_raw, RecvCodec,
    };

    fn spawn_entity_frame(id: i32, entity_id: i32) -> RawFrame {
        assert!(play::SpawnEntity::IDS.contains(&id));
        test_frame_raw(id, |encoder| {
            encoder.write_var_int(entity_id);
            // opaque variant-specific tail
            encoder.write_slice(&[0xAA; 12]);
        })
    }

    fn join_game_frame(gamemode: u8) -> RawFrame {
        test_frame(&play::JoinGame {
            entity_id: 501,
            gamemode,
            dimension: 0,
            difficulty: 2,
            max_players: 20,
            level_type: "default".to_owned(),
            reduced_debug_info: false,
        })
    }

    fn position_frame(teleport_id: i32) -> RawFrame {
        test_frame(&play::PlayerPositionAndLook {
            x: 100.5,
            y: 64.0,
            z: -20.5,
            yaw: 90.0,
            pitch: -10.0,
            flags: 0,
            teleport_id,
        })
    }

    fn decode_burst_frame(bytes: &[u8]) -> RawFrame {
        let mut codec = RecvCodec::new();
        codec.give_data(&mut bytes.to_vec());
        codec.next_frame().unwrap().expect("whole frame")
    }

    #[test]
    fn chunk_map_tracks_loads_and_unloads() {
        let mut state = GameState::new();
        state.apply(&join_game_frame(0)).unwrap();
        state
            .apply(&test_frame(&play::ChunkData { chunk_x: 0, chunk_z: 0 }))
            .unwrap();
        state
            .apply(&test_frame(&play::ChunkData { chunk_x: 1, chunk_z: 0 }))
            .unwrap();
        state
            .apply(&test_frame(&play::UnloadChunk { chunk_x: 0, chunk_z: 0 }))
            .unwrap();

        assert_eq!(state.tracked_chunks().collect::<Vec<_>>(), vec![(1, 0)]);
        assert_eq!(state.gamemode, Some(0));
    }

    #[test]
    fn unloading_unknown_chunk_is_a_noop() {
        let mut state = GameState::new();
        state
            .apply(&test_frame(&play::UnloadChunk { chunk_x: 9, chunk_z: 9 }))
            .unwrap();
        assert_eq!(state.chunk_count(), 0);
    }

    #[test]
    fn chunk_reload_is_latest_wins() {
        let mut state = GameState::new();
        let first = test_frame_raw(play::ChunkData::ID, |encoder| {
            encoder.write_i32(4);
            encoder.write_i32(4);
            encoder.write_slice(&[1; 8]);
        });
        let second = test_frame_raw(play::ChunkData::ID, |encoder| {
            encoder.write_i32(4);
            encoder.write_i32(4);
            encoder.write_slice(&[2; 8]);
        });
        state.apply(&first).unwrap();
        state.apply(&second).unwrap();
        assert_eq!(state.chunk_count(), 1);
        assert_eq!(state.chunks[&(4, 4)].wire(), second.wire());
    }

    #[test]
    fn spawning_same_entity_twice_keeps_first_frame() {
        let mut state = GameState::new();
        let first = spawn_entity_frame(0x03, 77);
        let second = spawn_entity_frame(0x05, 77);
        state.apply(&first).unwrap();
        state.apply(&second).unwrap();
        assert_eq!(state.entity_count(), 1);
        assert_eq!(state.entities[&77].wire(), first.wire());
    }

    #[test]
    fn destroying_unknown_entity_is_a_noop() {
        let mut state = GameState::new();
        state.apply(&spawn_entity_frame(0x00, 1)).unwrap();
        state
            .apply(&test_frame(&play::DestroyEntities {
                entity_ids: vec![1, 2, 3],
            }))
            .unwrap();
        assert_eq!(state.entity_count(), 0);
    }

    #[test]
    fn join_game_strips_hardcore_flag() {
        let mut state = GameState::new();
        state.apply(&join_game_frame(0x8 | 1)).unwrap();
        assert_eq!(state.gamemode, Some(1));
    }

    #[test]
    fn zero_health_triggers_exactly_one_respawn_request() {
        let mut state = GameState::new();
        let replies = state
            .apply(&test_frame(&play::UpdateHealth {
                health: 0.0,
                food: 20,
                food_saturation: 5.0,
            }))
            .unwrap();
        assert_eq!(replies, vec![Reply::PerformRespawn]);
        assert_eq!(state.update_health.as_ref().unwrap().health, 0.0);

        let replies = state
            .apply(&test_frame(&play::UpdateHealth {
                health: 19.0,
                food: 20,
                food_saturation: 5.0,
            }))
            .unwrap();
        assert!(replies.is_empty());
        assert_eq!(state.update_health.as_ref().unwrap().health, 19.0);
    }

    #[test]
    fn position_packet_is_confirmed_and_recorded() {
        let mut state = GameState::new();
        let replies = state.apply(&position_frame(13)).unwrap();
        assert_eq!(replies, vec![Reply::TeleportConfirm { teleport_id: 13 }]);
        assert!(state.received_position);
        assert_eq!(state.player_pos, Some((100.5, 64.0, -20.5)));
        assert_eq!(state.last_yaw, 90.0);
        assert_eq!(state.last_pitch, -10.0);
    }

    #[test]
    fn player_list_add_update_remove() {
        let mut state = GameState::new();
        let own = Uuid::new_v4();
        state.client_uuid = Some(own.to_string());

        let add = test_frame_raw(play::PlayerListItem::ID, |encoder| {
            encoder.write_var_int(0); // add player
            encoder.write_var_int(1);
            encoder.write_uuid(own);
            encoder.write_string("Steve");
            encoder.write_var_int(0); // properties
            encoder.write_var_int(1); // gamemode
            encoder.write_var_int(40); // ping
            encoder.write_bool(false); // no display name
        });
        state.apply(&add).unwrap();
        assert_eq!(state.player_list.len(), 1);

        let update_gamemode = test_frame_raw(play::PlayerListItem::ID, |encoder| {
            encoder.write_var_int(1);
            encoder.write_var_int(1);
            encoder.write_uuid(own);
            encoder.write_var_int(2);
        });
        state.apply(&update_gamemode).unwrap();
        assert_eq!(state.gamemode, Some(2));

        // latency updates are logged but never persisted
        let update_latency = test_frame_raw(play::PlayerListItem::ID, |encoder| {
            encoder.write_var_int(2);
            encoder.write_var_int(1);
            encoder.write_uuid(own);
            encoder.write_var_int(5);
        });
        state.apply(&update_latency).unwrap();
        assert_eq!(state.player_list[&own].wire(), add.wire());

        let remove = test_frame_raw(play::PlayerListItem::ID, |encoder| {
            encoder.write_var_int(4);
            encoder.write_var_int(1);
            encoder.write_uuid(own);
        });
        state.apply(&remove).unwrap();
        assert!(state.player_list.is_empty());
    }

    #[test]
    fn client_bookkeeping_updates_snapshot() {
        let mut state = GameState::new();
        state.apply_client(&serverbound::play::Packet::HeldItemChange(
            serverbound::play::HeldItemChange { slot: 3 },
        ));
        assert_eq!(state.held_item_slot, 3);

        state.apply_client(&serverbound::play::Packet::PlayerAbilities(
            serverbound::play::PlayerAbilities {
                flags: 4,
                flying_speed: 0.05,
                walking_speed: 0.1,
            },
        ));
        let abilities = state.abilities.as_ref().unwrap();
        assert_eq!(abilities.flags, 4);
        assert_eq!(abilities.fov_modifier, 0.1);

        state.apply_client(&serverbound::play::Packet::PlayerPositionAndLook(
            serverbound::play::PlayerPositionAndLook {
                x: 1.0,
                y: 2.0,
                z: 3.0,
                yaw: 45.0,
                pitch: 10.0,
                on_ground: true,
            },
        ));
        assert_eq!(state.player_pos, Some((1.0, 2.0, 3.0)));
        assert_eq!(state.last_yaw, 45.0);
    }

    #[test]
    fn replay_is_deterministic_without_a_position() {
        let mut state = GameState::new();
        state.apply(&join_game_frame(0)).unwrap();
        state
            .apply(&test_frame(&play::ChunkData { chunk_x: 0, chunk_z: 0 }))
            .unwrap();
        state
            .apply(&test_frame(&play::ChunkData { chunk_x: 5, chunk_z: -5 }))
            .unwrap();
        state.apply(&spawn_entity_frame(0x05, 9)).unwrap();
        state
            .apply(&test_frame(&play::TimeUpdate {
                world_age: 100,
                time_of_day: 6000,
            }))
            .unwrap();

        let first = state.assemble_replay(None).unwrap();
        let second = state.assemble_replay(None).unwrap();
        assert_eq!(first.to_client, second.to_client);
        assert_eq!(first.to_upstream, second.to_upstream);
    }

    #[test]
    fn replay_issues_fresh_teleport_ids() {
        let mut state = GameState::new();
        state.apply(&join_game_frame(0)).unwrap();
        state.apply(&position_frame(4)).unwrap();

        let join_wire = state.packet_log[&play::JoinGame::ID].wire().to_vec();

        let find_teleport_id = |burst: &ReplayBurst| {
            burst
                .to_client
                .iter()
                .find_map(|bytes| {
                    let frame = decode_burst_frame(bytes);
                    (frame.id() == play::PlayerPositionAndLook::ID).then(|| {
                        packet::expect::<play::PlayerPositionAndLook>(&frame)
                            .unwrap()
                            .teleport_id
                    })
                })
                .expect("replay must contain a position packet")
        };

        let first = state.assemble_replay(None).unwrap();
        assert!(first.to_client.contains(&join_wire));
        assert_eq!(find_teleport_id(&first), 1);

        let second = state.assemble_replay(None).unwrap();
        assert_eq!(find_teleport_id(&second), 2);

        // identical apart from the freshly issued teleport id
        assert_eq!(first.to_client.len(), second.to_client.len());
        assert_eq!(first.to_upstream, second.to_upstream);
    }

    #[test]
    fn replay_carries_held_item_gamemode_and_respawn_request() {
        let mut state = GameState::new();
        state.apply(&join_game_frame(1)).unwrap();
        state
            .apply(&test_frame(&play::HeldItemChange { slot: 6 }))
            .unwrap();

        let burst = state.assemble_replay(None).unwrap();

        let held = burst
            .to_client
            .iter()
            .map(|bytes| decode_burst_frame(bytes))
            .find(|frame| frame.id() == play::HeldItemChange::ID)
            .expect("held item slot is always replayed");
        assert_eq!(
            packet::expect::<play::HeldItemChange>(&held).unwrap().slot,
            6
        );

        let gamemode = burst
            .to_client
            .iter()
            .map(|bytes| decode_burst_frame(bytes))
            .find(|frame| frame.id() == play::ChangeGameState::ID)
            .expect("known gamemode is replayed");
        let gamemode = packet::expect::<play::ChangeGameState>(&gamemode).unwrap();
        assert_eq!(gamemode.reason, play::ChangeGameState::REASON_GAMEMODE);
        assert_eq!(gamemode.value, 1.0);

        assert_eq!(burst.to_upstream.len(), 1);
        let respawn = decode_burst_frame(&burst.to_upstream[0]);
        assert_eq!(respawn.id(), serverbound::play::ClientStatus::ID);
    }

    #[test]
    fn unknown_ids_are_ignored_by_the_dispatch() {
        let mut state = GameState::new();
        let frame = test_frame_raw(0x4A, |encoder| encoder.write_slice(&[1, 2, 3]));
        let replies = state.apply(&frame).unwrap();
        assert!(replies.is_empty());
        assert_eq!(state.chunk_count(), 0);
    }
}

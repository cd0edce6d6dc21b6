//! Keeps the upstream session alive while no client is attached.
//!
//! Servers kick players that neither move nor talk. On every tick the
//! watchdog, if idling, sends a throwaway chat command, a random arm
//! swing, a short walk forward and back anchored at the last known
//! position, and a random look. The attached-client check happens at
//! tick time, never latched, so an attached player's camera is never
//! yanked around.

use crate::{
    game_state::GameState,
    protocol::{encode_frame, packet::serverbound::play, CompressionThreshold},
    send_queue::{ClientSlot, SendQueue},
};
use rand::Rng;
use std::{sync::Arc, time::Duration};
use tokio::{sync::Mutex, time::sleep};
use tokio_util::sync::CancellationToken;

const WIGGLE_STEPS: i32 = 30;
const WIGGLE_STEP_DELAY: Duration = Duration::from_millis(100);

pub async fn run(
    state: Arc<Mutex<GameState>>,
    upstream_queue: SendQueue,
    client: ClientSlot,
    compression: Option<CompressionThreshold>,
    interval: Duration,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            _ = sleep(interval) => {}
        }

        if client.attached() {
            continue;
        }
        let (received_position, anchor) = {
            let state = state.lock().await;
            (state.received_position, state.player_pos)
        };
        if !received_position {
            continue;
        }

        tracing::debug!("sending idle movements");
        upstream_queue.send(encode_frame(
            compression,
            &play::ChatMessage {
                message: "/help".to_owned(),
            },
        )?);
        let hand = rand::thread_rng().gen_range(0..=1);
        upstream_queue.send(encode_frame(compression, &play::Animation { hand })?);

        if let Some((x, y, z)) = anchor {
            // walk ~3 blocks out and back in 0.1s steps
            for step in (0..WIGGLE_STEPS).chain((0..WIGGLE_STEPS).rev()) {
                upstream_queue.send(encode_frame(
                    compression,
                    &play::PlayerPosition {
                        x: x + 0.1 * f64::from(step),
                        y: y + 0.1,
                        z,
                        on_ground: true,
                    },
                )?);
                tokio::select! {
                    _ = cancel.cancelled() => return Ok(()),
                    _ = sleep(WIGGLE_STEP_DELAY) => {}
                }
            }
        }

        let (yaw, pitch) = {
            let mut rng = rand::thread_rng();
            (rng.gen_range(0.0..360.0), rng.gen_range(0.0..360.0))
        };
        upstream_queue.send(encode_frame(
            compression,
            &play::PlayerLook {
                yaw,
                pitch,
                on_ground: true,
            },
        )?);
    }
}

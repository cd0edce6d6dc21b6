//! One proxy session: a live upstream connection plus everything
//! attached to it: the worker applying packets to the world state,
//! the client acceptor, the idle watchdog, and the send-queue drainers.
//!
//! The session ends when the upstream leg fails; the world state dies
//! with it (a new upstream session means a new world) and the caller
//! reconnects with backoff.

use crate::{
    anti_afk,
    auth::{Credentials, SessionService},
    config::Config,
    downstream::{self, SessionShared},
    game_state::{GameState, Reply},
    protocol::{encode_frame, packet::serverbound, CompressionThreshold, RawFrame},
    send_queue::{send_queue, ClientSlot, SendQueue},
    transport::PacketStream,
    upstream,
};
use std::{sync::Arc, time::Duration};
use tokio::{
    net::{TcpListener, TcpStream},
    sync::Mutex,
};
use tokio_util::sync::CancellationToken;

/// Connects, logs in, and relays until the upstream leg dies.
pub async fn run(
    config: &Config,
    listener: Arc<TcpListener>,
    auth: &SessionService,
    credentials: &Credentials,
) -> anyhow::Result<()> {
    let address = format!("{}:{}", config.host, config.port);
    tracing::info!("connecting to {address}");
    let socket = TcpStream::connect(&address).await?;

    let state = Arc::new(Mutex::new(GameState::new()));
    let mut stream = PacketStream::new(socket);
    upstream::login(
        &mut stream,
        &config.host,
        config.port,
        config.protocol,
        auth,
        credentials,
        &state,
    )
    .await?;

    let compression = stream.compression();
    let (reader, writer) = stream.split();
    let (upstream_queue, backlog) = send_queue();
    let cancel = CancellationToken::new();
    let client = ClientSlot::default();
    let (worker_tx, worker_rx) = flume::unbounded();

    let shared = SessionShared {
        state: Arc::clone(&state),
        upstream_queue: upstream_queue.clone(),
        client: client.clone(),
        compression,
        cancel: cancel.clone(),
    };

    let sender = tokio::spawn(backlog.drain(writer));
    let worker = tokio::spawn(run_worker(
        worker_rx,
        Arc::clone(&state),
        upstream_queue.clone(),
        compression,
        cancel.clone(),
    ));
    let acceptor = tokio::spawn(downstream::run_acceptor(listener, shared));
    let watchdog = tokio::spawn(anti_afk::run(
        state,
        upstream_queue.clone(),
        client.clone(),
        compression,
        Duration::from_secs(config.anti_afk_seconds),
        cancel.clone(),
    ));

    let result = upstream::run_relay(
        reader,
        upstream_queue,
        worker_tx,
        client.clone(),
        compression,
        cancel.clone(),
    )
    .await;

    // Teardown order: stop intake and the attached client first, then
    // the upstream drainer; its socket may be wedged, so it is aborted
    // rather than drained.
    cancel.cancel();
    client.release();
    let _ = tokio::join!(worker, acceptor, watchdog);
    sender.abort();
    let _ = sender.await;

    result
}

/// Applies relayed frames to the world state, strictly in arrival
/// order, and sends any owed replies upstream. Decoupled from the read
/// loop so a slow state mutation never stalls the socket.
async fn run_worker(
    frames: flume::Receiver<RawFrame>,
    state: Arc<Mutex<GameState>>,
    upstream_queue: SendQueue,
    compression: Option<CompressionThreshold>,
    cancel: CancellationToken,
) {
    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => return,
            frame = frames.recv_async() => match frame {
                Ok(frame) => frame,
                Err(_) => return,
            },
        };

        let replies = match state.lock().await.apply(&frame) {
            Ok(replies) => replies,
            Err(e) => {
                // one malformed packet tears down the leg, not the process
                tracing::warn!("malformed packet {:#04x}: {e}", frame.id());
                cancel.cancel();
                return;
            }
        };

        for reply in replies {
            let encoded = match reply {
                Reply::TeleportConfirm { teleport_id } => encode_frame(
                    compression,
                    &serverbound::play::TeleportConfirm { teleport_id },
                ),
                Reply::PerformRespawn => encode_frame(
                    compression,
                    &serverbound::play::ClientStatus {
                        action_id: serverbound::play::ClientStatus::ACTION_RESPAWN,
                    },
                ),
            };
            match encoded {
                Ok(frame) => upstream_queue.send(frame),
                Err(e) => tracing::warn!("failed to encode reply: {e}"),
            }
        }
    }
}

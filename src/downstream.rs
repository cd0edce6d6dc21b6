//! The downstream leg: accepting a reconnecting game client and playing
//! the server's role towards it.
//!
//! One client at a time. The listener itself is long-lived and bound
//! once at startup; each upstream session runs its own accept loop over
//! it so a stale session never steals a fresh session's clients.

use crate::{
    crypto::{self, CryptoError, ServerKeypair},
    game_state::GameState,
    protocol::{
        packet::{self, clientbound, serverbound},
        CompressionThreshold, EncryptionKey,
    },
    send_queue::{send_queue, ClientSlot, SendQueue},
    transport::PacketStream,
};
use anyhow::{bail, Context};
use std::sync::Arc;
use tokio::{
    net::{TcpListener, TcpStream},
    sync::Mutex,
};
use tokio_util::sync::CancellationToken;

/// Everything a client connection needs from its owning session.
#[derive(Clone)]
pub struct SessionShared {
    pub state: Arc<Mutex<GameState>>,
    pub upstream_queue: SendQueue,
    pub client: ClientSlot,
    pub compression: Option<CompressionThreshold>,
    pub cancel: CancellationToken,
}

/// Accepts clients for one session. A second connection while a client
/// is present is rejected by dropping its socket, never queued.
pub async fn run_acceptor(listener: Arc<TcpListener>, shared: SessionShared) {
    loop {
        let (socket, address) = tokio::select! {
            _ = shared.cancel.cancelled() => return,
            accepted = listener.accept() => match accepted {
                Ok(x) => x,
                Err(e) => {
                    tracing::warn!("accept failed: {e}");
                    continue;
                }
            },
        };

        if !shared.client.try_claim() {
            tracing::info!("rejected client from {address}: a client is already attached");
            continue;
        }

        tracing::info!("client connected from {address}");
        let shared = shared.clone();
        tokio::spawn(async move {
            // the session cancelling drops the connection future, and
            // with it the socket, even mid-handshake
            let result = tokio::select! {
                _ = shared.cancel.cancelled() => Ok(()),
                result = serve_client(socket, &shared) => result,
            };
            match result {
                Ok(()) => tracing::info!("client disconnected"),
                Err(e) => tracing::info!("client connection ended: {e:#}"),
            }
            shared.client.release();
        });
    }
}

async fn serve_client(socket: TcpStream, shared: &SessionShared) -> anyhow::Result<()> {
    let mut stream = PacketStream::new(socket);
    login(&mut stream, shared).await?;
    replay_world(&mut stream, shared).await?;

    let (mut reader, writer) = stream.split();
    let (queue, backlog) = send_queue();
    tokio::spawn(backlog.drain(writer));
    shared.client.attach(queue);
    tracing::info!("client attached, relaying live traffic");

    // Steady state: every client packet goes upstream verbatim after
    // local bookkeeping, except teleport confirms. The proxy issues its
    // own teleport ids during replay, so a confirm for one of those
    // would desync the real server. Cancellation is handled by the
    // caller dropping this future.
    loop {
        let frame = reader.next_frame().await?;

        if let Some(typed) = serverbound::play::Packet::classify(&frame)? {
            tracing::trace!(packet = typed.as_ref(), "client bookkeeping");
            let swallow = matches!(typed, serverbound::play::Packet::TeleportConfirm(_));
            shared.state.lock().await.apply_client(&typed);
            if swallow {
                continue;
            }
        }
        shared.upstream_queue.send(frame.into_wire());
    }
}

/// Plays the server's side of the login exchange: ephemeral RSA
/// keypair, verify-token echo check, encryption, compression, and a
/// LoginSuccess carrying the *real* server's uuid and username.
async fn login(stream: &mut PacketStream, shared: &SessionShared) -> anyhow::Result<()> {
    use clientbound::login::{EncryptionRequest, LoginSuccess, SetCompression};
    use serverbound::login::{EncryptionResponse, Handshake, LoginStart};

    let frame = stream.recv_frame().await?;
    let handshake: Handshake = packet::expect(&frame)?;
    if handshake.next_state != Handshake::NEXT_STATE_LOGIN {
        bail!("client requested state {} instead of login", handshake.next_state);
    }
    let frame = stream.recv_frame().await?;
    let login_start: LoginStart = packet::expect(&frame)?;
    tracing::info!("client logging in as {}", login_start.name);

    let keypair = ServerKeypair::generate()?;
    let verify_token = crypto::generate_verify_token();
    stream
        .send_packet(&EncryptionRequest {
            server_id: String::new(),
            public_key: keypair.public_key_der().to_vec(),
            verify_token: verify_token.to_vec(),
        })
        .await?;

    let frame = stream.recv_frame().await?;
    let response: EncryptionResponse = packet::expect(&frame)?;
    if keypair.decrypt(&response.verify_token)? != verify_token {
        return Err(CryptoError::VerifyTokenMismatch.into());
    }
    let shared_secret: [u8; 16] = keypair
        .decrypt(&response.shared_secret)?
        .try_into()
        .ok()
        .context("shared secret must be 16 bytes")?;
    stream.enable_encryption(EncryptionKey::new(shared_secret));

    if let Some(threshold) = shared.compression {
        stream
            .send_packet(&SetCompression {
                threshold: threshold.get() as i32,
            })
            .await?;
        stream.enable_compression(threshold);
    }

    let (uuid, username) = {
        let state = shared.state.lock().await;
        (
            state.client_uuid.clone().context("no upstream login recorded")?,
            state
                .client_username
                .clone()
                .context("no upstream login recorded")?,
        )
    };
    stream.send_packet(&LoginSuccess { uuid, username }).await?;
    Ok(())
}

/// Sends the world-join burst. The state lock is held from assembly
/// through the last write so the client observes a point-in-time
/// consistent snapshot.
async fn replay_world(stream: &mut PacketStream, shared: &SessionShared) -> anyhow::Result<()> {
    let mut state = shared.state.lock().await;
    let burst = state.assemble_replay(shared.compression)?;
    tracing::info!(
        "replaying world: {} chunks, {} entities",
        state.chunk_count(),
        state.entity_count()
    );
    for frame in burst.to_client {
        stream.send_frame(frame).await?;
    }
    for frame in burst.to_upstream {
        shared.upstream_queue.send(frame);
    }
    Ok(())
}

//! The upstream leg: the proxy's own connection to the destination
//! server, from login handshake to the steady-state relay loop.

use crate::{
    auth::{Credentials, SessionService},
    crypto,
    game_state::GameState,
    protocol::{
        encode_frame,
        packet::{self, clientbound, serverbound, PacketId},
        CompressionThreshold, DecodeError, EncryptionKey, RawFrame,
    },
    send_queue::{ClientSlot, SendQueue},
    transport::{FrameReader, PacketStream},
};
use anyhow::bail;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Drives the login exchange against the destination server:
/// handshake, key exchange and session-server join, then compression
/// negotiation. On success the stream is encrypted, the threshold is
/// set, and the server's uuid/username are recorded in the world state
/// for the illusion presented to reconnecting clients.
pub async fn login(
    stream: &mut PacketStream,
    host: &str,
    port: u16,
    protocol_version: i32,
    auth: &SessionService,
    credentials: &Credentials,
    state: &Mutex<GameState>,
) -> anyhow::Result<()> {
    use clientbound::login::{Disconnect, EncryptionRequest, LoginSuccess, SetCompression};
    use serverbound::login::{EncryptionResponse, Handshake, LoginStart};

    stream
        .send_packet(&Handshake {
            protocol_version,
            server_address: host.to_owned(),
            server_port: port,
            next_state: Handshake::NEXT_STATE_LOGIN,
        })
        .await?;
    stream
        .send_packet(&LoginStart {
            name: credentials.selected_profile.name.clone(),
        })
        .await?;

    let frame = stream.recv_frame().await?;
    if frame.id() == Disconnect::ID {
        let disconnect: Disconnect = packet::expect(&frame)?;
        bail!("server refused login: {}", disconnect.reason);
    }
    let request: EncryptionRequest = packet::expect(&frame)?;

    let shared_secret = crypto::generate_shared_secret();
    let (encrypted_secret, encrypted_token) = crypto::encrypt_token_and_secret(
        &request.public_key,
        &request.verify_token,
        &shared_secret,
    )?;
    let server_hash = crypto::server_hash(&request.server_id, &shared_secret, &request.public_key);
    auth.join(&server_hash, credentials).await?;

    stream
        .send_packet(&EncryptionResponse {
            shared_secret: encrypted_secret,
            verify_token: encrypted_token,
        })
        .await?;
    stream.enable_encryption(EncryptionKey::new(shared_secret));

    // The server is free to skip SetCompression; if the id does not
    // match, this frame already is the next login packet.
    let mut frame = stream.recv_frame().await?;
    if frame.id() == SetCompression::ID {
        let set_compression: SetCompression = packet::expect(&frame)?;
        match CompressionThreshold::from_raw(set_compression.threshold) {
            Some(threshold) => {
                stream.enable_compression(threshold);
                tracing::debug!("compression threshold set to {}", threshold.get());
            }
            None => tracing::debug!("compression disabled by server"),
        }
        frame = stream.recv_frame().await?;
    }

    let success: LoginSuccess = packet::expect(&frame)?;
    tracing::info!("logged in as {} ({})", success.username, success.uuid);

    let mut state = state.lock().await;
    state.client_uuid = Some(success.uuid);
    state.client_username = Some(success.username);
    Ok(())
}

/// The steady-state loop for the upstream leg.
///
/// Every frame is handed to the ordered worker queue for state
/// tracking and forwarded verbatim to the attached client, except
/// keep-alives: those are answered here, on the read task, and never
/// forwarded (the client's liveness is the proxy's own business).
pub async fn run_relay(
    mut reader: FrameReader,
    upstream_queue: SendQueue,
    worker_tx: flume::Sender<RawFrame>,
    client: ClientSlot,
    compression: Option<CompressionThreshold>,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            frame = reader.next_frame() => frame?,
        };

        if let Some(reply) = keep_alive_reply(&frame)? {
            upstream_queue.send(encode_frame(compression, &reply)?);
            continue;
        }

        let wire = frame.wire().to_vec();
        if worker_tx.send(frame).is_err() {
            // worker gone; the session is shutting down
            return Ok(());
        }
        client.forward(wire);
    }
}

/// Builds the immediate echo for a clientbound keep-alive, or `None`
/// for any other packet.
fn keep_alive_reply(
    frame: &RawFrame,
) -> Result<Option<serverbound::play::KeepAlive>, DecodeError> {
    if frame.id() != clientbound::play::KeepAlive::ID {
        return Ok(None);
    }
    let keep_alive: clientbound::play::KeepAlive = packet::expect(frame)?;
    Ok(Some(serverbound::play::KeepAlive { id: keep_alive.id }))
}

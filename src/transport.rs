//! Socket-facing transport for one leg of the proxy.
//!
//! During a handshake the whole socket is driven sequentially through a
//! [`PacketStream`]. Once a leg reaches the relay phase it is split into
//! an owned read half and write half so the two directions can live on
//! separate tasks; each half carries its own codec state. Encryption is
//! applied at this boundary: frames travel through the rest of the proxy
//! as plaintext and are sealed immediately before the socket write.

use crate::protocol::{
    packet::PacketId, CompressionThreshold, Encode, EncryptionKey, RawFrame, RecvCodec, SendCodec,
};
use anyhow::bail;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpStream,
    },
};

const READ_CHUNK: usize = 4096;

/// A whole socket with both codec halves, used while a handshake is
/// driven sequentially.
pub struct PacketStream {
    stream: TcpStream,
    recv: RecvCodec,
    send: SendCodec,
}

impl PacketStream {
    pub fn new(stream: TcpStream) -> Self {
        Self {
            stream,
            recv: RecvCodec::new(),
            send: SendCodec::new(),
        }
    }

    /// Switches both directions to encrypted transport. One-way
    /// transition, performed immediately after the shared-secret
    /// exchange.
    pub fn enable_encryption(&mut self, key: EncryptionKey) {
        self.send.enable_encryption(key);
        self.recv.enable_encryption(key);
    }

    pub fn enable_compression(&mut self, threshold: CompressionThreshold) {
        self.send.enable_compression(threshold);
        self.recv.enable_compression(threshold);
    }

    pub fn compression(&self) -> Option<CompressionThreshold> {
        self.send.compression()
    }

    pub async fn send_packet<P: PacketId + Encode>(&mut self, packet: &P) -> anyhow::Result<()> {
        let mut frame = self.send.encode_packet(packet)?;
        self.send.seal(&mut frame);
        self.stream.write_all(&frame).await?;
        Ok(())
    }

    /// Writes an already-framed plaintext frame.
    pub async fn send_frame(&mut self, mut frame: Vec<u8>) -> anyhow::Result<()> {
        self.send.seal(&mut frame);
        self.stream.write_all(&frame).await?;
        Ok(())
    }

    /// Reads the next frame, waiting for more socket data as needed.
    pub async fn recv_frame(&mut self) -> anyhow::Result<RawFrame> {
        loop {
            if let Some(frame) = self.recv.next_frame()? {
                return Ok(frame);
            }
            let mut buf = [0u8; READ_CHUNK];
            let n = self.stream.read(&mut buf).await?;
            if n == 0 {
                bail!("connection closed during handshake");
            }
            self.recv.give_data(&mut buf[..n]);
        }
    }

    /// Splits the leg for the relay phase.
    pub fn split(self) -> (FrameReader, FrameWriter) {
        let (read_half, write_half) = self.stream.into_split();
        (
            FrameReader {
                half: read_half,
                codec: self.recv,
            },
            FrameWriter {
                half: write_half,
                codec: self.send,
            },
        )
    }
}

/// Read half of a relaying leg.
pub struct FrameReader {
    half: OwnedReadHalf,
    codec: RecvCodec,
}

impl FrameReader {
    /// Reads the next frame. Fails on EOF or a malformed stream; either
    /// tears down the leg.
    pub async fn next_frame(&mut self) -> anyhow::Result<RawFrame> {
        loop {
            if let Some(frame) = self.codec.next_frame()? {
                return Ok(frame);
            }
            let mut buf = [0u8; READ_CHUNK];
            let n = self.half.read(&mut buf).await?;
            if n == 0 {
                bail!("connection closed");
            }
            self.codec.give_data(&mut buf[..n]);
        }
    }
}

/// Write half of a relaying leg. Frames are sealed in write order;
/// exclusive ownership by one sender task keeps the cipher stream
/// consistent.
pub struct FrameWriter {
    half: OwnedWriteHalf,
    codec: SendCodec,
}

impl FrameWriter {
    pub async fn write_frame(&mut self, mut frame: Vec<u8>) -> std::io::Result<()> {
        self.codec.seal(&mut frame);
        self.half.write_all(&frame).await
    }
}

//! Framing codec for the vanilla TCP protocol.
//! Supports zlib compression and CFB8 encryption.
//!
//! The codec is split into a send half and a receive half because the two
//! directions live on different tasks once a leg enters the relay phase,
//! and each direction owns its own cipher state.

use super::BUFFER_LIMIT;
use crate::protocol::{
    encoder::var_int_size, packet::PacketId, DecodeError, Decoder, Encode, Encoder,
};
use aes::{cipher::generic_array::GenericArray, Aes128};
use cfb8::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use flate2::Compression;
use std::{
    io::{Read, Write},
    slice,
};

/// Most frames the proxy encodes itself are small serverbound packets;
/// the bulky clientbound traffic is echoed verbatim and never re-deflated.
/// So we avoid spending time on strong compression here.
const COMPRESSION_LEVEL: Compression = Compression::fast();

/// Key used for encryption.
#[derive(Copy, Clone, Debug)]
pub struct EncryptionKey([u8; 16]);

impl EncryptionKey {
    pub fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }
}

/// Threshold in bytes at which a packet payload is compressed.
///
/// A threshold of zero compresses every payload (`len >= 0` always holds);
/// "compression disabled" is represented by the absence of a threshold,
/// never by a sentinel value.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CompressionThreshold(usize);

impl CompressionThreshold {
    pub fn new(threshold: usize) -> Self {
        Self(threshold)
    }

    /// Interprets a threshold as negotiated on the wire:
    /// negative means disabled.
    pub fn from_raw(threshold: i32) -> Option<Self> {
        usize::try_from(threshold).ok().map(Self)
    }

    pub fn get(self) -> usize {
        self.0
    }
}

/// A framed packet as read off the wire.
///
/// Retains both the uncompressed id+fields bytes (for decoding) and the
/// exact plaintext frame as received, including the length prefix and any
/// compression framing (for verbatim retransmission). A reconnecting
/// client validates internal consistency against exact prior packet
/// content, so echoed frames must be byte-identical to what was received.
#[derive(Debug, Clone)]
pub struct RawFrame {
    id: i32,
    id_size: usize,
    body: Vec<u8>,
    wire: Vec<u8>,
}

impl RawFrame {
    /// The packet's leading id.
    pub fn id(&self) -> i32 {
        self.id
    }

    /// The uncompressed packet bytes: id followed by fields.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// The field bytes, with the leading id stripped.
    pub fn fields(&self) -> &[u8] {
        &self.body[self.id_size..]
    }

    /// The exact plaintext frame as it appeared on the wire,
    /// before transport encryption.
    pub fn wire(&self) -> &[u8] {
        &self.wire
    }

    pub fn into_wire(self) -> Vec<u8> {
        self.wire
    }
}

type Encryptor = cfb8::Encryptor<Aes128>;
type Decryptor = cfb8::Decryptor<Aes128>;

/// Encoding half of a leg's codec.
pub struct SendCodec {
    encryptor: Option<Encryptor>,
    compression: Option<CompressionThreshold>,
}

impl SendCodec {
    pub fn new() -> Self {
        Self {
            encryptor: None,
            compression: None,
        }
    }

    pub fn enable_encryption(&mut self, key: EncryptionKey) {
        assert!(
            self.encryptor.is_none(),
            "called enable_encryption() multiple times"
        );
        self.encryptor = Some(Encryptor::new(&key.0.into(), &key.0.into()));
    }

    pub fn enable_compression(&mut self, threshold: CompressionThreshold) {
        assert!(
            self.compression.is_none(),
            "called enable_compression() multiple times"
        );
        self.compression = Some(threshold);
    }

    pub fn compression(&self) -> Option<CompressionThreshold> {
        self.compression
    }

    /// Encodes a packet to a plaintext wire frame at the current threshold.
    pub fn encode_packet<P: PacketId + Encode>(&self, packet: &P) -> anyhow::Result<Vec<u8>> {
        encode_frame(self.compression, packet)
    }

    /// Encrypts a frame in place, if encryption is enabled.
    /// Must be called on frames in the exact order they are written
    /// to the socket: CFB8 is a stream mode.
    pub fn seal(&mut self, data: &mut [u8]) {
        if let Some(encryptor) = &mut self.encryptor {
            for x in data {
                let slice = slice::from_mut(x);
                encryptor.encrypt_block_mut(GenericArray::from_mut_slice(slice));
            }
        }
    }
}

impl Default for SendCodec {
    fn default() -> Self {
        Self::new()
    }
}

/// Decoding half of a leg's codec.
pub struct RecvCodec {
    /// Buffered incoming bytes, already decrypted.
    read_buffer: Vec<u8>,
    decryptor: Option<Decryptor>,
    compression: Option<CompressionThreshold>,
}

impl RecvCodec {
    pub fn new() -> Self {
        Self {
            read_buffer: Vec::new(),
            decryptor: None,
            compression: None,
        }
    }

    pub fn enable_encryption(&mut self, key: EncryptionKey) {
        assert!(
            self.decryptor.is_none(),
            "called enable_encryption() multiple times"
        );
        self.decryptor = Some(Decryptor::new(&key.0.into(), &key.0.into()));
    }

    pub fn enable_compression(&mut self, threshold: CompressionThreshold) {
        assert!(
            self.compression.is_none(),
            "called enable_compression() multiple times"
        );
        self.compression = Some(threshold);
    }

    pub fn compression(&self) -> Option<CompressionThreshold> {
        self.compression
    }

    /// Gives data to the internal read buffer.
    ///
    /// `data` is decrypted in place and its contents after calling this
    /// function are unspecified.
    ///
    /// Call `next_frame` in a loop afterwards until it returns `None`.
    pub fn give_data(&mut self, data: &mut [u8]) {
        if let Some(decryptor) = &mut self.decryptor {
            for byte in data.iter_mut() {
                let slice = slice::from_mut(byte);
                decryptor.decrypt_block_mut(GenericArray::from_mut_slice(slice));
            }
        }
        self.read_buffer.extend_from_slice(data);
    }

    /// Attempts to decode one frame from the buffered data.
    ///
    /// * If not enough data is available, returns `Ok(None)`.
    /// * If a frame was read, returns `Ok(Some(frame))`. More frames may
    ///   be available.
    /// * If an error occurs, returns `Err(e)`, invalidating the stream.
    pub fn next_frame(&mut self) -> Result<Option<RawFrame>, DecodeError> {
        let mut decoder = Decoder::new(&self.read_buffer);
        let (length, length_size) = match decoder.read_var_int_with_size() {
            Ok(x) => x,
            Err(DecodeError::UnexpectedEof(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        let length = usize::try_from(length)?;

        if length > BUFFER_LIMIT {
            return Err(DecodeError::PacketTooLarge(length));
        }
        let contents = match decoder.consume_slice(length) {
            Ok(x) => x,
            Err(DecodeError::UnexpectedEof(_)) => return Ok(None),
            Err(e) => return Err(e),
        };

        let body = match self.compression {
            Some(_) => {
                let mut inner = Decoder::new(contents);
                let declared = usize::try_from(inner.read_var_int()?)?;
                if declared == 0 {
                    inner.buffer().to_vec()
                } else {
                    if declared > BUFFER_LIMIT {
                        return Err(DecodeError::PacketTooLarge(declared));
                    }
                    let mut buf = Vec::with_capacity(declared);
                    flate2::read::ZlibDecoder::new(inner.buffer())
                        .take(BUFFER_LIMIT as u64)
                        .read_to_end(&mut buf)?;
                    if buf.len() != declared {
                        return Err(DecodeError::CompressionMismatch {
                            declared,
                            actual: buf.len(),
                        });
                    }
                    buf
                }
            }
            None => contents.to_vec(),
        };

        // Ids fit in a VarInt, so a 5-byte lookahead always suffices.
        let (id, id_size) = Decoder::new(&body).read_var_int_with_size()?;

        let total_bytes = length_size + length;
        let wire = self.read_buffer[..total_bytes].to_vec();
        self.read_buffer.drain(..total_bytes);

        Ok(Some(RawFrame {
            id,
            id_size,
            body,
            wire,
        }))
    }
}

impl Default for RecvCodec {
    fn default() -> Self {
        Self::new()
    }
}

/// Encodes a packet to a plaintext wire frame.
///
/// With a threshold configured, payloads of at least the threshold are
/// deflated and framed as `[packetLength][dataLength][deflated]`; smaller
/// payloads are framed as `[packetLength][0][payload]`. Without one, the
/// frame is `[packetLength][payload]` with no inner indicator.
pub fn encode_frame<P: PacketId + Encode>(
    compression: Option<CompressionThreshold>,
    packet: &P,
) -> anyhow::Result<Vec<u8>> {
    let mut plain = Vec::new();
    let mut encoder = Encoder::new(&mut plain);
    encoder.write_var_int(P::ID);
    packet.encode(&mut encoder);

    let uncompressed_length = i32::try_from(plain.len())?;
    let mut frame = Vec::new();
    match compression {
        Some(threshold) => {
            let (data_length, data) = if plain.len() >= threshold.get() {
                let mut deflater = flate2::write::ZlibEncoder::new(Vec::new(), COMPRESSION_LEVEL);
                deflater.write_all(&plain).expect("infallible write");
                (uncompressed_length, deflater.finish()?)
            } else {
                // send uncompressed
                (0, plain)
            };
            let mut encoder = Encoder::new(&mut frame);
            encoder
                .write_var_int(i32::try_from(var_int_size(data_length) + data.len())?);
            encoder.write_var_int(data_length);
            encoder.write_slice(&data);
        }
        None => {
            let mut encoder = Encoder::new(&mut frame);
            encoder.write_var_int(uncompressed_length);
            encoder.write_slice(&plain);
        }
    }

    Ok(frame)
}

/// Builds a frame and immediately re-reads it, yielding the `RawFrame`
/// a peer would observe. Test-only.
#[cfg(test)]
pub(crate) fn test_frame<P: PacketId + Encode>(packet: &P) -> RawFrame {
    let mut data = encode_frame(None, packet).expect("encoding failed");
    let mut codec = RecvCodec::new();
    codec.give_data(&mut data);
    codec.next_frame().unwrap().expect("whole frame was given")
}

/// Builds a frame with an explicit id and hand-written fields. Test-only.
#[cfg(test)]
pub(crate) fn test_frame_raw(id: i32, fields: impl FnOnce(&mut Encoder)) -> RawFrame {
    let mut body = Vec::new();
    let mut encoder = Encoder::new(&mut body);
    encoder.write_var_int(id);
    fields(&mut encoder);

    let mut data = Vec::new();
    let mut encoder = Encoder::new(&mut data);
    encoder.write_var_int(body.len() as i32);
    encoder.write_slice(&body);

    let mut codec = RecvCodec::new();
    codec.give_data(&mut data);
    codec.next_frame().unwrap().expect("whole frame was given")
}

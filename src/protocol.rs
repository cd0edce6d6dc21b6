pub const PROTOCOL_VERSION: i32 = 340; // 1.12.2

mod codec;
mod decoder;
mod encoder;
pub mod packet;

pub use codec::{
    encode_frame, CompressionThreshold, EncryptionKey, RawFrame, RecvCodec, SendCodec,
};
#[cfg(test)]
pub(crate) use codec::{test_frame, test_frame_raw};
pub use decoder::{Decode, DecodeError, Decoder};
pub use encoder::{Encode, Encoder};

/// Limit to avoid out-of-memory DOS.
const BUFFER_LIMIT: usize = 1024 * 1024; // 1 MiB

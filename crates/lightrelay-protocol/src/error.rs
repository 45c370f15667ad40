//! Error types for the protocol layer.
//!
//! Each crate in lightrelay defines its own error enum. A `ProtocolError`
//! always means the bytes (or JSON) were wrong, never that the network or
//! the relay state was.

/// Errors that can occur while encoding or decoding protocol data.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// A read needed more bytes than the frame holds.
    ///
    /// This is how truncated or malformed frames show up.
    #[error("unexpected end of frame: needed {needed} bytes, {remaining} left")]
    UnexpectedEof { needed: usize, remaining: usize },

    /// A write did not fit in the destination buffer.
    ///
    /// Send buffers are sized to the transport's maximum packet size, so
    /// this doubles as the "frame too large for the transport" signal.
    #[error("buffer overflow: needed {needed} bytes, {remaining} left")]
    BufferOverflow { needed: usize, remaining: usize },

    /// The leading byte is not a known opcode.
    #[error("unknown opcode {0}")]
    UnknownOpCode(u8),

    /// The opcode is known but only travels in the other direction.
    #[error("opcode {0} is not valid in this direction")]
    UnexpectedOpCode(u8),

    /// A length prefix was negative.
    #[error("negative length prefix {0}")]
    NegativeLength(i32),

    /// A string was not valid UTF-16 (or UTF-8 after decompression).
    #[error("invalid string data")]
    InvalidString,

    /// A region number outside the known set.
    #[error("unknown region {0}")]
    UnknownRegion(String),

    /// Compressed room list was not valid base64.
    #[error("base64 decode failed: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Compressed room list was not a valid LZ4 block.
    #[error("decompression failed: {0}")]
    Decompress(#[from] lz4_flex::block::DecompressError),

    /// JSON encoding or decoding failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

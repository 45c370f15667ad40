//! Compressed room-list text.
//!
//! Room lists can be large, so both nodes and the balancer also serve them
//! as an LZ4 block (with the uncompressed size prepended) wrapped in
//! standard base64.

use base64::prelude::{BASE64_STANDARD, Engine as _};

use crate::ProtocolError;

pub fn compress_text(text: &str) -> String {
    BASE64_STANDARD.encode(lz4_flex::compress_prepend_size(text.as_bytes()))
}

pub fn decompress_text(encoded: &str) -> Result<String, ProtocolError> {
    let raw = BASE64_STANDARD.decode(encoded.trim())?;
    let bytes = lz4_flex::decompress_size_prepended(&raw)?;
    String::from_utf8(bytes).map_err(|_| ProtocolError::InvalidString)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compress_text_reverses_with_decompress() {
        let json = r#"[{"serverId":"ABCDE","serverName":"Lobby"}]"#.repeat(20);
        let packed = compress_text(&json);
        assert!(packed.len() < json.len());
        assert_eq!(decompress_text(&packed).unwrap(), json);
    }

    #[test]
    fn test_decompress_text_invalid_base64_fails() {
        assert!(matches!(
            decompress_text("not base64!!"),
            Err(ProtocolError::Base64(_))
        ));
    }

    #[test]
    fn test_decompress_text_truncated_block_fails() {
        let packed = compress_text("hello hello hello hello");
        let raw = BASE64_STANDARD.decode(&packed).unwrap();
        let cut = BASE64_STANDARD.encode(&raw[..raw.len() - 2]);
        assert!(matches!(
            decompress_text(&cut),
            Err(ProtocolError::Decompress(_))
        ));
    }
}

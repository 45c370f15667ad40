//! Cached, pre-serialized room lists.
//!
//! Server-list requests are far more frequent than room changes, so the
//! JSON (and its compressed form) is built once per change and read
//! queries hand out the cached strings.

use lightrelay_protocol::{compress_text, ProtocolError, RoomListing};

/// A room list and its serialized forms.
#[derive(Debug, Clone)]
pub struct RoomListCache {
    listings: Vec<RoomListing>,
    json: String,
    compressed: String,
}

impl Default for RoomListCache {
    fn default() -> Self {
        Self {
            listings: Vec::new(),
            json: "[]".to_string(),
            compressed: compress_text("[]"),
        }
    }
}

impl RoomListCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the cached list. On error the previous list is kept.
    pub fn rebuild(
        &mut self,
        listings: Vec<RoomListing>,
    ) -> Result<(), ProtocolError> {
        let json = serde_json::to_string(&listings)?;
        self.compressed = compress_text(&json);
        self.json = json;
        self.listings = listings;
        Ok(())
    }

    pub fn listings(&self) -> &[RoomListing] {
        &self.listings
    }

    pub fn json(&self) -> &str {
        &self.json
    }

    /// LZ4 + base64 form of [`json`](Self::json).
    pub fn compressed(&self) -> &str {
        &self.compressed
    }

    pub fn len(&self) -> usize {
        self.listings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listings.is_empty()
    }
}

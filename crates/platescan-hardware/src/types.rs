//! Common types shared across hardware device implementations.

use serde::{Deserialize, Serialize};

/// NFC reader information.
///
/// Contains reader-specific metadata such as supported protocols.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderInfo {
    /// Reader name (e.g., "PN7150").
    pub name: String,

    /// List of supported protocols (e.g., ["ISO14443A"]).
    pub protocols: Vec<String>,
}

impl ReaderInfo {
    /// Create a new ReaderInfo.
    pub fn new(name: impl Into<String>, protocols: Vec<String>) -> Self {
        Self {
            name: name.into(),
            protocols,
        }
    }
}

/// Six byte Mifare Classic sector key.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MifareKey([u8; 6]);

impl MifareKey {
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }
}

impl Default for MifareKey {
    fn default() -> Self {
        Self(platescan_core::constants::DEFAULT_CARD_KEY)
    }
}

// Keys stay out of logs.
impl std::fmt::Debug for MifareKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MifareKey(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_info() {
        let info = ReaderInfo::new("PN7150", vec!["ISO14443A".to_string()]);
        assert_eq!(info.name, "PN7150");
        assert_eq!(info.protocols, vec!["ISO14443A"]);
    }

    #[test]
    fn test_default_key_is_factory_key() {
        assert_eq!(MifareKey::default().as_bytes(), &[0xFF; 6]);
    }

    #[test]
    fn test_key_debug_is_redacted() {
        let key = MifareKey::new([1, 2, 3, 4, 5, 6]);
        assert_eq!(format!("{key:?}"), "MifareKey(..)");
    }

    #[test]
    fn test_reader_info_serialization() {
        let info = ReaderInfo::new("PN7150", vec!["ISO14443A".to_string()]);
        let json = serde_json::to_string(&info).unwrap();
        let deserialized: ReaderInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(info, deserialized);
    }
}

//! Byte and word order for multi-register values
//!
//! Devices are configured with two independent settings: the byte order
//! inside each 16-bit word and the order of the words themselves. The pair
//! collapses into one of the four ABCD patterns below.

use serde::{Deserialize, Serialize};

/// Endianness of one level (bytes inside a word, or words inside a value)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endian {
    #[default]
    #[serde(alias = "BIG", alias = "Big")]
    Big,
    #[serde(alias = "LITTLE", alias = "Little")]
    Little,
}

/// Unified byte/word order representation for 16/32/64-bit values
///
/// # Naming Convention
/// Uses ABCD notation where A is the most significant byte.
///
/// For 32-bit value `0x12345678` the registers on the wire are:
/// - `BigEndian (ABCD)`: [0x1234, 0x5678]
/// - `LittleEndian (DCBA)`: [0x7856, 0x3412]
/// - `BigEndianSwap (CDAB)`: [0x5678, 0x1234] (Modbus common)
/// - `LittleEndianSwap (BADC)`: [0x3412, 0x7856]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    /// Big-endian bytes, big-endian words: ABCD
    BigEndian,

    /// Little-endian bytes, little-endian words: DCBA
    LittleEndian,

    /// Big-endian bytes, little-endian words: CDAB
    BigEndianSwap,

    /// Little-endian bytes, big-endian words: BADC
    LittleEndianSwap,
}

impl ByteOrder {
    /// Combine the independent byte and word order settings
    pub fn from_endian(byte_order: Endian, word_order: Endian) -> Self {
        match (byte_order, word_order) {
            (Endian::Big, Endian::Big) => Self::BigEndian,
            (Endian::Little, Endian::Little) => Self::LittleEndian,
            (Endian::Big, Endian::Little) => Self::BigEndianSwap,
            (Endian::Little, Endian::Big) => Self::LittleEndianSwap,
        }
    }

    /// ABCD pattern of a 32-bit value on the wire
    pub fn pattern(&self) -> &'static str {
        match self {
            Self::BigEndian => "ABCD",
            Self::LittleEndian => "DCBA",
            Self::BigEndianSwap => "CDAB",
            Self::LittleEndianSwap => "BADC",
        }
    }

    /// Bytes inside every word are swapped on the wire
    pub fn swaps_bytes(&self) -> bool {
        matches!(self, Self::LittleEndian | Self::LittleEndianSwap)
    }

    /// Words of a multi-register value arrive least significant first
    pub fn reverses_words(&self) -> bool {
        matches!(self, Self::LittleEndian | Self::BigEndianSwap)
    }
}

impl std::fmt::Display for ByteOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.pattern())
    }
}

impl Default for ByteOrder {
    /// Default to big-endian (network byte order)
    fn default() -> Self {
        Self::BigEndian
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;

    #[test]
    fn test_from_endian_pairs() {
        assert_eq!(
            ByteOrder::from_endian(Endian::Big, Endian::Big),
            ByteOrder::BigEndian
        );
        assert_eq!(
            ByteOrder::from_endian(Endian::Little, Endian::Little),
            ByteOrder::LittleEndian
        );
        assert_eq!(
            ByteOrder::from_endian(Endian::Big, Endian::Little),
            ByteOrder::BigEndianSwap
        );
        assert_eq!(
            ByteOrder::from_endian(Endian::Little, Endian::Big),
            ByteOrder::LittleEndianSwap
        );
    }

    #[test]
    fn test_display_pattern() {
        assert_eq!(ByteOrder::BigEndianSwap.to_string(), "CDAB");
        assert_eq!(ByteOrder::default().to_string(), "ABCD");
    }

    #[test]
    fn test_transform_flags() {
        assert!(!ByteOrder::BigEndian.swaps_bytes());
        assert!(!ByteOrder::BigEndian.reverses_words());
        assert!(ByteOrder::LittleEndian.swaps_bytes());
        assert!(ByteOrder::LittleEndian.reverses_words());
        assert!(ByteOrder::BigEndianSwap.reverses_words());
        assert!(ByteOrder::LittleEndianSwap.swaps_bytes());
    }

    #[test]
    fn test_endian_deserialize() {
        let e: Endian = serde_json::from_str("\"little\"").unwrap();
        assert_eq!(e, Endian::Little);
        let e: Endian = serde_json::from_str("\"BIG\"").unwrap();
        assert_eq!(e, Endian::Big);
    }
}

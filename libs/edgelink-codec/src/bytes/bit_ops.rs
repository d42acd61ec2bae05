//! Bit and byte selection inside a single register word
//!
//! Sub-word value types address either the high byte (bits 8-15) or the
//! low byte (bits 0-7) of one word. Bits are numbered LSB first inside the
//! selected byte. None of these helpers consider byte order: they work on
//! the raw word exactly as the device returned it.

/// Which byte of a register word a sub-word type addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ByteHalf {
    High,
    Low,
}

impl ByteHalf {
    #[inline]
    fn shift(self) -> u8 {
        match self {
            Self::High => 8,
            Self::Low => 0,
        }
    }
}

/// Extract single bit from u16 value
#[inline]
pub fn extract_bit_u16(value: u16, bit_index: u8) -> bool {
    debug_assert!(bit_index < 16, "Bit index out of range: {}", bit_index);
    (value & (1 << bit_index)) != 0
}

/// Extract a bit of the selected byte
#[inline]
pub fn extract_half_bit(word: u16, half: ByteHalf, bit_index: u8) -> bool {
    debug_assert!(bit_index < 8, "Bit index out of range: {}", bit_index);
    extract_bit_u16(word, bit_index + half.shift())
}

/// Return the selected byte of a word
#[inline]
pub fn extract_byte(word: u16, half: ByteHalf) -> u8 {
    (word >> half.shift()) as u8
}

/// Set or clear a bit of the selected byte, leaving every other bit untouched
#[inline]
pub fn insert_half_bit(word: u16, half: ByteHalf, bit_index: u8, value: bool) -> u16 {
    debug_assert!(bit_index < 8, "Bit index out of range: {}", bit_index);
    let mask = 1u16 << (bit_index + half.shift());
    if value {
        word | mask
    } else {
        word & !mask
    }
}

/// Replace the selected byte, preserving the other one
#[inline]
pub fn insert_byte(word: u16, half: ByteHalf, byte: u8) -> u16 {
    let shift = half.shift();
    (word & !(0x00ff << shift)) | (u16::from(byte) << shift)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_half_bit() {
        let word = 0b1000_0001_0000_0010;
        assert!(extract_half_bit(word, ByteHalf::Low, 1));
        assert!(!extract_half_bit(word, ByteHalf::Low, 0));
        assert!(extract_half_bit(word, ByteHalf::High, 0));
        assert!(extract_half_bit(word, ByteHalf::High, 7));
    }

    #[test]
    fn test_extract_byte() {
        assert_eq!(extract_byte(0xABCD, ByteHalf::High), 0xAB);
        assert_eq!(extract_byte(0xABCD, ByteHalf::Low), 0xCD);
    }

    #[test]
    fn test_insert_preserves_siblings() {
        let word = 0xA5F0;
        assert_eq!(insert_half_bit(word, ByteHalf::Low, 0, true), 0xA5F1);
        assert_eq!(insert_half_bit(word, ByteHalf::High, 0, false), 0xA4F0);
        assert_eq!(insert_byte(word, ByteHalf::Low, 0x12), 0xA512);
        assert_eq!(insert_byte(word, ByteHalf::High, 0x12), 0x12F0);
    }
}

//! Numeric type conversions with byte order support
//!
//! Register words are first normalized into a big-endian byte string
//! (ABCD...), then interpreted with the native `from_be_bytes` helpers.
//! Encoding runs the same two transforms in reverse; both are involutions.

use super::ByteOrder;

// ============================================================================
// Register <-> Byte Conversions
// ============================================================================

/// Convert register words to a big-endian byte string under `order`
pub fn regs_to_bytes(regs: &[u16], order: ByteOrder) -> Vec<u8> {
    let mut words = regs.to_vec();
    if order.reverses_words() {
        words.reverse();
    }
    words
        .into_iter()
        .flat_map(|w| {
            let w = if order.swaps_bytes() { w.swap_bytes() } else { w };
            w.to_be_bytes()
        })
        .collect()
}

/// Convert a big-endian byte string into register words under `order`
///
/// An odd trailing byte is padded with zero.
pub fn bytes_to_regs(bytes: &[u8], order: ByteOrder) -> Vec<u16> {
    let mut words: Vec<u16> = bytes
        .chunks(2)
        .map(|chunk| {
            let w = u16::from_be_bytes([chunk[0], chunk.get(1).copied().unwrap_or(0)]);
            if order.swaps_bytes() {
                w.swap_bytes()
            } else {
                w
            }
        })
        .collect();
    if order.reverses_words() {
        words.reverse();
    }
    words
}

/// Copy the first N bytes into a fixed array, zero-filled when short
pub(crate) fn take_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    for (dst, src) in out.iter_mut().zip(bytes) {
        *dst = *src;
    }
    out
}

// ============================================================================
// IEEE-754 binary16
// ============================================================================

/// Decode IEEE-754 half precision bits into f32
pub fn f16_bits_to_f32(bits: u16) -> f32 {
    let sign = u32::from(bits >> 15) << 31;
    let exp = u32::from((bits >> 10) & 0x1f);
    let frac = u32::from(bits & 0x03ff);

    match (exp, frac) {
        (0, 0) => f32::from_bits(sign),
        (0, _) => {
            // subnormal: frac * 2^-24
            let magnitude = frac as f32 * f32::from_bits(0x3380_0000);
            if sign != 0 {
                -magnitude
            } else {
                magnitude
            }
        },
        (0x1f, _) => f32::from_bits(sign | 0x7f80_0000 | (frac << 13)),
        _ => f32::from_bits(sign | ((exp + 112) << 23) | (frac << 13)),
    }
}

/// Encode f32 into IEEE-754 half precision bits (round to nearest even)
pub fn f32_to_f16_bits(value: f32) -> u16 {
    let bits = value.to_bits();
    let sign = ((bits >> 16) & 0x8000) as u16;
    let exp = ((bits >> 23) & 0xff) as i32;
    let frac = bits & 0x007f_ffff;

    if exp == 0xff {
        let nan_bit = if frac != 0 { 0x0200 } else { 0 };
        return sign | 0x7c00 | nan_bit;
    }

    let unbiased = exp - 127;
    if unbiased > 15 {
        return sign | 0x7c00;
    }

    if unbiased >= -14 {
        let mut half = (((unbiased + 15) as u32) << 10) | (frac >> 13);
        let rem = frac & 0x1fff;
        if rem > 0x1000 || (rem == 0x1000 && half & 1 == 1) {
            // carry may roll into the exponent, which is the correct result
            half += 1;
        }
        return sign | half as u16;
    }

    if unbiased < -25 {
        return sign;
    }

    let mantissa = frac | 0x0080_0000;
    let shift = (-unbiased - 1) as u32;
    let mut half = mantissa >> shift;
    let rem = mantissa & ((1 << shift) - 1);
    let halfway = 1 << (shift - 1);
    if rem > halfway || (rem == halfway && half & 1 == 1) {
        half += 1;
    }
    sign | half as u16
}

// ============================================================================
// ASCII packing
// ============================================================================

/// Decode packed ASCII (high byte first), trimming NUL and trailing spaces
pub fn regs_to_ascii(regs: &[u16]) -> String {
    let bytes: Vec<u8> = regs.iter().flat_map(|w| w.to_be_bytes()).collect();
    let text: String = bytes
        .into_iter()
        .take_while(|b| *b != 0)
        .map(char::from)
        .collect();
    text.trim_end().to_string()
}

/// Pack ASCII text two characters per word, high byte first
pub fn ascii_to_regs(text: &str) -> Vec<u16> {
    text.as_bytes()
        .chunks(2)
        .map(|c| u16::from_be_bytes([c[0], c.get(1).copied().unwrap_or(0)]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regs_to_bytes_all_orders() {
        // 0x12345678 as it appears on the wire for each order
        let cases = [
            (ByteOrder::BigEndian, [0x1234, 0x5678]),
            (ByteOrder::LittleEndian, [0x7856, 0x3412]),
            (ByteOrder::BigEndianSwap, [0x5678, 0x1234]),
            (ByteOrder::LittleEndianSwap, [0x3412, 0x7856]),
        ];
        for (order, regs) in cases {
            assert_eq!(
                regs_to_bytes(&regs, order),
                vec![0x12, 0x34, 0x56, 0x78],
                "order {}",
                order
            );
            assert_eq!(bytes_to_regs(&[0x12, 0x34, 0x56, 0x78], order), regs);
        }
    }

    #[test]
    fn test_regs_to_bytes_64bit_swap() {
        let regs = [0x0001, 0x0203, 0x0405, 0x0607];
        let bytes = regs_to_bytes(&regs, ByteOrder::BigEndianSwap);
        assert_eq!(bytes, vec![0x06, 0x07, 0x04, 0x05, 0x02, 0x03, 0x00, 0x01]);
    }

    #[test]
    fn test_f16_known_values() {
        assert_eq!(f32_to_f16_bits(1.5), 0x3e00);
        assert_eq!(f32_to_f16_bits(-2.0), 0xc000);
        assert_eq!(f32_to_f16_bits(65504.0), 0x7bff);
        assert_eq!(f32_to_f16_bits(1.0e6), 0x7c00);
        assert_eq!(f32_to_f16_bits(0.0), 0x0000);

        assert_eq!(f16_bits_to_f32(0x3e00), 1.5);
        assert_eq!(f16_bits_to_f32(0xc000), -2.0);
        assert_eq!(f16_bits_to_f32(0x7bff), 65504.0);
        assert!(f16_bits_to_f32(0x7e00).is_nan());
        assert!(f16_bits_to_f32(0x7c00).is_infinite());
    }

    #[test]
    fn test_f16_subnormal() {
        let smallest = f16_bits_to_f32(0x0001);
        assert!((smallest - 5.960_464_5e-8).abs() < 1e-12);
        assert_eq!(f32_to_f16_bits(smallest), 0x0001);
        assert_eq!(f32_to_f16_bits(-smallest), 0x8001);
    }

    #[test]
    fn test_ascii_packing() {
        let regs = ascii_to_regs("ABC");
        assert_eq!(regs, vec![0x4142, 0x4300]);
        assert_eq!(regs_to_ascii(&regs), "ABC");
        assert_eq!(regs_to_ascii(&[0x4f4b, 0x2020]), "OK");
    }
}

//! Register codec
//!
//! Bit-exact translation between raw register words and [`TypedValue`]s
//! under a configured [`ByteOrder`]. The codec is pure: bus I/O, including
//! the read half of a read-modify-write, belongs to the caller.

use errors::{AcqError, AcqResult};
use tracing::{trace, warn};

use crate::bytes::conversions::take_array;
use crate::bytes::{
    ascii_to_regs, bytes_to_regs, extract_byte, extract_half_bit, f16_bits_to_f32,
    f32_to_f16_bits, insert_byte, insert_half_bit, regs_to_ascii, regs_to_bytes, ByteHalf,
    ByteOrder,
};
use crate::value::TypedValue;
use crate::value_type::ValueType;

/// Clamp a value to the representable range of a value type.
///
/// Prevents wrap-around when writing values that exceed the target
/// register's capacity (e.g. writing 70000 to a UINT16 register).
/// Types without a numeric range are returned unchanged.
pub fn clamp_to_value_type(value: f64, value_type: ValueType) -> f64 {
    match value_type.range() {
        Some((min, max)) => value.clamp(min, max),
        None => value,
    }
}

/// Codec for one device's byte/word order
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegisterCodec {
    order: ByteOrder,
}

impl RegisterCodec {
    pub fn new(order: ByteOrder) -> Self {
        Self { order }
    }

    pub fn order(&self) -> ByteOrder {
        self.order
    }

    // ========================================================================
    // Decoding
    // ========================================================================

    /// Decode one value from the start of `words`
    pub fn decode(&self, words: &[u16], value_type: ValueType) -> AcqResult<TypedValue> {
        if value_type == ValueType::String {
            return Ok(TypedValue::Text(regs_to_ascii(words)));
        }

        let needed = usize::from(value_type.word_count());
        if words.len() < needed {
            return Err(AcqError::invalid_value(format!(
                "{} needs {} words, got {}",
                value_type,
                needed,
                words.len()
            )));
        }
        let words = &words[..needed];
        let first = words[0];

        let value = match value_type {
            ValueType::Coil => TypedValue::Bool(first & 0x0001 != 0),
            ValueType::Bool1 => TypedValue::Bool(extract_half_bit(first, ByteHalf::Low, 0)),
            ValueType::Bit { index, half } => {
                TypedValue::Bool(extract_half_bit(first, half, index))
            },
            ValueType::Int8High => {
                TypedValue::Int(i64::from(extract_byte(first, ByteHalf::High) as i8))
            },
            ValueType::Int8Low => {
                TypedValue::Int(i64::from(extract_byte(first, ByteHalf::Low) as i8))
            },
            ValueType::Uint8High => {
                TypedValue::UInt(u64::from(extract_byte(first, ByteHalf::High)))
            },
            ValueType::Uint8Low => TypedValue::UInt(u64::from(extract_byte(first, ByteHalf::Low))),
            _ => self.decode_wide(words, value_type)?,
        };

        trace!(
            "Decoded {}: words={:04X?}, order={}, value={}",
            value_type,
            words,
            self.order,
            value
        );
        Ok(value)
    }

    /// Word-or-wider numeric types, normalized through the byte order
    fn decode_wide(&self, words: &[u16], value_type: ValueType) -> AcqResult<TypedValue> {
        let bytes = regs_to_bytes(words, self.order);
        let value = match value_type {
            ValueType::Int16 => TypedValue::Int(i64::from(i16::from_be_bytes(take_array(&bytes)))),
            ValueType::Uint16 => {
                TypedValue::UInt(u64::from(u16::from_be_bytes(take_array(&bytes))))
            },
            ValueType::Int32 => TypedValue::Int(i64::from(i32::from_be_bytes(take_array(&bytes)))),
            ValueType::Uint32 => {
                TypedValue::UInt(u64::from(u32::from_be_bytes(take_array(&bytes))))
            },
            ValueType::Int64 => TypedValue::Int(i64::from_be_bytes(take_array(&bytes))),
            ValueType::Uint64 => TypedValue::UInt(u64::from_be_bytes(take_array(&bytes))),
            ValueType::Float16 => {
                let bits = u16::from_be_bytes(take_array(&bytes));
                TypedValue::Float(f64::from(f16_bits_to_f32(bits)))
            },
            ValueType::Float32 => {
                TypedValue::Float(f64::from(f32::from_be_bytes(take_array(&bytes))))
            },
            ValueType::Float64 => TypedValue::Float(f64::from_be_bytes(take_array(&bytes))),
            other => return Err(AcqError::invalid_type(other.name())),
        };
        Ok(value)
    }

    /// Decode `array_count` consecutive values, advancing by the type width
    pub fn decode_array(
        &self,
        words: &[u16],
        value_type: ValueType,
        array_count: u16,
    ) -> AcqResult<TypedValue> {
        if array_count <= 1 {
            return self.decode(words, value_type);
        }
        let step = usize::from(value_type.word_count());
        let values = (0..usize::from(array_count))
            .map(|i| {
                let start = i * step;
                let slice = words.get(start..).unwrap_or(&[]);
                self.decode(slice, value_type)
            })
            .collect::<AcqResult<Vec<_>>>()?;
        Ok(TypedValue::List(values))
    }

    /// Coil runs: one bit yields a scalar, several yield a list
    pub fn decode_coils(&self, bits: &[bool]) -> AcqResult<TypedValue> {
        match bits {
            [] => Err(AcqError::invalid_value("empty coil read")),
            [single] => Ok(TypedValue::Bool(*single)),
            many => Ok(TypedValue::List(
                many.iter().copied().map(TypedValue::Bool).collect(),
            )),
        }
    }

    // ========================================================================
    // Encoding
    // ========================================================================

    /// Encode a value into register words
    ///
    /// Sub-word types are read-modify-write: `existing` must hold the
    /// current contents of the addressed word and every bit outside the
    /// targeted bit or byte is preserved.
    pub fn encode(
        &self,
        value_type: ValueType,
        value: &TypedValue,
        existing: Option<u16>,
    ) -> AcqResult<Vec<u16>> {
        if value_type.is_sub_word() {
            let word = existing.ok_or_else(|| {
                AcqError::invalid_value(format!(
                    "{} write requires the current register contents",
                    value_type
                ))
            })?;
            return self.encode_sub_word(value_type, value, word).map(|w| vec![w]);
        }

        match value_type {
            ValueType::Coil => {
                let bit = require_bool(value, value_type)?;
                Ok(vec![u16::from(bit)])
            },
            ValueType::String => match value {
                TypedValue::Text(text) => Ok(ascii_to_regs(text)),
                other => Ok(ascii_to_regs(&other.to_string())),
            },
            _ => {
                let bytes = match self.clamped_integer(value, value_type) {
                    Some(integer) => integer_bytes(integer, value_type)?,
                    None => float_bytes(self.clamped_number(value, value_type)?, value_type)?,
                };
                let words = bytes_to_regs(&bytes, self.order);
                trace!(
                    "Encoded {}: value={}, order={}, words={:04X?}",
                    value_type,
                    value,
                    self.order,
                    words
                );
                Ok(words)
            },
        }
    }

    fn encode_sub_word(
        &self,
        value_type: ValueType,
        value: &TypedValue,
        word: u16,
    ) -> AcqResult<u16> {
        let updated = match value_type {
            ValueType::Bool1 => {
                insert_half_bit(word, ByteHalf::Low, 0, require_bool(value, value_type)?)
            },
            ValueType::Bit { index, half } => {
                insert_half_bit(word, half, index, require_bool(value, value_type)?)
            },
            ValueType::Int8High | ValueType::Int8Low => {
                let byte = self.clamped_number(value, value_type)?.round() as i8 as u8;
                let half = if value_type == ValueType::Int8High {
                    ByteHalf::High
                } else {
                    ByteHalf::Low
                };
                insert_byte(word, half, byte)
            },
            ValueType::Uint8High | ValueType::Uint8Low => {
                let byte = self.clamped_number(value, value_type)?.round() as u8;
                let half = if value_type == ValueType::Uint8High {
                    ByteHalf::High
                } else {
                    ByteHalf::Low
                };
                insert_byte(word, half, byte)
            },
            other => return Err(AcqError::invalid_type(other.name())),
        };
        trace!(
            "Encoded {} into existing word 0x{:04X} -> 0x{:04X}",
            value_type,
            word,
            updated
        );
        Ok(updated)
    }

    /// Integer input for a whole-word integer type, clamped in integer space
    ///
    /// 64-bit values above 2^53 do not survive a trip through f64.
    fn clamped_integer(&self, value: &TypedValue, value_type: ValueType) -> Option<i128> {
        let requested = match value {
            TypedValue::Int(i) => i128::from(*i),
            TypedValue::UInt(u) => i128::from(*u),
            _ => return None,
        };
        let (min, max) = integer_range(value_type)?;
        let clamped = requested.clamp(min, max);
        if clamped != requested {
            warn!(
                "Value {} out of range for {}, clamped to {}",
                requested, value_type, clamped
            );
        }
        Some(clamped)
    }

    fn clamped_number(&self, value: &TypedValue, value_type: ValueType) -> AcqResult<f64> {
        let number = value.as_f64().ok_or_else(|| {
            AcqError::invalid_value(format!("{} cannot be written as {}", value, value_type))
        })?;
        if !number.is_finite() && value_type.is_integer() {
            return Err(AcqError::invalid_value(format!(
                "non-finite value {} for {}",
                number, value_type
            )));
        }
        let clamped = clamp_to_value_type(number, value_type);
        if clamped != number && !number.is_nan() {
            warn!(
                "Value {} out of range for {}, clamped to {}",
                number, value_type, clamped
            );
        }
        Ok(clamped)
    }
}

fn integer_range(value_type: ValueType) -> Option<(i128, i128)> {
    let range = match value_type {
        ValueType::Int16 => (i128::from(i16::MIN), i128::from(i16::MAX)),
        ValueType::Uint16 => (0, i128::from(u16::MAX)),
        ValueType::Int32 => (i128::from(i32::MIN), i128::from(i32::MAX)),
        ValueType::Uint32 => (0, i128::from(u32::MAX)),
        ValueType::Int64 => (i128::from(i64::MIN), i128::from(i64::MAX)),
        ValueType::Uint64 => (0, i128::from(u64::MAX)),
        _ => return None,
    };
    Some(range)
}

/// Big-endian bytes of an integer already clamped to `value_type`
fn integer_bytes(integer: i128, value_type: ValueType) -> AcqResult<Vec<u8>> {
    let bytes = match value_type {
        ValueType::Int16 => (integer as i16).to_be_bytes().to_vec(),
        ValueType::Uint16 => (integer as u16).to_be_bytes().to_vec(),
        ValueType::Int32 => (integer as i32).to_be_bytes().to_vec(),
        ValueType::Uint32 => (integer as u32).to_be_bytes().to_vec(),
        ValueType::Int64 => (integer as i64).to_be_bytes().to_vec(),
        ValueType::Uint64 => (integer as u64).to_be_bytes().to_vec(),
        other => return Err(AcqError::invalid_type(other.name())),
    };
    Ok(bytes)
}

/// Big-endian bytes of a clamped number; integer types round to nearest
fn float_bytes(number: f64, value_type: ValueType) -> AcqResult<Vec<u8>> {
    let bytes = match value_type {
        ValueType::Int16 => (number.round() as i16).to_be_bytes().to_vec(),
        ValueType::Uint16 => (number.round() as u16).to_be_bytes().to_vec(),
        ValueType::Int32 => (number.round() as i32).to_be_bytes().to_vec(),
        ValueType::Uint32 => (number.round() as u32).to_be_bytes().to_vec(),
        ValueType::Int64 => (number.round() as i64).to_be_bytes().to_vec(),
        ValueType::Uint64 => (number.round() as u64).to_be_bytes().to_vec(),
        ValueType::Float16 => f32_to_f16_bits(number as f32).to_be_bytes().to_vec(),
        ValueType::Float32 => (number as f32).to_be_bytes().to_vec(),
        ValueType::Float64 => number.to_be_bytes().to_vec(),
        other => return Err(AcqError::invalid_type(other.name())),
    };
    Ok(bytes)
}

fn require_bool(value: &TypedValue, value_type: ValueType) -> AcqResult<bool> {
    value.as_bool().ok_or_else(|| {
        AcqError::invalid_value(format!("{} cannot be written as {}", value, value_type))
    })
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    const ORDERS: [ByteOrder; 4] = [
        ByteOrder::BigEndian,
        ByteOrder::LittleEndian,
        ByteOrder::BigEndianSwap,
        ByteOrder::LittleEndianSwap,
    ];

    fn round_trip(codec: &RegisterCodec, vt: ValueType, value: TypedValue) -> TypedValue {
        let words = codec.encode(vt, &value, None).unwrap();
        codec.decode(&words, vt).unwrap()
    }

    #[test]
    fn test_numeric_types_survive_every_order() {
        let cases = [
            (ValueType::Int16, TypedValue::Int(-1234)),
            (ValueType::Uint16, TypedValue::UInt(65000)),
            (ValueType::Int32, TypedValue::Int(-70000)),
            (ValueType::Uint32, TypedValue::UInt(4_000_000_000)),
            (ValueType::Int64, TypedValue::Int(-9_000_000_000_000)),
            (ValueType::Int64, TypedValue::Int((1 << 53) + 1)),
            (ValueType::Int64, TypedValue::Int(i64::MAX)),
            (ValueType::Int64, TypedValue::Int(i64::MIN)),
            (ValueType::Uint64, TypedValue::UInt(1 << 52)),
            (ValueType::Uint64, TypedValue::UInt(u64::MAX)),
            (ValueType::Uint64, TypedValue::UInt(u64::MAX - 1)),
            (ValueType::Float16, TypedValue::Float(-0.5)),
            (ValueType::Float32, TypedValue::Float(123.25)),
            (ValueType::Float64, TypedValue::Float(-1.0e-300)),
        ];
        for order in ORDERS {
            let codec = RegisterCodec::new(order);
            for (vt, value) in cases.iter() {
                assert_eq!(
                    round_trip(&codec, *vt, value.clone()),
                    *value,
                    "{} under {}",
                    vt,
                    order
                );
            }
        }
    }

    #[test]
    fn test_float32_word_layouts() {
        // 1.0f32 = 0x3F800000
        let be = RegisterCodec::new(ByteOrder::BigEndian);
        let swap = RegisterCodec::new(ByteOrder::BigEndianSwap);
        let le = RegisterCodec::new(ByteOrder::LittleEndian);
        let one = TypedValue::Float(1.0);
        assert_eq!(be.encode(ValueType::Float32, &one, None).unwrap(), vec![0x3F80, 0x0000]);
        assert_eq!(swap.encode(ValueType::Float32, &one, None).unwrap(), vec![0x0000, 0x3F80]);
        assert_eq!(le.encode(ValueType::Float32, &one, None).unwrap(), vec![0x0000, 0x803F]);
        assert_eq!(le.decode(&[0x0000, 0x803F], ValueType::Float32).unwrap(), one);
    }

    #[test]
    fn test_int16_little_byte_order_swaps_bytes() {
        let le = RegisterCodec::new(ByteOrder::LittleEndianSwap);
        assert_eq!(le.decode(&[0x3412], ValueType::Uint16).unwrap(), TypedValue::UInt(0x1234));
    }

    #[test]
    fn test_sub_word_decode_ignores_byte_order() {
        for order in ORDERS {
            let codec = RegisterCodec::new(order);
            let word = [0x80_05];
            assert_eq!(codec.decode(&word, ValueType::Int8High).unwrap(), TypedValue::Int(-128));
            assert_eq!(codec.decode(&word, ValueType::Uint8Low).unwrap(), TypedValue::UInt(5));
            assert_eq!(codec.decode(&word, ValueType::Bool1).unwrap(), TypedValue::Bool(true));
            assert_eq!(
                codec.decode(&word, "BIT2LOW".parse().unwrap()).unwrap(),
                TypedValue::Bool(true)
            );
            assert_eq!(
                codec.decode(&word, "BIT7HIGH".parse().unwrap()).unwrap(),
                TypedValue::Bool(true)
            );
            assert_eq!(
                codec.decode(&word, "BIT6HIGH".parse().unwrap()).unwrap(),
                TypedValue::Bool(false)
            );
        }
    }

    #[test]
    fn test_sub_word_write_preserves_sibling_bits() {
        let codec = RegisterCodec::default();
        let existing = 0xA55A;

        let words = codec
            .encode(ValueType::Uint8Low, &TypedValue::UInt(0x12), Some(existing))
            .unwrap();
        assert_eq!(words[0] >> 8, existing >> 8);
        assert_eq!(words[0] & 0xFF, 0x12);

        let words = codec
            .encode(ValueType::Int8High, &TypedValue::Int(-1), Some(existing))
            .unwrap();
        assert_eq!(words[0] & 0xFF, existing & 0xFF);
        assert_eq!(words[0] >> 8, 0xFF);

        let bit = "BIT0HIGH".parse().unwrap();
        let words = codec.encode(bit, &TypedValue::Bool(false), Some(existing)).unwrap();
        assert_eq!(words[0], 0xA45A);
        assert_eq!(words[0] & 0xFF, existing & 0xFF);
    }

    #[test]
    fn test_sub_word_write_requires_existing_word() {
        let codec = RegisterCodec::default();
        let err = codec
            .encode(ValueType::Bool1, &TypedValue::Bool(true), None)
            .unwrap_err();
        assert!(matches!(err, AcqError::InvalidValue(_)));
    }

    #[test]
    #[traced_test]
    fn test_encode_clamps_out_of_range() {
        let codec = RegisterCodec::default();
        let words = codec
            .encode(ValueType::Uint16, &TypedValue::Float(70000.0), None)
            .unwrap();
        assert_eq!(words, vec![0xFFFF]);
        let words = codec
            .encode(ValueType::Int16, &TypedValue::Float(-40000.0), None)
            .unwrap();
        assert_eq!(words, vec![0x8000]);
        assert!(logs_contain("out of range for INT16"));
    }

    #[test]
    fn test_integer_clamp_stays_exact() {
        let codec = RegisterCodec::default();
        let words = codec
            .encode(ValueType::Int64, &TypedValue::UInt(u64::MAX), None)
            .unwrap();
        assert_eq!(codec.decode(&words, ValueType::Int64).unwrap(), TypedValue::Int(i64::MAX));
        let words = codec
            .encode(ValueType::Uint32, &TypedValue::Int(-1), None)
            .unwrap();
        assert_eq!(words, vec![0x0000, 0x0000]);
        let words = codec
            .encode(ValueType::Uint64, &TypedValue::Float(1.5), None)
            .unwrap();
        assert_eq!(codec.decode(&words, ValueType::Uint64).unwrap(), TypedValue::UInt(2));
    }

    #[test]
    fn test_decode_array_advances_by_width() {
        let codec = RegisterCodec::default();
        let words = [0x0000, 0x0001, 0x0000, 0x0002, 0xFFFF, 0xFFFF];
        let value = codec.decode_array(&words, ValueType::Int32, 3).unwrap();
        assert_eq!(
            value,
            TypedValue::List(vec![TypedValue::Int(1), TypedValue::Int(2), TypedValue::Int(-1)])
        );
    }

    #[test]
    fn test_decode_short_input_is_invalid_value() {
        let codec = RegisterCodec::default();
        let err = codec.decode(&[0x0001], ValueType::Float64).unwrap_err();
        assert!(matches!(err, AcqError::InvalidValue(_)));
    }

    #[test]
    fn test_string_and_coils() {
        let codec = RegisterCodec::default();
        let words = codec
            .encode(ValueType::String, &TypedValue::Text("PUMP-1".into()), None)
            .unwrap();
        assert_eq!(words.len(), 3);
        assert_eq!(
            codec.decode(&words, ValueType::String).unwrap(),
            TypedValue::Text("PUMP-1".into())
        );

        assert_eq!(codec.decode_coils(&[true]).unwrap(), TypedValue::Bool(true));
        assert_eq!(
            codec.decode_coils(&[true, false]).unwrap(),
            TypedValue::List(vec![TypedValue::Bool(true), TypedValue::Bool(false)])
        );
    }

    #[test]
    fn test_clamp_to_value_type() {
        assert_eq!(clamp_to_value_type(300.0, ValueType::Uint8Low), 255.0);
        assert_eq!(clamp_to_value_type(-5.0, ValueType::Uint32), 0.0);
        assert_eq!(clamp_to_value_type(1.0e9, ValueType::Float16), 65504.0);
        assert_eq!(clamp_to_value_type(7.0, ValueType::Coil), 7.0);
    }
}

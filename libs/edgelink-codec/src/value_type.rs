//! Register value types, register spaces and access modes

use std::fmt;
use std::str::FromStr;

use errors::AcqError;
use serde::{Deserialize, Serialize};

use crate::bytes::ByteHalf;

/// Typed interpretation of register contents
///
/// Names follow the device configuration vocabulary (`FLOAT32`, `BIT3HIGH`,
/// `UINT8LOW`, ...) and parse case-insensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ValueType {
    /// Raw coil bit
    Coil,
    /// Bit 0 of the low byte
    Bool1,
    Int8High,
    Int8Low,
    Uint8High,
    Uint8Low,
    Int16,
    Int32,
    Int64,
    Uint16,
    Uint32,
    Uint64,
    Float16,
    Float32,
    Float64,
    /// Packed ASCII over a fixed number of words
    String,
    /// Single bit of the high or low byte
    Bit { index: u8, half: ByteHalf },
}

impl ValueType {
    /// Number of words one value occupies
    pub fn word_count(&self) -> u16 {
        match self {
            Self::Int64 | Self::Uint64 | Self::Float64 => 4,
            Self::Int32 | Self::Uint32 | Self::Float32 => 2,
            _ => 1,
        }
    }

    /// Types narrower than a word; writing them needs the current word
    pub fn is_sub_word(&self) -> bool {
        matches!(
            self,
            Self::Bool1
                | Self::Int8High
                | Self::Int8Low
                | Self::Uint8High
                | Self::Uint8Low
                | Self::Bit { .. }
        )
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            Self::Int8High
                | Self::Int8Low
                | Self::Uint8High
                | Self::Uint8Low
                | Self::Int16
                | Self::Int32
                | Self::Int64
                | Self::Uint16
                | Self::Uint32
                | Self::Uint64
        )
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Self::Float16 | Self::Float32 | Self::Float64)
    }

    /// Boolean-valued types (coils and single bits)
    pub fn is_boolean(&self) -> bool {
        matches!(self, Self::Coil | Self::Bool1 | Self::Bit { .. })
    }

    /// Representable range used to clamp written values
    pub fn range(&self) -> Option<(f64, f64)> {
        let range = match self {
            Self::Int8High | Self::Int8Low => (f64::from(i8::MIN), f64::from(i8::MAX)),
            Self::Uint8High | Self::Uint8Low => (0.0, f64::from(u8::MAX)),
            Self::Int16 => (f64::from(i16::MIN), f64::from(i16::MAX)),
            Self::Uint16 => (0.0, f64::from(u16::MAX)),
            Self::Int32 => (f64::from(i32::MIN), f64::from(i32::MAX)),
            Self::Uint32 => (0.0, f64::from(u32::MAX)),
            Self::Int64 => (i64::MIN as f64, i64::MAX as f64),
            Self::Uint64 => (0.0, u64::MAX as f64),
            Self::Float16 => (-65504.0, 65504.0),
            Self::Float32 => (f64::from(f32::MIN), f64::from(f32::MAX)),
            Self::Float64 => (f64::MIN, f64::MAX),
            Self::Coil | Self::Bool1 | Self::String | Self::Bit { .. } => return None,
        };
        Some(range)
    }

    pub fn name(&self) -> String {
        match self {
            Self::Coil => "COIL".into(),
            Self::Bool1 => "BOOL1".into(),
            Self::Int8High => "INT8HIGH".into(),
            Self::Int8Low => "INT8LOW".into(),
            Self::Uint8High => "UINT8HIGH".into(),
            Self::Uint8Low => "UINT8LOW".into(),
            Self::Int16 => "INT16".into(),
            Self::Int32 => "INT32".into(),
            Self::Int64 => "INT64".into(),
            Self::Uint16 => "UINT16".into(),
            Self::Uint32 => "UINT32".into(),
            Self::Uint64 => "UINT64".into(),
            Self::Float16 => "FLOAT16".into(),
            Self::Float32 => "FLOAT32".into(),
            Self::Float64 => "FLOAT64".into(),
            Self::String => "STRING".into(),
            Self::Bit {
                index,
                half: ByteHalf::High,
            } => format!("BIT{}HIGH", index),
            Self::Bit {
                index,
                half: ByteHalf::Low,
            } => format!("BIT{}LOW", index),
        }
    }
}

impl FromStr for ValueType {
    type Err = AcqError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase();
        let value_type = match normalized.as_str() {
            "COIL" => Self::Coil,
            "BOOL1" => Self::Bool1,
            "INT8HIGH" => Self::Int8High,
            "INT8LOW" => Self::Int8Low,
            "UINT8HIGH" => Self::Uint8High,
            "UINT8LOW" => Self::Uint8Low,
            "INT16" => Self::Int16,
            "INT32" => Self::Int32,
            "INT64" => Self::Int64,
            "UINT16" => Self::Uint16,
            "UINT32" => Self::Uint32,
            "UINT64" => Self::Uint64,
            "FLOAT16" => Self::Float16,
            "FLOAT32" => Self::Float32,
            "FLOAT64" => Self::Float64,
            "STRING" => Self::String,
            other => parse_bit(other).ok_or_else(|| AcqError::invalid_type(s))?,
        };
        Ok(value_type)
    }
}

/// `BITn`, `BITnHIGH`, `BITnLOW` with n in 0..=7; unsuffixed means low byte
fn parse_bit(name: &str) -> Option<ValueType> {
    let rest = name.strip_prefix("BIT")?;
    let (digits, half) = if let Some(d) = rest.strip_suffix("HIGH") {
        (d, ByteHalf::High)
    } else if let Some(d) = rest.strip_suffix("LOW") {
        (d, ByteHalf::Low)
    } else {
        (rest, ByteHalf::Low)
    };
    if digits.len() != 1 {
        return None;
    }
    let index: u8 = digits.parse().ok()?;
    (index < 8).then_some(ValueType::Bit { index, half })
}

impl TryFrom<String> for ValueType {
    type Error = AcqError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ValueType> for String {
    fn from(value: ValueType) -> Self {
        value.name()
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Addressable register space on the field bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RegisterSpace {
    #[serde(alias = "coil", alias = "COILS")]
    Coil,
    #[serde(alias = "input", alias = "INPUT_REGISTER")]
    Input,
    #[default]
    #[serde(alias = "holding", alias = "HOLDING_REGISTER")]
    Holding,
}

impl fmt::Display for RegisterSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Coil => "coil",
            Self::Input => "input",
            Self::Holding => "holding",
        };
        f.write_str(name)
    }
}

/// Access mode of a register command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Access {
    #[serde(alias = "R", alias = "read")]
    Read,
    #[serde(alias = "W", alias = "write")]
    Write,
    #[default]
    #[serde(alias = "RW", alias = "read_write", alias = "READ_WRITE")]
    ReadWrite,
}

impl Access {
    pub fn can_read(&self) -> bool {
        matches!(self, Self::Read | Self::ReadWrite)
    }

    pub fn can_write(&self) -> bool {
        matches!(self, Self::Write | Self::ReadWrite)
    }
}

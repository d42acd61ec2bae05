//! Binary data processing utilities
//!
//! Byte/word order handling, bit and byte selection inside a register word,
//! and numeric conversions between register words and typed values.

pub mod bit_ops;
pub mod byte_order;
pub mod conversions;

pub use bit_ops::*;
pub use byte_order::{ByteOrder, Endian};
pub use conversions::*;

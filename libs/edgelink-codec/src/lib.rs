//! Typed register codec for Modbus-style field devices
//!
//! - [`bytes`]: byte order handling and bit level helpers
//! - [`codec`]: value type aware encode/decode of register words
//! - [`client`]: typed reads and writes against a [`FieldDevice`]

pub mod bytes;
pub mod client;
pub mod codec;
pub mod command;
pub mod device;
pub mod value;
pub mod value_type;

pub use bytes::{ByteHalf, ByteOrder, Endian};
pub use client::{RegisterClient, DEFAULT_MAX_BATCH_SIZE};
pub use codec::{clamp_to_value_type, RegisterCodec};
pub use command::{CommandTable, RegisterCommand};
pub use device::{DeviceHandle, FieldDevice};
pub use value::TypedValue;
pub use value_type::{Access, RegisterSpace, ValueType};

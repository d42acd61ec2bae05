//! Typed register access on top of a [`FieldDevice`]
//!
//! [`RegisterClient`] resolves a [`RegisterCommand`] into device primitive
//! calls and runs the results through the [`RegisterCodec`]. It never
//! retries; retry policy belongs to whoever wraps the device.

use errors::{AcqError, AcqResult};
use tracing::debug;

use crate::codec::RegisterCodec;
use crate::command::RegisterCommand;
use crate::device::FieldDevice;
use crate::value::TypedValue;
use crate::value_type::{RegisterSpace, ValueType};

/// Default upper bound of registers per request for range dumps
pub const DEFAULT_MAX_BATCH_SIZE: u16 = 100;

pub struct RegisterClient<'a> {
    device: &'a dyn FieldDevice,
    codec: RegisterCodec,
}

impl<'a> RegisterClient<'a> {
    pub fn new(device: &'a dyn FieldDevice, codec: RegisterCodec) -> Self {
        Self { device, codec }
    }

    pub fn codec(&self) -> &RegisterCodec {
        &self.codec
    }

    /// Read raw words from a register space
    pub async fn read_words(
        &self,
        space: RegisterSpace,
        address: u16,
        count: u16,
    ) -> AcqResult<Vec<u16>> {
        let words = match space {
            RegisterSpace::Holding => self.device.read_holding_registers(address, count).await?,
            RegisterSpace::Input => self.device.read_input_registers(address, count).await?,
            RegisterSpace::Coil => {
                return Err(AcqError::invalid_value(
                    "coil space has no register words",
                ))
            },
        };
        if words.len() < usize::from(count) {
            return Err(AcqError::transport(format!(
                "{}: short read at {} {}: expected {} words, got {}",
                self.device.name(),
                space,
                address,
                count,
                words.len()
            )));
        }
        Ok(words)
    }

    /// Read and decode `array_count` values described by `command`
    pub async fn read_value(
        &self,
        command: &RegisterCommand,
        array_count: u16,
    ) -> AcqResult<TypedValue> {
        if !command.access.can_read() {
            return Err(AcqError::invalid_value(format!(
                "register {} is write-only",
                command.address
            )));
        }
        let count = command.read_count(array_count);
        debug!(
            "{}: read {} {} x{} as {}",
            self.device.name(),
            command.space,
            command.address,
            count,
            command.value_type
        );

        if command.is_coil() {
            let bits = self.device.read_coils(command.address, count).await?;
            return self.codec.decode_coils(&bits);
        }

        let words = self.read_words(command.space, command.address, count).await?;
        self.codec
            .decode_array(&words, command.value_type, array_count.max(1))
    }

    /// Encode and write `value`, returning the value as the device now holds it
    ///
    /// Sub-word types read the addressed holding word first so that sibling
    /// bits and the other byte survive the write.
    pub async fn write_value(
        &self,
        command: &RegisterCommand,
        value: &TypedValue,
    ) -> AcqResult<TypedValue> {
        if !command.access.can_write() {
            return Err(AcqError::invalid_value(format!(
                "register {} is read-only",
                command.address
            )));
        }

        if command.is_coil() {
            let bit = value.as_bool().ok_or_else(|| {
                AcqError::invalid_value(format!("cannot write {} to a coil", value))
            })?;
            self.device.write_coil(command.address, bit).await?;
            debug!("{}: coil {} <- {}", self.device.name(), command.address, bit);
            return Ok(TypedValue::Bool(bit));
        }

        if command.space == RegisterSpace::Input {
            return Err(AcqError::invalid_value(format!(
                "input register {} is read-only",
                command.address
            )));
        }

        let existing = if command.value_type.is_sub_word() {
            let current = self
                .read_words(RegisterSpace::Holding, command.address, 1)
                .await?;
            current.first().copied()
        } else {
            None
        };

        let mut words = self.codec.encode(command.value_type, value, existing)?;
        if command.value_type == ValueType::String {
            if let Some(count) = command.count {
                words.resize(usize::from(count), 0);
            }
        }
        self.device.write_registers(command.address, &words).await?;
        debug!(
            "{}: holding {} <- {:04X?}",
            self.device.name(),
            command.address,
            words
        );
        self.codec.decode(&words, command.value_type)
    }

    /// Read `count` raw words starting at `start` in chunks of `max_batch_size`
    pub async fn read_registers_in_batch(
        &self,
        space: RegisterSpace,
        start: u16,
        count: u16,
        max_batch_size: u16,
    ) -> AcqResult<Vec<u16>> {
        if max_batch_size == 0 {
            return Err(AcqError::invalid_value("batch size must be positive"));
        }
        if u32::from(start) + u32::from(count) > u32::from(u16::MAX) + 1 {
            return Err(AcqError::invalid_value(format!(
                "range {}+{} exceeds the register address space",
                start, count
            )));
        }

        let mut words = Vec::with_capacity(usize::from(count));
        let mut offset: u32 = 0;
        while offset < u32::from(count) {
            let chunk = (u32::from(count) - offset).min(u32::from(max_batch_size)) as u16;
            let address = (u32::from(start) + offset) as u16;
            words.extend(self.read_words(space, address, chunk).await?);
            offset += u32::from(chunk);
        }
        Ok(words)
    }
}

//! Register command descriptors
//!
//! A [`RegisterCommand`] names one addressable value on the device. Named
//! commands are grouped in a [`CommandTable`] so measurements can refer to
//! them by name instead of repeating address and type.

use std::collections::HashMap;

use errors::{AcqError, AcqResult};
use serde::{Deserialize, Serialize};

use crate::value_type::{Access, RegisterSpace, ValueType};

/// Immutable descriptor of one register (or coil) value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct RegisterCommand {
    #[serde(alias = "REGISTER_NUMBER", alias = "REGISTER")]
    pub address: u16,
    #[serde(default, alias = "REGISTER_TYPE")]
    pub space: RegisterSpace,
    pub value_type: ValueType,
    #[serde(default)]
    pub access: Access,
    /// Word count override; derived from the value type when absent
    #[serde(default)]
    pub count: Option<u16>,
    #[serde(default)]
    pub uom: Option<String>,
}

impl RegisterCommand {
    pub fn new(address: u16, value_type: ValueType) -> Self {
        Self {
            address,
            space: RegisterSpace::default(),
            value_type,
            access: Access::default(),
            count: None,
            uom: None,
        }
    }

    pub fn with_space(mut self, space: RegisterSpace) -> Self {
        self.space = space;
        self
    }

    pub fn with_access(mut self, access: Access) -> Self {
        self.access = access;
        self
    }

    pub fn with_count(mut self, count: u16) -> Self {
        self.count = Some(count);
        self
    }

    pub fn with_uom(mut self, uom: impl Into<String>) -> Self {
        self.uom = Some(uom.into());
        self
    }

    /// Coil reads go through the coil primitives regardless of the space
    pub fn is_coil(&self) -> bool {
        self.space == RegisterSpace::Coil || self.value_type == ValueType::Coil
    }

    /// Words (or coils) to request for `array_count` values
    ///
    /// Sub-word types always resolve to exactly one word per value.
    pub fn read_count(&self, array_count: u16) -> u16 {
        let array_count = array_count.max(1);
        if self.value_type.is_sub_word() {
            return array_count;
        }
        match self.count {
            Some(count) => count,
            None => self.value_type.word_count().saturating_mul(array_count),
        }
    }
}

/// Named register commands exposed by a device
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandTable {
    commands: HashMap<String, RegisterCommand>,
}

impl CommandTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, command: RegisterCommand) {
        self.commands.insert(name.into(), command);
    }

    pub fn get(&self, name: &str) -> AcqResult<&RegisterCommand> {
        self.commands
            .get(name)
            .ok_or_else(|| AcqError::configuration(format!("unknown register command '{}'", name)))
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;

    #[test]
    fn test_read_count_derivation() {
        let cmd = RegisterCommand::new(10, ValueType::Float32);
        assert_eq!(cmd.read_count(1), 2);
        assert_eq!(cmd.read_count(3), 6);
        assert_eq!(cmd.clone().with_count(8).read_count(3), 8);

        let bit = RegisterCommand::new(10, "BIT3HIGH".parse().unwrap()).with_count(4);
        assert_eq!(bit.read_count(1), 1);
    }

    #[test]
    fn test_descriptor_keys() {
        let json = r#"{"REGISTER_NUMBER": 40, "REGISTER_TYPE": "input", "VALUE_TYPE": "int16", "UOM": "bar"}"#;
        let cmd: RegisterCommand = serde_json::from_str(json).unwrap();
        assert_eq!(cmd.address, 40);
        assert_eq!(cmd.space, RegisterSpace::Input);
        assert_eq!(cmd.value_type, ValueType::Int16);
        assert_eq!(cmd.access, Access::ReadWrite);
        assert_eq!(cmd.uom.as_deref(), Some("bar"));
    }

    #[test]
    fn test_unknown_value_type_rejected() {
        let json = r#"{"ADDRESS": 1, "VALUE_TYPE": "FLOAT128"}"#;
        assert!(serde_json::from_str::<RegisterCommand>(json).is_err());
    }

    #[test]
    fn test_table_lookup() {
        let mut table = CommandTable::new();
        table.insert("SPEED", RegisterCommand::new(1, ValueType::Uint16));
        assert_eq!(table.get("SPEED").unwrap().address, 1);
        assert!(matches!(
            table.get("TORQUE").unwrap_err(),
            AcqError::Configuration(_)
        ));
    }
}

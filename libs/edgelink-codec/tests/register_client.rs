//! RegisterClient against an in-memory device

#![allow(clippy::disallowed_methods)]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use edgelink_codec::{
    Access, ByteOrder, FieldDevice, RegisterClient, RegisterCodec, RegisterCommand,
    RegisterSpace, TypedValue, ValueType,
};
use errors::{AcqError, AcqResult};

#[derive(Default)]
struct MemoryDevice {
    holding: Mutex<HashMap<u16, u16>>,
    input: Mutex<HashMap<u16, u16>>,
    coils: Mutex<HashMap<u16, bool>>,
    reads: Mutex<Vec<(u16, u16)>>,
}

impl MemoryDevice {
    fn with_holding(words: &[(u16, u16)]) -> Self {
        let device = Self::default();
        device.holding.lock().unwrap().extend(words.iter().copied());
        device
    }

    fn holding(&self, address: u16) -> u16 {
        self.holding
            .lock()
            .unwrap()
            .get(&address)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl FieldDevice for MemoryDevice {
    fn name(&self) -> &str {
        "memory"
    }

    async fn connect(&self) -> AcqResult<()> {
        Ok(())
    }

    async fn disconnect(&self) -> AcqResult<()> {
        Ok(())
    }

    async fn read_holding_registers(&self, address: u16, count: u16) -> AcqResult<Vec<u16>> {
        self.reads.lock().unwrap().push((address, count));
        let regs = self.holding.lock().unwrap();
        Ok((0..count)
            .map(|i| regs.get(&(address + i)).copied().unwrap_or(0))
            .collect())
    }

    async fn read_input_registers(&self, address: u16, count: u16) -> AcqResult<Vec<u16>> {
        let regs = self.input.lock().unwrap();
        Ok((0..count)
            .map(|i| regs.get(&(address + i)).copied().unwrap_or(0))
            .collect())
    }

    async fn read_coils(&self, address: u16, count: u16) -> AcqResult<Vec<bool>> {
        let coils = self.coils.lock().unwrap();
        Ok((0..count)
            .map(|i| coils.get(&(address + i)).copied().unwrap_or(false))
            .collect())
    }

    async fn write_registers(&self, address: u16, words: &[u16]) -> AcqResult<()> {
        let mut regs = self.holding.lock().unwrap();
        for (i, word) in words.iter().enumerate() {
            regs.insert(address + i as u16, *word);
        }
        Ok(())
    }

    async fn write_coil(&self, address: u16, value: bool) -> AcqResult<()> {
        self.coils.lock().unwrap().insert(address, value);
        Ok(())
    }
}

fn codec() -> RegisterCodec {
    RegisterCodec::new(ByteOrder::BigEndian)
}

#[tokio::test]
async fn test_read_float32() {
    let device = MemoryDevice::with_holding(&[(10, 0x41C8), (11, 0x0000)]);
    let client = RegisterClient::new(&device, codec());
    let value = client
        .read_value(&RegisterCommand::new(10, ValueType::Float32), 1)
        .await
        .unwrap();
    assert_eq!(value, TypedValue::Float(25.0));
    assert_eq!(device.reads.lock().unwrap().as_slice(), &[(10, 2)]);
}

#[tokio::test]
async fn test_read_array_of_int16() {
    let device = MemoryDevice::with_holding(&[(0, 1), (1, 0xFFFF), (2, 3)]);
    let client = RegisterClient::new(&device, codec());
    let value = client
        .read_value(&RegisterCommand::new(0, ValueType::Int16), 3)
        .await
        .unwrap();
    assert_eq!(
        value,
        TypedValue::List(vec![
            TypedValue::Int(1),
            TypedValue::Int(-1),
            TypedValue::Int(3)
        ])
    );
}

#[tokio::test]
async fn test_bit_write_preserves_word() {
    let device = MemoryDevice::with_holding(&[(5, 0xA55A)]);
    let client = RegisterClient::new(&device, codec());
    let command = RegisterCommand::new(5, "BIT0HIGH".parse().unwrap());

    let written = client
        .write_value(&command, &TypedValue::Bool(false))
        .await
        .unwrap();
    assert_eq!(written, TypedValue::Bool(false));
    assert_eq!(device.holding(5), 0xA45A);

    let read_back = client.read_value(&command, 1).await.unwrap();
    assert_eq!(read_back, TypedValue::Bool(false));
}

#[tokio::test]
async fn test_byte_write_preserves_other_byte() {
    let device = MemoryDevice::with_holding(&[(7, 0x1234)]);
    let client = RegisterClient::new(&device, codec());
    let command = RegisterCommand::new(7, ValueType::Uint8Low);
    client
        .write_value(&command, &TypedValue::Int(0xAB))
        .await
        .unwrap();
    assert_eq!(device.holding(7), 0x12AB);
}

#[tokio::test]
async fn test_write_returns_clamped_value() {
    let device = MemoryDevice::default();
    let client = RegisterClient::new(&device, codec());
    let command = RegisterCommand::new(1, ValueType::Uint16);
    let written = client
        .write_value(&command, &TypedValue::Float(70000.0))
        .await
        .unwrap();
    assert_eq!(written, TypedValue::UInt(65535));
    assert_eq!(device.holding(1), 0xFFFF);
}

#[tokio::test]
async fn test_coil_read_and_write() {
    let device = MemoryDevice::default();
    let client = RegisterClient::new(&device, codec());
    let command = RegisterCommand::new(3, ValueType::Coil).with_space(RegisterSpace::Coil);

    client
        .write_value(&command, &TypedValue::Int(1))
        .await
        .unwrap();
    assert_eq!(
        client.read_value(&command, 1).await.unwrap(),
        TypedValue::Bool(true)
    );
    assert_eq!(
        client.read_value(&command, 2).await.unwrap(),
        TypedValue::List(vec![TypedValue::Bool(true), TypedValue::Bool(false)])
    );
}

#[tokio::test]
async fn test_access_mode_is_enforced() {
    let device = MemoryDevice::default();
    let client = RegisterClient::new(&device, codec());

    let read_only = RegisterCommand::new(1, ValueType::Int16).with_access(Access::Read);
    let err = client
        .write_value(&read_only, &TypedValue::Int(1))
        .await
        .unwrap_err();
    assert!(matches!(err, AcqError::InvalidValue(_)));

    let input = RegisterCommand::new(1, ValueType::Int16).with_space(RegisterSpace::Input);
    assert!(client.write_value(&input, &TypedValue::Int(1)).await.is_err());
}

#[tokio::test]
async fn test_read_registers_in_batch_chunks() {
    let words: Vec<(u16, u16)> = (0..250).map(|i| (100 + i, i)).collect();
    let device = MemoryDevice::with_holding(&words);
    let client = RegisterClient::new(&device, codec());

    let dump = client
        .read_registers_in_batch(RegisterSpace::Holding, 100, 250, 100)
        .await
        .unwrap();
    assert_eq!(dump.len(), 250);
    assert_eq!(dump[249], 249);
    assert_eq!(
        device.reads.lock().unwrap().as_slice(),
        &[(100, 100), (200, 100), (300, 50)]
    );
}

#[tokio::test]
async fn test_string_write_pads_to_count() {
    let device = MemoryDevice::default();
    let client = RegisterClient::new(&device, codec());
    let command = RegisterCommand::new(20, ValueType::String).with_count(3);
    client
        .write_value(&command, &TypedValue::from("OK"))
        .await
        .unwrap();
    assert_eq!(device.holding(20), 0x4F4B);
    assert_eq!(device.holding(22), 0);
    assert_eq!(
        client.read_value(&command, 1).await.unwrap(),
        TypedValue::Text("OK".into())
    );
}

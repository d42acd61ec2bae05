//! Field bus device primitives
//!
//! The codec and the scheduler only ever talk to a device through this
//! trait. Concrete transports (Modbus TCP, serial, test doubles) implement
//! it; connection management beyond `connect`/`disconnect` stays inside
//! the implementation.

use std::sync::Arc;

use async_trait::async_trait;
use errors::AcqResult;

/// Raw read/write primitives of an address+type addressed field bus device
#[async_trait]
pub trait FieldDevice: Send + Sync {
    /// Device name for logs
    fn name(&self) -> &str;

    async fn connect(&self) -> AcqResult<()>;

    async fn disconnect(&self) -> AcqResult<()>;

    async fn read_holding_registers(&self, address: u16, count: u16) -> AcqResult<Vec<u16>>;

    async fn read_input_registers(&self, address: u16, count: u16) -> AcqResult<Vec<u16>>;

    async fn read_coils(&self, address: u16, count: u16) -> AcqResult<Vec<bool>>;

    async fn write_registers(&self, address: u16, words: &[u16]) -> AcqResult<()>;

    async fn write_coil(&self, address: u16, value: bool) -> AcqResult<()>;
}

/// Shared device handle
pub type DeviceHandle = Arc<dyn FieldDevice>;

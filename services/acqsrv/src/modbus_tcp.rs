//! Modbus TCP field device

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use edgelink_codec::FieldDevice;
use errors::{AcqError, AcqResult};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::{error::Elapsed, timeout};
use tokio_modbus::client::{self, Reader, Writer};
use tokio_modbus::Slave;
use tracing::{debug, info};

/// Connection settings of one Modbus TCP slave
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModbusTcpConfig {
    pub host: String,
    pub port: u16,
    pub slave_id: u8,
    pub timeout_ms: u64,
}

impl Default for ModbusTcpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 502,
            slave_id: 1,
            timeout_ms: 3000,
        }
    }
}

pub struct ModbusTcpDevice {
    name: String,
    config: ModbusTcpConfig,
    ctx: Mutex<Option<client::Context>>,
}

impl ModbusTcpDevice {
    pub fn new(name: impl Into<String>, config: ModbusTcpConfig) -> Self {
        Self {
            name: name.into(),
            config,
            ctx: Mutex::new(None),
        }
    }

    fn timeout(&self) -> Duration {
        Duration::from_millis(self.config.timeout_ms)
    }

    async fn resolve(&self) -> AcqResult<SocketAddr> {
        let target = (self.config.host.as_str(), self.config.port);
        tokio::net::lookup_host(target)
            .await?
            .next()
            .ok_or_else(|| {
                AcqError::transport(format!("{}: cannot resolve {}", self.name, self.config.host))
            })
    }

    /// Unwrap a timed request; I/O failures and timeouts drop the connection
    fn finish<T>(
        &self,
        ctx: &mut Option<client::Context>,
        op: &str,
        result: Result<tokio_modbus::Result<T>, Elapsed>,
    ) -> AcqResult<T> {
        match result {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(exception))) => Err(AcqError::transport(format!(
                "{}: {} rejected with exception {:?}",
                self.name, op, exception
            ))),
            Ok(Err(e)) => {
                *ctx = None;
                Err(AcqError::transport(format!("{}: {} failed: {}", self.name, op, e)))
            },
            Err(_) => {
                *ctx = None;
                Err(AcqError::transport(format!(
                    "{}: {} timed out after {} ms",
                    self.name, op, self.config.timeout_ms
                )))
            },
        }
    }
}

#[async_trait]
impl FieldDevice for ModbusTcpDevice {
    fn name(&self) -> &str {
        &self.name
    }

    async fn connect(&self) -> AcqResult<()> {
        let mut ctx = self.ctx.lock().await;
        if ctx.is_some() {
            return Ok(());
        }

        let addr = self.resolve().await?;
        debug!("{}: connecting to {}", self.name, addr);
        match timeout(
            self.timeout(),
            client::tcp::connect_slave(addr, Slave(self.config.slave_id)),
        )
        .await
        {
            Ok(Ok(connected)) => {
                *ctx = Some(connected);
                info!("{}: connected to {}", self.name, addr);
                Ok(())
            },
            Ok(Err(e)) => Err(AcqError::transport(format!(
                "{}: connect to {} failed: {}",
                self.name, addr, e
            ))),
            Err(_) => Err(AcqError::transport(format!(
                "{}: connect to {} timed out after {} ms",
                self.name, addr, self.config.timeout_ms
            ))),
        }
    }

    async fn disconnect(&self) -> AcqResult<()> {
        if self.ctx.lock().await.take().is_some() {
            debug!("{}: disconnected", self.name);
        }
        Ok(())
    }

    async fn read_holding_registers(&self, address: u16, count: u16) -> AcqResult<Vec<u16>> {
        let mut guard = self.ctx.lock().await;
        let ctx = guard.as_mut().ok_or(AcqError::NotConnected)?;
        let result = timeout(self.timeout(), ctx.read_holding_registers(address, count)).await;
        self.finish(&mut guard, "read holding registers", result)
    }

    async fn read_input_registers(&self, address: u16, count: u16) -> AcqResult<Vec<u16>> {
        let mut guard = self.ctx.lock().await;
        let ctx = guard.as_mut().ok_or(AcqError::NotConnected)?;
        let result = timeout(self.timeout(), ctx.read_input_registers(address, count)).await;
        self.finish(&mut guard, "read input registers", result)
    }

    async fn read_coils(&self, address: u16, count: u16) -> AcqResult<Vec<bool>> {
        let mut guard = self.ctx.lock().await;
        let ctx = guard.as_mut().ok_or(AcqError::NotConnected)?;
        let result = timeout(self.timeout(), ctx.read_coils(address, count)).await;
        let mut bits = self.finish(&mut guard, "read coils", result)?;
        // responses are padded to whole bytes
        bits.truncate(usize::from(count));
        Ok(bits)
    }

    async fn write_registers(&self, address: u16, words: &[u16]) -> AcqResult<()> {
        let mut guard = self.ctx.lock().await;
        let ctx = guard.as_mut().ok_or(AcqError::NotConnected)?;
        let result = timeout(self.timeout(), ctx.write_multiple_registers(address, words)).await;
        self.finish(&mut guard, "write registers", result)
    }

    async fn write_coil(&self, address: u16, value: bool) -> AcqResult<()> {
        let mut guard = self.ctx.lock().await;
        let ctx = guard.as_mut().ok_or(AcqError::NotConnected)?;
        let result = timeout(self.timeout(), ctx.write_single_coil(address, value)).await;
        self.finish(&mut guard, "write coil", result)
    }
}

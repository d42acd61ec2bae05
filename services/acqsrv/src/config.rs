//! Service configuration
//!
//! Loaded through `common::load_config` from defaults, a YAML/TOML/JSON file
//! and `ACQSRV_*` environment variables. Measurement descriptors stay raw
//! JSON values here; they are parsed one by one at startup so a malformed
//! entry only excludes itself.

use std::path::{Path, PathBuf};
use std::time::Duration;

use common::LogConfig;
use edgelink_codec::{ByteOrder, CommandTable, Endian, RegisterCodec};
use errors::{AcqError, AcqResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::modbus_tcp::ModbusTcpConfig;
use crate::scheduler::SchedulerSettings;

/// Environment prefix for overrides, e.g. `ACQSRV_DEVICE__HOST`
pub const ENV_PREFIX: &str = "ACQSRV";

/// Largest register count a single Modbus read may request
const MODBUS_MAX_READ: u16 = 125;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub slave_id: u8,
    pub timeout_ms: u64,
    /// Byte order inside a register word
    pub byte_order: Endian,
    /// Order of words inside multi-register values
    pub word_order: Endian,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        let tcp = ModbusTcpConfig::default();
        Self {
            name: "device".to_string(),
            host: tcp.host,
            port: tcp.port,
            slave_id: tcp.slave_id,
            timeout_ms: tcp.timeout_ms,
            byte_order: Endian::Big,
            word_order: Endian::Big,
        }
    }
}

impl DeviceConfig {
    pub fn tcp(&self) -> ModbusTcpConfig {
        ModbusTcpConfig {
            host: self.host.clone(),
            port: self.port,
            slave_id: self.slave_id,
            timeout_ms: self.timeout_ms,
        }
    }

    pub fn codec(&self) -> RegisterCodec {
        RegisterCodec::new(ByteOrder::from_endian(self.byte_order, self.word_order))
    }
}

/// Periods and switches of the two acquisition loops
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Seconds between runtime cycles
    pub sleep_interval: u64,
    /// Seconds between configuration cycles
    pub config_sleep_interval: u64,
    pub enabled: bool,
    pub config_enabled: bool,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            sleep_interval: 30,
            config_sleep_interval: 3600,
            enabled: true,
            config_enabled: true,
        }
    }
}

impl AcquisitionConfig {
    pub fn runtime_period(&self) -> Duration {
        Duration::from_secs(self.sleep_interval)
    }

    pub fn config_period(&self) -> Duration {
        Duration::from_secs(self.config_sleep_interval)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub read_only: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/acqsrv.db"),
            read_only: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcqConfig {
    pub machine_type: String,
    pub log: LogConfig,
    pub device: Option<DeviceConfig>,
    pub acquisition: AcquisitionConfig,
    pub scheduler: SchedulerSettings,
    pub database: Option<DatabaseConfig>,
    /// Named register commands of the device
    pub commands: CommandTable,
    /// Keys merged underneath every measurement descriptor
    pub defaults: Map<String, Value>,
    pub measurements: Vec<Value>,
    pub config_measurements: Vec<Value>,
}

impl Default for AcqConfig {
    fn default() -> Self {
        Self {
            machine_type: "UNKNOWN".to_string(),
            log: LogConfig {
                service_name: "acqsrv".to_string(),
                ..LogConfig::default()
            },
            device: None,
            acquisition: AcquisitionConfig::default(),
            scheduler: SchedulerSettings::default(),
            database: None,
            commands: CommandTable::new(),
            defaults: Map::new(),
            measurements: Vec::new(),
            config_measurements: Vec::new(),
        }
    }
}

impl AcqConfig {
    pub fn load(path: Option<&Path>) -> AcqResult<Self> {
        let config: Self = common::load_config(path, ENV_PREFIX)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AcqResult<()> {
        if self.machine_type.trim().is_empty() {
            return Err(AcqError::configuration("machine_type must not be empty"));
        }
        if self.acquisition.sleep_interval == 0 || self.acquisition.config_sleep_interval == 0 {
            return Err(AcqError::configuration("sleep intervals must be positive"));
        }
        let batch = self.scheduler.max_batch_size;
        if batch == 0 || batch > MODBUS_MAX_READ {
            return Err(AcqError::configuration(format!(
                "max_batch_size must be within 1..={}, got {}",
                MODBUS_MAX_READ, batch
            )));
        }
        if self.scheduler.interlock_depth == 0 {
            return Err(AcqError::configuration("interlock_depth must be positive"));
        }
        Ok(())
    }

    /// Codec for the configured device, big-endian when none is configured
    pub fn codec(&self) -> RegisterCodec {
        self.device
            .as_ref()
            .map(DeviceConfig::codec)
            .unwrap_or_default()
    }
}

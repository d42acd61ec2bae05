//! Outbound sample payloads
//!
//! Serialized as a JSON object with a fixed key order:
//! `{"<type-key>", "time", "machine_type", "value", "uom", "version", "module_type"}`.

use chrono::{DateTime, Utc};
use serde::ser::{Serialize, SerializeStruct, Serializer};

use super::value::SampleValue;

/// Second resolution, no zone suffix
pub const PAYLOAD_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    /// `sensor_type` or `configuration_type`
    pub type_key: &'static str,
    pub name: String,
    pub time: DateTime<Utc>,
    pub machine_type: String,
    /// Already scaled
    pub value: SampleValue,
    pub uom: Option<String>,
    pub version: i64,
    pub module_type: Option<String>,
}

impl Payload {
    pub fn formatted_time(&self) -> String {
        self.time.format(PAYLOAD_TIME_FORMAT).to_string()
    }
}

impl Serialize for Payload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Payload", 7)?;
        state.serialize_field(self.type_key, &self.name)?;
        state.serialize_field("time", &self.formatted_time())?;
        state.serialize_field("machine_type", &self.machine_type)?;
        state.serialize_field("value", &self.value)?;
        state.serialize_field("uom", &self.uom)?;
        state.serialize_field("version", &self.version)?;
        state.serialize_field("module_type", &self.module_type)?;
        state.end()
    }
}

//! Declarative measurement descriptors
//!
//! Descriptors use the device configuration vocabulary (`SENSOR_TYPE`,
//! `INTERVAL`, `SKIP_SAME_VALUE`, `REGISTER_NUMBER`, ...). Shared keys from
//! the configuration's `defaults` map are merged underneath every descriptor
//! before it is parsed. The kind comes from `PROTOCOL` when present and is
//! otherwise inferred from which kind-specific keys are set.

use edgelink_calc::Formula;
use edgelink_codec::{Access, CommandTable, RegisterCommand, RegisterSpace, ValueType};
use errors::{AcqError, AcqResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{error, info};

use super::{BoundedCheck, Measurement, MeasurementKind, Operation, Policy};

/// `OUTPUT` accepts a single destination or a list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Outputs {
    One(String),
    Many(Vec<String>),
}

impl Default for Outputs {
    fn default() -> Self {
        Self::Many(vec!["output1".to_string()])
    }
}

impl Outputs {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(name) => vec![name],
            Self::Many(names) => names,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", default)]
pub struct MeasurementDescriptor {
    #[serde(alias = "NAME")]
    pub sensor_type: String,
    pub machine_type: Option<String>,
    pub protocol: Option<String>,

    // Policy
    pub interval: f64,
    pub uom: Option<String>,
    pub skip_same_value: bool,
    pub skip_max_time: f64,
    pub skip_threshold: f64,
    pub skip_first: bool,
    pub scale: f64,
    pub offset: f64,
    pub not_send: bool,
    pub operation: Operation,
    /// Value sent by WRITE operations
    pub value: Option<f64>,
    pub version: Option<i64>,
    pub module_type: Option<String>,
    pub pre_write_command: Option<String>,
    pub post_write_command: Option<String>,
    pub enabled: bool,
    pub target_bit: Option<u32>,
    pub target_bitmask_name: Option<String>,
    pub output: Outputs,

    // Raw command
    pub command: Option<String>,
    pub array_count: u16,

    // Field bus
    pub register_number: Option<u16>,
    pub register_type: Option<RegisterSpace>,
    pub value_type: Option<ValueType>,
    pub access: Option<Access>,
    pub count: Option<u16>,

    // Formula
    pub function: Option<String>,

    // Query
    pub query: Option<String>,

    // Bounded check
    pub variable_2_check: Option<String>,
    pub output_variable: Option<String>,
    pub upper_bound: f64,
    pub lower_bound: f64,
    pub upper_bound_variable: Option<String>,
    pub upper_value_default: f64,
    pub lower_bound_variable: Option<String>,
    pub lower_value_default: f64,
    pub between_bounds_variable: Option<String>,
    pub between_value_default: f64,
    pub default_value: f64,
}

impl Default for MeasurementDescriptor {
    fn default() -> Self {
        let policy = Policy::default();
        Self {
            sensor_type: String::new(),
            machine_type: None,
            protocol: None,
            interval: policy.interval,
            uom: None,
            skip_same_value: policy.skip_same_value,
            skip_max_time: policy.skip_max_time,
            skip_threshold: policy.skip_threshold,
            skip_first: policy.skip_first,
            scale: policy.scale,
            offset: policy.offset,
            not_send: policy.not_send,
            operation: policy.operation,
            value: None,
            version: None,
            module_type: None,
            pre_write_command: None,
            post_write_command: None,
            enabled: policy.enabled,
            target_bit: None,
            target_bitmask_name: None,
            output: Outputs::default(),
            command: None,
            array_count: 1,
            register_number: None,
            register_type: None,
            value_type: None,
            access: None,
            count: None,
            function: None,
            query: None,
            variable_2_check: None,
            output_variable: None,
            upper_bound: 1000.0,
            lower_bound: 0.0,
            upper_bound_variable: None,
            upper_value_default: 1000.0,
            lower_bound_variable: None,
            lower_value_default: 0.0,
            between_bounds_variable: None,
            between_value_default: 0.0,
            default_value: 0.0,
        }
    }
}

/// Overlay `descriptor` on top of the shared `defaults`
pub fn merge_defaults(defaults: &Map<String, Value>, descriptor: &Value) -> AcqResult<Value> {
    let Value::Object(fields) = descriptor else {
        return Err(AcqError::configuration(format!(
            "measurement descriptor must be an object, got {}",
            descriptor
        )));
    };
    let mut merged = defaults.clone();
    for (key, value) in fields {
        merged.insert(key.clone(), value.clone());
    }
    Ok(Value::Object(merged))
}

impl MeasurementDescriptor {
    pub fn from_value(defaults: &Map<String, Value>, descriptor: &Value) -> AcqResult<Self> {
        let merged = merge_defaults(defaults, descriptor)?;
        let parsed: Self = serde_json::from_value(merged)?;
        if parsed.sensor_type.trim().is_empty() {
            return Err(AcqError::configuration("SENSOR_TYPE is required"));
        }
        Ok(parsed)
    }

    fn policy(&self) -> Policy {
        Policy {
            interval: self.interval,
            uom: self.uom.clone(),
            skip_same_value: self.skip_same_value,
            skip_max_time: self.skip_max_time,
            skip_threshold: self.skip_threshold,
            skip_first: self.skip_first,
            scale: self.scale,
            offset: self.offset,
            not_send: self.not_send,
            operation: self.operation,
            write_value: self.value,
            version: self.version,
            module_type: self.module_type.clone(),
            pre_write_command: self.pre_write_command.clone(),
            post_write_command: self.post_write_command.clone(),
            enabled: self.enabled,
            target_bit: self.target_bit,
            target_bitmask_name: self.target_bitmask_name.clone(),
            outputs: self.output.clone().into_vec(),
        }
    }

    fn require<'a>(&self, field: &'a Option<String>, key: &str) -> AcqResult<&'a str> {
        field.as_deref().ok_or_else(|| {
            AcqError::configuration(format!("{}: {} is required", self.sensor_type, key))
        })
    }

    fn kind(&self) -> AcqResult<MeasurementKind> {
        let protocol = match self.protocol.as_deref() {
            Some(protocol) => protocol.trim().to_uppercase(),
            None if self.function.is_some() => "FUNCTION".into(),
            None if self.query.is_some() => "QUERY".into(),
            None if self.variable_2_check.is_some() => "CHECK".into(),
            None if self.register_number.is_some() => "MODBUS".into(),
            None if self.command.is_some() => "RAW".into(),
            None => {
                return Err(AcqError::configuration(format!(
                    "{}: cannot infer measurement kind",
                    self.sensor_type
                )))
            },
        };

        let kind = match protocol.as_str() {
            "MODBUS" | "FIELDBUS" => {
                let address = self.register_number.ok_or_else(|| {
                    AcqError::configuration(format!(
                        "{}: REGISTER_NUMBER is required",
                        self.sensor_type
                    ))
                })?;
                let mut register =
                    RegisterCommand::new(address, self.value_type.unwrap_or(ValueType::Uint16))
                        .with_space(self.register_type.unwrap_or_default())
                        .with_access(self.access.unwrap_or_default());
                if let Some(count) = self.count {
                    register = register.with_count(count);
                }
                if let Some(uom) = &self.uom {
                    register = register.with_uom(uom.clone());
                }
                MeasurementKind::FieldBus {
                    register,
                    array_count: self.array_count.max(1),
                }
            },
            "FUNCTION" | "FORMULA" => MeasurementKind::Formula {
                formula: Formula::parse(self.require(&self.function, "FUNCTION")?)?,
            },
            "QUERY" => MeasurementKind::Query {
                query: self.require(&self.query, "QUERY")?.to_string(),
            },
            "CHECK" => MeasurementKind::BoundedCheck(BoundedCheck {
                variable_2_check: self
                    .require(&self.variable_2_check, "VARIABLE_2_CHECK")?
                    .to_string(),
                output_variable: self.require(&self.output_variable, "OUTPUT_VARIABLE")?.to_string(),
                upper_bound: self.upper_bound,
                lower_bound: self.lower_bound,
                upper_bound_variable: self.upper_bound_variable.clone(),
                upper_value_default: self.upper_value_default,
                lower_bound_variable: self.lower_bound_variable.clone(),
                lower_value_default: self.lower_value_default,
                between_bounds_variable: self.between_bounds_variable.clone(),
                between_value_default: self.between_value_default,
                default_value: self.default_value,
            }),
            "BITMASK" => MeasurementKind::Bitmask,
            "RAW" => MeasurementKind::Raw {
                command: self.require(&self.command, "COMMAND")?.to_string(),
                array_count: self.array_count.max(1),
            },
            other => {
                return Err(AcqError::configuration(format!(
                    "{}: unknown PROTOCOL '{}'",
                    self.sensor_type, other
                )))
            },
        };
        Ok(kind)
    }

    /// Build the runtime measurement; raw commands must exist in `commands`
    pub fn build(&self, machine_type: &str, commands: &CommandTable) -> AcqResult<Measurement> {
        let kind = self.kind()?;
        if let MeasurementKind::Raw { command, .. } = &kind {
            commands.get(command)?;
        }
        let machine_type = self.machine_type.as_deref().unwrap_or(machine_type);
        Ok(Measurement::new(
            self.sensor_type.clone(),
            machine_type,
            kind,
            self.policy(),
        ))
    }
}

/// Build every valid descriptor; malformed ones are logged and excluded
pub fn load_measurements(
    descriptors: &[Value],
    defaults: &Map<String, Value>,
    machine_type: &str,
    commands: &CommandTable,
    is_config: bool,
) -> Vec<Measurement> {
    let mut measurements = Vec::with_capacity(descriptors.len());
    for (index, raw) in descriptors.iter().enumerate() {
        let built = MeasurementDescriptor::from_value(defaults, raw)
            .and_then(|d| d.build(machine_type, commands));
        match built {
            Ok(m) if is_config => measurements.push(m.into_config()),
            Ok(m) => measurements.push(m),
            Err(e) => error!("Measurement #{} excluded: {}", index, e),
        }
    }
    info!(
        "Loaded {}/{} {} measurements",
        measurements.len(),
        descriptors.len(),
        if is_config { "configuration" } else { "runtime" }
    );
    measurements
}

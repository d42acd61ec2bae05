//! Measurements and the debounce engine
//!
//! A [`Measurement`] is one monitored quantity. The scheduler owns it for
//! the process lifetime and feeds it one sample per cycle through
//! [`Measurement::can_send`]; accepted samples leave as [`Payload`]s built by
//! [`Measurement::materialize_payloads`].
//!
//! Debounce state keeps three (time, value) pairs:
//! - current: the last accepted sample
//! - old: the sample current replaced
//! - latest: the most recent rejected sample, emitted ahead of the next
//!   value jump so the level right before a transition is never lost

pub mod descriptor;
pub mod payload;
pub mod value;

use chrono::{DateTime, Utc};
use edgelink_calc::Formula;
use edgelink_codec::RegisterCommand;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

pub use descriptor::MeasurementDescriptor;
pub use payload::{Payload, PAYLOAD_TIME_FORMAT};
pub use value::SampleValue;

/// Default schema version of runtime measurements
pub const RUNTIME_VERSION: i64 = 0;
/// Default schema version of configuration measurements
pub const CONFIG_VERSION: i64 = 1000;

// ============================================================================
// Kinds and policy
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    #[default]
    Read,
    Write,
    /// Batched raw range read
    Dump,
}

/// Threshold check that writes its verdict to an output register
#[derive(Debug, Clone, PartialEq)]
pub struct BoundedCheck {
    pub variable_2_check: String,
    pub output_variable: String,
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

#[derive(Debug, Clone)]
pub enum MeasurementKind {
    /// Named entry of the device command table
    Raw { command: String, array_count: u16 },
    /// Register described inline
    FieldBus {
        register: RegisterCommand,
        array_count: u16,
    },
    Formula { formula: Formula },
    BoundedCheck(BoundedCheck),
    /// OR-fold of measurements targeting this one by name
    Bitmask,
    Query { query: String },
}

impl MeasurementKind {
    /// Execution bucket; lower buckets run first within a cycle
    pub fn priority(&self) -> u8 {
        match self {
            Self::Raw { .. } | Self::FieldBus { .. } => 0,
            Self::Query { .. } => 1,
            Self::Formula { .. } => 2,
            Self::BoundedCheck(_) => 3,
            Self::Bitmask => 4,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Raw { .. } => "raw",
            Self::FieldBus { .. } => "modbus",
            Self::Formula { .. } => "function",
            Self::BoundedCheck(_) => "check",
            Self::Bitmask => "bitmask",
            Self::Query { .. } => "query",
        }
    }
}

/// Settings fixed at construction
#[derive(Debug, Clone, PartialEq)]
pub struct Policy {
    /// Seconds between executions
    pub interval: f64,
    pub uom: Option<String>,
    pub skip_same_value: bool,
    /// Seconds of silence after which an unchanged value is sent again
    pub skip_max_time: f64,
    pub skip_threshold: f64,
    pub skip_first: bool,
    pub scale: f64,
    pub offset: f64,
    pub not_send: bool,
    pub operation: Operation,
    pub write_value: Option<f64>,
    pub version: Option<i64>,
    pub module_type: Option<String>,
    pub pre_write_command: Option<String>,
    pub post_write_command: Option<String>,
    pub enabled: bool,
    pub target_bit: Option<u32>,
    pub target_bitmask_name: Option<String>,
    pub outputs: Vec<String>,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            interval: 3600.0,
            uom: None,
            skip_same_value: true,
            skip_max_time: 900.0,
            skip_threshold: 1e-6,
            skip_first: false,
            scale: 1.0,
            offset: 0.0,
            not_send: false,
            operation: Operation::Read,
            write_value: None,
            version: None,
            module_type: None,
            pre_write_command: None,
            post_write_command: None,
            enabled: true,
            target_bit: None,
            target_bitmask_name: None,
            outputs: vec!["output1".to_string()],
        }
    }
}

// ============================================================================
// Runtime state
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct TimedValue {
    pub time: DateTime<Utc>,
    pub value: SampleValue,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleState {
    pub time: Option<DateTime<Utc>>,
    pub value: Option<SampleValue>,
    pub uom: Option<String>,
    pub old_time: Option<DateTime<Utc>>,
    pub old_value: Option<SampleValue>,
    /// Last rejected sample, at most one
    pub latest: Option<TimedValue>,
    pub already_skipped: bool,
    /// Interval gating reference
    pub last_run: Option<DateTime<Utc>>,
    /// Write value set by a bounded check
    pub pending_write: Option<f64>,
}

/// One monitored quantity
#[derive(Debug, Clone)]
pub struct Measurement {
    pub sensor_type: String,
    pub machine_type: String,
    /// Configuration measurements report under `configuration_type`
    pub is_config: bool,
    pub policy: Policy,
    pub kind: MeasurementKind,
    pub state: SampleState,
}

fn epoch_seconds(time: DateTime<Utc>) -> f64 {
    time.timestamp_millis() as f64 / 1000.0
}

fn seconds_between(later: DateTime<Utc>, earlier: DateTime<Utc>) -> f64 {
    (later - earlier).num_milliseconds() as f64 / 1000.0
}

impl Measurement {
    pub fn new(
        sensor_type: impl Into<String>,
        machine_type: impl Into<String>,
        kind: MeasurementKind,
        policy: Policy,
    ) -> Self {
        let state = SampleState {
            uom: policy.uom.clone(),
            ..SampleState::default()
        };
        Self {
            sensor_type: sensor_type.into(),
            machine_type: machine_type.into(),
            is_config: false,
            policy,
            kind,
            state,
        }
    }

    pub fn into_config(mut self) -> Self {
        self.is_config = true;
        self
    }

    pub fn type_key(&self) -> &'static str {
        if self.is_config {
            "configuration_type"
        } else {
            "sensor_type"
        }
    }

    pub fn version(&self) -> i64 {
        self.policy.version.unwrap_or(if self.is_config {
            CONFIG_VERSION
        } else {
            RUNTIME_VERSION
        })
    }

    /// Value a WRITE operation sends: a pending check verdict wins
    pub fn write_target(&self) -> Option<f64> {
        self.state.pending_write.or(self.policy.write_value)
    }

    /// Interval gate: never run, or at least `interval` seconds since the last run
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.state.last_run {
            None => true,
            Some(last) => seconds_between(now, last).abs() >= self.policy.interval,
        }
    }

    /// First-sample skip: a placeholder with time but no value
    pub fn needs_first_skip(&self) -> bool {
        self.policy.skip_first && !self.state.already_skipped
    }

    pub fn mark_skipped(&mut self, now: DateTime<Utc>) {
        self.state.already_skipped = true;
        self.state.time = Some(now);
        self.state.value = None;
        self.state.last_run = Some(now);
        debug!("{}: first sample skipped", self.sensor_type);
    }

    // ========================================================================
    // Debounce
    // ========================================================================

    /// Feed a new sample; returns whether it must be emitted
    pub fn can_send(
        &mut self,
        new_time: DateTime<Utc>,
        new_value: SampleValue,
        uom: Option<String>,
    ) -> bool {
        if !self.policy.skip_same_value {
            self.accept(new_time, new_value, uom, false);
            return true;
        }

        let value_changed = self
            .state
            .value
            .as_ref()
            .is_some_and(|current| new_value.distance(current) > self.policy.skip_threshold);
        let timed_out = self
            .state
            .time
            .is_some_and(|t| seconds_between(new_time, t) > self.policy.skip_max_time);

        if self.state.value.is_none() || self.state.time.is_none() || value_changed || timed_out {
            trace!(
                "{}: accept {} (changed={}, timed_out={})",
                self.sensor_type,
                new_value,
                value_changed,
                timed_out
            );
            self.accept(new_time, new_value, uom, value_changed);
            true
        } else {
            trace!("{}: buffer {}", self.sensor_type, new_value);
            self.state.latest = Some(TimedValue {
                time: new_time,
                value: new_value,
            });
            false
        }
    }

    fn accept(
        &mut self,
        time: DateTime<Utc>,
        value: SampleValue,
        uom: Option<String>,
        value_jump: bool,
    ) {
        let state = &mut self.state;
        state.old_time = state.time.take();
        state.old_value = state.value.take();
        state.time = Some(time);
        state.value = Some(value);
        if uom.is_some() {
            state.uom = uom;
        }
        if !value_jump {
            state.latest = None;
        }
    }

    /// Build the payloads for an accepted sample
    ///
    /// Unless `current_only`, a buffered latest sample that differs from
    /// current in both time and value is emitted first and then cleared.
    /// `current_only` never touches the buffer.
    pub fn materialize_payloads(&mut self, current_only: bool) -> Vec<Payload> {
        if self.policy.not_send {
            return Vec::new();
        }

        let mut payloads = Vec::with_capacity(2);
        if self.policy.skip_same_value && !current_only {
            let state = &self.state;
            let pre_jump = state
                .latest
                .as_ref()
                .filter(|latest| {
                    latest.value.is_emittable()
                        && state.time != Some(latest.time)
                        && state.value.as_ref() != Some(&latest.value)
                })
                .cloned();
            if let Some(latest) = pre_jump {
                debug!("{}: emitting pre-jump sample", self.sensor_type);
                payloads.push(self.payload(latest.time, &latest.value));
                self.state.latest = None;
            }
        }

        if let (Some(time), Some(value)) = (self.state.time, self.state.value.as_ref()) {
            if value.is_emittable() {
                payloads.push(self.payload(time, value));
            }
        }
        payloads
    }

    fn payload(&self, time: DateTime<Utc>, value: &SampleValue) -> Payload {
        Payload {
            type_key: self.type_key(),
            name: self.sensor_type.clone(),
            time,
            machine_type: self.machine_type.clone(),
            value: value.scaled(self.policy.scale, self.policy.offset),
            uom: self.state.uom.clone(),
            version: self.version(),
            module_type: self.policy.module_type.clone(),
        }
    }

    // ========================================================================
    // Formula properties
    // ========================================================================

    /// Numeric attribute for `$name.property`; `None` property means the value
    pub fn property(&self, property: Option<&str>) -> Option<f64> {
        let state = &self.state;
        match property.unwrap_or("value") {
            "value" => state.value.as_ref().and_then(SampleValue::as_scalar),
            "time" => state.time.map(epoch_seconds),
            "old_value" => state.old_value.as_ref().and_then(SampleValue::as_scalar),
            "old_time" => state.old_time.map(epoch_seconds),
            "latest_value" => state.latest.as_ref().and_then(|l| l.value.as_scalar()),
            "latest_time" => state.latest.as_ref().map(|l| epoch_seconds(l.time)),
            "value_processed" => state
                .value
                .as_ref()
                .and_then(|v| v.scaled(self.policy.scale, self.policy.offset).as_scalar()),
            "scale" => Some(self.policy.scale),
            "offset" => Some(self.policy.offset),
            "interval" => Some(self.policy.interval),
            "write_value" => self.write_target(),
            "skip_threshold" => Some(self.policy.skip_threshold),
            _ => None,
        }
    }
}

//! Per-kind execution of a single measurement

use common::retry_async;
use edgelink_calc::VariableSource;
use edgelink_codec::{FieldDevice, RegisterClient, RegisterCommand, TypedValue};
use errors::{AcqError, AcqResult};
use futures::future::{BoxFuture, FutureExt};
use tracing::{debug, trace};

use super::Scheduler;
use crate::measurement::{BoundedCheck, Measurement, MeasurementKind, Operation, SampleValue};

/// What one execution produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Execution {
    pub value: Option<SampleValue>,
    /// Unit reported by the register command, overriding the measurement's
    pub uom: Option<String>,
    /// Check verdict to store as the named companion's write value
    pub pending_write: Option<(String, f64)>,
}

impl Execution {
    fn value(value: Option<SampleValue>) -> Self {
        Self {
            value,
            ..Self::default()
        }
    }
}

/// Read-only view of the cycle a measurement executes in
pub(super) struct CycleEnv<'a> {
    pub cycle: &'a [Measurement],
    pub reference: &'a [Measurement],
    pub device: Option<&'a dyn FieldDevice>,
}

impl<'a> CycleEnv<'a> {
    /// Companion lookup: cycle set first, then the reference set
    fn find(&self, name: &str) -> Option<&'a Measurement> {
        self.cycle
            .iter()
            .chain(self.reference)
            .find(|m| m.sensor_type == name)
    }

    fn device(&self) -> AcqResult<&'a dyn FieldDevice> {
        self.device.ok_or(AcqError::NotConnected)
    }
}

/// `$name` resolves against the measurements of the running cycle
struct CycleVariables<'e, 'a>(&'e CycleEnv<'a>);

impl VariableSource for CycleVariables<'_, '_> {
    fn resolve(&self, name: &str, property: Option<&str>) -> Option<f64> {
        self.0.cycle.iter().find(|m| m.sensor_type == name)?.property(property)
    }
}

impl Scheduler {
    pub(super) fn execute<'a>(
        &'a self,
        measurement: &'a Measurement,
        env: &'a CycleEnv<'a>,
        depth: usize,
    ) -> BoxFuture<'a, AcqResult<Execution>> {
        async move {
            trace!(
                "{}: execute {} ({})",
                self.name,
                measurement.sensor_type,
                measurement.kind.name()
            );
            match &measurement.kind {
                MeasurementKind::Raw {
                    command,
                    array_count,
                } => {
                    let register = self.commands.get(command)?;
                    let mut execution = self
                        .register_op(measurement, register, *array_count, env, depth)
                        .await?;
                    execution.uom = register.uom.clone();
                    Ok(execution)
                },
                MeasurementKind::FieldBus {
                    register,
                    array_count,
                } => {
                    self.register_op(measurement, register, *array_count, env, depth)
                        .await
                },
                MeasurementKind::Formula { formula } => {
                    let value = formula.evaluate(&CycleVariables(env))?;
                    Ok(Execution::value(value.map(SampleValue::Scalar)))
                },
                MeasurementKind::BoundedCheck(check) => self.check(check, env, depth).await,
                MeasurementKind::Bitmask => Ok(Execution::value(
                    fold_bitmask(&measurement.sensor_type, env.cycle).map(SampleValue::Scalar),
                )),
                MeasurementKind::Query { query } => {
                    if query.trim().is_empty() {
                        return Ok(Execution::default());
                    }
                    let executor = self.query.as_ref().ok_or_else(|| {
                        AcqError::configuration("query measurement without a database")
                    })?;
                    let value = executor.execute_scalar(query).await?;
                    Ok(Execution::value(value.map(SampleValue::Scalar)))
                },
            }
        }
        .boxed()
    }

    fn client<'d>(&self, env: &CycleEnv<'d>) -> AcqResult<RegisterClient<'d>> {
        Ok(RegisterClient::new(env.device()?, self.codec))
    }

    async fn register_op(
        &self,
        measurement: &Measurement,
        register: &RegisterCommand,
        array_count: u16,
        env: &CycleEnv<'_>,
        depth: usize,
    ) -> AcqResult<Execution> {
        let client = self.client(env)?;
        let label = format!("{}: {}", self.name, measurement.sensor_type);
        let value = match measurement.policy.operation {
            Operation::Read => {
                let client = &client;
                let raw = retry_async(self.settings.io_retry, &label, || {
                    client.read_value(register, array_count)
                })
                .await?;
                SampleValue::try_from(raw)?
            },
            Operation::Dump => {
                let client = &client;
                let count = register.read_count(array_count);
                let max_batch = self.settings.max_batch_size;
                let words = retry_async(self.settings.io_retry, &label, || {
                    client.read_registers_in_batch(register.space, register.address, count, max_batch)
                })
                .await?;
                SampleValue::List(words.into_iter().map(f64::from).collect())
            },
            Operation::Write => {
                let target = measurement.write_target().ok_or_else(|| {
                    AcqError::invalid_value(format!(
                        "{}: WRITE without VALUE",
                        measurement.sensor_type
                    ))
                })?;
                self.interlocked_write(measurement, register, target, env, depth)
                    .await?
            },
        };
        Ok(Execution::value(Some(value)))
    }

    /// Write `value`, bracketed by the measurement's pre/post-write companions
    async fn interlocked_write(
        &self,
        measurement: &Measurement,
        register: &RegisterCommand,
        value: f64,
        env: &CycleEnv<'_>,
        depth: usize,
    ) -> AcqResult<SampleValue> {
        if let Some(pre) = &measurement.policy.pre_write_command {
            self.run_companion(pre, env, depth).await?;
        }

        let client = self.client(env)?;
        let client = &client;
        let label = format!("{}: {} write", self.name, measurement.sensor_type);
        let typed = TypedValue::Float(value);
        let written = retry_async(self.settings.io_retry, &label, || {
            client.write_value(register, &typed)
        })
        .await?;
        debug!(
            "{}: {} wrote {} (requested {})",
            self.name, measurement.sensor_type, written, value
        );

        if let Some(post) = &measurement.policy.post_write_command {
            self.run_companion(post, env, depth).await?;
        }
        SampleValue::try_from(written)
    }

    async fn run_companion(&self, name: &str, env: &CycleEnv<'_>, depth: usize) -> AcqResult<()> {
        if depth >= self.settings.interlock_depth {
            return Err(AcqError::configuration(format!(
                "interlock chain deeper than {} at {}",
                self.settings.interlock_depth, name
            )));
        }
        let companion = env.find(name).ok_or_else(|| {
            AcqError::configuration(format!("interlock companion {} not found", name))
        })?;
        self.execute(companion, env, depth + 1).await?;
        Ok(())
    }

    /// Register of a check's output companion
    fn output_register<'m>(&'m self, output: &'m Measurement) -> AcqResult<&'m RegisterCommand> {
        match &output.kind {
            MeasurementKind::Raw { command, .. } => self.commands.get(command),
            MeasurementKind::FieldBus { register, .. } => Ok(register),
            other => Err(AcqError::configuration(format!(
                "check output {} is a {} measurement, not a register",
                output.sensor_type,
                other.name()
            ))),
        }
    }

    async fn check(
        &self,
        check: &BoundedCheck,
        env: &CycleEnv<'_>,
        depth: usize,
    ) -> AcqResult<Execution> {
        let checked = env
            .find(&check.variable_2_check)
            .and_then(|m| m.property(None));
        let output = env.find(&check.output_variable);

        let (Some(reading), Some(output)) = (checked, output) else {
            debug!(
                "{}: check on {} falls back to default {}",
                self.name, check.variable_2_check, check.default_value
            );
            return Ok(Execution::value(Some(SampleValue::Scalar(check.default_value))));
        };

        let bound_value = |variable: &Option<String>, default: f64| {
            variable
                .as_deref()
                .and_then(|name| env.find(name))
                .and_then(|m| m.property(None))
                .unwrap_or(default)
        };
        let verdict = if reading > check.upper_bound {
            bound_value(&check.upper_bound_variable, check.upper_value_default)
        } else if reading < check.lower_bound {
            bound_value(&check.lower_bound_variable, check.lower_value_default)
        } else {
            bound_value(&check.between_bounds_variable, check.between_value_default)
        };
        debug!(
            "{}: {}={} -> {} <- {}",
            self.name, check.variable_2_check, reading, output.sensor_type, verdict
        );

        let register = self.output_register(output)?;
        self.interlocked_write(output, register, verdict, env, depth)
            .await?;
        Ok(Execution {
            value: Some(SampleValue::Scalar(verdict)),
            uom: None,
            pending_write: Some((output.sensor_type.clone(), verdict)),
        })
    }
}

/// OR-fold of every measurement targeting `name` with a bit position
///
/// Lists set one bit per element starting at the target bit, non-negative
/// integral scalars are shifted in whole, other scalars set a single bit.
/// Returns `None` while no contributor holds a value.
pub(crate) fn fold_bitmask(name: &str, candidates: &[Measurement]) -> Option<f64> {
    let mut mask: u64 = 0;
    let mut contributed = false;
    for m in candidates {
        if m.policy.target_bitmask_name.as_deref() != Some(name) {
            continue;
        }
        let (Some(bit), Some(value)) = (m.policy.target_bit, m.state.value.as_ref()) else {
            continue;
        };
        match value {
            SampleValue::List(items) => {
                for (i, v) in items.iter().enumerate() {
                    let position = u32::try_from(i).ok().and_then(|i| bit.checked_add(i));
                    if v.round() != 0.0 {
                        mask |= position.and_then(|p| 1u64.checked_shl(p)).unwrap_or(0);
                    }
                }
            },
            SampleValue::Scalar(v) if *v >= 0.0 && v.fract() == 0.0 && *v <= u64::MAX as f64 => {
                mask |= (*v as u64).checked_shl(bit).unwrap_or(0);
            },
            SampleValue::Scalar(v) => {
                if v.round() != 0.0 {
                    mask |= 1u64.checked_shl(bit).unwrap_or(0);
                }
            },
            SampleValue::Text(_) => continue,
        }
        contributed = true;
    }
    contributed.then_some(mask as f64)
}

//! Acquisition scheduler
//!
//! One cycle connects the device, executes every due measurement in kind
//! priority order, feeds the samples through the debounce gate and always
//! disconnects afterwards. Errors never leave a cycle: each measurement
//! fails on its own and simply produces no value.

mod acquisition_loop;
mod dispatch;
mod execute;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::{retry_async, RetryPolicy};
use edgelink_codec::{CommandTable, DeviceHandle, RegisterCodec, DEFAULT_MAX_BATCH_SIZE};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::measurement::Measurement;
use crate::query::QueryExecutor;

pub use acquisition_loop::{AcquisitionLoop, DISABLED_BACKOFF};
pub use dispatch::group_by_destination;

/// Tunables shared by every cycle of a scheduler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    /// Maximum nesting of pre/post-write companions
    pub interlock_depth: usize,
    /// Registers per request for DUMP reads
    pub max_batch_size: u16,
    pub io_retry: RetryPolicy,
    pub connect_retry: RetryPolicy,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            interlock_depth: 4,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            io_retry: RetryPolicy::IO,
            connect_retry: RetryPolicy::CONNECT,
        }
    }
}

/// Result of one cycle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleOutcome {
    /// Indices of measurements whose sample passed the debounce gate
    pub accepted: Vec<usize>,
    pub failed: usize,
    pub connected: bool,
}

/// Executes measurements against one device
#[derive(Clone)]
pub struct Scheduler {
    name: String,
    device: Option<DeviceHandle>,
    codec: RegisterCodec,
    commands: Arc<CommandTable>,
    query: Option<Arc<dyn QueryExecutor>>,
    settings: SchedulerSettings,
}

impl Scheduler {
    pub fn new(name: impl Into<String>, codec: RegisterCodec) -> Self {
        Self {
            name: name.into(),
            device: None,
            codec,
            commands: Arc::new(CommandTable::new()),
            query: None,
            settings: SchedulerSettings::default(),
        }
    }

    pub fn with_device(mut self, device: DeviceHandle) -> Self {
        self.device = Some(device);
        self
    }

    pub fn with_commands(mut self, commands: Arc<CommandTable>) -> Self {
        self.commands = commands;
        self
    }

    pub fn with_query_executor(mut self, query: Arc<dyn QueryExecutor>) -> Self {
        self.query = Some(query);
        self
    }

    pub fn with_settings(mut self, settings: SchedulerSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn commands(&self) -> &CommandTable {
        &self.commands
    }

    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    async fn connect(&self) -> bool {
        let Some(device) = &self.device else {
            debug!("{}: no device configured", self.name);
            return false;
        };
        let label = format!("{}: connect {}", self.name, device.name());
        match retry_async(self.settings.connect_retry, &label, || device.connect()).await {
            Ok(()) => true,
            Err(e) => {
                error!(
                    "{}: CRITICAL: device {} unreachable, continuing without it: {}",
                    self.name,
                    device.name(),
                    e
                );
                false
            },
        }
    }

    async fn disconnect(&self) {
        let Some(device) = &self.device else {
            return;
        };
        let label = format!("{}: disconnect {}", self.name, device.name());
        if let Err(e) = retry_async(self.settings.io_retry, &label, || device.disconnect()).await {
            warn!("{}: disconnect failed: {}", self.name, e);
        }
    }

    /// Run one acquisition cycle over `measurements`
    ///
    /// `reference` is consulted for pre/post-write companions that are not
    /// part of the cycle set. Its entries are never executed directly.
    pub async fn run_cycle(
        &self,
        measurements: &mut [Measurement],
        reference: &[Measurement],
        now: DateTime<Utc>,
    ) -> CycleOutcome {
        let connected = self.connect().await;
        let device = if connected {
            self.device.as_deref()
        } else {
            None
        };

        let mut order: Vec<usize> = (0..measurements.len()).collect();
        order.sort_by_key(|&i| measurements[i].kind.priority());

        let mut outcome = CycleOutcome {
            connected,
            ..CycleOutcome::default()
        };

        for index in order {
            let current = &measurements[index];
            if !current.policy.enabled {
                debug!("{}: {} disabled, skipping", self.name, current.sensor_type);
                continue;
            }
            if !current.is_due(now) {
                continue;
            }
            if current.needs_first_skip() {
                measurements[index].mark_skipped(now);
                continue;
            }

            let result = {
                let env = execute::CycleEnv {
                    cycle: &*measurements,
                    reference,
                    device,
                };
                self.execute(&measurements[index], &env, 0).await
            };

            let execution = match result {
                Ok(execution) => execution,
                Err(e) => {
                    outcome.failed += 1;
                    warn!(
                        "{}: {} ({}) failed: {}",
                        self.name,
                        measurements[index].sensor_type,
                        measurements[index].kind.name(),
                        e
                    );
                    continue;
                },
            };

            measurements[index].state.last_run = Some(now);
            if let Some((target, value)) = execution.pending_write {
                if let Some(output) = measurements.iter_mut().find(|m| m.sensor_type == target) {
                    output.state.pending_write = Some(value);
                }
            }

            let measurement = &mut measurements[index];
            match execution.value {
                Some(value) => {
                    if measurement.can_send(now, value, execution.uom) {
                        outcome.accepted.push(index);
                    }
                },
                None => debug!("{}: {} produced no value", self.name, measurement.sensor_type),
            }
        }

        self.disconnect().await;

        info!(
            "{}: cycle done, {} accepted, {} failed",
            self.name,
            outcome.accepted.len(),
            outcome.failed
        );
        outcome
    }
}

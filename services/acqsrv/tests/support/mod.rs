//! Shared fixtures: an in-memory field device and measurement builders

#![allow(dead_code, clippy::disallowed_methods)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use acqsrv::measurement::MeasurementDescriptor;
use acqsrv::{Measurement, Scheduler, SchedulerSettings};
use async_trait::async_trait;
use common::RetryPolicy;
use edgelink_codec::{CommandTable, FieldDevice, RegisterCodec};
use errors::{AcqError, AcqResult};
use serde_json::{Map, Value};

/// Holding registers and coils in memory, with injectable faults
#[derive(Default)]
pub struct SimDevice {
    holding: Mutex<HashMap<u16, u16>>,
    coils: Mutex<HashMap<u16, bool>>,
    failing: Mutex<HashSet<u16>>,
    refuse_connect: AtomicBool,
    connects: AtomicUsize,
    disconnects: AtomicUsize,
    reads: Mutex<Vec<(u16, u16)>>,
    writes: Mutex<Vec<(u16, Vec<u16>)>>,
}

impl SimDevice {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set(&self, address: u16, word: u16) {
        self.holding.lock().unwrap().insert(address, word);
    }

    pub fn get(&self, address: u16) -> u16 {
        self.holding
            .lock()
            .unwrap()
            .get(&address)
            .copied()
            .unwrap_or(0)
    }

    /// Every read touching `address` fails with a transport error
    pub fn fail_reads_at(&self, address: u16) {
        self.failing.lock().unwrap().insert(address);
    }

    pub fn refuse_connections(&self) {
        self.refuse_connect.store(true, Ordering::SeqCst);
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> Vec<(u16, u16)> {
        self.reads.lock().unwrap().clone()
    }

    pub fn writes(&self) -> Vec<(u16, Vec<u16>)> {
        self.writes.lock().unwrap().clone()
    }

    fn read_range(&self, address: u16, count: u16) -> AcqResult<Vec<u16>> {
        self.reads.lock().unwrap().push((address, count));
        let failing = self.failing.lock().unwrap();
        if (address..address.saturating_add(count)).any(|a| failing.contains(&a)) {
            return Err(AcqError::transport(format!("no response at {}", address)));
        }
        let regs = self.holding.lock().unwrap();
        Ok((0..count)
            .map(|i| regs.get(&(address + i)).copied().unwrap_or(0))
            .collect())
    }
}

#[async_trait]
impl FieldDevice for SimDevice {
    fn name(&self) -> &str {
        "sim"
    }

    async fn connect(&self) -> AcqResult<()> {
        if self.refuse_connect.load(Ordering::SeqCst) {
            return Err(AcqError::transport("connection refused"));
        }
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> AcqResult<()> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn read_holding_registers(&self, address: u16, count: u16) -> AcqResult<Vec<u16>> {
        self.read_range(address, count)
    }

    async fn read_input_registers(&self, address: u16, count: u16) -> AcqResult<Vec<u16>> {
        self.read_range(address, count)
    }

    async fn read_coils(&self, address: u16, count: u16) -> AcqResult<Vec<bool>> {
        let coils = self.coils.lock().unwrap();
        Ok((0..count)
            .map(|i| coils.get(&(address + i)).copied().unwrap_or(false))
            .collect())
    }

    async fn write_registers(&self, address: u16, words: &[u16]) -> AcqResult<()> {
        self.writes.lock().unwrap().push((address, words.to_vec()));
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

/// Retries without delay so fault tests stay fast
pub fn fast_settings() -> SchedulerSettings {
    SchedulerSettings {
        io_retry: RetryPolicy::new(3, 1),
        connect_retry: RetryPolicy::new(2, 1),
        ..SchedulerSettings::default()
    }
}

pub fn scheduler(device: Arc<SimDevice>) -> Scheduler {
    Scheduler::new("test", RegisterCodec::default())
        .with_device(device)
        .with_settings(fast_settings())
}

/// Build a measurement from a descriptor, failing the test when it is invalid
pub fn measurement(descriptor: Value) -> Measurement {
    measurement_with(descriptor, &CommandTable::new())
}

pub fn measurement_with(descriptor: Value, commands: &CommandTable) -> Measurement {
    MeasurementDescriptor::from_value(&Map::new(), &descriptor)
        .and_then(|d| d.build("PUMP", commands))
        .unwrap()
}

pub fn value_of(measurements: &[Measurement], name: &str) -> Option<acqsrv::SampleValue> {
    measurements
        .iter()
        .find(|m| m.sensor_type == name)
        .and_then(|m| m.state.value.clone())
}

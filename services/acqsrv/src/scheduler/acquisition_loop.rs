//! Periodic acquisition task

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use common::{retry_async, RetryPolicy};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::{group_by_destination, Scheduler};
use crate::measurement::Measurement;
use crate::transport::Transport;

/// Sleep used while a loop is switched off
pub const DISABLED_BACKOFF: Duration = Duration::from_secs(10);

/// Owns one measurement set and drives it through cycles
pub struct AcquisitionLoop {
    name: String,
    scheduler: Scheduler,
    measurements: Vec<Measurement>,
    transport: Arc<dyn Transport>,
    interval: Duration,
    enabled: Arc<AtomicBool>,
    dispatch_retry: RetryPolicy,
}

impl AcquisitionLoop {
    pub fn new(
        name: impl Into<String>,
        scheduler: Scheduler,
        measurements: Vec<Measurement>,
        transport: Arc<dyn Transport>,
        interval: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            scheduler,
            measurements,
            transport,
            interval,
            enabled: Arc::new(AtomicBool::new(true)),
            dispatch_retry: RetryPolicy::IO,
        }
    }

    pub fn with_dispatch_retry(mut self, policy: RetryPolicy) -> Self {
        self.dispatch_retry = policy;
        self
    }

    /// Share an externally controlled on/off switch
    pub fn with_enabled(mut self, enabled: Arc<AtomicBool>) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn enabled(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.enabled)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn measurements(&self) -> &[Measurement] {
        &self.measurements
    }

    /// One cycle followed by dispatch; returns the number of payloads sent
    pub async fn tick(&mut self) -> usize {
        let outcome = self
            .scheduler
            .run_cycle(&mut self.measurements, &[], Utc::now())
            .await;

        let mut sent = 0;
        for (destination, payloads) in
            group_by_destination(&mut self.measurements, &outcome.accepted, false)
        {
            let transport = &self.transport;
            let label = format!("{}: send to {}", self.name, destination);
            let result = retry_async(self.dispatch_retry, &label, || {
                transport.send_batch(&payloads, &destination)
            })
            .await;
            match result {
                Ok(()) => {
                    debug!("{}: {} payloads -> {}", self.name, payloads.len(), destination);
                    sent += payloads.len();
                },
                Err(e) => error!(
                    "{}: dropping {} payloads for {}: {}",
                    self.name,
                    payloads.len(),
                    destination,
                    e
                ),
            }
        }
        sent
    }

    /// Run until `cancel` fires; cancellation is observed while sleeping
    pub async fn run(mut self, cancel: CancellationToken) {
        info!(
            "{}: started, {} measurements every {:?}",
            self.name,
            self.measurements.len(),
            self.interval
        );

        loop {
            let pause = if self.enabled.load(Ordering::Relaxed) {
                let started = Instant::now();
                self.tick().await;
                self.interval.saturating_sub(started.elapsed())
            } else {
                debug!("{}: disabled, backing off", self.name);
                DISABLED_BACKOFF
            };

            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(pause) => {},
            }
        }

        info!("{}: stopped", self.name);
    }
}

//! Service assembly
//!
//! Builds the runtime and configuration loops plus the remote command
//! handler from an [`AcqConfig`]. While running, the handler is subscribed
//! to the transport's command channel. Every loop and the handler get their
//! own device instance so connections are never shared between tasks.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use edgelink_codec::CommandTable;
use errors::{AcqError, AcqResult};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::command_handler::CommandHandler;
use crate::config::AcqConfig;
use crate::measurement::descriptor::load_measurements;
use crate::measurement::Measurement;
use crate::modbus_tcp::ModbusTcpDevice;
use crate::query::{QueryExecutor, SqliteQueryExecutor};
use crate::scheduler::{AcquisitionLoop, Scheduler};
use crate::transport::Transport;

/// Runtime and configuration measurement sets
fn load_sets(config: &AcqConfig) -> (Vec<Measurement>, Vec<Measurement>) {
    let runtime = load_measurements(
        &config.measurements,
        &config.defaults,
        &config.machine_type,
        &config.commands,
        false,
    );
    let configuration = load_measurements(
        &config.config_measurements,
        &config.defaults,
        &config.machine_type,
        &config.commands,
        true,
    );
    (runtime, configuration)
}

pub struct AcqService {
    runtime: AcquisitionLoop,
    configuration: AcquisitionLoop,
    commands: Arc<CommandHandler>,
    transport: Arc<dyn Transport>,
}

impl AcqService {
    /// Check that every descriptor builds; returns (runtime, configuration) counts
    pub fn validate(config: &AcqConfig) -> AcqResult<(usize, usize)> {
        config.validate()?;
        let (runtime, configuration) = load_sets(config);
        let excluded = config.measurements.len() - runtime.len()
            + config.config_measurements.len()
            - configuration.len();
        if excluded > 0 {
            return Err(AcqError::configuration(format!(
                "{} measurement descriptors are invalid",
                excluded
            )));
        }
        Ok((runtime.len(), configuration.len()))
    }

    pub async fn build(config: &AcqConfig, transport: Arc<dyn Transport>) -> AcqResult<Self> {
        let query: Option<Arc<dyn QueryExecutor>> = match &config.database {
            Some(db) => Some(Arc::new(
                SqliteQueryExecutor::open(&db.path, db.read_only).await?,
            )),
            None => None,
        };
        let table: Arc<CommandTable> = Arc::new(config.commands.clone());

        let scheduler = |role: &str| {
            let mut scheduler = Scheduler::new(role, config.codec())
                .with_commands(Arc::clone(&table))
                .with_settings(config.scheduler.clone());
            if let Some(device) = &config.device {
                let name = format!("{}/{}", device.name, role);
                scheduler = scheduler.with_device(Arc::new(ModbusTcpDevice::new(name, device.tcp())));
            }
            if let Some(query) = &query {
                scheduler = scheduler.with_query_executor(Arc::clone(query));
            }
            scheduler
        };

        let (runtime_set, configuration_set) = load_sets(config);
        let reference: Vec<Measurement> = runtime_set
            .iter()
            .chain(&configuration_set)
            .cloned()
            .collect();

        let runtime = AcquisitionLoop::new(
            "runtime",
            scheduler("runtime"),
            runtime_set,
            Arc::clone(&transport),
            config.acquisition.runtime_period(),
        )
        .with_dispatch_retry(config.scheduler.io_retry);
        runtime
            .enabled()
            .store(config.acquisition.enabled, Ordering::Relaxed);

        let configuration = AcquisitionLoop::new(
            "configuration",
            scheduler("configuration"),
            configuration_set,
            Arc::clone(&transport),
            config.acquisition.config_period(),
        )
        .with_dispatch_retry(config.scheduler.io_retry);
        configuration
            .enabled()
            .store(config.acquisition.config_enabled, Ordering::Relaxed);

        let commands = Arc::new(
            CommandHandler::new(scheduler("commands"), config.machine_type.clone())
                .with_reference(reference),
        );

        Ok(Self {
            runtime,
            configuration,
            commands,
            transport,
        })
    }

    pub fn command_handler(&self) -> Arc<CommandHandler> {
        Arc::clone(&self.commands)
    }

    /// One cycle of each enabled loop; returns the payloads sent
    pub async fn run_once(&mut self) -> AcqResult<usize> {
        self.transport.connect().await?;
        let mut sent = 0;
        for acquisition in [&mut self.runtime, &mut self.configuration] {
            if acquisition.enabled().load(Ordering::Relaxed) {
                sent += acquisition.tick().await;
            }
        }
        self.transport.disconnect().await?;
        Ok(sent)
    }

    /// Run both loops and serve remote commands until `shutdown` is cancelled
    pub async fn run(self, shutdown: CancellationToken) -> AcqResult<()> {
        self.transport.connect().await?;
        info!(
            "Acquisition started: {} runtime, {} configuration measurements",
            self.runtime.measurements().len(),
            self.configuration.measurements().len()
        );

        let commands = tokio::spawn({
            let transport = Arc::clone(&self.transport);
            let handler = Arc::clone(&self.commands);
            let shutdown = shutdown.clone();
            async move { transport.subscribe_commands(handler, shutdown).await }
        });
        let runtime = tokio::spawn(self.runtime.run(shutdown.clone()));
        let configuration = tokio::spawn(self.configuration.run(shutdown.clone()));
        for (name, handle) in [("runtime", runtime), ("configuration", configuration)] {
            if let Err(e) = handle.await {
                error!("{} loop aborted: {}", name, e);
            }
        }
        match commands.await {
            Ok(Ok(())) => {},
            Ok(Err(e)) => warn!("Remote commands unavailable: {}", e),
            Err(e) => error!("Command subscription aborted: {}", e),
        }

        self.transport.disconnect().await?;
        info!("Acquisition stopped");
        Ok(())
    }
}

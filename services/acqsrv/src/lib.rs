//! Field acquisition service
//!
//! Polls a Modbus-style field device on a schedule, derives formula, check,
//! bitmask and query measurements from the readings, suppresses unchanged
//! samples and hands the survivors to a transport grouped by destination.
//!
//! - [`measurement`]: measurement model, descriptors and the debounce gate
//! - [`scheduler`]: cycle execution and the periodic acquisition loops
//! - [`command_handler`]: ad hoc remote commands
//! - [`modbus_tcp`], [`query`], [`transport`]: collaborator adapters

pub mod command_handler;
pub mod config;
pub mod measurement;
pub mod modbus_tcp;
pub mod query;
pub mod scheduler;
pub mod service;
pub mod transport;

pub use command_handler::{CommandHandler, CommandReply};
pub use config::AcqConfig;
pub use measurement::{Measurement, MeasurementDescriptor, MeasurementKind, Payload, SampleValue};
pub use scheduler::{AcquisitionLoop, CycleOutcome, Scheduler, SchedulerSettings};
pub use service::AcqService;
pub use transport::{ChannelTransport, CommandClient, LogTransport, Transport};

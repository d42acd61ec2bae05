//! Shared runtime plumbing for the acquisition services
//!
//! - [`logging`]: console and daily file logging with `[LEVEL]` formatting
//! - [`config`]: layered configuration loading (defaults, file, environment)
//! - [`retry`]: bounded retry combinator for device and transport calls
//! - [`shutdown`]: Ctrl+C / SIGTERM handling

pub mod config;
pub mod logging;
pub mod retry;
pub mod shutdown;

pub use config::load_config;
pub use logging::{init_with_config, LogConfig, LogGuard};
pub use retry::{retry_async, RetryPolicy};
pub use shutdown::{wait_for_shutdown, ShutdownSignal};

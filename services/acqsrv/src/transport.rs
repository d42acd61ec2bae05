//! Transports: outbound payload batches and inbound remote commands

use std::sync::Arc;

use async_trait::async_trait;
use errors::{AcqError, AcqResult};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::command_handler::{CommandHandler, CommandReply};
use crate::measurement::Payload;

/// Carries payload batches out and remote commands in
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self) -> AcqResult<()>;

    async fn disconnect(&self) -> AcqResult<()>;

    async fn send_batch(&self, payloads: &[Payload], destination: &str) -> AcqResult<()>;

    /// Answer incoming commands with `handler` until `shutdown` is cancelled
    ///
    /// Transports without an inbound side just wait for the shutdown.
    async fn subscribe_commands(
        &self,
        _handler: Arc<CommandHandler>,
        shutdown: CancellationToken,
    ) -> AcqResult<()> {
        shutdown.cancelled().await;
        Ok(())
    }
}

/// Writes every batch to the log as JSON
#[derive(Debug, Default)]
pub struct LogTransport;

#[async_trait]
impl Transport for LogTransport {
    async fn connect(&self) -> AcqResult<()> {
        Ok(())
    }

    async fn disconnect(&self) -> AcqResult<()> {
        Ok(())
    }

    async fn send_batch(&self, payloads: &[Payload], destination: &str) -> AcqResult<()> {
        let body = serde_json::to_string(payloads)?;
        info!("[{}] {}", destination, body);
        Ok(())
    }
}

/// A batch handed to a [`ChannelTransport`] receiver
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Batch {
    pub destination: String,
    pub payloads: Vec<Payload>,
}

/// A remote command and the slot its reply goes to
#[derive(Debug)]
pub struct CommandRequest {
    pub body: String,
    pub reply: oneshot::Sender<CommandReply>,
}

/// Sending side of a [`ChannelTransport`] command channel
#[derive(Debug, Clone)]
pub struct CommandClient {
    tx: mpsc::Sender<CommandRequest>,
}

impl CommandClient {
    /// Submit a JSON command and wait for its reply
    pub async fn send(&self, body: impl Into<String>) -> AcqResult<CommandReply> {
        let (reply, response) = oneshot::channel();
        let request = CommandRequest {
            body: body.into(),
            reply,
        };
        self.tx
            .send(request)
            .await
            .map_err(|_| AcqError::dispatch("command subscriber is gone"))?;
        response
            .await
            .map_err(|_| AcqError::dispatch("command dropped without a reply"))
    }
}

/// Forwards batches into an mpsc channel and serves commands from another
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    tx: mpsc::Sender<Batch>,
    /// Taken by the running subscription, returned when it stops
    commands: Arc<Mutex<Option<mpsc::Receiver<CommandRequest>>>>,
}

impl ChannelTransport {
    pub fn new(tx: mpsc::Sender<Batch>) -> Self {
        Self {
            tx,
            commands: Arc::new(Mutex::new(None)),
        }
    }

    /// Transport plus the receiving end, buffered for `capacity` batches
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Batch>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    /// Accept remote commands; the returned client is the remote end
    pub fn with_command_channel(self, capacity: usize) -> (Self, CommandClient) {
        let (tx, rx) = mpsc::channel(capacity);
        let transport = Self {
            commands: Arc::new(Mutex::new(Some(rx))),
            ..self
        };
        (transport, CommandClient { tx })
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn connect(&self) -> AcqResult<()> {
        Ok(())
    }

    async fn disconnect(&self) -> AcqResult<()> {
        Ok(())
    }

    async fn send_batch(&self, payloads: &[Payload], destination: &str) -> AcqResult<()> {
        let batch = Batch {
            destination: destination.to_string(),
            payloads: payloads.to_vec(),
        };
        self.tx
            .send(batch)
            .await
            .map_err(|_| AcqError::dispatch(format!("{}: receiver closed", destination)))
    }

    async fn subscribe_commands(
        &self,
        handler: Arc<CommandHandler>,
        shutdown: CancellationToken,
    ) -> AcqResult<()> {
        let Some(mut requests) = self.commands.lock().await.take() else {
            return Err(AcqError::configuration(
                "no command channel, or already subscribed",
            ));
        };
        info!("Listening for remote commands");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                request = requests.recv() => {
                    let Some(CommandRequest { body, reply }) = request else {
                        debug!("Command channel closed");
                        break;
                    };
                    let response = handler.handle(&body).await;
                    if reply.send(response).is_err() {
                        warn!("Command sender left before the reply");
                    }
                },
            }
        }

        *self.commands.lock().await = Some(requests);
        Ok(())
    }
}

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use derive_builder::Builder;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::protocol::messages::{LINE_TERMINATOR, OutputCommand, OutputReport, ProcessorMessage};

pub const DEFAULT_PORT: u16 = 23;

#[derive(Error, Debug)]
pub enum HomeworksClientError {
    #[error("Client connection failed: {0}")]
    ConnectionError(String),
    #[error("Client failed to login: {0}")]
    LoginError(String),
    #[error("Writing failed: {0}")]
    WriteError(String),
    #[error("Connection closed by the processor")]
    Closed,
}

#[derive(Builder, Clone, Debug)]
pub struct HomeworksOptions {
    pub host: String,
    #[builder(default = "DEFAULT_PORT")]
    pub port: u16,
    #[builder(default = "String::from(\"lutron\")")]
    pub user: String,
    #[builder(default = "String::from(\"integration\")")]
    pub password: String,
    #[builder(default = "Duration::from_secs(10)")]
    pub login_timeout: Duration,
}

impl HomeworksOptions {
    pub fn builder() -> HomeworksOptionsBuilder {
        HomeworksOptionsBuilder::default()
    }
}

/// Receives output levels reported by the processor.
#[async_trait]
pub trait StatusUpdate: Send + Sync {
    async fn status_update(&self, report: &OutputReport);
}

/// Telnet-style integration connection to a Homeworks processor.
pub struct HomeworksClient {
    writer: Mutex<OwnedWriteHalf>,
    reader_task: JoinHandle<()>,
    closed: watch::Receiver<bool>,
}

impl HomeworksClient {
    pub async fn connect(
        options: HomeworksOptions,
        updater: Arc<dyn StatusUpdate>,
    ) -> Result<Self, HomeworksClientError> {
        let stream = TcpStream::connect((options.host.as_str(), options.port))
            .await
            .map_err(|e| HomeworksClientError::ConnectionError(e.to_string()))?;
        info!("Connected to processor at {}:{}", options.host, options.port);
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        tokio::time::timeout(
            options.login_timeout,
            login(&mut reader, &mut write_half, &options),
        )
        .await
        .map_err(|_| HomeworksClientError::LoginError("timed out waiting for prompt".into()))??;
        info!("Logged in to processor as {}", options.user);

        let (closed_tx, closed) = watch::channel(false);
        let reader_task = tokio::spawn(async move {
            info!("Starting processor reader");
            HomeworksClient::run_reader(reader, updater).await;
            let _ = closed_tx.send(true);
        });

        Ok(Self {
            writer: Mutex::new(write_half),
            reader_task,
            closed,
        })
    }

    async fn run_reader(mut reader: BufReader<OwnedReadHalf>, updater: Arc<dyn StatusUpdate>) {
        let mut line = String::new();
        loop {
            line.clear();
            match reader.read_line(&mut line).await {
                Ok(0) => {
                    warn!("Processor closed the connection");
                    break;
                }
                Ok(_) => dispatch_line(&line, updater.as_ref()).await,
                Err(e) => {
                    error!("Connection error: {:?}", e);
                    break;
                }
            }
        }
        info!("Processor reader terminated");
    }

    pub async fn send(&self, command: &OutputCommand) -> Result<(), HomeworksClientError> {
        if *self.closed.borrow() {
            return Err(HomeworksClientError::Closed);
        }
        debug!("Sending command: {command}");
        let mut writer = self.writer.lock().await;
        write_line(&mut writer, &command.encode()).await
    }

    /// Resolves once the processor side of the connection is gone.
    pub async fn closed(&self) {
        let mut closed = self.closed.clone();
        let _ = closed.wait_for(|closed| *closed).await;
    }

    pub async fn disconnect(self) -> Result<(), HomeworksClientError> {
        self.reader_task.abort();
        self.writer
            .lock()
            .await
            .shutdown()
            .await
            .map_err(|e| HomeworksClientError::ConnectionError(format!("Disconnect error: {e}")))
    }
}

async fn write_line(writer: &mut OwnedWriteHalf, line: &str) -> Result<(), HomeworksClientError> {
    writer
        .write_all(format!("{line}{LINE_TERMINATOR}").as_bytes())
        .await
        .map_err(|e| HomeworksClientError::WriteError(e.to_string()))
}

async fn dispatch_line(line: &str, updater: &dyn StatusUpdate) {
    if line.trim().is_empty() {
        return;
    }
    match ProcessorMessage::parse(line) {
        Ok(ProcessorMessage::Output(report)) => {
            debug!("Output {} reported {}", report.integration_id, report.level);
            updater.status_update(&report).await;
        }
        Ok(_) => {}
        Err(e) => warn!("Failed to parse processor message: {e}"),
    }
}

/// Answers the login prompts and stops right after the command prompt, leaving
/// whatever follows it buffered for the reader.
async fn login(
    reader: &mut BufReader<OwnedReadHalf>,
    writer: &mut OwnedWriteHalf,
    options: &HomeworksOptions,
) -> Result<(), HomeworksClientError> {
    // consumed part of the current, not yet terminated line
    let mut pending = String::new();
    let mut password_sent = false;
    loop {
        let available = reader
            .fill_buf()
            .await
            .map_err(|e| HomeworksClientError::ConnectionError(e.to_string()))?;
        if available.is_empty() {
            return Err(HomeworksClientError::Closed);
        }
        let take = available
            .iter()
            .position(|b| *b == b'\n')
            .map_or(available.len(), |i| i + 1);
        let terminated = available[take - 1] == b'\n';
        let consumed = pending.len();
        pending.push_str(&String::from_utf8_lossy(&available[..take]));

        if let Some(prompt_len) = ProcessorMessage::command_prompt_len(&pending) {
            reader.consume(prompt_len.saturating_sub(consumed).min(take));
            return Ok(());
        }
        reader.consume(take);

        // prompts are not newline terminated, so look at the partial line as well
        match ProcessorMessage::parse(&pending) {
            Ok(ProcessorMessage::LoginPrompt) => {
                if password_sent {
                    return Err(HomeworksClientError::LoginError(
                        "credentials rejected".into(),
                    ));
                }
                write_line(writer, &options.user).await?;
                pending.clear();
            }
            Ok(ProcessorMessage::PasswordPrompt) => {
                write_line(writer, &options.password).await?;
                password_sent = true;
                pending.clear();
            }
            _ if terminated => pending.clear(),
            _ => {}
        }
    }
}

//! FileSink - appends forwarded messages to a JSON-lines file

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use contracts::{ContractError, MessageSink, SinkBatch};
use serde::Serialize;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::Mutex;
use tracing::{debug, error, instrument};

/// Configuration for FileSink
#[derive(Debug, Clone)]
pub struct FileSinkConfig {
    /// Output file; created with its parent directories
    pub path: PathBuf,
}

impl FileSinkConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Option<Self> {
        params.get("path").map(|path| Self {
            path: PathBuf::from(path),
        })
    }
}

/// One line of output
#[derive(Serialize)]
struct FileRecord<'a> {
    topic: &'a str,
    key: &'a str,
    headers: &'a BTreeMap<String, String>,
    value: std::borrow::Cow<'a, str>,
}

/// Sink that appends each message as one JSON line
///
/// A batch is serialized completely before anything is written, and flushed
/// before `send` returns.
pub struct FileSink {
    name: String,
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl FileSink {
    pub async fn new(name: impl Into<String>, config: FileSinkConfig) -> std::io::Result<Self> {
        if let Some(parent) = config.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.path)
            .await?;

        Ok(Self {
            name: name.into(),
            path: config.path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    /// Create from params map (for factory)
    pub async fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> std::io::Result<Self> {
        let config = FileSinkConfig::from_params(params).ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "missing 'path' param")
        })?;
        Self::new(name, config).await
    }

    fn encode(batch: &SinkBatch) -> Result<Vec<u8>, serde_json::Error> {
        let mut buf = Vec::new();
        for message in &batch.messages {
            let record = FileRecord {
                topic: &batch.topic,
                key: &message.key,
                headers: &message.headers,
                value: String::from_utf8_lossy(&message.value),
            };
            serde_json::to_writer(&mut buf, &record)?;
            buf.push(b'\n');
        }
        Ok(buf)
    }

    async fn append(&self, bytes: &[u8]) -> std::io::Result<()> {
        let mut writer = self.writer.lock().await;
        writer.write_all(bytes).await?;
        writer.flush().await
    }

    fn write_error(&self, e: impl std::fmt::Display) -> ContractError {
        error!(sink = %self.name, path = %self.path.display(), error = %e, "Write failed");
        ContractError::sink_write(&self.name, e.to_string())
    }
}

impl MessageSink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "file_sink_send",
        skip(self, batch),
        fields(sink = %self.name, messages = batch.len())
    )]
    async fn send(&self, batch: &SinkBatch) -> Result<(), ContractError> {
        let bytes = Self::encode(batch).map_err(|e| self.write_error(e))?;
        self.append(&bytes).await.map_err(|e| self.write_error(e))
    }

    #[instrument(name = "file_sink_close", skip(self))]
    async fn close(&self) -> Result<(), ContractError> {
        self.writer.lock().await.flush().await?;
        debug!(sink = %self.name, "FileSink closed");
        Ok(())
    }
}

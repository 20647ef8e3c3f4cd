use crate::config::AuditConfig;
use crate::domain::audit::AuditRecord;
use crate::services::audit::{AuditSink, AuditSinkError};
use std::path::Path;
use std::sync::Mutex;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, watch};

/// Builds the JSON lines sink and the worker that owns its output.
///
/// # Errors
/// Returns an error if the configured audit file cannot be opened for appending.
pub async fn json_lines(config: &AuditConfig) -> std::io::Result<(JsonLinesAuditSink, AuditLogWriter)> {
    let output: Box<dyn AsyncWrite + Send + Unpin> = match &config.path {
        Some(path) => Box::new(open_append(path).await?),
        None => Box::new(tokio::io::stdout()),
    };
    let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
    Ok((JsonLinesAuditSink { tx }, AuditLogWriter { rx, output }))
}

async fn open_append(path: &Path) -> std::io::Result<tokio::fs::File> {
    tokio::fs::OpenOptions::new().create(true).append(true).open(path).await
}

/// Non-blocking front of the audit log. Full buffers reject instead of waiting.
#[derive(Clone, Debug)]
pub struct JsonLinesAuditSink {
    tx: mpsc::Sender<String>,
}

impl AuditSink for JsonLinesAuditSink {
    fn write(&self, record: &AuditRecord) -> Result<(), AuditSinkError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        self.tx.try_send(line).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => AuditSinkError::Full,
            mpsc::error::TrySendError::Closed(_) => AuditSinkError::Closed,
        })
    }
}

/// Appends buffered audit lines to the output in arrival order.
pub struct AuditLogWriter {
    rx: mpsc::Receiver<String>,
    output: Box<dyn AsyncWrite + Send + Unpin>,
}

impl std::fmt::Debug for AuditLogWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLogWriter").field("pending", &self.rx.len()).finish_non_exhaustive()
    }
}

impl AuditLogWriter {
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        while !*shutdown.borrow() {
            tokio::select! {
                line = self.rx.recv() => match line {
                    Some(line) => self.append(&line).await,
                    None => break,
                },
                _ = shutdown.changed() => {}
            }
        }

        self.rx.close();
        let mut drained = 0_usize;
        while let Some(line) = self.rx.recv().await {
            self.append(&line).await;
            drained += 1;
        }
        if let Err(e) = self.output.flush().await {
            tracing::error!(error = %e, "Failed to flush audit log");
        }
        tracing::info!(drained, "Audit log writer shutting down...");
    }

    async fn append(&mut self, line: &str) {
        let res = async {
            self.output.write_all(line.as_bytes()).await?;
            self.output.flush().await
        }
        .await;

        if let Err(e) = res {
            tracing::error!(error = %e, "Failed to append audit record");
        }
    }
}

/// Keeps records in memory, for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().map(|records| records.clone()).unwrap_or_default()
    }
}

impl AuditSink for MemoryAuditSink {
    fn write(&self, record: &AuditRecord) -> Result<(), AuditSinkError> {
        self.records.lock().map_err(|_| AuditSinkError::Closed)?.push(record.clone());
        Ok(())
    }
}

use crate::config::{SinkConfig, TelemetryConfig};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use toolgate_interfaces::{SanitizedTelemetry, SinkError, TelemetrySink};

/// Append-only JSON lines file.
pub struct JsonlFileSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonlFileSink {
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let file = OpenOptions::new().create(true).append(true).open(&path).await?;

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read back every record in a JSONL sink file. Blank lines are skipped.
    pub async fn read_all<P: AsRef<Path>>(path: P) -> Result<Vec<SanitizedTelemetry>, SinkError> {
        let content = fs::read_to_string(path).await?;
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(SinkError::from))
            .collect()
    }
}

#[async_trait]
impl TelemetrySink for JsonlFileSink {
    fn name(&self) -> &str {
        "jsonl"
    }

    async fn send(&self, record: &SanitizedTelemetry) -> Result<(), SinkError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

/// POSTs each record as JSON to an HTTP endpoint.
pub struct HttpTelemetrySink {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTelemetrySink {
    /// `timeout` bounds each request; `None` leaves it to the server.
    pub fn new(endpoint: impl Into<String>, timeout: Option<Duration>) -> Result<Self, SinkError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| SinkError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl TelemetrySink for HttpTelemetrySink {
    fn name(&self) -> &str {
        "http"
    }

    async fn send(&self, record: &SanitizedTelemetry) -> Result<(), SinkError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(record)
            .send()
            .await
            .map_err(|e| SinkError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SinkError::Rejected(format!("HTTP {}", status)));
        }
        Ok(())
    }
}

/// Discards everything.
pub struct NoopSink;

#[async_trait]
impl TelemetrySink for NoopSink {
    fn name(&self) -> &str {
        "noop"
    }

    async fn send(&self, _record: &SanitizedTelemetry) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Instantiate the configured sink; no sink section or `SinkConfig::None`
/// yields no sink.
pub async fn build_sink(config: &TelemetryConfig) -> Result<Option<Arc<dyn TelemetrySink>>, SinkError> {
    let Some(sink_config) = &config.sink else {
        return Ok(None);
    };
    let sink: Arc<dyn TelemetrySink> = match sink_config {
        SinkConfig::Jsonl { path } => Arc::new(JsonlFileSink::open(path).await?),
        SinkConfig::Http { endpoint } => {
            Arc::new(HttpTelemetrySink::new(endpoint.clone(), config.sink_timeout())?)
        }
        SinkConfig::None => return Ok(None),
    };
    Ok(Some(sink))
}

//! Session persistence and upload.
//!
//! A finalized session is handed to a [`SessionSink`] exactly once after it
//! ends. The crate ships a JSON file sink and, behind the `sync` feature, an
//! HTTP client that uploads the session record to the wellness backend.
//! Retry and backoff policy belong to the sink's consumer, not to the
//! tracking core.

use crate::session::types::{Session, SessionRecord};
use serde::Serialize;
use std::path::PathBuf;

/// Sink error types.
#[derive(Debug)]
pub enum SinkError {
    /// Configuration error
    Config(String),
    /// Filesystem error
    Io(String),
    /// Network/HTTP error
    Network(String),
    /// Server returned an error response
    Server { status: u16, message: String },
    /// JSON serialization error
    Serialization(String),
}

impl std::fmt::Display for SinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinkError::Config(msg) => write!(f, "Sink config error: {msg}"),
            SinkError::Io(msg) => write!(f, "Sink IO error: {msg}"),
            SinkError::Network(msg) => write!(f, "Sink network error: {msg}"),
            SinkError::Server { status, message } => {
                write!(f, "Sink server error ({status}): {message}")
            }
            SinkError::Serialization(msg) => write!(f, "Sink serialization error: {msg}"),
        }
    }
}

impl std::error::Error for SinkError {}

/// Consumer of finalized sessions.
pub trait SessionSink {
    /// Persist a finalized session. Called exactly once per session, after
    /// it has ended.
    fn persist(&self, session: &Session) -> Result<(), SinkError>;
}

/// Writes each finalized session as a JSON file in the export directory.
///
/// Files carry the backend's export-contract shape, so they double as the
/// user's own data export.
pub struct JsonExportSink {
    export_dir: PathBuf,
}

impl JsonExportSink {
    pub fn new(export_dir: PathBuf) -> Self {
        Self { export_dir }
    }

    fn file_path(&self, session: &Session) -> PathBuf {
        let stamp = session
            .end_time
            .unwrap_or(session.start_time)
            .format("%Y%m%d_%H%M%S");
        self.export_dir.join(format!("session_{stamp}.json"))
    }
}

impl SessionSink for JsonExportSink {
    fn persist(&self, session: &Session) -> Result<(), SinkError> {
        std::fs::create_dir_all(&self.export_dir).map_err(|e| SinkError::Io(e.to_string()))?;

        let record = SessionRecord::from(session);
        let json = serde_json::to_string_pretty(&record)
            .map_err(|e| SinkError::Serialization(e.to_string()))?;

        let path = self.file_path(session);
        std::fs::write(&path, json).map_err(|e| SinkError::Io(e.to_string()))?;

        tracing::info!("exported session {} to {:?}", session.id, path);
        Ok(())
    }
}

/// Upload configuration for the wellness backend.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Backend base URL, e.g. `https://wellness.example.com`
    pub base_url: String,
    /// Bearer authentication token
    pub token: String,
}

impl UploadConfig {
    /// Create a new upload configuration.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    /// Get the sessions endpoint URL.
    pub fn sessions_url(&self) -> String {
        format!("{}/sessions", self.base_url)
    }

    /// Get the health check endpoint URL.
    pub fn health_url(&self) -> String {
        format!("{}/health", self.base_url)
    }
}

/// Upload payload for the sessions endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct SessionUpload {
    /// The finalized session in export-contract shape
    pub session: SessionRecord,
    /// Upload metadata
    pub meta: UploadMeta,
}

/// Upload metadata.
#[derive(Debug, Clone, Serialize)]
pub struct UploadMeta {
    /// Device identifier
    pub device_id: String,
    /// Timezone
    pub timezone: String,
    /// Source identifier
    pub source: String,
    /// Agent version
    pub version: String,
}

/// Async HTTP client for the wellness backend.
#[cfg(feature = "sync")]
pub struct UploadClient {
    config: UploadConfig,
    client: reqwest::Client,
    device_id: String,
}

#[cfg(feature = "sync")]
impl UploadClient {
    /// Create a new upload client.
    pub fn new(config: UploadConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");

        // Generate device ID from hostname + instance
        let hostname = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        let device_id = format!(
            "blinkwell-{}-{}",
            hostname,
            &uuid::Uuid::new_v4().to_string()[..8]
        );

        Self {
            config,
            client,
            device_id,
        }
    }

    /// Test connection to the backend.
    pub async fn test_connection(&self) -> Result<bool, SinkError> {
        let response = self
            .client
            .get(self.config.health_url())
            .send()
            .await
            .map_err(|e| SinkError::Network(e.to_string()))?;

        Ok(response.status().is_success())
    }

    /// Upload a finalized session to the backend.
    pub async fn upload(&self, session: &Session) -> Result<(), SinkError> {
        if session.end_time.is_none() {
            return Err(SinkError::Config(
                "only finalized sessions can be uploaded".to_string(),
            ));
        }

        let timezone = chrono_tz::Tz::UTC.to_string();
        let payload = SessionUpload {
            session: SessionRecord::from(session),
            meta: UploadMeta {
                device_id: self.device_id.clone(),
                timezone,
                source: "blinkwell-agent".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };

        let response = self
            .client
            .post(self.config.sessions_url())
            .header("Authorization", format!("Bearer {}", self.config.token))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| SinkError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(SinkError::Server {
                status: status.as_u16(),
                message,
            });
        }

        Ok(())
    }

    /// Get the device ID.
    pub fn device_id(&self) -> &str {
        &self.device_id
    }
}

/// Blocking upload client for use in synchronous contexts.
#[cfg(feature = "sync")]
pub struct BlockingUploadClient {
    inner: UploadClient,
    runtime: tokio::runtime::Runtime,
}

#[cfg(feature = "sync")]
impl BlockingUploadClient {
    /// Create a new blocking upload client.
    pub fn new(config: UploadConfig) -> Result<Self, SinkError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| SinkError::Config(format!("Failed to create runtime: {e}")))?;

        Ok(Self {
            inner: UploadClient::new(config),
            runtime,
        })
    }

    /// Test connection to the backend.
    pub fn test_connection(&self) -> Result<bool, SinkError> {
        self.runtime.block_on(self.inner.test_connection())
    }

    /// Upload a finalized session to the backend.
    pub fn upload(&self, session: &Session) -> Result<(), SinkError> {
        self.runtime.block_on(self.inner.upload(session))
    }

    /// Get the device ID.
    pub fn device_id(&self) -> &str {
        self.inner.device_id()
    }
}

#[cfg(feature = "sync")]
impl SessionSink for BlockingUploadClient {
    fn persist(&self, session: &Session) -> Result<(), SinkError> {
        self.upload(session)
    }
}

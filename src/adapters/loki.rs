//! Best-effort forwarding of log records to a Loki push endpoint.
//!
//! [`LokiLayer`] converts `tracing` events into [`LogRecord`]s and queues them
//! without blocking; [`LokiWorker`] drains the queue on its own task and ships
//! batches through a [`RecordShipper`], normally a [`LokiClient`]. Delivery
//! failures are reported locally and the records are dropped.

use crate::adapters::event_record;
use crate::config::LokiConfig;
use crate::domain::model::LogRecord;
use crate::domain::ports::RecordShipper;
use crate::utils::error::{LogSenderError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use url::Url;

pub const PUSH_PATH: &str = "/loki/api/v1/push";
pub const CHANNEL_CAPACITY: usize = 1024;
pub const MAX_BATCH: usize = 100;
const PUSH_TIMEOUT: Duration = Duration::from_secs(5);

// Events from the worker itself and from the HTTP stack it drives are never
// shipped; they would otherwise feed back into the queue.
const OWN_TARGET: &str = module_path!();
const HTTP_TARGETS: [&str; 4] = ["reqwest", "hyper", "h2", "rustls"];

pub struct LokiClient {
    http: Client,
    push_url: Url,
    credentials: Option<(String, Option<String>)>,
    labels: BTreeMap<String, String>,
}

impl LokiClient {
    pub fn new(config: &LokiConfig) -> Result<Self> {
        let base = Url::parse(&config.host).map_err(|e| LogSenderError::InvalidConfigValueError {
            field: "loki.host".to_string(),
            value: config.host.clone(),
            reason: format!("Invalid URL format: {}", e),
        })?;
        // Appended after any path prefix the host carries.
        let mut push_url = base;
        push_url
            .path_segments_mut()
            .map_err(|()| LogSenderError::InvalidConfigValueError {
                field: "loki.host".to_string(),
                value: config.host.clone(),
                reason: "Cannot build push URL: host has no path".to_string(),
            })?
            .pop_if_empty()
            .extend(PUSH_PATH.trim_start_matches('/').split('/'));

        let credentials = config.basic_auth.as_deref().map(|auth| match auth.split_once(':') {
            Some((user, password)) => (user.to_string(), Some(password.to_string())),
            None => (auth.to_string(), None),
        });

        let http = Client::builder().timeout(PUSH_TIMEOUT).build()?;

        Ok(Self {
            http,
            push_url,
            credentials,
            labels: config.labels.clone(),
        })
    }

    pub fn push_url(&self) -> &Url {
        &self.push_url
    }

    /// Push API body: one stream carrying every record of the batch.
    pub fn payload(&self, batch: &[LogRecord]) -> Result<Value> {
        let values = batch
            .iter()
            .map(|record| {
                let nanos = record.timestamp.timestamp_nanos_opt().unwrap_or_default();
                Ok(json!([nanos.to_string(), record.to_json_line()?]))
            })
            .collect::<Result<Vec<Value>>>()?;

        Ok(json!({
            "streams": [{
                "stream": self.labels,
                "values": values,
            }]
        }))
    }
}

impl fmt::Debug for LokiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LokiClient")
            .field("push_url", &self.push_url.as_str())
            .field("authenticated", &self.credentials.is_some())
            .field("labels", &self.labels)
            .finish()
    }
}

#[async_trait]
impl RecordShipper for LokiClient {
    async fn ship(&self, batch: &[LogRecord]) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let body = self.payload(batch)?;
        let mut request = self.http.post(self.push_url.clone()).json(&body);
        if let Some((user, password)) = &self.credentials {
            request = request.basic_auth(user, password.as_ref());
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LogSenderError::LokiPushError {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!("Shipped {} records to Loki", batch.len());
        Ok(())
    }
}

/// `tracing` layer that queues every event for the Loki worker.
pub struct LokiLayer {
    tx: mpsc::Sender<LogRecord>,
    default_fields: Map<String, Value>,
    dropped: Arc<AtomicU64>,
}

impl LokiLayer {
    pub fn new(tx: mpsc::Sender<LogRecord>, default_fields: Map<String, Value>) -> Self {
        Self {
            tx,
            default_fields,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Counter of records discarded because the queue was full.
    pub fn dropped_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.dropped)
    }
}

impl<S: Subscriber> Layer<S> for LokiLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let target = event.metadata().target();
        if target == OWN_TARGET || HTTP_TARGETS.iter().any(|http| target.starts_with(http)) {
            return;
        }

        let record = event_record::from_event(event, &self.default_fields);

        if let Err(TrySendError::Full(_)) = self.tx.try_send(record) {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub batches: u64,
    pub shipped: u64,
    pub failed: u64,
}

/// Drains the queue until every sender is gone.
pub struct LokiWorker<T: RecordShipper> {
    rx: mpsc::Receiver<LogRecord>,
    shipper: T,
}

impl<T: RecordShipper> LokiWorker<T> {
    pub fn new(rx: mpsc::Receiver<LogRecord>, shipper: T) -> Self {
        Self { rx, shipper }
    }

    pub async fn run(mut self) -> WorkerStats {
        let mut stats = WorkerStats::default();

        while let Some(first) = self.rx.recv().await {
            let mut batch = vec![first];
            while batch.len() < MAX_BATCH {
                match self.rx.try_recv() {
                    Ok(record) => batch.push(record),
                    Err(_) => break,
                }
            }

            stats.batches += 1;
            match self.shipper.ship(&batch).await {
                Ok(()) => stats.shipped += batch.len() as u64,
                Err(e) => {
                    stats.failed += batch.len() as u64;
                    tracing::warn!("Loki connection error: {}", e);
                }
            }
        }

        stats
    }
}

/// Builds the client, the layer and the background worker for `config`.
pub fn spawn(
    config: &LokiConfig,
    default_fields: Map<String, Value>,
) -> Result<(LokiLayer, JoinHandle<WorkerStats>)> {
    let client = LokiClient::new(config)?;
    tracing::debug!("Forwarding logs to {}", client.push_url());

    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    let worker = tokio::spawn(LokiWorker::new(rx, client).run());
    Ok((LokiLayer::new(tx, default_fields), worker))
}

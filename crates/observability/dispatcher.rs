use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::Level;

use super::settings::ServiceLabels;

pub(crate) const QUEUE_CAPACITY: usize = 128;

#[derive(Clone, Debug)]
pub(crate) struct Alert {
    pub(crate) level: Level,
    pub(crate) at: DateTime<Utc>,
    pub(crate) labels: ServiceLabels,
    pub(crate) target: String,
    pub(crate) message: String,
    pub(crate) fields: BTreeMap<String, String>,
    /// Span names from root to leaf.
    pub(crate) span_path: Vec<String>,
}

#[async_trait]
pub(crate) trait AlertSink: Send + Sync {
    async fn deliver(&self, alert: &Alert) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Hands alerts to a background task so the emitting thread never waits on the network.
#[derive(Clone)]
pub(crate) struct AlertDispatcher {
    tx: mpsc::Sender<Alert>,
}

impl AlertDispatcher {
    pub(crate) fn spawn(sink: Arc<dyn AlertSink>) -> Self {
        let (tx, mut rx) = mpsc::channel::<Alert>(QUEUE_CAPACITY);

        tokio::spawn(async move {
            while let Some(alert) = rx.recv().await {
                if let Err(err) = sink.deliver(&alert).await {
                    // stderr, not tracing: a failed delivery must not raise another alert.
                    eprintln!("alert sink `{}` failed: {err}", sink.name());
                }
            }
        });

        Self { tx }
    }

    /// Returns false when the alert was dropped.
    pub(crate) fn submit(&self, alert: Alert) -> bool {
        self.tx.try_send(alert).is_ok()
    }
}

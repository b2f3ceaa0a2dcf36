use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Impression,
    Click,
    Conversion,
}

/// A user interaction with a served ad, as posted by clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingEvent {
    pub event_type: EventType,
    pub line_item_id: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    pub placement: String,
    pub user_id: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Flattened record handed to the event sink; one counter is set per event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingRecord {
    pub event_time: String,
    pub event_minute: u8,
    pub event_type: EventType,
    pub item_id: String,
    pub user_id: String,
    pub placement: String,
    pub impressions: u32,
    pub clicks: u32,
    pub conversions: u32,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

impl TrackingEvent {
    /// Check required fields and turn the event into a sink record.
    pub fn into_record(self) -> Result<TrackingRecord, String> {
        for (field, value) in [("line_item_id", &self.line_item_id), ("placement", &self.placement), ("user_id", &self.user_id)] {
            if value.trim().is_empty() {
                return Err(format!("{field} is required"));
            }
        }
        let at = match &self.timestamp {
            Some(ts) => OffsetDateTime::parse(ts, &Rfc3339).map_err(|e| format!("timestamp: {e}"))?,
            None => OffsetDateTime::now_utc(),
        };
        let count = |t: EventType| u32::from(self.event_type == t);
        Ok(TrackingRecord {
            event_time: at.format(&Rfc3339).unwrap_or_default(),
            event_minute: at.minute(),
            event_type: self.event_type,
            impressions: count(EventType::Impression),
            clicks: count(EventType::Click),
            conversions: count(EventType::Conversion),
            item_id: self.line_item_id,
            user_id: self.user_id,
            placement: self.placement,
            metadata: self.metadata,
        })
    }
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("event buffer is full")]
    Full,
    #[error("event sink has shut down")]
    Closed,
}

/// Non-blocking handle for queueing tracking records.
#[derive(Clone)]
pub struct EventPublisher {
    tx: mpsc::Sender<TrackingRecord>,
}

pub fn event_channel(buffer: usize) -> (EventPublisher, mpsc::Receiver<TrackingRecord>) {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    (EventPublisher { tx }, rx)
}

impl EventPublisher {
    pub fn publish(&self, record: TrackingRecord) -> Result<(), PublishError> {
        self.tx.try_send(record).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => PublishError::Full,
            mpsc::error::TrySendError::Closed(_) => PublishError::Closed,
        })
    }
}

/// Drain tracking records into the structured log under the `tracking` target.
pub async fn run_event_log(mut rx: mpsc::Receiver<TrackingRecord>) {
    while let Some(record) = rx.recv().await {
        match serde_json::to_string(&record) {
            Ok(line) => tracing::info!(target: "tracking", event = %line, "tracking event"),
            Err(err) => tracing::warn!(%err, "dropping unserializable tracking event"),
        }
    }
    tracing::debug!("tracking event log stopped");
}

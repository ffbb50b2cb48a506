//! JSON-lines source
//!
//! Every non-blank line is one delivery, either a bare notification body:
//!
//! ```json
//! {"type":"Insert","destinationId":"d1"}
//! ```
//!
//! or an envelope carrying delivery metadata:
//!
//! ```json
//! {"messageId":"42","deliveryCount":2,"enqueuedTimeUtc":"2024-05-01T12:00:00Z","body":{"type":"Delete","destinationId":"d1"}}
//! ```
//!
//! `body` may be an embedded object or a JSON string. Lines that are not
//! valid JSON are passed on as-is; the dispatcher reports them as malformed.

use std::pin::Pin;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_stream::wrappers::LinesStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{error, warn};

use crate::model::{Delivery, DeliveryMetadata};
use crate::traits::NotificationSource;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    #[serde(default)]
    message_id: Option<String>,
    #[serde(default)]
    delivery_count: Option<u32>,
    #[serde(default, alias = "enqueuedTimeUtc")]
    enqueued_at: Option<DateTime<Utc>>,
    body: serde_json::Value,
}

/// Source reading one delivery per line
pub struct JsonLinesSource<R> {
    reader: Mutex<Option<R>>,
    name: &'static str,
}

impl<R> JsonLinesSource<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    /// Create a source over a buffered reader
    pub fn new(reader: R) -> Self {
        Self::with_name(reader, "json-lines")
    }

    /// Create a source with a custom name for logging
    pub fn with_name(reader: R, name: &'static str) -> Self {
        Self {
            reader: Mutex::new(Some(reader)),
            name,
        }
    }
}

impl<R> NotificationSource for JsonLinesSource<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    fn subscribe(&self) -> Pin<Box<dyn Stream<Item = Delivery> + Send + 'static>> {
        let reader = self
            .reader
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();

        let Some(reader) = reader else {
            warn!("Source {} already subscribed, returning an empty stream", self.name);
            return Box::pin(tokio_stream::empty());
        };

        let mut line_number = 0u64;
        let stream = LinesStream::new(reader.lines())
            .map_while(move |line| match line {
                Ok(line) => {
                    line_number += 1;
                    Some(parse_line(&line, line_number))
                }
                Err(e) => {
                    error!("Failed to read line {}: {}", line_number + 1, e);
                    None
                }
            })
            .filter_map(|delivery| delivery);

        Box::pin(stream)
    }

    fn source_name(&self) -> &'static str {
        self.name
    }
}

/// Turn one line into a delivery; blank lines yield nothing
fn parse_line(line: &str, line_number: u64) -> Option<Delivery> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let Ok(envelope) = serde_json::from_str::<Envelope>(line) else {
        return Some(Delivery::new(
            line,
            DeliveryMetadata::new(format!("line-{}", line_number)),
        ));
    };

    let body = match envelope.body {
        serde_json::Value::String(body) => body,
        other => other.to_string(),
    };
    let mut metadata = DeliveryMetadata::new(
        envelope
            .message_id
            .unwrap_or_else(|| format!("line-{}", line_number)),
    );
    if let Some(count) = envelope.delivery_count {
        metadata = metadata.with_delivery_count(count);
    }
    if let Some(enqueued_at) = envelope.enqueued_at {
        metadata.enqueued_at = enqueued_at;
    }

    Some(Delivery::new(body, metadata))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ParsedNotification, parse_notification};

    async fn read_all(input: &'static str) -> Vec<Delivery> {
        let source = JsonLinesSource::new(tokio::io::BufReader::new(input.as_bytes()));
        source.subscribe().collect().await
    }

    #[tokio::test]
    async fn test_bare_bodies_get_line_ids() {
        let deliveries = read_all(
            "{\"type\":\"Insert\",\"destinationId\":\"d1\"}\n\n{\"type\":\"Delete\",\"destinationId\":\"d1\"}\n",
        )
        .await;

        assert_eq!(deliveries.len(), 2);
        assert_eq!(deliveries[0].metadata.message_id, "line-1");
        assert_eq!(deliveries[1].metadata.message_id, "line-3");
        assert_eq!(deliveries[1].metadata.delivery_count, 1);
    }

    #[tokio::test]
    async fn test_envelope_metadata_and_embedded_body() {
        let deliveries = read_all(
            r#"{"messageId":"42","deliveryCount":3,"enqueuedTimeUtc":"2024-05-01T12:00:00Z","body":{"type":"Delete","destinationId":"d9"}}"#,
        )
        .await;

        assert_eq!(deliveries.len(), 1);
        let delivery = &deliveries[0];
        assert_eq!(delivery.metadata.message_id, "42");
        assert_eq!(delivery.metadata.delivery_count, 3);
        assert_eq!(delivery.metadata.enqueued_at.to_rfc3339(), "2024-05-01T12:00:00+00:00");

        let parsed = parse_notification(&delivery.body).unwrap();
        assert!(matches!(parsed, ParsedNotification::Known(n) if n.destination_id.as_str() == "d9"));
    }

    #[tokio::test]
    async fn test_string_body_and_garbage_lines_pass_through() {
        let deliveries = read_all(
            "{\"body\":\"{\\\"type\\\":\\\"Insert\\\",\\\"destinationId\\\":\\\"d2\\\"}\"}\nnot json\n",
        )
        .await;

        assert_eq!(deliveries.len(), 2);
        assert!(parse_notification(&deliveries[0].body).is_ok());
        assert_eq!(deliveries[1].body, "not json");
        assert_eq!(deliveries[1].metadata.message_id, "line-2");
    }
}

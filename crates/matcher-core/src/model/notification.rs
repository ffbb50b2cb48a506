// # Notifications
//
// Inbound insert/delete notifications and the delivery metadata that
// accompanies them.
//
// ## Wire Format
//
// ```json
// { "type": "Insert", "destinationId": "65a1f0c2e4b0a1b2c3d4e5f6" }
// ```
//
// PascalCase keys (`Type`, `DestinationId`) and numeric kinds
// (`0` = Insert, `1` = Delete) are accepted as well. String kinds compare
// case-insensitively.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::destination::DestinationId;
use crate::error::{Error, Result};

/// Operation a notification reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotificationKind {
    /// A destination was created
    Insert,
    /// A destination was removed
    Delete,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Insert => f.write_str("Insert"),
            Self::Delete => f.write_str("Delete"),
        }
    }
}

/// A validated notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// What happened
    pub kind: NotificationKind,
    /// To which destination
    pub destination_id: DestinationId,
}

impl Notification {
    /// Create an insert notification
    pub fn insert(destination_id: DestinationId) -> Self {
        Self {
            kind: NotificationKind::Insert,
            destination_id,
        }
    }

    /// Create a delete notification
    pub fn delete(destination_id: DestinationId) -> Self {
        Self {
            kind: NotificationKind::Delete,
            destination_id,
        }
    }

    /// Serialize into the wire format
    pub fn to_body(&self) -> String {
        serde_json::json!({
            "type": self.kind.to_string(),
            "destinationId": self.destination_id.as_str(),
        })
        .to_string()
    }
}

/// Result of parsing a notification body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedNotification {
    /// A notification this matcher handles
    Known(Notification),
    /// Syntactically valid, but the operation kind is not handled
    Unknown {
        /// The kind as received
        kind: String,
    },
}

#[derive(Debug, Deserialize)]
struct RawNotification {
    #[serde(rename = "type", alias = "Type")]
    kind: serde_json::Value,
    #[serde(rename = "destinationId", alias = "DestinationId")]
    destination_id: String,
}

/// Parse a notification body
///
/// # Returns
///
/// - `Ok(ParsedNotification::Known)`: insert or delete with a valid id
/// - `Ok(ParsedNotification::Unknown)`: unrecognised operation kind
/// - `Err(Error::MalformedInput)`: invalid JSON, missing fields or a bad id
pub fn parse_notification(body: &str) -> Result<ParsedNotification> {
    let raw: RawNotification = serde_json::from_str(body)
        .map_err(|e| Error::malformed(format!("invalid notification body: {}", e)))?;

    let kind = match &raw.kind {
        serde_json::Value::String(s) if s.eq_ignore_ascii_case("insert") => NotificationKind::Insert,
        serde_json::Value::String(s) if s.eq_ignore_ascii_case("delete") => NotificationKind::Delete,
        serde_json::Value::String(s) => {
            return Ok(ParsedNotification::Unknown { kind: s.clone() });
        }
        serde_json::Value::Number(n) => match n.as_u64() {
            Some(0) => NotificationKind::Insert,
            Some(1) => NotificationKind::Delete,
            _ => {
                return Ok(ParsedNotification::Unknown {
                    kind: n.to_string(),
                });
            }
        },
        other => {
            return Err(Error::malformed(format!(
                "notification type must be a string or number, got {}",
                other
            )));
        }
    };

    let destination_id = DestinationId::parse(&raw.destination_id)?;
    Ok(ParsedNotification::Known(Notification {
        kind,
        destination_id,
    }))
}

/// Delivery metadata, used for logging only
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryMetadata {
    /// Broker-assigned message id
    pub message_id: String,
    /// How many times this message has been delivered (1 on first delivery)
    #[serde(default = "default_delivery_count")]
    pub delivery_count: u32,
    /// When the message was enqueued
    #[serde(default = "Utc::now", alias = "enqueuedTimeUtc")]
    pub enqueued_at: DateTime<Utc>,
}

impl DeliveryMetadata {
    /// Metadata for a first delivery enqueued now
    pub fn new(message_id: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            delivery_count: default_delivery_count(),
            enqueued_at: Utc::now(),
        }
    }

    /// Set the delivery count
    pub fn with_delivery_count(mut self, delivery_count: u32) -> Self {
        self.delivery_count = delivery_count;
        self
    }
}

fn default_delivery_count() -> u32 {
    1
}

/// One delivery of a notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Raw notification body (JSON)
    pub body: String,
    /// Delivery metadata
    pub metadata: DeliveryMetadata,
}

impl Delivery {
    /// Create a delivery from a raw body
    pub fn new(body: impl Into<String>, metadata: DeliveryMetadata) -> Self {
        Self {
            body: body.into(),
            metadata,
        }
    }

    /// Create a delivery for a validated notification
    pub fn for_notification(notification: &Notification, metadata: DeliveryMetadata) -> Self {
        Self::new(notification.to_body(), metadata)
    }
}

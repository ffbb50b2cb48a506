//! In-process channel source

use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio_stream::Stream;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::warn;

use crate::model::Delivery;
use crate::traits::NotificationSource;

/// Source fed through an unbounded channel
///
/// The stream ends once every sender is dropped.
pub struct ChannelSource {
    rx: Arc<Mutex<Option<mpsc::UnboundedReceiver<Delivery>>>>,
}

impl ChannelSource {
    /// Create a source and the sender that feeds it
    pub fn new() -> (Self, mpsc::UnboundedSender<Delivery>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let source = Self {
            rx: Arc::new(Mutex::new(Some(rx))),
        };
        (source, tx)
    }
}

impl NotificationSource for ChannelSource {
    fn subscribe(&self) -> Pin<Box<dyn Stream<Item = Delivery> + Send + 'static>> {
        let rx = self
            .rx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();

        match rx {
            Some(rx) => Box::pin(UnboundedReceiverStream::new(rx)),
            None => {
                warn!("Channel source already subscribed, returning an empty stream");
                Box::pin(tokio_stream::empty())
            }
        }
    }

    fn source_name(&self) -> &'static str {
        "channel"
    }
}

//! Notification dispatcher
//!
//! The Dispatcher is responsible for:
//! - Consuming deliveries from a NotificationSource
//! - Parsing and validating notification bodies
//! - Running each notification as an independent unit on a bounded pool
//! - Reporting the disposition of every unit
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────┐
//! │ NotificationSource │─── Delivery ───┐
//! └────────────────────┘                │
//!                                       ▼
//!                              ┌──────────────┐
//!                              │  Dispatcher  │── DispatchEvent ──▶ monitor
//!                              └──────────────┘
//!                                       │  (≤ worker_concurrency units)
//!                                       ▼
//!                              ┌──────────────┐
//!                              │   Matcher    │
//!                              └──────────────┘
//! ```
//!
//! ## Dispositions
//!
//! - Insert/Delete handled (including benign skips) → `Completed`
//! - Unknown operation kind → `Dropped`, never retried
//! - Malformed body or id, store failure, partial application → `Failed`,
//!   carrying whether redelivery can succeed

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::{Semaphore, mpsc, oneshot};
use tokio::task::JoinSet;
use tokio_stream::StreamExt;
use tracing::{debug, error, info, warn};

use crate::config::DispatcherConfig;
use crate::error::{Error, Result};
use crate::matcher::{HandleOutcome, Matcher};
use crate::model::{
    Delivery, DestinationId, NotificationKind, ParsedNotification, parse_notification,
};
use crate::traits::NotificationSource;

/// Events emitted by the Dispatcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchEvent {
    /// Dispatcher started
    Started {
        worker_concurrency: usize,
    },

    /// A notification was handled
    Completed {
        message_id: String,
        destination_id: DestinationId,
        kind: NotificationKind,
        outcome: HandleOutcome,
    },

    /// A notification was discarded without handling
    Dropped {
        message_id: String,
        reason: String,
    },

    /// A notification failed
    Failed {
        message_id: String,
        error: String,
        retryable: bool,
    },

    /// Dispatcher stopped
    Stopped {
        reason: String,
    },
}

/// Final state of a single delivery
#[derive(Debug)]
pub enum Disposition {
    /// Handled; acknowledge the delivery
    Completed(HandleOutcome),
    /// Not handled and never will be; acknowledge the delivery
    Dropped {
        reason: String,
    },
    /// Not (fully) handled; redeliver if [`Error::is_retryable`]
    Failed(Error),
}

impl Disposition {
    /// Whether the delivery should be acknowledged
    pub fn is_settled(&self) -> bool {
        !matches!(self, Disposition::Failed(_))
    }
}

/// Notification dispatcher
///
/// ## Lifecycle
///
/// 1. Create with [`Dispatcher::new()`]
/// 2. Start with [`Dispatcher::run()`]
/// 3. Runs until the source is exhausted or a shutdown signal is received
/// 4. In-flight units are drained and the matching store is flushed
///
/// ## Load Resistance
///
/// - **Bounded worker pool**: at most `worker_concurrency` units in flight;
///   the source is not polled while the pool is saturated
/// - **Bounded event channel**: when full, events are dropped (logged)
pub struct Dispatcher {
    /// Handlers shared by all units
    matcher: Arc<Matcher>,

    /// Delivery source
    source: Box<dyn NotificationSource>,

    /// Maximum number of concurrent units
    worker_concurrency: usize,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<DispatchEvent>,
}

impl Dispatcher {
    /// Create a new dispatcher
    ///
    /// # Returns
    ///
    /// A tuple of (dispatcher, event_receiver) where event_receiver yields
    /// dispatch events
    pub fn new(
        source: Box<dyn NotificationSource>,
        matcher: Arc<Matcher>,
        config: &DispatcherConfig,
    ) -> Result<(Self, mpsc::Receiver<DispatchEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);

        let dispatcher = Self {
            matcher,
            source,
            worker_concurrency: config.worker_concurrency,
            event_tx: tx,
        };

        Ok((dispatcher, rx))
    }

    /// Run the dispatcher until the source ends or SIGINT is received
    pub async fn run(&self) -> Result<()> {
        self.run_internal(None).await
    }

    /// Run the dispatcher with a controlled shutdown signal
    ///
    /// With `None`, behaves like [`Dispatcher::run()`]. Embedders that manage
    /// OS signals themselves pass a receiver and fire it on shutdown.
    pub async fn run_with_shutdown(&self, shutdown_rx: Option<oneshot::Receiver<()>>) -> Result<()> {
        self.run_internal(shutdown_rx).await
    }

    async fn run_internal(&self, shutdown_rx: Option<oneshot::Receiver<()>>) -> Result<()> {
        self.emit_event(DispatchEvent::Started {
            worker_concurrency: self.worker_concurrency,
        });
        info!(
            "Dispatching notifications from {} with {} worker(s)",
            self.source.source_name(),
            self.worker_concurrency
        );

        let mut shutdown: Pin<Box<dyn Future<Output = ()> + Send>> = match shutdown_rx {
            Some(rx) => Box::pin(async move {
                let _ = rx.await;
            }),
            None => Box::pin(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    error!("Failed to listen for shutdown signal: {}", e);
                    std::future::pending::<()>().await;
                }
            }),
        };

        let permits = Arc::new(Semaphore::new(self.worker_concurrency));
        let mut workers = JoinSet::new();
        let mut deliveries = self.source.subscribe();

        let reason = loop {
            // Wait for a free worker before taking the next delivery
            let permit = tokio::select! {
                permit = Arc::clone(&permits).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break "Worker pool closed".to_string(),
                },
                _ = &mut shutdown => break "Shutdown signal".to_string(),
            };

            tokio::select! {
                delivery = deliveries.next() => {
                    let Some(delivery) = delivery else {
                        break "Source exhausted".to_string();
                    };
                    let matcher = Arc::clone(&self.matcher);
                    let event_tx = self.event_tx.clone();
                    workers.spawn(async move {
                        let _permit = permit;
                        let message_id = delivery.metadata.message_id.clone();
                        let (disposition, event) = process_delivery(&matcher, delivery).await;
                        report(&event_tx, &message_id, disposition, event);
                    });
                }

                Some(joined) = workers.join_next(), if !workers.is_empty() => {
                    drop(permit);
                    if let Err(e) = joined {
                        error!("Dispatch unit panicked: {}", e);
                    }
                }

                _ = &mut shutdown => break "Shutdown signal".to_string(),
            }
        };

        info!("{}, draining {} in-flight unit(s)", reason, workers.len());
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!("Dispatch unit panicked: {}", e);
            }
        }

        self.emit_event(DispatchEvent::Stopped { reason });

        // Flush before exiting
        self.matcher.matchings().flush().await?;
        info!("Matchings flushed, dispatcher stopped");

        Ok(())
    }

    /// Process a single delivery to completion
    ///
    /// For delivery mechanisms that invoke a handler per message. The
    /// returned disposition decides between acknowledge and redelivery.
    pub async fn dispatch(&self, delivery: Delivery) -> Disposition {
        let message_id = delivery.metadata.message_id.clone();
        let (disposition, event) = process_delivery(&self.matcher, delivery).await;
        self.emit_event(event);
        log_disposition(&message_id, &disposition);
        disposition
    }

    /// Emit a dispatch event
    fn emit_event(&self, event: DispatchEvent) {
        emit(&self.event_tx, event);
    }
}

/// Parse and handle one delivery
async fn process_delivery(matcher: &Matcher, delivery: Delivery) -> (Disposition, DispatchEvent) {
    let Delivery { body, metadata } = delivery;
    info!(
        "Received message {} (delivery {}, enqueued {})",
        metadata.message_id, metadata.delivery_count, metadata.enqueued_at
    );

    let notification = match parse_notification(&body) {
        Ok(ParsedNotification::Known(notification)) => notification,
        Ok(ParsedNotification::Unknown { kind }) => {
            let reason = Error::UnknownOperation(kind).to_string();
            let event = DispatchEvent::Dropped {
                message_id: metadata.message_id,
                reason: reason.clone(),
            };
            return (Disposition::Dropped { reason }, event);
        }
        Err(e) => {
            let event = failed_event(metadata.message_id, &e);
            return (Disposition::Failed(e), event);
        }
    };

    debug!(
        "Handling {} for {}",
        notification.kind, notification.destination_id
    );

    match matcher.handle(&notification).await {
        Ok(outcome) => {
            let event = DispatchEvent::Completed {
                message_id: metadata.message_id,
                destination_id: notification.destination_id,
                kind: notification.kind,
                outcome,
            };
            (Disposition::Completed(outcome), event)
        }
        Err(e) => {
            let event = failed_event(metadata.message_id, &e);
            (Disposition::Failed(e), event)
        }
    }
}

fn failed_event(message_id: String, error: &Error) -> DispatchEvent {
    DispatchEvent::Failed {
        message_id,
        error: error.to_string(),
        retryable: error.is_retryable(),
    }
}

fn report(
    event_tx: &mpsc::Sender<DispatchEvent>,
    message_id: &str,
    disposition: Disposition,
    event: DispatchEvent,
) {
    log_disposition(message_id, &disposition);
    emit(event_tx, event);
}

fn log_disposition(message_id: &str, disposition: &Disposition) {
    match disposition {
        Disposition::Completed(outcome) => {
            debug!("Message {} completed: {:?}", message_id, outcome);
        }
        Disposition::Dropped { reason } => {
            warn!("Message {} dropped: {}", message_id, reason);
        }
        Disposition::Failed(e) => {
            error!(
                "Message {} failed (retryable: {}): {}",
                message_id,
                e.is_retryable(),
                e
            );
        }
    }
}

fn emit(event_tx: &mpsc::Sender<DispatchEvent>, event: DispatchEvent) {
    // Processing never waits on a slow event consumer
    if event_tx.try_send(event).is_err() {
        warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
    }
}

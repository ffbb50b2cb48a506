// # matcherd - Destination Matcher Daemon
//
// The matcherd daemon is a thin integration layer over matcher-core:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Building the stores through the store registry
// 4. Dispatching JSON-lines notifications from stdin until EOF or a signal
//
// ## Configuration
//
// ### Store
// - `MATCHER_STORE_TYPE`: Store backend (memory, file). Default: memory
// - `MATCHER_STORE_PATH`: Path to the store file (for file)
//
// ### Dispatcher
// - `MATCHER_WORKER_CONCURRENCY`: Notifications processed concurrently (1-256)
// - `MATCHER_EVENT_CHANNEL_CAPACITY`: Dispatch event buffer size
//
// ### Other
// - `MATCHER_AUDIT_ON_START`: Audit the matching graph before dispatching
// - `MATCHER_LOG_LEVEL`: trace, debug, info, warn, error. Default: info
//
// ## Example
//
// ```bash
// export MATCHER_STORE_TYPE=file
// export MATCHER_STORE_PATH=/var/lib/matcher/store.json
// export MATCHER_AUDIT_ON_START=true
//
// queue-consumer | matcherd
// ```

use anyhow::{Context, Result};
use matcher_core::config::{DispatcherConfig, MAX_WORKER_CONCURRENCY, MatcherConfig, StoreConfig};
use matcher_core::engine::{DispatchEvent, Dispatcher};
use matcher_core::matcher::{Matcher, audit};
use matcher_core::registry::StoreRegistry;
use matcher_core::source::JsonLinesSource;
use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio::sync::oneshot;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum MatcherExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<MatcherExitCode> for ExitCode {
    fn from(code: MatcherExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
struct Config {
    store_type: String,
    store_path: Option<String>,
    worker_concurrency: Option<usize>,
    event_channel_capacity: Option<usize>,
    audit_on_start: bool,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Ok(Self {
            store_type: env::var("MATCHER_STORE_TYPE").unwrap_or_else(|_| "memory".to_string()),
            store_path: env::var("MATCHER_STORE_PATH").ok(),
            worker_concurrency: parse_var("MATCHER_WORKER_CONCURRENCY")?,
            event_channel_capacity: parse_var("MATCHER_EVENT_CHANNEL_CAPACITY")?,
            audit_on_start: env::var("MATCHER_AUDIT_ON_START")
                .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
            log_level: env::var("MATCHER_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        match self.store_type.as_str() {
            "memory" => {}
            "file" => match self.store_path.as_deref() {
                None | Some("") => anyhow::bail!(
                    "MATCHER_STORE_PATH is required when MATCHER_STORE_TYPE=file. \
                    Set it via: export MATCHER_STORE_PATH=/var/lib/matcher/store.json"
                ),
                Some(path) => {
                    if let Some(parent) = std::path::Path::new(path).parent()
                        && !parent.as_os_str().is_empty()
                        && !parent.exists()
                    {
                        anyhow::bail!(
                            "MATCHER_STORE_PATH parent directory does not exist: {}. \
                            Create it first: sudo mkdir -p {}",
                            parent.display(),
                            parent.display()
                        );
                    }
                }
            },
            other => anyhow::bail!(
                "MATCHER_STORE_TYPE '{}' is not supported. \
                Supported types: memory, file",
                other
            ),
        }

        if let Some(workers) = self.worker_concurrency
            && !(1..=MAX_WORKER_CONCURRENCY).contains(&workers)
        {
            anyhow::bail!(
                "MATCHER_WORKER_CONCURRENCY must be between 1 and {}. Got: {}",
                MAX_WORKER_CONCURRENCY,
                workers
            );
        }

        if self.event_channel_capacity == Some(0) {
            anyhow::bail!("MATCHER_EVENT_CHANNEL_CAPACITY must be greater than 0");
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "MATCHER_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }

    /// Build the core configuration
    fn matcher_config(&self) -> Result<MatcherConfig> {
        let store = match self.store_type.as_str() {
            "file" => StoreConfig::File {
                path: self.store_path.clone().unwrap_or_default(),
            },
            _ => StoreConfig::Memory,
        };

        let mut dispatcher = DispatcherConfig::default();
        if let Some(workers) = self.worker_concurrency {
            dispatcher = dispatcher.with_worker_concurrency(workers);
        }
        if let Some(capacity) = self.event_channel_capacity {
            dispatcher.event_channel_capacity = capacity;
        }

        let config = MatcherConfig { store, dispatcher };
        config.validate()?;
        Ok(config)
    }
}

/// Parse an optional numeric environment variable
fn parse_var(name: &str) -> Result<Option<usize>> {
    env::var(name)
        .ok()
        .map(|v| {
            v.trim()
                .parse()
                .with_context(|| format!("{} must be a positive integer. Got: {}", name, v))
        })
        .transpose()
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return MatcherExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return MatcherExitCode::ConfigError.into();
    }

    let matcher_config = match config.matcher_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration validation error: {}", e);
            return MatcherExitCode::ConfigError.into();
        }
    };

    // Initialize tracing
    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return MatcherExitCode::ConfigError.into();
    }

    info!("Starting matcherd daemon");
    info!(
        "Store: {}, workers: {}",
        matcher_config.store.type_name(),
        matcher_config.dispatcher.worker_concurrency
    );

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return MatcherExitCode::RuntimeError.into();
        }
    };

    let result = block_on_with_grace(rt, RUNTIME_SHUTDOWN_GRACE, async {
        if let Err(e) = run_daemon(matcher_config, config.audit_on_start).await {
            error!("Daemon error: {:#}", e);
            MatcherExitCode::RuntimeError
        } else {
            MatcherExitCode::CleanShutdown
        }
    });

    result.into()
}

/// How long blocking tasks (the stdin reader) may delay process exit
const RUNTIME_SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Drive `future` to completion, then shut the runtime down without waiting
/// longer than `grace` for blocking tasks that cannot be cancelled
fn block_on_with_grace<F: std::future::Future>(rt: Runtime, grace: Duration, future: F) -> F::Output {
    let output = rt.block_on(future);
    rt.shutdown_timeout(grace);
    output
}

/// Run the daemon
async fn run_daemon(config: MatcherConfig, audit_on_start: bool) -> Result<()> {
    let registry = StoreRegistry::with_builtin();
    let stores = registry
        .create(&config.store)
        .await
        .context("Failed to create stores")?;

    if audit_on_start {
        let violations = audit(stores.destinations.as_ref(), stores.matchings.as_ref()).await?;
        if violations.is_empty() {
            info!("Startup audit: matching graph is consistent");
        } else {
            warn!("Startup audit found {} violation(s)", violations.len());
            for violation in &violations {
                warn!("  {}", violation);
            }
        }
    }

    let matcher = Arc::new(Matcher::from_handles(&stores));
    let source = JsonLinesSource::with_name(tokio::io::BufReader::new(tokio::io::stdin()), "stdin");
    let (dispatcher, events) = Dispatcher::new(Box::new(source), matcher, &config.dispatcher)?;

    let monitor = tokio::spawn(log_events(events));

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let signals = tokio::spawn(async move {
        match wait_for_shutdown().await {
            Ok(signal) => info!("Received shutdown signal: {}", signal),
            Err(e) => {
                // Without signal handlers, run until stdin ends
                error!("Shutdown handler error: {}", e);
                std::future::pending::<()>().await;
            }
        }
        let _ = shutdown_tx.send(());
    });

    info!("Dispatching notifications from stdin");
    let result = dispatcher.run_with_shutdown(Some(shutdown_rx)).await;
    signals.abort();

    // Closing the event channel ends the monitor
    drop(dispatcher);
    let failed = monitor.await.unwrap_or_else(|e| {
        error!("Event monitor failed: {}", e);
        0
    });

    result?;
    if failed > 0 {
        warn!("{} notification(s) failed and need redelivery", failed);
    }
    info!("Shutting down daemon");
    Ok(())
}

/// Log dispatch events, returning the number of failed notifications
async fn log_events(mut events: tokio::sync::mpsc::Receiver<DispatchEvent>) -> usize {
    let mut failed = 0;
    while let Some(event) = events.recv().await {
        match event {
            DispatchEvent::Started { worker_concurrency } => {
                debug!("Dispatcher started with {} worker(s)", worker_concurrency);
            }
            DispatchEvent::Completed {
                message_id,
                destination_id,
                kind,
                outcome,
            } => {
                debug!(
                    "{} {} (message {}): {:?}",
                    kind, destination_id, message_id, outcome
                );
            }
            DispatchEvent::Dropped { message_id, reason } => {
                debug!("Message {} dropped: {}", message_id, reason);
            }
            DispatchEvent::Failed {
                message_id,
                error,
                retryable,
            } => {
                failed += 1;
                debug!(
                    "Message {} failed (retryable: {}): {}",
                    message_id, retryable, error
                );
            }
            DispatchEvent::Stopped { reason } => {
                debug!("Dispatcher stopped: {}", reason);
            }
        }
    }
    failed
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}

//! Configuration file watcher for hot reload.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::parse_config;
use crate::config::schema::GatewayConfig;

/// What a single change notification led to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reload {
    /// A validated config was handed to the server.
    Forwarded { backends: usize },
    /// The file content matches the last forwarded config.
    Unchanged,
    /// Read, parse or validation failed; the running catalog stays.
    Rejected,
    /// The server side of the channel is gone.
    Closed,
}

/// A watcher that monitors the configuration file for changes.
///
/// Only configurations that pass validation are forwarded; a broken edit
/// leaves the running catalog untouched.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<GatewayConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and a receiver for validated configs.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<GatewayConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching the file. The returned watcher must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx;
        let path = self.path.clone();
        // Seeded with the content the server started from, so the first
        // spurious event after startup is not a reload.
        let mut last_forwarded = fs::read_to_string(&path).ok();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                    match reload(&path, &tx, &mut last_forwarded) {
                        Reload::Forwarded { backends } => tracing::info!(backends, "Config reloaded"),
                        Reload::Closed => tracing::debug!("Config receiver dropped; ignoring file change"),
                        Reload::Unchanged | Reload::Rejected => {}
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}

fn reload(
    path: &Path,
    tx: &mpsc::UnboundedSender<GatewayConfig>,
    last_forwarded: &mut Option<String>,
) -> Reload {
    if tx.is_closed() {
        return Reload::Closed;
    }

    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            tracing::error!(path = ?path, error = %e, "Failed to read config; keeping current catalog");
            return Reload::Rejected;
        }
    };
    if last_forwarded.as_deref() == Some(content.as_str()) {
        return Reload::Unchanged;
    }

    let config = match parse_config(&content) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(path = ?path, error = %e, "Rejected config edit; keeping current catalog");
            return Reload::Rejected;
        }
    };

    let backends = config.backends.len();
    if tx.send(config).is_err() {
        tracing::warn!("Config receiver dropped before reload could be applied");
        return Reload::Closed;
    }
    *last_forwarded = Some(content);
    Reload::Forwarded { backends }
}

//! Hot reload of route tables.
//!
//! The parent directory is watched rather than the file itself, so saves
//! that replace the file through a rename keep being observed.

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::compile::compile_routes;
use crate::config::loader::{load_config, ConfigError};
use crate::config::schema::{InstanceConfig, RouterConfig};
use crate::router::RoutingMode;
use crate::routing::path::normalize_candidate;
use crate::routing::{PatternError, RouteTable};

/// A reloaded config with every router's table already compiled.
#[derive(Debug, Clone)]
pub struct ConfigUpdate {
    pub config: RouterConfig,
    /// One table per `[[routers]]` entry, in file order.
    pub tables: Vec<Arc<RouteTable>>,
}

impl ConfigUpdate {
    /// Compile every router's routes. Fails on the first table that does
    /// not compile, so a partial update is never emitted.
    pub fn compile(config: RouterConfig) -> Result<Self, PatternError> {
        let tables = config
            .routers
            .iter()
            .map(|router| compile_routes(&router.routes).map(Arc::new))
            .collect::<Result<Vec<_>, PatternError>>()?;
        Ok(Self { config, tables })
    }

    /// The router config and table for an instance, matched by mode and
    /// normalized base path.
    pub fn table_for(
        &self,
        mode: RoutingMode,
        base_path: &str,
    ) -> Option<(&InstanceConfig, Arc<RouteTable>)> {
        let base_path = normalize_candidate(base_path);
        self.config
            .routers
            .iter()
            .zip(&self.tables)
            .find(|(router, _)| router.mode == mode && normalize_candidate(&router.base_path) == base_path)
            .map(|(router, table)| (router, table.clone()))
    }
}

/// Why a detected change did not produce an update.
#[derive(Debug, Error)]
pub enum ReloadError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("routes failed to compile: {0}")]
    Compile(#[from] PatternError),
}

/// Load, validate and compile the config at `path`.
pub fn reload(path: &Path) -> Result<ConfigUpdate, ReloadError> {
    let config = load_config(path)?;
    Ok(ConfigUpdate::compile(config)?)
}

/// Monitors the configuration file and sends every successfully
/// compiled update down a channel.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<ConfigUpdate>,
}

impl ConfigWatcher {
    /// Returns the watcher and a receiver for configuration updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<ConfigUpdate>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        (
            Self {
                path: path.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching. The returned watcher must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx;
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if touches(&event, &path) => {
                    tracing::info!(path = ?path, kind = ?event.kind, "Config change detected, reloading");
                    match reload(&path) {
                        Ok(update) => {
                            tracing::debug!(routers = update.tables.len(), "Compiled reloaded routes");
                            let _ = tx.send(update);
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to reload config, keeping current routes");
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = ?e, "Watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(watch_root(&self.path), RecursiveMode::NonRecursive)?;
        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}

fn watch_root(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Whether `event` may have changed the file at `path`. Removals are
/// ignored: a rename-save follows them with a create.
fn touches(event: &Event, path: &Path) -> bool {
    if !(event.kind.is_modify() || event.kind.is_create()) {
        return false;
    }
    let Some(name) = path.file_name() else {
        return false;
    };
    event.paths.iter().any(|p| p.file_name() == Some(name))
}

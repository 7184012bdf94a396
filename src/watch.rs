//! Source repository watcher.
//!
//! Rebuilds the whole catalog every time the source tree settles after a
//! change. There is no incremental mode: each batch of events triggers the
//! same full regeneration as `build`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use notify::RecursiveMode;
use notify_debouncer_mini::new_debouncer;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::catalog::{self, BuildContext, BuildReport};

/// Errors that can occur with the watcher
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("Source repository does not exist: {0}")]
    SourceNotFound(PathBuf),

    #[error("Notify error: {0}")]
    Notify(#[from] notify::Error),
}

/// Watches a source repository and regenerates its catalog
#[derive(Debug, Clone)]
pub struct CatalogWatcher {
    ctx: BuildContext,
    debounce: Duration,
}

impl CatalogWatcher {
    pub fn new(ctx: BuildContext, debounce_ms: u64) -> Self {
        Self {
            ctx,
            debounce: Duration::from_millis(debounce_ms),
        }
    }

    /// Check that the source root exists
    pub fn validate(&self) -> Result<(), WatchError> {
        if !self.ctx.source_root.is_dir() {
            return Err(WatchError::SourceNotFound(self.ctx.source_root.clone()));
        }
        Ok(())
    }

    /// Whether a change at `path` should trigger a rebuild.
    ///
    /// Changes inside the output tree (which may live below the source root)
    /// and inside hidden entries are ignored.
    pub fn is_relevant(&self, path: &Path) -> bool {
        if path.starts_with(&self.ctx.output_root) {
            return false;
        }

        let relative = path.strip_prefix(&self.ctx.source_root).unwrap_or(path);
        !relative
            .components()
            .any(|c| c.as_os_str().to_string_lossy().starts_with('.'))
    }

    /// Start watching. Every completed rebuild is sent on the returned channel.
    pub fn watch(&self) -> Result<(mpsc::Receiver<BuildReport>, WatchHandle), WatchError> {
        self.validate()?;

        let (report_tx, report_rx) = mpsc::channel::<BuildReport>(16);
        let (stop_tx, mut stop_rx) = mpsc::channel::<()>(1);

        let watcher = self.clone();
        let task = tokio::spawn(async move {
            if let Err(e) = run_watcher(&watcher, report_tx, &mut stop_rx).await {
                tracing::error!("Watcher error: {}", e);
            }
        });

        Ok((report_rx, WatchHandle { stop_tx, task }))
    }
}

/// Handle to control the watcher
pub struct WatchHandle {
    stop_tx: mpsc::Sender<()>,
    task: tokio::task::JoinHandle<()>,
}

impl WatchHandle {
    /// Stop the watcher
    pub async fn stop(self) -> Result<()> {
        let _ = self.stop_tx.send(()).await;
        self.task.await?;
        Ok(())
    }
}

/// Run one full build off the async runtime
pub async fn rebuild(ctx: BuildContext) -> Result<BuildReport> {
    let report = tokio::task::spawn_blocking(move || catalog::build(&ctx)).await??;
    Ok(report)
}

async fn run_watcher(
    watcher: &CatalogWatcher,
    report_tx: mpsc::Sender<BuildReport>,
    stop_rx: &mut mpsc::Receiver<()>,
) -> Result<(), WatchError> {
    let (tx, rx) = std::sync::mpsc::channel();

    let mut debouncer = new_debouncer(watcher.debounce, tx)?;
    debouncer
        .watcher()
        .watch(&watcher.ctx.source_root, RecursiveMode::Recursive)?;

    tracing::info!("Watching {} for changes", watcher.ctx.source_root.display());

    loop {
        if stop_rx.try_recv().is_ok() {
            tracing::info!("Watcher stopping...");
            break;
        }

        let changed = match rx.recv_timeout(Duration::from_millis(200)) {
            Ok(Ok(events)) => events.iter().any(|event| watcher.is_relevant(&event.path)),
            Ok(Err(e)) => {
                tracing::warn!("Watcher error: {:?}", e);
                false
            }
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => false,
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
                tracing::error!("Watcher channel disconnected");
                break;
            }
        };

        if changed {
            tracing::info!("Source changed, rebuilding catalog");
            match rebuild(watcher.ctx.clone()).await {
                Ok(report) => {
                    let _ = report_tx.send(report).await;
                }
                Err(e) => tracing::error!("Rebuild failed: {:#}", e),
            }
        }

        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    Ok(())
}

// Diagnostic side file: the raw body of the latest response is written to
// disk so a failed run can be inspected afterwards. Nothing reads it back.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::warn;

#[derive(Debug, Clone, Default)]
pub struct ResponseLog {
    path: Option<PathBuf>,
    write_lock: Arc<Mutex<()>>,
}

impl ResponseLog {
    pub fn new(path: Option<PathBuf>) -> Self {
        ResponseLog {
            path,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// A log that never touches the filesystem.
    pub fn disabled() -> Self {
        ResponseLog::new(None)
    }

    /// Overwrite the log file with `body`. Empty bodies are ignored and
    /// write failures only produce a warning.
    pub async fn record(&self, body: &str) {
        let Some(path) = &self.path else {
            return;
        };
        if body.is_empty() {
            return;
        }
        let _guard = self.write_lock.lock().await;
        if let Err(e) = tokio::fs::write(path, body).await {
            warn!("[ResponseLog] could not write {}: {}", path.display(), e);
        }
    }
}

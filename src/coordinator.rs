// Run coordinator: reads credentials, logs in once and then runs one folder
// task per configured asset kind. Folders are independent of each other;
// within a folder the remote listing always completes before any upload.

use std::collections::BTreeMap;
use std::sync::Arc;

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::api::Transport;
use crate::config::{AssetKind, UploadOptions};
use crate::error::CmsError;
use crate::folder::{FolderOrchestrator, FolderReport};
use crate::inventory::{Inventory, RemoteFileRecord};
use crate::response_log::ResponseLog;
use crate::session::SessionManager;
use crate::ui::CredentialSource;

/// Outcome of every folder that was started.
#[derive(Debug, Default)]
pub struct RunReport {
    pub folders: BTreeMap<AssetKind, Result<FolderReport, CmsError>>,
}

impl RunReport {
    pub fn uploaded(&self) -> usize {
        self.folders
            .values()
            .filter_map(|r| r.as_ref().ok())
            .map(|r| r.completed.len())
            .sum()
    }

    /// First failure, in asset-kind order.
    pub fn first_failure(&self) -> Option<&CmsError> {
        self.folders.values().find_map(|r| match r {
            Err(e) => Some(e),
            Ok(report) => report.first_failure(),
        })
    }

    /// Success, or the first failure of the run.
    pub fn into_result(self) -> Result<(), CmsError> {
        for (_, folder) in self.folders {
            folder?.into_result()?;
        }
        Ok(())
    }
}

pub struct RunCoordinator {
    options: Arc<UploadOptions>,
    transport: Arc<dyn Transport>,
    progress: MultiProgress,
}

impl RunCoordinator {
    pub fn new(options: UploadOptions, transport: Arc<dyn Transport>) -> Self {
        RunCoordinator {
            options: Arc::new(options),
            transport,
            progress: MultiProgress::new(),
        }
    }

    /// Suppress progress bars (tests, non-interactive runs).
    pub fn without_progress(mut self) -> Self {
        self.progress = MultiProgress::with_draw_target(ProgressDrawTarget::hidden());
        self
    }

    /// Execute the whole upload. `Err` means the run could not start
    /// (configuration, login); per-folder failures are in the report.
    pub async fn run(&self, credentials: &dyn CredentialSource) -> Result<RunReport, CmsError> {
        if self.options.node_id.is_none() {
            return Err(CmsError::Config("nodeId not provided!".into()));
        }
        for kind in self.options.unmapped_kinds() {
            warn!("[Run] {}FolderId not provided, skipping {}", kind, kind);
        }
        let kinds = self.options.source_kinds();
        if kinds.is_empty() {
            warn!("[Run] No source folder provided! You have to specify at least one folder!");
            return Ok(RunReport::default());
        }

        let login = credentials.credentials(&self.options)?;
        let response_log = ResponseLog::new(self.options.response_log.clone());
        let sessions = Arc::new(SessionManager::new(
            self.transport.clone(),
            &self.options.rest_root(),
            response_log.clone(),
        ));
        sessions.login(&login.username, &login.password).await?;

        let mut tasks = JoinSet::new();
        for kind in kinds {
            let sessions = sessions.clone();
            let options = self.options.clone();
            let bar = self.progress.add(folder_bar());
            tasks.spawn(async move {
                let (result, records) = run_folder(sessions, options, kind, bar).await;
                (kind, result, records)
            });
        }

        let mut report = RunReport::default();
        let mut listed: Vec<RemoteFileRecord> = Vec::new();
        let mut aborted = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((kind, result, records)) => {
                    listed.extend(records);
                    report.folders.insert(kind, result);
                }
                Err(e) => {
                    error!("[Run] folder task aborted: {}", e);
                    aborted.get_or_insert(CmsError::Aborted(e.to_string()));
                }
            }
        }

        if self.options.logout {
            sessions.logout().await;
        }
        match serde_json::to_string(&listed) {
            Ok(json) => response_log.record(&json).await,
            Err(e) => warn!("[Run] could not serialize remote listing: {}", e),
        }

        if let Some(e) = aborted {
            return Err(e);
        }
        summarize(&report);
        Ok(report)
    }
}

/// List the remote folder, then push the local one.
async fn run_folder(
    sessions: Arc<SessionManager>,
    options: Arc<UploadOptions>,
    kind: AssetKind,
    bar: ProgressBar,
) -> (Result<FolderReport, CmsError>, Vec<RemoteFileRecord>) {
    let inventory = match options.folder_id(kind) {
        Some(folder_id) => match Inventory::list(&sessions, kind, folder_id).await {
            Ok(inventory) => inventory,
            Err(e) => {
                bar.abandon();
                return (Err(e), Vec::new());
            }
        },
        // only mapped kinds are started; the orchestrator still guards this
        None => Inventory::default(),
    };

    let orchestrator = FolderOrchestrator::new(sessions, options);
    let result = orchestrator.process(kind, &inventory, &bar).await;
    if result.is_err() {
        bar.abandon();
    }
    (result, inventory.records().to_vec())
}

fn folder_bar() -> ProgressBar {
    let style = ProgressStyle::with_template("{spinner} {msg:8} [{bar:30}] {pos}/{len}")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    ProgressBar::new(0).with_style(style)
}

fn summarize(report: &RunReport) {
    for (kind, folder) in &report.folders {
        match folder {
            Ok(r) if r.failures.is_empty() => info!("[Run] {}: {} pushed", kind, r.completed.len()),
            Ok(r) => warn!(
                "[Run] {}: {} pushed, {} failed",
                kind,
                r.completed.len(),
                r.failures.len()
            ),
            Err(e) => error!("[Run] {}: {}", kind, e),
        }
    }
    info!("[Run] {} files pushed in total", report.uploaded());
}

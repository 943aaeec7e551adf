// Folder orchestrator: pushes every visible file of one local asset folder,
// all files of the folder concurrently. One failing file does not stop its
// siblings; the folder reports the first failure once everything settled.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::join_all;
use indicatif::ProgressBar;
use tracing::{debug, error, info, warn};

use crate::config::{AssetKind, UploadOptions};
use crate::error::CmsError;
use crate::inventory::Inventory;
use crate::page::PageMerger;
use crate::session::SessionManager;
use crate::uploader::FileUploader;

const HIDDEN_MARKER: char = '.';

#[derive(Debug)]
pub struct FolderReport {
    pub kind: AssetKind,
    /// Names of files that were pushed successfully.
    pub completed: Vec<String>,
    /// Per-file failures, in local listing order.
    pub failures: Vec<CmsError>,
}

impl FolderReport {
    pub fn first_failure(&self) -> Option<&CmsError> {
        self.failures.first()
    }

    pub fn into_result(mut self) -> Result<Vec<String>, CmsError> {
        if self.failures.is_empty() {
            Ok(self.completed)
        } else {
            Err(self.failures.swap_remove(0))
        }
    }
}

pub struct FolderOrchestrator {
    sessions: Arc<SessionManager>,
    options: Arc<UploadOptions>,
}

impl FolderOrchestrator {
    pub fn new(sessions: Arc<SessionManager>, options: Arc<UploadOptions>) -> Self {
        FolderOrchestrator { sessions, options }
    }

    /// Push every visible file of the `kind` source folder. `inventory` must
    /// be the listing of the kind's remote folder.
    pub async fn process(
        &self,
        kind: AssetKind,
        inventory: &Inventory,
        progress: &ProgressBar,
    ) -> Result<FolderReport, CmsError> {
        let folder_id = self
            .options
            .folder_id(kind)
            .ok_or_else(|| CmsError::Config(format!("{}FolderId not provided!", kind)))?;
        let node_id = self
            .options
            .node_id
            .as_deref()
            .ok_or_else(|| CmsError::Config("nodeId not provided!".into()))?;
        let local = self
            .options
            .local_path(kind)
            .ok_or_else(|| CmsError::Config(format!("no local {} folder configured", kind)))?;

        if !tokio::fs::try_exists(local).await.unwrap_or(false) {
            warn!("[Folder] Folder '{}' does not exist!", local.display());
            return Err(CmsError::Path {
                kind,
                path: local.to_path_buf(),
            });
        }

        let entries = visible_files(local).await?;
        info!("[Folder] {} {} to push from {}", entries.len(), kind, local.display());
        progress.set_length(entries.len() as u64);
        progress.set_message(kind.to_string());

        let uploader = FileUploader::new(self.sessions.clone(), node_id);
        let merger = PageMerger::new(
            self.sessions.clone(),
            node_id,
            folder_id,
            self.options.template_id.clone(),
            local,
        );

        let pushes = entries.iter().map(|name| {
            let uploader = &uploader;
            let merger = &merger;
            async move {
                let result = if kind.is_page_based() {
                    merger.merge(inventory, name).await.map(|o| o.file_name)
                } else {
                    uploader
                        .upload(inventory, &local.join(name), folder_id)
                        .await
                        .map(|o| o.file_name)
                };
                progress.inc(1);
                result
            }
        });

        let mut report = FolderReport {
            kind,
            completed: Vec::new(),
            failures: Vec::new(),
        };
        for result in join_all(pushes).await {
            match result {
                Ok(name) => report.completed.push(name),
                Err(e) => {
                    error!("[Folder] {}", e);
                    report.failures.push(e);
                }
            }
        }
        progress.finish();

        if report.failures.is_empty() {
            info!("[Folder] All {} uploaded!", kind);
        }
        Ok(report)
    }
}

/// Regular files of `dir` whose name does not start with the hidden marker,
/// sorted by name. Sub-directories are not descended into; entries that
/// cannot be inspected are kept so their own push fails.
pub async fn visible_files(dir: &Path) -> Result<Vec<String>, CmsError> {
    let mut read_dir = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| CmsError::io(dir, e))?;
    let mut names = Vec::new();
    while let Some(entry) = read_dir
        .next_entry()
        .await
        .map_err(|e| CmsError::io(dir, e))?
    {
        let Ok(name) = entry.file_name().into_string() else {
            warn!("[Folder] skipping non UTF-8 entry in {}", dir.display());
            continue;
        };
        if name.starts_with(HIDDEN_MARKER) {
            continue;
        }
        let path: PathBuf = entry.path();
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => names.push(name),
            Ok(_) => debug!("[Folder] skipping {} (not a file)", path.display()),
            // e.g. a dangling symlink: the push of this entry reports it
            Err(e) => {
                warn!("[Folder] cannot stat {}: {}", path.display(), e);
                names.push(name);
            }
        }
    }
    names.sort();
    Ok(names)
}

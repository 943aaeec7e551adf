// File uploader: pushes one binary asset (image, script, font) as a
// multipart request, to the create endpoint for new names and to the save
// endpoint of the existing record otherwise.
//
// The inventory is a pre-run snapshot and is not updated after a create,
// so two local files with the same name in one run are both created.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use crate::api::{FormField, Method, Payload};
use crate::error::CmsError;
use crate::inventory::Inventory;
use crate::session::SessionManager;

/// Which endpoint a file goes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadTarget {
    Create,
    Update(String),
}

impl UploadTarget {
    pub fn resolve(inventory: &Inventory, file_name: &str) -> Self {
        match inventory.find(file_name) {
            Some(existing) => UploadTarget::Update(existing.id.clone()),
            None => UploadTarget::Create,
        }
    }

    pub fn path(&self) -> String {
        match self {
            UploadTarget::Create => "file/create".to_string(),
            UploadTarget::Update(id) => format!("file/save/{}", id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    pub file_name: String,
    pub target: UploadTarget,
}

pub struct FileUploader {
    sessions: Arc<SessionManager>,
    node_id: String,
}

impl FileUploader {
    pub fn new(sessions: Arc<SessionManager>, node_id: impl Into<String>) -> Self {
        FileUploader {
            sessions,
            node_id: node_id.into(),
        }
    }

    /// Upload `file` into remote folder `folder_id`.
    pub async fn upload(
        &self,
        inventory: &Inventory,
        file: &Path,
        folder_id: &str,
    ) -> Result<UploadOutcome, CmsError> {
        let file_name = file
            .file_name()
            .and_then(|s| s.to_str())
            .ok_or_else(|| CmsError::Config(format!("unusable file name: {}", file.display())))?
            .to_string();

        self.push(inventory, file, &file_name, folder_id)
            .await
            .map_err(|e| CmsError::upload(&file_name, e))
    }

    async fn push(
        &self,
        inventory: &Inventory,
        file: &Path,
        file_name: &str,
        folder_id: &str,
    ) -> Result<UploadOutcome, CmsError> {
        let target = UploadTarget::resolve(inventory, file_name);
        let metadata = tokio::fs::metadata(file)
            .await
            .map_err(|e| CmsError::io(file, e))?;
        let mime = mime_for_path(file);
        debug!(
            "[Uploader] {} -> {} ({} bytes, {})",
            file_name,
            target.path(),
            metadata.len(),
            mime
        );

        let sid = self
            .sessions
            .session()
            .sid()
            .ok_or(CmsError::NotAuthenticated)?
            .to_string();
        let fields = vec![
            FormField::text("sid", sid),
            FormField::text("name", file_name),
            FormField::text("folderId", folder_id),
            FormField::text("nodeId", self.node_id.as_str()),
            FormField::text("fileName", file_name),
            FormField::File {
                name: "fileBinaryData".to_string(),
                path: file.to_path_buf(),
                file_name: file_name.to_string(),
                mime: mime.to_string(),
                size: metadata.len(),
            },
        ];

        self.sessions
            .call(Method::Post, &target.path(), Payload::Multipart(fields))
            .await?;

        match &target {
            UploadTarget::Create => info!("[Uploader] created {}", file_name),
            UploadTarget::Update(id) => info!("[Uploader] updated {} (id {})", file_name, id),
        }
        Ok(UploadOutcome {
            file_name: file_name.to_string(),
            target,
        })
    }
}

/// MIME type guessed from the file extension.
pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("js") | Some("mjs") => "application/javascript",
        Some("css") => "text/css",
        Some("html") | Some("htm") => "text/html",
        Some("json") | Some("map") => "application/json",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("ico") => "image/x-icon",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",
        Some("otf") => "font/otf",
        Some("eot") => "application/vnd.ms-fontobject",
        _ => "application/octet-stream",
    }
}

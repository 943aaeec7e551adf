// Error taxonomy shared by every component. Component operations return
// `CmsError` to their direct caller; only the run coordinator decides
// whether a failure ends the whole run.

use std::path::PathBuf;

use crate::config::AssetKind;

#[derive(Debug, thiserror::Error)]
pub enum CmsError {
    /// Bad credentials, or a login response without a `user`.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// An authenticated call was attempted before a session id was issued.
    #[error("No CMS session established; login must succeed first")]
    NotAuthenticated,

    /// The request could not be sent, or its body could not be read/parsed.
    #[error("Request to {path} failed: {reason}")]
    Transport { path: String, reason: String },

    /// The server answered with a non-success status code.
    #[error("Request to {path} failed: HTTP {status} - {body}")]
    Http {
        path: String,
        status: u16,
        body: String,
    },

    /// The server answered 2xx but reported a failure in `responseInfo`.
    #[error("CMS rejected {path}: {message}")]
    Server { path: String, message: String },

    #[error("Upload of '{file}' failed: {source}")]
    Upload {
        file: String,
        #[source]
        source: Box<CmsError>,
    },

    /// A response did not have any of the expected fields.
    #[error("Unexpected response shape from {path}: {detail}")]
    ResponseShape { path: String, detail: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Folder '{}' for {kind} does not exist", path.display())]
    Path { kind: AssetKind, path: PathBuf },

    /// A folder task panicked or was cancelled.
    #[error("Folder task aborted: {0}")]
    Aborted(String),

    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CmsError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CmsError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn upload(file: impl Into<String>, source: CmsError) -> Self {
        match source {
            // Avoid nesting when a page step already wrapped the failure.
            already @ CmsError::Upload { .. } => already,
            other => CmsError::Upload {
                file: file.into(),
                source: Box::new(other),
            },
        }
    }
}

// Library root
// -----------
// Uploads local asset folders (images, scripts, fonts, stylesheets) into a
// Gentics CMS through its REST API. The binary (`main.rs`) only parses the
// command line and hands the options to the run coordinator.
//
// Module responsibilities:
// - `api`: the HTTP transport seam and its reqwest implementation.
// - `session`: login/logout and every authenticated call (sid + cookie).
// - `inventory`: snapshot of a remote folder, decides create vs. update.
// - `uploader`: multipart upload of a single binary file.
// - `page`: merges a stylesheet into the `_css` tag of a CMS page.
// - `folder`: pushes all files of one local folder concurrently.
// - `coordinator`: drives a whole run across all configured folders.
// - `ui`: terminal credential prompts.
// - `config`, `error`, `serialization`, `response_log`: shared plumbing.
pub mod api;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod folder;
pub mod inventory;
pub mod page;
pub mod response_log;
pub mod serialization;
pub mod session;
pub mod ui;
pub mod uploader;

#[cfg(test)]
mod test_support;

pub use config::{AssetKind, UploadOptions};
pub use coordinator::{RunCoordinator, RunReport};
pub use error::CmsError;

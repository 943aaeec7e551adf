// Run configuration: the upload options file plus the asset kinds it can
// describe. Options are immutable once the run starts.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::serialization::deserialize_opt_id;

/// The four kinds of assets the task knows how to push.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AssetKind {
    Images,
    Scripts,
    Fonts,
    Styles,
}

impl AssetKind {
    pub const ALL: [AssetKind; 4] = [
        AssetKind::Images,
        AssetKind::Scripts,
        AssetKind::Fonts,
        AssetKind::Styles,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Images => "images",
            AssetKind::Scripts => "scripts",
            AssetKind::Fonts => "fonts",
            AssetKind::Styles => "styles",
        }
    }

    /// Styles are merged into CMS pages instead of being uploaded as files.
    pub fn is_page_based(&self) -> bool {
        matches!(self, AssetKind::Styles)
    }

    /// REST path (below `/<app>/rest/`) listing the remote folder content.
    pub fn listing_path(&self, folder_id: &str) -> String {
        match self {
            AssetKind::Images => format!("folder/getImages/{}", folder_id),
            AssetKind::Scripts | AssetKind::Fonts => format!("folder/getFiles/{}", folder_id),
            AssetKind::Styles => format!("folder/getPages/{}", folder_id),
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options recognized by the upload task. Field names follow the
/// camelCase keys of the JSON options file (`imagesFolderId`, ...).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UploadOptions {
    pub host: String,
    /// CMS application root, the first path segment of every endpoint.
    pub app_root: String,
    #[serde(deserialize_with = "deserialize_opt_id")]
    pub node_id: Option<String>,

    pub images: Option<PathBuf>,
    pub scripts: Option<PathBuf>,
    pub fonts: Option<PathBuf>,
    pub styles: Option<PathBuf>,

    #[serde(deserialize_with = "deserialize_opt_id")]
    pub images_folder_id: Option<String>,
    #[serde(deserialize_with = "deserialize_opt_id")]
    pub scripts_folder_id: Option<String>,
    #[serde(deserialize_with = "deserialize_opt_id")]
    pub fonts_folder_id: Option<String>,
    #[serde(deserialize_with = "deserialize_opt_id")]
    pub styles_folder_id: Option<String>,

    /// Template used when a style page has to be created.
    #[serde(deserialize_with = "deserialize_opt_id")]
    pub template_id: Option<String>,

    pub username_prompt: String,
    pub password_prompt: String,
    pub password_replace_char: String,

    /// Side file receiving the raw body of every response; `null` disables it.
    pub response_log: Option<PathBuf>,
    pub logout: bool,
}

impl Default for UploadOptions {
    fn default() -> Self {
        UploadOptions {
            host: "http://ecms.swarovski.com".into(),
            app_root: "CNPortletapp".into(),
            node_id: None,
            images: None,
            scripts: None,
            fonts: None,
            styles: None,
            images_folder_id: None,
            scripts_folder_id: None,
            fonts_folder_id: None,
            styles_folder_id: None,
            template_id: None,
            username_prompt: "Username: ".into(),
            password_prompt: "Password: ".into(),
            password_replace_char: "*".into(),
            response_log: Some(PathBuf::from("log.json")),
            logout: true,
        }
    }
}

impl UploadOptions {
    /// Load options from a JSON file. Keys that are absent keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let options: UploadOptions = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(options)
    }

    /// Load from `./upload.json`, then `~/.gentics-upload.json`, falling
    /// back to defaults when neither exists.
    pub fn load_default() -> Result<Self> {
        match default_config_paths().into_iter().find(|p| p.exists()) {
            Some(path) => Self::load(&path),
            None => Ok(UploadOptions::default()),
        }
    }

    pub fn local_path(&self, kind: AssetKind) -> Option<&Path> {
        match kind {
            AssetKind::Images => self.images.as_deref(),
            AssetKind::Scripts => self.scripts.as_deref(),
            AssetKind::Fonts => self.fonts.as_deref(),
            AssetKind::Styles => self.styles.as_deref(),
        }
    }

    pub fn folder_id(&self, kind: AssetKind) -> Option<&str> {
        match kind {
            AssetKind::Images => self.images_folder_id.as_deref(),
            AssetKind::Scripts => self.scripts_folder_id.as_deref(),
            AssetKind::Fonts => self.fonts_folder_id.as_deref(),
            AssetKind::Styles => self.styles_folder_id.as_deref(),
        }
    }

    /// Kinds with both a local source folder and a remote folder id, in run order.
    pub fn source_kinds(&self) -> Vec<AssetKind> {
        AssetKind::ALL
            .into_iter()
            .filter(|k| self.local_path(*k).is_some() && self.folder_id(*k).is_some())
            .collect()
    }

    /// Kinds with a local source folder but no remote folder id; these are skipped.
    pub fn unmapped_kinds(&self) -> Vec<AssetKind> {
        AssetKind::ALL
            .into_iter()
            .filter(|k| self.local_path(*k).is_some() && self.folder_id(*k).is_none())
            .collect()
    }

    /// Path prefix of every REST endpoint, e.g. `/CNPortletapp/rest`.
    pub fn rest_root(&self) -> String {
        format!("/{}/rest", self.app_root.trim_matches('/'))
    }
}

fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("upload.json")];
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".gentics-upload.json"));
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_match_task_defaults() {
        let options = UploadOptions::default();
        assert_eq!(options.username_prompt, "Username: ");
        assert_eq!(options.password_prompt, "Password: ");
        assert_eq!(options.password_replace_char, "*");
        assert_eq!(options.rest_root(), "/CNPortletapp/rest");
        assert!(options.source_kinds().is_empty());
        assert!(options.logout);
    }

    #[test]
    fn test_load_camel_case_options() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("upload.json");
        std::fs::write(
            &path,
            r#"{
                "host": "https://cms.example.com",
                "nodeId": 3,
                "images": "dist/img",
                "imagesFolderId": 12,
                "styles": "dist/css",
                "stylesFolderId": "77",
                "templateId": 5,
                "responseLog": null
            }"#,
        )
        .unwrap();

        let options = UploadOptions::load(&path).unwrap();
        assert_eq!(options.host, "https://cms.example.com");
        assert_eq!(options.node_id.as_deref(), Some("3"));
        assert_eq!(options.folder_id(AssetKind::Images), Some("12"));
        assert_eq!(options.folder_id(AssetKind::Styles), Some("77"));
        assert_eq!(options.folder_id(AssetKind::Fonts), None);
        assert_eq!(options.template_id.as_deref(), Some("5"));
        assert_eq!(options.local_path(AssetKind::Images), Some(Path::new("dist/img")));
        assert_eq!(options.source_kinds(), vec![AssetKind::Images, AssetKind::Styles]);
        assert!(options.unmapped_kinds().is_empty());
        assert!(options.response_log.is_none());
        // untouched keys keep defaults
        assert_eq!(options.app_root, "CNPortletapp");
    }

    #[test]
    fn test_load_reports_bad_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = UploadOptions::load(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }

    #[test]
    fn test_kinds_without_folder_id_are_not_sources() {
        let options = UploadOptions {
            images: Some(PathBuf::from("img")),
            images_folder_id: Some("12".into()),
            fonts: Some(PathBuf::from("fonts")),
            scripts_folder_id: Some("21".into()),
            ..UploadOptions::default()
        };
        assert_eq!(options.source_kinds(), vec![AssetKind::Images]);
        assert_eq!(options.unmapped_kinds(), vec![AssetKind::Fonts]);
    }

    #[test]
    fn test_listing_paths_per_kind() {
        assert_eq!(AssetKind::Images.listing_path("1"), "folder/getImages/1");
        assert_eq!(AssetKind::Scripts.listing_path("2"), "folder/getFiles/2");
        assert_eq!(AssetKind::Fonts.listing_path("3"), "folder/getFiles/3");
        assert_eq!(AssetKind::Styles.listing_path("4"), "folder/getPages/4");
    }
}

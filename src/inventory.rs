// Remote inventory: snapshot of the files (or pages) that already exist in
// a remote folder. It is fetched once per folder before any upload and
// decides between create and update for every file of that folder.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::api::{Method, Payload};
use crate::config::AssetKind;
use crate::error::CmsError;
use crate::serialization::deserialize_id;
use crate::session::SessionManager;

/// An existing remote file or page. Binary files are named by `fileName`,
/// pages by `name`; either one may be missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteFileRecord {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(rename = "fileName", default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl RemoteFileRecord {
    pub fn matches(&self, name: &str) -> bool {
        self.file_name.as_deref() == Some(name) || self.name.as_deref() == Some(name)
    }
}

/// Body of a folder listing, tagged by which collection field is present.
#[derive(Debug, Clone, PartialEq)]
pub enum ListingResponse {
    Files(Vec<RemoteFileRecord>),
    Pages(Vec<RemoteFileRecord>),
    Images(Vec<RemoteFileRecord>),
}

impl ListingResponse {
    pub fn decode(data: &Value, path: &str) -> Result<Self, CmsError> {
        let fields: [(&str, fn(Vec<RemoteFileRecord>) -> ListingResponse); 3] = [
            ("files", ListingResponse::Files),
            ("pages", ListingResponse::Pages),
            ("images", ListingResponse::Images),
        ];
        for (field, wrap) in fields {
            let Some(raw) = data.get(field).filter(|v| !v.is_null()) else {
                continue;
            };
            let records: Vec<RemoteFileRecord> =
                serde_json::from_value(raw.clone()).map_err(|e| CmsError::ResponseShape {
                    path: path.to_string(),
                    detail: format!("'{}' is not a record list: {}", field, e),
                })?;
            return Ok(wrap(records));
        }
        Err(CmsError::ResponseShape {
            path: path.to_string(),
            detail: "Response type not recognized! Expected files, pages or images".into(),
        })
    }

    pub fn into_records(self) -> Vec<RemoteFileRecord> {
        match self {
            ListingResponse::Files(r) | ListingResponse::Pages(r) | ListingResponse::Images(r) => r,
        }
    }
}

/// Read-only once built; consumers only query it by name.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    records: Vec<RemoteFileRecord>,
}

impl Inventory {
    /// Fetch the listing of `folder_id` through the kind-specific endpoint.
    pub async fn list(
        sessions: &SessionManager,
        kind: AssetKind,
        folder_id: &str,
    ) -> Result<Self, CmsError> {
        let path = kind.listing_path(folder_id);
        debug!("[Inventory] listing {} folder {}", kind, folder_id);
        let data = sessions.call(Method::Get, &path, Payload::Empty).await?;
        let records = ListingResponse::decode(&data, &sessions.endpoint(&path))?.into_records();
        info!("[Inventory] {} remote {} in folder {}", records.len(), kind, folder_id);
        Ok(Inventory { records })
    }

    pub fn from_records(records: Vec<RemoteFileRecord>) -> Self {
        Inventory { records }
    }

    /// First record whose file name or page name equals `name`.
    pub fn find(&self, name: &str) -> Option<&RemoteFileRecord> {
        self.records.iter().find(|r| r.matches(name))
    }

    pub fn records(&self) -> &[RemoteFileRecord] {
        &self.records
    }
}

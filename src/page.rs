// Page content merger: stylesheets are not uploaded as files, their text is
// written into the `_css` tag of a CMS page which is then saved and
// published. Each stylesheet walks an explicit state machine; every step
// depends on the result of the previous one.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, error, info, warn};

use crate::api::{Method, Payload};
use crate::error::CmsError;
use crate::inventory::Inventory;
use crate::serialization::{id_from_value, id_to_value};
use crate::session::SessionManager;

const CSS_TAG_MARKER: &str = "_css";
const PAGE_LANGUAGE: &str = "en";

/// A content tag of a CMS page. Fields the CMS sends beyond the ones used
/// here are kept in `extra` so they survive a save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageTag {
    pub name: String,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub properties: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PageTag {
    pub fn is_css(&self) -> bool {
        self.name.contains(CSS_TAG_MARKER)
    }

    pub fn text(&self) -> Option<&str> {
        self.properties
            .get("text")
            .and_then(|t| t.get("stringValue"))
            .and_then(Value::as_str)
    }

    /// Replace the tag's text and activate it.
    pub fn set_text(&mut self, content: String) {
        let text = self
            .properties
            .entry("text")
            .or_insert_with(|| json!({}));
        if !text.is_object() {
            *text = json!({});
        }
        text["stringValue"] = Value::String(content);
        self.active = true;
    }
}

/// Steps of one stylesheet merge. There is no separate failed variant: an
/// `Err` returned by a step is the failed state. It ends the merge for that
/// file only and is logged with the label of the step that failed.
#[derive(Debug, Clone, PartialEq)]
pub enum PageState {
    Start,
    ResolvePage,
    FetchTags { page_id: String },
    LocateCssTag { page_id: String, tags: Vec<PageTag> },
    InjectContent { page_id: String, css_tag: Option<PageTag> },
    Save { page_id: String, tags: BTreeMap<String, PageTag> },
    Publish { page_id: String },
    Done { page_id: String },
}

impl PageState {
    fn label(&self) -> &'static str {
        match self {
            PageState::Start => "START",
            PageState::ResolvePage => "RESOLVE_PAGE",
            PageState::FetchTags { .. } => "FETCH_TAGS",
            PageState::LocateCssTag { .. } => "LOCATE_CSS_TAG",
            PageState::InjectContent { .. } => "INJECT_CONTENT",
            PageState::Save { .. } => "SAVE",
            PageState::Publish { .. } => "PUBLISH",
            PageState::Done { .. } => "DONE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageOutcome {
    pub file_name: String,
    pub page_id: String,
    pub created: bool,
    /// Name of the tag that received the stylesheet, if the page had one.
    pub css_tag: Option<String>,
}

/// Per-file context threaded through the state machine.
struct MergeRun<'a> {
    inventory: &'a Inventory,
    file_name: &'a str,
    created: bool,
    css_tag: Option<String>,
}

pub struct PageMerger {
    sessions: Arc<SessionManager>,
    node_id: String,
    folder_id: String,
    template_id: Option<String>,
    styles_dir: PathBuf,
}

impl PageMerger {
    pub fn new(
        sessions: Arc<SessionManager>,
        node_id: impl Into<String>,
        folder_id: impl Into<String>,
        template_id: Option<String>,
        styles_dir: impl Into<PathBuf>,
    ) -> Self {
        PageMerger {
            sessions,
            node_id: node_id.into(),
            folder_id: folder_id.into(),
            template_id,
            styles_dir: styles_dir.into(),
        }
    }

    /// Merge the stylesheet `file_name` (inside the styles folder) into its page.
    pub async fn merge(&self, inventory: &Inventory, file_name: &str) -> Result<PageOutcome, CmsError> {
        let mut run = MergeRun {
            inventory,
            file_name,
            created: false,
            css_tag: None,
        };
        let mut state = PageState::Start;
        loop {
            let label = state.label();
            debug!("[PageMerger] {}: {}", file_name, label);
            state = match self.step(&mut run, state).await {
                Ok(PageState::Done { page_id }) => {
                    info!("[PageMerger] {} published as page {}", file_name, page_id);
                    return Ok(PageOutcome {
                        file_name: file_name.to_string(),
                        page_id,
                        created: run.created,
                        css_tag: run.css_tag,
                    });
                }
                Ok(next) => next,
                Err(e) => {
                    error!("[PageMerger] {} failed at {}: {}", file_name, label, e);
                    return Err(CmsError::upload(file_name, e));
                }
            };
        }
    }

    async fn step(&self, run: &mut MergeRun<'_>, state: PageState) -> Result<PageState, CmsError> {
        match state {
            PageState::Start => Ok(PageState::ResolvePage),

            PageState::ResolvePage => {
                let page_id = match run.inventory.find(run.file_name) {
                    Some(existing) => existing.id.clone(),
                    None => {
                        run.created = true;
                        self.create_page().await?
                    }
                };
                Ok(PageState::FetchTags { page_id })
            }

            PageState::FetchTags { page_id } => {
                let path = format!("page/getTags/{}", page_id);
                let data = self.sessions.call(Method::Get, &path, Payload::Empty).await?;
                let tags = decode_tags(&data, &self.sessions.endpoint(&path))?;
                Ok(PageState::LocateCssTag { page_id, tags })
            }

            PageState::LocateCssTag { page_id, tags } => {
                // the last matching tag wins
                let css_tag = tags.into_iter().filter(PageTag::is_css).last();
                if css_tag.is_none() {
                    warn!(
                        "[PageMerger] Could not find CSS tag in page {} for {}! Check if tagname includes {}",
                        page_id, run.file_name, CSS_TAG_MARKER
                    );
                }
                Ok(PageState::InjectContent { page_id, css_tag })
            }

            PageState::InjectContent { page_id, css_tag } => {
                let source = self.styles_dir.join(run.file_name);
                let content = tokio::fs::read_to_string(&source)
                    .await
                    .map_err(|e| CmsError::io(&source, e))?;
                let mut tags = BTreeMap::new();
                if let Some(mut tag) = css_tag {
                    tag.set_text(content);
                    run.css_tag = Some(tag.name.clone());
                    tags.insert(tag.name.clone(), tag);
                }
                Ok(PageState::Save { page_id, tags })
            }

            PageState::Save { page_id, tags } => {
                let body = json!({
                    "page": {
                        "id": id_to_value(&page_id),
                        "name": page_name(run.file_name),
                        "fileName": run.file_name,
                        "tags": tags,
                    }
                });
                let path = format!("page/save/{}", page_id);
                self.sessions.call(Method::Post, &path, Payload::Json(body)).await?;
                Ok(PageState::Publish { page_id })
            }

            PageState::Publish { page_id } => {
                let path = format!("page/publish/{}", page_id);
                self.sessions
                    .call(Method::Post, &path, Payload::Json(json!({})))
                    .await?;
                Ok(PageState::Done { page_id })
            }

            done @ PageState::Done { .. } => Ok(done),
        }
    }

    async fn create_page(&self) -> Result<String, CmsError> {
        let template_id = self
            .template_id
            .as_deref()
            .ok_or_else(|| CmsError::Config("templateId not provided, cannot create style page".into()))?;
        let body = json!({
            "folderId": id_to_value(&self.folder_id),
            "templateId": id_to_value(template_id),
            "nodeId": id_to_value(&self.node_id),
            "language": PAGE_LANGUAGE,
        });
        let data = self
            .sessions
            .call(Method::Post, "page/create", Payload::Json(body))
            .await?;
        let page_id = data
            .get("page")
            .and_then(|p| p.get("id"))
            .and_then(id_from_value)
            .ok_or_else(|| CmsError::ResponseShape {
                path: self.sessions.endpoint("page/create"),
                detail: "missing page.id".into(),
            })?;
        info!("[PageMerger] created page {}", page_id);
        Ok(page_id)
    }
}

fn decode_tags(data: &Value, path: &str) -> Result<Vec<PageTag>, CmsError> {
    let raw = data.get("tags").ok_or_else(|| CmsError::ResponseShape {
        path: path.to_string(),
        detail: "missing tags".into(),
    })?;
    serde_json::from_value(raw.clone()).map_err(|e| CmsError::ResponseShape {
        path: path.to_string(),
        detail: format!("tags are not a tag list: {}", e),
    })
}

/// Page name: the file name up to its first dot.
pub fn page_name(file_name: &str) -> &str {
    match file_name.find('.') {
        Some(idx) => &file_name[..idx],
        None => file_name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::RemoteFileRecord;
    use crate::test_support::{logged_in, path, MockTransport};
    use tempfile::tempdir;

    const OK: &str = r#"{"responseInfo": {"responseCode": "OK"}}"#;

    fn tags_body() -> &'static str {
        r#"{"tags": [
            {"name": "content", "active": true, "id": 5, "properties": {"text": {"stringValue": "<p>hi</p>"}}},
            {"name": "main_css", "active": false, "id": 6, "constructId": 14, "properties": {"text": {"stringValue": ""}}}
        ]}"#
    }

    fn styles_dir(css: &str) -> tempfile::TempDir {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("main.min.css"), css).unwrap();
        dir
    }

    fn saved_page(transport: &MockTransport, id: &str) -> Value {
        let saves = transport.requests_to(&path(&format!("page/save/{}", id)));
        assert_eq!(saves.len(), 1);
        match &saves[0].payload {
            Payload::Json(body) => body["page"].clone(),
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_existing_page_gets_css_and_is_published() {
        let dir = styles_dir("body{color:red}");
        let transport = Arc::new(MockTransport::new());
        let sessions = logged_in(&transport).await;
        transport.respond(&path("page/getTags/31"), tags_body());
        transport.respond(&path("page/save/31"), OK);
        transport.respond(&path("page/publish/31"), OK);

        let inventory = Inventory::from_records(vec![RemoteFileRecord {
            id: "31".into(),
            file_name: Some("main.min.css".into()),
            name: Some("main".into()),
        }]);
        let merger = PageMerger::new(sessions, "3", "77", None, dir.path());
        let outcome = merger.merge(&inventory, "main.min.css").await.unwrap();

        assert_eq!(outcome.page_id, "31");
        assert!(!outcome.created);
        assert_eq!(outcome.css_tag.as_deref(), Some("main_css"));
        assert!(transport.requests_to(&path("page/create")).is_empty());

        let page = saved_page(&transport, "31");
        assert_eq!(page["id"], json!(31));
        assert_eq!(page["name"], json!("main"));
        assert_eq!(page["fileName"], json!("main.min.css"));
        let tags = page["tags"].as_object().unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags["main_css"]["active"], json!(true));
        assert_eq!(tags["main_css"]["properties"]["text"]["stringValue"], json!("body{color:red}"));
        // unknown tag fields survive the round trip
        assert_eq!(tags["main_css"]["constructId"], json!(14));

        let publishes = transport.requests_to(&path("page/publish/31"));
        assert_eq!(publishes.len(), 1);
        assert_eq!(publishes[0].payload, Payload::Json(json!({})));
    }

    #[tokio::test]
    async fn test_new_page_is_created_from_template() {
        let dir = styles_dir("a{}");
        let transport = Arc::new(MockTransport::new());
        let sessions = logged_in(&transport).await;
        transport.respond(&path("page/create"), r#"{"page": {"id": 88, "name": "new"}}"#);
        transport.respond(&path("page/getTags/88"), tags_body());
        transport.respond(&path("page/save/88"), OK);
        transport.respond(&path("page/publish/88"), OK);

        let merger = PageMerger::new(sessions, "3", "77", Some("5".into()), dir.path());
        let outcome = merger.merge(&Inventory::default(), "main.min.css").await.unwrap();
        assert!(outcome.created);
        assert_eq!(outcome.page_id, "88");

        let creates = transport.requests_to(&path("page/create"));
        assert_eq!(
            creates[0].payload,
            Payload::Json(json!({"folderId": 77, "templateId": 5, "nodeId": 3, "language": "en"}))
        );
    }

    #[tokio::test]
    async fn test_missing_css_tag_still_saves_and_publishes() {
        let dir = styles_dir("a{}");
        let transport = Arc::new(MockTransport::new());
        let sessions = logged_in(&transport).await;
        transport.respond(
            &path("page/getTags/31"),
            r#"{"tags": [{"name": "content", "active": true, "properties": {}}]}"#,
        );
        transport.respond(&path("page/save/31"), OK);
        transport.respond(&path("page/publish/31"), OK);

        let inventory = Inventory::from_records(vec![RemoteFileRecord {
            id: "31".into(),
            file_name: None,
            name: Some("main.min.css".into()),
        }]);
        let merger = PageMerger::new(sessions, "3", "77", None, dir.path());
        let outcome = merger.merge(&inventory, "main.min.css").await.unwrap();

        assert_eq!(outcome.css_tag, None);
        let page = saved_page(&transport, "31");
        assert_eq!(page["tags"], json!({}));
        assert_eq!(transport.requests_to(&path("page/publish/31")).len(), 1);
    }

    #[tokio::test]
    async fn test_create_without_template_fails_that_file() {
        let dir = styles_dir("a{}");
        let transport = Arc::new(MockTransport::new());
        let sessions = logged_in(&transport).await;

        let merger = PageMerger::new(sessions, "3", "77", None, dir.path());
        let err = merger.merge(&Inventory::default(), "main.min.css").await.unwrap_err();
        match err {
            CmsError::Upload { source, .. } => assert!(matches!(*source, CmsError::Config(_))),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_failed_save_stops_before_publish() {
        let dir = styles_dir("a{}");
        let transport = Arc::new(MockTransport::new());
        let sessions = logged_in(&transport).await;
        transport.respond(&path("page/getTags/31"), tags_body());
        transport.fail(&path("page/save/31"), "connection reset");
        transport.respond(&path("page/publish/31"), OK);

        let inventory = Inventory::from_records(vec![RemoteFileRecord {
            id: "31".into(),
            file_name: Some("main.min.css".into()),
            name: None,
        }]);
        let merger = PageMerger::new(sessions, "3", "77", None, dir.path());
        assert!(merger.merge(&inventory, "main.min.css").await.is_err());
        assert!(transport.requests_to(&path("page/publish/31")).is_empty());
    }

    #[test]
    fn test_page_name_and_tag_text() {
        assert_eq!(page_name("main.min.css"), "main");
        assert_eq!(page_name("noext"), "noext");

        let mut tag: PageTag = serde_json::from_value(json!({"name": "x_css"})).unwrap();
        assert!(tag.is_css());
        assert_eq!(tag.text(), None);
        tag.set_text("b{}".into());
        assert!(tag.active);
        assert_eq!(tag.text(), Some("b{}"));
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::core::block::{Block, EDITOR_VERSION};
use crate::core::resolve::Named;
use crate::{NousError, Result};

/// The editor document stored in a page's `content` field.
///
/// Field order is part of the content hash: `time`, `version`, `blocks`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageContent {
    /// Epoch milliseconds of the last editor save.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub blocks: Vec<Block>,
}

impl PageContent {
    /// Content stamped with the current time and the editor version.
    pub fn new(blocks: Vec<Block>) -> Self {
        Self {
            time: Some(Utc::now().timestamp_millis()),
            version: Some(EDITOR_VERSION.to_string()),
            blocks,
        }
    }
}

impl Default for PageContent {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageType {
    #[default]
    Standard,
    Database,
}

/// Page tags. Stored in display order; compared as a set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tags(Vec<String>);

impl Tags {
    pub fn new(tags: Vec<String>) -> Self {
        let mut out = Self::default();
        for tag in tags {
            out.add(&tag);
        }
        out
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Case-insensitive membership.
    pub fn contains(&self, tag: &str) -> bool {
        let tag = tag.trim().to_lowercase();
        self.0.iter().any(|t| t.to_lowercase() == tag)
    }

    /// Adds a trimmed tag unless an equal tag (ignoring case) is present.
    /// Returns whether the tag was added.
    pub fn add(&mut self, tag: &str) -> bool {
        let tag = tag.trim();
        if tag.is_empty() || self.contains(tag) {
            return false;
        }
        self.0.push(tag.to_string());
        true
    }

    /// Removes every tag equal to `tag` ignoring case. Returns whether any was removed.
    pub fn remove(&mut self, tag: &str) -> bool {
        let needle = tag.trim().to_lowercase();
        let before = self.0.len();
        self.0.retain(|t| t.to_lowercase() != needle);
        self.0.len() != before
    }
}

impl PartialEq for Tags {
    fn eq(&self, other: &Self) -> bool {
        self.0.len() == other.0.len() && self.0.iter().all(|t| other.0.contains(t))
    }
}

impl From<Vec<String>> for Tags {
    fn from(tags: Vec<String>) -> Self {
        Self::new(tags)
    }
}

/// Keys that are part of the page envelope and may never be changed through
/// [`Page::apply_extra_fields`].
const IMMUTABLE_PAGE_KEYS: [&str; 4] = ["id", "notebookId", "createdAt", "content"];

/// A notebook page as stored in `pages/<id>.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub id: Uuid,
    pub notebook_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub content: PageContent,
    #[serde(default)]
    pub tags: Tags,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_id: Option<Uuid>,
    #[serde(default)]
    pub page_type: PageType,
    #[serde(default)]
    pub is_archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Application fields this crate does not interpret (`isCover`,
    /// `position`, `systemPromptMode`, ...). Preserved across rewrites.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Page {
    /// Builds a new page with the metadata defaults the desktop application
    /// expects on every page file.
    pub fn new(id: Uuid, notebook_id: Uuid, title: String, content: PageContent) -> Self {
        let now = Utc::now();
        let mut extra = Map::new();
        extra.insert("isCover".into(), Value::Bool(false));
        extra.insert("position".into(), Value::from(0));
        extra.insert("systemPromptMode".into(), Value::from("override"));
        extra.insert("isFavorite".into(), Value::Bool(false));
        extra.insert("isDailyNote".into(), Value::Bool(false));
        Self {
            id,
            notebook_id,
            title,
            content,
            tags: Tags::default(),
            folder_id: None,
            section_id: None,
            page_type: PageType::Standard,
            is_archived: false,
            created_at: now,
            updated_at: now,
            extra,
        }
    }

    /// Advances `updated_at` to now. A clock that went backwards leaves the
    /// previous value in place so the timestamp never decreases.
    pub fn touch(&mut self) {
        let now = Utc::now();
        if now > self.updated_at {
            self.updated_at = now;
        }
    }

    /// Merges arbitrary top-level fields into the page. Known fields
    /// (`title`, `isArchived`, `folderId`, ...) are decoded into their typed
    /// slots; anything else lands in [`Page::extra`].
    ///
    /// # Errors
    ///
    /// Returns [`NousError::InvalidInput`] if a field would change the page's
    /// identity or content, or if a value has the wrong type for its field.
    pub fn apply_extra_fields(&mut self, fields: &Map<String, Value>) -> Result<()> {
        if fields.is_empty() {
            return Ok(());
        }
        if let Some(key) = fields
            .keys()
            .find(|k| IMMUTABLE_PAGE_KEYS.contains(&k.as_str()))
        {
            return Err(NousError::InvalidInput(format!(
                "field '{key}' cannot be changed through extra fields"
            )));
        }
        let Value::Object(mut merged) = serde_json::to_value(&*self)? else {
            return Err(NousError::InvalidInput("page did not encode as an object".into()));
        };
        for (key, value) in fields {
            merged.insert(key.clone(), value.clone());
        }
        *self = serde_json::from_value(Value::Object(merged))
            .map_err(|e| NousError::InvalidInput(format!("invalid page field: {e}")))?;
        Ok(())
    }

    pub fn is_database(&self) -> bool {
        self.page_type == PageType::Database
    }

    pub fn summary(&self) -> PageSummary {
        PageSummary {
            id: self.id,
            title: self.title.clone(),
            tags: self.tags.clone(),
            folder_id: self.folder_id,
            section_id: self.section_id,
            page_type: self.page_type,
            is_archived: self.is_archived,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl Named for Page {
    const KIND: &'static str = "Page";

    fn name(&self) -> &str {
        &self.title
    }

    fn uuid(&self) -> Option<Uuid> {
        Some(self.id)
    }
}

/// Page metadata without the block body, as returned by listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSummary {
    pub id: Uuid,
    pub title: String,
    pub tags: Tags,
    pub folder_id: Option<Uuid>,
    pub section_id: Option<Uuid>,
    pub page_type: PageType,
    pub is_archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

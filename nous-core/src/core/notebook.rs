//! Notebook, section and folder metadata records.
//!
//! Each record keeps the fields it does not interpret in a flattened `extra`
//! map so that rewriting `folders.json` or `sections.json` never drops data
//! the desktop application stored there.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::core::resolve::Named;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotebookType {
    #[default]
    Standard,
    Zettelkasten,
}

/// Contents of `notebooks/<id>/notebook.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notebook {
    pub id: Uuid,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub notebook_type: NotebookType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default)]
    pub sections_enabled: bool,
    #[serde(default)]
    pub archived: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Notebook {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            notebook_type: NotebookType::Standard,
            icon: None,
            sections_enabled: false,
            archived: false,
            created_at: Some(now),
            updated_at: Some(now),
            extra: Map::new(),
        }
    }
}

impl Named for Notebook {
    const KIND: &'static str = "Notebook";

    fn name(&self) -> &str {
        &self.name
    }

    fn uuid(&self) -> Option<Uuid> {
        Some(self.id)
    }
}

/// A notebook as listed, with its page count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotebookSummary {
    pub id: Uuid,
    pub name: String,
    pub icon: Option<String>,
    pub sections_enabled: bool,
    pub archived: bool,
    pub page_count: usize,
}

impl Named for NotebookSummary {
    const KIND: &'static str = "Notebook";

    fn name(&self) -> &str {
        &self.name
    }

    fn uuid(&self) -> Option<Uuid> {
        Some(self.id)
    }
}

/// One entry of `sections.json`. Sections are flat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notebook_id: Option<Uuid>,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default)]
    pub position: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Named for Section {
    const KIND: &'static str = "Section";

    fn name(&self) -> &str {
        &self.name
    }

    fn uuid(&self) -> Option<Uuid> {
        Some(self.id)
    }
}

/// One entry of `folders.json`. `parent_id` links form a tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    pub id: Uuid,
    pub notebook_id: Uuid,
    #[serde(default)]
    pub name: String,
    /// Written as `null` for top-level folders.
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    #[serde(default)]
    pub section_id: Option<Uuid>,
    #[serde(default)]
    pub is_archived: bool,
    #[serde(default)]
    pub position: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Folder {
    pub fn new(notebook_id: Uuid, name: impl Into<String>) -> Self {
        let mut extra = Map::new();
        extra.insert("folderType".into(), Value::from("Standard"));
        Self {
            id: Uuid::new_v4(),
            notebook_id,
            name: name.into(),
            parent_id: None,
            section_id: None,
            is_archived: false,
            position: 0,
            extra,
        }
    }
}

impl Named for Folder {
    const KIND: &'static str = "Folder";

    fn name(&self) -> &str {
        &self.name
    }

    fn uuid(&self) -> Option<Uuid> {
        Some(self.id)
    }
}

//! Tool-invocation adapters over a Nous [`Library`].
//!
//! Each tool takes human-friendly arguments (notebook, folder and page names
//! resolved by case-insensitive prefix, comma-separated tags, markdown
//! content) and returns a string: pretty-printed JSON, or markdown for page
//! and database reads. [`ToolCall`] is the serialized form of a tool
//! invocation; [`Toolbox::handle`] runs one from raw JSON.

mod call;

pub use call::{PageFormat, TagsArg, ToolCall};

use serde::Serialize;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use nous_core::{
    markdown_to_blocks, page_to_markdown, reuse_block_ids, split_front_matter, Block, Library,
    NewPage, Notebook, NousError, PageContent, PageFilter, PageUpdate, PropertySpec, Result,
    RowUpdate, Settings,
};

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Parses markdown content, dropping a front matter header if present.
fn content_blocks(markdown: &str) -> (Vec<String>, Vec<Block>) {
    let (front, body) = split_front_matter(markdown);
    (front.tags, markdown_to_blocks(body))
}

/// Serves tool calls against one library.
#[derive(Debug, Clone)]
pub struct Toolbox {
    library: Library,
}

impl Toolbox {
    pub fn new(library: Library) -> Self {
        Self { library }
    }

    /// Opens the library selected by `settings`.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self::new(settings.open_library()?))
    }

    pub fn library(&self) -> &Library {
        &self.library
    }

    fn notebook(&self, query: &str) -> Result<Notebook> {
        self.library.resolve_notebook(query)
    }

    fn folder_id(&self, notebook_id: Uuid, query: Option<&str>) -> Result<Option<Uuid>> {
        query
            .map(|q| self.library.resolve_folder(notebook_id, q).map(|f| f.id))
            .transpose()
    }

    fn section_id(&self, notebook_id: Uuid, query: Option<&str>) -> Result<Option<Uuid>> {
        query
            .map(|q| self.library.resolve_section(notebook_id, q).map(|s| s.id))
            .transpose()
    }

    pub fn list_notebooks(&self) -> Result<String> {
        to_json(&self.library.list_notebooks()?)
    }

    pub fn list_sections(&self, notebook: &str) -> Result<String> {
        let nb = self.notebook(notebook)?;
        to_json(&self.library.list_sections(nb.id)?)
    }

    pub fn list_folders(
        &self,
        notebook: &str,
        section: Option<&str>,
        include_archived: bool,
    ) -> Result<String> {
        let nb = self.notebook(notebook)?;
        let section_id = self.section_id(nb.id, section)?;
        to_json(&self.library.list_folders(nb.id, section_id, include_archived)?)
    }

    /// Pages sorted by last update, newest first.
    pub fn list_pages(
        &self,
        notebook: &str,
        folder: Option<&str>,
        section: Option<&str>,
        tag: Option<&str>,
        limit: usize,
    ) -> Result<String> {
        let nb = self.notebook(notebook)?;
        let filter = PageFilter {
            folder_id: self.folder_id(nb.id, folder)?,
            section_id: self.section_id(nb.id, section)?,
            tag: tag.map(str::to_string),
            include_archived: false,
            limit: Some(limit),
        };
        to_json(&self.library.list_pages(nb.id, &filter)?)
    }

    pub fn get_page(&self, notebook: &str, page: &str, format: PageFormat) -> Result<String> {
        let nb = self.notebook(notebook)?;
        let page = self.library.resolve_page(nb.id, page)?;
        match format {
            PageFormat::Markdown => Ok(page_to_markdown(&page)),
            PageFormat::Json => to_json(&page),
        }
    }

    pub fn search_pages(&self, query: &str, notebook: Option<&str>, limit: usize) -> Result<String> {
        let notebook_id = notebook.map(|q| self.notebook(q).map(|nb| nb.id)).transpose()?;
        to_json(&self.library.search_pages(query, notebook_id, limit)?)
    }

    /// Creates a page from markdown. Front matter tags are used when no
    /// tags are given.
    pub fn create_page(
        &self,
        notebook: &str,
        title: &str,
        content: Option<&str>,
        tags: Option<&TagsArg>,
        folder: Option<&str>,
        section: Option<&str>,
    ) -> Result<String> {
        let nb = self.notebook(notebook)?;
        let (front_tags, blocks) = content.map(content_blocks).unwrap_or_default();
        let tags = tags.map(TagsArg::to_vec).unwrap_or(front_tags);
        let new = NewPage::new(title)
            .with_blocks(blocks)
            .with_tags(tags)
            .in_folder(self.folder_id(nb.id, folder)?)
            .in_section(self.section_id(nb.id, section)?);
        let page = self.library.create_page(nb.id, new)?;
        to_json(&json!({
            "id": page.id,
            "title": page.title,
            "notebookId": nb.id,
        }))
    }

    pub fn append_to_page(&self, notebook: &str, page: &str, content: &str) -> Result<String> {
        let nb = self.notebook(notebook)?;
        let page = self.library.resolve_page(nb.id, page)?;
        let (_, blocks) = content_blocks(content);
        let added = blocks.len();
        let page = self.library.append_blocks(nb.id, page.id, blocks)?;
        to_json(&json!({
            "id": page.id,
            "title": page.title,
            "blocksAdded": added,
        }))
    }

    /// Replaces any of title, body and tags. New markdown content keeps the
    /// ids of blocks that did not change, so only real edits are journaled.
    pub fn update_page(
        &self,
        notebook: &str,
        page: &str,
        title: Option<&str>,
        content: Option<&str>,
        tags: Option<&TagsArg>,
    ) -> Result<String> {
        if title.is_none() && content.is_none() && tags.is_none() {
            return Err(NousError::InvalidInput(
                "update_page needs at least one of title, content or tags".into(),
            ));
        }
        let nb = self.notebook(notebook)?;
        let current = self.library.resolve_page(nb.id, page)?;

        let content = content.map(|md| {
            let (_, mut blocks) = content_blocks(md);
            reuse_block_ids(&current.content.blocks, &mut blocks);
            if blocks == current.content.blocks {
                // Unchanged body keeps its timestamp and so its hash.
                return current.content.clone();
            }
            let mut content = PageContent::new(blocks);
            if current.content.version.is_some() {
                content.version.clone_from(&current.content.version);
            }
            content
        });
        let update = PageUpdate {
            content,
            title: title.map(str::to_string),
            tags: tags.map(TagsArg::to_vec),
            ..PageUpdate::default()
        };
        let page = self.library.update_page(nb.id, current.id, update)?;
        let changes = self
            .library
            .read_oplog_tail(nb.id, page.id, 1)?
            .pop()
            .map_or(0, |e| e.block_changes.len());
        to_json(&json!({
            "id": page.id,
            "title": page.title,
            "updatedAt": page.updated_at,
            "blockChanges": changes,
        }))
    }

    pub fn create_folder(
        &self,
        notebook: &str,
        name: &str,
        parent: Option<&str>,
        section: Option<&str>,
    ) -> Result<String> {
        let nb = self.notebook(notebook)?;
        let parent_id = self.folder_id(nb.id, parent)?;
        let section_id = self.section_id(nb.id, section)?;
        to_json(&self.library.create_folder(nb.id, name, parent_id, section_id)?)
    }

    /// Moves a page into `folder`, or out of all folders when `None`.
    pub fn move_page(
        &self,
        notebook: &str,
        page: &str,
        folder: Option<&str>,
        section: Option<&str>,
    ) -> Result<String> {
        let nb = self.notebook(notebook)?;
        let page = self.library.resolve_page(nb.id, page)?;
        let folder_id = self.folder_id(nb.id, folder)?;
        let section_id = self.section_id(nb.id, section)?;
        let page = self.library.move_page(nb.id, page.id, folder_id, section_id)?;
        to_json(&json!({
            "id": page.id,
            "title": page.title,
            "folderId": page.folder_id,
            "sectionId": page.section_id,
        }))
    }

    pub fn manage_tags(
        &self,
        notebook: &str,
        page: &str,
        add: Option<&TagsArg>,
        remove: Option<&TagsArg>,
    ) -> Result<String> {
        let nb = self.notebook(notebook)?;
        let page = self.library.resolve_page(nb.id, page)?;
        let add = add.map(TagsArg::to_vec).unwrap_or_default();
        let remove = remove.map(TagsArg::to_vec).unwrap_or_default();
        let page = self.library.manage_tags(nb.id, page.id, &add, &remove)?;
        to_json(&json!({
            "id": page.id,
            "title": page.title,
            "tags": page.tags,
        }))
    }

    pub fn list_databases(
        &self,
        notebook: &str,
        folder: Option<&str>,
        section: Option<&str>,
    ) -> Result<String> {
        let nb = self.notebook(notebook)?;
        let folder_id = self.folder_id(nb.id, folder)?;
        let section_id = self.section_id(nb.id, section)?;
        to_json(&self.library.list_databases(nb.id, folder_id, section_id)?)
    }

    /// Markdown renders the rows as a table; JSON returns the raw table.
    pub fn get_database(&self, notebook: &str, database: &str, format: PageFormat) -> Result<String> {
        let nb = self.notebook(notebook)?;
        let page = self.library.resolve_page(nb.id, database)?;
        let (page, content) = self.library.read_database(nb.id, page.id)?;
        match format {
            PageFormat::Markdown => Ok(content.to_markdown(&page.title)),
            PageFormat::Json => to_json(&json!({
                "id": page.id,
                "title": page.title,
                "tags": page.tags,
                "database": content,
            })),
        }
    }

    pub fn create_database(
        &self,
        notebook: &str,
        title: &str,
        properties: &[PropertySpec],
        tags: Option<&TagsArg>,
        folder: Option<&str>,
    ) -> Result<String> {
        let nb = self.notebook(notebook)?;
        let new = NewPage::new(title)
            .with_tags(tags.map(TagsArg::to_vec).unwrap_or_default())
            .in_folder(self.folder_id(nb.id, folder)?);
        let (page, content) = self.library.create_database(nb.id, new, properties)?;
        let properties: Vec<Value> = content
            .properties
            .iter()
            .map(|p| json!({"id": p.id, "name": p.name, "type": p.property_type}))
            .collect();
        to_json(&json!({
            "id": page.id,
            "title": page.title,
            "notebookId": nb.id,
            "properties": properties,
        }))
    }

    pub fn add_database_rows(
        &self,
        notebook: &str,
        database: &str,
        rows: &[Map<String, Value>],
    ) -> Result<String> {
        let nb = self.notebook(notebook)?;
        let page = self.library.resolve_page(nb.id, database)?;
        let ids = self.library.add_database_rows(nb.id, page.id, rows)?;
        to_json(&json!({
            "id": page.id,
            "title": page.title,
            "rowsAdded": ids.len(),
            "rowIds": ids,
        }))
    }

    pub fn update_database_rows(
        &self,
        notebook: &str,
        database: &str,
        updates: &[RowUpdate],
    ) -> Result<String> {
        let nb = self.notebook(notebook)?;
        let page = self.library.resolve_page(nb.id, database)?;
        let count = self.library.update_database_rows(nb.id, page.id, updates)?;
        to_json(&json!({
            "id": page.id,
            "title": page.title,
            "rowsUpdated": count,
        }))
    }

    /// Runs one tool call.
    pub fn dispatch(&self, call: &ToolCall) -> Result<String> {
        log::debug!("dispatching tool '{}'", call.name());
        call.run(self)
    }

    /// Parses and runs a `{"tool": ..., "args": {...}}` request.
    ///
    /// # Errors
    ///
    /// Returns [`NousError::InvalidInput`] if the request does not parse.
    pub fn dispatch_json(&self, request: &str) -> Result<String> {
        let call: ToolCall = serde_json::from_str(request)
            .map_err(|e| NousError::InvalidInput(format!("invalid tool call: {e}")))?;
        self.dispatch(&call)
    }

    /// Like [`Toolbox::dispatch_json`], but reports failure as an
    /// `{"error": ...}` JSON object instead of an `Err`.
    pub fn handle(&self, request: &str) -> String {
        self.dispatch_json(request).unwrap_or_else(|e| {
            log::warn!("tool call failed: {e}");
            json!({ "error": e.to_string() }).to_string()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nous_core::{BlockData, BlockOp, OpType};
    use tempfile::TempDir;

    fn setup() -> (TempDir, Toolbox, Uuid) {
        let dir = TempDir::new().unwrap();
        let library = Library::new(dir.path(), "tools-test");
        let nb = library.create_notebook("Work Notes").unwrap();
        (dir, Toolbox::new(library), nb.id)
    }

    fn parse(out: &str) -> Value {
        serde_json::from_str(out).unwrap()
    }

    #[test]
    fn test_create_page_from_markdown_with_names() {
        let (_dir, tools, nb) = setup();
        tools.create_folder("work", "Projects", None, None).unwrap();

        let out = tools
            .create_page(
                "work",
                "Plan",
                Some("# Goals\n\nShip it\n\n- [ ] write docs"),
                Some(&TagsArg::Csv("alpha, beta ,".into())),
                Some("proj"),
                None,
            )
            .unwrap();
        let id: Uuid = serde_json::from_value(parse(&out)["id"].clone()).unwrap();

        let page = tools.library().read_page(nb, id).unwrap();
        assert_eq!(page.tags.as_slice(), ["alpha", "beta"]);
        assert!(page.folder_id.is_some());
        let types: Vec<&str> = page.content.blocks.iter().map(|b| b.type_name()).collect();
        assert_eq!(types, ["header", "paragraph", "checklist"]);
    }

    #[test]
    fn test_get_page_formats() {
        let (_dir, tools, _) = setup();
        tools
            .create_page("Work", "Daily Log", Some("hello *world*"), None, None, None)
            .unwrap();

        let md = tools.get_page("Work", "daily", PageFormat::Markdown).unwrap();
        assert!(md.starts_with("---\ntitle: \"Daily Log\""));
        assert!(md.ends_with("hello *world*\n"));

        let raw = parse(&tools.get_page("Work", "daily", PageFormat::Json).unwrap());
        assert_eq!(raw["content"]["blocks"][0]["data"]["text"], "hello <i>world</i>");
    }

    #[test]
    fn test_update_page_with_markdown_journals_only_edits() {
        let (_dir, tools, nb) = setup();
        tools
            .create_page("Work", "Roadmap", Some("# Intro\n\nfirst\n\nsecond"), None, None, None)
            .unwrap();
        let page = tools.library().resolve_page(nb, "Roadmap").unwrap();
        let edited_id = page.content.blocks[2].id.clone();
        let out = tools
            .update_page("Work", "Roadmap", None, Some("# Intro\n\nfirst\n\nsecond, revised"), None)
            .unwrap();
        let out = parse(&out);
        assert_eq!(out["blockChanges"], 1);

        let log = tools.library().read_oplog(nb, page.id).unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[1].op, OpType::Modify);
        assert_eq!(log[1].block_changes.len(), 1);
        assert_eq!(log[1].block_changes[0].block_id, edited_id);
        assert_eq!(log[1].block_changes[0].op, BlockOp::Modify);

        assert!(tools.update_page("Work", "Roadmap", None, None, None).is_err());
    }

    #[test]
    fn test_update_page_with_same_markdown_keeps_hash() {
        let (_dir, tools, nb) = setup();
        let md = "# Intro\n\nHello";
        tools.create_page("Work", "Notes", Some(md), None, None, None).unwrap();
        let out = parse(&tools.update_page("Work", "Notes", None, Some(md), None).unwrap());
        assert_eq!(out["blockChanges"], 0);

        let page = tools.library().resolve_page(nb, "Notes").unwrap();
        let log = tools.library().read_oplog(nb, page.id).unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[1].content_hash, log[0].content_hash);
    }

    #[test]
    fn test_append_move_and_tags() {
        let (_dir, tools, nb) = setup();
        tools.create_page("Work", "Inbox", None, None, None, None).unwrap();
        tools.create_folder("Work", "Archive", None, None).unwrap();

        let out = parse(&tools.append_to_page("Work", "Inbox", "one\n\ntwo").unwrap());
        assert_eq!(out["blocksAdded"], 2);

        let out = parse(&tools.move_page("Work", "Inbox", Some("Arch"), None).unwrap());
        assert!(out["folderId"].is_string());
        let out = parse(&tools.move_page("Work", "Inbox", None, None).unwrap());
        assert!(out["folderId"].is_null());

        let out = tools
            .manage_tags(
                "Work",
                "Inbox",
                Some(&TagsArg::List(vec!["Todo".into(), "later".into()])),
                Some(&TagsArg::Csv("later".into())),
            )
            .unwrap();
        assert_eq!(parse(&out)["tags"], json!(["Todo"]));

        let page = tools.library().resolve_page(nb, "Inbox").unwrap();
        match &page.content.blocks[1].data {
            BlockData::Paragraph(d) => assert_eq!(d.text, "two"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_database_tools() {
        let (_dir, tools, _) = setup();
        let props: Vec<PropertySpec> = serde_json::from_value(json!([
            {"name": "Name", "type": "text"},
            {"name": "Stage", "type": "select", "options": ["Lead", "Won"]}
        ]))
        .unwrap();
        let out = parse(&tools.create_database("Work", "Deals", &props, None, None).unwrap());
        assert_eq!(out["properties"].as_array().unwrap().len(), 2);

        let rows: Vec<Map<String, Value>> =
            serde_json::from_value(json!([{"Name": "Acme", "Stage": "Lead"}])).unwrap();
        let out = parse(&tools.add_database_rows("Work", "Deals", &rows).unwrap());
        assert_eq!(out["rowsAdded"], 1);

        let updates: Vec<RowUpdate> =
            serde_json::from_value(json!([{"row": 0, "cells": {"stage": "Won"}}])).unwrap();
        let out = parse(&tools.update_database_rows("Work", "Deals", &updates).unwrap());
        assert_eq!(out["rowsUpdated"], 1);

        let md = tools.get_database("Work", "Deals", PageFormat::Markdown).unwrap();
        assert!(md.contains("| Acme | Won |"));

        let listed = parse(&tools.list_databases("Work", None, None).unwrap());
        assert_eq!(listed[0]["rowCount"], 1);
    }

    #[test]
    fn test_handle_reports_errors_as_json() {
        let (_dir, tools, _) = setup();
        let out = parse(&tools.handle(r#"{"tool": "list_sections", "args": {"notebook": "Nope"}}"#));
        assert!(out["error"].as_str().unwrap().contains("Nope"));

        let out = parse(&tools.handle(r#"{"tool": "no_such_tool"}"#));
        assert!(out["error"].as_str().unwrap().contains("invalid tool call"));

        let out = parse(&tools.handle(r#"{"tool": "list_notebooks"}"#));
        assert_eq!(out[0]["name"], "Work Notes");
    }
}

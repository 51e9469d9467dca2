//! Page store: page files plus their history.
//!
//! Every mutation goes through `commit_page`: the new page is
//! staged next to its file, the history entry is appended, and only then is
//! the staged file renamed into place. A failed append leaves nothing
//! behind; a failed rename leaves an entry whose hash does not match the file
//! on disk, which [`Library::verify_page_history`] reports.

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::core::block::Block;
use crate::core::diff::{diff_blocks, insert_all};
use crate::core::hash::GENESIS;
use crate::core::library::{sorted_entries, Library};
use crate::core::oplog::{BlockChange, HistoryStatus, OpType, OplogEntry};
use crate::core::page::{Page, PageContent, PageSummary, PageType, Tags};
use crate::core::resolve::{is_uuid, resolve};
use crate::core::storage::{read_json, read_json_lenient, StagedWrite};
use crate::{NousError, Result};

/// Everything needed to create a page. Only the title is required.
#[derive(Debug, Clone, Default)]
pub struct NewPage {
    /// Pre-bound id; a fresh one is generated when `None`.
    pub id: Option<Uuid>,
    pub title: String,
    pub blocks: Vec<Block>,
    pub tags: Vec<String>,
    pub folder_id: Option<Uuid>,
    pub section_id: Option<Uuid>,
    pub page_type: PageType,
    pub extra_fields: Map<String, Value>,
}

impl NewPage {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_blocks(mut self, blocks: Vec<Block>) -> Self {
        self.blocks = blocks;
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn in_folder(mut self, folder_id: Option<Uuid>) -> Self {
        self.folder_id = folder_id;
        self
    }

    pub fn in_section(mut self, section_id: Option<Uuid>) -> Self {
        self.section_id = section_id;
        self
    }
}

/// A partial page update. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct PageUpdate {
    pub content: Option<PageContent>,
    pub title: Option<String>,
    pub tags: Option<Vec<String>>,
    /// `Some(None)` moves the page out of any folder.
    pub folder_id: Option<Option<Uuid>>,
    pub section_id: Option<Option<Uuid>>,
    pub is_archived: Option<bool>,
    pub extra_fields: Option<Map<String, Value>>,
    /// History head the caller based this update on. When `None`, the head
    /// at load time is used.
    pub expected_head: Option<String>,
}

/// Filters for [`Library::list_pages`].
#[derive(Debug, Clone, Default)]
pub struct PageFilter {
    pub folder_id: Option<Uuid>,
    pub section_id: Option<Uuid>,
    /// Case-insensitive tag.
    pub tag: Option<String>,
    pub include_archived: bool,
    pub limit: Option<usize>,
}

impl Library {
    /// Stages, journals, then renames. See the module docs for ordering.
    fn commit_page(
        &self,
        page: &Page,
        op: OpType,
        changes: Vec<BlockChange>,
        expected_prev: Option<&str>,
    ) -> Result<OplogEntry> {
        let staged = StagedWrite::stage(&self.page_path(page.notebook_id, page.id), page)?;
        let entry = self.oplog(page.notebook_id, page.id).record(
            self.client_id(),
            op,
            &page.content,
            changes,
            expected_prev,
        )?;
        staged.commit()?;
        Ok(entry)
    }

    fn check_placement(
        &self,
        notebook_id: Uuid,
        folder_id: Option<Uuid>,
        section_id: Option<Uuid>,
    ) -> Result<()> {
        if let Some(fid) = folder_id {
            if !self.list_folders(notebook_id, None, true)?.iter().any(|f| f.id == fid) {
                return Err(NousError::not_found("Folder", fid.to_string()));
            }
        }
        if let Some(sid) = section_id {
            if !self.list_sections(notebook_id)?.iter().any(|s| s.id == sid) {
                return Err(NousError::not_found("Section", sid.to_string()));
            }
        }
        Ok(())
    }

    /// Creates a page and its first history entry, which lists every block
    /// as an insert.
    ///
    /// # Errors
    ///
    /// Returns [`NousError::NotFound`] for an unknown notebook, folder or
    /// section, and [`NousError::Conflict`] if a pre-bound id already has
    /// history.
    pub fn create_page(&self, notebook_id: Uuid, new: NewPage) -> Result<Page> {
        self.read_notebook(notebook_id)?;
        self.check_placement(notebook_id, new.folder_id, new.section_id)?;

        let id = new.id.unwrap_or_else(Uuid::new_v4);
        if self.page_path(notebook_id, id).exists() {
            return Err(NousError::Conflict(format!("page {id} already exists")));
        }
        let mut page = Page::new(id, notebook_id, new.title, PageContent::new(new.blocks));
        page.tags = Tags::new(new.tags);
        page.folder_id = new.folder_id;
        page.section_id = new.section_id;
        page.page_type = new.page_type;
        page.apply_extra_fields(&new.extra_fields)?;

        let changes = insert_all(&page.content.blocks);
        self.commit_page(&page, OpType::Create, changes, Some(GENESIS))?;
        log::info!(
            "created page {} '{}' in notebook {notebook_id} ({} blocks)",
            page.id,
            page.title,
            page.content.blocks.len()
        );
        Ok(page)
    }

    /// Reads one page.
    ///
    /// # Errors
    ///
    /// Returns [`NousError::NotFound`] if the page file does not exist.
    pub fn read_page(&self, notebook_id: Uuid, page_id: Uuid) -> Result<Page> {
        read_json(&self.page_path(notebook_id, page_id))?
            .ok_or_else(|| NousError::not_found("Page", page_id.to_string()))
    }

    /// Applies the supplied fields and journals a `modify` entry: a block
    /// diff when content was supplied, no block changes otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`NousError::NotFound`] if the page does not exist,
    /// [`NousError::Conflict`] if the history head is not the expected one,
    /// and [`NousError::InvalidInput`] for bad extra fields.
    pub fn update_page(&self, notebook_id: Uuid, page_id: Uuid, update: PageUpdate) -> Result<Page> {
        self.update_page_as(notebook_id, page_id, update, OpType::Modify)
    }

    fn update_page_as(
        &self,
        notebook_id: Uuid,
        page_id: Uuid,
        update: PageUpdate,
        op: OpType,
    ) -> Result<Page> {
        let mut page = self.read_page(notebook_id, page_id)?;
        let expected = match update.expected_head.clone() {
            Some(head) => head,
            None => self.oplog(notebook_id, page_id).last_hash()?,
        };

        let old_blocks = update.content.as_ref().map(|_| page.content.blocks.clone());
        if let Some(title) = update.title {
            page.title = title;
        }
        if let Some(content) = update.content {
            page.content = content;
        }
        if let Some(tags) = update.tags {
            page.tags = Tags::new(tags);
        }
        if let Some(folder_id) = update.folder_id {
            page.folder_id = folder_id;
        }
        if let Some(section_id) = update.section_id {
            page.section_id = section_id;
        }
        if let Some(archived) = update.is_archived {
            page.is_archived = archived;
        }
        if let Some(fields) = &update.extra_fields {
            page.apply_extra_fields(fields)?;
        }
        page.touch();

        let changes = match &old_blocks {
            Some(old) => diff_blocks(old, &page.content.blocks),
            None => Vec::new(),
        };
        let change_count = changes.len();
        self.commit_page(&page, op, changes, Some(&expected))?;
        log::info!("updated page {page_id} in notebook {notebook_id} ({change_count} block changes)");
        Ok(page)
    }

    /// Appends blocks at the end of a page. Appending nothing is a no-op.
    pub fn append_blocks(&self, notebook_id: Uuid, page_id: Uuid, blocks: Vec<Block>) -> Result<Page> {
        let page = self.read_page(notebook_id, page_id)?;
        if blocks.is_empty() {
            return Ok(page);
        }
        let mut content = PageContent::new(page.content.blocks);
        if page.content.version.is_some() {
            content.version = page.content.version;
        }
        content.blocks.extend(blocks);
        self.update_page(
            notebook_id,
            page_id,
            PageUpdate {
                content: Some(content),
                ..PageUpdate::default()
            },
        )
    }

    /// Files a page under `folder_id` (`None` unfiles it). The section is
    /// `section_id` if given, else the target folder's section, else kept.
    pub fn move_page(
        &self,
        notebook_id: Uuid,
        page_id: Uuid,
        folder_id: Option<Uuid>,
        section_id: Option<Uuid>,
    ) -> Result<Page> {
        self.check_placement(notebook_id, folder_id, section_id)?;
        let folder_section = match folder_id {
            Some(fid) => self
                .list_folders(notebook_id, None, true)?
                .into_iter()
                .find(|f| f.id == fid)
                .and_then(|f| f.section_id),
            None => None,
        };
        self.update_page(
            notebook_id,
            page_id,
            PageUpdate {
                folder_id: Some(folder_id),
                section_id: section_id.or(folder_section).map(Some),
                ..PageUpdate::default()
            },
        )
    }

    /// Removes then adds tags, ignoring case and keeping the display case of
    /// existing tags. Writes nothing if the tag set is unchanged.
    pub fn manage_tags(
        &self,
        notebook_id: Uuid,
        page_id: Uuid,
        add: &[String],
        remove: &[String],
    ) -> Result<Page> {
        let page = self.read_page(notebook_id, page_id)?;
        let mut tags = page.tags.clone();
        let mut changed = false;
        for tag in remove {
            changed |= tags.remove(tag);
        }
        for tag in add {
            changed |= tags.add(tag);
        }
        if !changed {
            return Ok(page);
        }
        self.update_page(
            notebook_id,
            page_id,
            PageUpdate {
                tags: Some(tags.as_slice().to_vec()),
                ..PageUpdate::default()
            },
        )
    }

    /// Sets the archive flag. Archiving journals a `delete` entry and
    /// unarchiving a `restore` entry; the file itself is never removed.
    pub fn archive_page(&self, notebook_id: Uuid, page_id: Uuid, archived: bool) -> Result<Page> {
        let op = if archived { OpType::Delete } else { OpType::Restore };
        self.update_page_as(
            notebook_id,
            page_id,
            PageUpdate {
                is_archived: Some(archived),
                ..PageUpdate::default()
            },
            op,
        )
    }

    /// Every readable page of a notebook in file-name order, archived
    /// included. Corrupt files are skipped.
    pub fn load_pages(&self, notebook_id: Uuid) -> Result<Vec<Page>> {
        Ok(sorted_entries(&self.pages_dir(notebook_id))?
            .into_iter()
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .filter_map(|p| read_json_lenient::<Page>(&p))
            .collect())
    }

    /// Page summaries, most recently updated first.
    pub fn list_pages(&self, notebook_id: Uuid, filter: &PageFilter) -> Result<Vec<PageSummary>> {
        let mut pages: Vec<PageSummary> = self
            .load_pages(notebook_id)?
            .iter()
            .filter(|p| filter.include_archived || !p.is_archived)
            .filter(|p| filter.folder_id.is_none() || p.folder_id == filter.folder_id)
            .filter(|p| filter.section_id.is_none() || p.section_id == filter.section_id)
            .filter(|p| filter.tag.as_deref().map_or(true, |t| p.tags.contains(t)))
            .map(Page::summary)
            .collect();
        pages.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        if let Some(limit) = filter.limit {
            pages.truncate(limit);
        }
        log::debug!("listed {} pages in notebook {notebook_id}", pages.len());
        Ok(pages)
    }

    /// Resolves a page by UUID or by title, archived pages included.
    pub fn resolve_page(&self, notebook_id: Uuid, query: &str) -> Result<Page> {
        if is_uuid(query) {
            let id = Uuid::parse_str(query.trim())
                .map_err(|e| NousError::InvalidInput(e.to_string()))?;
            return self.read_page(notebook_id, id);
        }
        let pages = self.load_pages(notebook_id)?;
        resolve(query, &pages).cloned()
    }

    pub fn read_oplog(&self, notebook_id: Uuid, page_id: Uuid) -> Result<Vec<OplogEntry>> {
        self.oplog(notebook_id, page_id).entries()
    }

    pub fn read_oplog_tail(&self, notebook_id: Uuid, page_id: Uuid, n: usize) -> Result<Vec<OplogEntry>> {
        self.oplog(notebook_id, page_id).last_n(n)
    }

    /// Checks a page's history links and that its head matches the page on
    /// disk.
    pub fn verify_page_history(&self, notebook_id: Uuid, page_id: Uuid) -> Result<HistoryStatus> {
        let page = self.read_page(notebook_id, page_id)?;
        self.oplog(notebook_id, page_id).verify(&page.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hash::content_hash;
    use crate::core::oplog::BlockOp;
    use crate::core::storage::tmp_path;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Library, Uuid) {
        let dir = TempDir::new().unwrap();
        let lib = Library::new(dir.path(), "test-client");
        let nb = lib.create_notebook("Work").unwrap();
        (dir, lib, nb.id)
    }

    fn para(id: &str, text: &str) -> Block {
        Block::with_id(id, Block::paragraph(text).data)
    }

    #[test]
    fn test_create_and_read_round_trip() {
        let (_dir, lib, nb) = setup();
        let page = lib
            .create_page(
                nb,
                NewPage::new("Meeting Notes")
                    .with_blocks(vec![para("a", "Hello"), para("b", "World")])
                    .with_tags(vec!["work".into(), "meetings".into()]),
            )
            .unwrap();

        let back = lib.read_page(nb, page.id).unwrap();
        assert_eq!(back, page);
        assert_eq!(back.content.version.as_deref(), Some("2.28.0"));
        assert_eq!(back.extra["systemPromptMode"], "override");
        assert!(!tmp_path(&lib.page_path(nb, page.id)).exists());
    }

    #[test]
    fn test_end_to_end_create_then_update() {
        let (_dir, lib, nb) = setup();
        let page = lib
            .create_page(
                nb,
                NewPage::new("Plan").with_blocks(vec![para("a", "one"), para("b", "two")]),
            )
            .unwrap();

        let mut content = page.content.clone();
        content.blocks[1] = para("b", "two, revised");
        lib.update_page(
            nb,
            page.id,
            PageUpdate {
                content: Some(content.clone()),
                ..PageUpdate::default()
            },
        )
        .unwrap();

        let log = lib.read_oplog(nb, page.id).unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].op, OpType::Create);
        assert_eq!(log[0].prev_hash, GENESIS);
        assert_eq!(log[0].block_changes.len(), 2);
        assert!(log[0].block_changes.iter().all(|c| c.op == BlockOp::Insert));
        assert_eq!(log[1].op, OpType::Modify);
        assert_eq!(log[1].prev_hash, log[0].content_hash);
        assert_eq!(log[1].block_changes.len(), 1);
        assert_eq!(log[1].block_changes[0].op, BlockOp::Modify);
        assert_eq!(log[1].block_changes[0].block_id, "b");
        assert_eq!(log[1].content_hash, content_hash(&content).unwrap());
        assert!(lib.verify_page_history(nb, page.id).unwrap().is_intact());
    }

    #[test]
    fn test_idempotent_update_keeps_hash_and_records_no_changes() {
        let (_dir, lib, nb) = setup();
        let page = lib
            .create_page(nb, NewPage::new("Same").with_blocks(vec![para("a", "x")]))
            .unwrap();
        let update = PageUpdate {
            content: Some(page.content.clone()),
            ..PageUpdate::default()
        };
        lib.update_page(nb, page.id, update).unwrap();

        let log = lib.read_oplog(nb, page.id).unwrap();
        assert_eq!(log[1].content_hash, log[0].content_hash);
        assert!(log[1].block_changes.is_empty());
    }

    #[test]
    fn test_chain_integrity_over_many_updates() {
        let (_dir, lib, nb) = setup();
        let page = lib.create_page(nb, NewPage::new("Counter")).unwrap();
        for i in 0..10 {
            lib.append_blocks(nb, page.id, vec![Block::paragraph(format!("line {i}"))])
                .unwrap();
        }
        let log = lib.read_oplog(nb, page.id).unwrap();
        assert_eq!(log.len(), 11);
        assert_eq!(log.last().unwrap().block_count, 10);
        assert!(matches!(
            lib.verify_page_history(nb, page.id).unwrap(),
            HistoryStatus::Intact { entries: 11, .. }
        ));
        assert_eq!(lib.read_oplog_tail(nb, page.id, 3).unwrap().len(), 3);
    }

    #[test]
    fn test_update_missing_page_is_not_found() {
        let (_dir, lib, nb) = setup();
        let err = lib
            .update_page(nb, Uuid::new_v4(), PageUpdate::default())
            .unwrap_err();
        assert!(matches!(err, NousError::NotFound { kind: "Page", .. }));
    }

    #[test]
    fn test_metadata_only_update_has_empty_changes_and_keeps_extras() {
        let (_dir, lib, nb) = setup();
        let page = lib.create_page(nb, NewPage::new("Draft")).unwrap();

        // Simulate a field written by the desktop application.
        let path = lib.page_path(nb, page.id);
        let mut raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        raw["coverImage"] = json!("files/cover.png");
        fs::write(&path, serde_json::to_string_pretty(&raw).unwrap()).unwrap();

        let updated = lib
            .update_page(
                nb,
                page.id,
                PageUpdate {
                    title: Some("Final".into()),
                    extra_fields: Some(json!({"isFavorite": true}).as_object().unwrap().clone()),
                    ..PageUpdate::default()
                },
            )
            .unwrap();
        assert_eq!(updated.title, "Final");
        assert!(updated.updated_at >= page.updated_at);
        assert_eq!(updated.created_at, page.created_at);

        let on_disk: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk["coverImage"], "files/cover.png");
        assert_eq!(on_disk["isFavorite"], true);
        assert!(lib.read_oplog(nb, page.id).unwrap()[1].block_changes.is_empty());
    }

    #[test]
    fn test_stale_expected_head_is_conflict_and_writes_nothing() {
        let (_dir, lib, nb) = setup();
        let page = lib.create_page(nb, NewPage::new("Shared")).unwrap();
        let err = lib
            .update_page(
                nb,
                page.id,
                PageUpdate {
                    title: Some("Mine".into()),
                    expected_head: Some("sha256:stale".into()),
                    ..PageUpdate::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, NousError::Conflict(_)));
        assert_eq!(lib.read_page(nb, page.id).unwrap().title, "Shared");
        assert_eq!(lib.read_oplog(nb, page.id).unwrap().len(), 1);
        assert!(!tmp_path(&lib.page_path(nb, page.id)).exists());
    }

    #[test]
    fn test_write_outside_store_is_head_mismatch() {
        let (_dir, lib, nb) = setup();
        let page = lib
            .create_page(nb, NewPage::new("P").with_blocks(vec![para("a", "x")]))
            .unwrap();
        let mut edited = page.clone();
        edited.content.blocks[0] = para("a", "edited elsewhere");
        fs::write(
            lib.page_path(nb, page.id),
            serde_json::to_string_pretty(&edited).unwrap(),
        )
        .unwrap();
        assert!(matches!(
            lib.verify_page_history(nb, page.id).unwrap(),
            HistoryStatus::HeadMismatch { .. }
        ));
    }

    #[test]
    fn test_create_with_existing_id_conflicts() {
        let (_dir, lib, nb) = setup();
        let page = lib.create_page(nb, NewPage::new("One")).unwrap();
        let again = NewPage {
            id: Some(page.id),
            ..NewPage::new("Two")
        };
        assert!(matches!(lib.create_page(nb, again).unwrap_err(), NousError::Conflict(_)));
    }

    #[test]
    fn test_list_pages_filters_and_orders() {
        let (_dir, lib, nb) = setup();
        let folder = lib.create_folder(nb, "Projects", None, None).unwrap();
        let a = lib
            .create_page(nb, NewPage::new("Alpha").with_tags(vec!["Rust".into()]))
            .unwrap();
        let b = lib
            .create_page(nb, NewPage::new("Beta").in_folder(Some(folder.id)))
            .unwrap();
        let c = lib.create_page(nb, NewPage::new("Gamma")).unwrap();
        lib.archive_page(nb, c.id, true).unwrap();
        // Touch Alpha last so it sorts first.
        lib.manage_tags(nb, a.id, &["design".into()], &[]).unwrap();
        fs::write(lib.pages_dir(nb).join("junk.json"), "not json").unwrap();

        let all = lib.list_pages(nb, &PageFilter::default()).unwrap();
        let titles: Vec<_> = all.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["Alpha", "Beta"]);

        let in_folder = PageFilter {
            folder_id: Some(folder.id),
            ..PageFilter::default()
        };
        assert_eq!(lib.list_pages(nb, &in_folder).unwrap()[0].id, b.id);

        let tagged = PageFilter {
            tag: Some("rust".into()),
            ..PageFilter::default()
        };
        assert_eq!(lib.list_pages(nb, &tagged).unwrap().len(), 1);

        let with_archived = PageFilter {
            include_archived: true,
            limit: Some(2),
            ..PageFilter::default()
        };
        assert_eq!(lib.list_pages(nb, &with_archived).unwrap().len(), 2);
    }

    #[test]
    fn test_archive_journals_delete_and_restore() {
        let (_dir, lib, nb) = setup();
        let page = lib.create_page(nb, NewPage::new("Old")).unwrap();
        lib.archive_page(nb, page.id, true).unwrap();
        lib.archive_page(nb, page.id, false).unwrap();
        let ops: Vec<_> = lib.read_oplog(nb, page.id).unwrap().iter().map(|e| e.op).collect();
        assert_eq!(ops, vec![OpType::Create, OpType::Delete, OpType::Restore]);
        assert!(!lib.read_page(nb, page.id).unwrap().is_archived);
    }

    #[test]
    fn test_manage_tags_ignores_case_and_skips_noop() {
        let (_dir, lib, nb) = setup();
        let page = lib
            .create_page(nb, NewPage::new("T").with_tags(vec!["Rust".into()]))
            .unwrap();
        let same = lib.manage_tags(nb, page.id, &["rust".into()], &[]).unwrap();
        assert_eq!(same.tags.as_slice(), &["Rust".to_string()]);
        assert_eq!(lib.read_oplog(nb, page.id).unwrap().len(), 1);

        let updated = lib
            .manage_tags(nb, page.id, &["Design".into()], &["RUST".into()])
            .unwrap();
        assert_eq!(updated.tags.as_slice(), &["Design".to_string()]);
    }

    #[test]
    fn test_move_page_takes_folder_section() {
        let (_dir, lib, nb) = setup();
        let section = lib.create_section(nb, "Ideas", None).unwrap();
        let folder = lib.create_folder(nb, "Inbox", None, Some(section.id)).unwrap();
        let page = lib.create_page(nb, NewPage::new("Loose")).unwrap();

        let moved = lib.move_page(nb, page.id, Some(folder.id), None).unwrap();
        assert_eq!(moved.folder_id, Some(folder.id));
        assert_eq!(moved.section_id, Some(section.id));

        let unfiled = lib.move_page(nb, page.id, None, None).unwrap();
        assert_eq!(unfiled.folder_id, None);
        assert_eq!(unfiled.section_id, Some(section.id));

        assert!(lib.move_page(nb, page.id, Some(Uuid::new_v4()), None).is_err());
    }

    #[test]
    fn test_resolve_page_by_title_and_id() {
        let (_dir, lib, nb) = setup();
        let page = lib.create_page(nb, NewPage::new("Weekly Review")).unwrap();
        lib.create_page(nb, NewPage::new("Weekly Review Archive")).unwrap();
        assert_eq!(lib.resolve_page(nb, "weekly review").unwrap().id, page.id);
        assert_eq!(lib.resolve_page(nb, &page.id.to_string()).unwrap().id, page.id);
        assert!(matches!(
            lib.resolve_page(nb, "week").unwrap_err(),
            NousError::Ambiguous { .. }
        ));
    }

    #[test]
    fn test_append_nothing_is_noop() {
        let (_dir, lib, nb) = setup();
        let page = lib.create_page(nb, NewPage::new("Quiet")).unwrap();
        lib.append_blocks(nb, page.id, vec![]).unwrap();
        assert_eq!(lib.read_oplog(nb, page.id).unwrap().len(), 1);
    }
}

//! The library handle: the on-disk layout of one library root and the
//! notebook, section and folder stores.
//!
//! ```text
//! <root>/notebooks/<notebookId>/notebook.json
//!                              /sections.json
//!                              /folders.json
//!                              /pages/<pageId>.json
//!                              /pages/<pageId>.oplog
//!                              /files/<pageId>.database
//! ```
//!
//! Page and database operations live in [`crate::core::pages`] and
//! [`crate::core::databases`] as further `impl Library` blocks.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Utc;
use uuid::Uuid;

use crate::core::notebook::{Folder, Notebook, NotebookSummary, Section};
use crate::core::oplog::Oplog;
use crate::core::resolve::{is_uuid, resolve};
use crate::core::storage::{read_json, read_json_lenient, write_json_atomic};
use crate::{NousError, Result};

/// An open library. Cheap to clone; holds no file handles.
#[derive(Debug, Clone)]
pub struct Library {
    root: PathBuf,
    client_id: String,
}

/// Sorted entries of `dir`, or nothing if it does not exist.
pub(crate) fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut paths = entries
        .filter_map(|e| e.ok().map(|e| e.path()))
        .collect::<Vec<_>>();
    paths.sort();
    Ok(paths)
}

fn require_name(name: &str, what: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(NousError::InvalidInput(format!("{what} name must not be empty")));
    }
    Ok(name.to_string())
}

impl Library {
    pub fn new(root: impl Into<PathBuf>, client_id: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            client_id: client_id.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Client id stamped on every history entry this handle writes.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    fn notebooks_dir(&self) -> PathBuf {
        self.root.join("notebooks")
    }

    pub fn notebook_dir(&self, notebook_id: Uuid) -> PathBuf {
        self.notebooks_dir().join(notebook_id.to_string())
    }

    pub fn pages_dir(&self, notebook_id: Uuid) -> PathBuf {
        self.notebook_dir(notebook_id).join("pages")
    }

    pub fn page_path(&self, notebook_id: Uuid, page_id: Uuid) -> PathBuf {
        self.pages_dir(notebook_id).join(format!("{page_id}.json"))
    }

    pub fn oplog(&self, notebook_id: Uuid, page_id: Uuid) -> Oplog {
        Oplog::new(self.pages_dir(notebook_id).join(format!("{page_id}.oplog")))
    }

    pub fn database_path(&self, notebook_id: Uuid, page_id: Uuid) -> PathBuf {
        self.notebook_dir(notebook_id)
            .join("files")
            .join(format!("{page_id}.database"))
    }

    fn sections_path(&self, notebook_id: Uuid) -> PathBuf {
        self.notebook_dir(notebook_id).join("sections.json")
    }

    fn folders_path(&self, notebook_id: Uuid) -> PathBuf {
        self.notebook_dir(notebook_id).join("folders.json")
    }

    // ── Notebooks ──────────────────────────────────────────────────

    /// Every readable notebook, ordered by directory name. Directories
    /// without a readable `notebook.json` are skipped.
    pub fn list_notebooks(&self) -> Result<Vec<NotebookSummary>> {
        let mut out = Vec::new();
        for dir in sorted_entries(&self.notebooks_dir())? {
            if !dir.is_dir() {
                continue;
            }
            let Some(nb) = read_json_lenient::<Notebook>(&dir.join("notebook.json")) else {
                continue;
            };
            let page_count = sorted_entries(&dir.join("pages"))?
                .iter()
                .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
                .count();
            out.push(NotebookSummary {
                id: nb.id,
                name: nb.name,
                icon: nb.icon,
                sections_enabled: nb.sections_enabled,
                archived: nb.archived,
                page_count,
            });
        }
        log::debug!("listed {} notebooks under {}", out.len(), self.root.display());
        Ok(out)
    }

    /// Reads `notebook.json` of one notebook.
    ///
    /// # Errors
    ///
    /// Returns [`NousError::NotFound`] if the notebook does not exist.
    pub fn read_notebook(&self, notebook_id: Uuid) -> Result<Notebook> {
        read_json(&self.notebook_dir(notebook_id).join("notebook.json"))?
            .ok_or_else(|| NousError::not_found("Notebook", notebook_id.to_string()))
    }

    pub fn create_notebook(&self, name: &str) -> Result<Notebook> {
        let notebook = Notebook::new(require_name(name, "Notebook")?);
        let dir = self.notebook_dir(notebook.id);
        fs::create_dir_all(dir.join("pages"))?;
        write_json_atomic(&dir.join("notebook.json"), &notebook)?;
        log::info!("created notebook {} '{}'", notebook.id, notebook.name);
        Ok(notebook)
    }

    /// Resolves a notebook by UUID or by name.
    pub fn resolve_notebook(&self, query: &str) -> Result<Notebook> {
        if is_uuid(query) {
            let id = Uuid::parse_str(query.trim())
                .map_err(|e| NousError::InvalidInput(e.to_string()))?;
            return self.read_notebook(id);
        }
        let notebooks = self.list_notebooks()?;
        let id = resolve(query, &notebooks)?.id;
        self.read_notebook(id)
    }

    // ── Sections ───────────────────────────────────────────────────

    /// Sections of a notebook, in stored order. A missing or corrupt
    /// `sections.json` lists as empty.
    pub fn list_sections(&self, notebook_id: Uuid) -> Result<Vec<Section>> {
        Ok(read_json_lenient(&self.sections_path(notebook_id)).unwrap_or_default())
    }

    pub fn resolve_section(&self, notebook_id: Uuid, query: &str) -> Result<Section> {
        let sections = self.list_sections(notebook_id)?;
        resolve(query, &sections).cloned()
    }

    /// Adds a section at the end and turns sections on for the notebook.
    pub fn create_section(
        &self,
        notebook_id: Uuid,
        name: &str,
        color: Option<&str>,
    ) -> Result<Section> {
        let mut notebook = self.read_notebook(notebook_id)?;
        let path = self.sections_path(notebook_id);
        let mut sections: Vec<Section> = read_json(&path)?.unwrap_or_default();

        let section = Section {
            id: Uuid::new_v4(),
            notebook_id: Some(notebook_id),
            name: require_name(name, "Section")?,
            color: color.map(String::from),
            position: sections.iter().map(|s| s.position + 1).max().unwrap_or(0),
            extra: Default::default(),
        };
        sections.push(section.clone());
        write_json_atomic(&path, &sections)?;

        if !notebook.sections_enabled {
            notebook.sections_enabled = true;
            notebook.updated_at = Some(Utc::now());
            write_json_atomic(&self.notebook_dir(notebook_id).join("notebook.json"), &notebook)?;
        }
        log::info!("created section {} '{}' in notebook {notebook_id}", section.id, section.name);
        Ok(section)
    }

    // ── Folders ────────────────────────────────────────────────────

    /// All folders, strictly read: mutations must not overwrite a file they
    /// could not parse.
    fn load_folders(&self, notebook_id: Uuid) -> Result<Vec<Folder>> {
        Ok(read_json(&self.folders_path(notebook_id))?.unwrap_or_default())
    }

    fn save_folders(&self, notebook_id: Uuid, folders: &[Folder]) -> Result<()> {
        write_json_atomic(&self.folders_path(notebook_id), folders)
    }

    /// Folders of a notebook, optionally limited to one section. Archived
    /// folders are left out unless `include_archived` is set.
    pub fn list_folders(
        &self,
        notebook_id: Uuid,
        section_id: Option<Uuid>,
        include_archived: bool,
    ) -> Result<Vec<Folder>> {
        let folders: Vec<Folder> =
            read_json_lenient(&self.folders_path(notebook_id)).unwrap_or_default();
        Ok(folders
            .into_iter()
            .filter(|f| include_archived || !f.is_archived)
            .filter(|f| section_id.is_none() || f.section_id == section_id)
            .collect())
    }

    /// Resolves a folder by UUID or name, archived folders included.
    pub fn resolve_folder(&self, notebook_id: Uuid, query: &str) -> Result<Folder> {
        let folders = self.list_folders(notebook_id, None, true)?;
        resolve(query, &folders).cloned()
    }

    /// Creates a folder after its last sibling. A sub-folder with no section
    /// given inherits its parent's section.
    ///
    /// # Errors
    ///
    /// Returns [`NousError::NotFound`] if `parent_id` or `section_id` does
    /// not exist in the notebook.
    pub fn create_folder(
        &self,
        notebook_id: Uuid,
        name: &str,
        parent_id: Option<Uuid>,
        section_id: Option<Uuid>,
    ) -> Result<Folder> {
        self.read_notebook(notebook_id)?;
        let mut folders = self.load_folders(notebook_id)?;

        let mut section_id = section_id;
        if let Some(pid) = parent_id {
            let parent = folders
                .iter()
                .find(|f| f.id == pid)
                .ok_or_else(|| NousError::not_found("Folder", pid.to_string()))?;
            section_id = section_id.or(parent.section_id);
        }
        if let Some(sid) = section_id {
            if !self.list_sections(notebook_id)?.iter().any(|s| s.id == sid) {
                return Err(NousError::not_found("Section", sid.to_string()));
            }
        }

        let mut folder = Folder::new(notebook_id, require_name(name, "Folder")?);
        folder.parent_id = parent_id;
        folder.section_id = section_id;
        folder.position = next_position(&folders, parent_id);
        folders.push(folder.clone());
        self.save_folders(notebook_id, &folders)?;
        log::info!("created folder {} '{}' in notebook {notebook_id}", folder.id, folder.name);
        Ok(folder)
    }

    /// Re-parents a folder, placing it after its new siblings.
    ///
    /// # Errors
    ///
    /// Returns [`NousError::InvalidInput`] if the move would make the folder
    /// its own ancestor, [`NousError::NotFound`] for unknown ids.
    pub fn move_folder(
        &self,
        notebook_id: Uuid,
        folder_id: Uuid,
        new_parent_id: Option<Uuid>,
    ) -> Result<Folder> {
        let mut folders = self.load_folders(notebook_id)?;
        let index = folder_index(&folders, folder_id)?;

        if new_parent_id == Some(folder_id) {
            return Err(NousError::InvalidInput("A folder cannot be its own parent".into()));
        }
        // Walk the ancestor chain of the new parent looking for the folder.
        let mut current = new_parent_id;
        let mut steps = 0;
        while let Some(id) = current {
            if id == folder_id {
                return Err(NousError::InvalidInput("Move would create a cycle".into()));
            }
            steps += 1;
            if steps > folders.len() {
                return Err(NousError::InvalidInput("Folder tree already contains a cycle".into()));
            }
            current = folders[folder_index(&folders, id)?].parent_id;
        }

        let position = next_position(&folders, new_parent_id);
        let folder = &mut folders[index];
        folder.parent_id = new_parent_id;
        folder.position = position;
        let moved = folder.clone();
        self.save_folders(notebook_id, &folders)?;
        log::info!("moved folder {folder_id} under {new_parent_id:?}");
        Ok(moved)
    }

    pub fn archive_folder(&self, notebook_id: Uuid, folder_id: Uuid, archived: bool) -> Result<Folder> {
        let mut folders = self.load_folders(notebook_id)?;
        let index = folder_index(&folders, folder_id)?;
        folders[index].is_archived = archived;
        let folder = folders[index].clone();
        self.save_folders(notebook_id, &folders)?;
        log::info!("set archived={archived} on folder {folder_id}");
        Ok(folder)
    }
}

fn folder_index(folders: &[Folder], id: Uuid) -> Result<usize> {
    folders
        .iter()
        .position(|f| f.id == id)
        .ok_or_else(|| NousError::not_found("Folder", id.to_string()))
}

fn next_position(folders: &[Folder], parent_id: Option<Uuid>) -> i64 {
    folders
        .iter()
        .filter(|f| f.parent_id == parent_id)
        .map(|f| f.position + 1)
        .max()
        .unwrap_or(0)
}

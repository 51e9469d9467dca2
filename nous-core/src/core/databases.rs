//! Database pages: a `pageType: "database"` page plus its `.database`
//! sibling file. The two files are written independently.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::core::database::{build_properties, DatabaseContent, PropertySpec, RowUpdate};
use crate::core::library::Library;
use crate::core::page::{Page, PageType, Tags};
use crate::core::pages::{NewPage, PageFilter};
use crate::core::storage::{read_json, read_json_lenient, write_json_atomic};
use crate::{NousError, Result};

/// A database page as listed, with table dimensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseSummary {
    pub id: Uuid,
    pub title: String,
    pub tags: Tags,
    pub folder_id: Option<Uuid>,
    pub section_id: Option<Uuid>,
    pub property_count: usize,
    pub row_count: usize,
}

impl Library {
    /// Database pages of a notebook, most recently updated first. A missing
    /// or unreadable `.database` file counts as zero properties and rows.
    pub fn list_databases(
        &self,
        notebook_id: Uuid,
        folder_id: Option<Uuid>,
        section_id: Option<Uuid>,
    ) -> Result<Vec<DatabaseSummary>> {
        let filter = PageFilter {
            folder_id,
            section_id,
            ..PageFilter::default()
        };
        let summaries = self
            .list_pages(notebook_id, &filter)?
            .into_iter()
            .filter(|p| p.page_type == PageType::Database)
            .map(|p| {
                let db: Option<DatabaseContent> =
                    read_json_lenient(&self.database_path(notebook_id, p.id));
                DatabaseSummary {
                    id: p.id,
                    title: p.title,
                    tags: p.tags,
                    folder_id: p.folder_id,
                    section_id: p.section_id,
                    property_count: db.as_ref().map_or(0, |d| d.properties.len()),
                    row_count: db.as_ref().map_or(0, |d| d.rows.len()),
                }
            })
            .collect();
        Ok(summaries)
    }

    /// Reads a database page and its table.
    ///
    /// # Errors
    ///
    /// Returns [`NousError::InvalidInput`] if the page is not a database
    /// page, and [`NousError::NotFound`] if the page or its `.database`
    /// file is missing.
    pub fn read_database(&self, notebook_id: Uuid, page_id: Uuid) -> Result<(Page, DatabaseContent)> {
        let page = self.read_page(notebook_id, page_id)?;
        if !page.is_database() {
            return Err(NousError::InvalidInput(format!(
                "page '{}' is not a database",
                page.title
            )));
        }
        let content = read_json(&self.database_path(notebook_id, page_id))?
            .ok_or_else(|| NousError::not_found("Database", page_id.to_string()))?;
        Ok((page, content))
    }

    fn write_database(&self, notebook_id: Uuid, page_id: Uuid, content: &DatabaseContent) -> Result<()> {
        write_json_atomic(&self.database_path(notebook_id, page_id), content)
    }

    /// Creates a database page. The `.database` file is written first under
    /// the page's pre-bound id, so an interrupted create leaves at worst an
    /// unreferenced table file.
    pub fn create_database(
        &self,
        notebook_id: Uuid,
        new: NewPage,
        properties: &[PropertySpec],
    ) -> Result<(Page, DatabaseContent)> {
        self.read_notebook(notebook_id)?;
        let content = DatabaseContent::new(build_properties(properties)?);
        let page_id = new.id.unwrap_or_else(Uuid::new_v4);
        if self.page_path(notebook_id, page_id).exists() {
            return Err(NousError::Conflict(format!("page {page_id} already exists")));
        }

        self.write_database(notebook_id, page_id, &content)?;
        let page = self.create_page(
            notebook_id,
            NewPage {
                id: Some(page_id),
                page_type: PageType::Database,
                blocks: Vec::new(),
                ..new
            },
        )?;
        log::info!(
            "created database {page_id} '{}' with {} properties",
            page.title,
            content.properties.len()
        );
        Ok((page, content))
    }

    /// Appends rows given as property-name keyed maps. Returns the new row ids.
    pub fn add_database_rows(
        &self,
        notebook_id: Uuid,
        page_id: Uuid,
        rows: &[Map<String, Value>],
    ) -> Result<Vec<String>> {
        let (_, mut content) = self.read_database(notebook_id, page_id)?;
        let ids = content.add_rows(rows)?;
        self.write_database(notebook_id, page_id, &content)?;
        log::info!("added {} rows to database {page_id}", ids.len());
        Ok(ids)
    }

    /// Applies every update or none: all rows and properties are resolved
    /// before the file is written. Returns the number of rows updated.
    pub fn update_database_rows(
        &self,
        notebook_id: Uuid,
        page_id: Uuid,
        updates: &[RowUpdate],
    ) -> Result<usize> {
        let (_, mut content) = self.read_database(notebook_id, page_id)?;
        for update in updates {
            content.update_row(&update.row, &update.cells)?;
        }
        self.write_database(notebook_id, page_id, &content)?;
        log::info!("updated {} rows in database {page_id}", updates.len());
        Ok(updates.len())
    }
}

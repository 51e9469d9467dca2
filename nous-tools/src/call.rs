//! Serialized tool invocations: `{"tool": "<name>", "args": {...}}`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use nous_core::{PropertySpec, Result, RowUpdate};

use crate::Toolbox;

/// Output format for page and database reads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageFormat {
    #[default]
    Markdown,
    Json,
}

/// Tags given either as one comma-separated string or as a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagsArg {
    Csv(String),
    List(Vec<String>),
}

impl TagsArg {
    /// Trimmed, non-empty tags in the given order.
    pub fn to_vec(&self) -> Vec<String> {
        let raw: Vec<&str> = match self {
            Self::Csv(s) => s.split(',').collect(),
            Self::List(items) => items.iter().map(String::as_str).collect(),
        };
        raw.into_iter()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    }
}

fn default_page_limit() -> usize {
    50
}

fn default_search_limit() -> usize {
    20
}

/// One tool invocation with its arguments. Names of notebooks, sections,
/// folders, pages and databases may be UUIDs or case-insensitive prefixes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tool", content = "args", rename_all = "snake_case")]
pub enum ToolCall {
    ListNotebooks,
    ListSections {
        notebook: String,
    },
    ListFolders {
        notebook: String,
        #[serde(default)]
        section: Option<String>,
        #[serde(default)]
        include_archived: bool,
    },
    ListPages {
        notebook: String,
        #[serde(default)]
        folder: Option<String>,
        #[serde(default)]
        section: Option<String>,
        #[serde(default)]
        tag: Option<String>,
        #[serde(default = "default_page_limit")]
        limit: usize,
    },
    GetPage {
        notebook: String,
        page: String,
        #[serde(default)]
        format: PageFormat,
    },
    SearchPages {
        query: String,
        #[serde(default)]
        notebook: Option<String>,
        #[serde(default = "default_search_limit")]
        limit: usize,
    },
    CreatePage {
        notebook: String,
        title: String,
        /// Markdown body.
        #[serde(default)]
        content: Option<String>,
        #[serde(default)]
        tags: Option<TagsArg>,
        #[serde(default)]
        folder: Option<String>,
        #[serde(default)]
        section: Option<String>,
    },
    AppendToPage {
        notebook: String,
        page: String,
        content: String,
    },
    UpdatePage {
        notebook: String,
        page: String,
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        content: Option<String>,
        #[serde(default)]
        tags: Option<TagsArg>,
    },
    CreateFolder {
        notebook: String,
        name: String,
        #[serde(default)]
        parent: Option<String>,
        #[serde(default)]
        section: Option<String>,
    },
    MovePage {
        notebook: String,
        page: String,
        /// Target folder; omit to move the page out of all folders.
        #[serde(default)]
        folder: Option<String>,
        #[serde(default)]
        section: Option<String>,
    },
    ManageTags {
        notebook: String,
        page: String,
        #[serde(default)]
        add: Option<TagsArg>,
        #[serde(default)]
        remove: Option<TagsArg>,
    },
    ListDatabases {
        notebook: String,
        #[serde(default)]
        folder: Option<String>,
        #[serde(default)]
        section: Option<String>,
    },
    GetDatabase {
        notebook: String,
        database: String,
        #[serde(default)]
        format: PageFormat,
    },
    CreateDatabase {
        notebook: String,
        title: String,
        properties: Vec<PropertySpec>,
        #[serde(default)]
        tags: Option<TagsArg>,
        #[serde(default)]
        folder: Option<String>,
    },
    AddDatabaseRows {
        notebook: String,
        database: String,
        rows: Vec<Map<String, Value>>,
    },
    UpdateDatabaseRows {
        notebook: String,
        database: String,
        updates: Vec<RowUpdate>,
    },
}

impl ToolCall {
    /// The wire name of the tool.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ListNotebooks => "list_notebooks",
            Self::ListSections { .. } => "list_sections",
            Self::ListFolders { .. } => "list_folders",
            Self::ListPages { .. } => "list_pages",
            Self::GetPage { .. } => "get_page",
            Self::SearchPages { .. } => "search_pages",
            Self::CreatePage { .. } => "create_page",
            Self::AppendToPage { .. } => "append_to_page",
            Self::UpdatePage { .. } => "update_page",
            Self::CreateFolder { .. } => "create_folder",
            Self::MovePage { .. } => "move_page",
            Self::ManageTags { .. } => "manage_tags",
            Self::ListDatabases { .. } => "list_databases",
            Self::GetDatabase { .. } => "get_database",
            Self::CreateDatabase { .. } => "create_database",
            Self::AddDatabaseRows { .. } => "add_database_rows",
            Self::UpdateDatabaseRows { .. } => "update_database_rows",
        }
    }

    pub(crate) fn run(&self, tools: &Toolbox) -> Result<String> {
        match self {
            Self::ListNotebooks => tools.list_notebooks(),
            Self::ListSections { notebook } => tools.list_sections(notebook),
            Self::ListFolders {
                notebook,
                section,
                include_archived,
            } => tools.list_folders(notebook, section.as_deref(), *include_archived),
            Self::ListPages {
                notebook,
                folder,
                section,
                tag,
                limit,
            } => tools.list_pages(
                notebook,
                folder.as_deref(),
                section.as_deref(),
                tag.as_deref(),
                *limit,
            ),
            Self::GetPage {
                notebook,
                page,
                format,
            } => tools.get_page(notebook, page, *format),
            Self::SearchPages {
                query,
                notebook,
                limit,
            } => tools.search_pages(query, notebook.as_deref(), *limit),
            Self::CreatePage {
                notebook,
                title,
                content,
                tags,
                folder,
                section,
            } => tools.create_page(
                notebook,
                title,
                content.as_deref(),
                tags.as_ref(),
                folder.as_deref(),
                section.as_deref(),
            ),
            Self::AppendToPage {
                notebook,
                page,
                content,
            } => tools.append_to_page(notebook, page, content),
            Self::UpdatePage {
                notebook,
                page,
                title,
                content,
                tags,
            } => tools.update_page(
                notebook,
                page,
                title.as_deref(),
                content.as_deref(),
                tags.as_ref(),
            ),
            Self::CreateFolder {
                notebook,
                name,
                parent,
                section,
            } => tools.create_folder(notebook, name, parent.as_deref(), section.as_deref()),
            Self::MovePage {
                notebook,
                page,
                folder,
                section,
            } => tools.move_page(notebook, page, folder.as_deref(), section.as_deref()),
            Self::ManageTags {
                notebook,
                page,
                add,
                remove,
            } => tools.manage_tags(notebook, page, add.as_ref(), remove.as_ref()),
            Self::ListDatabases {
                notebook,
                folder,
                section,
            } => tools.list_databases(notebook, folder.as_deref(), section.as_deref()),
            Self::GetDatabase {
                notebook,
                database,
                format,
            } => tools.get_database(notebook, database, *format),
            Self::CreateDatabase {
                notebook,
                title,
                properties,
                tags,
                folder,
            } => tools.create_database(notebook, title, properties, tags.as_ref(), folder.as_deref()),
            Self::AddDatabaseRows {
                notebook,
                database,
                rows,
            } => tools.add_database_rows(notebook, database, rows),
            Self::UpdateDatabaseRows {
                notebook,
                database,
                updates,
            } => tools.update_database_rows(notebook, database, updates),
        }
    }
}

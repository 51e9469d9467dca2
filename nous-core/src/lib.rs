//! Core library for Nous, a local-first notebook store.
//!
//! The primary entry point is [`Library`], a handle on one library directory
//! of notebooks, sections, folders and pages. Every page mutation goes
//! through `Library` methods, which journal it to the page's hash-chained
//! oplog before the new page file becomes visible.
//!
//! Types are re-exported from their respective sub-modules for convenience;
//! consumers should import from the crate root rather than the `core` module.

pub mod core;

// Re-export commonly used types.
#[doc(inline)]
pub use core::{
    block::{Block, BlockData, BlockType, EDITOR_VERSION},
    database::{CellValue, DatabaseContent, PropertyDef, PropertySpec, PropertyType, RowRef, RowUpdate},
    databases::DatabaseSummary,
    diff::{diff_blocks, reuse_block_ids},
    error::{NousError, Result},
    hash::{content_hash, GENESIS},
    library::Library,
    markdown::{blocks_to_markdown, markdown_to_blocks, page_to_markdown, split_front_matter, FrontMatter},
    notebook::{Folder, Notebook, NotebookSummary, NotebookType, Section},
    oplog::{BlockChange, BlockOp, HistoryStatus, OpType, Oplog, OplogEntry},
    page::{Page, PageContent, PageSummary, PageType, Tags},
    pages::{NewPage, PageFilter, PageUpdate},
    resolve::{is_uuid, resolve, Named},
    search::{MatchKind, SearchHit},
    settings::{LibraryEntry, Settings},
};

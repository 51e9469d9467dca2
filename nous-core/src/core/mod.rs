//! Internal domain modules for the Nous core library.
//!
//! All public types from these modules are re-exported at the crate root
//! with `#[doc(inline)]`; import from there in preference to this module.

pub mod block;
pub mod database;
pub mod databases;
pub mod diff;
pub mod error;
pub mod hash;
pub mod library;
pub mod markdown;
pub mod notebook;
pub mod oplog;
pub mod page;
pub mod pages;
pub mod resolve;
pub mod search;
pub mod settings;
pub mod storage;

#[doc(inline)]
pub use block::{Block, BlockData, BlockType, EDITOR_VERSION};
#[doc(inline)]
pub use database::{CellValue, DatabaseContent, PropertyDef, PropertySpec, PropertyType, RowRef, RowUpdate};
#[doc(inline)]
pub use databases::DatabaseSummary;
#[doc(inline)]
pub use diff::{diff_blocks, reuse_block_ids};
#[doc(inline)]
pub use error::{NousError, Result};
#[doc(inline)]
pub use hash::{content_hash, GENESIS};
#[doc(inline)]
pub use library::Library;
#[doc(inline)]
pub use markdown::{blocks_to_markdown, markdown_to_blocks, page_to_markdown, split_front_matter};
#[doc(inline)]
pub use notebook::{Folder, Notebook, NotebookSummary, NotebookType, Section};
#[doc(inline)]
pub use oplog::{BlockChange, BlockOp, HistoryStatus, OpType, Oplog, OplogEntry};
#[doc(inline)]
pub use page::{Page, PageContent, PageSummary, PageType, Tags};
#[doc(inline)]
pub use pages::{NewPage, PageFilter, PageUpdate};
#[doc(inline)]
pub use resolve::{resolve, Named};
#[doc(inline)]
pub use search::{MatchKind, SearchHit};
#[doc(inline)]
pub use settings::{LibraryEntry, Settings};

//! Block model for page content.
//!
//! A page body is an ordered list of [`Block`]s in the Editor.js shape
//! `{id, type, data}`. The `data` payload is decoded into a typed
//! [`BlockData`] variant keyed by `type`. Every typed payload keeps the
//! fields it does not interpret in an `extra` map, and payloads that do not
//! decode at all are kept verbatim in [`BlockData::Other`], so reading and
//! rewriting a page never alters content written by another client.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::NousError;

/// Editor format version stamped on newly built page content.
pub const EDITOR_VERSION: &str = "2.28.0";

/// The block types this crate interprets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockType {
    Paragraph,
    Header,
    List,
    Checklist,
    Code,
    Quote,
    Table,
    Callout,
    Image,
    Delimiter,
}

impl BlockType {
    pub const ALL: [BlockType; 10] = [
        Self::Paragraph,
        Self::Header,
        Self::List,
        Self::Checklist,
        Self::Code,
        Self::Quote,
        Self::Table,
        Self::Callout,
        Self::Image,
        Self::Delimiter,
    ];

    /// The `type` string used on disk.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Paragraph => "paragraph",
            Self::Header => "header",
            Self::List => "list",
            Self::Checklist => "checklist",
            Self::Code => "code",
            Self::Quote => "quote",
            Self::Table => "table",
            Self::Callout => "callout",
            Self::Image => "image",
            Self::Delimiter => "delimiter",
        }
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlockType {
    type Err = NousError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| NousError::InvalidInput(format!("unknown block type '{s}'")))
    }
}

/// Payload of `paragraph` and `quote` blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextData {
    pub text: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeaderData {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u8>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl HeaderData {
    /// Heading level clamped to 1..=6, defaulting to 2.
    pub fn level(&self) -> u8 {
        self.level.unwrap_or(2).clamp(1, 6)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    pub items: Vec<ListItem>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ListData {
    pub fn is_ordered(&self) -> bool {
        self.style.as_deref() == Some("ordered")
    }
}

/// A list entry: either a bare string (flat lists) or an object with nested
/// children (nested lists).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ListItem {
    Text(String),
    Nested(NestedListItem),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NestedListItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<ListItem>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ListItem {
    /// The item's own text, ignoring nested children.
    pub fn text(&self) -> &str {
        match self {
            Self::Text(s) => s,
            Self::Nested(item) => item
                .content
                .as_deref()
                .or(item.text.as_deref())
                .unwrap_or(""),
        }
    }

    pub fn children(&self) -> &[ListItem] {
        match self {
            Self::Text(_) => &[],
            Self::Nested(item) => item.items.as_deref().unwrap_or(&[]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChecklistData {
    pub items: Vec<ChecklistItem>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checked: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChecklistItem {
    pub fn is_checked(&self) -> bool {
        self.checked.unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeData {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub with_headings: Option<bool>,
    pub content: Vec<Vec<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalloutData {
    /// Callout flavour (`info`, `warning`, `tip`, `danger`).
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<ImageFile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ImageData {
    pub fn url(&self) -> Option<&str> {
        self.file.as_ref().and_then(|f| f.url.as_deref())
    }
}

/// Typed block payload. The variant determines the block's `type`.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockData {
    Paragraph(TextData),
    Header(HeaderData),
    List(ListData),
    Checklist(ChecklistData),
    Code(CodeData),
    Quote(TextData),
    Table(TableData),
    Callout(CalloutData),
    Image(ImageData),
    Delimiter(Map<String, Value>),
    /// A block type this crate does not know, or a known type whose payload
    /// did not match the expected shape. Kept byte-for-byte.
    Other { block_type: String, data: Value },
}

impl BlockData {
    /// Decodes `data` for the given `type` string, falling back to
    /// [`BlockData::Other`] when the type is unknown or the payload is off-shape.
    pub fn decode(block_type: &str, data: Value) -> Self {
        let Ok(kind) = block_type.parse::<BlockType>() else {
            return Self::Other {
                block_type: block_type.to_string(),
                data,
            };
        };
        let decoded = Self::decode_typed(kind, data.clone());
        match decoded {
            // Explicit nulls and similar encodings do not survive the typed
            // struct; keep those payloads as written.
            Ok(typed) if typed.to_value() == data => typed,
            Ok(_) => {
                log::debug!("keeping '{block_type}' block payload verbatim: lossy re-encode");
                Self::Other {
                    block_type: block_type.to_string(),
                    data,
                }
            }
            Err(e) => {
                log::debug!("keeping off-shape '{block_type}' block payload verbatim: {e}");
                Self::Other {
                    block_type: block_type.to_string(),
                    data,
                }
            }
        }
    }

    fn decode_typed(kind: BlockType, data: Value) -> serde_json::Result<Self> {
        match kind {
            BlockType::Paragraph => serde_json::from_value(data).map(Self::Paragraph),
            BlockType::Header => serde_json::from_value(data).map(Self::Header),
            BlockType::List => serde_json::from_value(data).map(Self::List),
            BlockType::Checklist => serde_json::from_value(data).map(Self::Checklist),
            BlockType::Code => serde_json::from_value(data).map(Self::Code),
            BlockType::Quote => serde_json::from_value(data).map(Self::Quote),
            BlockType::Table => serde_json::from_value(data).map(Self::Table),
            BlockType::Callout => serde_json::from_value(data).map(Self::Callout),
            BlockType::Image => serde_json::from_value(data).map(Self::Image),
            BlockType::Delimiter => serde_json::from_value(data).map(Self::Delimiter),
        }
    }

    /// A typed view for reading. A verbatim payload of a known type is
    /// decoded on the fly when it fits; the stored form is untouched.
    pub fn view(&self) -> std::borrow::Cow<'_, Self> {
        use std::borrow::Cow;
        match self {
            Self::Other { block_type, data } => block_type
                .parse::<BlockType>()
                .ok()
                .and_then(|kind| Self::decode_typed(kind, data.clone()).ok())
                .map_or(Cow::Borrowed(self), Cow::Owned),
            typed => Cow::Borrowed(typed),
        }
    }

    /// The interpreted type, or `None` for [`BlockData::Other`].
    pub fn kind(&self) -> Option<BlockType> {
        Some(match self {
            Self::Paragraph(_) => BlockType::Paragraph,
            Self::Header(_) => BlockType::Header,
            Self::List(_) => BlockType::List,
            Self::Checklist(_) => BlockType::Checklist,
            Self::Code(_) => BlockType::Code,
            Self::Quote(_) => BlockType::Quote,
            Self::Table(_) => BlockType::Table,
            Self::Callout(_) => BlockType::Callout,
            Self::Image(_) => BlockType::Image,
            Self::Delimiter(_) => BlockType::Delimiter,
            Self::Other { .. } => return None,
        })
    }

    /// The on-disk `type` string.
    pub fn type_name(&self) -> &str {
        match self {
            Self::Other { block_type, .. } => block_type,
            other => other.kind().map(BlockType::as_str).unwrap_or_default(),
        }
    }

    /// Encodes the payload back into its JSON `data` object.
    pub fn to_value(&self) -> Value {
        let encoded = match self {
            Self::Paragraph(d) | Self::Quote(d) => serde_json::to_value(d),
            Self::Header(d) => serde_json::to_value(d),
            Self::List(d) => serde_json::to_value(d),
            Self::Checklist(d) => serde_json::to_value(d),
            Self::Code(d) => serde_json::to_value(d),
            Self::Table(d) => serde_json::to_value(d),
            Self::Callout(d) => serde_json::to_value(d),
            Self::Image(d) => serde_json::to_value(d),
            Self::Delimiter(d) => Ok(Value::Object(d.clone())),
            Self::Other { data, .. } => Ok(data.clone()),
        };
        // Plain structs with string-keyed maps always encode.
        encoded.unwrap_or_default()
    }
}

/// One addressable unit of page content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawBlock", into = "RawBlock")]
pub struct Block {
    /// Stable across edits; the diff key.
    pub id: String,
    pub data: BlockData,
}

/// Wire shape of a block. Field order is part of the content hash.
#[derive(Serialize, Deserialize)]
struct RawBlock {
    id: String,
    #[serde(rename = "type")]
    block_type: String,
    data: Value,
}

impl From<RawBlock> for Block {
    fn from(raw: RawBlock) -> Self {
        Self {
            id: raw.id,
            data: BlockData::decode(&raw.block_type, raw.data),
        }
    }
}

impl From<Block> for RawBlock {
    fn from(block: Block) -> Self {
        Self {
            block_type: block.data.type_name().to_string(),
            data: block.data.to_value(),
            id: block.id,
        }
    }
}

fn new_block_id() -> String {
    Uuid::new_v4().to_string()
}

impl Block {
    /// Creates a block with a fresh UUID.
    pub fn new(data: BlockData) -> Self {
        Self {
            id: new_block_id(),
            data,
        }
    }

    pub fn with_id(id: impl Into<String>, data: BlockData) -> Self {
        Self { id: id.into(), data }
    }

    pub fn paragraph(text: impl Into<String>) -> Self {
        Self::new(BlockData::Paragraph(TextData {
            text: text.into(),
            extra: Map::new(),
        }))
    }

    pub fn header(text: impl Into<String>, level: u8) -> Self {
        Self::new(BlockData::Header(HeaderData {
            text: text.into(),
            level: Some(level),
            extra: Map::new(),
        }))
    }

    pub fn quote(text: impl Into<String>) -> Self {
        Self::new(BlockData::Quote(TextData {
            text: text.into(),
            extra: Map::new(),
        }))
    }

    pub fn code(code: impl Into<String>, language: impl Into<String>) -> Self {
        Self::new(BlockData::Code(CodeData {
            code: code.into(),
            language: Some(language.into()),
            extra: Map::new(),
        }))
    }

    pub fn list(items: Vec<String>, ordered: bool) -> Self {
        Self::new(BlockData::List(ListData {
            style: Some(if ordered { "ordered" } else { "unordered" }.to_string()),
            items: items.into_iter().map(ListItem::Text).collect(),
            extra: Map::new(),
        }))
    }

    pub fn checklist(items: Vec<(String, bool)>) -> Self {
        Self::new(BlockData::Checklist(ChecklistData {
            items: items
                .into_iter()
                .map(|(text, checked)| ChecklistItem {
                    text,
                    checked: Some(checked),
                    extra: Map::new(),
                })
                .collect(),
            extra: Map::new(),
        }))
    }

    pub fn delimiter() -> Self {
        Self::new(BlockData::Delimiter(Map::new()))
    }

    /// The on-disk `type` string.
    pub fn type_name(&self) -> &str {
        self.data.type_name()
    }

    /// Plain text used for search: paragraph/header/quote text, code body,
    /// list and checklist item text, callout title and body, table cells.
    /// Images, delimiters and unknown blocks contribute nothing.
    pub fn plain_text(&self) -> String {
        match self.data.view().as_ref() {
            BlockData::Paragraph(d) | BlockData::Quote(d) => d.text.clone(),
            BlockData::Header(d) => d.text.clone(),
            BlockData::Code(d) => d.code.clone(),
            BlockData::List(d) => {
                let mut parts = Vec::new();
                collect_list_text(&d.items, &mut parts);
                parts.join(" ")
            }
            BlockData::Checklist(d) => d
                .items
                .iter()
                .map(|i| i.text.as_str())
                .collect::<Vec<_>>()
                .join(" "),
            BlockData::Callout(d) => format!(
                "{} {}",
                d.title.as_deref().unwrap_or(""),
                d.content.as_deref().unwrap_or("")
            ),
            BlockData::Table(d) => d
                .content
                .iter()
                .flatten()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(" "),
            BlockData::Image(_) | BlockData::Delimiter(_) | BlockData::Other { .. } => {
                String::new()
            }
        }
    }
}

fn collect_list_text<'a>(items: &'a [ListItem], out: &mut Vec<&'a str>) {
    for item in items {
        out.push(item.text());
        collect_list_text(item.children(), out);
    }
}

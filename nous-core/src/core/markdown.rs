//! Conversion between page content and markdown.
//!
//! Export renders every interpreted block type, turning the inline HTML the
//! editor stores (`<b>`, `<a href>`, wiki-links, ...) into markdown syntax.
//! Import parses CommonMark with tables and task lists into blocks, writing
//! inline formatting back as the editor's HTML.

use chrono::{DateTime, SecondsFormat, Utc};
use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

use crate::core::block::{
    Block, BlockData, CalloutData, CodeData, ImageData, ImageFile, ListData, ListItem,
    NestedListItem, TableData,
};
use crate::core::page::Page;

struct InlinePatterns {
    wiki_link: Regex,
    block_ref: Regex,
    bold: Regex,
    italic: Regex,
    code: Regex,
    link: Regex,
    mark: Regex,
    tag: Regex,
    wiki_source: Regex,
    callout: Regex,
}

fn patterns() -> &'static InlinePatterns {
    static PATTERNS: OnceLock<InlinePatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| InlinePatterns {
        wiki_link: Regex::new(r#"<wiki-link[^>]*data-page-title="([^"]*)"[^>]*>[^<]*</wiki-link>"#)
            .expect("valid wiki-link regex"),
        block_ref: Regex::new(r#"<block-ref[^>]*data-block-id="([^"]*)"[^>]*>[^<]*</block-ref>"#)
            .expect("valid block-ref regex"),
        bold: Regex::new(r"(?s)<(?:b|strong)>(.*?)</(?:b|strong)>").expect("valid bold regex"),
        italic: Regex::new(r"(?s)<(?:i|em)>(.*?)</(?:i|em)>").expect("valid italic regex"),
        code: Regex::new(r"(?s)<code>(.*?)</code>").expect("valid code regex"),
        link: Regex::new(r#"(?s)<a[^>]*href="([^"]*)"[^>]*>(.*?)</a>"#).expect("valid link regex"),
        mark: Regex::new(r"(?s)<mark[^>]*>(.*?)</mark>").expect("valid mark regex"),
        tag: Regex::new(r"<[^>]+>").expect("valid tag regex"),
        wiki_source: Regex::new(r#"\[\[([^\[\]<>"]+)\]\]"#).expect("valid wiki source regex"),
        callout: Regex::new(r"^\[!(\w+)\][ \t]*(.*)$").expect("valid callout regex"),
    })
}

fn decode_entities(text: &str) -> String {
    text.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&nbsp;", " ")
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_yaml(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Converts editor inline HTML to markdown. Wiki-links become `[[title]]`
/// and block references `((id))`; unknown tags are dropped.
pub fn inline_html_to_markdown(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let p = patterns();
    let out = p.wiki_link.replace_all(text, "[[$1]]");
    let out = p.block_ref.replace_all(&out, "(($1))");
    let out = p.bold.replace_all(&out, "**$1**");
    let out = p.italic.replace_all(&out, "*$1*");
    let out = p.code.replace_all(&out, "`$1`");
    let out = p.link.replace_all(&out, "[$2]($1)");
    let out = p.mark.replace_all(&out, "==$1==");
    let out = p.tag.replace_all(&out, "");
    decode_entities(&out)
}

/// Drops all formatting, keeping wiki-link and block-ref markers.
pub fn strip_html(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let p = patterns();
    let out = p.wiki_link.replace_all(text, "[[$1]]");
    let out = p.block_ref.replace_all(&out, "(($1))");
    let out = p.tag.replace_all(&out, "");
    decode_entities(&out)
}

fn timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Renders a page as markdown with a YAML front matter header.
pub fn page_to_markdown(page: &Page) -> String {
    let mut lines = vec![
        "---".to_string(),
        format!("title: \"{}\"", escape_yaml(&page.title)),
    ];
    if !page.tags.is_empty() {
        lines.push("tags:".to_string());
        lines.extend(page.tags.iter().map(|t| format!("  - \"{}\"", escape_yaml(t))));
    }
    lines.push(format!("created: {}", timestamp(&page.created_at)));
    lines.push(format!("updated: {}", timestamp(&page.updated_at)));
    lines.push("---".to_string());
    lines.push(String::new());

    for block in &page.content.blocks {
        let md = block_to_markdown(block);
        if !md.is_empty() {
            lines.push(md);
            lines.push(String::new());
        }
    }

    let mut out = lines.join("\n").trim_end().to_string();
    out.push('\n');
    out
}

/// Renders blocks without front matter, separated by blank lines.
pub fn blocks_to_markdown(blocks: &[Block]) -> String {
    blocks
        .iter()
        .map(block_to_markdown)
        .filter(|md| !md.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Markdown for one block. Unknown block types render as an empty string.
pub fn block_to_markdown(block: &Block) -> String {
    match block.data.view().as_ref() {
        BlockData::Header(d) => {
            format!("{} {}", "#".repeat(usize::from(d.level())), strip_html(&d.text))
        }
        BlockData::Paragraph(d) => inline_html_to_markdown(&d.text),
        BlockData::List(d) => {
            let mut lines = Vec::new();
            list_lines(&d.items, d.is_ordered(), 0, &mut lines);
            lines.join("\n")
        }
        BlockData::Checklist(d) => d
            .items
            .iter()
            .map(|item| {
                let marker = if item.is_checked() { "[x]" } else { "[ ]" };
                format!("- {marker} {}", inline_html_to_markdown(&item.text))
            })
            .collect::<Vec<_>>()
            .join("\n"),
        BlockData::Code(d) => format!(
            "```{}\n{}\n```",
            d.language.as_deref().unwrap_or(""),
            d.code
        ),
        BlockData::Quote(d) => quoted(&inline_html_to_markdown(&d.text)),
        BlockData::Delimiter(_) => "---".to_string(),
        BlockData::Table(d) => table_markdown(d),
        BlockData::Callout(d) => callout_markdown(d),
        BlockData::Image(d) => image_markdown(d),
        BlockData::Other { .. } => String::new(),
    }
}

fn list_lines(items: &[ListItem], ordered: bool, depth: usize, out: &mut Vec<String>) {
    let indent = "    ".repeat(depth);
    for (i, item) in items.iter().enumerate() {
        let mut text = inline_html_to_markdown(item.text());
        if let ListItem::Nested(nested) = item {
            match nested.extra.get("checked") {
                Some(Value::Bool(true)) => text.insert_str(0, "[x] "),
                Some(Value::Bool(false)) => text.insert_str(0, "[ ] "),
                _ => {}
            }
        }
        if ordered {
            out.push(format!("{indent}{}. {text}", i + 1));
        } else {
            out.push(format!("{indent}- {text}"));
        }
        list_lines(item.children(), ordered, depth + 1, out);
    }
}

/// Nested task items keep their state as a `checked` key on the item.
fn with_checked(item: ListItem, checked: Option<bool>) -> ListItem {
    let Some(checked) = checked else {
        return item;
    };
    let mut nested = match item {
        ListItem::Text(text) => NestedListItem {
            content: Some(text),
            text: None,
            items: Some(Vec::new()),
            extra: Map::new(),
        },
        ListItem::Nested(nested) => nested,
    };
    nested.extra.insert("checked".into(), Value::Bool(checked));
    ListItem::Nested(nested)
}

fn quoted(text: &str) -> String {
    text.lines()
        .map(|line| format!("> {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn table_markdown(d: &TableData) -> String {
    let mut lines = Vec::new();
    for (i, row) in d.content.iter().enumerate() {
        let cells: Vec<String> = row
            .iter()
            .map(|c| inline_html_to_markdown(c).replace('|', "\\|"))
            .collect();
        lines.push(format!("| {} |", cells.join(" | ")));
        if i == 0 && d.with_headings.unwrap_or(false) {
            lines.push(format!("| {} |", vec!["---"; cells.len()].join(" | ")));
        }
    }
    lines.join("\n")
}

fn callout_markdown(d: &CalloutData) -> String {
    let kind = d.kind.as_deref().unwrap_or("info").to_uppercase();
    let title = d.title.as_deref().map(inline_html_to_markdown).unwrap_or_default();
    let mut lines = vec![if title.is_empty() {
        format!("> [!{kind}]")
    } else {
        format!("> [!{kind}] {title}")
    }];
    let content = d.content.as_deref().map(inline_html_to_markdown).unwrap_or_default();
    lines.extend(content.lines().map(|line| format!("> {line}")));
    lines.join("\n")
}

fn image_markdown(d: &ImageData) -> String {
    let Some(url) = d.url().filter(|u| !u.is_empty()) else {
        return String::new();
    };
    // Local asset URLs are exported relative to the library.
    let url = match url.rfind("/assets/") {
        Some(pos) => &url[pos + 1..],
        None => url,
    };
    format!("![{}]({url})", d.caption.as_deref().unwrap_or(""))
}

/// Title and tags read back from an exported page's front matter.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FrontMatter {
    pub title: Option<String>,
    pub tags: Vec<String>,
}

fn parse_yaml_string(s: &str) -> String {
    let s = s.trim();
    let is_quoted = s.len() >= 2
        && ((s.starts_with('"') && s.ends_with('"')) || (s.starts_with('\'') && s.ends_with('\'')));
    if is_quoted {
        s[1..s.len() - 1].replace("\\\"", "\"").replace("\\\\", "\\")
    } else {
        s.to_string()
    }
}

/// Every non-blank line is a `key:` entry or a `- item`, with at least one
/// key. Anything else is a thematic break followed by body text.
fn looks_like_front_matter(header: &str) -> bool {
    let mut has_key = false;
    for line in header.lines().filter(|l| !l.trim().is_empty()) {
        let trimmed = line.trim_start();
        if trimmed.starts_with("- ") || trimmed == "-" {
            continue;
        }
        let key = line.split_once(':').map(|(k, _)| k);
        match key {
            Some(k)
                if !k.is_empty()
                    && k.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-') =>
            {
                has_key = true;
            }
            _ => return false,
        }
    }
    has_key
}

/// Splits a leading `---` front matter block from the body. Text without
/// one comes back unchanged with an empty [`FrontMatter`].
pub fn split_front_matter(markdown: &str) -> (FrontMatter, &str) {
    let mut front = FrontMatter::default();
    let Some(rest) = markdown.strip_prefix("---\n") else {
        return (front, markdown);
    };
    let Some(end) = rest.find("\n---") else {
        return (front, markdown);
    };
    let header = &rest[..end];
    if !looks_like_front_matter(header) {
        return (front, markdown);
    }
    let after = &rest[end + 4..];
    let body = after.strip_prefix('\n').unwrap_or(after);

    let mut in_tags = false;
    for line in header.lines() {
        if let Some(value) = line.strip_prefix("title:") {
            front.title = Some(parse_yaml_string(value));
            in_tags = false;
        } else if line.trim_end() == "tags:" {
            in_tags = true;
        } else if let Some(tag) = line.trim_start().strip_prefix("- ").filter(|_| in_tags) {
            let tag = parse_yaml_string(tag);
            if !tag.is_empty() {
                front.tags.push(tag);
            }
        } else {
            in_tags = false;
        }
    }
    (front, body.trim_start_matches('\n'))
}

enum Frame {
    Paragraph,
    Heading(u8),
    Code {
        language: String,
    },
    List {
        ordered: bool,
        items: Vec<(ListItem, Option<bool>)>,
    },
    Item {
        text: String,
        checked: Option<bool>,
        children: Vec<ListItem>,
    },
    Quote {
        lines: Vec<String>,
    },
    Table {
        rows: Vec<Vec<String>>,
        with_headings: bool,
    },
    Row {
        cells: Vec<String>,
        head: bool,
    },
    Cell,
    /// Inline formatting; holds the closing tag.
    Inline(&'static str),
    Image {
        url: String,
        title: String,
        before: String,
    },
    Ignored,
}

fn append_spaced(dest: &mut String, text: &str) {
    let text = text.trim();
    if text.is_empty() {
        return;
    }
    if !dest.is_empty() {
        dest.push(' ');
    }
    dest.push_str(text);
}

/// Turns `[[Page title]]` into the editor's wiki-link element.
fn link_wiki_titles(text: &str) -> String {
    patterns()
        .wiki_source
        .replace_all(text, r#"<wiki-link data-page-title="$1">$1</wiki-link>"#)
        .into_owned()
}

fn callout_kind(raw: &str) -> &'static str {
    match raw.to_lowercase().as_str() {
        "warning" | "caution" => "warning",
        "tip" => "tip",
        "danger" => "danger",
        _ => "info",
    }
}

struct BlockBuilder {
    blocks: Vec<Block>,
    frames: Vec<Frame>,
    text: String,
}

impl BlockBuilder {
    fn new() -> Self {
        Self {
            blocks: Vec::new(),
            frames: Vec::new(),
            text: String::new(),
        }
    }

    fn in_code(&self) -> bool {
        matches!(self.frames.last(), Some(Frame::Code { .. }))
    }

    fn in_quote(&self) -> bool {
        self.frames.iter().any(|f| matches!(f, Frame::Quote { .. }))
    }

    /// True when text is collected by a list item, quote or table cell
    /// rather than becoming a top-level block.
    fn in_container(&self) -> bool {
        self.frames
            .iter()
            .any(|f| matches!(f, Frame::Item { .. } | Frame::Quote { .. } | Frame::Cell))
    }

    fn take_text(&mut self) -> String {
        std::mem::take(&mut self.text)
    }

    /// Hands a finished block to the innermost item or quote, or to the
    /// output when there is none.
    fn emit(&mut self, block: Block) {
        let container = self
            .frames
            .iter_mut()
            .rev()
            .find(|f| matches!(f, Frame::Item { .. } | Frame::Quote { .. }));
        match container {
            Some(Frame::Item { text, .. }) => append_spaced(text, &block.plain_text()),
            Some(Frame::Quote { lines }) => {
                let text = block.plain_text();
                if !text.is_empty() {
                    lines.push(text);
                }
            }
            _ => self.blocks.push(block),
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        let frame = match tag {
            Tag::Paragraph | Tag::HtmlBlock => Frame::Paragraph,
            Tag::Heading { level, .. } => Frame::Heading(level as u8),
            Tag::CodeBlock(kind) => Frame::Code {
                language: match kind {
                    CodeBlockKind::Fenced(info) => {
                        info.split_whitespace().next().unwrap_or_default().to_string()
                    }
                    CodeBlockKind::Indented => String::new(),
                },
            },
            Tag::List(first) => {
                let pending = self.take_text();
                if let Some(Frame::Item { text, .. }) = self.frames.last_mut() {
                    append_spaced(text, &pending);
                }
                Frame::List {
                    ordered: first.is_some(),
                    items: Vec::new(),
                }
            }
            Tag::Item => {
                self.text.clear();
                Frame::Item {
                    text: String::new(),
                    checked: None,
                    children: Vec::new(),
                }
            }
            Tag::BlockQuote(_) => Frame::Quote { lines: Vec::new() },
            Tag::Table(_) => Frame::Table {
                rows: Vec::new(),
                with_headings: false,
            },
            Tag::TableHead => Frame::Row {
                cells: Vec::new(),
                head: true,
            },
            Tag::TableRow => Frame::Row {
                cells: Vec::new(),
                head: false,
            },
            Tag::TableCell => {
                self.text.clear();
                Frame::Cell
            }
            Tag::Strong => {
                self.text.push_str("<b>");
                Frame::Inline("</b>")
            }
            Tag::Emphasis => {
                self.text.push_str("<i>");
                Frame::Inline("</i>")
            }
            Tag::Strikethrough => {
                self.text.push_str("<s>");
                Frame::Inline("</s>")
            }
            Tag::Link { dest_url, .. } => {
                self.text
                    .push_str(&format!("<a href=\"{}\">", escape_html(&dest_url)));
                Frame::Inline("</a>")
            }
            Tag::Image {
                dest_url, title, ..
            } => Frame::Image {
                url: dest_url.to_string(),
                title: title.to_string(),
                before: self.take_text(),
            },
            _ => Frame::Ignored,
        };
        self.frames.push(frame);
    }

    fn end(&mut self) {
        let Some(frame) = self.frames.pop() else {
            return;
        };
        match frame {
            Frame::Paragraph => {
                let text = self.take_text();
                let text = text.trim();
                if !text.is_empty() {
                    self.emit(Block::paragraph(link_wiki_titles(text)));
                }
            }
            Frame::Heading(level) => {
                let text = self.take_text();
                let text = text.trim();
                if !text.is_empty() {
                    self.emit(Block::header(link_wiki_titles(text), level));
                }
            }
            Frame::Code { language } => {
                let code = self.take_text();
                self.emit(Block::new(BlockData::Code(CodeData {
                    code: code.trim_end_matches('\n').to_string(),
                    language: (!language.is_empty()).then_some(language),
                    extra: Map::new(),
                })));
            }
            Frame::Item {
                mut text,
                checked,
                children,
            } => {
                let rest = self.take_text();
                append_spaced(&mut text, &rest);
                let text = link_wiki_titles(&text);
                let item = if children.is_empty() {
                    ListItem::Text(text)
                } else {
                    ListItem::Nested(NestedListItem {
                        content: Some(text),
                        text: None,
                        items: Some(children),
                        extra: Map::new(),
                    })
                };
                if let Some(Frame::List { items, .. }) = self.frames.last_mut() {
                    items.push((item, checked));
                }
            }
            Frame::List { ordered, items } => self.finish_list(ordered, items),
            Frame::Quote { lines } => self.finish_quote(lines),
            Frame::Cell => {
                let text = self.take_text();
                if let Some(Frame::Row { cells, .. }) = self.frames.last_mut() {
                    cells.push(link_wiki_titles(text.trim()));
                }
            }
            Frame::Row { cells, head } => {
                if let Some(Frame::Table {
                    rows,
                    with_headings,
                }) = self.frames.last_mut()
                {
                    *with_headings |= head;
                    rows.push(cells);
                }
            }
            Frame::Table {
                rows,
                with_headings,
            } => {
                if !rows.is_empty() {
                    self.emit(Block::new(BlockData::Table(TableData {
                        with_headings: Some(with_headings),
                        content: rows,
                        extra: Map::new(),
                    })));
                }
            }
            Frame::Inline(close) => self.text.push_str(close),
            Frame::Image { url, title, before } => self.finish_image(url, title, before),
            Frame::Ignored => {}
        }
    }

    fn finish_list(&mut self, ordered: bool, items: Vec<(ListItem, Option<bool>)>) {
        if items.is_empty() {
            return;
        }
        if let Some(Frame::Item { children, .. }) = self.frames.last_mut() {
            children.extend(items.into_iter().map(|(item, checked)| with_checked(item, checked)));
            return;
        }
        if items.iter().all(|(_, checked)| checked.is_some()) {
            let entries = items
                .into_iter()
                .map(|(item, checked)| (item.text().to_string(), checked.unwrap_or(false)))
                .collect();
            self.emit(Block::checklist(entries));
        } else {
            self.emit(Block::new(BlockData::List(ListData {
                style: Some(if ordered { "ordered" } else { "unordered" }.to_string()),
                items: items.into_iter().map(|(item, _)| item).collect(),
                extra: Map::new(),
            })));
        }
    }

    fn finish_quote(&mut self, lines: Vec<String>) {
        if lines.is_empty() {
            return;
        }
        let text = lines.join("\n");
        let (first, rest) = text.split_once('\n').unwrap_or((text.as_str(), ""));
        let block = match patterns().callout.captures(first.trim()) {
            Some(caps) => {
                let kind = callout_kind(caps.get(1).map_or("", |m| m.as_str()));
                let title = caps.get(2).map_or("", |m| m.as_str()).trim();
                Block::new(BlockData::Callout(CalloutData {
                    kind: Some(kind.to_string()),
                    title: (!title.is_empty()).then(|| title.to_string()),
                    content: Some(rest.trim().to_string()),
                    extra: Map::new(),
                }))
            }
            None => Block::quote(text),
        };
        self.emit(block);
    }

    /// An image directly inside a top-level paragraph becomes its own block,
    /// splitting the paragraph around it. Elsewhere only its alt text stays.
    fn finish_image(&mut self, url: String, title: String, before: String) {
        let alt = self.take_text();
        let standalone = matches!(self.frames.last(), Some(Frame::Paragraph)) && !self.in_container();
        if !standalone || url.is_empty() {
            self.text = before + &alt;
            return;
        }
        let before = before.trim();
        if !before.is_empty() {
            self.emit(Block::paragraph(link_wiki_titles(before)));
        }
        let caption = if alt.trim().is_empty() { title } else { alt.trim().to_string() };
        let mut extra = Map::new();
        for flag in ["withBorder", "withBackground", "stretched"] {
            extra.insert(flag.to_string(), Value::Bool(false));
        }
        self.emit(Block::new(BlockData::Image(ImageData {
            file: Some(ImageFile {
                url: Some(url),
                extra: Map::new(),
            }),
            caption: Some(caption),
            extra,
        })));
    }

    fn line_break(&mut self) {
        if self.in_code() || self.in_quote() {
            self.text.push('\n');
        } else {
            self.text.push(' ');
        }
    }

    fn handle(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(_) => self.end(),
            Event::Text(text) => {
                if self.in_code() {
                    self.text.push_str(&text);
                } else {
                    self.text.push_str(&escape_html(&text));
                }
            }
            Event::Code(code) => {
                self.text.push_str("<code>");
                self.text.push_str(&escape_html(&code));
                self.text.push_str("</code>");
            }
            Event::Html(html) | Event::InlineHtml(html) => self.text.push_str(&html),
            Event::SoftBreak | Event::HardBreak => self.line_break(),
            Event::Rule => self.emit(Block::delimiter()),
            Event::TaskListMarker(checked) => {
                if let Some(Frame::Item { checked: slot, .. }) = self
                    .frames
                    .iter_mut()
                    .rev()
                    .find(|f| matches!(f, Frame::Item { .. }))
                {
                    *slot = Some(checked);
                }
            }
            _ => {}
        }
    }

    fn finish(mut self) -> Vec<Block> {
        let rest = self.take_text();
        let rest = rest.trim();
        if !rest.is_empty() {
            self.blocks.push(Block::paragraph(rest));
        }
        self.blocks
    }
}

/// Parses markdown into fresh blocks. Task lists become checklists,
/// `> [!TYPE] title` quotes become callouts and `[[title]]` becomes a
/// wiki-link. A leading front matter block is not stripped; see
/// [`split_front_matter`].
pub fn markdown_to_blocks(markdown: &str) -> Vec<Block> {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_TASKLISTS);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let mut builder = BlockBuilder::new();
    for event in Parser::new_ext(markdown, options) {
        builder.handle(event);
    }
    builder.finish()
}

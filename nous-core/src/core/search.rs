//! Brute-force text search over page titles and block text, read straight
//! from disk on every call.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::library::Library;
use crate::core::page::{Page, Tags};
use crate::{NousError, Result};

/// Characters of context kept on each side of a content match.
const SNIPPET_CONTEXT: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    Title,
    Content,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub page_id: Uuid,
    pub notebook_id: Uuid,
    pub notebook_name: String,
    pub title: String,
    /// Context around the first content match; empty when only the title
    /// matched and the body does not contain the query.
    pub snippet: String,
    pub tags: Tags,
    #[serde(rename = "match")]
    pub match_kind: MatchKind,
}

/// Char index of the first case-insensitive occurrence of `needle` in
/// `haystack`. Compares char by char, so the index stays valid in
/// `haystack` even where lowercasing changes byte lengths.
fn find_ignore_case(haystack: &[char], needle: &[char]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    (0..=haystack.len() - needle.len()).find(|&start| {
        haystack[start..start + needle.len()]
            .iter()
            .zip(needle)
            .all(|(h, n)| h.to_lowercase().eq(n.to_lowercase()))
    })
}

/// `...`-marked window of `SNIPPET_CONTEXT` chars either side of the first
/// match in `text`.
pub fn snippet(text: &str, query: &str) -> Option<String> {
    let chars: Vec<char> = text.chars().collect();
    let needle: Vec<char> = query.chars().collect();
    let pos = find_ignore_case(&chars, &needle)?;
    let start = pos.saturating_sub(SNIPPET_CONTEXT);
    let end = (pos + needle.len() + SNIPPET_CONTEXT).min(chars.len());
    let mut out = String::new();
    if start > 0 {
        out.push_str("...");
    }
    out.extend(&chars[start..end]);
    if end < chars.len() {
        out.push_str("...");
    }
    Some(out)
}

/// Searchable body text of a page: the plain text of each block, joined
/// with spaces, skipping blocks with no text.
pub fn page_text(page: &Page) -> String {
    page.content
        .blocks
        .iter()
        .map(|b| b.plain_text())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn contains_ignore_case(haystack: &str, query: &str) -> bool {
    let chars: Vec<char> = haystack.chars().collect();
    let needle: Vec<char> = query.chars().collect();
    find_ignore_case(&chars, &needle).is_some()
}

impl Library {
    /// Case-insensitive substring search. Title matches come first, then
    /// content-only matches, each in scan order (notebooks then page files by
    /// name). Archived pages are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`NousError::InvalidInput`] for an empty query.
    pub fn search_pages(
        &self,
        query: &str,
        notebook_id: Option<Uuid>,
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(NousError::InvalidInput("search query must not be empty".into()));
        }

        let mut title_hits = Vec::new();
        let mut content_hits = Vec::new();
        for nb in self.list_notebooks()? {
            if notebook_id.is_some_and(|id| id != nb.id) {
                continue;
            }
            for page in self.load_pages(nb.id)? {
                if page.is_archived {
                    continue;
                }
                let title_hit = contains_ignore_case(&page.title, query);
                let body_match = snippet(&page_text(&page), query);
                if !title_hit && body_match.is_none() {
                    continue;
                }
                let hit = SearchHit {
                    page_id: page.id,
                    notebook_id: nb.id,
                    notebook_name: nb.name.clone(),
                    title: page.title,
                    snippet: body_match.unwrap_or_default(),
                    tags: page.tags,
                    match_kind: if title_hit {
                        MatchKind::Title
                    } else {
                        MatchKind::Content
                    },
                };
                if title_hit {
                    title_hits.push(hit);
                } else {
                    content_hits.push(hit);
                }
            }
        }

        title_hits.extend(content_hits);
        title_hits.truncate(limit);
        log::debug!("search '{query}' returned {} hits", title_hits.len());
        Ok(title_hits)
    }
}

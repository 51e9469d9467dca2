//! Human-name lookup for notebooks, sections, folders, pages, libraries and
//! database properties.
//!
//! A UUID-shaped query is looked up by id only. Anything else is matched
//! case-insensitively: a unique exact name wins, otherwise a unique prefix.

use std::sync::OnceLock;

use regex::Regex;
use uuid::Uuid;

use crate::{NousError, Result};

/// Something that can be found by name or id.
pub trait Named {
    /// Entity kind used in error messages, e.g. `"Notebook"`.
    const KIND: &'static str;

    fn name(&self) -> &str;

    /// Id used for UUID-shaped queries. `None` if the entity has no UUID.
    fn uuid(&self) -> Option<Uuid>;
}

/// Whether `s` has the canonical 8-4-4-4-12 hex UUID shape.
pub fn is_uuid(s: &str) -> bool {
    static UUID_RE: OnceLock<Regex> = OnceLock::new();
    UUID_RE
        .get_or_init(|| {
            Regex::new(
                r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$",
            )
            .expect("valid uuid regex")
        })
        .is_match(s.trim())
}

/// Resolves `query` against `candidates`.
///
/// # Errors
///
/// Returns [`NousError::NotFound`] (listing every candidate name) when
/// nothing matches, or [`NousError::Ambiguous`] (listing the matches) when
/// more than one candidate shares the exact name or prefix.
pub fn resolve<'a, T: Named>(query: &str, candidates: &'a [T]) -> Result<&'a T> {
    let query = query.trim();
    if is_uuid(query) {
        let id = Uuid::parse_str(query).map_err(|e| NousError::InvalidInput(e.to_string()))?;
        return candidates
            .iter()
            .find(|c| c.uuid() == Some(id))
            .ok_or_else(|| NousError::not_found(T::KIND, query));
    }

    let needle = query.to_lowercase();
    let exact: Vec<&T> = candidates
        .iter()
        .filter(|c| c.name().to_lowercase() == needle)
        .collect();
    if let [only] = exact.as_slice() {
        return Ok(only);
    }

    let prefixed: Vec<&T> = candidates
        .iter()
        .filter(|c| c.name().to_lowercase().starts_with(&needle))
        .collect();
    match prefixed.as_slice() {
        [only] => Ok(only),
        [] => Err(NousError::NotFound {
            kind: T::KIND,
            name: query.to_string(),
            available: candidates.iter().map(|c| c.name().to_string()).collect(),
        }),
        many => Err(NousError::Ambiguous {
            kind: T::KIND,
            name: query.to_string(),
            matches: many.iter().map(|c| c.name().to_string()).collect(),
        }),
    }
}

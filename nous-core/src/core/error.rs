//! Error types for the Nous core library.

use thiserror::Error;

/// All errors that can occur within the Nous core library.
#[derive(Debug, Error)]
pub enum NousError {
    /// A name or UUID did not resolve to any notebook, section, folder, page,
    /// database property, row, or library.
    #[error("{kind} not found: '{name}'{}", list_suffix("Available", .available))]
    NotFound {
        kind: &'static str,
        name: String,
        /// Every candidate name that was searched, to help the caller retry.
        available: Vec<String>,
    },

    /// A name prefix matched more than one candidate.
    #[error("Ambiguous {kind} name '{name}'{}", list_suffix("matches", .matches))]
    Ambiguous {
        kind: &'static str,
        name: String,
        matches: Vec<String>,
    },

    /// A structured argument was malformed or an operation targeted the wrong
    /// kind of entity (e.g. a database operation on a standard page).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The page history moved on between loading a page and journaling the
    /// change, meaning another writer got there first.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// An I/O operation on the filesystem failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored data could not be (de)serialized as JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn list_suffix(label: &str, names: &[String]) -> String {
    if names.is_empty() {
        String::new()
    } else {
        format!(". {label}: {}", names.join(", "))
    }
}

/// Convenience alias that pins the error type to [`NousError`].
pub type Result<T> = std::result::Result<T, NousError>;

impl NousError {
    /// Shorthand for a [`NousError::NotFound`] with no candidate list.
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
            available: Vec::new(),
        }
    }

    /// Returns a short, human-readable message suitable for display to the end user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::NotFound { kind, name, .. } => format!("{kind} '{name}' does not exist"),
            Self::Ambiguous { kind, name, matches } => format!(
                "'{name}' matches {} {}s; be more specific",
                matches.len(),
                kind.to_lowercase()
            ),
            Self::InvalidInput(msg) => msg.clone(),
            Self::Conflict(_) => "The page was changed by someone else; reload and retry".to_string(),
            Self::Io(e) => format!("File error: {e}"),
            Self::Json(e) => format!("Data format error: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_lists_available_names() {
        let e = NousError::NotFound {
            kind: "Notebook",
            name: "Wrk".to_string(),
            available: vec!["Work".to_string(), "Home".to_string()],
        };
        assert_eq!(e.to_string(), "Notebook not found: 'Wrk'. Available: Work, Home");
    }

    #[test]
    fn test_not_found_without_candidates() {
        let e = NousError::not_found("Page", "0b7c");
        assert_eq!(e.to_string(), "Page not found: '0b7c'");
    }

    #[test]
    fn test_ambiguous_lists_matches() {
        let e = NousError::Ambiguous {
            kind: "Folder",
            name: "Pro".to_string(),
            matches: vec!["Projects".to_string(), "Prototypes".to_string()],
        };
        assert!(e.to_string().contains("Projects, Prototypes"));
        assert!(e.user_message().contains("2 folders"));
    }
}

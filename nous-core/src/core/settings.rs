//! Runtime configuration: where the data lives, which library to open, and
//! what client id to stamp on history entries.
//!
//! Values come from defaults overridden by the environment:
//!
//! - `NOUS_DATA_DIR`: data directory (default `<platform data dir>/nous`)
//! - `NOUS_LIBRARY`: library name or id prefix to open
//! - `NOUS_CLIENT_ID`: client id written to history entries (default: host name)

use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::core::library::Library;
use crate::core::resolve::{resolve, Named};
use crate::core::storage::read_json;
use crate::{NousError, Result};

pub const ENV_DATA_DIR: &str = "NOUS_DATA_DIR";
pub const ENV_LIBRARY: &str = "NOUS_LIBRARY";
pub const ENV_CLIENT_ID: &str = "NOUS_CLIENT_ID";

/// Returns the default data directory: `<platform data dir>/nous`.
///
/// - Linux: `~/.local/share/nous`
/// - macOS: `~/Library/Application Support/nous`
/// - Windows: `%APPDATA%/nous`
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".local")
                .join("share")
        })
        .join("nous")
}

/// Host name of this machine, used as the default client id.
pub fn default_client_id() -> String {
    match hostname::get() {
        Ok(name) => name.to_string_lossy().into_owned(),
        Err(e) => {
            log::warn!("could not read host name, using 'unknown' client id: {e}");
            "unknown".to_string()
        }
    }
}

/// One entry of `<data_dir>/libraries.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryEntry {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub path: PathBuf,
    #[serde(default)]
    pub is_default: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Named for LibraryEntry {
    const KIND: &'static str = "Library";

    fn name(&self) -> &str {
        &self.name
    }

    fn uuid(&self) -> Option<Uuid> {
        self.id.as_deref().and_then(|id| Uuid::parse_str(id).ok())
    }
}

/// Reads the library list from `<data_dir>/libraries.json`. A missing file
/// means no libraries are registered.
///
/// # Errors
///
/// Returns [`NousError::Json`] if the file exists but is malformed.
pub fn discover_libraries(data_dir: &Path) -> Result<Vec<LibraryEntry>> {
    Ok(read_json(&data_dir.join("libraries.json"))?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub data_dir: PathBuf,
    /// Library to open; `None` picks the default one.
    pub library: Option<String>,
    pub client_id: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            library: None,
            client_id: default_client_id(),
        }
    }
}

impl Settings {
    /// Defaults overridden by `NOUS_*` environment variables. Empty
    /// variables are treated as unset.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key| lookup(key).filter(|v: &String| !v.trim().is_empty());
        let mut settings = Self::default();
        if let Some(dir) = get(ENV_DATA_DIR) {
            settings.data_dir = PathBuf::from(dir);
        }
        settings.library = get(ENV_LIBRARY);
        if let Some(client) = get(ENV_CLIENT_ID) {
            settings.client_id = client;
        }
        settings
    }

    /// Picks the configured library from `libraries.json`: the named one if
    /// [`Settings::library`] is set, else the entry marked default, else the
    /// first entry. Relative paths are taken relative to the data dir.
    ///
    /// # Errors
    ///
    /// Returns [`NousError::NotFound`] if no library matches or none are
    /// registered, [`NousError::Ambiguous`] if the name matches several.
    pub fn select_library(&self) -> Result<LibraryEntry> {
        let libraries = discover_libraries(&self.data_dir)?;
        let mut entry = match &self.library {
            Some(name) => resolve(name, &libraries)?.clone(),
            None => libraries
                .iter()
                .find(|l| l.is_default)
                .or_else(|| libraries.first())
                .cloned()
                .ok_or_else(|| NousError::not_found("Library", "default"))?,
        };
        if entry.path.is_relative() {
            entry.path = self.data_dir.join(&entry.path);
        }
        Ok(entry)
    }

    /// Opens the selected library with this client id.
    pub fn open_library(&self) -> Result<Library> {
        let entry = self.select_library()?;
        log::info!("opening library '{}' at {}", entry.name, entry.path.display());
        Ok(Library::new(entry.path, self.client_id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::TempDir;

    fn write_libraries(dir: &Path, json: &str) {
        fs::write(dir.join("libraries.json"), json).unwrap();
    }

    fn settings_for(dir: &Path, library: Option<&str>) -> Settings {
        Settings {
            data_dir: dir.to_path_buf(),
            library: library.map(String::from),
            client_id: "test".to_string(),
        }
    }

    #[test]
    fn test_default_data_dir_ends_with_nous() {
        assert!(default_data_dir().ends_with("nous"));
    }

    #[test]
    fn test_from_lookup_overrides_and_ignores_empty() {
        let vars: HashMap<&str, &str> = [
            (ENV_DATA_DIR, "/tmp/nous-data"),
            (ENV_LIBRARY, "  "),
            (ENV_CLIENT_ID, "agent-1"),
        ]
        .into_iter()
        .collect();
        let s = Settings::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(s.data_dir, PathBuf::from("/tmp/nous-data"));
        assert_eq!(s.library, None);
        assert_eq!(s.client_id, "agent-1");
    }

    #[test]
    fn test_discover_libraries_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        assert!(discover_libraries(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_select_library_prefers_default_then_name() {
        let dir = TempDir::new().unwrap();
        write_libraries(
            dir.path(),
            r#"[
                {"name": "Personal", "path": "personal", "icon": "📓"},
                {"name": "Work", "path": "/srv/work", "isDefault": true}
            ]"#,
        );

        let picked = settings_for(dir.path(), None).select_library().unwrap();
        assert_eq!(picked.name, "Work");
        assert_eq!(picked.path, PathBuf::from("/srv/work"));

        let picked = settings_for(dir.path(), Some("pers")).select_library().unwrap();
        assert_eq!(picked.name, "Personal");
        assert_eq!(picked.path, dir.path().join("personal"));
        assert_eq!(picked.extra["icon"], "📓");
    }

    #[test]
    fn test_select_library_without_default_takes_first() {
        let dir = TempDir::new().unwrap();
        write_libraries(
            dir.path(),
            r#"[{"name": "A", "path": "/a"}, {"name": "B", "path": "/b"}]"#,
        );
        assert_eq!(settings_for(dir.path(), None).select_library().unwrap().name, "A");
    }

    #[test]
    fn test_select_library_errors() {
        let dir = TempDir::new().unwrap();
        let err = settings_for(dir.path(), None).select_library().unwrap_err();
        assert!(matches!(err, NousError::NotFound { kind: "Library", .. }));

        write_libraries(dir.path(), r#"[{"name": "Main", "path": "/m"}]"#);
        let err = settings_for(dir.path(), Some("Other")).select_library().unwrap_err();
        assert!(err.to_string().contains("Available: Main"));
    }
}

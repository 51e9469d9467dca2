//! JSON file primitives shared by every store: tolerant reads and
//! write-then-rename updates.

use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::Result;

/// Reads and parses a JSON file. A missing file is `Ok(None)`.
///
/// # Errors
///
/// Returns [`crate::NousError::Io`] if the file exists but cannot be read,
/// or [`crate::NousError::Json`] if it does not parse.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match fs::read_to_string(path) {
        Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Like [`read_json`] but turns unreadable or corrupt files into `None`,
/// logging why. Used by bulk scans where one bad file must not hide the rest.
pub fn read_json_lenient<T: DeserializeOwned>(path: &Path) -> Option<T> {
    match read_json(path) {
        Ok(value) => value,
        Err(e) => {
            log::warn!("skipping unreadable file {}: {e}", path.display());
            None
        }
    }
}

/// Sibling temporary path: `pages/x.json` becomes `pages/x.json.tmp`.
pub fn tmp_path(path: &Path) -> PathBuf {
    let mut name: OsString = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// A JSON document serialized to a sibling `.tmp` file, waiting to be
/// renamed over its destination.
///
/// Until [`StagedWrite::commit`] succeeds the destination is untouched. A
/// staged write that is dropped without committing removes its temporary
/// file.
#[derive(Debug)]
pub struct StagedWrite {
    tmp: PathBuf,
    dest: PathBuf,
    committed: bool,
}

impl StagedWrite {
    /// Serializes `value` as pretty JSON with a trailing newline into the
    /// temporary sibling of `dest`, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns [`crate::NousError::Io`] or [`crate::NousError::Json`]; in
    /// both cases no temporary file is left behind.
    pub fn stage<T: Serialize + ?Sized>(dest: &Path, value: &T) -> Result<Self> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut json = serde_json::to_string_pretty(value)?;
        json.push('\n');
        let staged = Self {
            tmp: tmp_path(dest),
            dest: dest.to_path_buf(),
            committed: false,
        };
        fs::write(&staged.tmp, json)?;
        Ok(staged)
    }

    pub fn destination(&self) -> &Path {
        &self.dest
    }

    /// Renames the temporary file over the destination.
    ///
    /// # Errors
    ///
    /// Returns [`crate::NousError::Io`] if the rename fails; the previous
    /// destination file, if any, is left intact.
    pub fn commit(mut self) -> Result<()> {
        fs::rename(&self.tmp, &self.dest)?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for StagedWrite {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.tmp);
        }
    }
}

/// Stages and immediately commits `value` to `path`.
///
/// # Errors
///
/// See [`StagedWrite::stage`] and [`StagedWrite::commit`].
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    StagedWrite::stage(path, value)?.commit()
}

//! Process-private directory for tmp database files.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::{Error, Result};

/// File extension of tmp database files.
pub const TMP_DBI_EXTENSION: &str = "dbiregdb";

/// A writable directory private to this process.
///
/// The directory and everything left in it are removed when the area is
/// dropped.
///
/// # Examples
///
/// ```
/// use dbireg::TmpArea;
///
/// let area = TmpArea::new().unwrap();
/// let a = area.prepare_location("scratch", "dbiregdb").unwrap();
/// let b = area.prepare_location("scratch", "dbiregdb").unwrap();
/// assert_ne!(a, b);
/// assert!(a.starts_with(area.path()));
/// ```
#[derive(Debug)]
pub struct TmpArea {
    dir: TempDir,
}

impl TmpArea {
    /// Creates the area under the system temporary directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Allocation`] if the directory cannot be created.
    pub fn new() -> Result<Self> {
        Self::in_dir(std::env::temp_dir())
    }

    /// Creates the area under `base`, creating `base` if needed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Allocation`] if the directory cannot be created.
    pub fn in_dir(base: impl AsRef<Path>) -> Result<Self> {
        let base = base.as_ref();
        let alloc_err = |e: std::io::Error| Error::Allocation {
            alias: "<tmp area>".into(),
            reason: format!("{}: {e}", base.display()),
        };
        std::fs::create_dir_all(base).map_err(alloc_err)?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("dbireg-{}-", std::process::id()))
            .tempdir_in(base)
            .map_err(alloc_err)?;
        log::trace!("tmp area at {}", dir.path().display());
        Ok(Self { dir })
    }

    /// Path of the area.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Reserves a fresh, non-colliding file named after `alias`.
    ///
    /// The file is created empty so concurrent reservations cannot collide.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Allocation`] if no file can be created.
    pub fn prepare_location(&self, alias: &str, extension: &str) -> Result<PathBuf> {
        let stem = sanitize(alias);
        let (_file, path) = tempfile::Builder::new()
            .prefix(&format!("{stem}_"))
            .suffix(&format!(".{extension}"))
            .rand_bytes(8)
            .tempfile_in(self.dir.path())
            .and_then(|f| f.keep().map_err(|e| e.error))
            .map_err(|e| Error::Allocation {
                alias: alias.to_owned(),
                reason: e.to_string(),
            })?;
        Ok(path)
    }
}

fn sanitize(alias: &str) -> String {
    let cleaned: String = alias
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .take(64)
        .collect();
    if cleaned.is_empty() {
        "tmp".to_owned()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_area_removed_on_drop() {
        let area = TmpArea::new().unwrap();
        let dir = area.path().to_path_buf();
        let file = area.prepare_location("x", TMP_DBI_EXTENSION).unwrap();
        assert!(dir.is_dir());
        assert!(file.is_file());
        drop(area);
        assert!(!dir.exists());
    }

    #[test]
    fn test_location_named_from_alias() {
        let area = TmpArea::new().unwrap();
        let file = area.prepare_location("session", TMP_DBI_EXTENSION).unwrap();
        let name = file.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("session_"));
        assert!(name.ends_with(".dbiregdb"));
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("a/b c"), "a_b_c");
        assert_eq!(sanitize(""), "tmp");
        assert_eq!(sanitize("msa-align"), "msa-align");
    }

    #[test]
    fn test_in_custom_dir() {
        let base = tempfile::tempdir().unwrap();
        let area = TmpArea::in_dir(base.path().join("nested")).unwrap();
        assert!(area.path().starts_with(base.path()));
    }
}

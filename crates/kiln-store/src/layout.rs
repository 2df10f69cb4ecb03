use crate::StoreError;
use std::fs;
use std::path::{Path, PathBuf};

pub const INDEX_FILE: &str = "manifest_index.sh";
pub const AGGREGATE_FILE: &str = "install_all.sh";
pub const DOCTOR_FILE: &str = "doctor_checks.sh";
const LOCK_FILE: &str = ".kiln.lock";

/// Banner text every generated artifact carries. Only files containing it
/// near the top are ever pruned or reported as stale.
pub const GENERATED_MARKER: &str = "AUTO-GENERATED by kiln";

/// File layout of a kiln output directory.
///
/// Holds the paths of the index, per-category installers, aggregate installer,
/// doctor checks, and the advisory lock file. The directory itself is created
/// lazily on [`initialize`](Self::initialize).
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[inline]
    pub fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE)
    }

    #[inline]
    pub fn aggregate_path(&self) -> PathBuf {
        self.root.join(AGGREGATE_FILE)
    }

    #[inline]
    pub fn doctor_path(&self) -> PathBuf {
        self.root.join(DOCTOR_FILE)
    }

    #[inline]
    pub fn category_path(&self, category: &str) -> PathBuf {
        self.root.join(category_file_name(category))
    }

    #[inline]
    pub fn lock_file(&self) -> PathBuf {
        self.root.join(LOCK_FILE)
    }

    pub fn initialize(&self) -> Result<(), StoreError> {
        if self.root.exists() && !self.root.is_dir() {
            return Err(StoreError::NotADirectory(self.root.clone()));
        }
        fs::create_dir_all(&self.root)?;
        Ok(())
    }
}

/// Installer artifact name for a category.
pub fn category_file_name(category: &str) -> String {
    format!("install_{category}.sh")
}

/// Whether `contents` starts like a kiln-generated artifact.
pub fn is_generated(contents: &str) -> bool {
    contents
        .lines()
        .take(8)
        .any(|line| line.contains(GENERATED_MARKER))
}

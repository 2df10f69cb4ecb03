//! Output directory layout and atomic artifact writes for kiln.
//!
//! This crate owns the only side effect of the generator: placing rendered
//! artifacts into the output directory. `OutputLayout` names every artifact
//! path and `ArtifactWriter` stages all artifacts in temporary files before
//! renaming them into place, then prunes stale generated installers.

pub mod artifacts;
pub mod layout;

pub use artifacts::{ArtifactFile, ArtifactWriter, CommitReport};
pub use layout::{
    category_file_name, is_generated, OutputLayout, AGGREGATE_FILE, DOCTOR_FILE,
    GENERATED_MARKER, INDEX_FILE,
};

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Fsync a directory to ensure that a preceding `rename()` is durable.
///
/// POSIX does not guarantee a rename is durable until the parent directory
/// itself has been synced.
pub(crate) fn fsync_dir(dir: &Path) -> Result<(), std::io::Error> {
    let f = std::fs::File::open(dir)?;
    f.sync_all()
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),
    #[error("invalid artifact name: {0}")]
    InvalidName(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_display_invalid_name() {
        let e = StoreError::InvalidName("bad".to_owned());
        assert!(e.to_string().contains("invalid artifact name"));
    }

    #[test]
    fn store_error_display_not_a_directory() {
        let e = StoreError::NotADirectory(PathBuf::from("/tmp/file"));
        assert!(e.to_string().contains("/tmp/file"));
    }

    #[test]
    fn fsync_dir_on_existing_directory() {
        let dir = tempfile::tempdir().unwrap();
        fsync_dir(dir.path()).unwrap();
    }
}

use crate::layout::{is_generated, OutputLayout};
use crate::{fsync_dir, StoreError};
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use tempfile::NamedTempFile;
use tracing::{debug, info};

const ARTIFACT_MODE: u32 = 0o755;

/// A rendered artifact waiting to be written into the output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactFile {
    pub name: String,
    pub contents: String,
}

impl ArtifactFile {
    pub fn new(name: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            contents: contents.into(),
        }
    }
}

/// Outcome of a successful [`ArtifactWriter::commit`].
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct CommitReport {
    pub written: Vec<PathBuf>,
    pub unchanged: Vec<PathBuf>,
    pub pruned: Vec<PathBuf>,
}

/// All-or-nothing writer for a set of artifacts.
///
/// Every changed artifact is first staged in a `NamedTempFile` inside the
/// output directory and fsynced. Only when all of them are staged are they
/// renamed into place, so a failure while staging leaves the previous
/// generation untouched.
pub struct ArtifactWriter {
    layout: OutputLayout,
}

impl ArtifactWriter {
    pub fn new(layout: OutputLayout) -> Self {
        Self { layout }
    }

    pub fn commit(&self, artifacts: &[ArtifactFile]) -> Result<CommitReport, StoreError> {
        let mut names = HashSet::new();
        for artifact in artifacts {
            validate_artifact_name(&artifact.name)?;
            if !names.insert(artifact.name.as_str()) {
                return Err(StoreError::InvalidName(format!(
                    "artifact '{}' appears twice",
                    artifact.name
                )));
            }
        }

        self.layout.initialize()?;
        let dir = self.layout.root();
        let mut report = CommitReport::default();

        let mut staged = Vec::with_capacity(artifacts.len());
        for artifact in artifacts {
            let dest = dir.join(&artifact.name);
            if is_identical(&dest, &artifact.contents) {
                debug!("unchanged: {}", dest.display());
                report.unchanged.push(dest);
                continue;
            }
            let mut tmp = NamedTempFile::new_in(dir)?;
            tmp.write_all(artifact.contents.as_bytes())?;
            tmp.as_file()
                .set_permissions(fs::Permissions::from_mode(ARTIFACT_MODE))?;
            tmp.as_file().sync_all()?;
            staged.push((tmp, dest));
        }

        for (tmp, dest) in staged {
            tmp.persist(&dest).map_err(|e| StoreError::Io(e.error))?;
            debug!("wrote {}", dest.display());
            report.written.push(dest);
        }
        fsync_dir(dir)?;

        report.pruned = self.prune_stale(&names)?;
        info!(
            "committed {} artifacts ({} written, {} unchanged, {} pruned)",
            artifacts.len(),
            report.written.len(),
            report.unchanged.len(),
            report.pruned.len()
        );
        Ok(report)
    }

    /// Names of every kiln-generated `.sh` file currently in the output directory.
    pub fn list_generated(&self) -> Result<Vec<String>, StoreError> {
        let dir = self.layout.root();
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            if name.starts_with('.') || !name.ends_with(".sh") {
                continue;
            }
            // Never follow symlinks out of the output directory.
            if !entry.file_type()?.is_file() {
                continue;
            }
            let Ok(contents) = fs::read_to_string(entry.path()) else {
                continue;
            };
            if is_generated(&contents) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    fn prune_stale(&self, keep: &HashSet<&str>) -> Result<Vec<PathBuf>, StoreError> {
        let mut pruned = Vec::new();
        for name in self.list_generated()? {
            if keep.contains(name.as_str()) {
                continue;
            }
            let path = self.layout.root().join(&name);
            fs::remove_file(&path)?;
            info!("removed stale artifact {}", path.display());
            pruned.push(path);
        }
        if !pruned.is_empty() {
            fsync_dir(self.layout.root())?;
        }
        Ok(pruned)
    }
}

fn validate_artifact_name(name: &str) -> Result<(), StoreError> {
    if name.is_empty()
        || name.starts_with('.')
        || name.contains(['/', '\\'])
        || !name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.'))
    {
        return Err(StoreError::InvalidName(name.to_owned()));
    }
    Ok(())
}

fn is_identical(dest: &std::path::Path, contents: &str) -> bool {
    match fs::symlink_metadata(dest) {
        Ok(meta) if meta.is_file() => {
            fs::read(dest).is_ok_and(|existing| existing == contents.as_bytes())
        }
        _ => false,
    }
}

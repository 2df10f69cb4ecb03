use crate::generate::Artifacts;
use kiln_schema::Fingerprint;
use kiln_store::{ArtifactWriter, OutputLayout, StoreError};
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::io;

const FINGERPRINT_VAR: &str = "KILN_MANIFEST_SHA256=";

/// Difference between freshly rendered artifacts and the output directory.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DriftReport {
    /// Artifacts that should exist but do not.
    pub missing: Vec<String>,
    /// Artifacts whose content differs from what would be generated now.
    pub modified: Vec<String>,
    /// Generated files that the current manifest no longer produces.
    pub stale: Vec<String>,
    pub expected_fingerprint: Fingerprint,
    /// Fingerprint recorded in the on-disk index, if there is one.
    pub recorded_fingerprint: Option<String>,
    pub fingerprint_matches: bool,
    pub has_drift: bool,
}

/// Compare `artifacts` with the files under `layout`. Read-only.
pub fn diff_artifacts(
    layout: &OutputLayout,
    artifacts: &Artifacts,
    fingerprint: &Fingerprint,
) -> Result<DriftReport, StoreError> {
    let mut missing = Vec::new();
    let mut modified = Vec::new();

    for file in artifacts.files() {
        let path = layout.root().join(&file.name);
        match fs::read(&path) {
            Ok(existing) if existing == file.contents.as_bytes() => {}
            Ok(_) => modified.push(file.name.clone()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => missing.push(file.name.clone()),
            Err(e) => return Err(e.into()),
        }
    }

    let expected: HashSet<&str> = artifacts.names().into_iter().collect();
    let stale: Vec<String> = ArtifactWriter::new(layout.clone())
        .list_generated()?
        .into_iter()
        .filter(|name| !expected.contains(name.as_str()))
        .collect();

    let recorded_fingerprint = match fs::read_to_string(layout.index_path()) {
        Ok(index) => recorded_fingerprint(&index),
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(e) => return Err(e.into()),
    };
    let fingerprint_matches = recorded_fingerprint.as_deref() == Some(fingerprint.as_str());

    let has_drift =
        !missing.is_empty() || !modified.is_empty() || !stale.is_empty() || !fingerprint_matches;

    Ok(DriftReport {
        missing,
        modified,
        stale,
        expected_fingerprint: fingerprint.clone(),
        recorded_fingerprint,
        fingerprint_matches,
        has_drift,
    })
}

fn recorded_fingerprint(index: &str) -> Option<String> {
    index.lines().find_map(|line| {
        line.strip_prefix(FINGERPRINT_VAR)
            .map(|value| value.trim().trim_matches('\'').to_owned())
    })
}

//! Artifact generation.
//!
//! Turns a resolved manifest into the text of every bash artifact. Nothing
//! here touches the filesystem; `kiln_store` writes the result. All shell
//! quoting lives in [`shell`].

mod aggregate;
mod doctor;
mod index;
mod installer;
pub mod shell;

pub use doctor::{records as doctor_records, DoctorRecord};
pub use index::INDEX_LOADED_VAR;

use crate::hardening::{HardeningError, HardeningPolicy};
use crate::resolve::ResolvedManifest;
use kiln_schema::{CategoryIndex, Fingerprint, ModuleId};
use kiln_store::{category_file_name, ArtifactFile, AGGREGATE_FILE, DOCTOR_FILE, INDEX_FILE};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("failed to render artifact: {0}")]
    Format(#[from] std::fmt::Error),
    #[error("install commands of '{module}' contain the heredoc delimiter line '{delimiter}'")]
    DelimiterCollision { module: ModuleId, delimiter: String },
    #[error(transparent)]
    Hardening(#[from] HardeningError),
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct GeneratorConfig {
    /// Helper library directory, relative to the output directory unless absolute.
    pub lib_dir: String,
    /// Manifest file name shown in artifact banners.
    pub manifest_label: String,
    pub hardening: HardeningPolicy,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            lib_dir: "../lib".to_owned(),
            manifest_label: "kiln.toml".to_owned(),
            hardening: HardeningPolicy::default(),
        }
    }
}

/// Rendered artifacts: the index, one installer per category in category
/// order, the aggregate installer, then the doctor checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifacts {
    files: Vec<ArtifactFile>,
}

impl Artifacts {
    pub fn files(&self) -> &[ArtifactFile] {
        &self.files
    }

    pub fn into_files(self) -> Vec<ArtifactFile> {
        self.files
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.files
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.contents.as_str())
    }

    pub fn names(&self) -> Vec<&str> {
        self.files.iter().map(|f| f.name.as_str()).collect()
    }
}

/// Render every artifact for `resolved`.
///
/// `categories` must be derived from the modules in install order. Output
/// is a pure function of the inputs: no timestamps or host details.
pub fn generate(
    resolved: &ResolvedManifest,
    categories: &CategoryIndex,
    fingerprint: &Fingerprint,
    config: &GeneratorConfig,
) -> Result<Artifacts, GenerateError> {
    config.hardening.lint(resolved.ordered())?;

    let mut files = Vec::with_capacity(categories.len() + 3);
    files.push(ArtifactFile::new(
        INDEX_FILE,
        index::render(resolved, categories, fingerprint, config)?,
    ));
    for category in &categories.categories {
        let modules: Vec<_> = categories
            .modules_in(category)
            .iter()
            .filter_map(|id| resolved.get(id))
            .collect();
        debug!("rendering {} ({} modules)", category, modules.len());
        files.push(ArtifactFile::new(
            category_file_name(category),
            installer::render(resolved, category, &modules, fingerprint, config)?,
        ));
    }
    files.push(ArtifactFile::new(
        AGGREGATE_FILE,
        aggregate::render(resolved, categories, fingerprint, config)?,
    ));
    files.push(ArtifactFile::new(
        DOCTOR_FILE,
        doctor::render(resolved, fingerprint, config)?,
    ));
    Ok(Artifacts { files })
}

use crate::concurrency::OutputLock;
use crate::drift::{diff_artifacts, DriftReport};
use crate::generate::{generate, Artifacts, GeneratorConfig};
use crate::resolve::{resolve, ResolvedManifest};
use crate::selection::{Plan, Selection};
use crate::CoreError;
use kiln_schema::{derive_categories, read_manifest, CategoryIndex, Fingerprint, ManifestFormat};
use kiln_store::{ArtifactWriter, CommitReport, OutputLayout};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Runs the kiln pipeline: parse, resolve, derive categories, fingerprint,
/// lint, render, and finally write.
///
/// Every validation step completes before the output directory is touched,
/// so a failing manifest never disturbs previously generated artifacts.
pub struct Engine {
    config: GeneratorConfig,
}

/// A manifest that parsed, resolved, and passed the hardening lint.
#[derive(Debug, Clone)]
pub struct LoadedManifest {
    pub path: PathBuf,
    pub format: ManifestFormat,
    pub fingerprint: Fingerprint,
    pub resolved: ResolvedManifest,
    pub categories: CategoryIndex,
}

impl LoadedManifest {
    /// File name of the manifest, as shown in artifact banners.
    pub fn label(&self) -> String {
        self.path
            .file_name()
            .map_or_else(|| "manifest".to_owned(), |n| n.to_string_lossy().into_owned())
    }
}

/// Result of a successful [`Engine::generate`].
#[derive(Debug, Clone, Serialize)]
pub struct GenerateResult {
    pub fingerprint: Fingerprint,
    pub out_dir: PathBuf,
    pub modules: usize,
    pub categories: Vec<String>,
    pub artifacts: Vec<String>,
    pub report: CommitReport,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(GeneratorConfig::default())
    }
}

impl Engine {
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn load(&self, manifest_path: &Path) -> Result<LoadedManifest, CoreError> {
        info!("loading manifest {}", manifest_path.display());
        let source = read_manifest(manifest_path)?;
        debug!(
            "parsed {} modules, fingerprint {}",
            source.manifest.modules.len(),
            source.fingerprint.short()
        );

        let resolved = resolve(source.manifest)?;
        self.config.hardening.lint(resolved.ordered())?;
        let categories = derive_categories(resolved.ordered());

        Ok(LoadedManifest {
            path: source.path,
            format: source.format,
            fingerprint: source.fingerprint,
            resolved,
            categories,
        })
    }

    /// Render every artifact for a loaded manifest without writing anything.
    pub fn render(&self, loaded: &LoadedManifest) -> Result<Artifacts, CoreError> {
        let config = GeneratorConfig {
            manifest_label: loaded.label(),
            ..self.config.clone()
        };
        Ok(generate(
            &loaded.resolved,
            &loaded.categories,
            &loaded.fingerprint,
            &config,
        )?)
    }

    pub fn generate(
        &self,
        manifest_path: &Path,
        out_dir: &Path,
    ) -> Result<GenerateResult, CoreError> {
        let loaded = self.load(manifest_path)?;
        let artifacts = self.render(&loaded)?;

        let layout = OutputLayout::new(out_dir);
        layout.initialize()?;
        let lock_path = layout.lock_file();
        let _lock = match OutputLock::try_acquire(&lock_path)? {
            Some(lock) => lock,
            None => {
                info!("waiting for another kiln run on {}", out_dir.display());
                OutputLock::acquire(&lock_path)?
            }
        };

        let report = ArtifactWriter::new(layout).commit(artifacts.files())?;
        info!(
            "generated {} artifacts in {} (manifest {})",
            artifacts.files().len(),
            out_dir.display(),
            loaded.fingerprint.short()
        );

        Ok(GenerateResult {
            fingerprint: loaded.fingerprint.clone(),
            out_dir: out_dir.to_path_buf(),
            modules: loaded.resolved.len(),
            categories: loaded
                .categories
                .categories
                .iter()
                .map(ToString::to_string)
                .collect(),
            artifacts: artifacts.names().into_iter().map(str::to_owned).collect(),
            report,
        })
    }

    /// Compare what would be generated now with the output directory.
    pub fn check(&self, manifest_path: &Path, out_dir: &Path) -> Result<DriftReport, CoreError> {
        let loaded = self.load(manifest_path)?;
        let artifacts = self.render(&loaded)?;
        let report = diff_artifacts(&OutputLayout::new(out_dir), &artifacts, &loaded.fingerprint)?;
        if report.has_drift {
            info!(
                "drift in {}: {} missing, {} modified, {} stale",
                out_dir.display(),
                report.missing.len(),
                report.modified.len(),
                report.stale.len()
            );
        }
        Ok(report)
    }

    pub fn plan(&self, loaded: &LoadedManifest, selection: &Selection) -> Result<Plan, CoreError> {
        Ok(selection.plan(&loaded.resolved)?)
    }
}

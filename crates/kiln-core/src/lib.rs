//! Graph resolution, hardening, artifact generation, and the `Engine`
//! pipeline for kiln.
//!
//! `kiln-schema` parses the manifest, this crate validates the dependency
//! graph and renders the bash artifacts, and `kiln-store` writes them. The
//! `Engine` ties the stages together and guarantees that nothing is written
//! unless every stage succeeds.

pub mod concurrency;
pub mod drift;
pub mod engine;
pub mod generate;
pub mod hardening;
pub mod resolve;
pub mod selection;

pub use concurrency::OutputLock;
pub use drift::{diff_artifacts, DriftReport};
pub use engine::{Engine, GenerateResult, LoadedManifest};
pub use generate::{
    doctor_records, generate, Artifacts, DoctorRecord, GenerateError, GeneratorConfig,
};
pub use hardening::{HardeningError, HardeningPolicy};
pub use resolve::{resolve, Adjacency, GraphError, ResolvedManifest};
pub use selection::{Plan, Selection, SelectionError};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("manifest error: {0}")]
    Manifest(#[from] kiln_schema::ManifestError),
    #[error("graph error: {0}")]
    Graph(#[from] GraphError),
    #[error("hardening error: {0}")]
    Hardening(#[from] HardeningError),
    #[error("selection error: {0}")]
    Selection(#[from] SelectionError),
    #[error("generate error: {0}")]
    Generate(GenerateError),
    #[error("output error: {0}")]
    Output(#[from] kiln_store::StoreError),
    #[error("output error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<GenerateError> for CoreError {
    fn from(err: GenerateError) -> Self {
        match err {
            GenerateError::Hardening(e) => Self::Hardening(e),
            other => Self::Generate(other),
        }
    }
}

//! Manifest parsing, typed module model, category derivation, and fingerprinting for kiln.
//!
//! This crate is the pure front half of the generator: it reads a TOML or YAML
//! module manifest (`ManifestDocument`), validates it into an immutable typed
//! model (`Manifest`, `Module`), partitions modules by category
//! (`derive_categories`), and computes the SHA-256 fingerprint of the raw
//! manifest bytes used for drift detection.

pub mod category;
pub mod fingerprint;
pub mod manifest;
pub mod normalize;
pub mod preset;
pub mod types;

pub use category::{derive_categories, CategoryIndex};
pub use fingerprint::fingerprint;
pub use manifest::{
    parse_manifest_bytes, parse_manifest_document, parse_manifest_str, read_manifest,
    ManifestDocument, ManifestError, ManifestFormat, ManifestSource,
};
pub use normalize::{Manifest, Module, RunAs, VerifyCheck, RESERVED_CATEGORY};
pub use preset::{get_preset, list_presets, Preset, BUILTIN_PRESETS};
pub use types::{Category, Fingerprint, ModuleId};

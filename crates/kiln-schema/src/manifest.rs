use crate::fingerprint::fingerprint;
use crate::normalize::Manifest;
use crate::types::Fingerprint;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse manifest: {0}")]
    ParseToml(#[from] toml::de::Error),
    #[error("failed to parse manifest: {0}")]
    ParseYaml(#[from] serde_yaml::Error),
    #[error("manifest is not valid UTF-8: {0}")]
    NotUtf8(#[from] std::str::Utf8Error),
    #[error("unsupported manifest_version: {0}, expected 1")]
    UnsupportedVersion(u32),
    #[error("module #{}{}: field `{field}`: {reason}", .index + 1, id_suffix(.id.as_deref()))]
    Malformed {
        index: usize,
        id: Option<String>,
        field: String,
        reason: String,
    },
    #[error("duplicate module id '{id}' at module #{} (first defined at module #{})", .second + 1, .first + 1)]
    DuplicateId {
        id: String,
        first: usize,
        second: usize,
    },
    #[error("modules '{first}' and '{second}' both map to install function '{function}'")]
    DuplicateFunction {
        first: String,
        second: String,
        function: String,
    },
}

fn id_suffix(id: Option<&str>) -> String {
    id.map(|id| format!(" ('{id}')")).unwrap_or_default()
}

/// Serialization format of a manifest document, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ManifestFormat {
    #[default]
    Toml,
    Yaml,
}

impl ManifestFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml" | "yml") => Self::Yaml,
            _ => Self::Toml,
        }
    }
}

/// Top-level manifest document as it appears on disk.
///
/// Module entries are kept loosely typed here so that validation can report
/// the position and field of every structural problem; see
/// [`ManifestDocument::normalize`](crate::normalize).
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ManifestDocument {
    #[serde(alias = "version")]
    pub manifest_version: u32,
    pub modules: Vec<serde_json::Value>,
}

/// A manifest read from disk together with the exact bytes it came from.
#[derive(Debug, Clone)]
pub struct ManifestSource {
    pub path: PathBuf,
    pub format: ManifestFormat,
    pub bytes: Vec<u8>,
    pub fingerprint: Fingerprint,
    pub manifest: Manifest,
}

impl ManifestSource {
    /// File name of the manifest, used in generated banners.
    pub fn label(&self) -> String {
        self.path
            .file_name()
            .map_or_else(|| "manifest".to_owned(), |n| n.to_string_lossy().into_owned())
    }
}

pub fn parse_manifest_document(
    input: &str,
    format: ManifestFormat,
) -> Result<ManifestDocument, ManifestError> {
    Ok(match format {
        ManifestFormat::Toml => toml::from_str(input)?,
        ManifestFormat::Yaml => serde_yaml::from_str(input)?,
    })
}

pub fn parse_manifest_str(input: &str, format: ManifestFormat) -> Result<Manifest, ManifestError> {
    parse_manifest_document(input, format)?.normalize()
}

pub fn parse_manifest_bytes(
    bytes: &[u8],
    format: ManifestFormat,
) -> Result<Manifest, ManifestError> {
    parse_manifest_str(std::str::from_utf8(bytes)?, format)
}

/// Read, fingerprint, and parse the manifest at `path`.
pub fn read_manifest(path: impl AsRef<Path>) -> Result<ManifestSource, ManifestError> {
    let path = path.as_ref();
    let bytes = fs::read(path)?;
    let format = ManifestFormat::from_path(path);
    let manifest = parse_manifest_bytes(&bytes, format)?;
    Ok(ManifestSource {
        path: path.to_path_buf(),
        format,
        fingerprint: fingerprint(&bytes),
        bytes,
        manifest,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_toml_manifest() {
        let input = r#"
manifest_version = 1

[[modules]]
id = "base.system"
description = "Base system packages"
phase = 0
run_as = "root"
install = ["apt-get update", "apt-get install -y curl git"]
installed_check = "command -v curl"
verify = "command -v curl && command -v git"

[[modules]]
id = "lang.bun"
dependencies = ["base.system"]
tags = ["runtime", "js"]
install = """
curl -fsSL https://bun.sh/install | bash
"""
verify = [
  "bun --version",
  { run = "bunx --version", description = "bunx shim", optional = true },
]
"#;
        let manifest = parse_manifest_str(input, ManifestFormat::Toml).expect("should parse");
        assert_eq!(manifest.version, 1);
        assert_eq!(manifest.modules.len(), 2);

        let base = &manifest.modules[0];
        assert_eq!(base.id, "base.system");
        assert_eq!(base.phase, 0);
        assert_eq!(base.install.len(), 2);
        assert_eq!(base.installed_check.as_deref(), Some("command -v curl"));

        let bun = &manifest.modules[1];
        assert_eq!(bun.phase, 1);
        assert_eq!(bun.category, "lang");
        assert_eq!(bun.dependencies, vec![crate::types::ModuleId::from("base.system")]);
        assert_eq!(bun.verify.len(), 2);
        assert!(bun.verify[0].required);
        assert!(!bun.verify[1].required);
        assert_eq!(bun.verify[1].description.as_deref(), Some("bunx shim"));
    }

    #[test]
    fn parses_yaml_manifest() {
        let input = r"
version: 1
modules:
  - id: base.system
    phase: 0
  - id: lang.bun
    dependencies: [base.system]
    verify:
      - run: |
          bun --version
          bun pm ls
        description: bun toolchain
";
        let manifest = parse_manifest_str(input, ManifestFormat::Yaml).expect("should parse");
        assert_eq!(manifest.modules.len(), 2);
        assert_eq!(manifest.modules[1].verify[0].command, "bun --version\nbun pm ls");
    }

    #[test]
    fn parses_empty_module_list() {
        let manifest = parse_manifest_str("manifest_version = 1\nmodules = []\n", ManifestFormat::Toml)
            .unwrap();
        assert!(manifest.modules.is_empty());
    }

    #[test]
    fn rejects_unknown_top_level_fields() {
        let input = "manifest_version = 1\nmodules = []\nextra = true\n";
        assert!(matches!(
            parse_manifest_str(input, ManifestFormat::Toml),
            Err(ManifestError::ParseToml(_))
        ));
    }

    #[test]
    fn rejects_missing_modules() {
        assert!(parse_manifest_str("manifest_version = 1\n", ManifestFormat::Toml).is_err());
    }

    #[test]
    fn rejects_unsupported_version() {
        let err = parse_manifest_str("manifest_version = 2\nmodules = []\n", ManifestFormat::Toml)
            .unwrap_err();
        assert!(matches!(err, ManifestError::UnsupportedVersion(2)));
    }

    #[test]
    fn rejects_non_utf8_bytes() {
        let err = parse_manifest_bytes(&[0xff, 0xfe, 0x00], ManifestFormat::Toml).unwrap_err();
        assert!(matches!(err, ManifestError::NotUtf8(_)));
    }

    #[test]
    fn format_follows_extension() {
        assert_eq!(
            ManifestFormat::from_path(Path::new("kiln.yaml")),
            ManifestFormat::Yaml
        );
        assert_eq!(
            ManifestFormat::from_path(Path::new("kiln.yml")),
            ManifestFormat::Yaml
        );
        assert_eq!(
            ManifestFormat::from_path(Path::new("kiln.toml")),
            ManifestFormat::Toml
        );
        assert_eq!(
            ManifestFormat::from_path(Path::new("manifest")),
            ManifestFormat::Toml
        );
    }

    #[test]
    fn read_manifest_keeps_raw_bytes_and_fingerprint() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kiln.toml");
        let content = "manifest_version = 1\n\n[[modules]]\nid = \"base.system\"\n";
        fs::write(&path, content).unwrap();

        let source = read_manifest(&path).unwrap();
        assert_eq!(source.bytes, content.as_bytes());
        assert_eq!(source.fingerprint, fingerprint(content.as_bytes()));
        assert_eq!(source.label(), "kiln.toml");
        assert_eq!(source.manifest.modules.len(), 1);
    }

    #[test]
    fn read_manifest_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_manifest(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ManifestError::Io(_)));
        assert!(err.to_string().starts_with("failed to read manifest"));
    }

    #[test]
    fn malformed_error_display_names_position_id_and_field() {
        let err = ManifestError::Malformed {
            index: 2,
            id: Some("lang.bun".to_owned()),
            field: "phase".to_owned(),
            reason: "expected a non-negative integer".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("module #3"));
        assert!(msg.contains("lang.bun"));
        assert!(msg.contains("`phase`"));
    }
}

use super::shell;
use super::GeneratorConfig;
use crate::resolve::ResolvedManifest;
use kiln_schema::{CategoryIndex, Fingerprint, ModuleId};
use std::fmt::{self, Write};

/// Assigned `true` by the final statement of the index.
pub const INDEX_LOADED_VAR: &str = "KILN_MANIFEST_INDEX_LOADED";

pub(super) fn render(
    resolved: &ResolvedManifest,
    categories: &CategoryIndex,
    fingerprint: &Fingerprint,
    config: &GeneratorConfig,
) -> Result<String, fmt::Error> {
    let mut out = String::new();
    shell::banner(
        &mut out,
        &config.manifest_label,
        fingerprint,
        "module index: install order and per-module lookup tables",
    )?;
    writeln!(out)?;
    writeln!(out, "KILN_MANIFEST_SHA256={}", shell::quote(fingerprint))?;
    writeln!(out, "KILN_MANIFEST_VERSION={}", resolved.manifest().version)?;
    writeln!(out)?;

    shell::array(
        &mut out,
        "KILN_MODULES_IN_ORDER",
        resolved.ordered().map(|m| m.id.as_str()),
    )?;
    writeln!(out)?;

    let ordered: Vec<_> = resolved.ordered().collect();
    shell::assoc(
        &mut out,
        "KILN_MODULE_PHASE",
        ordered.iter().map(|m| (&m.id, m.phase.to_string())),
    )?;
    shell::assoc(
        &mut out,
        "KILN_MODULE_DEPS",
        ordered.iter().map(|m| (&m.id, join_ids(&m.dependencies))),
    )?;
    shell::assoc(
        &mut out,
        "KILN_MODULE_FUNC",
        ordered.iter().map(|m| (&m.id, m.install_function())),
    )?;
    shell::assoc(
        &mut out,
        "KILN_MODULE_CATEGORY",
        ordered.iter().map(|m| (&m.id, &m.category)),
    )?;
    shell::assoc(
        &mut out,
        "KILN_MODULE_DEFAULT",
        ordered
            .iter()
            .map(|m| (&m.id, if m.enabled_by_default { "1" } else { "0" })),
    )?;
    shell::assoc(
        &mut out,
        "KILN_MODULE_TAGS",
        ordered.iter().map(|m| {
            let tags: Vec<&str> = m.tags.iter().map(String::as_str).collect();
            (&m.id, tags.join(","))
        }),
    )?;
    writeln!(out)?;

    shell::array(
        &mut out,
        "KILN_CATEGORIES",
        categories.categories.iter().map(|c| c.as_str()),
    )?;
    writeln!(out)?;

    out.push_str(IS_CURRENT_FN);
    writeln!(out)?;
    // Must stay the last statement: consumers treat it as proof of a complete load.
    writeln!(out, "{INDEX_LOADED_VAR}=true")?;
    Ok(out)
}

fn join_ids(ids: &[ModuleId]) -> String {
    ids.iter().map(ModuleId::as_str).collect::<Vec<_>>().join(",")
}

const IS_CURRENT_FN: &str = r#"# Succeeds when the manifest at $1 still hashes to KILN_MANIFEST_SHA256.
kiln_manifest_is_current() {
  local manifest="${1:-}" actual
  [[ -n "$manifest" && -f "$manifest" ]] || return 1
  if command -v sha256sum >/dev/null 2>&1; then
    actual="$(sha256sum -- "$manifest")"
  elif command -v shasum >/dev/null 2>&1; then
    actual="$(shasum -a 256 -- "$manifest")"
  else
    return 1
  fi
  [[ "${actual%% *}" == "$KILN_MANIFEST_SHA256" ]]
}
"#;

use super::index::INDEX_LOADED_VAR;
use super::shell::{self, quote};
use super::GeneratorConfig;
use crate::resolve::ResolvedManifest;
use kiln_schema::{CategoryIndex, Fingerprint};
use kiln_store::{category_file_name, INDEX_FILE};
use std::fmt::{self, Write};

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
        "aggregate installer: every module in install order",
    )?;
    writeln!(out)?;
    shell::generated_dir(&mut out)?;
    writeln!(out)?;

    writeln!(out, "# shellcheck source=/dev/null")?;
    writeln!(out, "source \"$KILN_GENERATED_DIR\"/{}", quote(INDEX_FILE))?;
    writeln!(out, "if [[ \"${{{INDEX_LOADED_VAR}:-}}\" != true ]]; then")?;
    writeln!(
        out,
        "  printf '%s\\n' {} >&2",
        quote(&format!("kiln: {INDEX_FILE} did not load completely; regenerate it"))
    )?;
    writeln!(out, "  return 1 2>/dev/null || exit 1")?;
    writeln!(out, "fi")?;
    for category in &categories.categories {
        writeln!(out, "# shellcheck source=/dev/null")?;
        writeln!(
            out,
            "source \"$KILN_GENERATED_DIR\"/{}",
            quote(&category_file_name(category))
        )?;
    }
    out.push_str(INSTALL_MODULE_FN);
    writeln!(out)?;

    writeln!(out, "kiln_install_all() {{")?;
    for module in resolved.ordered() {
        writeln!(out, "  kiln_install_module {} || return 1", quote(&module.id))?;
    }
    writeln!(out, "  return 0")?;
    writeln!(out, "}}")?;
    writeln!(out)?;
    writeln!(out, "if [[ \"${{BASH_SOURCE[0]}}\" == \"$0\" ]]; then")?;
    writeln!(out, "  set -euo pipefail")?;
    writeln!(out, "  kiln_install_all")?;
    writeln!(out, "fi")?;
    Ok(out)
}

/// `kiln_module_skipped` and the logging helpers come from the sourced
/// category installers.
const INSTALL_MODULE_FN: &str = r#"
kiln_install_module() {
  local id="$1"
  local func="${KILN_MODULE_FUNC[$id]:-}"
  if [[ -z "$func" ]]; then
    kiln_log_error "unknown module: $id"
    return 1
  fi
  if kiln_module_skipped "$id"; then
    kiln_log_info "$id: skipped by KILN_SKIP_MODULES"
    return 0
  fi
  if [[ "${KILN_MODULE_DEFAULT[$id]:-1}" != 1 && "${KILN_INCLUDE_DISABLED:-0}" != 1 ]]; then
    kiln_log_info "$id: disabled by default (set KILN_INCLUDE_DISABLED=1 to install)"
    return 0
  fi
  "$func"
}
"#;

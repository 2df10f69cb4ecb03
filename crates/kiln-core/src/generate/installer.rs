use super::shell::{self, quote};
use super::{GenerateError, GeneratorConfig};
use crate::hardening::HardeningPolicy;
use crate::resolve::ResolvedManifest;
use kiln_schema::{Category, Fingerprint, Module, RunAs};
use std::fmt::Write;

/// Render `install_<category>.sh` holding one install function per module.
pub(super) fn render(
    resolved: &ResolvedManifest,
    category: &Category,
    modules: &[&Module],
    fingerprint: &Fingerprint,
    config: &GeneratorConfig,
) -> Result<String, GenerateError> {
    let mut out = String::new();
    shell::banner(
        &mut out,
        &config.manifest_label,
        fingerprint,
        &format!("category installer: {category}"),
    )?;
    writeln!(out)?;
    shell::generated_dir(&mut out)?;
    writeln!(
        out,
        "KILN_LIB_DIR=\"${{KILN_LIB_DIR:-{}}}\"",
        shell::lib_dir_expr(&config.lib_dir)
    )?;
    out.push_str(PRELUDE);

    for module in modules {
        writeln!(out)?;
        render_function(&mut out, resolved, module, &config.hardening)?;
    }
    Ok(out)
}

fn render_function(
    out: &mut String,
    resolved: &ResolvedManifest,
    module: &Module,
    policy: &HardeningPolicy,
) -> Result<(), GenerateError> {
    let function = module.install_function();
    // Ids are restricted to [A-Za-z0-9_.-], safe as bare associative keys.
    let id = module.id.as_str();
    let runner = match module.run_as {
        RunAs::User => "kiln_run_as_user",
        RunAs::Root => "kiln_run_as_root",
    };

    writeln!(out, "# {}: {}", module.id, module.description)?;
    writeln!(out, "{function}() {{")?;
    writeln!(
        out,
        "  [[ \"${{KILN_MODULE_DONE[{id}]:-}}\" == 1 ]] && return 0"
    )?;
    for dep in &module.dependencies {
        if let Some(dep_module) = resolved.get(dep) {
            writeln!(
                out,
                "  kiln_require_module {} {} || return 1",
                quote(dep),
                dep_module.install_function()
            )?;
        }
    }
    if let Some(check) = &module.installed_check {
        writeln!(
            out,
            "  if {runner} bash -c {} >/dev/null 2>&1; then",
            quote(check)
        )?;
        writeln!(
            out,
            "    kiln_log_info {}",
            quote(&format!("{}: already installed", module.id))
        )?;
        writeln!(out, "    KILN_MODULE_DONE[{id}]=1")?;
        writeln!(out, "    return 0")?;
        writeln!(out, "  fi")?;
    }
    writeln!(
        out,
        "  kiln_log_info {}",
        quote(&format!("{}: installing ({})", module.id, module.description))
    )?;

    if policy.applies_to(module) {
        render_hardening(out, policy)?;
    }

    if !module.install.is_empty() {
        let delimiter = shell::heredoc_delimiter(&function);
        let body = module.install.join("\n");
        if body.lines().any(|line| line == delimiter) {
            return Err(GenerateError::DelimiterCollision {
                module: module.id.clone(),
                delimiter,
            });
        }
        writeln!(out, "  if ! {runner} bash -euo pipefail -s <<'{delimiter}'")?;
        writeln!(out, "{body}")?;
        writeln!(out, "{delimiter}")?;
        writeln!(out, "  then")?;
        writeln!(
            out,
            "    kiln_log_error {}",
            quote(&format!("{}: install failed", module.id))
        )?;
        writeln!(out, "    return 1")?;
        writeln!(out, "  fi")?;
    }
    writeln!(out, "  KILN_MODULE_DONE[{id}]=1")?;
    writeln!(out, "}}")?;
    Ok(())
}

/// Guard every sensitive path against symlinks and non-directories before
/// anything privileged runs, then create the layout and hand only the
/// managed children to the target user.
fn render_hardening(out: &mut String, policy: &HardeningPolicy) -> Result<(), GenerateError> {
    let sensitive = policy.sensitive_paths();
    for path in &sensitive {
        let p = quote(path);
        writeln!(out, "  if [[ -L {p} ]]; then")?;
        writeln!(
            out,
            "    kiln_log_error {}",
            quote(&format!("refusing to use {path}: it is a symlink"))
        )?;
        writeln!(out, "    return 1")?;
        writeln!(out, "  fi")?;
        writeln!(out, "  if [[ -e {p} && ! -d {p} ]]; then")?;
        writeln!(
            out,
            "    kiln_log_error {}",
            quote(&format!("refusing to use {path}: not a directory"))
        )?;
        writeln!(out, "    return 1")?;
        writeln!(out, "  fi")?;
    }
    let all: Vec<String> = sensitive.iter().map(|p| quote(p)).collect();
    writeln!(
        out,
        "  kiln_run_as_root mkdir -p -- {} || return 1",
        all.join(" ")
    )?;
    let managed: Vec<String> = policy.managed_paths().iter().map(|p| quote(p)).collect();
    if !managed.is_empty() {
        writeln!(
            out,
            "  kiln_run_as_root chown -hR -- \"${}\" {} || return 1",
            policy.owner_var,
            managed.join(" ")
        )?;
    }
    Ok(())
}

/// Sourced helper libraries are optional; anything they do not define gets
/// a minimal fallback so the installer also works standalone.
const PRELUDE: &str = r#"
# shellcheck source=/dev/null
[[ -f "$KILN_LIB_DIR/logging.sh" ]] && source "$KILN_LIB_DIR/logging.sh"
# shellcheck source=/dev/null
[[ -f "$KILN_LIB_DIR/helpers.sh" ]] && source "$KILN_LIB_DIR/helpers.sh"

: "${KILN_TARGET_USER:=${SUDO_USER:-$(id -un)}}"

if ! declare -F kiln_log_info >/dev/null; then
  kiln_log_info() { printf '[INFO] %s\n' "$*" >&2; }
fi
if ! declare -F kiln_log_warn >/dev/null; then
  kiln_log_warn() { printf '[WARN] %s\n' "$*" >&2; }
fi
if ! declare -F kiln_log_error >/dev/null; then
  kiln_log_error() { printf '[ERROR] %s\n' "$*" >&2; }
fi
if ! declare -F kiln_run_as_root >/dev/null; then
  kiln_run_as_root() {
    if [[ $EUID -eq 0 ]]; then
      "$@"
    else
      sudo -- "$@"
    fi
  }
fi
if ! declare -F kiln_run_as_user >/dev/null; then
  kiln_run_as_user() {
    if [[ $EUID -eq 0 && "$KILN_TARGET_USER" != root ]]; then
      sudo -H -u "$KILN_TARGET_USER" -- "$@"
    else
      "$@"
    fi
  }
fi

# Succeeds when $1 is listed in the comma or space separated KILN_SKIP_MODULES.
kiln_module_skipped() {
  local id="$1" skip
  local -a skips=()
  IFS=', ' read -ra skips <<< "${KILN_SKIP_MODULES:-}"
  for skip in ${skips[@]+"${skips[@]}"}; do
    [[ "$skip" == "$id" ]] && return 0
  done
  return 1
}

# Runs dependency $1 through its install function $2 unless it already ran.
# A skipped dependency is an error, never a silent install.
kiln_require_module() {
  local id="$1" func="$2"
  [[ "${KILN_MODULE_DONE[$id]:-}" == 1 ]] && return 0
  if kiln_module_skipped "$id"; then
    kiln_log_error "dependency $id is listed in KILN_SKIP_MODULES but is required"
    return 1
  fi
  if ! declare -F "$func" >/dev/null; then
    kiln_log_error "dependency $id is not loaded ($func)"
    return 1
  fi
  "$func"
}

declare -gA KILN_MODULE_DONE
"#;

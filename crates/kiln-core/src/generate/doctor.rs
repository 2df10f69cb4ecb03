use super::shell;
use super::GeneratorConfig;
use crate::resolve::ResolvedManifest;
use kiln_schema::{Fingerprint, ModuleId};
use serde::Serialize;
use std::fmt::{self, Write};

/// One verification check, flattened for the doctor table.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DoctorRecord {
    pub id: ModuleId,
    pub description: String,
    pub command: String,
    pub required: bool,
}

impl DoctorRecord {
    /// Tab-separated single-line encoding. In the command, backslashes are
    /// doubled and newlines become `\n`, which the driver reverses with
    /// `printf %b`.
    pub fn encode(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}",
            self.id,
            self.description,
            escape_command(&self.command),
            if self.required { "required" } else { "optional" }
        )
    }
}

fn escape_command(command: &str) -> String {
    let mut out = String::with_capacity(command.len());
    for c in command.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out
}

/// One record per verify entry, in install order. Modules without verify
/// entries contribute nothing.
pub fn records(resolved: &ResolvedManifest) -> Vec<DoctorRecord> {
    resolved
        .ordered()
        .flat_map(|module| {
            module.verify.iter().map(|check| DoctorRecord {
                id: module.id.clone(),
                description: check
                    .description
                    .clone()
                    .unwrap_or_else(|| module.description.clone()),
                command: check.command.clone(),
                required: check.required,
            })
        })
        .collect()
}

pub(super) fn render(
    resolved: &ResolvedManifest,
    fingerprint: &Fingerprint,
    config: &GeneratorConfig,
) -> Result<String, fmt::Error> {
    let mut out = String::new();
    shell::banner(
        &mut out,
        &config.manifest_label,
        fingerprint,
        "doctor checks: id<TAB>description<TAB>command<TAB>required|optional",
    )?;
    writeln!(out)?;
    writeln!(out, "KILN_DOCTOR_CHECKS=(")?;
    for record in records(resolved) {
        writeln!(out, "  {}", shell::ansi_c_quote(&record.encode()))?;
    }
    writeln!(out, ")")?;
    out.push_str(DRIVER);
    Ok(out)
}

const DRIVER: &str = r#"
kiln_run_doctor_checks() {
  local record id description command requirement
  local passed=0 failed=0 warned=0
  for record in "${KILN_DOCTOR_CHECKS[@]}"; do
    IFS=$'\t' read -r id description command requirement <<< "$record"
    printf -v command '%b' "$command"
    if ( eval "$command" ) >/dev/null 2>&1; then
      printf 'PASS  %s: %s\n' "$id" "$description"
      passed=$((passed + 1))
    elif [[ "$requirement" == required ]]; then
      printf 'FAIL  %s: %s\n' "$id" "$description"
      failed=$((failed + 1))
    else
      printf 'WARN  %s: %s\n' "$id" "$description"
      warned=$((warned + 1))
    fi
  done
  printf '%d passed, %d failed, %d warnings\n' "$passed" "$failed" "$warned"
  [[ $failed -eq 0 ]]
}

if [[ "${BASH_SOURCE[0]}" == "$0" ]]; then
  kiln_run_doctor_checks
fi
"#;

//! Bash emission primitives. Every piece of generated shell syntax that
//! needs quoting goes through here.

use kiln_schema::Fingerprint;
use kiln_store::GENERATED_MARKER;
use std::fmt::{self, Write};

pub const SHEBANG: &str = "#!/usr/bin/env bash";

/// Single-quote `s` for bash. Embedded quotes become `'\''`.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        if c == '\'' {
            out.push_str("'\\''");
        } else {
            out.push(c);
        }
    }
    out.push('\'');
    out
}

/// ANSI-C quote `s` as `$'...'`, escaping backslashes, quotes, and control
/// characters so the literal stays on one line.
pub fn ansi_c_quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 3);
    out.push_str("$'");
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c if (c as u32) < 0x20 || c == '\u{7f}' => {
                // write! to a String cannot fail
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// Shebang plus the do-not-edit banner shared by every artifact.
pub fn banner(out: &mut String, label: &str, fingerprint: &Fingerprint, role: &str) -> fmt::Result {
    writeln!(out, "{SHEBANG}")?;
    writeln!(out, "# {GENERATED_MARKER} from {label}; DO NOT EDIT.")?;
    writeln!(out, "# manifest sha256: {fingerprint}")?;
    writeln!(out, "# {role}")?;
    writeln!(out, "# shellcheck disable=SC2034")
}

/// Indexed array assignment, one element per line.
pub fn array<'a>(
    out: &mut String,
    name: &str,
    items: impl IntoIterator<Item = &'a str>,
) -> fmt::Result {
    writeln!(out, "{name}=(")?;
    for item in items {
        writeln!(out, "  {}", quote(item))?;
    }
    writeln!(out, ")")
}

/// Global associative array assignment.
pub fn assoc<K: AsRef<str>, V: AsRef<str>>(
    out: &mut String,
    name: &str,
    entries: impl IntoIterator<Item = (K, V)>,
) -> fmt::Result {
    writeln!(out, "declare -gA {name}=(")?;
    for (key, value) in entries {
        writeln!(out, "  [{}]={}", quote(key.as_ref()), quote(value.as_ref()))?;
    }
    writeln!(out, ")")
}

/// Sets `KILN_GENERATED_DIR` to the directory holding the sourcing artifact.
pub fn generated_dir(out: &mut String) -> fmt::Result {
    writeln!(
        out,
        "KILN_GENERATED_DIR=\"$(cd \"$(dirname \"${{BASH_SOURCE[0]}}\")\" && pwd)\""
    )
}

/// Expression for the helper library directory. Relative paths are resolved
/// against the generated directory, not the caller's working directory.
pub fn lib_dir_expr(lib_dir: &str) -> String {
    if lib_dir.starts_with('/') {
        quote(lib_dir)
    } else {
        format!("\"$KILN_GENERATED_DIR\"/{}", quote(lib_dir))
    }
}

/// Quoted heredoc delimiter for an install function body.
pub fn heredoc_delimiter(function: &str) -> String {
    format!("KILN_EOF_{function}")
}

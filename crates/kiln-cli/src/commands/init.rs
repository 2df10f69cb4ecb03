use super::{json_pretty, EXIT_SUCCESS};
use kiln_schema::{list_presets, parse_manifest_str, ManifestFormat};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

fn template_source(name: &str) -> Result<&'static str, String> {
    kiln_schema::get_preset(name)
        .map(|p| p.manifest)
        .ok_or_else(|| {
            let names: Vec<&str> = list_presets().iter().map(|p| p.name).collect();
            format!("unknown template '{name}' (expected: {})", names.join(", "))
        })
}

fn write_atomic(dest: &Path, content: &str) -> Result<(), String> {
    let dir = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| format!("write temp file: {e}"))?;
    tmp.write_all(content.as_bytes())
        .map_err(|e| format!("write temp file: {e}"))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| format!("fsync temp file: {e}"))?;
    tmp.persist(dest)
        .map_err(|e| format!("persist manifest: {}", e.error))?;
    Ok(())
}

pub fn run(dest: &Path, template: &str, force: bool, json: bool) -> Result<u8, String> {
    let source = template_source(template)?;
    if dest.exists() && !force {
        return Err(format!(
            "refusing to overwrite existing {} (pass --force)",
            dest.display()
        ));
    }
    // Built-in templates must stay valid; fail before writing if one is not.
    parse_manifest_str(source, ManifestFormat::Toml)
        .map_err(|e| format!("template '{template}' is invalid: {e}"))?;
    write_atomic(dest, source)?;

    if json {
        let payload = serde_json::json!({
            "status": "written",
            "path": dest.display().to_string(),
            "template": template,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!("wrote {} from template '{template}'", dest.display());
    }
    Ok(EXIT_SUCCESS)
}

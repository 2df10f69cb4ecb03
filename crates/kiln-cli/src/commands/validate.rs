use super::{colorize_status, json_pretty, EXIT_SUCCESS};
use kiln_core::Engine;
use std::path::Path;

pub fn run(engine: &Engine, manifest: &Path, json: bool) -> Result<u8, String> {
    let loaded = engine.load(manifest).map_err(|e| e.to_string())?;

    if json {
        let payload = serde_json::json!({
            "status": "valid",
            "manifest": manifest.display().to_string(),
            "fingerprint": loaded.fingerprint,
            "modules": loaded.resolved.len(),
            "categories": loaded.categories.categories,
            "order": loaded.resolved.install_order(),
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!(
            "{}: {} ({} modules, {} categories, sha256 {})",
            colorize_status("ok"),
            manifest.display(),
            loaded.resolved.len(),
            loaded.categories.len(),
            loaded.fingerprint.short()
        );
    }
    Ok(EXIT_SUCCESS)
}

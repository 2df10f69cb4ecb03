use super::{core_err, json_pretty, EXIT_SUCCESS};
use kiln_core::Engine;
use std::path::Path;

pub fn run(
    engine: &Engine,
    manifest: &Path,
    module: &str,
    reverse: bool,
    json: bool,
) -> Result<u8, String> {
    let loaded = engine.load(manifest).map_err(|e| e.to_string())?;
    let modules = if reverse {
        loaded.resolved.transitive_dependents(module)
    } else {
        loaded.resolved.transitive_dependencies(module)
    }
    .map_err(core_err)?;

    if json {
        let direct = loaded.resolved.adjacency().remove(module);
        let payload = serde_json::json!({
            "module": module,
            "direction": if reverse { "dependents" } else { "dependencies" },
            "modules": modules,
            "direct": direct,
        });
        println!("{}", json_pretty(&payload)?);
        return Ok(EXIT_SUCCESS);
    }

    if modules.is_empty() {
        let what = if reverse { "dependents" } else { "dependencies" };
        println!("{module} has no {what}");
    } else {
        for id in &modules {
            println!("{id}");
        }
    }
    Ok(EXIT_SUCCESS)
}

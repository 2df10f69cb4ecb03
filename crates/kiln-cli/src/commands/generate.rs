use super::{colorize_status, json_pretty, spin_fail, spin_ok, spinner, EXIT_SUCCESS};
use kiln_core::Engine;
use std::path::Path;

pub fn run(engine: &Engine, manifest: &Path, out: &Path, json: bool) -> Result<u8, String> {
    let pb = if json {
        None
    } else {
        Some(spinner("generating artifacts..."))
    };

    let result = match engine.generate(manifest, out) {
        Ok(r) => {
            if let Some(ref pb) = pb {
                spin_ok(pb, "artifacts generated");
            }
            r
        }
        Err(e) => {
            if let Some(ref pb) = pb {
                spin_fail(pb, "generation failed");
            }
            return Err(e.to_string());
        }
    };

    if json {
        println!("{}", json_pretty(&result)?);
        return Ok(EXIT_SUCCESS);
    }

    println!(
        "generated {} artifacts for {} modules in {}",
        result.artifacts.len(),
        result.modules,
        out.display()
    );
    println!("manifest sha256: {}", result.fingerprint);
    println!("helper library: {}", engine.config().lib_dir);
    for (status, paths) in [
        ("written", &result.report.written),
        ("unchanged", &result.report.unchanged),
        ("pruned", &result.report.pruned),
    ] {
        for path in paths {
            let name = path
                .file_name()
                .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
            println!("  {:<9} {name}", colorize_status(status));
        }
    }
    Ok(EXIT_SUCCESS)
}

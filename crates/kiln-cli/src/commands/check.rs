use super::{colorize_status, json_pretty, EXIT_FAILURE, EXIT_SUCCESS};
use kiln_core::Engine;
use std::path::Path;

pub fn run(engine: &Engine, manifest: &Path, out: &Path, json: bool) -> Result<u8, String> {
    let report = engine.check(manifest, out).map_err(|e| e.to_string())?;
    let code = if report.has_drift {
        EXIT_FAILURE
    } else {
        EXIT_SUCCESS
    };

    if json {
        println!("{}", json_pretty(&report)?);
        return Ok(code);
    }

    if !report.has_drift {
        println!(
            "{}: {} matches manifest {}",
            colorize_status("clean"),
            out.display(),
            report.expected_fingerprint.short()
        );
        return Ok(code);
    }

    println!("{}: {} is out of date", colorize_status("drift"), out.display());
    if !report.fingerprint_matches {
        println!(
            "  manifest sha256 {} (artifacts record {})",
            report.expected_fingerprint.short(),
            report
                .recorded_fingerprint
                .as_deref()
                .map_or("nothing", |fp| fp.get(..12).unwrap_or(fp))
        );
    }
    for (status, names) in [
        ("missing", &report.missing),
        ("modified", &report.modified),
        ("stale", &report.stale),
    ] {
        for name in names {
            println!("  {:<8} {name}", colorize_status(status));
        }
    }
    println!("run `kiln generate` to update");
    Ok(code)
}

use super::{colorize_status, core_err, json_pretty, EXIT_SUCCESS};
use kiln_core::{Engine, Selection};
use std::path::Path;

pub fn run(
    engine: &Engine,
    manifest: &Path,
    selection: &Selection,
    json: bool,
) -> Result<u8, String> {
    let loaded = engine.load(manifest).map_err(|e| e.to_string())?;
    let plan = engine.plan(&loaded, selection).map_err(core_err)?;

    if json {
        println!("{}", json_pretty(&plan)?);
        return Ok(EXIT_SUCCESS);
    }

    if selection.is_empty() {
        let scope = if selection.include_disabled {
            "every module"
        } else {
            "modules enabled by default"
        };
        println!("plan: {scope}");
    }
    for (i, id) in plan.modules.iter().enumerate() {
        println!("{:>3}  {id}", i + 1);
    }
    for id in &plan.skipped {
        println!("     {id}  ({})", colorize_status("skipped"));
    }
    Ok(EXIT_SUCCESS)
}

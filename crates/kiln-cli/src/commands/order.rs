use super::{colorize_status, json_pretty, EXIT_SUCCESS};
use kiln_core::Engine;
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct OrderEntry<'a> {
    position: usize,
    id: &'a str,
    phase: u32,
    category: &'a str,
    function: String,
    enabled_by_default: bool,
}

pub fn run(engine: &Engine, manifest: &Path, json: bool) -> Result<u8, String> {
    let loaded = engine.load(manifest).map_err(|e| e.to_string())?;
    let entries: Vec<OrderEntry<'_>> = loaded
        .resolved
        .ordered()
        .enumerate()
        .map(|(position, m)| OrderEntry {
            position,
            id: &m.id,
            phase: m.phase,
            category: &m.category,
            function: m.install_function(),
            enabled_by_default: m.enabled_by_default,
        })
        .collect();

    if json {
        println!("{}", json_pretty(&entries)?);
        return Ok(EXIT_SUCCESS);
    }

    for entry in &entries {
        let suffix = if entry.enabled_by_default {
            String::new()
        } else {
            format!("  ({})", colorize_status("disabled"))
        };
        println!(
            "{:>3}  phase {}  {:<24} [{}]{suffix}",
            entry.position + 1,
            entry.phase,
            entry.id,
            entry.category
        );
    }
    Ok(EXIT_SUCCESS)
}

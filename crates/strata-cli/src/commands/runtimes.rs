use super::{json_pretty, EXIT_SUCCESS};
use strata_core::Repository;

pub fn run(repo: &Repository, json: bool) -> Result<u8, String> {
    let runtimes = repo.runtimes().iter_runtimes().map_err(|e| e.to_string())?;

    if json {
        let mut entries = Vec::new();
        for runtime in &runtimes {
            entries.push(serde_json::json!({
                "id": runtime.id(),
                "stack": runtime
                    .stack()
                    .iter()
                    .map(|d| d.to_hex())
                    .collect::<Vec<_>>(),
                "editable": runtime.is_editable(),
                "dirty": runtime.is_dirty().map_err(|e| e.to_string())?,
            }));
        }
        println!("{}", json_pretty(&entries)?);
        return Ok(EXIT_SUCCESS);
    }

    if runtimes.is_empty() {
        println!("no runtimes");
        return Ok(EXIT_SUCCESS);
    }
    for runtime in &runtimes {
        let dirty = runtime.is_dirty().map_err(|e| e.to_string())?;
        println!(
            "{}  layers={}  editable={}  dirty={}",
            runtime.id(),
            runtime.stack().len(),
            runtime.is_editable(),
            dirty
        );
    }
    Ok(EXIT_SUCCESS)
}

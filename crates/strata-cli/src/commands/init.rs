use super::{json_pretty, EXIT_SUCCESS};
use std::path::Path;
use strata_core::Repository;

pub fn run(path: &Path, json: bool) -> Result<u8, String> {
    let repo = Repository::create(path).map_err(|e| e.to_string())?;
    if json {
        let payload = serde_json::json!({ "root": repo.layout().root() });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!("initialized repository at {}", repo.layout().root().display());
    }
    Ok(EXIT_SUCCESS)
}

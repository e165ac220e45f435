use super::{json_pretty, EXIT_SUCCESS};
use strata_core::Repository;

pub fn run(repo: &Repository, json: bool) -> Result<u8, String> {
    let names = repo.tags().stream_names().map_err(|e| e.to_string())?;

    if json {
        let mut entries = Vec::new();
        for name in &names {
            let stream = repo.tags().read_tag_stream(name).map_err(|e| e.to_string())?;
            let latest = &stream[0];
            entries.push(serde_json::json!({
                "name": name,
                "target": latest.target.to_hex(),
                "versions": stream.len(),
                "time": latest.time.to_rfc3339(),
                "user": latest.user,
            }));
        }
        println!("{}", json_pretty(&entries)?);
        return Ok(EXIT_SUCCESS);
    }

    for name in &names {
        let stream = repo.tags().read_tag_stream(name).map_err(|e| e.to_string())?;
        let latest = &stream[0];
        println!(
            "{name}  {}  ({} versions)",
            &latest.target.to_hex()[..12],
            stream.len()
        );
    }
    Ok(EXIT_SUCCESS)
}

use super::{json_pretty, EXIT_SUCCESS};
use strata_core::{
    clean_untagged_objects, get_all_unattached_objects, get_all_unattached_payloads, Repository,
};

pub fn run(repo: &Repository, dry_run: bool, json: bool) -> Result<u8, String> {
    if dry_run {
        let objects = get_all_unattached_objects(repo).map_err(|e| e.to_string())?;
        let payloads = get_all_unattached_payloads(repo).map_err(|e| e.to_string())?;
        if json {
            let payload = serde_json::json!({
                "dry_run": true,
                "objects": objects.iter().map(|d| d.to_hex()).collect::<Vec<_>>(),
                "payloads": payloads.iter().map(|d| d.to_hex()).collect::<Vec<_>>(),
            });
            println!("{}", json_pretty(&payload)?);
        } else {
            println!(
                "gc: would remove {} objects, {} payloads",
                objects.len(),
                payloads.len()
            );
            for digest in &objects {
                println!("  object  {digest}");
            }
            for digest in &payloads {
                println!("  payload {digest}");
            }
        }
        return Ok(EXIT_SUCCESS);
    }

    let result = clean_untagged_objects(repo).map_err(|e| e.to_string())?;
    if json {
        let payload = serde_json::json!({
            "dry_run": false,
            "objects_removed": result.objects_removed,
            "payloads_removed": result.payloads_removed,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!(
            "gc: removed {} objects, {} payloads",
            result.objects_removed, result.payloads_removed
        );
    }
    Ok(EXIT_SUCCESS)
}

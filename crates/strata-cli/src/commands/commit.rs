use super::{fail, json_pretty, EXIT_SUCCESS};
use std::path::Path;
use strata_core::Repository;
use strata_schema::Object;

pub fn run(repo: &Repository, path: &Path, tag: Option<&str>, json: bool) -> Result<u8, String> {
    let manifest = match repo.commit_dir(path) {
        Ok(manifest) => manifest,
        Err(e) => return fail(&e),
    };
    let layer = repo.create_layer(manifest.digest()).map_err(|e| e.to_string())?;
    let digest = Object::from(layer)
        .digest()
        .map_err(|e| e.to_string())?;

    if let Some(name) = tag {
        if let Err(e) = repo.push_tag(name, &digest) {
            return fail(&e);
        }
    }

    if json {
        let payload = serde_json::json!({
            "layer": digest.to_hex(),
            "manifest": manifest.digest().to_hex(),
            "tag": tag,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!("committed layer {digest}");
        if let Some(name) = tag {
            println!("tagged as {name}");
        }
    }
    Ok(EXIT_SUCCESS)
}

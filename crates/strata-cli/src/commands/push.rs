use super::{fail, json_pretty, EXIT_SUCCESS};
use strata_core::{push_ref, Repository};

pub fn run(repo: &Repository, reference: &str, remote: &str, json: bool) -> Result<u8, String> {
    let object = match push_ref(reference, repo, remote) {
        Ok(object) => object,
        Err(e) => return fail(&e),
    };
    let digest = object.digest().map_err(|e| e.to_string())?;

    if json {
        let payload = serde_json::json!({
            "reference": reference,
            "remote": remote,
            "digest": digest.to_hex(),
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!("pushed {reference} ({digest}) to {remote}");
    }
    Ok(EXIT_SUCCESS)
}

use super::{fail, json_pretty, EXIT_SUCCESS};
use strata_core::Repository;

pub fn run(repo: &Repository, reference: &str, name: &str, json: bool) -> Result<u8, String> {
    let digest = match repo.resolve_ref_to_digest(reference) {
        Ok(digest) => digest,
        Err(e) => return fail(&e),
    };
    let tag = match repo.push_tag(name, &digest) {
        Ok(tag) => tag,
        Err(e) => return fail(&e),
    };

    if json {
        let payload = serde_json::json!({
            "name": tag.name,
            "version": tag.version,
            "target": tag.target.to_hex(),
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!("{tag}");
    }
    Ok(EXIT_SUCCESS)
}

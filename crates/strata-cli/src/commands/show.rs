use super::{fail, json_pretty, EXIT_SUCCESS};
use strata_core::Repository;
use strata_schema::Object;

pub fn run(repo: &Repository, reference: &str, json: bool) -> Result<u8, String> {
    let object = match repo.read_ref(reference) {
        Ok(object) => object,
        Err(e) => return fail(&e),
    };
    let digest = object.digest().map_err(|e| e.to_string())?;
    let aliases = repo.find_aliases(reference).map_err(|e| e.to_string())?;

    if json {
        let payload = serde_json::json!({
            "digest": digest.to_hex(),
            "kind": object.kind().to_string(),
            "children": object
                .child_objects()
                .iter()
                .map(|d| d.to_hex())
                .collect::<Vec<_>>(),
            "aliases": aliases.iter().map(ToString::to_string).collect::<Vec<_>>(),
        });
        println!("{}", json_pretty(&payload)?);
        return Ok(EXIT_SUCCESS);
    }

    println!("digest: {digest}");
    println!("kind:   {}", object.kind());
    match &object {
        Object::Blob(blob) => {
            println!("size:   {} bytes", blob.size);
            println!("payload: {}", blob.payload);
        }
        Object::Manifest(manifest) => {
            println!("entries:");
            for (path, entry) in manifest.walk() {
                println!("  {} {path}", entry.kind);
            }
        }
        Object::Layer(layer) => println!("manifest: {}", layer.manifest),
        Object::Platform(platform) => {
            println!("stack (bottom to top):");
            for digest in &platform.stack {
                println!("  {digest}");
            }
        }
    }
    if !aliases.is_empty() {
        let names: Vec<String> = aliases.iter().map(ToString::to_string).collect();
        println!("aliases: {}", names.join(", "));
    }
    Ok(EXIT_SUCCESS)
}

use super::{fail, json_pretty, EXIT_SUCCESS};
use strata_core::{CoreError, Repository};
use strata_schema::{compute_diff, stack_manifests, DiffMode, Manifest, Object};

/// Flatten any reference down to the manifest it describes. Platforms are
/// expanded depth-first in stack order, including nested platforms.
fn manifest_of(repo: &Repository, reference: &str) -> Result<Manifest, CoreError> {
    let digest = repo.resolve_ref_to_digest(reference)?;
    let mut manifests = Vec::new();
    collect_manifests(repo, &digest, &mut manifests)?;
    Ok(stack_manifests(&manifests.iter().collect::<Vec<_>>()))
}

fn collect_manifests(
    repo: &Repository,
    digest: &strata_schema::Digest,
    out: &mut Vec<Manifest>,
) -> Result<(), CoreError> {
    match repo.objects().read_object(digest)? {
        Object::Manifest(manifest) => out.push(manifest),
        Object::Layer(layer) => out.push(repo.read_manifest(&layer.manifest)?),
        Object::Platform(platform) => {
            for member in &platform.stack {
                collect_manifests(repo, member, out)?;
            }
        }
        other => {
            return Err(CoreError::WrongObjectKind {
                digest: *digest,
                expected: strata_schema::ObjectKind::Manifest,
                found: other.kind(),
            });
        }
    }
    Ok(())
}

pub fn run(repo: &Repository, base: &str, top: &str, json: bool) -> Result<u8, String> {
    let base_manifest = match manifest_of(repo, base) {
        Ok(m) => m,
        Err(e) => return fail(&e),
    };
    let top_manifest = match manifest_of(repo, top) {
        Ok(m) => m,
        Err(e) => return fail(&e),
    };

    let diffs: Vec<_> = compute_diff(&base_manifest, &top_manifest)
        .into_iter()
        .filter(|d| d.mode != DiffMode::Unchanged)
        .collect();

    if json {
        let entries: Vec<_> = diffs
            .iter()
            .map(|d| {
                serde_json::json!({
                    "mode": format!("{:?}", d.mode).to_lowercase(),
                    "path": d.path,
                })
            })
            .collect();
        println!("{}", json_pretty(&entries)?);
        return Ok(EXIT_SUCCESS);
    }

    for diff in &diffs {
        let marker = match diff.mode {
            DiffMode::Added => '+',
            DiffMode::Removed => '-',
            DiffMode::Changed => '~',
            DiffMode::Unchanged => ' ',
        };
        println!("{marker} {}", diff.path);
    }
    if diffs.is_empty() {
        println!("no differences");
    }
    Ok(EXIT_SUCCESS)
}

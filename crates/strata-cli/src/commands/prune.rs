use super::{json_pretty, EXIT_SUCCESS, EXIT_USER_ERROR};
use chrono::{Duration, Utc};
use strata_core::Repository;
use strata_store::{get_prunable_tags, prune_tags, PruneParameters};

pub struct Policy {
    pub older_than_days: Option<u64>,
    pub keep_newer_than_days: Option<u64>,
    pub more_than: Option<u64>,
    pub keep_less_than: Option<u64>,
}

impl Policy {
    fn to_parameters(&self) -> PruneParameters {
        let days_ago = |days: u64| Utc::now() - Duration::days(days as i64);
        PruneParameters {
            prune_if_older_than: self.older_than_days.map(days_ago),
            keep_if_newer_than: self.keep_newer_than_days.map(days_ago),
            prune_if_version_more_than: self.more_than,
            keep_if_version_less_than: self.keep_less_than,
        }
    }
}

pub fn run(repo: &Repository, policy: &Policy, dry_run: bool, json: bool) -> Result<u8, String> {
    let params = policy.to_parameters();
    if params.is_empty() {
        eprintln!("error: no prune condition given (--older-than-days or --more-than)");
        return Ok(EXIT_USER_ERROR);
    }

    let pruned = if dry_run {
        get_prunable_tags(repo.tags(), &params).map_err(|e| e.to_string())?
    } else {
        prune_tags(repo.tags(), &params).map_err(|e| e.to_string())?
    };

    if json {
        let entries: Vec<_> = pruned
            .iter()
            .map(|tag| {
                serde_json::json!({
                    "name": tag.name,
                    "version": tag.version,
                    "target": tag.target.to_hex(),
                    "time": tag.time.to_rfc3339(),
                })
            })
            .collect();
        let payload = serde_json::json!({ "dry_run": dry_run, "pruned": entries });
        println!("{}", json_pretty(&payload)?);
    } else {
        let prefix = if dry_run { "would prune" } else { "pruned" };
        println!("{prefix} {} tag versions", pruned.len());
        for tag in &pruned {
            println!("  {tag}");
        }
    }
    Ok(EXIT_SUCCESS)
}

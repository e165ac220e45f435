use super::{json_pretty, EXIT_FAILURE, EXIT_SUCCESS};
use strata_core::Repository;
use strata_store::check_database_integrity;

pub fn run(repo: &Repository, json: bool) -> Result<u8, String> {
    let report = check_database_integrity(repo.layout()).map_err(|e| e.to_string())?;

    if json {
        let payload = serde_json::json!({
            "objects_checked": report.objects_checked,
            "objects_passed": report.objects_passed,
            "payloads_checked": report.payloads_checked,
            "failures": report
                .failed
                .iter()
                .map(|f| {
                    serde_json::json!({
                        "digest": f.digest.to_hex(),
                        "reason": f.reason,
                    })
                })
                .collect::<Vec<_>>(),
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!(
            "checked {} objects ({} payload references)",
            report.objects_checked, report.payloads_checked
        );
        for failure in &report.failed {
            println!("  {}: {}", failure.digest, failure.reason);
        }
        if report.is_ok() {
            println!("ok");
        }
    }

    if report.is_ok() {
        Ok(EXIT_SUCCESS)
    } else {
        Ok(EXIT_FAILURE)
    }
}

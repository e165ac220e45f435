pub mod check;
pub mod commit;
pub mod diff;
pub mod gc;
pub mod init;
pub mod prune;
pub mod pull;
pub mod push;
pub mod runtimes;
pub mod show;
pub mod tag;
pub mod tags;

pub const EXIT_SUCCESS: u8 = 0;
/// Internal failures: I/O, corruption, lock contention.
pub const EXIT_FAILURE: u8 = 1;
/// Expected user errors: unknown or ambiguous references, bad specs.
pub const EXIT_USER_ERROR: u8 = 2;

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

/// Map an error to an exit code, distinguishing the errors a user can fix
/// from internal ones.
pub fn exit_code_for(err: &strata_core::CoreError) -> u8 {
    use strata_core::CoreError;
    use strata_store::StoreError;
    match err {
        CoreError::Schema(_)
        | CoreError::NothingToCommit
        | CoreError::UnknownRemote(_)
        | CoreError::WrongObjectKind { .. }
        | CoreError::Store(
            StoreError::UnknownObject(_)
            | StoreError::UnknownReference(_)
            | StoreError::AmbiguousReference(_),
        ) => EXIT_USER_ERROR,
        _ => EXIT_FAILURE,
    }
}

/// Print an expected error and return its exit code.
pub fn fail(err: &strata_core::CoreError) -> Result<u8, String> {
    eprintln!("error: {err}");
    Ok(exit_code_for(err))
}

//! Turning a runtime's local changes into durable layer objects.

use crate::repository::Repository;
use crate::CoreError;
use tracing::info;

use strata_runtime::Runtime;
use strata_schema::{Layer, Object, Platform};

/// Capture the runtime's upper dir as a new layer.
///
/// The runtime must be dirty; a clean runtime has nothing to capture.
/// Every blob payload is stored before the manifest and layer objects are
/// published, so a failure partway through never leaves a layer pointing at
/// missing content. The runtime's stack and the tag store are untouched;
/// the caller decides what to do with the new layer.
pub fn commit_layer(runtime: &Runtime, repo: &Repository) -> Result<Layer, CoreError> {
    if !runtime.is_dirty()? {
        return Err(CoreError::NothingToCommit);
    }

    let manifest = repo.commit_dir(runtime.upper_dir())?;
    let layer = repo.create_layer(manifest.digest())?;
    info!(
        runtime = %runtime.id(),
        layer = %Object::from(layer.clone()).digest()?,
        "committed layer"
    );
    Ok(layer)
}

/// Capture the runtime's local changes and wrap them, together with the
/// existing stack, into a new platform: `[stack..., new layer]`.
pub fn commit_platform(runtime: &Runtime, repo: &Repository) -> Result<Platform, CoreError> {
    let layer = commit_layer(runtime, repo)?;
    let mut stack = runtime.stack().to_vec();
    stack.push(Object::from(layer).digest()?);
    repo.create_platform(stack)
}

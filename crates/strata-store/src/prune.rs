//! Age- and count-based expiry of old tag versions.

use crate::tags::TagStore;
use crate::StoreError;
use chrono::{DateTime, Utc};
use tracing::info;

use strata_schema::Tag;

/// Thresholds controlling which tag versions may be expired.
///
/// All conditions are conjunctive safety nets: every configured prune
/// threshold must trigger and no configured keep threshold may object
/// before a version becomes prunable. With no prune threshold configured,
/// nothing is ever prunable. A stream's newest version is never prunable,
/// so pruning alone can never delete a stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneParameters {
    /// Versions created before this time may be pruned.
    pub prune_if_older_than: Option<DateTime<Utc>>,
    /// Versions created after this time are always kept.
    pub keep_if_newer_than: Option<DateTime<Utc>>,
    /// Versions may be pruned only when the stream holds more than this
    /// many versions.
    pub prune_if_version_more_than: Option<u64>,
    /// The newest N versions of every stream are always kept.
    pub keep_if_version_less_than: Option<u64>,
}

impl PruneParameters {
    pub fn is_empty(&self) -> bool {
        self.prune_if_older_than.is_none() && self.prune_if_version_more_than.is_none()
    }

    /// Whether one version is prunable, given its rank back from the
    /// stream's newest version (0 = newest) and the stream's length.
    pub fn is_prunable(&self, tag: &Tag, rank: u64, stream_len: u64) -> bool {
        if self.is_empty() || rank == 0 {
            return false;
        }
        if let Some(cutoff) = self.prune_if_older_than {
            if tag.time >= cutoff {
                return false;
            }
        }
        if let Some(cutoff) = self.keep_if_newer_than {
            if tag.time > cutoff {
                return false;
            }
        }
        if let Some(max) = self.prune_if_version_more_than {
            if stream_len <= max {
                return false;
            }
        }
        if let Some(keep) = self.keep_if_version_less_than {
            if rank < keep {
                return false;
            }
        }
        true
    }
}

/// Collect every tag version across all streams that the given parameters
/// would expire. Does not modify the store.
pub fn get_prunable_tags(
    store: &TagStore,
    params: &PruneParameters,
) -> Result<Vec<Tag>, StoreError> {
    let mut prunable = Vec::new();
    if params.is_empty() {
        return Ok(prunable);
    }
    for name in store.stream_names()? {
        let stream = store.read_tag_stream(&name)?;
        let len = stream.len() as u64;
        for (rank, tag) in stream.into_iter().enumerate() {
            if params.is_prunable(&tag, rank as u64, len) {
                prunable.push(tag);
            }
        }
    }
    Ok(prunable)
}

/// Expire prunable tag versions, rewriting each affected stream in place.
/// Returns the removed tags.
pub fn prune_tags(store: &TagStore, params: &PruneParameters) -> Result<Vec<Tag>, StoreError> {
    let _lock = store.lock()?;

    let prunable = get_prunable_tags(store, params)?;
    if prunable.is_empty() {
        return Ok(prunable);
    }

    let mut names: Vec<&str> = prunable.iter().map(|t| t.name.as_str()).collect();
    names.sort_unstable();
    names.dedup();
    for name in names {
        let mut stream = store.read_tag_stream(name)?;
        stream.retain(|tag| !prunable.contains(tag));
        stream.reverse();
        store.write_stream(name, &stream)?;
    }

    info!(count = prunable.len(), "pruned tag versions");
    Ok(prunable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::StoreLayout;
    use chrono::Duration;
    use strata_schema::{Digest, TagSpec};

    fn test_store() -> (tempfile::TempDir, TagStore) {
        let dir = tempfile::tempdir().unwrap();
        let layout = StoreLayout::new(dir.path());
        layout.initialize().unwrap();
        (dir, TagStore::new(layout))
    }

    fn push_aged(store: &TagStore, name: &str, days_ago: i64) -> Tag {
        let tag = store.push_tag(name, &Digest::of_bytes(name.as_bytes())).unwrap();
        let mut aged = store.read_tag_stream(name).unwrap();
        aged.reverse();
        let idx = aged.iter().position(|t| t.version == tag.version).unwrap();
        aged[idx].time = Utc::now() - Duration::days(days_ago);
        let out = aged[idx].clone();
        store.write_stream(name, &aged).unwrap();
        out
    }

    #[test]
    fn empty_parameters_prune_nothing() {
        let (_dir, store) = test_store();
        push_aged(&store, "t", 1000);
        push_aged(&store, "t", 900);
        let params = PruneParameters {
            keep_if_newer_than: Some(Utc::now() - Duration::days(10_000)),
            keep_if_version_less_than: Some(0),
            ..Default::default()
        };
        assert!(get_prunable_tags(&store, &params).unwrap().is_empty());
    }

    #[test]
    fn old_versions_are_prunable_by_age() {
        let (_dir, store) = test_store();
        let old = push_aged(&store, "t", 100);
        push_aged(&store, "t", 0);
        let params = PruneParameters {
            prune_if_older_than: Some(Utc::now() - Duration::days(30)),
            ..Default::default()
        };
        let prunable = get_prunable_tags(&store, &params).unwrap();
        assert_eq!(prunable, vec![old]);
    }

    #[test]
    fn newest_version_is_never_prunable() {
        let (_dir, store) = test_store();
        push_aged(&store, "t", 500);
        let params = PruneParameters {
            prune_if_older_than: Some(Utc::now()),
            ..Default::default()
        };
        assert!(get_prunable_tags(&store, &params).unwrap().is_empty());
    }

    #[test]
    fn keep_thresholds_win_over_prune_thresholds() {
        let (_dir, store) = test_store();
        push_aged(&store, "t", 100);
        push_aged(&store, "t", 90);
        push_aged(&store, "t", 0);
        let params = PruneParameters {
            prune_if_older_than: Some(Utc::now()),
            keep_if_newer_than: Some(Utc::now() - Duration::days(365)),
            ..Default::default()
        };
        // Everything is newer than a year, so nothing goes.
        assert!(get_prunable_tags(&store, &params).unwrap().is_empty());
    }

    #[test]
    fn count_threshold_requires_strictly_more_versions() {
        let (_dir, store) = test_store();
        push_aged(&store, "t", 3);
        push_aged(&store, "t", 2);
        push_aged(&store, "t", 1);
        let at_threshold = PruneParameters {
            prune_if_version_more_than: Some(3),
            ..Default::default()
        };
        assert!(get_prunable_tags(&store, &at_threshold).unwrap().is_empty());

        let over_threshold = PruneParameters {
            prune_if_version_more_than: Some(2),
            ..Default::default()
        };
        let prunable = get_prunable_tags(&store, &over_threshold).unwrap();
        // Only ranks past the newest are candidates.
        assert_eq!(prunable.len(), 2);
    }

    #[test]
    fn keep_count_protects_recent_ranks() {
        let (_dir, store) = test_store();
        for d in (0..5).rev() {
            push_aged(&store, "t", d);
        }
        let params = PruneParameters {
            prune_if_version_more_than: Some(1),
            keep_if_version_less_than: Some(3),
            ..Default::default()
        };
        let prunable = get_prunable_tags(&store, &params).unwrap();
        assert_eq!(prunable.len(), 2);
        assert!(prunable.iter().all(|t| t.version < 2));
    }

    #[test]
    fn prune_rewrites_stream_and_preserves_resolution() {
        let (_dir, store) = test_store();
        push_aged(&store, "t", 100);
        push_aged(&store, "t", 90);
        let newest = push_aged(&store, "t", 0);
        let params = PruneParameters {
            prune_if_older_than: Some(Utc::now() - Duration::days(30)),
            ..Default::default()
        };
        let removed = prune_tags(&store, &params).unwrap();
        assert_eq!(removed.len(), 2);

        let stream = store.read_tag_stream("t").unwrap();
        assert_eq!(stream.len(), 1);
        let latest = store.resolve_tag(&TagSpec::parse("t").unwrap()).unwrap();
        assert_eq!(latest.target, newest.target);
    }

    #[test]
    fn prune_leaves_untouched_streams_alone() {
        let (_dir, store) = test_store();
        push_aged(&store, "old", 100);
        push_aged(&store, "old", 99);
        push_aged(&store, "fresh", 0);
        let params = PruneParameters {
            prune_if_older_than: Some(Utc::now() - Duration::days(30)),
            ..Default::default()
        };
        prune_tags(&store, &params).unwrap();
        assert_eq!(store.read_tag_stream("fresh").unwrap().len(), 1);
        assert_eq!(store.read_tag_stream("old").unwrap().len(), 1);
    }
}

//! Structural deltas between two manifests.

use crate::manifest::{Entry, EntryKind, Manifest};
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffMode {
    Unchanged,
    Added,
    Removed,
    Changed,
}

impl fmt::Display for DiffMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unchanged => "=",
            Self::Added => "+",
            Self::Removed => "-",
            Self::Changed => "~",
        };
        f.write_str(s)
    }
}

/// One path's classification in a manifest-to-manifest comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diff {
    pub mode: DiffMode,
    pub path: String,
}

impl fmt::Display for Diff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.mode, self.path)
    }
}

/// Compare two manifests path by path.
///
/// The output is a deterministic, path-sorted, depth-first walk over the
/// union of both trees. A path present only in `base` is `Removed`, only in
/// `top` is `Added`; same path with a different digest or mode is `Changed`
/// (mode-only changes count). A mask entry in `top` marks the base path as
/// `Removed`.
pub fn compute_diff(base: &Manifest, top: &Manifest) -> Vec<Diff> {
    let mut out = Vec::new();
    diff_trees("", Some(base.root()), Some(top.root()), &mut out);
    out
}

fn diff_trees(prefix: &str, base: Option<&Entry>, top: Option<&Entry>, out: &mut Vec<Diff>) {
    let empty = std::collections::BTreeMap::new();
    let base_entries = base.map_or(&empty, |e| &e.entries);
    let top_entries = top.map_or(&empty, |e| &e.entries);

    let names: BTreeSet<&String> = base_entries.keys().chain(top_entries.keys()).collect();
    for name in names {
        let path = format!("{prefix}/{name}");
        let b = base_entries.get(name.as_str());
        let t = top_entries.get(name.as_str());

        match (b, t) {
            (None, Some(t)) => {
                if t.kind == EntryKind::Mask {
                    // Masking a path that does not exist below; nothing to report.
                    continue;
                }
                out.push(Diff {
                    mode: DiffMode::Added,
                    path: path.clone(),
                });
                if t.is_tree() {
                    diff_trees(&path, None, Some(t), out);
                }
            }
            (Some(b), None) => {
                out.push(Diff {
                    mode: DiffMode::Removed,
                    path: path.clone(),
                });
                if b.is_tree() {
                    diff_trees(&path, Some(b), None, out);
                }
            }
            (Some(b), Some(t)) => {
                if t.kind == EntryKind::Mask {
                    out.push(Diff {
                        mode: DiffMode::Removed,
                        path: path.clone(),
                    });
                    if b.is_tree() {
                        diff_trees(&path, Some(b), None, out);
                    }
                    continue;
                }
                let mode = if b.digest() == t.digest() && b.mode == t.mode {
                    DiffMode::Unchanged
                } else {
                    DiffMode::Changed
                };
                out.push(Diff {
                    mode,
                    path: path.clone(),
                });
                if (b.is_tree() || t.is_tree()) && mode == DiffMode::Changed {
                    diff_trees(
                        &path,
                        b.is_tree().then_some(b),
                        t.is_tree().then_some(t),
                        out,
                    );
                }
            }
            (None, None) => unreachable!("name came from one of the two maps"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Digest;

    fn build(files: &[(&str, &str, u32)]) -> Manifest {
        let mut root = Entry::tree(0o40755);
        for (name, content, mode) in files {
            root.entries.insert(
                (*name).to_owned(),
                Entry::blob(*mode, content.len() as u64, Digest::of_bytes(content.as_bytes())),
            );
        }
        Manifest::from_root(root)
    }

    #[test]
    fn self_diff_is_all_unchanged() {
        let m = build(&[("a", "1", 0o644), ("b", "2", 0o644)]);
        let diffs = compute_diff(&m, &m);
        assert!(diffs.iter().all(|d| d.mode == DiffMode::Unchanged));
        assert_eq!(diffs.len(), 2);
    }

    #[test]
    fn added_and_removed() {
        let base = build(&[("a", "1", 0o644)]);
        let top = build(&[("b", "2", 0o644)]);
        let diffs = compute_diff(&base, &top);
        assert_eq!(
            diffs,
            vec![
                Diff {
                    mode: DiffMode::Removed,
                    path: "/a".to_owned()
                },
                Diff {
                    mode: DiffMode::Added,
                    path: "/b".to_owned()
                },
            ]
        );
    }

    #[test]
    fn content_change_is_changed() {
        let base = build(&[("a", "1", 0o644)]);
        let top = build(&[("a", "2", 0o644)]);
        let diffs = compute_diff(&base, &top);
        assert_eq!(diffs[0].mode, DiffMode::Changed);
    }

    #[test]
    fn mode_only_change_is_changed() {
        let base = build(&[("a", "1", 0o644)]);
        let top = build(&[("a", "1", 0o755)]);
        let diffs = compute_diff(&base, &top);
        assert_eq!(diffs[0].mode, DiffMode::Changed);
    }

    #[test]
    fn mask_in_top_reports_removed() {
        let base = build(&[("a", "1", 0o644)]);
        let mut top_root = Entry::tree(0o40755);
        top_root.entries.insert("a".to_owned(), Entry::mask(0));
        let top = Manifest::from_root(top_root);

        let diffs = compute_diff(&base, &top);
        assert_eq!(
            diffs,
            vec![Diff {
                mode: DiffMode::Removed,
                path: "/a".to_owned()
            }]
        );
    }

    #[test]
    fn mask_without_base_entry_is_silent() {
        let base = Manifest::new();
        let mut top_root = Entry::tree(0o40755);
        top_root.entries.insert("ghost".to_owned(), Entry::mask(0));
        let top = Manifest::from_root(top_root);

        assert!(compute_diff(&base, &top).is_empty());
    }

    #[test]
    fn nested_changes_are_walked_depth_first() {
        let mut base_sub = Entry::tree(0o40755);
        base_sub
            .entries
            .insert("f".to_owned(), Entry::blob(0o644, 1, Digest::of_bytes(b"1")));
        let mut base_root = Entry::tree(0o40755);
        base_root.entries.insert("sub".to_owned(), base_sub);
        let base = Manifest::from_root(base_root);

        let mut top_sub = Entry::tree(0o40755);
        top_sub
            .entries
            .insert("f".to_owned(), Entry::blob(0o644, 1, Digest::of_bytes(b"2")));
        let mut top_root = Entry::tree(0o40755);
        top_root.entries.insert("sub".to_owned(), top_sub);
        let top = Manifest::from_root(top_root);

        let diffs = compute_diff(&base, &top);
        let paths: Vec<&str> = diffs.iter().map(|d| d.path.as_str()).collect();
        assert_eq!(paths, vec!["/sub", "/sub/f"]);
        assert!(diffs.iter().all(|d| d.mode == DiffMode::Changed));
    }

    #[test]
    fn unchanged_subtree_is_not_descended() {
        let mut sub = Entry::tree(0o40755);
        sub.entries
            .insert("f".to_owned(), Entry::blob(0o644, 1, Digest::of_bytes(b"1")));
        let mut root = Entry::tree(0o40755);
        root.entries.insert("sub".to_owned(), sub);
        let m = Manifest::from_root(root);

        let diffs = compute_diff(&m, &m);
        // Only the top-level dir is reported; its identical subtree is skipped.
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].path, "/sub");
        assert_eq!(diffs[0].mode, DiffMode::Unchanged);
    }
}

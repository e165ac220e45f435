//! Full-lifecycle tests over a real on-disk repository.

use std::fs;
use std::path::Path;

use strata_core::{
    clean_untagged_objects, commit_layer, commit_platform, pull_ref, render_manifest,
    resolve_runtime_layers, sync_ref, RemotesConfig, Repository,
};
use strata_runtime::{MockBackend, MountBackend, MountRequest};
use strata_schema::{compute_diff, compute_manifest, DiffMode, Object};
use strata_store::check_database_integrity;

fn write_tree(root: &Path, files: &[(&str, &str)]) {
    for (path, content) in files {
        let full = root.join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(full, content).unwrap();
    }
}

#[test]
fn commit_tag_and_read_back() {
    let dir = tempfile::tempdir().unwrap();
    let repo = Repository::create(dir.path().join("repo")).unwrap();

    let src = dir.path().join("src");
    write_tree(&src, &[("a.txt", "hello")]);
    let manifest = repo.commit_dir(&src).unwrap();
    let layer = repo.create_layer(manifest.digest()).unwrap();
    let layer_digest = Object::from(layer).digest().unwrap();
    repo.push_tag("v1", &layer_digest).unwrap();

    let Object::Layer(layer) = repo.read_ref("v1").unwrap() else {
        panic!("expected a layer");
    };
    let manifest = repo.read_manifest(&layer.manifest).unwrap();
    let entry = manifest.get_path("a.txt").unwrap();
    let blob = repo.read_blob(&entry.object).unwrap();
    assert_eq!(blob.size, 5);
}

#[test]
fn runtime_edit_commit_reset_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let repo = Repository::create(dir.path().join("repo")).unwrap();

    // An empty base layer.
    let empty = dir.path().join("empty");
    fs::create_dir_all(&empty).unwrap();
    let base_manifest = repo.commit_dir(&empty).unwrap();
    let base = repo.create_layer(base_manifest.digest()).unwrap();
    let base_digest = Object::from(base).digest().unwrap();

    let mut runtime = repo.runtimes().create_runtime().unwrap();
    runtime.push_digest(base_digest).unwrap();
    assert!(!runtime.is_dirty().unwrap());

    fs::write(runtime.upper_dir().join("edit.txt"), "local change").unwrap();
    assert!(runtime.is_dirty().unwrap());

    let layer = commit_layer(&runtime, &repo).unwrap();
    let manifest = repo.read_manifest(&layer.manifest).unwrap();
    let diff = compute_diff(&strata_schema::Manifest::new(), &manifest);
    let added: Vec<_> = diff
        .iter()
        .filter(|d| d.mode == DiffMode::Added)
        .collect();
    assert_eq!(added.len(), 1);
    assert_eq!(added[0].path, "/edit.txt");

    runtime.reset().unwrap();
    assert!(!runtime.is_dirty().unwrap());
}

#[test]
fn platform_stacks_mount_through_backend() {
    let dir = tempfile::tempdir().unwrap();
    let repo = Repository::create(dir.path().join("repo")).unwrap();

    let lower = dir.path().join("lower");
    write_tree(&lower, &[("bin/tool", "v1"), ("etc/conf", "defaults")]);
    let m1 = repo.commit_dir(&lower).unwrap();
    let l1 = Object::from(repo.create_layer(m1.digest()).unwrap())
        .digest()
        .unwrap();

    let upper = dir.path().join("upper");
    write_tree(&upper, &[("bin/tool", "v2")]);
    let m2 = repo.commit_dir(&upper).unwrap();
    let l2 = Object::from(repo.create_layer(m2.digest()).unwrap())
        .digest()
        .unwrap();

    let platform = repo.create_platform(vec![l1, l2]).unwrap();
    let platform_digest = Object::from(platform).digest().unwrap();

    let mut runtime = repo.runtimes().create_runtime().unwrap();
    runtime.push_digest(platform_digest).unwrap();

    let lowers = resolve_runtime_layers(&repo, runtime.stack()).unwrap();
    assert_eq!(lowers.len(), 2);
    // The rendered trees hold real content, in stack order.
    assert_eq!(fs::read(lowers[0].join("bin/tool")).unwrap(), b"v1");
    assert_eq!(fs::read(lowers[1].join("bin/tool")).unwrap(), b"v2");

    let backend = MockBackend::new();
    let target = dir.path().join("mnt");
    backend
        .mount(&MountRequest {
            lower_dirs: lowers.clone(),
            upper_dir: runtime.upper_dir(),
            work_dir: runtime.work_dir(),
            target: target.clone(),
            editable: true,
        })
        .unwrap();
    assert!(backend.is_mounted(&target));
    backend.unmount(&target).unwrap();
}

#[test]
fn diff_classifies_adds_and_removals() {
    let dir = tempfile::tempdir().unwrap();

    let base = dir.path().join("base");
    write_tree(&base, &[("keep.txt", "stays"), ("old.txt", "goes")]);
    let base_manifest = compute_manifest(&base).unwrap();

    let top = dir.path().join("top");
    write_tree(&top, &[("new.txt", "added")]);
    let top_manifest = compute_manifest(&top).unwrap();

    let diff = compute_diff(&base_manifest, &top_manifest);
    let changed: Vec<_> = diff
        .iter()
        .filter(|d| d.mode != DiffMode::Unchanged)
        .map(|d| (d.mode, d.path.as_str()))
        .collect();
    assert_eq!(
        changed,
        vec![
            (DiffMode::Removed, "/keep.txt"),
            (DiffMode::Added, "/new.txt"),
            (DiffMode::Removed, "/old.txt"),
        ]
    );
}

#[test]
fn gc_removes_orphan_graph_and_store_stays_consistent() {
    let dir = tempfile::tempdir().unwrap();
    let repo = Repository::create(dir.path().join("repo")).unwrap();

    let src = dir.path().join("src");
    write_tree(&src, &[("f", "one")]);
    let m1 = repo.commit_dir(&src).unwrap();
    let l1 = Object::from(repo.create_layer(m1.digest()).unwrap())
        .digest()
        .unwrap();
    repo.push_tag("env", &l1).unwrap();

    // Orphan graph with nothing pointing at it.
    let orphan_src = dir.path().join("orphan");
    write_tree(&orphan_src, &[("g", "two")]);
    let orphan = repo.commit_dir(&orphan_src).unwrap();
    repo.create_layer(orphan.digest()).unwrap();

    let result = clean_untagged_objects(&repo).unwrap();
    assert_eq!(result.objects_removed, 3);

    let report = check_database_integrity(repo.layout()).unwrap();
    assert!(report.is_ok(), "failures: {:?}", report.failed);
    assert!(repo.has_ref("env"));
}

#[test]
fn sync_between_repositories_via_remote_config() {
    let dir = tempfile::tempdir().unwrap();
    let origin = Repository::create(dir.path().join("origin")).unwrap();
    let local = Repository::create(dir.path().join("local")).unwrap();

    let src = dir.path().join("src");
    write_tree(&src, &[("app/run.sh", "#!/bin/sh\n"), ("app/data", "payload")]);
    let manifest = origin.commit_dir(&src).unwrap();
    let layer = Object::from(origin.create_layer(manifest.digest()).unwrap())
        .digest()
        .unwrap();
    origin.push_tag("release/1.0", &layer).unwrap();

    RemotesConfig::with_remote("origin", origin.layout().root())
        .save(&local.layout().config_file())
        .unwrap();

    pull_ref("release/1.0", &local, "origin").unwrap();
    assert!(local.has_ref("release/1.0"));
    let report = check_database_integrity(local.layout()).unwrap();
    assert!(report.is_ok());

    // A second pull copies nothing new and leaves one tag version.
    pull_ref("release/1.0", &local, "origin").unwrap();
    assert_eq!(local.tags().read_tag_stream("release/1.0").unwrap().len(), 1);
}

#[test]
fn rendered_platform_matches_stacked_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let repo = Repository::create(dir.path().join("repo")).unwrap();

    let src = dir.path().join("src");
    write_tree(&src, &[("shared", "content"), ("deep/nested/file", "x")]);
    let manifest = repo.commit_dir(&src).unwrap();

    let rendered = render_manifest(&repo, &manifest.digest()).unwrap();
    let recomputed = compute_manifest(&rendered).unwrap();
    assert_eq!(recomputed.digest(), manifest.digest());
}

#[test]
fn commit_platform_grows_the_environment() {
    let dir = tempfile::tempdir().unwrap();
    let repo = Repository::create(dir.path().join("repo")).unwrap();

    let mut runtime = repo.runtimes().create_runtime().unwrap();
    fs::write(runtime.upper_dir().join("first"), "1").unwrap();
    let p1 = commit_platform(&runtime, &repo).unwrap();
    let p1_digest = Object::from(p1.clone()).digest().unwrap();
    assert_eq!(p1.stack.len(), 1);

    runtime.push_digest(p1_digest).unwrap();
    runtime.reset().unwrap();
    fs::write(runtime.upper_dir().join("second"), "2").unwrap();
    let p2 = commit_platform(&runtime, &repo).unwrap();
    assert_eq!(p2.stack.len(), 2);
    assert_eq!(p2.stack[0], p1_digest);

    // The flattened view contains both edits.
    let lowers = resolve_runtime_layers(&repo, &p2.stack).unwrap();
    assert_eq!(lowers.len(), 2);
    assert!(lowers[0].join("first").exists());
    assert!(lowers[1].join("second").exists());
}

#[test]
fn sync_ref_by_digest_prefix() {
    let dir = tempfile::tempdir().unwrap();
    let src = Repository::create(dir.path().join("src")).unwrap();
    let dest = Repository::create(dir.path().join("dest")).unwrap();

    let blob = src.commit_blob(&b"abbreviated"[..]).unwrap();
    sync_ref(&blob.to_hex()[..16], &src, &dest).unwrap();
    assert!(dest.objects().has_object(&blob));
}

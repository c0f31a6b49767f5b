use std::fs;

use super::*;

fn module_dir(root: &Path) -> PathBuf {
    let dir = root.join("greeter");
    fs::create_dir_all(&dir).expect("create module dir");
    dir
}

#[test]
fn no_staging_dir_means_nothing_to_do() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let staging = UpdateStaging::new("greeter", module_dir(temp.path()));

    assert_eq!(staging.staging_dir(), None);
    assert!(!staging.is_update_needed());
    assert_eq!(staging.apply().expect("apply"), StagingReport::default());
}

#[test]
fn same_name_dir_takes_precedence_over_reload() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let dir = module_dir(temp.path());
    fs::create_dir_all(dir.join("reload")).expect("create reload");
    fs::create_dir_all(dir.join("greeter")).expect("create same-name");

    let staging = UpdateStaging::new("greeter", &dir);
    assert_eq!(staging.staging_dir(), Some(dir.join("greeter")));

    fs::remove_dir(dir.join("greeter")).expect("remove same-name");
    assert_eq!(staging.staging_dir(), Some(dir.join("reload")));
}

#[test]
fn empty_staging_dir_needs_no_update() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let dir = module_dir(temp.path());
    fs::create_dir_all(dir.join("reload").join("nested")).expect("create nested");

    let staging = UpdateStaging::new("greeter", &dir);
    assert!(staging.staging_dir().is_some());
    assert!(!staging.is_update_needed());
}

#[test]
fn is_update_needed_does_not_touch_the_filesystem() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let dir = module_dir(temp.path());
    fs::create_dir_all(dir.join("reload")).expect("create reload");
    fs::write(dir.join("reload").join("greeter.so"), b"new").expect("stage");

    let staging = UpdateStaging::new("greeter", &dir);
    assert!(staging.is_update_needed());
    assert!(staging.is_update_needed());
    assert!(dir.join("reload").join("greeter.so").exists());
    assert!(!dir.join("greeter.so").exists());
}

#[test]
fn apply_overwrites_live_files_and_clears_staging() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let dir = module_dir(temp.path());
    let reload = dir.join("reload");
    fs::create_dir_all(&reload).expect("create reload");
    fs::write(dir.join("greeter.so"), b"old").expect("live lib");
    fs::write(reload.join("greeter.so"), b"new").expect("staged lib");
    fs::write(reload.join("greeter.json"), b"{}").expect("staged config");

    let report = UpdateStaging::new("greeter", &dir).apply().expect("apply");

    assert_eq!(
        report.applied,
        vec![dir.join("greeter.json"), dir.join("greeter.so")]
    );
    assert!(report.staging_dir_removed);
    assert!(!reload.exists());
    assert_eq!(fs::read(dir.join("greeter.so")).expect("read live"), b"new");
    assert_eq!(fs::read(dir.join("greeter.json")).expect("read live"), b"{}");
}

#[test]
fn staging_dir_with_subdirectories_fails_cleanup() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let dir = module_dir(temp.path());
    let same_name = dir.join("greeter");
    fs::create_dir_all(same_name.join("assets")).expect("create nested");
    fs::write(same_name.join("greeter.so"), b"new").expect("staged lib");

    let err = UpdateStaging::new("greeter", &dir)
        .apply()
        .expect_err("non-empty staging dir cannot be removed");

    match err {
        Error::Staging { module, path, .. } => {
            assert_eq!(module, "greeter");
            assert_eq!(path, same_name);
        },
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(fs::read(dir.join("greeter.so")).expect("read live"), b"new");
    assert!(!same_name.join("greeter.so").exists());
    assert!(same_name.join("assets").is_dir());
}

#[test]
fn empty_staging_dir_is_left_alone() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let dir = module_dir(temp.path());
    let reload = dir.join("reload");
    fs::create_dir_all(reload.join("nested")).expect("create nested");

    let report = UpdateStaging::new("greeter", &dir).apply().expect("apply");

    assert_eq!(report.staging_dir, Some(reload.clone()));
    assert!(report.applied.is_empty());
    assert!(!report.staging_dir_removed);
    assert!(reload.join("nested").is_dir());

    fs::remove_dir(reload.join("nested")).expect("remove nested");
    let report = UpdateStaging::new("greeter", &dir).apply().expect("apply");
    assert!(!report.staging_dir_removed);
    assert!(reload.is_dir());
}

#[test]
fn failed_copy_keeps_earlier_files_applied() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let dir = module_dir(temp.path());
    let reload = dir.join("reload");
    fs::create_dir_all(&reload).expect("create reload");
    fs::write(reload.join("a.bin"), b"a2").expect("stage a");
    fs::write(reload.join("b.bin"), b"b2").expect("stage b");
    // A directory at the live path makes the copy of `b.bin` fail.
    fs::create_dir_all(dir.join("b.bin")).expect("blocking dir");

    let err = UpdateStaging::new("greeter", &dir)
        .apply()
        .expect_err("second copy must fail");

    match err {
        Error::Staging { module, path, .. } => {
            assert_eq!(module, "greeter");
            assert_eq!(path, reload.join("b.bin"));
        },
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(fs::read(dir.join("a.bin")).expect("read a"), b"a2");
    assert!(!reload.join("a.bin").exists());
    assert!(reload.join("b.bin").exists());
}

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;

use modhost_modules::{
    Error, LockConfig, ModuleState, NativeInterface, Orchestrator, OrchestratorConfig,
    ProcessLock, dynamic_library_ext,
};
use serde_json::json;

const FIXTURE: &str = "lifecycle_module";

static FIXTURE_LIBRARY: OnceLock<PathBuf> = OnceLock::new();

struct Installed {
    _temp: tempfile::TempDir,
    config: OrchestratorConfig,
    module_dir: PathBuf,
}

impl Installed {
    fn journal(&self) -> Vec<String> {
        std::fs::read_to_string(self.module_dir.join("journal.log"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

fn install_fixture(module_config: serde_json::Value) -> Installed {
    let temp = tempfile::tempdir().expect("create temp dir");
    let modules_dir = temp.path().join("modules");
    let module_dir = modules_dir.join(FIXTURE);
    std::fs::create_dir_all(&module_dir).expect("create module dir");
    std::fs::copy(
        fixture_library(),
        module_dir.join(format!("{FIXTURE}.{}", dynamic_library_ext())),
    )
    .expect("install fixture library");
    let lock_dir = temp.path().join("locks");
    std::fs::create_dir_all(&lock_dir).expect("create lock dir");

    let config = OrchestratorConfig {
        modules_dir,
        root_dir: temp.path().to_path_buf(),
        lock: LockConfig {
            dir: Some(lock_dir),
            ..LockConfig::default()
        },
        module_config,
    };
    Installed {
        _temp: temp,
        config,
        module_dir,
    }
}

#[test]
fn native_module_runs_through_its_lifecycle() {
    let installed = install_fixture(json!({ "greeting": "hi" }));
    let mut orchestrator = Orchestrator::from_config(&installed.config).expect("orchestrator");

    let report = orchestrator.load_all(false);
    assert!(report.failed.is_empty(), "load failures: {:?}", report.failed);
    assert_eq!(report.loaded, vec![FIXTURE]);

    let record = orchestrator.module(FIXTURE).expect("fixture registered");
    assert_eq!(record.state(), ModuleState::Running);
    assert_eq!(record.display_name(), "Lifecycle Fixture");
    assert_eq!(record.display_author().as_deref(), Some("modhost tests"));
    assert_eq!(record.version().to_string(), "2.5.1.0");
    assert!(
        orchestrator
            .capabilities()
            .interfaces()
            .get_optional::<NativeInterface>("lifecycle.marker")
            .is_some()
    );

    let unloaded = orchestrator.unload_all();
    assert!(unloaded.failed.is_empty(), "unload failures: {:?}", unloaded.failed);
    assert_eq!(
        orchestrator.module(FIXTURE).map(|r| r.state()),
        Some(ModuleState::Unloaded)
    );
    assert!(
        orchestrator
            .capabilities()
            .interfaces()
            .get_optional::<NativeInterface>("lifecycle.marker")
            .is_none()
    );
    assert_eq!(
        installed.journal(),
        vec![
            "create hot_reload=false",
            "init",
            "registered",
            "post_init",
            "all_loaded",
            "shutdown",
        ]
    );
}

#[test]
fn rejected_init_leaves_nothing_behind() {
    let installed = install_fixture(json!({ "fail_init": true }));
    let mut orchestrator = Orchestrator::from_config(&installed.config).expect("orchestrator");

    let err = orchestrator
        .load_module(FIXTURE, false)
        .expect_err("init is rejected");
    assert!(matches!(err, Error::InitRejected { .. }), "unexpected: {err}");

    let record = orchestrator.module(FIXTURE).expect("fixture registered");
    assert_eq!(record.state(), ModuleState::Failure);
    assert!(record.instance().is_none());
    let lock = ProcessLock::create_by_raw(
        &record.descriptor().library_path.to_string_lossy(),
        &installed.config.lock_options(),
    )
    .expect("contender lock");
    assert!(lock.is_acquired());
    assert!(!installed.journal().contains(&"shutdown".to_string()));
}

#[test]
fn reload_brings_the_module_back_as_hot_reload() {
    let installed = install_fixture(json!({}));
    let mut orchestrator = Orchestrator::from_config(&installed.config).expect("orchestrator");
    orchestrator.load_module(FIXTURE, false).expect("load");

    orchestrator.reload_module(FIXTURE).expect("reload");

    assert_eq!(orchestrator.running_module_names(), vec![FIXTURE]);
    let journal = installed.journal();
    assert_eq!(
        journal.iter().filter(|line| *line == "shutdown").count(),
        1
    );
    assert_eq!(journal.last().map(String::as_str), Some("post_init"));
    assert!(journal.contains(&"create hot_reload=true".to_string()));
    orchestrator.unload_all();
}

#[test]
fn second_orchestrator_cannot_load_a_running_module() {
    let installed = install_fixture(json!({}));
    let mut first = Orchestrator::from_config(&installed.config).expect("first");
    let mut second = Orchestrator::from_config(&installed.config).expect("second");
    first.load_module(FIXTURE, false).expect("first load");

    let err = second
        .load_module(FIXTURE, false)
        .expect_err("lock is held");
    assert!(matches!(err, Error::Contention { .. }), "unexpected: {err}");

    first.unload_all();
    second.load_module(FIXTURE, false).expect("load after release");
    second.unload_all();
}

fn fixture_library() -> &'static Path {
    FIXTURE_LIBRARY.get_or_init(|| {
        build_fixture_library("tests/fixtures/lifecycle_module/Cargo.toml", FIXTURE)
    })
}

fn build_fixture_library(manifest_rel: &str, crate_name: &str) -> PathBuf {
    let crate_root = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let manifest_path = crate_root.join(manifest_rel);
    let manifest_dir = manifest_path
        .parent()
        .expect("fixture manifest must have parent dir");

    let status = Command::new(cargo_bin())
        .arg("build")
        .arg("--manifest-path")
        .arg(&manifest_path)
        .current_dir(manifest_dir)
        .status()
        .expect("spawn cargo build for fixture module");
    assert!(
        status.success(),
        "fixture build failed: {}",
        manifest_path.display()
    );

    let file_name = dylib_filename(crate_name);
    let expected = manifest_dir.join("target").join("debug").join(&file_name);
    if expected.exists() {
        return expected;
    }
    find_file_recursive(&manifest_dir.join("target").join("debug"), &file_name)
        .unwrap_or_else(|| panic!("cannot locate fixture dylib {file_name}"))
}

fn cargo_bin() -> String {
    std::env::var("CARGO").unwrap_or_else(|_| "cargo".to_string())
}

fn dylib_filename(crate_name: &str) -> String {
    let base = crate_name.replace('-', "_");
    match std::env::consts::OS {
        "windows" => format!("{base}.dll"),
        "macos" => format!("lib{base}.dylib"),
        _ => format!("lib{base}.so"),
    }
}

fn find_file_recursive(root: &Path, file_name: &str) -> Option<PathBuf> {
    walkdir::WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .find(|entry| {
            entry
                .file_name()
                .to_string_lossy()
                .eq_ignore_ascii_case(file_name)
        })
        .map(|entry| entry.path().to_path_buf())
}

use core::ffi::c_void;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use modhost_module_sdk::{
    MhLogLevel, Module, ModuleCreateContext, SdkResult, get_interface, host_log,
    register_interface,
};

static MARKER: u32 = 0x4D48;

pub struct LifecycleModule {
    journal: PathBuf,
    fail_init: bool,
}

impl LifecycleModule {
    fn record(&self, event: &str) -> SdkResult<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.journal)?;
        writeln!(file, "{event}")?;
        Ok(())
    }
}

impl Module for LifecycleModule {
    const DISPLAY_NAME: &'static str = "Lifecycle Fixture";
    const DISPLAY_AUTHOR: &'static str = "modhost tests";

    fn create(ctx: ModuleCreateContext<'_>) -> SdkResult<Self> {
        let module = Self {
            journal: Path::new(ctx.module_path).join("journal.log"),
            fail_init: ctx.config_json.contains("\"fail_init\":true"),
        };
        module.record(&format!("create hot_reload={}", ctx.hot_reload))?;
        Ok(module)
    }

    fn init(&mut self) -> bool {
        if self.record("init").is_err() {
            return false;
        }
        let marker = &MARKER as *const u32 as *const c_void;
        if register_interface("lifecycle.marker", marker).is_ok()
            && get_interface("lifecycle.marker") == Some(marker)
        {
            let _ = self.record("registered");
        }
        host_log(MhLogLevel::Info, "lifecycle fixture initialised");
        !self.fail_init
    }

    fn post_init(&mut self) -> SdkResult<()> {
        self.record("post_init")
    }

    fn shutdown(&mut self) -> SdkResult<()> {
        self.record("shutdown")
    }

    fn on_all_modules_loaded(&mut self) {
        let _ = self.record("all_loaded");
    }
}

modhost_module_sdk::export_module! {
    module: LifecycleModule,
    version: (2, 5, 1),
}

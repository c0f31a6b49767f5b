//! Host-side lifecycle management for dynamically loaded modhost modules.

mod config;
pub mod contract;
mod discovery;
mod error;
mod events;
mod interfaces;
mod native;
mod orchestrator;
mod process_lock;
mod record;
mod staging;

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;

use std::path::Path;

pub use config::{LockConfig, OrchestratorConfig};
pub use contract::{
    CodeUnit, HostCapabilities, ModuleContext, ModuleHost, ModuleInstance, ModuleLoader,
    ModuleVersion,
};
pub use discovery::{DiscoveredModule, discover_modules, library_file_names};
pub use error::{Error, Result};
pub use events::{HandlerId, LifecycleEvent, LifecycleHandlers};
pub use interfaces::{InterfaceRegistry, SharedSystem};
pub use native::{NativeInterface, NativeModuleLoader};
pub use orchestrator::{LoadReport, Orchestrator, UnloadReport};
pub use process_lock::{
    DEFAULT_LOCK_PREFIX, LockOptions, LockStrategy, ProcessLock, derive_key,
};
pub use record::{ModuleDescriptor, ModuleRecord, ModuleState};
pub use staging::{RELOAD_STAGING_DIR_NAME, StagingReport, UpdateStaging};

pub fn dynamic_library_ext() -> &'static str {
    match std::env::consts::OS {
        "windows" => "dll",
        "macos" => "dylib",
        _ => "so",
    }
}

pub fn is_dynamic_library_file(path: &Path) -> bool {
    path.extension()
        .and_then(|value| value.to_str())
        .is_some_and(|value| value.eq_ignore_ascii_case(dynamic_library_ext()))
}

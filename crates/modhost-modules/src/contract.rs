//! Seams between the lifecycle state machine and whatever actually runs a module's code.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use modhost_module_api::MhVersion;
use serde_json::Value;

use crate::error::Result;
use crate::interfaces::InterfaceRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ModuleVersion {
    pub major: u16,
    pub minor: u16,
    pub patch: u16,
    pub build: u16,
}

impl ModuleVersion {
    pub const fn new(major: u16, minor: u16, patch: u16, build: u16) -> Self {
        Self {
            major,
            minor,
            patch,
            build,
        }
    }
}

impl fmt::Display for ModuleVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.patch, self.build
        )
    }
}

impl From<MhVersion> for ModuleVersion {
    fn from(value: MhVersion) -> Self {
        Self::new(value.major, value.minor, value.patch, value.build)
    }
}

impl From<ModuleVersion> for MhVersion {
    fn from(value: ModuleVersion) -> Self {
        MhVersion {
            major: value.major,
            minor: value.minor,
            patch: value.patch,
            build: value.build,
        }
    }
}

/// Services the host exposes to every module instance.
pub trait HostCapabilities: Send + Sync {
    fn interfaces(&self) -> &InterfaceRegistry;
}

/// Host-side hook invoked while a module is being torn down, before its own `shutdown`.
pub trait ModuleHost: Send + Sync {
    fn on_module_unload(&self, name: &str, instance: &dyn ModuleInstance) -> anyhow::Result<()>;
}

/// Fixed constructor arguments for a module instance.
#[derive(Clone)]
pub struct ModuleContext {
    pub module_name: String,
    pub capabilities: Arc<dyn HostCapabilities>,
    pub module_path: PathBuf,
    pub root_path: PathBuf,
    pub version: ModuleVersion,
    pub configuration: Arc<Value>,
    pub hot_reload: bool,
}

impl fmt::Debug for ModuleContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleContext")
            .field("module_name", &self.module_name)
            .field("module_path", &self.module_path)
            .field("root_path", &self.root_path)
            .field("version", &self.version)
            .field("hot_reload", &self.hot_reload)
            .finish_non_exhaustive()
    }
}

/// A constructed, live module.
pub trait ModuleInstance: Send {
    fn display_name(&self) -> Option<String> {
        None
    }

    fn display_author(&self) -> Option<String> {
        None
    }

    /// `false` aborts the load.
    fn init(&mut self) -> bool;

    fn post_init(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    fn shutdown(&mut self) -> anyhow::Result<()>;

    fn on_all_modules_loaded(&mut self) {}

    fn on_library_connected(&mut self, _name: &str) {}

    fn on_library_disconnect(&mut self, _name: &str) {}
}

/// Code loaded from one module library.
pub trait CodeUnit: Send {
    /// `None` when the library did not declare a version.
    fn version(&self) -> Option<ModuleVersion>;

    fn instantiate(&mut self, ctx: ModuleContext) -> anyhow::Result<Box<dyn ModuleInstance>>;

    /// Unload the code. Every instance created from it must already be dropped.
    fn dispose(self: Box<Self>) -> anyhow::Result<()>;
}

pub trait ModuleLoader: Send + Sync {
    /// Load the library at `path` and resolve its entry point.
    fn load(&self, module: &str, path: &Path) -> Result<Box<dyn CodeUnit>>;
}

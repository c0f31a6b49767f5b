//! In-process stand-ins for module libraries, shared by the unit tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::anyhow;
use parking_lot::Mutex;

use crate::contract::{
    CodeUnit, HostCapabilities, ModuleContext, ModuleHost, ModuleInstance, ModuleLoader,
    ModuleVersion,
};
use crate::error::{Error, Result};
use crate::interfaces::{InterfaceRegistry, SharedSystem};
use crate::process_lock::{LockOptions, LockStrategy};
use crate::record::ModuleDescriptor;

pub(crate) const FAKE_VERSION: ModuleVersion = ModuleVersion::new(1, 2, 3, 4);

#[derive(Debug, Clone, Default)]
pub(crate) struct Behavior {
    pub missing_entry: bool,
    pub missing_version: bool,
    pub fail_create: bool,
    pub reject_init: bool,
    pub panic_in_init: bool,
    pub fail_post_init: bool,
    pub fail_shutdown: bool,
    pub panic_on_connect: bool,
    pub display_name: Option<String>,
    /// Published into the interface registry during `init`.
    pub publish: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn push(&self, line: impl Into<String>) {
        self.0.lock().push(line.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }

    pub fn count(&self, line: &str) -> usize {
        self.0.lock().iter().filter(|entry| *entry == line).count()
    }
}

#[derive(Default)]
pub(crate) struct FakeLoader {
    journal: Journal,
    behaviors: Mutex<HashMap<String, Behavior>>,
}

impl FakeLoader {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            behaviors: Mutex::new(HashMap::new()),
        }
    }

    pub fn set(&self, module: &str, behavior: Behavior) {
        self.behaviors.lock().insert(module.to_string(), behavior);
    }
}

impl ModuleLoader for FakeLoader {
    fn load(&self, module: &str, _path: &Path) -> Result<Box<dyn CodeUnit>> {
        self.journal.push(format!("{module}:load"));
        let behavior = self
            .behaviors
            .lock()
            .get(module)
            .cloned()
            .unwrap_or_default();
        if behavior.missing_entry {
            return Err(Error::EntryPoint {
                module: module.to_string(),
                details: "no factory".to_string(),
            });
        }
        Ok(Box::new(FakeCode {
            module: module.to_string(),
            behavior,
            journal: self.journal.clone(),
        }))
    }
}

struct FakeCode {
    module: String,
    behavior: Behavior,
    journal: Journal,
}

impl CodeUnit for FakeCode {
    fn version(&self) -> Option<ModuleVersion> {
        (!self.behavior.missing_version).then_some(FAKE_VERSION)
    }

    fn instantiate(&mut self, ctx: ModuleContext) -> anyhow::Result<Box<dyn ModuleInstance>> {
        self.journal
            .push(format!("{}:create hot_reload={}", self.module, ctx.hot_reload));
        if self.behavior.fail_create {
            return Err(anyhow!("constructor refused"));
        }
        Ok(Box::new(FakeInstance {
            module: self.module.clone(),
            behavior: self.behavior.clone(),
            journal: self.journal.clone(),
            ctx,
        }))
    }

    fn dispose(self: Box<Self>) -> anyhow::Result<()> {
        self.journal.push(format!("{}:dispose", self.module));
        Ok(())
    }
}

struct FakeInstance {
    module: String,
    behavior: Behavior,
    journal: Journal,
    ctx: ModuleContext,
}

impl ModuleInstance for FakeInstance {
    fn display_name(&self) -> Option<String> {
        self.behavior.display_name.clone()
    }

    fn display_author(&self) -> Option<String> {
        Some("tests".to_string())
    }

    fn init(&mut self) -> bool {
        self.journal.push(format!("{}:init", self.module));
        if self.behavior.panic_in_init {
            panic!("init exploded");
        }
        if let Some(identity) = &self.behavior.publish {
            let registered = self.ctx.capabilities.interfaces().register(
                &self.module,
                identity,
                Arc::new(self.module.clone()),
            );
            if registered.is_err() {
                return false;
            }
        }
        !self.behavior.reject_init
    }

    fn post_init(&mut self) -> anyhow::Result<()> {
        self.journal.push(format!("{}:post_init", self.module));
        if self.behavior.fail_post_init {
            return Err(anyhow!("post init failed"));
        }
        Ok(())
    }

    fn shutdown(&mut self) -> anyhow::Result<()> {
        self.journal.push(format!("{}:shutdown", self.module));
        if self.behavior.fail_shutdown {
            return Err(anyhow!("shutdown failed"));
        }
        Ok(())
    }

    fn on_all_modules_loaded(&mut self) {
        self.journal.push(format!("{}:all_loaded", self.module));
    }

    fn on_library_connected(&mut self, name: &str) {
        self.journal
            .push(format!("{}:connected:{name}", self.module));
        if self.behavior.panic_on_connect {
            panic!("connect exploded");
        }
    }

    fn on_library_disconnect(&mut self, name: &str) {
        self.journal
            .push(format!("{}:disconnect:{name}", self.module));
    }
}

impl Drop for FakeInstance {
    fn drop(&mut self) {
        self.journal.push(format!("{}:drop", self.module));
    }
}

/// [`SharedSystem`] that also journals the unload hook.
pub(crate) struct RecordingHost {
    system: SharedSystem,
    journal: Journal,
    pub fail_unload_hook: bool,
}

impl RecordingHost {
    pub fn new(journal: Journal) -> Self {
        Self {
            system: SharedSystem::new(),
            journal,
            fail_unload_hook: false,
        }
    }
}

impl HostCapabilities for RecordingHost {
    fn interfaces(&self) -> &InterfaceRegistry {
        self.system.interfaces()
    }
}

impl ModuleHost for RecordingHost {
    fn on_module_unload(&self, name: &str, instance: &dyn ModuleInstance) -> anyhow::Result<()> {
        self.journal.push(format!("host:unload:{name}"));
        if self.fail_unload_hook {
            return Err(anyhow!("host refused"));
        }
        self.system.on_module_unload(name, instance)
    }
}

pub(crate) fn lock_options(dir: &Path) -> LockOptions {
    LockOptions {
        strategy: LockStrategy::FileLock,
        dir: dir.to_path_buf(),
        ..LockOptions::default()
    }
}

/// `<root>/modules/<name>/<name>.<ext>`, with the module directory created.
pub(crate) fn module_descriptor(root: &Path, name: &str) -> ModuleDescriptor {
    let module_dir = root.join("modules").join(name);
    std::fs::create_dir_all(&module_dir).expect("create module dir");
    let library: PathBuf = module_dir.join(format!("{name}.{}", crate::dynamic_library_ext()));
    ModuleDescriptor::new(library, root)
}

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::OrchestratorConfig;
use crate::contract::{HostCapabilities, ModuleHost, ModuleLoader};
use crate::discovery::discover_modules;
use crate::error::{Error, Result};
use crate::events::{HandlerId, LifecycleEvent, LifecycleHandlers};
use crate::interfaces::SharedSystem;
use crate::native::NativeModuleLoader;
use crate::process_lock::LockOptions;
use crate::record::{ModuleDescriptor, ModuleRecord, ModuleState};

#[derive(Debug, Default)]
pub struct LoadReport {
    pub loaded: Vec<String>,
    pub failed: Vec<(String, Error)>,
}

#[derive(Debug, Default)]
pub struct UnloadReport {
    pub unloaded: Vec<String>,
    pub failed: Vec<(String, Error)>,
}

/// Owns every module record and fans lifecycle events out between them.
///
/// Records keep registration order; notifications follow it and `unload_all` reverses it.
pub struct Orchestrator {
    records: Vec<ModuleRecord>,
    capabilities: Arc<dyn HostCapabilities>,
    host: Arc<dyn ModuleHost>,
    loader: Arc<dyn ModuleLoader>,
    lock_options: LockOptions,
    root_dir: PathBuf,
    configuration: Arc<Value>,
    handlers: LifecycleHandlers,
}

impl Orchestrator {
    pub fn new<H>(
        host: Arc<H>,
        loader: Arc<dyn ModuleLoader>,
        lock_options: LockOptions,
        root_dir: impl Into<PathBuf>,
        configuration: Value,
    ) -> Self
    where
        H: HostCapabilities + ModuleHost + 'static,
    {
        Self {
            records: Vec::new(),
            capabilities: host.clone(),
            host,
            loader,
            lock_options,
            root_dir: root_dir.into(),
            configuration: Arc::new(configuration),
            handlers: LifecycleHandlers::default(),
        }
    }

    /// Native loader plus a [`SharedSystem`] host, with every module found under `modules_dir`
    /// registered.
    pub fn from_config(config: &OrchestratorConfig) -> Result<Self> {
        config.validate()?;
        let mut orchestrator = Self::new(
            Arc::new(SharedSystem::new()),
            Arc::new(NativeModuleLoader),
            config.lock_options(),
            &config.root_dir,
            config.module_config.clone(),
        );
        orchestrator.register_discovered(&config.modules_dir)?;
        Ok(orchestrator)
    }

    pub fn capabilities(&self) -> &Arc<dyn HostCapabilities> {
        &self.capabilities
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn add_handler<F>(&mut self, handler: F) -> HandlerId
    where
        F: Fn(&LifecycleEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.handlers.add(handler)
    }

    pub fn remove_handler(&mut self, id: HandlerId) -> bool {
        self.handlers.remove(id)
    }

    pub fn register(&mut self, descriptor: ModuleDescriptor) -> Result<&ModuleRecord> {
        let name = descriptor.name();
        if name.is_empty() {
            return Err(Error::config(format!(
                "cannot derive a module name from `{}`",
                descriptor.library_path.display()
            )));
        }
        if self.records.iter().any(|record| record.name() == name) {
            return Err(Error::conflict("module", name));
        }
        debug!(module = %name, library = %descriptor.library_path.display(), "module registered");
        self.records.push(ModuleRecord::new(
            descriptor,
            self.host.clone(),
            self.loader.clone(),
            self.lock_options.clone(),
        ));
        let index = self.records.len() - 1;
        Ok(&self.records[index])
    }

    /// Register every module under `modules_root` that is not registered yet.
    pub fn register_discovered(&mut self, modules_root: impl AsRef<Path>) -> Result<usize> {
        let mut added = 0;
        for discovered in discover_modules(modules_root)? {
            if self.module(&discovered.name).is_some() {
                continue;
            }
            self.register(ModuleDescriptor::new(
                discovered.library_path,
                self.root_dir.clone(),
            ))?;
            added += 1;
        }
        Ok(added)
    }

    pub fn module(&self, name: &str) -> Option<&ModuleRecord> {
        self.records.iter().find(|record| record.name() == name)
    }

    pub fn modules(&self) -> &[ModuleRecord] {
        &self.records
    }

    pub fn running_module_names(&self) -> Vec<String> {
        self.records
            .iter()
            .filter(|record| record.state() == ModuleState::Running)
            .map(|record| record.name().to_string())
            .collect()
    }

    fn index_of(&self, name: &str) -> Result<usize> {
        self.records
            .iter()
            .position(|record| record.name() == name)
            .ok_or_else(|| Error::not_found("module", name))
    }

    /// Load every registered module that is not running, then broadcast all-loaded.
    pub fn load_all(&mut self, hot_reload: bool) -> LoadReport {
        let pending: Vec<String> = self
            .records
            .iter()
            .filter(|record| !record.state().is_live())
            .map(|record| record.name().to_string())
            .collect();

        let mut report = LoadReport::default();
        for name in pending {
            match self.load_module(&name, hot_reload) {
                Ok(()) => report.loaded.push(name),
                Err(e) => {
                    warn!(module = %name, "skipping module: {e}");
                    report.failed.push((name, e));
                },
            }
        }
        info!(
            loaded = report.loaded.len(),
            failed = report.failed.len(),
            "module load pass finished"
        );
        self.notify_all_loaded();
        report
    }

    pub fn load_module(&mut self, name: &str, hot_reload: bool) -> Result<()> {
        let index = self.index_of(name)?;
        let capabilities = self.capabilities.clone();
        let configuration = self.configuration.clone();

        // Take the record out so its callback can reach every other record.
        let mut record = self.records.remove(index);
        let others = &mut self.records;
        let handlers = &self.handlers;
        let outcome = record.load(hot_reload, capabilities, configuration, |loaded| {
            for other in others.iter_mut() {
                other.notify_library_connected(loaded);
            }
            handlers.dispatch(&LifecycleEvent::Loaded {
                name: loaded.to_string(),
            });
        });
        self.records.insert(index, record);
        outcome
    }

    /// Unload one module. Modules that are not live are left alone.
    pub fn unload_module(&mut self, name: &str) -> Result<()> {
        let index = self.index_of(name)?;
        if !self.records[index].state().is_live() {
            debug!(module = name, "module is not loaded");
            return Ok(());
        }

        let mut record = self.records.remove(index);
        let others = &mut self.records;
        let handlers = &self.handlers;
        let outcome = record.unload(|unloading| {
            for other in others.iter_mut() {
                other.notify_library_disconnect(unloading);
            }
            handlers.dispatch(&LifecycleEvent::Unloaded {
                name: unloading.to_string(),
            });
        });
        self.records.insert(index, record);
        outcome
    }

    /// Swap in new code without applying staged files.
    pub fn reload_module(&mut self, name: &str) -> Result<()> {
        self.unload_module(name)?;
        self.load_module(name, true)
    }

    /// Apply pending staged files with a cold restart. `Ok(false)` when nothing is staged.
    pub fn update_module(&mut self, name: &str) -> Result<bool> {
        let index = self.index_of(name)?;
        if !self.records[index].is_update_needed() {
            return Ok(false);
        }
        info!(module = name, "staged update pending, restarting module");
        self.unload_module(name)?;
        self.load_module(name, false)?;
        Ok(true)
    }

    /// Unload every live module, last registered first.
    pub fn unload_all(&mut self) -> UnloadReport {
        let live: Vec<String> = self
            .records
            .iter()
            .rev()
            .filter(|record| record.state().is_live())
            .map(|record| record.name().to_string())
            .collect();

        let mut report = UnloadReport::default();
        for name in live {
            match self.unload_module(&name) {
                Ok(()) => report.unloaded.push(name),
                Err(e) => {
                    warn!(module = %name, "unload failed: {e}");
                    report.failed.push((name, e));
                },
            }
        }
        report
    }

    pub fn notify_all_loaded(&mut self) {
        for record in &mut self.records {
            record.notify_all_loaded();
        }
        self.handlers.dispatch(&LifecycleEvent::AllLoaded);
    }

    /// Drop every process lock while keeping modules running. Must run on the registering thread.
    pub fn release_locks_early(&mut self) -> Result<()> {
        for record in &mut self.records {
            record.release_lock_early()?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("records", &self.records)
            .field("root_dir", &self.root_dir)
            .field("handlers", &self.handlers.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "tests/orchestrator_tests.rs"]
mod tests;

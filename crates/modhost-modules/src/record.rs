use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::ThreadId;

use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::contract::{
    CodeUnit, HostCapabilities, ModuleContext, ModuleHost, ModuleInstance, ModuleLoader,
    ModuleVersion,
};
use crate::error::{Error, Result};
use crate::process_lock::{LockOptions, ProcessLock, derive_key};
use crate::staging::UpdateStaging;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleState {
    Initializing,
    Loading,
    Running,
    Unloading,
    Unloaded,
    Failure,
}

impl ModuleState {
    /// Whether the record currently owns (or is acquiring/releasing) a live module.
    pub fn is_live(self) -> bool {
        matches!(self, Self::Loading | Self::Running | Self::Unloading)
    }
}

/// Where a module lives on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDescriptor {
    pub library_path: PathBuf,
    pub module_dir: PathBuf,
    pub root_path: PathBuf,
}

impl ModuleDescriptor {
    /// The module directory is the directory holding the library.
    pub fn new(library_path: impl Into<PathBuf>, root_path: impl Into<PathBuf>) -> Self {
        let library_path = library_path.into();
        let module_dir = library_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Self {
            library_path,
            module_dir,
            root_path: root_path.into(),
        }
    }

    /// Library file stem, without the `lib` prefix Unix toolchains add.
    pub fn name(&self) -> String {
        let stem = self
            .library_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        if cfg!(unix)
            && let Some(stripped) = stem.strip_prefix("lib")
            && !stripped.is_empty()
        {
            return stripped.to_string();
        }
        stem
    }
}

/// One module's lifecycle: lock, staged update, code, instance.
pub struct ModuleRecord {
    name: String,
    descriptor: ModuleDescriptor,
    state: ModuleState,
    owner_thread: ThreadId,
    version: ModuleVersion,
    host: Arc<dyn ModuleHost>,
    loader: Arc<dyn ModuleLoader>,
    lock_options: LockOptions,
    // Drop order matters: the instance goes before the code that backs it.
    instance: Option<Box<dyn ModuleInstance>>,
    code: Option<Box<dyn CodeUnit>>,
    lock: Option<ProcessLock>,
}

impl ModuleRecord {
    pub fn new(
        descriptor: ModuleDescriptor,
        host: Arc<dyn ModuleHost>,
        loader: Arc<dyn ModuleLoader>,
        lock_options: LockOptions,
    ) -> Self {
        Self {
            name: descriptor.name(),
            descriptor,
            state: ModuleState::Initializing,
            owner_thread: std::thread::current().id(),
            version: ModuleVersion::default(),
            host,
            loader,
            lock_options,
            instance: None,
            code: None,
            lock: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn descriptor(&self) -> &ModuleDescriptor {
        &self.descriptor
    }

    pub fn state(&self) -> ModuleState {
        self.state
    }

    /// `0.0.0.0` whenever no loaded library backs the record.
    pub fn version(&self) -> ModuleVersion {
        self.version
    }

    pub fn display_name(&self) -> String {
        self.instance
            .as_ref()
            .and_then(|instance| instance.display_name())
            .unwrap_or_else(|| self.name.clone())
    }

    pub fn display_author(&self) -> Option<String> {
        self.instance
            .as_ref()
            .and_then(|instance| instance.display_author())
    }

    pub fn instance(&self) -> Option<&dyn ModuleInstance> {
        self.instance.as_deref()
    }

    pub fn holds_lock(&self) -> bool {
        self.lock.as_ref().is_some_and(ProcessLock::is_acquired)
    }

    pub fn staging(&self) -> UpdateStaging {
        UpdateStaging::new(&self.name, &self.descriptor.module_dir)
    }

    pub fn is_update_needed(&self) -> bool {
        self.staging().is_update_needed()
    }

    fn lock_raw(&self) -> String {
        self.descriptor.library_path.to_string_lossy().into_owned()
    }

    /// Bring the module to `Running`.
    ///
    /// Any failure before the instance is stored rolls back to `Failure` with nothing held.
    /// `post_init` failures are logged and leave the module running. `on_load` runs last.
    pub fn load<F>(
        &mut self,
        hot_reload: bool,
        capabilities: Arc<dyn HostCapabilities>,
        configuration: Arc<Value>,
        on_load: F,
    ) -> Result<()>
    where
        F: FnOnce(&str),
    {
        if self.state.is_live() || self.instance.is_some() || self.lock.is_some() {
            return Err(Error::Contention {
                module: self.name.clone(),
                key: derive_key(&self.lock_raw()),
            });
        }

        self.state = ModuleState::Loading;
        info!(module = %self.name, hot_reload, "loading module");
        let instance = match self.acquire(hot_reload, capabilities, configuration) {
            Ok(instance) => instance,
            Err(e) => {
                self.rollback();
                error!(module = %self.name, state = ?self.state, "module load failed: {e}");
                return Err(e);
            },
        };

        self.instance = Some(instance);
        self.state = ModuleState::Running;
        if let Some(instance) = self.instance.as_mut() {
            match catch_unwind(AssertUnwindSafe(|| instance.post_init())) {
                Ok(Ok(())) => {},
                Ok(Err(e)) => warn!(module = %self.name, "post_init failed: {e:#}"),
                Err(_) => warn!(module = %self.name, "post_init panicked"),
            }
        }
        info!(module = %self.name, version = %self.version, "module running");
        on_load(&self.name);
        Ok(())
    }

    fn acquire(
        &mut self,
        hot_reload: bool,
        capabilities: Arc<dyn HostCapabilities>,
        configuration: Arc<Value>,
    ) -> Result<Box<dyn ModuleInstance>> {
        if !hot_reload {
            self.staging().apply()?;
        }

        let lock = ProcessLock::create_by_raw(&self.lock_raw(), &self.lock_options)?;
        if !lock.is_acquired() {
            return Err(Error::Contention {
                module: self.name.clone(),
                key: lock.key().to_string(),
            });
        }
        self.lock = Some(lock);

        let code = self
            .code
            .insert(self.loader.load(&self.name, &self.descriptor.library_path)?);
        let version = code.version().ok_or_else(|| Error::MissingVersion {
            module: self.name.clone(),
        })?;
        self.version = version;

        let ctx = ModuleContext {
            module_name: self.name.clone(),
            capabilities,
            module_path: self.descriptor.module_dir.clone(),
            root_path: self.descriptor.root_path.clone(),
            version,
            configuration,
            hot_reload,
        };
        let construction = |details: String| Error::Construction {
            module: self.name.clone(),
            details,
        };
        let mut instance = match catch_unwind(AssertUnwindSafe(|| code.instantiate(ctx))) {
            Ok(Ok(instance)) => instance,
            Ok(Err(e)) => return Err(construction(format!("{e:#}"))),
            Err(_) => return Err(construction("constructor panicked".to_string())),
        };

        match catch_unwind(AssertUnwindSafe(|| instance.init())) {
            Ok(true) => Ok(instance),
            Ok(false) => Err(Error::InitRejected {
                module: self.name.clone(),
            }),
            Err(_) => Err(construction("init panicked".to_string())),
        }
    }

    fn rollback(&mut self) {
        self.instance = None;
        if let Some(code) = self.code.take()
            && let Err(e) = code.dispose()
        {
            warn!(module = %self.name, "dispose after failed load: {e:#}");
        }
        if let Some(mut lock) = self.lock.take() {
            lock.release();
        }
        self.version = ModuleVersion::default();
        self.state = ModuleState::Failure;
    }

    /// Tear the module down. The lock goes first so a replacement can start immediately.
    ///
    /// `on_unload` runs after the host hook and before the module's own `shutdown`. A record
    /// that is not live holds nothing and is left as it is.
    pub fn unload<F>(&mut self, on_unload: F) -> Result<()>
    where
        F: FnOnce(&str),
    {
        if !self.state.is_live() {
            debug!(module = %self.name, state = ?self.state, "unload skipped, module not live");
            return Ok(());
        }
        if let Some(mut lock) = self.lock.take() {
            lock.release();
        }
        self.state = ModuleState::Unloading;
        info!(module = %self.name, "unloading module");

        let mut outcome = self.teardown(on_unload);
        if let Some(code) = self.code.take()
            && let Err(e) = code.dispose()
        {
            let details = format!("dispose failed: {e:#}");
            outcome = outcome.and(Err(details));
        }
        self.version = ModuleVersion::default();

        match outcome {
            Ok(()) => {
                self.state = ModuleState::Unloaded;
                info!(module = %self.name, "module unloaded");
                Ok(())
            },
            Err(details) => {
                self.state = ModuleState::Failure;
                error!(module = %self.name, state = ?self.state, "module unload failed: {details}");
                Err(Error::Teardown {
                    module: self.name.clone(),
                    details,
                })
            },
        }
    }

    fn teardown<F>(&mut self, on_unload: F) -> std::result::Result<(), String>
    where
        F: FnOnce(&str),
    {
        let Some(mut instance) = self.instance.take() else {
            return Ok(());
        };
        let name = self.name.as_str();
        let host = self.host.as_ref();

        match catch_unwind(AssertUnwindSafe(|| host.on_module_unload(name, &*instance))) {
            Ok(Ok(())) => {},
            Ok(Err(e)) => return Err(format!("host unload hook failed: {e:#}")),
            Err(_) => return Err("host unload hook panicked".to_string()),
        }
        if catch_unwind(AssertUnwindSafe(|| on_unload(name))).is_err() {
            return Err("unload callback panicked".to_string());
        }
        match catch_unwind(AssertUnwindSafe(|| instance.shutdown())) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(format!("shutdown failed: {e:#}")),
            Err(_) => Err("shutdown panicked".to_string()),
        }
    }

    /// Drop the process lock while keeping the module running.
    ///
    /// Only the thread that created the record may do this; a second call is a no-op.
    pub fn release_lock_early(&mut self) -> Result<()> {
        if std::thread::current().id() != self.owner_thread {
            return Err(Error::ThreadAffinity {
                module: self.name.clone(),
            });
        }
        if let Some(mut lock) = self.lock.take() {
            lock.release();
            debug!(module = %self.name, "process lock released early");
        }
        Ok(())
    }

    pub fn notify_all_loaded(&mut self) {
        self.notify("on_all_modules_loaded", |instance| {
            instance.on_all_modules_loaded()
        });
    }

    pub fn notify_library_connected(&mut self, name: &str) {
        if name == self.name {
            return;
        }
        self.notify("on_library_connected", |instance| {
            instance.on_library_connected(name)
        });
    }

    pub fn notify_library_disconnect(&mut self, name: &str) {
        if name == self.name {
            return;
        }
        self.notify("on_library_disconnect", |instance| {
            instance.on_library_disconnect(name)
        });
    }

    fn notify<F>(&mut self, callback: &'static str, f: F)
    where
        F: FnOnce(&mut dyn ModuleInstance),
    {
        if self.state != ModuleState::Running {
            return;
        }
        let Some(instance) = self.instance.as_deref_mut() else {
            return;
        };
        if catch_unwind(AssertUnwindSafe(|| f(instance))).is_err() {
            warn!(module = %self.name, callback, "module callback panicked");
        }
    }
}

impl std::fmt::Debug for ModuleRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleRecord")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("version", &self.version)
            .field("library_path", &self.descriptor.library_path)
            .field("holds_lock", &self.holds_lock())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "tests/record_tests.rs"]
mod tests;

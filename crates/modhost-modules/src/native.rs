use core::ffi::c_void;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, anyhow};
use libloading::{Library, Symbol};
use modhost_module_api::{
    MH_ERR_CONFLICT, MH_ERR_INVALID_ARG, MODHOST_MODULE_API_VERSION, MODHOST_MODULE_ENTRY_SYMBOL,
    MhHostVTable, MhLogLevel, MhModuleCreateArgs, MhModuleEntry, MhModuleVTable, MhStatus, MhStr,
};
use tracing::debug;

use crate::contract::{
    CodeUnit, HostCapabilities, ModuleContext, ModuleInstance, ModuleLoader, ModuleVersion,
};
use crate::error::{Error, Result};

const MODULE_LOG_TARGET: &str = "modhost_modules::module";

/// Opaque interface pointer published by a native module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeInterface(usize);

impl NativeInterface {
    pub fn as_ptr(&self) -> *const c_void {
        self.0 as *const c_void
    }
}

/// Loads module shared libraries through `modhost_module_entry`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeModuleLoader;

impl ModuleLoader for NativeModuleLoader {
    fn load(&self, module: &str, path: &Path) -> Result<Box<dyn CodeUnit>> {
        let library = open_library(path).map_err(|e| Error::Library {
            module: module.to_string(),
            path: path.to_path_buf(),
            details: e.to_string(),
        })?;

        let entry_point = |details: String| Error::EntryPoint {
            module: module.to_string(),
            details,
        };
        // SAFETY: the symbol type is the ABI contract of every module library.
        let entry: MhModuleEntry = unsafe {
            let symbol: Symbol<MhModuleEntry> = library
                .get(MODHOST_MODULE_ENTRY_SYMBOL.as_bytes())
                .map_err(|e| {
                    entry_point(format!("missing `{MODHOST_MODULE_ENTRY_SYMBOL}`: {e}"))
                })?;
            *symbol
        };
        // SAFETY: entry is trusted by ABI contract; null and version are checked below.
        let vtable_ptr = unsafe { entry() };
        if vtable_ptr.is_null() {
            return Err(entry_point("entry returned a null vtable".to_string()));
        }
        // SAFETY: the vtable is static data inside the library, which we keep loaded.
        let vtable = unsafe { *vtable_ptr };
        if vtable.api_version != MODHOST_MODULE_API_VERSION {
            return Err(entry_point(format!(
                "api_version mismatch: module={}, host={}",
                vtable.api_version, MODHOST_MODULE_API_VERSION
            )));
        }

        debug!(module, path = %path.display(), "module library loaded");
        Ok(Box::new(NativeCodeUnit {
            module: module.to_string(),
            library: Arc::new(library),
            vtable,
        }))
    }
}

#[cfg(unix)]
fn open_library(path: &Path) -> std::result::Result<Library, libloading::Error> {
    use libloading::os::unix::{Library as UnixLibrary, RTLD_LOCAL, RTLD_NOW};

    // SAFETY: running foreign initialisers is inherent to loading a module.
    unsafe { UnixLibrary::open(Some(path), RTLD_NOW | RTLD_LOCAL) }.map(Library::from)
}

#[cfg(not(unix))]
fn open_library(path: &Path) -> std::result::Result<Library, libloading::Error> {
    // SAFETY: running foreign initialisers is inherent to loading a module.
    unsafe { Library::new(path) }
}

struct NativeCodeUnit {
    module: String,
    library: Arc<Library>,
    vtable: MhModuleVTable,
}

impl CodeUnit for NativeCodeUnit {
    fn version(&self) -> Option<ModuleVersion> {
        self.vtable.module_version.map(|version| version().into())
    }

    fn instantiate(&mut self, ctx: ModuleContext) -> anyhow::Result<Box<dyn ModuleInstance>> {
        let host_ctx = Box::new(NativeHostCtx {
            module: ctx.module_name.clone(),
            capabilities: ctx.capabilities.clone(),
        });
        let host_vtable = Box::new(MhHostVTable {
            api_version: MODHOST_MODULE_API_VERSION,
            user_data: (&*host_ctx) as *const NativeHostCtx as *mut c_void,
            log_utf8: Some(host_log),
            register_interface_utf8: Some(host_register_interface),
            get_interface_utf8: Some(host_get_interface),
            free_host_str_utf8: Some(host_free_str),
        });

        let module_path = ctx.module_path.to_string_lossy().into_owned();
        let root_path = ctx.root_path.to_string_lossy().into_owned();
        let config_json = serde_json::to_string(ctx.configuration.as_ref())
            .context("serialize module configuration")?;
        let args = MhModuleCreateArgs {
            host: host_vtable.as_ref() as *const MhHostVTable,
            module_path_utf8: MhStr::borrowed(&module_path),
            root_path_utf8: MhStr::borrowed(&root_path),
            version: ctx.version.into(),
            config_json_utf8: MhStr::borrowed(&config_json),
            hot_reload: ctx.hot_reload,
        };

        let mut handle = core::ptr::null_mut();
        let status = (self.vtable.create)(&args, &mut handle);
        module_status(&self.vtable, "create", status)?;
        if handle.is_null() {
            return Err(anyhow!("module `{}` create returned a null handle", self.module));
        }

        Ok(Box::new(NativeModuleInstance {
            handle,
            vtable: self.vtable,
            _host_vtable: host_vtable,
            _host_ctx: host_ctx,
            _library: self.library.clone(),
        }))
    }

    fn dispose(self: Box<Self>) -> anyhow::Result<()> {
        let module = self.module;
        match Arc::try_unwrap(self.library) {
            Ok(library) => library
                .close()
                .with_context(|| format!("close library of module `{module}`")),
            Err(_) => {
                debug!(module, "library still referenced by a live instance");
                Ok(())
            },
        }
    }
}

struct NativeModuleInstance {
    handle: *mut c_void,
    vtable: MhModuleVTable,
    _host_vtable: Box<MhHostVTable>,
    _host_ctx: Box<NativeHostCtx>,
    _library: Arc<Library>,
}

// SAFETY: the handle is only touched through the vtable, from one thread at a time.
unsafe impl Send for NativeModuleInstance {}

impl ModuleInstance for NativeModuleInstance {
    fn display_name(&self) -> Option<String> {
        let name = (self.vtable.display_name_utf8)(self.handle);
        non_empty(unsafe { mhstr_to_string_lossy(&name) })
    }

    fn display_author(&self) -> Option<String> {
        let author = (self.vtable.display_author_utf8)(self.handle);
        non_empty(unsafe { mhstr_to_string_lossy(&author) })
    }

    fn init(&mut self) -> bool {
        (self.vtable.init)(self.handle)
    }

    fn post_init(&mut self) -> anyhow::Result<()> {
        let status = (self.vtable.post_init)(self.handle);
        module_status(&self.vtable, "post_init", status)
    }

    fn shutdown(&mut self) -> anyhow::Result<()> {
        let status = (self.vtable.shutdown)(self.handle);
        module_status(&self.vtable, "shutdown", status)
    }

    fn on_all_modules_loaded(&mut self) {
        (self.vtable.on_all_modules_loaded)(self.handle);
    }

    fn on_library_connected(&mut self, name: &str) {
        (self.vtable.on_library_connected)(self.handle, MhStr::borrowed(name));
    }

    fn on_library_disconnect(&mut self, name: &str) {
        (self.vtable.on_library_disconnect)(self.handle, MhStr::borrowed(name));
    }
}

impl Drop for NativeModuleInstance {
    fn drop(&mut self) {
        (self.vtable.destroy)(self.handle);
    }
}

fn non_empty(value: String) -> Option<String> {
    (!value.trim().is_empty()).then_some(value)
}

unsafe fn mhstr_to_string_lossy(s: &MhStr) -> String {
    if s.is_empty() {
        return String::new();
    }
    // SAFETY: caller guarantees `s` points to `len` readable bytes.
    let bytes = unsafe { core::slice::from_raw_parts(s.ptr, s.len) };
    String::from_utf8_lossy(bytes).into_owned()
}

fn module_status(
    vtable: &MhModuleVTable,
    operation: &'static str,
    status: MhStatus,
) -> anyhow::Result<()> {
    if status.is_ok() {
        return Ok(());
    }
    let message = unsafe { mhstr_to_string_lossy(&status.message) };
    if !status.message.is_empty()
        && let Some(free) = vtable.free_str_utf8
    {
        free(status.message);
    }
    if message.is_empty() {
        Err(anyhow!("{operation} failed (code={})", status.code))
    } else {
        Err(anyhow!("{operation} failed (code={}): {message}", status.code))
    }
}

struct NativeHostCtx {
    module: String,
    capabilities: Arc<dyn HostCapabilities>,
}

unsafe fn host_ctx<'a>(user_data: *mut c_void) -> Option<&'a NativeHostCtx> {
    if user_data.is_null() {
        return None;
    }
    // SAFETY: `user_data` is the boxed context owned by the instance that handed it out.
    Some(unsafe { &*(user_data as *const NativeHostCtx) })
}

fn host_status_err(code: i32, message: &str) -> MhStatus {
    let bytes: Box<[u8]> = message.as_bytes().into();
    let len = bytes.len();
    let ptr = Box::into_raw(bytes) as *const u8;
    MhStatus {
        code,
        message: MhStr { ptr, len },
    }
}

extern "C" fn host_free_str(_user_data: *mut c_void, s: MhStr) {
    if s.is_empty() {
        return;
    }
    // SAFETY: only strings produced by `host_status_err` are handed back here.
    unsafe {
        let slice = core::ptr::slice_from_raw_parts_mut(s.ptr as *mut u8, s.len);
        drop(Box::from_raw(slice));
    }
}

extern "C" fn host_log(user_data: *mut c_void, level: MhLogLevel, msg: MhStr) {
    let module = unsafe { host_ctx(user_data) }
        .map(|ctx| ctx.module.as_str())
        .unwrap_or("?");
    let text = unsafe { mhstr_to_string_lossy(&msg) };
    match level {
        MhLogLevel::Error => tracing::error!(target: MODULE_LOG_TARGET, module, "{text}"),
        MhLogLevel::Warn => tracing::warn!(target: MODULE_LOG_TARGET, module, "{text}"),
        MhLogLevel::Info => tracing::info!(target: MODULE_LOG_TARGET, module, "{text}"),
        MhLogLevel::Debug => tracing::debug!(target: MODULE_LOG_TARGET, module, "{text}"),
        MhLogLevel::Trace => tracing::trace!(target: MODULE_LOG_TARGET, module, "{text}"),
    }
}

extern "C" fn host_register_interface(
    user_data: *mut c_void,
    identity: MhStr,
    iface: *const c_void,
) -> MhStatus {
    let Some(ctx) = (unsafe { host_ctx(user_data) }) else {
        return host_status_err(MH_ERR_INVALID_ARG, "missing host context");
    };
    if iface.is_null() {
        return host_status_err(MH_ERR_INVALID_ARG, "interface pointer is null");
    }
    let identity = unsafe { mhstr_to_string_lossy(&identity) };
    let registered = ctx.capabilities.interfaces().register(
        &ctx.module,
        &identity,
        Arc::new(NativeInterface(iface as usize)),
    );
    match registered {
        Ok(()) => MhStatus::ok(),
        Err(e @ Error::Conflict { .. }) => host_status_err(MH_ERR_CONFLICT, &e.to_string()),
        Err(e) => host_status_err(MH_ERR_INVALID_ARG, &e.to_string()),
    }
}

extern "C" fn host_get_interface(user_data: *mut c_void, identity: MhStr) -> *const c_void {
    let Some(ctx) = (unsafe { host_ctx(user_data) }) else {
        return core::ptr::null();
    };
    let identity = unsafe { mhstr_to_string_lossy(&identity) };
    ctx.capabilities
        .interfaces()
        .get_optional::<NativeInterface>(&identity)
        .map(|iface| iface.as_ptr())
        .unwrap_or(core::ptr::null())
}

use core::ffi::c_void;

use crate::{MhLogLevel, MhStatus, MhStr, MhVersion};

/// Callbacks the host hands to every module instance.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct MhHostVTable {
    pub api_version: u32,
    pub user_data: *mut c_void,
    pub log_utf8: Option<extern "C" fn(user_data: *mut c_void, level: MhLogLevel, msg: MhStr)>,
    /// Publish an opaque interface pointer under `identity` for other modules.
    /// The pointer must stay valid until the owning module is shut down.
    pub register_interface_utf8: Option<
        extern "C" fn(user_data: *mut c_void, identity: MhStr, iface: *const c_void) -> MhStatus,
    >,
    /// Look up an interface published by any module. Null when absent.
    pub get_interface_utf8:
        Option<extern "C" fn(user_data: *mut c_void, identity: MhStr) -> *const c_void>,
    /// Free host-owned UTF-8 strings returned in `MhStatus::message` by callbacks above.
    pub free_host_str_utf8: Option<extern "C" fn(user_data: *mut c_void, s: MhStr)>,
}

// Raw pointers make this not auto-Send/Sync. Host vtable is treated as immutable and requires
// `user_data` to be thread-safe when used across threads.
unsafe impl Send for MhHostVTable {}
unsafe impl Sync for MhHostVTable {}

/// Fixed constructor parameter list of a module instance.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct MhModuleCreateArgs {
    pub host: *const MhHostVTable,
    pub module_path_utf8: MhStr,
    pub root_path_utf8: MhStr,
    pub version: MhVersion,
    pub config_json_utf8: MhStr,
    pub hot_reload: bool,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct MhModuleVTable {
    pub api_version: u32,
    /// `None` means the module did not declare a version; the host refuses to load it.
    pub module_version: Option<extern "C" fn() -> MhVersion>,
    /// Frees strings the module returned in `MhStatus::message`.
    pub free_str_utf8: Option<extern "C" fn(s: MhStr)>,

    pub create: extern "C" fn(args: *const MhModuleCreateArgs, out: *mut *mut c_void) -> MhStatus,
    pub destroy: extern "C" fn(handle: *mut c_void),

    /// Module-owned, valid until `destroy`.
    pub display_name_utf8: extern "C" fn(handle: *mut c_void) -> MhStr,
    /// Module-owned, valid until `destroy`. Empty when the module has no author.
    pub display_author_utf8: extern "C" fn(handle: *mut c_void) -> MhStr,

    pub init: extern "C" fn(handle: *mut c_void) -> bool,
    pub post_init: extern "C" fn(handle: *mut c_void) -> MhStatus,
    pub shutdown: extern "C" fn(handle: *mut c_void) -> MhStatus,

    pub on_all_modules_loaded: extern "C" fn(handle: *mut c_void),
    pub on_library_connected: extern "C" fn(handle: *mut c_void, name: MhStr),
    pub on_library_disconnect: extern "C" fn(handle: *mut c_void, name: MhStr),
}

unsafe impl Send for MhModuleVTable {}
unsafe impl Sync for MhModuleVTable {}

/// The single factory symbol every module library exports as `modhost_module_entry`.
pub type MhModuleEntry = unsafe extern "C" fn() -> *const MhModuleVTable;

use core::ffi::c_void;
use core::sync::atomic::{AtomicPtr, Ordering};

use crate::{
    MODHOST_MODULE_API_VERSION, MhHostVTable, MhLogLevel, MhStatus, MhStr, SdkError, SdkResult,
    mhstr_to_str,
};

static HOST_VTABLE: AtomicPtr<MhHostVTable> = AtomicPtr::new(core::ptr::null_mut());

#[doc(hidden)]
pub unsafe fn __set_host_vtable(host: *const MhHostVTable) -> SdkResult<()> {
    if host.is_null() {
        return Err(SdkError::HostUnavailable);
    }
    // Safety: caller passes the pointer the host supplied in `MhModuleCreateArgs`.
    let actual = unsafe { (*host).api_version };
    if actual != MODHOST_MODULE_API_VERSION {
        return Err(SdkError::HostApiVersionMismatch {
            expected: MODHOST_MODULE_API_VERSION,
            actual,
        });
    }
    HOST_VTABLE.store(host as *mut MhHostVTable, Ordering::Release);
    Ok(())
}

#[doc(hidden)]
pub fn __clear_host_vtable() {
    HOST_VTABLE.store(core::ptr::null_mut(), Ordering::Release);
}

fn current_host() -> SdkResult<*const MhHostVTable> {
    let host = HOST_VTABLE.load(Ordering::Acquire);
    if host.is_null() {
        return Err(SdkError::HostUnavailable);
    }
    Ok(host)
}

/// Log a message to the host, if the host provided a logger.
///
/// This is purely best-effort: if no host logger is present, this is a no-op.
pub fn host_log(level: MhLogLevel, msg: &str) {
    let Ok(host) = current_host() else {
        return;
    };
    // Safety: the host owns the vtable and keeps it alive until the instance is destroyed.
    let Some(cb) = (unsafe { (*host).log_utf8 }) else {
        return;
    };
    let user_data = unsafe { (*host).user_data };
    cb(user_data, level, MhStr::borrowed(msg));
}

fn host_take_owned_string(host: *const MhHostVTable, s: MhStr) -> String {
    if s.is_empty() {
        return String::new();
    }
    let text = unsafe { mhstr_to_str(&s) }
        .map(ToOwned::to_owned)
        .unwrap_or_default();
    if let Some(free_cb) = unsafe { (*host).free_host_str_utf8 } {
        let user_data = unsafe { (*host).user_data };
        free_cb(user_data, s);
    }
    text
}

fn host_status_to_result(
    host: *const MhHostVTable,
    operation: &'static str,
    status: MhStatus,
) -> SdkResult<()> {
    if status.is_ok() {
        return Ok(());
    }
    let message = host_take_owned_string(host, status.message);
    Err(SdkError::HostOperationFailed {
        operation,
        code: status.code,
        message: (!message.is_empty()).then_some(message),
    })
}

/// Publish `iface` under `identity` so other modules can find it.
///
/// The host drops the registration automatically when this module unloads, so
/// the pointer only has to outlive the module's `shutdown`.
pub fn register_interface(identity: &str, iface: *const c_void) -> SdkResult<()> {
    if identity.is_empty() {
        return Err(SdkError::invalid_arg("interface identity is empty"));
    }
    if iface.is_null() {
        return Err(SdkError::invalid_arg("interface pointer is null"));
    }
    let host = current_host()?;
    let cb = unsafe { (*host).register_interface_utf8 }
        .ok_or(SdkError::HostCallbackUnavailable("register_interface_utf8"))?;
    let user_data = unsafe { (*host).user_data };
    let status = cb(user_data, MhStr::borrowed(identity), iface);
    host_status_to_result(host, "register_interface_utf8", status)
}

/// Look up an interface another module published. `None` when nobody owns `identity`.
pub fn get_interface(identity: &str) -> Option<*const c_void> {
    let host = current_host().ok()?;
    let cb = unsafe { (*host).get_interface_utf8 }?;
    let user_data = unsafe { (*host).user_data };
    let ptr = cb(user_data, MhStr::borrowed(identity));
    (!ptr.is_null()).then_some(ptr)
}

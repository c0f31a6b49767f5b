//! FFI panic guard utilities.
//!
//! Every `extern "C" fn` generated by `export_module!` must catch panics
//! to avoid undefined behaviour at the FFI boundary. The macro calls
//! `guard_status`, `guard_void` or `guard_with_default` instead of
//! repeating the `catch_unwind` boilerplate.

use crate::{MH_ERR_INTERNAL, MhLogLevel, MhStatus, host_log, status_err_msg};

/// Extract a human-readable message from a panic payload.
pub fn panic_message(payload: Box<dyn core::any::Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        return (*msg).to_string();
    }
    if let Some(msg) = payload.downcast_ref::<String>() {
        return msg.clone();
    }
    "non-string panic payload".to_string()
}

/// Catch panics in FFI callbacks that return [`MhStatus`].
///
/// On panic the error is logged via `host_log` and an `MH_ERR_INTERNAL`
/// status is returned to the host.
pub fn guard_status(op: &'static str, f: impl FnOnce() -> MhStatus) -> MhStatus {
    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)) {
        Ok(status) => status,
        Err(payload) => {
            let msg = panic_message(payload);
            host_log(MhLogLevel::Error, &format!("panic in ffi `{op}`: {msg}"));
            status_err_msg(MH_ERR_INTERNAL, format!("panic in ffi `{op}`: {msg}"))
        },
    }
}

/// Catch panics in FFI callbacks that return nothing.
pub fn guard_void(op: &'static str, f: impl FnOnce()) {
    if let Err(payload) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)) {
        let msg = panic_message(payload);
        host_log(MhLogLevel::Error, &format!("panic in ffi `{op}`: {msg}"));
    }
}

/// Catch panics in FFI callbacks that return a value with a known safe default.
pub fn guard_with_default<T>(op: &'static str, default: T, f: impl FnOnce() -> T) -> T {
    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)) {
        Ok(val) => val,
        Err(payload) => {
            let msg = panic_message(payload);
            host_log(MhLogLevel::Error, &format!("panic in ffi `{op}`: {msg}"));
            default
        },
    }
}

use crate::{MhStatus, MhStr};

#[inline]
pub const fn mhstr(s: &'static str) -> MhStr {
    MhStr {
        ptr: s.as_ptr(),
        len: s.len(),
    }
}

#[inline]
pub fn status_ok() -> MhStatus {
    MhStatus::ok()
}

#[inline]
pub fn status_err(code: i32) -> MhStatus {
    MhStatus {
        code,
        message: MhStr::empty(),
    }
}

pub fn status_err_msg(code: i32, msg: impl AsRef<str>) -> MhStatus {
    MhStatus {
        code,
        message: alloc_utf8_bytes(msg.as_ref()),
    }
}

/// Copy `s` into a module-owned buffer the host releases through [`free_utf8_bytes`].
pub fn alloc_utf8_bytes(s: &str) -> MhStr {
    if s.is_empty() {
        return MhStr::empty();
    }
    let boxed: Box<[u8]> = s.as_bytes().into();
    let len = boxed.len();
    let ptr = Box::into_raw(boxed) as *const u8;
    MhStr { ptr, len }
}

/// Exported as `MhModuleVTable::free_str_utf8` by `export_module!`.
pub extern "C" fn free_utf8_bytes(s: MhStr) {
    if s.ptr.is_null() || s.len == 0 {
        return;
    }
    // Safety: allocated by `alloc_utf8_bytes` as a boxed slice of exactly `len` bytes.
    unsafe {
        let slice = core::ptr::slice_from_raw_parts_mut(s.ptr as *mut u8, s.len);
        drop(Box::from_raw(slice));
    }
}

/// # Safety
///
/// The caller must ensure that the `MhStr` contains a valid pointer to a memory region
/// of at least `s.len` bytes.
pub unsafe fn mhstr_to_str(s: &MhStr) -> Result<&str, String> {
    if s.ptr.is_null() || s.len == 0 {
        return Ok("");
    }
    let bytes = unsafe { core::slice::from_raw_parts(s.ptr, s.len) };
    core::str::from_utf8(bytes).map_err(|_| "invalid utf-8".to_string())
}

/// Four-part module version, mirrors `major.minor.patch.build`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct MhVersion {
    pub major: u16,
    pub minor: u16,
    pub patch: u16,
    pub build: u16,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MhLogLevel {
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

/// Immutable UTF-8 bytes. Not NUL-terminated.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MhStr {
    pub ptr: *const u8,
    pub len: usize,
}

impl MhStr {
    pub const fn empty() -> Self {
        Self {
            ptr: core::ptr::null(),
            len: 0,
        }
    }

    /// Borrow `s` for the duration of a single FFI call.
    pub const fn borrowed(s: &str) -> Self {
        Self {
            ptr: s.as_ptr(),
            len: s.len(),
        }
    }

    pub const fn is_empty(&self) -> bool {
        self.ptr.is_null() || self.len == 0
    }
}

// Immutable byte view used across FFI boundaries. Callers are responsible for lifetime validity.
unsafe impl Send for MhStr {}
unsafe impl Sync for MhStr {}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MhStatus {
    /// 0 = OK, non-zero = error.
    pub code: i32,
    /// Optional error message (module-owned; free via `MhModuleVTable::free_str_utf8`).
    pub message: MhStr,
}

impl MhStatus {
    pub const fn ok() -> Self {
        Self {
            code: 0,
            message: MhStr::empty(),
        }
    }

    pub const fn is_ok(&self) -> bool {
        self.code == 0
    }
}

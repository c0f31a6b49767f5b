#![allow(clippy::missing_safety_doc)]

mod common;
mod module;

pub use common::*;
pub use module::*;

// Bump on any layout change of the vtables in `module.rs`.
pub const MODHOST_MODULE_API_VERSION: u32 = 1;
pub const MODHOST_MODULE_ENTRY_SYMBOL: &str = "modhost_module_entry";

// Status codes (non-exhaustive). Modules may use other non-zero codes, but the SDK uses these.
pub const MH_ERR_INVALID_ARG: i32 = 1;
pub const MH_ERR_UNSUPPORTED: i32 = 2;
pub const MH_ERR_NOT_FOUND: i32 = 3;
pub const MH_ERR_CONFLICT: i32 = 4;
pub const MH_ERR_INTERNAL: i32 = 5;

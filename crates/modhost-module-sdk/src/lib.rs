pub use modhost_module_api::*;

mod errors;
mod ffi_guard;
mod ffi_utils;
mod host;
mod macros;
mod module;

pub use errors::*;
pub use ffi_guard::*;
pub use ffi_utils::*;
pub use host::*;
pub use module::*;

use crate::{MhVersion, SdkResult};

/// Constructor arguments handed to [`Module::create`].
#[derive(Debug, Clone, Copy)]
pub struct ModuleCreateContext<'a> {
    /// Directory that holds the module library.
    pub module_path: &'a str,
    /// Host root directory shared by every module.
    pub root_path: &'a str,
    pub version: MhVersion,
    /// Host configuration as a JSON document (`"null"` when the host has none).
    pub config_json: &'a str,
    pub hot_reload: bool,
}

/// Lifecycle implemented by a module crate and exported with [`export_module!`](crate::export_module).
///
/// Call order: `create` → `init` → `post_init` → notifications → `shutdown` → drop.
pub trait Module: Sized + Send + 'static {
    const DISPLAY_NAME: &'static str;
    const DISPLAY_AUTHOR: &'static str = "";

    fn create(ctx: ModuleCreateContext<'_>) -> SdkResult<Self>;

    /// Returning `false` aborts the load; the instance is dropped without `shutdown`.
    fn init(&mut self) -> bool {
        true
    }

    /// Runs once the module is already `Running`. Errors are logged by the host and ignored.
    fn post_init(&mut self) -> SdkResult<()> {
        Ok(())
    }

    fn shutdown(&mut self) -> SdkResult<()> {
        Ok(())
    }

    fn on_all_modules_loaded(&mut self) {}

    fn on_library_connected(&mut self, _name: &str) {}

    fn on_library_disconnect(&mut self, _name: &str) {}
}

/// Export a [`Module`](crate::Module) implementation as a modhost module library.
///
/// Generates the module vtable and the `modhost_module_entry` factory symbol. The crate must be
/// built as a `cdylib`. Omitting `version` produces a library the host refuses to load.
///
/// ```ignore
/// modhost_module_sdk::export_module! {
///     module: Greeter,
///     version: (1, 2, 0),
/// }
/// ```
#[macro_export]
macro_rules! export_module {
    (
        module: $module_ty:ty
        $(, version: ($($ver:literal),+ $(,)?))?
        $(,)?
    ) => {
        #[doc(hidden)]
        mod __modhost_export {
            use super::*;

            type Instance = $module_ty;

            unsafe fn instance_mut<'a>(handle: *mut core::ffi::c_void) -> Option<&'a mut Instance> {
                if handle.is_null() {
                    return None;
                }
                // Safety: every handle the host passes back was produced by `create` below.
                Some(unsafe { &mut *(handle as *mut Instance) })
            }

            fn name_arg(name: &$crate::MhStr) -> &str {
                unsafe { $crate::mhstr_to_str(name) }.unwrap_or("")
            }

            extern "C" fn create(
                args: *const $crate::MhModuleCreateArgs,
                out: *mut *mut core::ffi::c_void,
            ) -> $crate::MhStatus {
                $crate::guard_status("create", || {
                    if args.is_null() || out.is_null() {
                        return $crate::status_err_msg($crate::MH_ERR_INVALID_ARG, "null create args");
                    }
                    let args = unsafe { &*args };
                    let module_path = match unsafe { $crate::mhstr_to_str(&args.module_path_utf8) } {
                        Ok(s) => s,
                        Err(e) => return $crate::status_err_msg($crate::MH_ERR_INVALID_ARG, e),
                    };
                    let root_path = match unsafe { $crate::mhstr_to_str(&args.root_path_utf8) } {
                        Ok(s) => s,
                        Err(e) => return $crate::status_err_msg($crate::MH_ERR_INVALID_ARG, e),
                    };
                    let config_json = match unsafe { $crate::mhstr_to_str(&args.config_json_utf8) } {
                        Ok(s) => s,
                        Err(e) => return $crate::status_err_msg($crate::MH_ERR_INVALID_ARG, e),
                    };
                    if let Err(e) = unsafe { $crate::__set_host_vtable(args.host) } {
                        return $crate::status_err_msg($crate::MH_ERR_INVALID_ARG, e.to_string());
                    }
                    let ctx = $crate::ModuleCreateContext {
                        module_path,
                        root_path,
                        version: args.version,
                        config_json,
                        hot_reload: args.hot_reload,
                    };
                    match <Instance as $crate::Module>::create(ctx) {
                        Ok(instance) => {
                            let boxed = Box::new(instance);
                            unsafe { *out = Box::into_raw(boxed) as *mut core::ffi::c_void };
                            $crate::status_ok()
                        },
                        Err(e) => {
                            $crate::__clear_host_vtable();
                            $crate::status_err_msg($crate::MH_ERR_INTERNAL, e.to_string())
                        },
                    }
                })
            }

            extern "C" fn destroy(handle: *mut core::ffi::c_void) {
                $crate::guard_void("destroy", || {
                    if handle.is_null() {
                        return;
                    }
                    unsafe { drop(Box::from_raw(handle as *mut Instance)) };
                });
                $crate::__clear_host_vtable();
            }

            extern "C" fn display_name_utf8(_handle: *mut core::ffi::c_void) -> $crate::MhStr {
                $crate::mhstr(<Instance as $crate::Module>::DISPLAY_NAME)
            }

            extern "C" fn display_author_utf8(_handle: *mut core::ffi::c_void) -> $crate::MhStr {
                $crate::mhstr(<Instance as $crate::Module>::DISPLAY_AUTHOR)
            }

            extern "C" fn init(handle: *mut core::ffi::c_void) -> bool {
                $crate::guard_with_default("init", false, || match unsafe { instance_mut(handle) } {
                    Some(instance) => <Instance as $crate::Module>::init(instance),
                    None => false,
                })
            }

            extern "C" fn post_init(handle: *mut core::ffi::c_void) -> $crate::MhStatus {
                $crate::guard_status("post_init", || {
                    let Some(instance) = (unsafe { instance_mut(handle) }) else {
                        return $crate::status_err_msg($crate::MH_ERR_INVALID_ARG, "null handle");
                    };
                    match <Instance as $crate::Module>::post_init(instance) {
                        Ok(()) => $crate::status_ok(),
                        Err(e) => $crate::status_err_msg($crate::MH_ERR_INTERNAL, e.to_string()),
                    }
                })
            }

            extern "C" fn shutdown(handle: *mut core::ffi::c_void) -> $crate::MhStatus {
                $crate::guard_status("shutdown", || {
                    let Some(instance) = (unsafe { instance_mut(handle) }) else {
                        return $crate::status_err_msg($crate::MH_ERR_INVALID_ARG, "null handle");
                    };
                    match <Instance as $crate::Module>::shutdown(instance) {
                        Ok(()) => $crate::status_ok(),
                        Err(e) => $crate::status_err_msg($crate::MH_ERR_INTERNAL, e.to_string()),
                    }
                })
            }

            extern "C" fn on_all_modules_loaded(handle: *mut core::ffi::c_void) {
                $crate::guard_void("on_all_modules_loaded", || {
                    if let Some(instance) = unsafe { instance_mut(handle) } {
                        <Instance as $crate::Module>::on_all_modules_loaded(instance);
                    }
                });
            }

            extern "C" fn on_library_connected(handle: *mut core::ffi::c_void, name: $crate::MhStr) {
                $crate::guard_void("on_library_connected", || {
                    if let Some(instance) = unsafe { instance_mut(handle) } {
                        <Instance as $crate::Module>::on_library_connected(instance, name_arg(&name));
                    }
                });
            }

            extern "C" fn on_library_disconnect(handle: *mut core::ffi::c_void, name: $crate::MhStr) {
                $crate::guard_void("on_library_disconnect", || {
                    if let Some(instance) = unsafe { instance_mut(handle) } {
                        <Instance as $crate::Module>::on_library_disconnect(instance, name_arg(&name));
                    }
                });
            }

            pub static VTABLE: $crate::MhModuleVTable = $crate::MhModuleVTable {
                api_version: $crate::MODHOST_MODULE_API_VERSION,
                module_version: $crate::__mh_opt_version!($($($ver),+)?),
                free_str_utf8: Some($crate::free_utf8_bytes),
                create,
                destroy,
                display_name_utf8,
                display_author_utf8,
                init,
                post_init,
                shutdown,
                on_all_modules_loaded,
                on_library_connected,
                on_library_disconnect,
            };
        }

        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn modhost_module_entry() -> *const $crate::MhModuleVTable {
            &__modhost_export::VTABLE
        }
    };
}

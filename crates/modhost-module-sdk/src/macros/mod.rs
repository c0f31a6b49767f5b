mod export_module;

#[macro_export]
macro_rules! host_log {
    ($lvl:expr, $($arg:tt)*) => {{
        $crate::host_log($lvl, &format!($($arg)*));
    }};
}

#[doc(hidden)]
#[macro_export]
macro_rules! __mh_opt_version {
    () => {
        None
    };
    ($vmaj:literal, $vmin:literal, $vpatch:literal) => {
        $crate::__mh_opt_version!($vmaj, $vmin, $vpatch, 0)
    };
    ($vmaj:literal, $vmin:literal, $vpatch:literal, $vbuild:literal) => {{
        extern "C" fn module_version() -> $crate::MhVersion {
            $crate::MhVersion {
                major: $vmaj,
                minor: $vmin,
                patch: $vpatch,
                build: $vbuild,
            }
        }
        Some(module_version as extern "C" fn() -> $crate::MhVersion)
    }};
}

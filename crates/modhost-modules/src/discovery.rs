use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::dynamic_library_ext;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredModule {
    pub name: String,
    pub module_dir: PathBuf,
    pub library_path: PathBuf,
}

/// Library file names a module directory named `name` may hold, in preference order.
pub fn library_file_names(name: &str) -> Vec<String> {
    let ext = dynamic_library_ext();
    let mut names = vec![format!("{name}.{ext}")];
    if cfg!(unix) {
        names.push(format!("lib{name}.{ext}"));
    }
    names
}

/// Find `<root>/<name>/<name>.<ext>` libraries, sorted by module name.
pub fn discover_modules(root: impl AsRef<Path>) -> Result<Vec<DiscoveredModule>> {
    let root = root.as_ref();
    if !root.exists() {
        debug!(root = %root.display(), "modules directory does not exist");
        return Ok(Vec::new());
    }

    let mut out = Vec::new();
    for entry in walkdir::WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_dir() {
            continue;
        }
        let module_dir = entry.path().to_path_buf();
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            warn!(dir = %module_dir.display(), "skip module directory with non utf-8 name");
            continue;
        };
        let library_path = library_file_names(&name)
            .into_iter()
            .map(|file_name| module_dir.join(file_name))
            .find(|candidate| candidate.is_file());
        let Some(library_path) = library_path else {
            debug!(dir = %module_dir.display(), "skip directory without module library");
            continue;
        };
        out.push(DiscoveredModule {
            name,
            module_dir,
            library_path,
        });
    }

    out.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(out)
}

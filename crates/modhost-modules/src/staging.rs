use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Error, Result};

pub const RELOAD_STAGING_DIR_NAME: &str = "reload";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagingReport {
    pub staging_dir: Option<PathBuf>,
    /// Live paths that were overwritten, in application order.
    pub applied: Vec<PathBuf>,
    pub staging_dir_removed: bool,
}

/// Staged update payload of one module directory.
#[derive(Debug, Clone)]
pub struct UpdateStaging {
    module: String,
    module_dir: PathBuf,
}

impl UpdateStaging {
    pub fn new(module: impl Into<String>, module_dir: impl Into<PathBuf>) -> Self {
        Self {
            module: module.into(),
            module_dir: module_dir.into(),
        }
    }

    pub fn module_dir(&self) -> &Path {
        &self.module_dir
    }

    /// `<moduleDir>/<baseName>/` when present, otherwise `<moduleDir>/reload/` when present.
    pub fn staging_dir(&self) -> Option<PathBuf> {
        let same_name = self
            .module_dir
            .file_name()
            .map(|base| self.module_dir.join(base));
        same_name
            .into_iter()
            .chain(std::iter::once(self.module_dir.join(RELOAD_STAGING_DIR_NAME)))
            .find(|candidate| candidate.is_dir())
    }

    /// Regular files waiting in the staging directory, sorted.
    pub fn pending_files(&self) -> Vec<PathBuf> {
        self.staging_dir()
            .and_then(|dir| self.read_pending(&dir).ok())
            .unwrap_or_default()
    }

    pub fn is_update_needed(&self) -> bool {
        !self.pending_files().is_empty()
    }

    /// Copy every staged file over its live counterpart, deleting each staged copy after it lands,
    /// then remove the emptied staging directory.
    ///
    /// Stops at the first failure, cleanup included. Files applied before that stay applied.
    pub fn apply(&self) -> Result<StagingReport> {
        let Some(dir) = self.staging_dir() else {
            return Ok(StagingReport::default());
        };
        let pending = self.read_pending(&dir)?;
        let mut report = StagingReport {
            staging_dir: Some(dir.clone()),
            ..StagingReport::default()
        };
        if pending.is_empty() {
            debug!(
                module = %self.module,
                dir = %dir.display(),
                "staging directory holds no files"
            );
            return Ok(report);
        }

        for staged in pending {
            let Some(file_name) = staged.file_name() else {
                continue;
            };
            let live = self.module_dir.join(file_name);
            std::fs::copy(&staged, &live).map_err(|source| self.staging_error(&staged, source))?;
            std::fs::remove_file(&staged).map_err(|source| self.staging_error(&staged, source))?;
            debug!(module = %self.module, file = %live.display(), "applied staged file");
            report.applied.push(live);
        }

        std::fs::remove_dir(&dir).map_err(|source| self.staging_error(&dir, source))?;
        report.staging_dir_removed = true;
        info!(
            module = %self.module,
            files = report.applied.len(),
            "staged update applied"
        );
        Ok(report)
    }

    fn read_pending(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let entries = std::fs::read_dir(dir).map_err(|source| self.staging_error(dir, source))?;
        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| self.staging_error(dir, source))?;
            let path = entry.path();
            let file_type = entry
                .file_type()
                .map_err(|source| self.staging_error(&path, source))?;
            if file_type.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    fn staging_error(&self, path: &Path, source: std::io::Error) -> Error {
        Error::Staging {
            module: self.module.clone(),
            path: path.to_path_buf(),
            source,
        }
    }
}

#[cfg(test)]
#[path = "tests/staging_tests.rs"]
mod tests;

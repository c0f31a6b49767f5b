use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{Error, Result};

pub const DEFAULT_LOCK_PREFIX: &str = "modhost_";
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Upper-case hex SHA-256 of `raw`, used as the system-wide lock key.
pub fn derive_key(raw: &str) -> String {
    hex::encode_upper(Sha256::digest(raw.as_bytes()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockStrategy {
    /// `Global\<prefix><key>` kernel mutex. Windows only.
    NamedMutex,
    /// Exclusively locked `<dir>/<prefix><key>.lock`, removed on release.
    FileLock,
}

impl Default for LockStrategy {
    fn default() -> Self {
        if cfg!(windows) {
            Self::NamedMutex
        } else {
            Self::FileLock
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockOptions {
    pub prefix: String,
    pub strategy: LockStrategy,
    /// Keep polling a contended lock until this much time has passed.
    pub wait: Option<Duration>,
    pub dir: PathBuf,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_LOCK_PREFIX.to_string(),
            strategy: LockStrategy::default(),
            wait: None,
            dir: std::env::temp_dir(),
        }
    }
}

impl LockOptions {
    pub fn lock_file_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}{key}.lock", self.prefix))
    }
}

enum LockGuard {
    File(FileGuard),
    #[cfg(windows)]
    Mutex(windows_mutex::MutexGuard),
}

impl LockGuard {
    fn release(self) {
        match self {
            Self::File(guard) => guard.release(),
            #[cfg(windows)]
            Self::Mutex(guard) => guard.release(),
        }
    }
}

/// Cross-process exclusion token for one key.
///
/// Contention is not an error: [`ProcessLock::is_acquired`] reports whether this handle owns the
/// key. Crashed holders are reclaimed by the OS.
pub struct ProcessLock {
    key: String,
    guard: Option<LockGuard>,
}

impl ProcessLock {
    pub fn create_by_raw(raw: &str, options: &LockOptions) -> Result<Self> {
        Self::create(&derive_key(raw), options)
    }

    pub fn create(key: &str, options: &LockOptions) -> Result<Self> {
        let deadline = options.wait.map(|wait| Instant::now() + wait);
        loop {
            if let Some(guard) = try_acquire(key, options)? {
                return Ok(Self {
                    key: key.to_string(),
                    guard: Some(guard),
                });
            }
            match deadline {
                Some(deadline) if Instant::now() < deadline => {
                    std::thread::sleep(WAIT_POLL_INTERVAL);
                },
                _ => {
                    debug!(key, strategy = ?options.strategy, "process lock is held elsewhere");
                    return Ok(Self {
                        key: key.to_string(),
                        guard: None,
                    });
                },
            }
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn is_acquired(&self) -> bool {
        self.guard.is_some()
    }

    /// Give the key back. Calling this more than once does nothing.
    pub fn release(&mut self) {
        if let Some(guard) = self.guard.take() {
            guard.release();
        }
    }
}

impl Drop for ProcessLock {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for ProcessLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessLock")
            .field("key", &self.key)
            .field("acquired", &self.is_acquired())
            .finish()
    }
}

fn try_acquire(key: &str, options: &LockOptions) -> Result<Option<LockGuard>> {
    match options.strategy {
        LockStrategy::FileLock => {
            let path = options.lock_file_path(key);
            Ok(FileGuard::try_acquire(&path)?.map(LockGuard::File))
        },
        #[cfg(windows)]
        LockStrategy::NamedMutex => {
            let name = format!("Global\\{}{key}", options.prefix);
            Ok(windows_mutex::MutexGuard::try_acquire(&name)?.map(LockGuard::Mutex))
        },
        #[cfg(not(windows))]
        LockStrategy::NamedMutex => Err(Error::lock(
            "named mutex strategy is only available on windows",
        )),
    }
}

struct FileGuard {
    file: File,
    path: PathBuf,
}

impl FileGuard {
    #[cfg(unix)]
    fn try_acquire(path: &Path) -> Result<Option<Self>> {
        use std::fs::TryLockError;

        loop {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(path)
                .map_err(|e| Error::lock(format!("open `{}`: {e}", path.display())))?;
            match file.try_lock() {
                Ok(()) => {},
                Err(TryLockError::WouldBlock) => return Ok(None),
                Err(TryLockError::Error(e)) => {
                    return Err(Error::lock(format!("lock `{}`: {e}", path.display())));
                },
            }
            // A releasing holder unlinks before closing; make sure we did not lock an orphan.
            if names_same_inode(&file, path) {
                return Ok(Some(Self {
                    file,
                    path: path.to_path_buf(),
                }));
            }
        }
    }

    #[cfg(windows)]
    fn try_acquire(path: &Path) -> Result<Option<Self>> {
        use std::os::windows::fs::OpenOptionsExt;

        const GENERIC_READ: u32 = 0x8000_0000;
        const GENERIC_WRITE: u32 = 0x4000_0000;
        const DELETE: u32 = 0x0001_0000;
        const FILE_FLAG_DELETE_ON_CLOSE: u32 = 0x0400_0000;
        const ERROR_ACCESS_DENIED: i32 = 5;
        const ERROR_SHARING_VIOLATION: i32 = 32;

        let opened = OpenOptions::new()
            .access_mode(GENERIC_READ | GENERIC_WRITE | DELETE)
            .share_mode(0)
            .create(true)
            .truncate(false)
            .custom_flags(FILE_FLAG_DELETE_ON_CLOSE)
            .open(path);
        match opened {
            Ok(file) => Ok(Some(Self {
                file,
                path: path.to_path_buf(),
            })),
            Err(e)
                if matches!(
                    e.raw_os_error(),
                    Some(ERROR_SHARING_VIOLATION | ERROR_ACCESS_DENIED)
                ) && path.parent().is_some_and(Path::is_dir) =>
            {
                Ok(None)
            },
            Err(e) => Err(Error::lock(format!("open `{}`: {e}", path.display()))),
        }
    }

    fn release(self) {
        #[cfg(unix)]
        if let Err(e) = std::fs::remove_file(&self.path) {
            debug!(path = %self.path.display(), "remove lock file failed: {e}");
        }
        #[cfg(not(unix))]
        debug!(path = %self.path.display(), "closing delete-on-close lock file");
        drop(self.file);
    }
}

#[cfg(unix)]
fn names_same_inode(file: &File, path: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;

    let (Ok(held), Ok(named)) = (file.metadata(), std::fs::metadata(path)) else {
        return false;
    };
    held.dev() == named.dev() && held.ino() == named.ino()
}

#[cfg(windows)]
mod windows_mutex {
    use tracing::debug;
    use windows::Win32::Foundation::{BOOL, CloseHandle, ERROR_ALREADY_EXISTS, GetLastError, HANDLE};
    use windows::Win32::System::Threading::{CreateMutexW, ReleaseMutex};
    use windows::core::HSTRING;

    use crate::error::{Error, Result};

    pub(super) struct MutexGuard {
        handle: HANDLE,
        name: String,
    }

    // The handle is only released through `release`, which tolerates being called off-thread.
    unsafe impl Send for MutexGuard {}

    impl MutexGuard {
        pub(super) fn try_acquire(name: &str) -> Result<Option<Self>> {
            let wide = HSTRING::from(name);
            // SAFETY: plain Win32 call with an owned, NUL-terminated name.
            let handle = unsafe { CreateMutexW(None, BOOL::from(true), &wide) }
                .map_err(|e| Error::lock(format!("create mutex `{name}`: {e}")))?;
            if unsafe { GetLastError() } == ERROR_ALREADY_EXISTS {
                let _ = unsafe { CloseHandle(handle) };
                return Ok(None);
            }
            Ok(Some(Self {
                handle,
                name: name.to_string(),
            }))
        }

        pub(super) fn release(self) {
            // SAFETY: `handle` came from `CreateMutexW` and is closed exactly once here.
            if let Err(e) = unsafe { ReleaseMutex(self.handle) } {
                debug!(name = %self.name, "release mutex failed: {e}");
            }
            if let Err(e) = unsafe { CloseHandle(self.handle) } {
                debug!(name = %self.name, "close mutex failed: {e}");
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/process_lock_tests.rs"]
mod tests;

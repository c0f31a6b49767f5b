use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("module `{module}` is already loaded elsewhere (lock key {key})")]
    Contention { module: String, key: String },
    #[error("module `{module}` failed to apply staged update at `{path}`: {source}")]
    Staging {
        module: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("module `{module}` library `{path}` could not be loaded: {details}")]
    Library {
        module: String,
        path: PathBuf,
        details: String,
    },
    #[error("module `{module}` has no usable entry point: {details}")]
    EntryPoint { module: String, details: String },
    #[error("module `{module}` does not declare a version")]
    MissingVersion { module: String },
    #[error("module `{module}` construction failed: {details}")]
    Construction { module: String, details: String },
    #[error("module `{module}` rejected init")]
    InitRejected { module: String },
    #[error("module `{module}` failed to unload: {details}")]
    Teardown { module: String, details: String },
    #[error("module `{module}` lock must be released from the thread that created it")]
    ThreadAffinity { module: String },
    #[error("process lock failed: {details}")]
    Lock { details: String },
    #[error("not found: {resource} `{id}`")]
    NotFound { resource: &'static str, id: String },
    #[error("conflict: {resource} `{id}`")]
    Conflict { resource: &'static str, id: String },
    #[error("invalid configuration: {message}")]
    Config { message: String },
    #[error("io failed at `{path}`: {source}")]
    IoAt {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("json failed at `{path}`: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl Error {
    pub fn module_name(&self) -> Option<&str> {
        match self {
            Self::Contention { module, .. }
            | Self::Staging { module, .. }
            | Self::Library { module, .. }
            | Self::EntryPoint { module, .. }
            | Self::MissingVersion { module }
            | Self::Construction { module, .. }
            | Self::InitRejected { module }
            | Self::Teardown { module, .. }
            | Self::ThreadAffinity { module } => Some(module),
            _ => None,
        }
    }

    pub fn lock(details: impl Into<String>) -> Self {
        Self::Lock {
            details: details.into(),
        }
    }

    pub fn not_found(resource: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource,
            id: id.into(),
        }
    }

    pub fn conflict(resource: &'static str, id: impl Into<String>) -> Self {
        Self::Conflict {
            resource,
            id: id.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn io_at(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::IoAt {
            path: path.into(),
            source,
        }
    }

    pub fn json_at(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            source,
        }
    }
}

//! Error types of the game server.

use std::io;
use std::path::PathBuf;

/// Failure of a single client sub-request.
///
/// The `Display` text is what the client sees in the response error list.
/// [`RequestError::Internal`] keeps its detail for the server log only.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RequestError {
    #[error("{0}")]
    Auth(String),
    #[error("{0}")]
    NotFound(String),
    #[error("item not found: {id} {serial}")]
    ItemNotFound { id: String, serial: String },
    #[error("object not controlled: {id} {serial}")]
    Permission { id: String, serial: String },
    #[error("objects are not in the minimal range")]
    Range,
    #[error("{0}")]
    CapabilityMismatch(String),
    #[error("{0}")]
    EquipSlot(String),
    #[error("invalid request syntax")]
    Syntax,
    /// Well-formed request with an unusable value.
    #[error("{0}")]
    InvalidArgument(String),
    #[error("internal server error")]
    Internal(String),
}

impl RequestError {
    pub fn not_found(what: &str, id: &str, serial: &str) -> Self {
        RequestError::NotFound(format!("{} not found: {} {}", what, id, serial))
    }

    pub fn permission(id: &str, serial: &str) -> Self {
        RequestError::Permission {
            id: id.to_string(),
            serial: serial.to_string(),
        }
    }

    pub fn capability(what: &str, id: &str, serial: &str) -> Self {
        RequestError::CapabilityMismatch(format!("object is not {}: {} {}", what, id, serial))
    }

    pub fn item_not_found(id: &str, serial: &str) -> Self {
        RequestError::ItemNotFound {
            id: id.to_string(),
            serial: serial.to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write config {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum UserStoreError {
    #[error("unable to read users dir {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("unable to read user file {path}: {source}")]
    ReadUser {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("unable to save user {id}: {source}")]
    Write {
        id: String,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    #[error("no game module configured")]
    NoModule,
    #[error("unable to read module {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("unable to write module {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid module data {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("unable to encode module: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("start area not found: {0}")]
    StartAreaNotFound(String),
    #[error("chapter not found: {0}")]
    ChapterNotFound(String),
    #[error("invalid character: {0}")]
    InvalidCharacter(String),
}

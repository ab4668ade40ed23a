use std::fmt;

use triptych_object::ConfigError;

/// Errors from the shared runtime's registry and bootstrap plumbing.
#[derive(Debug)]
pub enum RuntimeError {
    /// An object with this id is already registered.
    DuplicateObject { id: String },
    /// No object with this id is registered.
    UnknownObject { id: String },
    /// A worker with this name is already attached.
    DuplicateWorker { name: String },
    /// The operation is only available on the host side.
    HostOnly { operation: &'static str },
    /// The object or schema configuration is invalid.
    Config(ConfigError),
    /// The bootstrap handshake could not complete.
    Handshake(String),
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::DuplicateObject { id } => {
                write!(f, "shared object `{id}` already exists")
            }
            RuntimeError::UnknownObject { id } => {
                write!(f, "unknown shared object `{id}`")
            }
            RuntimeError::DuplicateWorker { name } => {
                write!(f, "worker `{name}` is already attached")
            }
            RuntimeError::HostOnly { operation } => {
                write!(f, "`{operation}` is only available on the host runtime")
            }
            RuntimeError::Config(e) => write!(f, "configuration error: {e}"),
            RuntimeError::Handshake(reason) => write!(f, "handshake failed: {reason}"),
        }
    }
}

impl std::error::Error for RuntimeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RuntimeError::Config(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for RuntimeError {
    fn from(e: ConfigError) -> Self {
        RuntimeError::Config(e)
    }
}

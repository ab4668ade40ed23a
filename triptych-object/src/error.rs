use std::fmt;

use triptych_schema::{SchemaError, SchemaTypeError};

/// An object that cannot be created as configured.
#[derive(Debug)]
pub enum ConfigError {
    /// `byte_length` must be positive.
    ZeroByteLength,
    /// The schema could not be laid out.
    Schema(SchemaError),
    /// A schema's computed byte length disagrees with the object it is being
    /// attached to.
    SizeMismatch { object: usize, layout: usize },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroByteLength => write!(f, "byte length must be positive"),
            ConfigError::Schema(e) => write!(f, "invalid schema: {e}"),
            ConfigError::SizeMismatch { object, layout } => {
                write!(
                    f,
                    "layout is {layout} bytes but the object holds {object}-byte records"
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Schema(e) => Some(e),
            _ => None,
        }
    }
}

impl From<SchemaError> for ConfigError {
    fn from(e: SchemaError) -> Self {
        ConfigError::Schema(e)
    }
}

/// A write that could not be carried out.
#[derive(Debug)]
pub enum WriteError {
    /// The object's writer died while holding the lock; the object is
    /// permanently unusable for writes.
    Poisoned,
    /// The calling thread already holds this object's write lock.
    Reentrant,
    /// A typed field value did not fit its declared field; nothing was
    /// written.
    Schema(SchemaTypeError),
    /// The write callback failed; the write was aborted and nothing was
    /// published.
    Callback(Box<dyn std::error::Error + Send + Sync>),
}

impl WriteError {
    /// True for [`WriteError::Poisoned`].
    pub fn is_poisoned(&self) -> bool {
        matches!(self, WriteError::Poisoned)
    }
}

impl fmt::Display for WriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteError::Poisoned => write!(f, "object is poisoned: its writer died"),
            WriteError::Reentrant => {
                write!(f, "this thread already holds the write lock")
            }
            WriteError::Schema(e) => write!(f, "schema type error: {e}"),
            WriteError::Callback(e) => write!(f, "write callback failed: {e}"),
        }
    }
}

impl std::error::Error for WriteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WriteError::Schema(e) => Some(e),
            WriteError::Callback(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<SchemaTypeError> for WriteError {
    fn from(e: SchemaTypeError) -> Self {
        WriteError::Schema(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_mentions_the_cause() {
        assert!(WriteError::Poisoned.to_string().contains("poisoned"));
        assert!(WriteError::Reentrant.to_string().contains("write lock"));
        assert!(
            ConfigError::SizeMismatch {
                object: 8,
                layout: 12
            }
            .to_string()
            .contains("12")
        );
    }
}

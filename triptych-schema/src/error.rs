use std::fmt;

/// A schema that cannot be laid out.
///
/// These are caller bugs, raised by [`Layout::compile`](crate::Layout::compile)
/// before any buffer is touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// The schema (or a nested schema) declares no fields.
    Empty,
    /// A field name is the empty string.
    EmptyFieldName { index: usize },
    /// Two fields share a name.
    DuplicateField { field: String },
    /// An array field declares zero elements.
    ZeroArrayLength { field: String },
    /// A UTF-8 field declares a zero-byte capacity.
    ZeroCapacity { field: String },
    /// An RGBA8 field declares zero pixels.
    ZeroPixelCount { field: String },
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaError::Empty => write!(f, "schema declares no fields"),
            SchemaError::EmptyFieldName { index } => {
                write!(f, "field at index {index} has an empty name")
            }
            SchemaError::DuplicateField { field } => {
                write!(f, "duplicate field name `{field}`")
            }
            SchemaError::ZeroArrayLength { field } => {
                write!(f, "array field `{field}` declares zero elements")
            }
            SchemaError::ZeroCapacity { field } => {
                write!(f, "utf8 field `{field}` declares a zero-byte capacity")
            }
            SchemaError::ZeroPixelCount { field } => {
                write!(f, "rgba8 field `{field}` declares zero pixels")
            }
        }
    }
}

impl std::error::Error for SchemaError {}

/// A runtime value that does not fit its declared field.
///
/// Raised by [`write_fields`](crate::write_fields) during validation; the
/// buffer is never mutated when any field fails.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaTypeError {
    /// The value names a field the layout does not have.
    UnknownField { field: String },
    /// The value's kind does not match the field's kind.
    WrongKind {
        field: String,
        expected: &'static str,
        got: &'static str,
    },
    /// An array value has the wrong element count.
    LengthMismatch {
        field: String,
        expected: usize,
        got: usize,
    },
    /// A string's UTF-8 encoding exceeds the field's byte capacity.
    StringTooLong {
        field: String,
        capacity: usize,
        len: usize,
    },
}

impl fmt::Display for SchemaTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaTypeError::UnknownField { field } => {
                write!(f, "unknown field `{field}`")
            }
            SchemaTypeError::WrongKind {
                field,
                expected,
                got,
            } => {
                write!(f, "field `{field}` expects {expected}, got {got}")
            }
            SchemaTypeError::LengthMismatch {
                field,
                expected,
                got,
            } => {
                write!(
                    f,
                    "length mismatch for field `{field}`: expected {expected} elements, got {got}"
                )
            }
            SchemaTypeError::StringTooLong {
                field,
                capacity,
                len,
            } => {
                write!(
                    f,
                    "string for field `{field}` is {len} bytes, capacity is {capacity}"
                )
            }
        }
    }
}

impl std::error::Error for SchemaTypeError {}

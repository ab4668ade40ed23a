//! Schema-driven binary layouts.
//!
//! A [`Schema`] declares named fields (scalars, fixed-length arrays, UTF-8
//! strings, RGBA8 pixel buffers, nested schemas). [`Layout::compile`] turns it
//! into fixed byte offsets with natural alignment, and [`read_snapshot`] /
//! [`write_fields`] move typed [`Values`] in and out of a byte buffer.
//!
//! All multi-byte scalars are stored little-endian, unconditionally, so a
//! buffer written on one thread decodes identically anywhere the bytes end
//! up.

#[macro_use]
mod macros;

mod error;
mod layout;
mod schema;
mod value;

pub use error::{SchemaError, SchemaTypeError};
pub use layout::{FieldLayout, FieldShape, Layout};
pub use schema::{FieldKind, ScalarType, Schema};
pub use value::{Scalar, ScalarArray, Value, Values, read_snapshot, write_fields};

#[cfg(test)]
mod proptests;

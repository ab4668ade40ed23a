use std::fmt;

/// Element type of a scalar or array field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScalarType {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    F32,
    F64,
}

impl ScalarType {
    /// Size of one element in bytes. Alignment is the same: elements are
    /// naturally aligned.
    #[inline]
    pub const fn size(self) -> usize {
        match self {
            ScalarType::I8 | ScalarType::U8 => 1,
            ScalarType::I16 | ScalarType::U16 => 2,
            ScalarType::I32 | ScalarType::U32 | ScalarType::F32 => 4,
            ScalarType::F64 => 8,
        }
    }

    /// Short lowercase name, as used in error messages.
    pub const fn name(self) -> &'static str {
        match self {
            ScalarType::I8 => "i8",
            ScalarType::U8 => "u8",
            ScalarType::I16 => "i16",
            ScalarType::U16 => "u16",
            ScalarType::I32 => "i32",
            ScalarType::U32 => "u32",
            ScalarType::F32 => "f32",
            ScalarType::F64 => "f64",
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The kind of a declared field.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldKind {
    /// A single naturally-aligned scalar.
    Scalar(ScalarType),
    /// A fixed-length array of scalars, aligned to the element size.
    Array(ScalarType, usize),
    /// A fixed-capacity UTF-8 string: zero-padded, NUL-terminated within
    /// capacity. The capacity is a byte budget, not a character count.
    Utf8(usize),
    /// A fixed-length RGBA8 pixel buffer: exactly `4 × pixels` bytes,
    /// alignment 1.
    Rgba8(usize),
    /// A nested schema, laid out recursively.
    Nested(Schema),
}

/// An ordered, named field list. Declaration order is layout order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Schema {
    fields: Vec<(String, FieldKind)>,
}

impl Schema {
    /// An empty schema. Add fields with [`field`](Self::field); compiling an
    /// empty schema is an error.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field, preserving declaration order.
    pub fn field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push((name.into(), kind));
        self
    }

    /// Declared fields in order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldKind)> {
        self.fields.iter().map(|(name, kind)| (name.as_str(), kind))
    }

    /// Number of declared fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True if no fields are declared.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_sizes() {
        assert_eq!(ScalarType::I8.size(), 1);
        assert_eq!(ScalarType::U16.size(), 2);
        assert_eq!(ScalarType::F32.size(), 4);
        assert_eq!(ScalarType::F64.size(), 8);
    }

    #[test]
    fn declaration_order_is_preserved() {
        let schema = Schema::new()
            .field("b", FieldKind::Scalar(ScalarType::U8))
            .field("a", FieldKind::Scalar(ScalarType::U8));

        let names: Vec<_> = schema.fields().map(|(name, _)| name).collect();
        assert_eq!(names, ["b", "a"]);
    }
}

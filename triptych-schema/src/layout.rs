use std::collections::HashSet;

use crate::error::SchemaError;
use crate::schema::{FieldKind, ScalarType, Schema};

/// The shape of a compiled field: [`FieldKind`] with nested schemas replaced
/// by their compiled layouts.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldShape {
    Scalar(ScalarType),
    Array(ScalarType, usize),
    Utf8(usize),
    Rgba8(usize),
    Nested(Layout),
}

impl FieldShape {
    /// Size of the field in bytes.
    pub fn byte_length(&self) -> usize {
        match self {
            FieldShape::Scalar(ty) => ty.size(),
            FieldShape::Array(ty, count) => ty.size() * count,
            FieldShape::Utf8(capacity) => *capacity,
            FieldShape::Rgba8(pixels) => 4 * pixels,
            FieldShape::Nested(layout) => layout.byte_length(),
        }
    }

    /// Alignment of the field. Scalars and array elements align to their own
    /// size; UTF-8 and RGBA8 fields align to 1; nested schemas align to the
    /// largest alignment of any field within.
    pub fn align(&self) -> usize {
        match self {
            FieldShape::Scalar(ty) | FieldShape::Array(ty, _) => ty.size(),
            FieldShape::Utf8(_) | FieldShape::Rgba8(_) => 1,
            FieldShape::Nested(layout) => layout.align(),
        }
    }
}

/// A compiled field: byte offset plus shape.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldLayout {
    offset: usize,
    shape: FieldShape,
}

impl FieldLayout {
    /// Byte offset of the field from the start of its record (or of its
    /// enclosing nested field).
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Shape of the field.
    #[inline]
    pub fn shape(&self) -> &FieldShape {
        &self.shape
    }
}

/// A compiled layout: per-field offsets plus the total record size.
///
/// Computed once per schema at registration time; field order is the schema's
/// declaration order. The total length is the offset after the last field,
/// without trailing padding.
#[derive(Clone, Debug, PartialEq)]
pub struct Layout {
    fields: Vec<(String, FieldLayout)>,
    byte_length: usize,
    align: usize,
}

impl Layout {
    /// Compile a schema into fixed offsets.
    pub fn compile(schema: &Schema) -> Result<Layout, SchemaError> {
        if schema.is_empty() {
            return Err(SchemaError::Empty);
        }

        let mut fields = Vec::with_capacity(schema.len());
        let mut seen = HashSet::new();
        let mut cursor = 0usize;
        let mut align = 1usize;

        for (index, (name, kind)) in schema.fields().enumerate() {
            if name.is_empty() {
                return Err(SchemaError::EmptyFieldName { index });
            }
            if !seen.insert(name.to_string()) {
                return Err(SchemaError::DuplicateField {
                    field: name.to_string(),
                });
            }

            let shape = compile_kind(name, kind)?;
            let field_align = shape.align();
            let offset = align_up(cursor, field_align);
            cursor = offset + shape.byte_length();
            align = align.max(field_align);
            fields.push((name.to_string(), FieldLayout { offset, shape }));
        }

        Ok(Layout {
            fields,
            byte_length: cursor,
            align,
        })
    }

    /// Total record size in bytes.
    #[inline]
    pub fn byte_length(&self) -> usize {
        self.byte_length
    }

    /// Largest alignment of any field.
    #[inline]
    pub fn align(&self) -> usize {
        self.align
    }

    /// Compiled fields in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldLayout)> {
        self.fields
            .iter()
            .map(|(name, layout)| (name.as_str(), layout))
    }

    /// Look up a field by name.
    pub fn get(&self, name: &str) -> Option<&FieldLayout> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, layout)| layout)
    }
}

fn compile_kind(name: &str, kind: &FieldKind) -> Result<FieldShape, SchemaError> {
    match kind {
        FieldKind::Scalar(ty) => Ok(FieldShape::Scalar(*ty)),
        FieldKind::Array(ty, count) => {
            if *count == 0 {
                return Err(SchemaError::ZeroArrayLength {
                    field: name.to_string(),
                });
            }
            Ok(FieldShape::Array(*ty, *count))
        }
        FieldKind::Utf8(capacity) => {
            if *capacity == 0 {
                return Err(SchemaError::ZeroCapacity {
                    field: name.to_string(),
                });
            }
            Ok(FieldShape::Utf8(*capacity))
        }
        FieldKind::Rgba8(pixels) => {
            if *pixels == 0 {
                return Err(SchemaError::ZeroPixelCount {
                    field: name.to_string(),
                });
            }
            Ok(FieldShape::Rgba8(*pixels))
        }
        FieldKind::Nested(schema) => Layout::compile(schema).map(FieldShape::Nested),
    }
}

#[inline]
const fn align_up(value: usize, align: usize) -> usize {
    (value + (align - 1)) & !(align - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn telemetry_schema() -> Schema {
        Schema::new()
            .field("flag", FieldKind::Scalar(ScalarType::U8))
            .field("label", FieldKind::Utf8(10))
            .field("vector", FieldKind::Array(ScalarType::F32, 3))
            .field(
                "nested",
                FieldKind::Nested(
                    Schema::new()
                        .field("count", FieldKind::Scalar(ScalarType::U16))
                        .field("energy", FieldKind::Scalar(ScalarType::F64)),
                ),
            )
    }

    #[test]
    fn telemetry_layout_offsets() {
        let layout = Layout::compile(&telemetry_schema()).unwrap();
        assert_eq!(layout.byte_length(), 40);

        assert_eq!(layout.get("flag").unwrap().offset(), 0);
        assert_eq!(layout.get("label").unwrap().offset(), 1);
        assert_eq!(layout.get("vector").unwrap().offset(), 12);

        let nested = layout.get("nested").unwrap();
        assert_eq!(nested.offset(), 24);
        let FieldShape::Nested(inner) = nested.shape() else {
            panic!("expected nested layout");
        };
        assert_eq!(inner.get("count").unwrap().offset(), 0);
        assert_eq!(inner.get("energy").unwrap().offset(), 8);
        assert_eq!(inner.byte_length(), 16);
        assert_eq!(inner.align(), 8);
    }

    #[test]
    fn rgba8_layout() {
        let schema = Schema::new()
            .field("width", FieldKind::Scalar(ScalarType::U32))
            .field("height", FieldKind::Scalar(ScalarType::U32))
            .field("feed", FieldKind::Rgba8(6));
        let layout = Layout::compile(&schema).unwrap();

        assert_eq!(layout.byte_length(), 32);
        assert_eq!(layout.get("feed").unwrap().offset(), 8);
        assert_eq!(layout.get("feed").unwrap().shape().byte_length(), 24);
    }

    #[test]
    fn no_trailing_padding() {
        // f64 then u8: the record ends right after the last byte.
        let schema = Schema::new()
            .field("big", FieldKind::Scalar(ScalarType::F64))
            .field("small", FieldKind::Scalar(ScalarType::U8));
        let layout = Layout::compile(&schema).unwrap();
        assert_eq!(layout.byte_length(), 9);
        assert_eq!(layout.align(), 8);
    }

    #[test]
    fn utf8_aligns_to_one() {
        let schema = Schema::new()
            .field("tag", FieldKind::Scalar(ScalarType::U8))
            .field("name", FieldKind::Utf8(3))
            .field("next", FieldKind::Scalar(ScalarType::U8));
        let layout = Layout::compile(&schema).unwrap();
        assert_eq!(layout.get("name").unwrap().offset(), 1);
        assert_eq!(layout.get("next").unwrap().offset(), 4);
    }

    #[test]
    fn invalid_schemas_are_rejected() {
        assert_eq!(Layout::compile(&Schema::new()), Err(SchemaError::Empty));

        let zero_array = Schema::new().field("xs", FieldKind::Array(ScalarType::F32, 0));
        assert!(matches!(
            Layout::compile(&zero_array),
            Err(SchemaError::ZeroArrayLength { .. })
        ));

        let dup = Schema::new()
            .field("x", FieldKind::Scalar(ScalarType::U8))
            .field("x", FieldKind::Scalar(ScalarType::U8));
        assert!(matches!(
            Layout::compile(&dup),
            Err(SchemaError::DuplicateField { .. })
        ));

        let unnamed = Schema::new().field("", FieldKind::Scalar(ScalarType::U8));
        assert!(matches!(
            Layout::compile(&unnamed),
            Err(SchemaError::EmptyFieldName { .. })
        ));

        let empty_nested = Schema::new().field("inner", FieldKind::Nested(Schema::new()));
        assert_eq!(Layout::compile(&empty_nested), Err(SchemaError::Empty));
    }
}

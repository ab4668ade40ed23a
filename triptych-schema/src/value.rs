use crate::error::SchemaTypeError;
use crate::layout::{FieldShape, Layout};
use crate::schema::ScalarType;

/// A single scalar value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Scalar {
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    F32(f32),
    F64(f64),
}

impl Scalar {
    /// The scalar's element type.
    pub fn kind(&self) -> ScalarType {
        match self {
            Scalar::I8(_) => ScalarType::I8,
            Scalar::U8(_) => ScalarType::U8,
            Scalar::I16(_) => ScalarType::I16,
            Scalar::U16(_) => ScalarType::U16,
            Scalar::I32(_) => ScalarType::I32,
            Scalar::U32(_) => ScalarType::U32,
            Scalar::F32(_) => ScalarType::F32,
            Scalar::F64(_) => ScalarType::F64,
        }
    }
}

/// A typed array value.
#[derive(Clone, Debug, PartialEq)]
pub enum ScalarArray {
    I8(Vec<i8>),
    U8(Vec<u8>),
    I16(Vec<i16>),
    U16(Vec<u16>),
    I32(Vec<i32>),
    U32(Vec<u32>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl ScalarArray {
    /// Element type of the array.
    pub fn elem(&self) -> ScalarType {
        match self {
            ScalarArray::I8(_) => ScalarType::I8,
            ScalarArray::U8(_) => ScalarType::U8,
            ScalarArray::I16(_) => ScalarType::I16,
            ScalarArray::U16(_) => ScalarType::U16,
            ScalarArray::I32(_) => ScalarType::I32,
            ScalarArray::U32(_) => ScalarType::U32,
            ScalarArray::F32(_) => ScalarType::F32,
            ScalarArray::F64(_) => ScalarType::F64,
        }
    }

    /// Element count.
    pub fn len(&self) -> usize {
        match self {
            ScalarArray::I8(v) => v.len(),
            ScalarArray::U8(v) => v.len(),
            ScalarArray::I16(v) => v.len(),
            ScalarArray::U16(v) => v.len(),
            ScalarArray::I32(v) => v.len(),
            ScalarArray::U32(v) => v.len(),
            ScalarArray::F32(v) => v.len(),
            ScalarArray::F64(v) => v.len(),
        }
    }

    /// True if the array has no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A runtime field value.
///
/// Read/write dispatch over field kinds is this closed union: scalars,
/// typed arrays (RGBA8 buffers are `u8` arrays of `4 × pixels` bytes),
/// strings, and nested records.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Scalar(Scalar),
    Array(ScalarArray),
    Str(String),
    Struct(Values),
}

impl Value {
    /// Short name of the value's kind, as used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Scalar(s) => s.kind().name(),
            Value::Array(a) => array_name(a.elem()),
            Value::Str(_) => "string",
            Value::Struct(_) => "struct",
        }
    }

    pub fn as_scalar(&self) -> Option<Scalar> {
        match self {
            Value::Scalar(s) => Some(*s),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&Values> {
        match self {
            Value::Struct(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_u8(&self) -> Option<u8> {
        match self {
            Value::Scalar(Scalar::U8(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u16(&self) -> Option<u16> {
        match self {
            Value::Scalar(Scalar::U16(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Scalar(Scalar::I32(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Value::Scalar(Scalar::U32(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Scalar(Scalar::F64(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Array(ScalarArray::U8(v)) => Some(v),
            _ => None,
        }
    }

    pub fn as_f32_array(&self) -> Option<&[f32]> {
        match self {
            Value::Array(ScalarArray::F32(v)) => Some(v),
            _ => None,
        }
    }
}

const fn array_name(ty: ScalarType) -> &'static str {
    match ty {
        ScalarType::I8 => "i8 array",
        ScalarType::U8 => "u8 array",
        ScalarType::I16 => "i16 array",
        ScalarType::U16 => "u16 array",
        ScalarType::I32 => "i32 array",
        ScalarType::U32 => "u32 array",
        ScalarType::F32 => "f32 array",
        ScalarType::F64 => "f64 array",
    }
}

macro_rules! scalar_from {
    ($($ty:ty => $variant:ident),+ $(,)?) => {
        $(
            impl From<$ty> for Scalar {
                fn from(v: $ty) -> Scalar {
                    Scalar::$variant(v)
                }
            }

            impl From<$ty> for Value {
                fn from(v: $ty) -> Value {
                    Value::Scalar(Scalar::$variant(v))
                }
            }

            impl From<Vec<$ty>> for ScalarArray {
                fn from(v: Vec<$ty>) -> ScalarArray {
                    ScalarArray::$variant(v)
                }
            }

            impl From<Vec<$ty>> for Value {
                fn from(v: Vec<$ty>) -> Value {
                    Value::Array(ScalarArray::$variant(v))
                }
            }
        )+
    };
}

scalar_from! {
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    f32 => F32,
    f64 => F64,
}

impl From<Scalar> for Value {
    fn from(s: Scalar) -> Value {
        Value::Scalar(s)
    }
}

impl From<ScalarArray> for Value {
    fn from(a: ScalarArray) -> Value {
        Value::Array(a)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Value {
        Value::Str(s)
    }
}

impl From<Values> for Value {
    fn from(v: Values) -> Value {
        Value::Struct(v)
    }
}

/// An ordered name → [`Value`] record.
///
/// Used both as a full record (every field present) and as a partial update
/// (only the fields to write). Insertion replaces an existing entry of the
/// same name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Values {
    entries: Vec<(String, Value)>,
}

impl Values {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a field.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        if let Some(entry) = self.entries.iter_mut().find(|(n, _)| *n == name) {
            entry.1 = value;
        } else {
            self.entries.push((name, value));
        }
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Decode every field of `layout` from `buf` at `base`.
///
/// Scalars decode to native numbers, arrays to typed vectors, UTF-8 fields to
/// a string ending at the first NUL (or spanning the full capacity), nested
/// fields recurse. Invalid UTF-8 decodes lossily.
///
/// # Panics
///
/// Panics if `buf` is shorter than `base + layout.byte_length()`.
pub fn read_snapshot(layout: &Layout, buf: &[u8], base: usize) -> Values {
    assert!(
        base + layout.byte_length() <= buf.len(),
        "buffer too small for layout"
    );

    let mut values = Values::new();
    for (name, field) in layout.fields() {
        let off = base + field.offset();
        let value = match field.shape() {
            FieldShape::Scalar(ty) => Value::Scalar(read_scalar(*ty, buf, off)),
            FieldShape::Array(ty, count) => Value::Array(read_array(*ty, *count, buf, off)),
            FieldShape::Utf8(capacity) => {
                let bytes = &buf[off..off + capacity];
                let end = bytes.iter().position(|&b| b == 0).unwrap_or(*capacity);
                Value::Str(String::from_utf8_lossy(&bytes[..end]).into_owned())
            }
            FieldShape::Rgba8(pixels) => {
                Value::Array(ScalarArray::U8(buf[off..off + 4 * pixels].to_vec()))
            }
            FieldShape::Nested(inner) => Value::Struct(read_snapshot(inner, buf, off)),
        };
        values.insert(name, value);
    }
    values
}

/// Write the fields present in `values` into `buf` at `base`.
///
/// Every supplied field is validated against the layout before the first
/// store, so a failed write leaves the buffer untouched. Fields absent from
/// `values` keep their current bytes.
///
/// # Panics
///
/// Panics if `buf` is shorter than `base + layout.byte_length()`.
pub fn write_fields(
    layout: &Layout,
    buf: &mut [u8],
    base: usize,
    values: &Values,
) -> Result<(), SchemaTypeError> {
    assert!(
        base + layout.byte_length() <= buf.len(),
        "buffer too small for layout"
    );

    check_fields(layout, values)?;
    store_fields(layout, buf, base, values);
    Ok(())
}

fn check_fields(layout: &Layout, values: &Values) -> Result<(), SchemaTypeError> {
    for (name, value) in values.iter() {
        let field = layout
            .get(name)
            .ok_or_else(|| SchemaTypeError::UnknownField {
                field: name.to_string(),
            })?;
        check_value(name, field.shape(), value)?;
    }
    Ok(())
}

fn check_value(field: &str, shape: &FieldShape, value: &Value) -> Result<(), SchemaTypeError> {
    match (shape, value) {
        (FieldShape::Scalar(ty), Value::Scalar(s)) => {
            if s.kind() == *ty {
                Ok(())
            } else {
                Err(SchemaTypeError::WrongKind {
                    field: field.to_string(),
                    expected: ty.name(),
                    got: s.kind().name(),
                })
            }
        }
        (FieldShape::Array(ty, count), Value::Array(a)) => {
            if a.elem() != *ty {
                Err(SchemaTypeError::WrongKind {
                    field: field.to_string(),
                    expected: array_name(*ty),
                    got: array_name(a.elem()),
                })
            } else if a.len() != *count {
                Err(SchemaTypeError::LengthMismatch {
                    field: field.to_string(),
                    expected: *count,
                    got: a.len(),
                })
            } else {
                Ok(())
            }
        }
        (FieldShape::Utf8(capacity), Value::Str(s)) => {
            if s.len() <= *capacity {
                Ok(())
            } else {
                Err(SchemaTypeError::StringTooLong {
                    field: field.to_string(),
                    capacity: *capacity,
                    len: s.len(),
                })
            }
        }
        (FieldShape::Rgba8(pixels), Value::Array(ScalarArray::U8(bytes))) => {
            if bytes.len() == 4 * pixels {
                Ok(())
            } else {
                Err(SchemaTypeError::LengthMismatch {
                    field: field.to_string(),
                    expected: 4 * pixels,
                    got: bytes.len(),
                })
            }
        }
        (FieldShape::Nested(inner), Value::Struct(partial)) => check_fields(inner, partial)
            .map_err(|e| prefix_field(field, e)),
        (shape, value) => Err(SchemaTypeError::WrongKind {
            field: field.to_string(),
            expected: shape_name(shape),
            got: value.kind_name(),
        }),
    }
}

fn shape_name(shape: &FieldShape) -> &'static str {
    match shape {
        FieldShape::Scalar(ty) => ty.name(),
        FieldShape::Array(ty, _) => array_name(*ty),
        FieldShape::Utf8(_) => "string",
        FieldShape::Rgba8(_) => "u8 array",
        FieldShape::Nested(_) => "struct",
    }
}

fn prefix_field(outer: &str, e: SchemaTypeError) -> SchemaTypeError {
    let rename = |field: String| format!("{outer}.{field}");
    match e {
        SchemaTypeError::UnknownField { field } => SchemaTypeError::UnknownField {
            field: rename(field),
        },
        SchemaTypeError::WrongKind {
            field,
            expected,
            got,
        } => SchemaTypeError::WrongKind {
            field: rename(field),
            expected,
            got,
        },
        SchemaTypeError::LengthMismatch {
            field,
            expected,
            got,
        } => SchemaTypeError::LengthMismatch {
            field: rename(field),
            expected,
            got,
        },
        SchemaTypeError::StringTooLong {
            field,
            capacity,
            len,
        } => SchemaTypeError::StringTooLong {
            field: rename(field),
            capacity,
            len,
        },
    }
}

fn store_fields(layout: &Layout, buf: &mut [u8], base: usize, values: &Values) {
    for (name, value) in values.iter() {
        // check_fields already confirmed every name resolves
        let field = layout.get(name).expect("field validated");
        store_value(field.shape(), buf, base + field.offset(), value);
    }
}

fn store_value(shape: &FieldShape, buf: &mut [u8], off: usize, value: &Value) {
    match (shape, value) {
        (FieldShape::Scalar(_), Value::Scalar(s)) => write_scalar(buf, off, *s),
        (FieldShape::Array(..), Value::Array(a)) => write_array(buf, off, a),
        (FieldShape::Utf8(capacity), Value::Str(s)) => {
            buf[off..off + capacity].fill(0);
            buf[off..off + s.len()].copy_from_slice(s.as_bytes());
        }
        (FieldShape::Rgba8(_), Value::Array(ScalarArray::U8(bytes))) => {
            buf[off..off + bytes.len()].copy_from_slice(bytes);
        }
        (FieldShape::Nested(inner), Value::Struct(partial)) => {
            store_fields(inner, buf, off, partial);
        }
        _ => unreachable!("store_value called on an unvalidated field"),
    }
}

fn load<const N: usize>(buf: &[u8], off: usize) -> [u8; N] {
    let mut bytes = [0u8; N];
    bytes.copy_from_slice(&buf[off..off + N]);
    bytes
}

fn read_scalar(ty: ScalarType, buf: &[u8], off: usize) -> Scalar {
    match ty {
        ScalarType::I8 => Scalar::I8(buf[off] as i8),
        ScalarType::U8 => Scalar::U8(buf[off]),
        ScalarType::I16 => Scalar::I16(i16::from_le_bytes(load(buf, off))),
        ScalarType::U16 => Scalar::U16(u16::from_le_bytes(load(buf, off))),
        ScalarType::I32 => Scalar::I32(i32::from_le_bytes(load(buf, off))),
        ScalarType::U32 => Scalar::U32(u32::from_le_bytes(load(buf, off))),
        ScalarType::F32 => Scalar::F32(f32::from_le_bytes(load(buf, off))),
        ScalarType::F64 => Scalar::F64(f64::from_le_bytes(load(buf, off))),
    }
}

fn write_scalar(buf: &mut [u8], off: usize, s: Scalar) {
    match s {
        Scalar::I8(v) => buf[off] = v as u8,
        Scalar::U8(v) => buf[off] = v,
        Scalar::I16(v) => buf[off..off + 2].copy_from_slice(&v.to_le_bytes()),
        Scalar::U16(v) => buf[off..off + 2].copy_from_slice(&v.to_le_bytes()),
        Scalar::I32(v) => buf[off..off + 4].copy_from_slice(&v.to_le_bytes()),
        Scalar::U32(v) => buf[off..off + 4].copy_from_slice(&v.to_le_bytes()),
        Scalar::F32(v) => buf[off..off + 4].copy_from_slice(&v.to_le_bytes()),
        Scalar::F64(v) => buf[off..off + 8].copy_from_slice(&v.to_le_bytes()),
    }
}

fn read_array(ty: ScalarType, count: usize, buf: &[u8], off: usize) -> ScalarArray {
    match ty {
        ScalarType::I8 => {
            ScalarArray::I8(buf[off..off + count].iter().map(|&b| b as i8).collect())
        }
        ScalarType::U8 => ScalarArray::U8(buf[off..off + count].to_vec()),
        ScalarType::I16 => ScalarArray::I16(
            (0..count)
                .map(|i| i16::from_le_bytes(load(buf, off + 2 * i)))
                .collect(),
        ),
        ScalarType::U16 => ScalarArray::U16(
            (0..count)
                .map(|i| u16::from_le_bytes(load(buf, off + 2 * i)))
                .collect(),
        ),
        ScalarType::I32 => ScalarArray::I32(
            (0..count)
                .map(|i| i32::from_le_bytes(load(buf, off + 4 * i)))
                .collect(),
        ),
        ScalarType::U32 => ScalarArray::U32(
            (0..count)
                .map(|i| u32::from_le_bytes(load(buf, off + 4 * i)))
                .collect(),
        ),
        ScalarType::F32 => ScalarArray::F32(
            (0..count)
                .map(|i| f32::from_le_bytes(load(buf, off + 4 * i)))
                .collect(),
        ),
        ScalarType::F64 => ScalarArray::F64(
            (0..count)
                .map(|i| f64::from_le_bytes(load(buf, off + 8 * i)))
                .collect(),
        ),
    }
}

fn write_array(buf: &mut [u8], off: usize, array: &ScalarArray) {
    match array {
        ScalarArray::I8(v) => {
            for (i, &e) in v.iter().enumerate() {
                buf[off + i] = e as u8;
            }
        }
        ScalarArray::U8(v) => buf[off..off + v.len()].copy_from_slice(v),
        ScalarArray::I16(v) => {
            for (i, e) in v.iter().enumerate() {
                buf[off + 2 * i..off + 2 * i + 2].copy_from_slice(&e.to_le_bytes());
            }
        }
        ScalarArray::U16(v) => {
            for (i, e) in v.iter().enumerate() {
                buf[off + 2 * i..off + 2 * i + 2].copy_from_slice(&e.to_le_bytes());
            }
        }
        ScalarArray::I32(v) => {
            for (i, e) in v.iter().enumerate() {
                buf[off + 4 * i..off + 4 * i + 4].copy_from_slice(&e.to_le_bytes());
            }
        }
        ScalarArray::U32(v) => {
            for (i, e) in v.iter().enumerate() {
                buf[off + 4 * i..off + 4 * i + 4].copy_from_slice(&e.to_le_bytes());
            }
        }
        ScalarArray::F32(v) => {
            for (i, e) in v.iter().enumerate() {
                buf[off + 4 * i..off + 4 * i + 4].copy_from_slice(&e.to_le_bytes());
            }
        }
        ScalarArray::F64(v) => {
            for (i, e) in v.iter().enumerate() {
                buf[off + 8 * i..off + 8 * i + 8].copy_from_slice(&e.to_le_bytes());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldKind, Schema};

    fn telemetry_layout() -> Layout {
        let schema = Schema::new()
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
            );
        Layout::compile(&schema).unwrap()
    }

    #[test]
    fn full_record_roundtrip() {
        let layout = telemetry_layout();
        let mut buf = vec![0u8; layout.byte_length()];

        let record = record! {
            "flag": 1u8,
            "label": "sensor-a",
            "vector": vec![1.0f32, -2.5, 0.25],
            "nested": record! { "count": 7u16, "energy": 12.5f64 },
        };

        write_fields(&layout, &mut buf, 0, &record).unwrap();
        let back = read_snapshot(&layout, &buf, 0);
        assert_eq!(back, record);
    }

    #[test]
    fn partial_write_preserves_other_fields() {
        let layout = telemetry_layout();
        let mut buf = vec![0u8; layout.byte_length()];

        let full = record! {
            "flag": 1u8,
            "label": "first",
            "vector": vec![1.0f32, 2.0, 3.0],
            "nested": record! { "count": 1u16, "energy": 9.0f64 },
        };
        write_fields(&layout, &mut buf, 0, &full).unwrap();

        let partial = record! { "nested": record! { "count": 11u16 } };
        write_fields(&layout, &mut buf, 0, &partial).unwrap();

        let back = read_snapshot(&layout, &buf, 0);
        let nested = back.get("nested").unwrap().as_struct().unwrap();
        assert_eq!(nested.get("count").unwrap().as_u16(), Some(11));
        assert_eq!(nested.get("energy").unwrap().as_f64(), Some(9.0));
        assert_eq!(back.get("label").unwrap().as_str(), Some("first"));
    }

    #[test]
    fn scalars_are_little_endian() {
        let layout =
            Layout::compile(&Schema::new().field("v", FieldKind::Scalar(ScalarType::U32)))
                .unwrap();
        let mut buf = vec![0u8; 4];
        write_fields(&layout, &mut buf, 0, &record! { "v": 0x01020304u32 }).unwrap();
        assert_eq!(buf, [0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn utf8_byte_budget() {
        let layout =
            Layout::compile(&Schema::new().field("name", FieldKind::Utf8(3))).unwrap();
        let mut buf = vec![0xffu8; 3];

        // Exactly at capacity round-trips.
        write_fields(&layout, &mut buf, 0, &record! { "name": "abc" }).unwrap();
        assert_eq!(
            read_snapshot(&layout, &buf, 0).get("name").unwrap().as_str(),
            Some("abc")
        );

        // Multi-byte character within budget round-trips ("ä" is 2 bytes).
        write_fields(&layout, &mut buf, 0, &record! { "name": "ä" }).unwrap();
        assert_eq!(
            read_snapshot(&layout, &buf, 0).get("name").unwrap().as_str(),
            Some("ä")
        );

        // One byte over fails and leaves the buffer untouched.
        let before = buf.clone();
        let err = write_fields(&layout, &mut buf, 0, &record! { "name": "abcd" }).unwrap_err();
        assert!(matches!(err, SchemaTypeError::StringTooLong { .. }));
        assert_eq!(buf, before);
    }

    #[test]
    fn utf8_write_zero_fills_capacity() {
        let layout =
            Layout::compile(&Schema::new().field("name", FieldKind::Utf8(6))).unwrap();
        let mut buf = vec![0u8; 6];
        write_fields(&layout, &mut buf, 0, &record! { "name": "abcdef" }).unwrap();
        write_fields(&layout, &mut buf, 0, &record! { "name": "xy" }).unwrap();
        assert_eq!(&buf, &[b'x', b'y', 0, 0, 0, 0]);
        assert_eq!(
            read_snapshot(&layout, &buf, 0).get("name").unwrap().as_str(),
            Some("xy")
        );
    }

    #[test]
    fn rgba8_length_is_enforced() {
        let schema = Schema::new()
            .field("width", FieldKind::Scalar(ScalarType::U32))
            .field("height", FieldKind::Scalar(ScalarType::U32))
            .field("feed", FieldKind::Rgba8(6));
        let layout = Layout::compile(&schema).unwrap();
        let mut buf = vec![0u8; layout.byte_length()];

        let pixels: Vec<u8> = (0..24).collect();
        write_fields(&layout, &mut buf, 0, &record! { "feed": pixels.clone() }).unwrap();
        assert_eq!(
            read_snapshot(&layout, &buf, 0)
                .get("feed")
                .unwrap()
                .as_bytes(),
            Some(pixels.as_slice())
        );

        let err =
            write_fields(&layout, &mut buf, 0, &record! { "feed": vec![0u8; 4] }).unwrap_err();
        assert!(err.to_string().contains("length mismatch"));
    }

    #[test]
    fn array_type_and_length_mismatches() {
        let layout =
            Layout::compile(&Schema::new().field("xs", FieldKind::Array(ScalarType::F32, 3)))
                .unwrap();
        let mut buf = vec![0u8; layout.byte_length()];

        let err = write_fields(&layout, &mut buf, 0, &record! { "xs": vec![1.0f32, 2.0] })
            .unwrap_err();
        assert!(matches!(
            err,
            SchemaTypeError::LengthMismatch {
                expected: 3,
                got: 2,
                ..
            }
        ));

        let err = write_fields(&layout, &mut buf, 0, &record! { "xs": vec![1u32, 2, 3] })
            .unwrap_err();
        assert!(matches!(err, SchemaTypeError::WrongKind { .. }));
    }

    #[test]
    fn failed_write_leaves_buffer_untouched() {
        let layout = telemetry_layout();
        let mut buf = vec![0u8; layout.byte_length()];
        write_fields(
            &layout,
            &mut buf,
            0,
            &record! { "flag": 3u8, "label": "keep" },
        )
        .unwrap();
        let before = buf.clone();

        // Second field is invalid; the first must not be applied.
        let err = write_fields(
            &layout,
            &mut buf,
            0,
            &record! { "flag": 9u8, "vector": vec![1.0f32] },
        )
        .unwrap_err();
        assert!(matches!(err, SchemaTypeError::LengthMismatch { .. }));
        assert_eq!(buf, before);
    }

    #[test]
    fn unknown_and_mistyped_fields() {
        let layout = telemetry_layout();
        let mut buf = vec![0u8; layout.byte_length()];

        let err = write_fields(&layout, &mut buf, 0, &record! { "missing": 1u8 }).unwrap_err();
        assert!(matches!(err, SchemaTypeError::UnknownField { .. }));

        let err = write_fields(&layout, &mut buf, 0, &record! { "flag": "nope" }).unwrap_err();
        assert!(matches!(
            err,
            SchemaTypeError::WrongKind {
                expected: "u8",
                got: "string",
                ..
            }
        ));

        let err = write_fields(
            &layout,
            &mut buf,
            0,
            &record! { "nested": record! { "count": 1u8 } },
        )
        .unwrap_err();
        match err {
            SchemaTypeError::WrongKind { field, .. } => assert_eq!(field, "nested.count"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn nul_terminated_read_stops_early() {
        let layout =
            Layout::compile(&Schema::new().field("name", FieldKind::Utf8(8))).unwrap();
        let mut buf = vec![0u8; 8];
        buf[..3].copy_from_slice(b"abc");
        buf[4] = b'x'; // past the NUL, must be ignored
        assert_eq!(
            read_snapshot(&layout, &buf, 0).get("name").unwrap().as_str(),
            Some("abc")
        );
    }
}

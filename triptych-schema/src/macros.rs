/// Build a [`Values`](crate::Values) record literal.
///
/// ```
/// use triptych_schema::record;
///
/// let values = record! {
///     "flag": 1u8,
///     "label": "sensor-a",
///     "nested": record! { "count": 7u16 },
/// };
/// assert_eq!(values.get("flag").unwrap().as_u8(), Some(1));
/// ```
#[macro_export]
macro_rules! record {
    () => { $crate::Values::new() };
    ($($name:literal : $value:expr),+ $(,)?) => {{
        let mut values = $crate::Values::new();
        $(values.insert($name, $crate::Value::from($value));)+
        values
    }};
}

//! Conversions between [`Value`] and rusqlite's value types.

use eagerload_types::Value;
use rusqlite::types::{ToSqlOutput, ValueRef};

/// A borrowed [`Value`] bound as a rusqlite parameter.
///
/// Booleans are stored as `0`/`1` and temporal values as ISO-8601 text, the
/// forms SQLite's own date functions understand.
#[derive(Debug, Clone, Copy)]
pub struct SqliteParam<'a>(pub &'a Value);

impl rusqlite::ToSql for SqliteParam<'_> {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        use rusqlite::types::Value as Owned;

        Ok(match self.0 {
            Value::Null => ToSqlOutput::Owned(Owned::Null),
            Value::Integer(i) => ToSqlOutput::Owned(Owned::Integer(*i)),
            Value::Real(r) => ToSqlOutput::Owned(Owned::Real(*r)),
            Value::Bool(b) => ToSqlOutput::Owned(Owned::Integer(i64::from(*b))),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
            temporal @ (Value::Date(_) | Value::DateTime(_) | Value::Time(_)) => {
                ToSqlOutput::Owned(Owned::Text(temporal.to_string()))
            }
        })
    }
}

/// Reads a column value as stored; coercion to the declared kind happens
/// during materialization.
pub fn from_value_ref(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(r) => Value::Real(r),
        ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Blob(bytes.to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eagerload_types::ScalarKind;
    use rusqlite::ToSql;

    #[test]
    fn test_bool_and_temporal_binding() {
        let truthy = Value::Bool(true);
        assert_eq!(
            SqliteParam(&truthy).to_sql().unwrap(),
            ToSqlOutput::Owned(rusqlite::types::Value::Integer(1))
        );
        let day = Value::from("2024-02-29").coerce(ScalarKind::Date).unwrap();
        assert_eq!(
            SqliteParam(&day).to_sql().unwrap(),
            ToSqlOutput::Owned(rusqlite::types::Value::Text("2024-02-29".into()))
        );
    }

    #[test]
    fn test_reading_values() {
        assert_eq!(from_value_ref(ValueRef::Text(b"abc")), Value::from("abc"));
        assert_eq!(from_value_ref(ValueRef::Null), Value::Null);
        assert_eq!(from_value_ref(ValueRef::Blob(&[1, 2])), Value::Blob(vec![1, 2]));
    }
}

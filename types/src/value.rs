//! Dynamic SQL values and the scalar kinds they coerce into.

use core::cmp::Ordering;
use core::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};

/// Declared storage kind of a mapped property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ScalarKind {
    Integer,
    Real,
    Text,
    Bool,
    Blob,
    Date,
    DateTime,
    Time,
}

impl ScalarKind {
    /// Date and time kinds are the only ones whose parse failures are tolerated.
    #[must_use]
    pub const fn is_temporal(&self) -> bool {
        matches!(self, ScalarKind::Date | ScalarKind::DateTime | ScalarKind::Time)
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ScalarKind::Integer => "integer",
            ScalarKind::Real => "real",
            ScalarKind::Text => "text",
            ScalarKind::Bool => "bool",
            ScalarKind::Blob => "blob",
            ScalarKind::Date => "date",
            ScalarKind::DateTime => "datetime",
            ScalarKind::Time => "time",
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value read from or bound to the SQL engine.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Bool(bool),
    Blob(Vec<u8>),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Time(NaiveTime),
}

/// Failure to convert a stored value into a declared kind.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("cannot convert {value} to {kind}")]
pub struct CoerceError {
    pub value: String,
    pub kind: ScalarKind,
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

impl Value {
    #[inline]
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The kind this value currently holds, `None` for NULL.
    #[must_use]
    pub const fn kind(&self) -> Option<ScalarKind> {
        Some(match self {
            Value::Null => return None,
            Value::Integer(_) => ScalarKind::Integer,
            Value::Real(_) => ScalarKind::Real,
            Value::Text(_) => ScalarKind::Text,
            Value::Bool(_) => ScalarKind::Bool,
            Value::Blob(_) => ScalarKind::Blob,
            Value::Date(_) => ScalarKind::Date,
            Value::DateTime(_) => ScalarKind::DateTime,
            Value::Time(_) => ScalarKind::Time,
        })
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    /// Numeric view used by aggregates.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Real(f) => Some(*f),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Integer(i) => Some(*i != 0),
            _ => None,
        }
    }

    /// Hashable identity form, used to key entities by primary key.
    #[must_use]
    pub fn key(&self) -> Option<KeyValue> {
        Some(match self {
            Value::Null => return None,
            Value::Integer(i) => KeyValue::Integer(*i),
            Value::Real(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                KeyValue::Integer(*f as i64)
            }
            Value::Real(f) => KeyValue::Real(f.to_bits()),
            Value::Text(s) => KeyValue::Text(s.clone()),
            Value::Bool(b) => KeyValue::Integer(i64::from(*b)),
            Value::Blob(b) => KeyValue::Blob(b.clone()),
            Value::Date(d) => KeyValue::Text(d.to_string()),
            Value::DateTime(d) => KeyValue::Text(d.to_string()),
            Value::Time(t) => KeyValue::Text(t.to_string()),
        })
    }

    /// Converts the value into `kind`. NULL stays NULL.
    pub fn coerce(self, kind: ScalarKind) -> Result<Value, CoerceError> {
        if self.kind() == Some(kind) || self.is_null() {
            return Ok(self);
        }
        let converted = match (kind, &self) {
            (ScalarKind::Integer, Value::Real(f)) if f.fract() == 0.0 => Some(Value::Integer(*f as i64)),
            (ScalarKind::Integer, Value::Bool(b)) => Some(Value::Integer(i64::from(*b))),
            (ScalarKind::Integer, Value::Text(s)) => s.trim().parse().ok().map(Value::Integer),
            (ScalarKind::Real, Value::Integer(i)) => Some(Value::Real(*i as f64)),
            (ScalarKind::Real, Value::Text(s)) => s.trim().parse().ok().map(Value::Real),
            (ScalarKind::Bool, Value::Integer(i)) => Some(Value::Bool(*i != 0)),
            (ScalarKind::Bool, Value::Real(f)) => Some(Value::Bool(*f != 0.0)),
            (ScalarKind::Bool, Value::Text(s)) => parse_bool(s).map(Value::Bool),
            (ScalarKind::Text, other) => Some(Value::Text(other.to_string())),
            (ScalarKind::Blob, Value::Text(s)) => Some(Value::Blob(s.clone().into_bytes())),
            (ScalarKind::Date, Value::DateTime(dt)) => Some(Value::Date(dt.date())),
            (ScalarKind::Date, Value::Text(s)) => parse_date(s).map(Value::Date),
            (ScalarKind::DateTime, Value::Date(d)) => Some(Value::DateTime(d.and_time(NaiveTime::MIN))),
            (ScalarKind::DateTime, Value::Text(s)) => parse_datetime(s).map(Value::DateTime),
            (ScalarKind::DateTime, Value::Integer(secs)) => {
                DateTime::from_timestamp(*secs, 0).map(|dt| Value::DateTime(dt.naive_utc()))
            }
            (ScalarKind::Time, Value::DateTime(dt)) => Some(Value::Time(dt.time())),
            (ScalarKind::Time, Value::Text(s)) => parse_time(s).map(Value::Time),
            _ => None,
        };
        converted.ok_or_else(|| CoerceError {
            value: self.to_string(),
            kind,
        })
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim() {
        "1" => Some(true),
        "0" => Some(false),
        t if t.eq_ignore_ascii_case("true") => Some(true),
        t if t.eq_ignore_ascii_case("false") => Some(false),
        _ => None,
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_datetime(s).map(|dt| dt.date()))
}

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}

fn parse_time(s: &str) -> Option<NaiveTime> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .ok()
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Real(r) => write!(f, "{r}"),
            Value::Text(s) => f.write_str(s),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Blob(b) => {
                for byte in b {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::DateTime(d) => write!(f, "{}", d.format("%Y-%m-%d %H:%M:%S%.f")),
            Value::Time(t) => write!(f, "{}", t.format("%H:%M:%S%.f")),
        }
    }
}

impl PartialOrd for Value {
    /// Numbers compare across integer/real; other kinds only with themselves.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, Value::Null) => Some(Ordering::Equal),
            (Value::Text(a), Value::Text(b)) => a.partial_cmp(b),
            (Value::Blob(a), Value::Blob(b)) => a.partial_cmp(b),
            (Value::Date(a), Value::Date(b)) => a.partial_cmp(b),
            (Value::DateTime(a), Value::DateTime(b)) => a.partial_cmp(b),
            (Value::Time(a), Value::Time(b)) => a.partial_cmp(b),
            (Value::Integer(a), Value::Integer(b)) => a.partial_cmp(b),
            (a, b) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        }
    }
}

/// Primary-key identity of a row. `Real` keys compare by bit pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyValue {
    Integer(i64),
    Real(u64),
    Text(String),
    Blob(Vec<u8>),
}

impl From<KeyValue> for Value {
    fn from(key: KeyValue) -> Self {
        match key {
            KeyValue::Integer(i) => Value::Integer(i),
            KeyValue::Real(bits) => Value::Real(f64::from_bits(bits)),
            KeyValue::Text(s) => Value::Text(s),
            KeyValue::Blob(b) => Value::Blob(b),
        }
    }
}

macro_rules! impl_from_integer {
    ($($ty:ty),*) => { $(
        impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::Integer(i64::from(v))
            }
        }
    )* }
}

impl_from_integer!(i8, i16, i32, i64, u8, u16, u32);

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Real(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::DateTime(v)
    }
}

impl From<NaiveTime> for Value {
    fn from(v: NaiveTime) -> Self {
        Value::Time(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

#[cfg(feature = "serde")]
impl From<&Value> for serde_json::Value {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Integer(i) => serde_json::Value::from(*i),
            Value::Real(f) => serde_json::Value::from(*f),
            Value::Bool(b) => serde_json::Value::Bool(*b),
            other => serde_json::Value::String(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coerce_numeric() {
        assert_eq!(Value::Real(3.0).coerce(ScalarKind::Integer), Ok(Value::Integer(3)));
        assert_eq!(Value::Integer(2).coerce(ScalarKind::Real), Ok(Value::Real(2.0)));
        assert_eq!(Value::Integer(1).coerce(ScalarKind::Bool), Ok(Value::Bool(true)));
        assert_eq!(Value::from(" 42 ").coerce(ScalarKind::Integer), Ok(Value::Integer(42)));
        assert!(Value::Real(1.5).coerce(ScalarKind::Integer).is_err());
    }

    #[test]
    fn test_coerce_null_is_preserved() {
        assert_eq!(Value::Null.coerce(ScalarKind::Date), Ok(Value::Null));
    }

    #[test]
    fn test_coerce_temporal_text() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(Value::from("2024-03-09").coerce(ScalarKind::Date), Ok(Value::Date(d)));

        let dt = d.and_hms_opt(13, 5, 0).unwrap();
        assert_eq!(
            Value::from("2024-03-09 13:05:00").coerce(ScalarKind::DateTime),
            Ok(Value::DateTime(dt))
        );
        assert_eq!(
            Value::from("2024-03-09T13:05:00Z").coerce(ScalarKind::DateTime),
            Ok(Value::DateTime(dt))
        );

        let err = Value::from("not a date").coerce(ScalarKind::DateTime).unwrap_err();
        assert_eq!(err.kind, ScalarKind::DateTime);
    }

    #[test]
    fn test_keys_normalize_integral_reals() {
        assert_eq!(Value::Real(7.0).key(), Value::Integer(7).key());
        assert_eq!(Value::Null.key(), None);
        assert_ne!(Value::from("7").key(), Value::Integer(7).key());
    }

    #[test]
    fn test_ordering_across_numeric_kinds() {
        assert!(Value::Integer(2) < Value::Real(2.5));
        assert!(Value::from("b") > Value::from("a"));
        assert_eq!(Value::from("a").partial_cmp(&Value::Integer(1)), None);
    }
}

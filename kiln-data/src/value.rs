use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DataError;

/// A bound statement argument, or a scalar read back from a single column.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
    Json(serde_json::Value),
}

impl SqlValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            SqlValue::Null => "null",
            SqlValue::Bool(_) => "bool",
            SqlValue::Int(_) => "int",
            SqlValue::Float(_) => "float",
            SqlValue::Text(_) => "text",
            SqlValue::Uuid(_) => "uuid",
            SqlValue::Timestamp(_) => "timestamp",
            SqlValue::Json(_) => "json",
        }
    }
}

macro_rules! impl_from_for_sql_value {
    ($($ty:ty => $variant:ident),+ $(,)?) => {
        $(
            impl From<$ty> for SqlValue {
                fn from(v: $ty) -> Self {
                    SqlValue::$variant(v.into())
                }
            }
        )+
    };
}

impl_from_for_sql_value! {
    bool => Bool,
    i16 => Int,
    i32 => Int,
    i64 => Int,
    u32 => Int,
    f32 => Float,
    f64 => Float,
    String => Text,
    &str => Text,
    Uuid => Uuid,
    DateTime<Utc> => Timestamp,
    serde_json::Value => Json,
}

impl From<&String> for SqlValue {
    fn from(v: &String) -> Self {
        SqlValue::Text(v.clone())
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(SqlValue::Null, Into::into)
    }
}

/// Build a `Vec<SqlValue>` argument list from heterogeneous values.
///
/// ```ignore
/// let args = kiln_data::sql_args![email, 42_i64, Some("admin")];
/// executor.update(UPDATE_ROLE, "user", &args).await?;
/// ```
#[macro_export]
macro_rules! sql_args {
    () => { ::std::vec::Vec::<$crate::SqlValue>::new() };
    ($($arg:expr),+ $(,)?) => {
        ::std::vec![$($crate::SqlValue::from($arg)),+]
    };
}

/// Conversion from a scalar column into a caller type (e.g. a generated id).
pub trait FromSqlValue: Sized {
    fn from_sql_value(value: SqlValue) -> Result<Self, DataError>;
}

fn unexpected(expected: &'static str, got: &SqlValue) -> DataError {
    DataError::Other(format!("expected {expected}, got {}", got.type_name()))
}

impl FromSqlValue for SqlValue {
    fn from_sql_value(value: SqlValue) -> Result<Self, DataError> {
        Ok(value)
    }
}

impl FromSqlValue for i64 {
    fn from_sql_value(value: SqlValue) -> Result<Self, DataError> {
        match value {
            SqlValue::Int(i) => Ok(i),
            other => Err(unexpected("int", &other)),
        }
    }
}

impl FromSqlValue for i32 {
    fn from_sql_value(value: SqlValue) -> Result<Self, DataError> {
        let i = i64::from_sql_value(value)?;
        i32::try_from(i).map_err(|_| DataError::Other(format!("{i} does not fit in i32")))
    }
}

impl FromSqlValue for f64 {
    fn from_sql_value(value: SqlValue) -> Result<Self, DataError> {
        match value {
            SqlValue::Float(f) => Ok(f),
            SqlValue::Int(i) => Ok(i as f64),
            other => Err(unexpected("float", &other)),
        }
    }
}

impl FromSqlValue for bool {
    fn from_sql_value(value: SqlValue) -> Result<Self, DataError> {
        match value {
            SqlValue::Bool(b) => Ok(b),
            other => Err(unexpected("bool", &other)),
        }
    }
}

impl FromSqlValue for String {
    fn from_sql_value(value: SqlValue) -> Result<Self, DataError> {
        match value {
            SqlValue::Text(s) => Ok(s),
            SqlValue::Uuid(u) => Ok(u.to_string()),
            other => Err(unexpected("text", &other)),
        }
    }
}

impl FromSqlValue for Uuid {
    fn from_sql_value(value: SqlValue) -> Result<Self, DataError> {
        match value {
            SqlValue::Uuid(u) => Ok(u),
            SqlValue::Text(s) => Uuid::parse_str(&s).map_err(|e| DataError::Other(e.to_string())),
            other => Err(unexpected("uuid", &other)),
        }
    }
}

impl FromSqlValue for DateTime<Utc> {
    fn from_sql_value(value: SqlValue) -> Result<Self, DataError> {
        match value {
            SqlValue::Timestamp(ts) => Ok(ts),
            other => Err(unexpected("timestamp", &other)),
        }
    }
}

impl<T: FromSqlValue> FromSqlValue for Option<T> {
    fn from_sql_value(value: SqlValue) -> Result<Self, DataError> {
        match value {
            SqlValue::Null => Ok(None),
            v => T::from_sql_value(v).map(Some),
        }
    }
}

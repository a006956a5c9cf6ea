//! Binding [`SqlValue`] arguments and decoding scalar results.

use chrono::{DateTime, NaiveDateTime, Utc};
use kiln_data::{DataError, SqlValue};
use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;
use sqlx::postgres::types::Oid;
use sqlx::postgres::{PgArgumentBuffer, PgArguments, PgRow, PgTypeInfo};
use sqlx::query::Query;
use sqlx::{Encode, Postgres, Row, Type, TypeInfo, ValueRef};
use uuid::Uuid;

use crate::error::SqlxErrorExt;

/// Prepare `sql` with every argument bound in order (`$1`, `$2`, ...).
pub(crate) fn bind_all<'q>(sql: &'q str, args: &[SqlValue]) -> Query<'q, Postgres, PgArguments> {
    args.iter()
        .fold(sqlx::query(sql), |query, arg| query.bind(PgArg(arg.clone())))
}

/// A [`SqlValue`] encoded with the Postgres type of its variant.
///
/// `Null` is sent with an unspecified type so the server infers it from the
/// statement.
struct PgArg(SqlValue);

impl Type<Postgres> for PgArg {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_oid(Oid(0))
    }

    fn compatible(_ty: &PgTypeInfo) -> bool {
        true
    }
}

impl Encode<'_, Postgres> for PgArg {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
        match &self.0 {
            SqlValue::Null => Ok(IsNull::Yes),
            SqlValue::Bool(v) => <bool as Encode<'_, Postgres>>::encode_by_ref(v, buf),
            SqlValue::Int(v) => <i64 as Encode<'_, Postgres>>::encode_by_ref(v, buf),
            SqlValue::Float(v) => <f64 as Encode<'_, Postgres>>::encode_by_ref(v, buf),
            SqlValue::Text(v) => <String as Encode<'_, Postgres>>::encode_by_ref(v, buf),
            SqlValue::Uuid(v) => <Uuid as Encode<'_, Postgres>>::encode_by_ref(v, buf),
            SqlValue::Timestamp(v) => {
                <DateTime<Utc> as Encode<'_, Postgres>>::encode_by_ref(v, buf)
            }
            SqlValue::Json(v) => <serde_json::Value as Encode<'_, Postgres>>::encode_by_ref(v, buf),
        }
    }

    fn produces(&self) -> Option<PgTypeInfo> {
        match &self.0 {
            SqlValue::Null => None,
            SqlValue::Bool(_) => Some(<bool as Type<Postgres>>::type_info()),
            SqlValue::Int(_) => Some(<i64 as Type<Postgres>>::type_info()),
            SqlValue::Float(_) => Some(<f64 as Type<Postgres>>::type_info()),
            SqlValue::Text(_) => Some(<String as Type<Postgres>>::type_info()),
            SqlValue::Uuid(_) => Some(<Uuid as Type<Postgres>>::type_info()),
            SqlValue::Timestamp(_) => Some(<DateTime<Utc> as Type<Postgres>>::type_info()),
            SqlValue::Json(_) => Some(<serde_json::Value as Type<Postgres>>::type_info()),
        }
    }
}

/// Decode the first column of `row` according to its Postgres type.
pub(crate) fn decode_scalar(row: &PgRow) -> Result<SqlValue, DataError> {
    let raw = row.try_get_raw(0).map_err(SqlxErrorExt::into_data_error)?;
    if raw.is_null() {
        return Ok(SqlValue::Null);
    }
    let type_name = raw.type_info().name().to_string();

    let value = match type_name.as_str() {
        "INT2" => SqlValue::Int(i64::from(get::<i16>(row)?)),
        "INT4" => SqlValue::Int(i64::from(get::<i32>(row)?)),
        "INT8" => SqlValue::Int(get::<i64>(row)?),
        "FLOAT4" => SqlValue::Float(f64::from(get::<f32>(row)?)),
        "FLOAT8" => SqlValue::Float(get::<f64>(row)?),
        "BOOL" => SqlValue::Bool(get::<bool>(row)?),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => SqlValue::Text(get::<String>(row)?),
        "UUID" => SqlValue::Uuid(get::<Uuid>(row)?),
        "TIMESTAMPTZ" => SqlValue::Timestamp(get::<DateTime<Utc>>(row)?),
        "TIMESTAMP" => SqlValue::Timestamp(get::<NaiveDateTime>(row)?.and_utc()),
        "JSON" | "JSONB" => SqlValue::Json(get::<serde_json::Value>(row)?),
        other => {
            return Err(DataError::Other(format!(
                "Unsupported scalar column type {other}"
            )))
        }
    };
    Ok(value)
}

fn get<'r, T>(row: &'r PgRow) -> Result<T, DataError>
where
    T: sqlx::Decode<'r, Postgres> + Type<Postgres>,
{
    row.try_get::<T, _>(0).map_err(SqlxErrorExt::into_data_error)
}

use crate::error::DataError;

/// Converts one result row into a domain value.
///
/// The executor never inspects the produced value; it only collects it. Any
/// `Err` aborts the enclosing read.
///
/// Closures implement this trait directly:
///
/// ```ignore
/// let users = executor
///     .get(LIST_USERS, "user", |row: &PgRow| {
///         Ok(User { id: row.try_get("id").map_err(|e| e.into_data_error())?, .. })
///     }, &[])
///     .await?;
/// ```
pub trait RowMapper<R, T>: Send + Sync {
    fn map_row(&self, row: &R) -> Result<T, DataError>;
}

impl<R, T, F> RowMapper<R, T> for F
where
    F: Fn(&R) -> Result<T, DataError> + Send + Sync,
{
    fn map_row(&self, row: &R) -> Result<T, DataError> {
        self(row)
    }
}

use crate::{AsValue, Error, QueryFilter, Result, Value, truncate_long};
use std::{
    fmt::{self, Debug, Display},
    sync::Arc,
};

/// SQL text with positional `?` placeholders and the filter binding them.
///
/// ```rust
/// use idp_core::{Parameters, QuerySpec};
/// let by_name = |p: &mut Parameters| p.bind("google").map(|_| ());
/// let spec = QuerySpec::new("SELECT id FROM idp WHERE name = ?").filter(&by_name);
/// assert!(spec.query_filter().is_some());
/// ```
#[derive(Clone, Copy)]
pub struct QuerySpec<'a> {
    sql: &'a str,
    filter: Option<&'a dyn QueryFilter>,
}

impl<'a> QuerySpec<'a> {
    pub fn new(sql: &'a str) -> Self {
        Self { sql, filter: None }
    }
    pub fn filter(mut self, filter: &'a dyn QueryFilter) -> Self {
        self.filter = Some(filter);
        self
    }
    pub fn sql(&self) -> &'a str {
        self.sql
    }
    pub fn query_filter(&self) -> Option<&'a dyn QueryFilter> {
        self.filter
    }
}

impl<'a> From<&'a str> for QuerySpec<'a> {
    fn from(sql: &'a str) -> Self {
        Self::new(sql)
    }
}

impl<'a> From<&'a String> for QuerySpec<'a> {
    fn from(sql: &'a String) -> Self {
        Self::new(sql)
    }
}

impl Debug for QuerySpec<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuerySpec")
            .field("sql", &self.sql)
            .field("filter", &self.filter.is_some())
            .finish()
    }
}

impl Display for QuerySpec<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", truncate_long!(self.sql))
    }
}

/// Metadata about modify operations (INSERT/UPDATE/DELETE).
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowsAffected {
    /// Total number of rows impacted.
    pub rows_affected: u64,
    /// Backend-specific last inserted identifier when available.
    pub last_affected_id: Option<i64>,
}

/// Shared reference-counted column name list.
pub type RowNames = Arc<[String]>;
/// Owned row value slice matching `RowNames` length.
pub type Row = Box<[Value]>;

/// A result row with its corresponding column labels.
#[derive(Debug, Clone)]
pub struct RowLabeled {
    /// Column names.
    pub labels: RowNames,
    /// Data values (aligned by index with `labels`).
    pub values: Row,
}

impl RowLabeled {
    pub fn new(names: RowNames, values: Row) -> Self {
        Self {
            labels: names,
            values,
        }
    }
    pub fn names(&self) -> &[String] {
        &self.labels
    }
    pub fn values(&self) -> &[Value] {
        &self.values
    }
    pub fn len(&self) -> usize {
        self.values.len()
    }
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
    pub fn get_column(&self, name: &str) -> Option<&Value> {
        self.labels
            .iter()
            .position(|v| v.eq_ignore_ascii_case(name))
            .map(|i| &self.values()[i])
    }
    /// Value at a zero-based position or column name.
    pub fn get(&self, column: impl ColumnIndex) -> Option<&Value> {
        column.index(self).map(|i| &self.values[i])
    }
    /// Decode the value at `column` into `T`.
    pub fn get_as<T: AsValue>(&self, column: impl ColumnIndex) -> Result<T> {
        let Some(index) = column.index(self) else {
            return Err(Error::msg(format!(
                "Column {} does not exist in the row (columns: {})",
                column.describe(),
                self.labels.join(", ")
            )));
        };
        T::try_from_value(self.values[index].clone()).map_err(|e| {
            e.context(format!(
                "While decoding column `{}`",
                self.labels.get(index).map(String::as_str).unwrap_or("?")
            ))
        })
    }
}

/// Something that addresses a column inside a [`RowLabeled`].
pub trait ColumnIndex {
    fn index(&self, row: &RowLabeled) -> Option<usize>;
    fn describe(&self) -> String;
}

impl ColumnIndex for usize {
    fn index(&self, row: &RowLabeled) -> Option<usize> {
        (*self < row.values.len()).then_some(*self)
    }
    fn describe(&self) -> String {
        format!("#{self}")
    }
}

impl ColumnIndex for &str {
    fn index(&self, row: &RowLabeled) -> Option<usize> {
        row.labels.iter().position(|v| v.eq_ignore_ascii_case(self))
    }
    fn describe(&self) -> String {
        format!("`{self}`")
    }
}

impl From<RowLabeled> for Row {
    fn from(value: RowLabeled) -> Self {
        value.values
    }
}

impl Extend<RowsAffected> for RowsAffected {
    fn extend<T: IntoIterator<Item = RowsAffected>>(&mut self, iter: T) {
        for elem in iter {
            self.rows_affected += elem.rows_affected;
            if elem.last_affected_id.is_some() {
                self.last_affected_id = elem.last_affected_id;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> RowLabeled {
        RowLabeled::new(
            ["ID".to_string(), "NAME".to_string()].into(),
            [Value::Int64(Some(7)), Value::Varchar(Some("google".into()))].into(),
        )
    }

    #[test]
    fn columns_by_index_and_name() {
        let row = row();
        assert_eq!(row.get(0), Some(&Value::Int64(Some(7))));
        assert_eq!(row.get("name"), Some(&Value::Varchar(Some("google".into()))));
        assert_eq!(row.get(2), None);
        assert_eq!(row.get_as::<i64>("id").unwrap(), 7);
        assert_eq!(row.get_as::<String>(1).unwrap(), "google");
    }

    #[test]
    fn missing_column_is_an_error() {
        let error = row().get_as::<i64>("missing").unwrap_err();
        assert!(format!("{error}").contains("`missing`"));
    }

    #[test]
    fn rows_affected_extend() {
        let mut total = RowsAffected::default();
        total.extend([
            RowsAffected {
                rows_affected: 2,
                last_affected_id: Some(4),
            },
            RowsAffected {
                rows_affected: 1,
                last_affected_id: None,
            },
        ]);
        assert_eq!(total.rows_affected, 3);
        assert_eq!(total.last_affected_id, Some(4));
    }
}

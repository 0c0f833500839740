use crate::{Parameters, Result, RowLabeled};

/// Converts one result row into a domain object.
///
/// `index` is the zero-based position of the row inside the result set. Any
/// closure `Fn(&RowLabeled, usize) -> Result<T>` is a row mapper.
pub trait RowMapper<T> {
    fn map_row(&self, row: &RowLabeled, index: usize) -> Result<T>;
}

impl<T, F> RowMapper<T> for F
where
    F: Fn(&RowLabeled, usize) -> Result<T>,
{
    fn map_row(&self, row: &RowLabeled, index: usize) -> Result<T> {
        self(row, index)
    }
}

/// Binds the caller supplied values onto the placeholders of a statement.
///
/// Must bind the same number of parameters, in the same order, as the SQL
/// text declares. Any closure `Fn(&mut Parameters) -> Result<()>` is a filter.
pub trait QueryFilter {
    fn filter(&self, parameters: &mut Parameters) -> Result<()>;
}

impl<F> QueryFilter for F
where
    F: Fn(&mut Parameters) -> Result<()>,
{
    fn filter(&self, parameters: &mut Parameters) -> Result<()> {
        self(parameters)
    }
}

/// Filter binding a fixed list of values in order.
impl QueryFilter for Parameters {
    fn filter(&self, parameters: &mut Parameters) -> Result<()> {
        for (index, value) in self.iter() {
            parameters.bind_index(value.clone(), index)?;
        }
        Ok(())
    }
}

use crate::{AsValue, Error, Result, Value, separated_by};
use std::fmt::{self, Display};

/// A backend prepared statement accepting positional parameters.
///
/// # Binding Semantics
/// * `bind_value` sets the parameter at `index`, counting from 1 in the order
///   the placeholders appear in the SQL text.
/// * `clear_bindings` resets every parameter to NULL.
pub trait Prepared {
    /// Bind a value at a specific index.
    fn bind_value(&mut self, value: Value, index: u64) -> Result<()>;
    /// Remove all the previously bound values.
    fn clear_bindings(&mut self) -> Result<()>;
}

/// Parameter-binding handle handed to a [`QueryFilter`](crate::QueryFilter).
///
/// Values are collected here in binding order and applied to the prepared
/// statement right before it executes, so the same list can be reported when
/// the query fails.
///
/// Methods return `&mut Self` for fluent chaining:
/// ```rust
/// use idp_core::Parameters;
/// let mut parameters = Parameters::new();
/// parameters.bind(42)?.bind("hello")?.bind_index(true, 5)?;
/// assert_eq!(parameters.len(), 3);
/// # Ok::<(), idp_core::Error>(())
/// ```
#[derive(Default, Debug, Clone, PartialEq)]
pub struct Parameters {
    values: Vec<(u64, Value)>,
    index: u64,
}

impl Parameters {
    pub fn new() -> Self {
        Self {
            values: Vec::new(),
            index: 1,
        }
    }
    /// Append a parameter value after the last bound index.
    pub fn bind(&mut self, value: impl Into<Value>) -> Result<&mut Self> {
        let index = self.index.max(1);
        self.bind_index(value, index)
    }
    /// Bind a value at a specific index (from 1).
    pub fn bind_index(&mut self, value: impl Into<Value>, index: u64) -> Result<&mut Self> {
        if index == 0 {
            return Err(Error::msg(
                "Query parameters are numbered from 1, cannot bind index 0",
            ));
        }
        let Some(next) = index.checked_add(1) else {
            return Err(Error::msg(format!(
                "Parameter index {index} is out of range"
            )));
        };
        let value = value.into();
        match self.values.iter_mut().find(|(i, _)| *i == index) {
            Some(slot) => slot.1 = value,
            None => self.values.push((index, value)),
        }
        self.index = next;
        Ok(self)
    }
    /// Bind a typed NULL.
    pub fn bind_null<T: AsValue>(&mut self) -> Result<&mut Self> {
        self.bind(T::as_empty_value())
    }
    pub fn len(&self) -> usize {
        self.values.len()
    }
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
    pub fn get(&self, index: u64) -> Option<&Value> {
        self.values
            .iter()
            .find_map(|(i, v)| (*i == index).then_some(v))
    }
    pub fn iter(&self) -> impl Iterator<Item = (u64, &Value)> {
        self.values.iter().map(|(i, v)| (*i, v))
    }
    /// Apply every collected value onto `prepared`.
    pub fn apply_to<P: Prepared + ?Sized>(&self, prepared: &mut P) -> Result<()> {
        for (index, value) in &self.values {
            prepared.bind_value(value.clone(), *index)?;
        }
        Ok(())
    }
}

impl Display for Parameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::from("[");
        separated_by(
            &mut out,
            &self.values,
            |out, (i, v)| out.push_str(&format!("{i}: {v}")),
            ", ",
        );
        out.push(']');
        f.write_str(&out)
    }
}

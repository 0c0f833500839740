mod as_value;
mod connection;
mod error;
mod mapper;
mod prepared;
mod query;
mod template;
mod util;
mod value;

pub use ::anyhow::Context;
pub use as_value::*;
pub use connection::*;
pub use error::*;
pub use mapper::*;
pub use prepared::*;
pub use query::*;
pub use template::*;
pub use util::*;
pub use value::*;

pub type Result<T> = anyhow::Result<T>;
pub type Error = anyhow::Error;

mod dao;
mod model;

pub use dao::*;
pub use idp_core::*;
pub use model::*;

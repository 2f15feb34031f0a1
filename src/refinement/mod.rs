pub mod slots;
pub mod query;

pub use slots::*;
pub use query::*;

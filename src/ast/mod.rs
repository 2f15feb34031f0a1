pub mod value;
pub mod filter;
pub mod expression;
pub mod schema;
pub mod dialogue;
pub mod manip;

pub use value::*;
pub use filter::*;
pub use expression::*;
pub use schema::*;
pub use dialogue::*;

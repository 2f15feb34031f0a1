pub mod info;
pub mod phrases;
pub mod proposal;
pub mod tags;

pub use info::*;
pub use phrases::*;
pub use proposal::*;
pub use tags::*;

pub mod manip;
pub mod reply;

pub use manip::*;
pub use reply::*;

//! Supertype computation and the memory-bounded fuser behind the `fuse`
//! and `shape` operators.

mod fuser;
mod supertype;
mod upcast;

pub use fuser::{Fuser, FuserReader};
pub use supertype::fuse;
pub use upcast::upcast;

pub mod build;
pub mod coerce;
pub mod compare;
mod display;
mod value;

pub use coerce::Number;
pub use compare::{compare, equal, hash_key};
pub use value::Value;

#[cfg(test)]
mod display_test;
#[cfg(test)]
mod value_test;

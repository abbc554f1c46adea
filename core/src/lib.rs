//! Engine of the sluice dataflow runtime.
//!
//! Values are self-describing: every [`value::Value`] carries its
//! [`types::Type`], and types are interned per query in a
//! [`types::TypeContext`]. Operators move [`vector::Vector`]s of values
//! through a pull-based graph built by [`runtime::Builder`].

pub mod agg;
pub mod codec;
pub mod error;
pub mod expr;
pub mod fuse;
pub mod op;
pub mod runtime;
pub mod types;
pub mod value;
pub mod vector;

pub use error::{Error, Result};
pub use runtime::dag::Program;
pub use runtime::{Batch, Builder, Puller, RuntimeContext, RuntimeOptions, collect_values};
pub use types::{Type, TypeContext};
pub use value::Value;

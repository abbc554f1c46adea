pub mod context;
pub mod encoding;
mod types;

pub use context::TypeContext;
pub use types::{Field, FieldFlags, ID_FIRST_COMPOSITE, Kind, Primitive, Type, TypeKind};

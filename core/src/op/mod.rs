//! Operators.
//!
//! Each operator is a [`crate::runtime::Puller`] over one or more parents.
//! Most run on the caller's thread; [`combine::Combine`],
//! [`join::Join`] and anything built on [`crate::runtime::Mux`] pull
//! their parents from worker threads.

pub mod aggregate;
pub mod combine;
pub mod debug;
pub mod drop;
pub mod explode;
pub mod filter;
pub mod fork;
pub mod fuse;
pub mod join;
pub mod limit;
pub mod load;
pub mod merge;
pub mod mirror;
pub mod output;
pub mod put;
pub mod rename;
pub mod scan;
pub mod sort;
pub mod switch;
pub mod top;
pub mod uniq;
pub mod unnest;
pub mod values;

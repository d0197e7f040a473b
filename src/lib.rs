pub mod app;
pub mod config;
pub mod cql;
pub mod filter;
pub mod sinks;

pub use cql::{Cql, CqlError, read, write};
pub use filter::Predicate;

//! cljdb-core: a file-backed relational query engine.
//!
//! Tables live on disk as a catalog (`<table>_catalog`, JSON) plus either a
//! CSV file (`<table>_table.csv`) or a paged heap file (`<table>_table.cljdb`).
//! Query plans are chains of lazy, pull-based operators (see [`ops`]) run
//! against a shared [`ops::Environment`] by the [`executor`].

pub mod catalog;
pub mod codec;
pub mod diagnostics;
pub mod error;
pub mod executor;
pub mod heap;
pub mod ops;
pub mod page;
pub mod tuple;

pub use error::{Error, Result};

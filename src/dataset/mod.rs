//! Disclosure dataset loading.
//!
//! Fetching, parsing, and caching of quarterly disclosure tables.

pub mod cache;
pub mod columns;
pub mod fetcher;
pub mod parser;

pub use cache::{DatasetCache, LoadOrigin, LoadReport};
pub use fetcher::{DatasetSource, HttpSource, HttpSourceOptions};
pub use parser::ParseOptions;

//! Result rendering and CSV export.

pub mod export;
pub mod generator;

pub use export::ExportSummary;

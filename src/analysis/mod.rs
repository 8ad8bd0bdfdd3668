//! Query and aggregation over loaded disclosure tables.

pub mod aggregator;
pub mod search;

pub use aggregator::{company_stats, top_sponsors, DEFAULT_TOP_JOB_TITLES, DEFAULT_TOP_LOCATIONS};
pub use search::search;

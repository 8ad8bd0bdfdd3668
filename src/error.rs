//! Error taxonomy for dataset loading and queries.

use crate::models::Period;
use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by the loader, query engine and aggregator.
#[derive(Debug, Error)]
pub enum LcaError {
    /// The remote period does not exist or the fetch exhausted its retries.
    #[error("Disclosure data for {period} is unavailable: {reason}")]
    DataUnavailable { period: Period, reason: String },

    /// The source file structure was not recognized.
    #[error("Failed to parse disclosure file: {reason}")]
    Parse { reason: String },

    /// A query ran before any successful load of the needed period.
    #[error("{}", no_data_message(.period))]
    NoDataLoaded { period: Option<Period> },

    /// No employer matched the requested company name.
    #[error("No records found for {company}")]
    CompanyNotFound { company: String },

    #[error("Invalid period {year} Q{quarter}: quarter must be 1-4 and year 2000-2100")]
    InvalidPeriod { year: i64, quarter: i64 },

    /// Export filenames must stay inside the export directory.
    #[error("Invalid export filename {filename:?}: use a plain relative name")]
    InvalidExportPath { filename: String },

    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn no_data_message(period: &Option<Period>) -> String {
    match period {
        Some(p) => format!("No data loaded for {}. Load it first.", p),
        None => "Data not loaded. Load a period first.".to_string(),
    }
}

impl LcaError {
    pub fn parse(reason: impl Into<String>) -> Self {
        LcaError::Parse {
            reason: reason.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LcaError::Io {
            path: path.into(),
            source,
        }
    }

    /// Stable machine-readable kind, used in tool results.
    pub fn kind(&self) -> &'static str {
        match self {
            LcaError::DataUnavailable { .. } => "data_unavailable",
            LcaError::Parse { .. } => "parse_error",
            LcaError::NoDataLoaded { .. } => "no_data_loaded",
            LcaError::CompanyNotFound { .. } => "company_not_found",
            LcaError::InvalidPeriod { .. } => "invalid_period",
            LcaError::InvalidExportPath { .. } => "invalid_export_path",
            LcaError::Io { .. } => "io_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = LcaError::NoDataLoaded { period: None };
        assert_eq!(err.to_string(), "Data not loaded. Load a period first.");

        let err = LcaError::NoDataLoaded {
            period: Some(Period::default()),
        };
        assert!(err.to_string().contains("2024 Q4"));

        let err = LcaError::CompanyNotFound {
            company: "Initech".to_string(),
        };
        assert_eq!(err.to_string(), "No records found for Initech");
        assert_eq!(err.kind(), "company_not_found");
    }
}

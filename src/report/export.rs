//! CSV export of search results.

use crate::error::LcaError;
use crate::models::DisclosureRecord;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Column order of exported files.
pub const EXPORT_HEADER: &[&str] = &[
    "employer",
    "job_title",
    "city",
    "state",
    "wage",
    "wage_unit",
    "annual_wage",
    "case_status",
    "contact",
];

/// Result of an export call.
#[derive(Debug, Clone, Serialize)]
pub struct ExportSummary {
    pub file_path: PathBuf,
    pub records_exported: usize,
    /// Matches before the export cap was applied.
    pub total_matches: usize,
}

#[derive(Serialize)]
struct ExportRow<'a> {
    employer: &'a str,
    job_title: &'a str,
    city: &'a str,
    state: &'a str,
    wage: Option<f64>,
    wage_unit: String,
    annual_wage: Option<f64>,
    case_status: String,
    contact: Option<&'a str>,
}

impl<'a> From<&'a DisclosureRecord> for ExportRow<'a> {
    fn from(r: &'a DisclosureRecord) -> Self {
        Self {
            employer: &r.employer,
            job_title: &r.job_title,
            city: &r.city,
            state: &r.state,
            wage: r.wage,
            wage_unit: r.wage_unit.to_string(),
            annual_wage: r.annual_wage().map(|w| w.round()),
            case_status: r.case_status.to_string(),
            contact: r.contact.as_deref(),
        }
    }
}

/// Write records to `path` as CSV, creating the parent directory if needed.
pub fn write_csv(path: &Path, records: &[DisclosureRecord]) -> Result<usize, LcaError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| LcaError::io(parent, e))?;
    }

    let csv_err = |e: csv::Error| LcaError::io(path, std::io::Error::from(e));

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(csv_err)?;

    writer.write_record(EXPORT_HEADER).map_err(csv_err)?;
    for record in records {
        writer.serialize(ExportRow::from(record)).map_err(csv_err)?;
    }
    writer.flush().map_err(|e| LcaError::io(path, e))?;

    info!("Exported {} records to {}", records.len(), path.display());
    Ok(records.len())
}

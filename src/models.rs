//! Data models for the disclosure search engine.
//!
//! This module contains the core data structures used throughout
//! the application for representing disclosure records, loaded tables,
//! search filters, and computed statistics.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::error::LcaError;

/// A fiscal (year, quarter) disclosure period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Period {
    pub year: i32,
    pub quarter: u8,
}

impl Period {
    /// Create a period, rejecting quarters outside 1-4.
    pub fn new(year: i32, quarter: u8) -> Result<Self, LcaError> {
        Self::from_parts(year as i64, quarter as i64)
    }

    /// Create a period from unvalidated integers (tool or CLI input).
    pub fn from_parts(year: i64, quarter: i64) -> Result<Self, LcaError> {
        if !(1..=4).contains(&quarter) || !(2000..=2100).contains(&year) {
            return Err(LcaError::InvalidPeriod { year, quarter });
        }
        Ok(Self {
            year: year as i32,
            quarter: quarter as u8,
        })
    }

    /// The calendar quarter containing `now`.
    pub fn containing(now: DateTime<Utc>) -> Self {
        Self {
            year: now.year(),
            quarter: ((now.month() - 1) / 3 + 1) as u8,
        }
    }

    /// File stem used for cached source files, e.g. `LCA_2024Q4`.
    pub fn file_stem(&self) -> String {
        format!("LCA_{}Q{}", self.year, self.quarter)
    }
}

impl Default for Period {
    fn default() -> Self {
        Self {
            year: 2024,
            quarter: 4,
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Q{}", self.year, self.quarter)
    }
}

/// Unit a wage is quoted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WageUnit {
    Hour,
    Week,
    BiWeekly,
    Month,
    #[default]
    Year,
}

impl WageUnit {
    /// Multiplier that converts a wage in this unit to a yearly figure.
    pub fn annual_factor(&self) -> f64 {
        match self {
            WageUnit::Hour => 2080.0,
            WageUnit::Week => 52.0,
            WageUnit::BiWeekly => 26.0,
            WageUnit::Month => 12.0,
            WageUnit::Year => 1.0,
        }
    }
}

impl fmt::Display for WageUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WageUnit::Hour => write!(f, "Hour"),
            WageUnit::Week => write!(f, "Week"),
            WageUnit::BiWeekly => write!(f, "Bi-Weekly"),
            WageUnit::Month => write!(f, "Month"),
            WageUnit::Year => write!(f, "Year"),
        }
    }
}

impl From<&str> for WageUnit {
    fn from(s: &str) -> Self {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphabetic())
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "hour" | "hourly" | "hr" | "h" => WageUnit::Hour,
            "week" | "weekly" | "wk" => WageUnit::Week,
            "biweekly" => WageUnit::BiWeekly,
            "month" | "monthly" | "mth" => WageUnit::Month,
            _ => WageUnit::Year,
        }
    }
}

/// Case status of an application.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    Certified,
    CertifiedWithdrawn,
    Denied,
    Withdrawn,
    Other(String),
}

impl CaseStatus {
    pub fn is_certified(&self) -> bool {
        matches!(self, CaseStatus::Certified)
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaseStatus::Certified => write!(f, "Certified"),
            CaseStatus::CertifiedWithdrawn => write!(f, "Certified - Withdrawn"),
            CaseStatus::Denied => write!(f, "Denied"),
            CaseStatus::Withdrawn => write!(f, "Withdrawn"),
            CaseStatus::Other(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for CaseStatus {
    fn from(s: &str) -> Self {
        let normalized: String = s
            .to_uppercase()
            .split(|c: char| !c.is_ascii_alphabetic())
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        match normalized.as_str() {
            "CERTIFIED" => CaseStatus::Certified,
            "CERTIFIED WITHDRAWN" => CaseStatus::CertifiedWithdrawn,
            "DENIED" => CaseStatus::Denied,
            "WITHDRAWN" => CaseStatus::Withdrawn,
            _ => CaseStatus::Other(s.trim().to_string()),
        }
    }
}

/// One row of a loaded disclosure table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisclosureRecord {
    /// Employer name as published.
    pub employer: String,
    /// Job title as published.
    pub job_title: String,
    /// Work-site city.
    pub city: String,
    /// Work-site state (two-letter code in current releases).
    pub state: String,
    /// Offered wage, `None` when the source value did not parse.
    pub wage: Option<f64>,
    /// Unit the wage is quoted in.
    pub wage_unit: WageUnit,
    /// Case status.
    pub case_status: CaseStatus,
    pub fiscal_year: i32,
    pub fiscal_quarter: u8,
    /// Employer point-of-contact e-mail or phone, when published.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
}

impl DisclosureRecord {
    /// Wage normalized to a yearly figure.
    pub fn annual_wage(&self) -> Option<f64> {
        self.wage.map(|w| w * self.wage_unit.annual_factor())
    }

    /// Work location formatted as `City, ST`.
    pub fn location(&self) -> String {
        match (self.city.is_empty(), self.state.is_empty()) {
            (false, false) => format!("{}, {}", self.city, self.state),
            (false, true) => self.city.clone(),
            (true, false) => self.state.clone(),
            (true, true) => "Unknown".to_string(),
        }
    }
}

/// A fully parsed disclosure table for one period.
#[derive(Debug, Clone)]
pub struct DisclosureTable {
    pub period: Period,
    pub records: Vec<DisclosureRecord>,
    /// Source file the table was parsed from (if any).
    pub source_file: Option<PathBuf>,
    pub loaded_at: DateTime<Utc>,
}

impl DisclosureTable {
    pub fn new(period: Period, records: Vec<DisclosureRecord>) -> Self {
        Self {
            period,
            records,
            source_file: None,
            loaded_at: Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[allow(dead_code)] // Pairs with len()
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Request-scoped job search filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchFilter {
    /// Case-insensitive substring matched against the job title.
    pub job_role: String,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    /// Minimum annualized wage (inclusive).
    #[serde(default)]
    pub min_wage: Option<f64>,
    #[serde(default = "default_true")]
    pub skip_agencies: bool,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    /// Keep only certified applications.
    #[serde(default)]
    pub certified_only: bool,
}

fn default_true() -> bool {
    true
}

fn default_max_results() -> usize {
    50
}

impl SearchFilter {
    /// A filter with the default cap and agency exclusion for the given role.
    pub fn for_role(job_role: impl Into<String>) -> Self {
        Self {
            job_role: job_role.into(),
            city: None,
            state: None,
            min_wage: None,
            skip_agencies: true,
            max_results: default_max_results(),
            certified_only: false,
        }
    }
}

/// Result of a job search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchOutcome {
    /// Matches before the result cap was applied.
    pub total_matches: usize,
    pub records: Vec<DisclosureRecord>,
}

impl SearchOutcome {
    pub fn returned(&self) -> usize {
        self.records.len()
    }
}

/// Wage distribution over annualized wages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WageStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    /// Number of rows that had a parsable wage.
    pub samples: usize,
}

/// A label with an occurrence count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedCount {
    pub name: String,
    pub count: usize,
}

/// Per-company sponsorship statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyStats {
    pub company: String,
    pub total_applications: usize,
    pub certified: usize,
    pub approval_rate: f64,
    pub top_job_titles: Vec<RankedCount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wage_stats: Option<WageStats>,
    pub top_locations: Vec<RankedCount>,
    pub top_states: Vec<RankedCount>,
}

/// One entry of the top sponsor ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SponsorEntry {
    pub employer: String,
    pub applications: usize,
    pub certified: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_wage: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_state: Option<String>,
}

/// Top sponsor ranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopSponsors {
    pub sponsors: Vec<SponsorEntry>,
    /// Distinct employers considered after agency exclusion.
    pub total_companies: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(wage: Option<f64>, unit: WageUnit) -> DisclosureRecord {
        DisclosureRecord {
            employer: "Acme Corp".to_string(),
            job_title: "Software Engineer".to_string(),
            city: "Austin".to_string(),
            state: "TX".to_string(),
            wage,
            wage_unit: unit,
            case_status: CaseStatus::Certified,
            fiscal_year: 2024,
            fiscal_quarter: 4,
            contact: None,
        }
    }

    #[test]
    fn test_period_validation() {
        assert!(Period::new(2024, 4).is_ok());
        assert!(Period::new(2024, 0).is_err());
        assert!(Period::new(2024, 5).is_err());
        assert!(Period::from_parts(2024, -1).is_err());
        assert!(Period::from_parts(1999, 1).is_err());
        assert_eq!(Period::new(2023, 2).unwrap().file_stem(), "LCA_2023Q2");
    }

    #[test]
    fn test_period_containing() {
        let date = DateTime::parse_from_rfc3339("2025-08-14T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(Period::containing(date), Period::new(2025, 3).unwrap());
    }

    #[test]
    fn test_wage_unit_from_str() {
        assert_eq!(WageUnit::from("Hour"), WageUnit::Hour);
        assert_eq!(WageUnit::from("Bi-Weekly"), WageUnit::BiWeekly);
        assert_eq!(WageUnit::from("MONTH"), WageUnit::Month);
        assert_eq!(WageUnit::from("Year"), WageUnit::Year);
        assert_eq!(WageUnit::from(""), WageUnit::Year);
    }

    #[test]
    fn test_case_status_from_str() {
        assert_eq!(CaseStatus::from("CERTIFIED"), CaseStatus::Certified);
        assert_eq!(CaseStatus::from("Certified"), CaseStatus::Certified);
        assert_eq!(
            CaseStatus::from("CERTIFIED-WITHDRAWN"),
            CaseStatus::CertifiedWithdrawn
        );
        assert_eq!(
            CaseStatus::from("Certified - Withdrawn"),
            CaseStatus::CertifiedWithdrawn
        );
        assert_eq!(CaseStatus::from("DENIED"), CaseStatus::Denied);
        assert_eq!(
            CaseStatus::from("pending"),
            CaseStatus::Other("pending".to_string())
        );
        assert!(!CaseStatus::CertifiedWithdrawn.is_certified());
    }

    #[test]
    fn test_annual_wage() {
        assert_eq!(record(Some(50.0), WageUnit::Hour).annual_wage(), Some(104_000.0));
        assert_eq!(record(Some(120_000.0), WageUnit::Year).annual_wage(), Some(120_000.0));
        assert_eq!(record(None, WageUnit::Hour).annual_wage(), None);
    }

    #[test]
    fn test_location() {
        let mut r = record(None, WageUnit::Year);
        assert_eq!(r.location(), "Austin, TX");
        r.state.clear();
        assert_eq!(r.location(), "Austin");
        r.city.clear();
        assert_eq!(r.location(), "Unknown");
    }
}

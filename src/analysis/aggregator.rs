//! Per-company statistics and sponsor rankings.
//!
//! This module groups disclosure records by employer and computes
//! counts, approval rates, and wage distributions.

use crate::agency::AgencyClassifier;
use crate::error::LcaError;
use crate::models::{
    CompanyStats, DisclosureRecord, DisclosureTable, RankedCount, SponsorEntry, TopSponsors,
    WageStats,
};
use std::collections::HashMap;

/// Default number of job titles reported per company.
pub const DEFAULT_TOP_JOB_TITLES: usize = 10;

/// Default number of locations reported per company.
pub const DEFAULT_TOP_LOCATIONS: usize = 5;

/// Statistics for one company.
///
/// Employers are matched case-insensitively: an exact name match wins,
/// otherwise every employer containing `company` is included.
pub fn company_stats(
    table: &DisclosureTable,
    company: &str,
    top_job_titles: usize,
    top_locations: usize,
) -> Result<CompanyStats, LcaError> {
    let needle = company.trim().to_lowercase();
    if needle.is_empty() {
        return Err(LcaError::CompanyNotFound {
            company: company.to_string(),
        });
    }

    let exact: Vec<&DisclosureRecord> = table
        .records
        .iter()
        .filter(|r| r.employer.trim().to_lowercase() == needle)
        .collect();

    let matched: Vec<&DisclosureRecord> = if exact.is_empty() {
        table
            .records
            .iter()
            .filter(|r| r.employer.to_lowercase().contains(&needle))
            .collect()
    } else {
        exact
    };

    if matched.is_empty() {
        return Err(LcaError::CompanyNotFound {
            company: company.to_string(),
        });
    }

    let display_name = rank_by_count(matched.iter().map(|r| r.employer.as_str()), 1)
        .into_iter()
        .next()
        .map(|r| r.name)
        .unwrap_or_else(|| company.to_string());

    let total = matched.len();
    let certified = matched
        .iter()
        .filter(|r| r.case_status.is_certified())
        .count();

    let wages: Vec<f64> = matched.iter().filter_map(|r| r.annual_wage()).collect();
    let locations: Vec<String> = matched.iter().map(|r| r.location()).collect();

    Ok(CompanyStats {
        company: display_name,
        total_applications: total,
        certified,
        approval_rate: certified as f64 / total as f64,
        top_job_titles: rank_by_count(matched.iter().map(|r| r.job_title.as_str()), top_job_titles),
        wage_stats: wage_stats(&wages),
        top_locations: rank_by_count(locations.iter().map(String::as_str), top_locations),
        top_states: rank_by_count(
            matched
                .iter()
                .map(|r| r.state.trim())
                .filter(|s| !s.is_empty()),
            top_locations,
        ),
    })
}

/// Employers ranked by application count.
///
/// Ties are broken by employer name so the ranking is stable across runs.
pub fn top_sponsors(
    table: &DisclosureTable,
    limit: usize,
    exclude_agencies: bool,
    classifier: &AgencyClassifier,
) -> TopSponsors {
    let grouped = group_by_employer(&table.records);

    let mut sponsors: Vec<SponsorEntry> = grouped
        .into_iter()
        .filter(|(employer, _)| !(exclude_agencies && classifier.is_agency(employer)))
        .map(|(employer, records)| sponsor_entry(employer, &records))
        .collect();

    let total_companies = sponsors.len();

    sponsors.sort_by(|a, b| {
        b.applications
            .cmp(&a.applications)
            .then_with(|| a.employer.cmp(&b.employer))
    });
    sponsors.truncate(limit);

    TopSponsors {
        sponsors,
        total_companies,
    }
}

/// Group records by exact employer string.
pub fn group_by_employer(records: &[DisclosureRecord]) -> HashMap<&str, Vec<&DisclosureRecord>> {
    let mut grouped: HashMap<&str, Vec<&DisclosureRecord>> = HashMap::new();

    for record in records {
        grouped
            .entry(record.employer.as_str())
            .or_default()
            .push(record);
    }

    grouped
}

fn sponsor_entry(employer: &str, records: &[&DisclosureRecord]) -> SponsorEntry {
    let wages: Vec<f64> = records.iter().filter_map(|r| r.annual_wage()).collect();
    let average_wage = if wages.is_empty() {
        None
    } else {
        Some(wages.iter().sum::<f64>() / wages.len() as f64)
    };

    SponsorEntry {
        employer: employer.to_string(),
        applications: records.len(),
        certified: records
            .iter()
            .filter(|r| r.case_status.is_certified())
            .count(),
        average_wage,
        primary_state: primary_state(records),
    }
}

/// Most frequent non-empty state; ties go to the smallest state code.
fn primary_state(records: &[&DisclosureRecord]) -> Option<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for record in records {
        let state = record.state.trim();
        if !state.is_empty() {
            *counts.entry(state).or_default() += 1;
        }
    }

    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(state, _)| state.to_string())
}

/// Count occurrences and return the `n` most frequent, ties by first seen.
pub fn rank_by_count<'a>(items: impl Iterator<Item = &'a str>, n: usize) -> Vec<RankedCount> {
    let mut order: Vec<&str> = Vec::new();
    let mut counts: HashMap<&str, usize> = HashMap::new();

    for item in items {
        let count = counts.entry(item).or_default();
        if *count == 0 {
            order.push(item);
        }
        *count += 1;
    }

    let mut ranked: Vec<RankedCount> = order
        .into_iter()
        .map(|name| RankedCount {
            name: name.to_string(),
            count: counts[name],
        })
        .collect();

    // Stable sort keeps first-seen order among equal counts
    ranked.sort_by_key(|r| std::cmp::Reverse(r.count));
    ranked.truncate(n);
    ranked
}

/// Min, max, mean, and median of a wage sample.
pub fn wage_stats(wages: &[f64]) -> Option<WageStats> {
    if wages.is_empty() {
        return None;
    }

    let mut sorted = wages.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let len = sorted.len();
    let median = if len % 2 == 0 {
        (sorted[len / 2 - 1] + sorted[len / 2]) / 2.0
    } else {
        sorted[len / 2]
    };

    Some(WageStats {
        min: sorted[0],
        max: sorted[len - 1],
        mean: sorted.iter().sum::<f64>() / len as f64,
        median,
        samples: len,
    })
}

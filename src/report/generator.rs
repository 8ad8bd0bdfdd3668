//! Terminal output for operation results.
//!
//! This module renders each operation's result either as a human-readable
//! text summary or as pretty JSON.

use crate::models::{CompanyStats, DisclosureRecord, RankedCount, SearchOutcome, TopSponsors};
use crate::report::export::ExportSummary;
use crate::service::{AvailableData, LoadSummary};
use anyhow::Result;
use serde::Serialize;

/// Generate pretty JSON for any result.
pub fn generate_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(Into::into)
}

/// Format a yearly wage as `$123,456`.
pub fn format_wage(wage: f64) -> String {
    let whole = wage.round() as i64;
    let digits = whole.abs().to_string();
    let mut grouped = String::new();

    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    if whole < 0 {
        format!("-${}", grouped)
    } else {
        format!("${}", grouped)
    }
}

pub fn generate_load_text(summary: &LoadSummary) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "Loaded {} records for {} ({:?})\n",
        summary.records, summary.period, summary.origin
    ));
    if let Some(ref path) = summary.cache_file {
        out.push_str(&format!("   Cache file: {}\n", path.display()));
    }
    out.push_str(&format!(
        "   Columns: {}\n",
        summary.mapped_fields.join(", ")
    ));
    if summary.skipped_rows > 0 {
        out.push_str(&format!("   Skipped rows: {}\n", summary.skipped_rows));
    }

    out
}

pub fn generate_search_text(outcome: &SearchOutcome) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "Found {} matches (showing {})\n\n",
        outcome.total_matches,
        outcome.returned()
    ));

    for (i, record) in outcome.records.iter().enumerate() {
        out.push_str(&generate_record_line(i + 1, record));
    }

    out
}

fn generate_record_line(n: usize, record: &DisclosureRecord) -> String {
    let wage = record
        .annual_wage()
        .map(format_wage)
        .unwrap_or_else(|| "n/a".to_string());

    format!(
        "{:>3}. {} | {} | {} | {} | {}\n",
        n,
        record.employer,
        record.job_title,
        record.location(),
        wage,
        record.case_status
    )
}

fn generate_ranked_list(title: &str, items: &[RankedCount]) -> String {
    if items.is_empty() {
        return String::new();
    }

    let mut out = format!("\n{}:\n", title);
    for item in items {
        out.push_str(&format!("- {} ({})\n", item.name, item.count));
    }
    out
}

pub fn generate_company_text(stats: &CompanyStats) -> String {
    let mut out = String::new();

    out.push_str(&format!("{}\n", stats.company));
    out.push_str(&format!(
        "   Applications: {} | Certified: {} | Approval rate: {:.1}%\n",
        stats.total_applications,
        stats.certified,
        stats.approval_rate * 100.0
    ));

    if let Some(ref wages) = stats.wage_stats {
        out.push_str(&format!(
            "   Wages: min {} | median {} | mean {} | max {} ({} samples)\n",
            format_wage(wages.min),
            format_wage(wages.median),
            format_wage(wages.mean),
            format_wage(wages.max),
            wages.samples
        ));
    }

    out.push_str(&generate_ranked_list("Top job titles", &stats.top_job_titles));
    out.push_str(&generate_ranked_list("Top locations", &stats.top_locations));
    out.push_str(&generate_ranked_list("Top states", &stats.top_states));

    out
}

pub fn generate_sponsors_text(ranking: &TopSponsors) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "Top {} of {} sponsoring companies\n\n",
        ranking.sponsors.len(),
        ranking.total_companies
    ));

    for (i, s) in ranking.sponsors.iter().enumerate() {
        let wage = s
            .average_wage
            .map(format_wage)
            .unwrap_or_else(|| "n/a".to_string());
        out.push_str(&format!(
            "{:>3}. {} | {} applications | {} certified | avg {} | {}\n",
            i + 1,
            s.employer,
            s.applications,
            s.certified,
            wage,
            s.primary_state.as_deref().unwrap_or("-")
        ));
    }

    out
}

pub fn generate_export_text(summary: &ExportSummary) -> String {
    format!(
        "Exported {} of {} matches to {}\n",
        summary.records_exported,
        summary.total_matches,
        summary.file_path.display()
    )
}

pub fn generate_available_text(available: &AvailableData) -> String {
    let mut out = String::new();

    out.push_str(&format!("Current quarter: {}\n", available.current_period));
    if let Some(loaded) = available.loaded_period {
        out.push_str(&format!("Loaded: {}\n", loaded));
    }
    out.push_str(&format!(
        "Cache directory: {}\n\n",
        available.cache_directory.display()
    ));

    for status in &available.periods {
        let mut flags = Vec::new();
        if status.on_disk {
            flags.push("on disk");
        }
        if status.in_memory {
            flags.push("in memory");
        }
        out.push_str(&format!("- {}", status.period));
        if !flags.is_empty() {
            out.push_str(&format!(" ({})", flags.join(", ")));
        }
        out.push('\n');
    }

    out.push_str(&format!("\n{}\n", available.note));
    out
}

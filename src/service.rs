//! The operations exposed by lcasearch.
//!
//! [`H1bService`] owns the dataset cache and the agency classifier and
//! is shared by the tool executor and the CLI.

use crate::agency::AgencyClassifier;
use crate::analysis;
use crate::ask::{self, Intent, HELP_EXAMPLES};
use crate::dataset::{DatasetCache, LoadOrigin};
use crate::error::LcaError;
use crate::models::{CompanyStats, Period, SearchFilter, SearchOutcome, TopSponsors};
use crate::report::export::{write_csv, ExportSummary};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// First fiscal year listed by `available_data`.
pub const FIRST_LISTED_YEAR: i32 = 2020;

/// Options that shape query results.
#[derive(Debug, Clone)]
pub struct ServiceOptions {
    /// Directory relative export filenames are written into.
    pub export_dir: PathBuf,
    pub top_job_titles: usize,
    pub top_locations: usize,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            export_dir: PathBuf::from("data_cache"),
            top_job_titles: analysis::DEFAULT_TOP_JOB_TITLES,
            top_locations: analysis::DEFAULT_TOP_LOCATIONS,
        }
    }
}

/// Outcome of a load call.
#[derive(Debug, Clone, Serialize)]
pub struct LoadSummary {
    pub period: Period,
    pub records: usize,
    pub origin: LoadOrigin,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_file: Option<PathBuf>,
    pub mapped_fields: Vec<String>,
    pub skipped_rows: usize,
    pub loaded_at: DateTime<Utc>,
}

/// Cache state of one period.
#[derive(Debug, Clone, Serialize)]
pub struct PeriodStatus {
    pub period: Period,
    pub on_disk: bool,
    pub in_memory: bool,
}

/// Periods that can be requested and what is cached locally.
#[derive(Debug, Clone, Serialize)]
pub struct AvailableData {
    /// Calendar quarter at the time of the call.
    pub current_period: Period,
    /// Most recently loaded period, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loaded_period: Option<Period>,
    pub periods: Vec<PeriodStatus>,
    pub cache_directory: PathBuf,
    pub note: String,
}

/// Response to a plain-language prompt.
#[derive(Debug, Clone, Serialize)]
pub struct AskResponse {
    pub action: String,
    pub intent: Intent,
    /// Result of the chosen operation, or `{"error", "kind"}` on failure.
    pub result: Value,
    pub suggestions: Vec<String>,
}

/// H-1B disclosure query service.
pub struct H1bService {
    cache: Arc<DatasetCache>,
    classifier: AgencyClassifier,
    options: ServiceOptions,
}

impl H1bService {
    pub fn new(
        cache: Arc<DatasetCache>,
        classifier: AgencyClassifier,
        options: ServiceOptions,
    ) -> Self {
        Self {
            cache,
            classifier,
            options,
        }
    }

    pub fn cache(&self) -> &DatasetCache {
        &self.cache
    }

    /// Load (or reuse) the table for a period.
    pub async fn load_data(
        &self,
        period: Period,
        force_download: bool,
    ) -> Result<LoadSummary, LcaError> {
        let report = self.cache.load(period, force_download).await?;

        Ok(LoadSummary {
            period,
            records: report.table.len(),
            origin: report.origin,
            cache_file: report.table.source_file.clone(),
            mapped_fields: report.mapped_fields,
            skipped_rows: report.skipped_rows,
            loaded_at: report.table.loaded_at,
        })
    }

    /// Filtered job search. `period` defaults to the most recently loaded one.
    pub fn search_jobs(
        &self,
        filter: &SearchFilter,
        period: Option<Period>,
    ) -> Result<SearchOutcome, LcaError> {
        let table = self.cache.table_for(period)?;
        debug!("Searching {} records for {:?}", table.len(), filter.job_role);
        Ok(analysis::search(&table, filter, &self.classifier))
    }

    pub fn company_stats(
        &self,
        company: &str,
        period: Option<Period>,
    ) -> Result<CompanyStats, LcaError> {
        let table = self.cache.table_for(period)?;
        analysis::company_stats(
            &table,
            company,
            self.options.top_job_titles,
            self.options.top_locations,
        )
    }

    pub fn top_sponsors(
        &self,
        limit: usize,
        exclude_agencies: bool,
        period: Option<Period>,
    ) -> Result<TopSponsors, LcaError> {
        let table = self.cache.table_for(period)?;
        Ok(analysis::top_sponsors(
            &table,
            limit,
            exclude_agencies,
            &self.classifier,
        ))
    }

    /// Run a search and write the capped results to CSV.
    ///
    /// `filename` is resolved inside the export directory; absolute paths
    /// and `..` components are rejected.
    pub fn export_results(
        &self,
        filter: &SearchFilter,
        filename: &str,
        period: Option<Period>,
    ) -> Result<ExportSummary, LcaError> {
        let path = self.export_path(filename)?;
        let outcome = self.search_jobs(filter, period)?;
        let records_exported = write_csv(&path, &outcome.records)?;

        Ok(ExportSummary {
            file_path: path,
            records_exported,
            total_matches: outcome.total_matches,
        })
    }

    fn export_path(&self, filename: &str) -> Result<PathBuf, LcaError> {
        let name = Path::new(filename);
        let mut components = name.components().peekable();
        let contained = components.peek().is_some()
            && components.all(|c| matches!(c, Component::Normal(_) | Component::CurDir));

        if !contained || name.file_name().is_none() {
            return Err(LcaError::InvalidExportPath {
                filename: filename.to_string(),
            });
        }
        Ok(self.options.export_dir.join(name))
    }

    /// Requestable periods from 2020 through the current quarter.
    pub fn available_data(&self) -> AvailableData {
        self.available_data_at(Utc::now())
    }

    fn available_data_at(&self, now: DateTime<Utc>) -> AvailableData {
        let current = Period::containing(now);
        let loaded = self.cache.loaded_periods();

        let mut periods = Vec::new();
        for year in FIRST_LISTED_YEAR..=current.year {
            for quarter in 1..=4u8 {
                let period = Period { year, quarter };
                if period > current {
                    break;
                }
                periods.push(PeriodStatus {
                    period,
                    on_disk: self.cache.cached_file(period).is_some(),
                    in_memory: loaded.contains(&period),
                });
            }
        }

        AvailableData {
            current_period: current,
            loaded_period: self.cache.current_period(),
            periods,
            cache_directory: self.cache.cache_dir().to_path_buf(),
            note: "LCA data is typically available with a 1-quarter delay".to_string(),
        }
    }

    /// Interpret a prompt and run the matching operation.
    pub async fn ask(&self, prompt: &str) -> AskResponse {
        let intent = ask::parse_prompt(prompt);
        info!("Prompt interpreted as {}", intent.action());

        let mut first_employer = None;
        let result = match &intent {
            Intent::Load {
                year,
                quarter,
                force,
            } => match Period::from_parts(*year, *quarter) {
                Ok(period) => to_value(self.load_data(period, *force).await),
                Err(e) => error_value(&e),
            },
            Intent::Search { filter } => {
                let outcome = self.search_jobs(filter, None);
                if let Ok(ref o) = outcome {
                    first_employer = o.records.first().map(|r| r.employer.clone());
                }
                to_value(outcome)
            }
            Intent::CompanyStats { company } => to_value(self.company_stats(company, None)),
            Intent::TopSponsors {
                limit,
                exclude_agencies,
            } => to_value(self.top_sponsors(*limit, *exclude_agencies, None)),
            Intent::Export { filter, filename } => {
                to_value(self.export_results(filter, filename, None))
            }
            Intent::AvailableData => to_value(Ok(self.available_data())),
            Intent::Help => json!({
                "message": "I can help you search for H-1B sponsoring companies! Here's what you can ask:",
                "examples": HELP_EXAMPLES,
            }),
        };

        let next_period = Period::containing(Utc::now());
        let suggestions = intent.suggestions(first_employer.as_deref(), next_period);

        AskResponse {
            action: intent.action().to_string(),
            intent,
            result,
            suggestions,
        }
    }
}

fn to_value<T: Serialize>(result: Result<T, LcaError>) -> Value {
    match result {
        Ok(v) => serde_json::to_value(v).unwrap_or(Value::Null),
        Err(e) => error_value(&e),
    }
}

/// JSON body describing a failed operation.
pub fn error_value(e: &LcaError) -> Value {
    json!({
        "error": e.to_string(),
        "kind": e.kind(),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::analysis::search::tests::sample_table;
    use crate::dataset::cache::tests::{FakeSource, SAMPLE_CSV};
    use crate::dataset::ParseOptions;
    use tempfile::TempDir;

    pub(crate) fn service_with_source(dir: &TempDir, source: Arc<FakeSource>) -> H1bService {
        let cache = DatasetCache::new(dir.path().join("cache"), source, ParseOptions::default());
        let options = ServiceOptions {
            export_dir: dir.path().join("exports"),
            ..ServiceOptions::default()
        };
        H1bService::new(Arc::new(cache), AgencyClassifier::default(), options)
    }

    fn loaded_service(dir: &TempDir) -> H1bService {
        let service = service_with_source(dir, FakeSource::missing());
        service.cache().insert(sample_table());
        service
    }

    #[test]
    fn test_load_data_summary() {
        let dir = TempDir::new().unwrap();
        let source = FakeSource::serving(SAMPLE_CSV);
        let service = service_with_source(&dir, source.clone());
        let period = Period::new(2024, 2).unwrap();

        let summary = tokio_test::block_on(service.load_data(period, false)).unwrap();
        assert_eq!(summary.records, 3);
        assert_eq!(summary.origin, LoadOrigin::Remote);
        assert!(summary.mapped_fields.contains(&"employer".to_string()));
        assert!(summary.cache_file.unwrap().ends_with("LCA_2024Q2.csv"));

        let again = tokio_test::block_on(service.load_data(period, false)).unwrap();
        assert_eq!(again.records, 3);
        assert_eq!(source.count(), 1);
    }

    #[test]
    fn test_queries_before_load() {
        let dir = TempDir::new().unwrap();
        let service = service_with_source(&dir, FakeSource::missing());

        let err = service
            .search_jobs(&SearchFilter::for_role("engineer"), None)
            .unwrap_err();
        assert!(matches!(err, LcaError::NoDataLoaded { .. }));
        assert!(service.company_stats("Google", None).is_err());
        assert!(service.top_sponsors(10, true, None).is_err());
    }

    #[test]
    fn test_queries_default_to_current_period() {
        let dir = TempDir::new().unwrap();
        let service = loaded_service(&dir);

        let outcome = service
            .search_jobs(&SearchFilter::for_role("engineer"), None)
            .unwrap();
        assert_eq!(outcome.total_matches, 3);

        let stats = service.company_stats("google", None).unwrap();
        assert_eq!(stats.total_applications, 2);

        let other = Period::new(2021, 1).unwrap();
        let err = service.top_sponsors(5, true, Some(other)).unwrap_err();
        assert!(matches!(err, LcaError::NoDataLoaded { period: Some(_) }));
    }

    #[test]
    fn test_export_results() {
        let dir = TempDir::new().unwrap();
        let service = loaded_service(&dir);

        let filter = SearchFilter {
            max_results: 1,
            ..SearchFilter::for_role("software engineer")
        };
        let summary = service
            .export_results(&filter, "swe.csv", None)
            .unwrap();

        assert_eq!(summary.records_exported, 1);
        assert_eq!(summary.total_matches, 3);
        assert_eq!(summary.file_path, dir.path().join("exports/swe.csv"));
        let content = std::fs::read_to_string(&summary.file_path).unwrap();
        assert_eq!(content.lines().count(), 2);
    }

    #[test]
    fn test_export_stays_in_export_dir() {
        let dir = TempDir::new().unwrap();
        let service = loaded_service(&dir);
        let filter = SearchFilter::for_role("engineer");

        let nested = service
            .export_results(&filter, "reports/swe.csv", None)
            .unwrap();
        assert_eq!(nested.file_path, dir.path().join("exports/reports/swe.csv"));

        let outside = dir.path().join("outside.csv");
        for name in [
            "../outside.csv",
            "reports/../../outside.csv",
            outside.to_str().unwrap(),
            "",
        ] {
            let err = service.export_results(&filter, name, None).unwrap_err();
            assert_eq!(err.kind(), "invalid_export_path", "{}", name);
        }
        assert!(!outside.exists());
    }

    #[test]
    fn test_available_data() {
        let dir = TempDir::new().unwrap();
        let service = loaded_service(&dir);
        let now = DateTime::parse_from_rfc3339("2021-05-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);

        let available = service.available_data_at(now);
        assert_eq!(available.current_period, Period::new(2021, 2).unwrap());
        assert_eq!(available.periods.len(), 6);
        assert_eq!(available.loaded_period, Some(Period::default()));
        assert!(available.periods.iter().all(|p| !p.on_disk && !p.in_memory));
    }

    #[test]
    fn test_ask_runs_intent() {
        let dir = TempDir::new().unwrap();
        let service = loaded_service(&dir);

        let prompt = "Tell me about Google's H-1B sponsorships";
        let response = tokio_test::block_on(service.ask(prompt));
        assert_eq!(response.action, "get_company_stats");
        assert_eq!(response.result["total_applications"], 2);

        let response = tokio_test::block_on(service.ask("Find software engineer jobs"));
        assert_eq!(response.action, "search_h1b_jobs");
        assert_eq!(response.suggestions[0], "Tell me more about Google LLC");
    }

    #[test]
    fn test_ask_reports_errors_in_result() {
        let dir = TempDir::new().unwrap();
        let service = service_with_source(&dir, FakeSource::missing());

        let response = tokio_test::block_on(service.ask("Who are the top H-1B sponsors?"));
        assert_eq!(response.action, "get_top_sponsors");
        assert_eq!(response.result["kind"], "no_data_loaded");

        let response = tokio_test::block_on(service.ask("load h1b data for 2023 q1"));
        assert_eq!(response.action, "load_h1b_data");
        assert_eq!(response.result["kind"], "data_unavailable");

        let response = tokio_test::block_on(service.ask("load h1b data for q7"));
        assert_eq!(response.result["kind"], "invalid_period");
    }
}

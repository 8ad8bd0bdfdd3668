//! Filtered job search over a disclosure table.

use crate::agency::AgencyClassifier;
use crate::models::{DisclosureRecord, DisclosureTable, SearchFilter, SearchOutcome};

/// Run `filter` over `table`, keeping source order.
///
/// Every record is tested against the full filter so `total_matches` counts
/// all hits; only the first `max_results` are cloned into the outcome.
pub fn search(
    table: &DisclosureTable,
    filter: &SearchFilter,
    classifier: &AgencyClassifier,
) -> SearchOutcome {
    let role = filter.job_role.trim().to_lowercase();
    let city = non_empty_lower(filter.city.as_deref());
    let state = non_empty_lower(filter.state.as_deref());

    let mut total_matches = 0;
    let mut records = Vec::new();

    for record in &table.records {
        if !matches(record, &role, city.as_deref(), state.as_deref(), filter, classifier) {
            continue;
        }
        total_matches += 1;
        if records.len() < filter.max_results {
            records.push(record.clone());
        }
    }

    SearchOutcome {
        total_matches,
        records,
    }
}

fn matches(
    record: &DisclosureRecord,
    role: &str,
    city: Option<&str>,
    state: Option<&str>,
    filter: &SearchFilter,
    classifier: &AgencyClassifier,
) -> bool {
    if !role.is_empty() && !record.job_title.to_lowercase().contains(role) {
        return false;
    }

    if let Some(city) = city {
        if !record.city.to_lowercase().contains(city) {
            return false;
        }
    }

    if let Some(state) = state {
        if record.state.trim().to_lowercase() != state {
            return false;
        }
    }

    if let Some(min_wage) = filter.min_wage {
        match record.annual_wage() {
            Some(wage) if wage >= min_wage => {}
            _ => return false,
        }
    }

    if filter.skip_agencies && classifier.is_agency(&record.employer) {
        return false;
    }

    if filter.certified_only && !record.case_status.is_certified() {
        return false;
    }

    true
}

fn non_empty_lower(value: Option<&str>) -> Option<String> {
    value
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::{CaseStatus, Period, WageUnit};

    pub(crate) fn record(
        employer: &str,
        job_title: &str,
        city: &str,
        state: &str,
        wage: Option<f64>,
        status: CaseStatus,
    ) -> DisclosureRecord {
        DisclosureRecord {
            employer: employer.to_string(),
            job_title: job_title.to_string(),
            city: city.to_string(),
            state: state.to_string(),
            wage,
            wage_unit: WageUnit::Year,
            case_status: status,
            fiscal_year: 2024,
            fiscal_quarter: 4,
            contact: None,
        }
    }

    pub(crate) fn sample_table() -> DisclosureTable {
        let records = vec![
            record(
                "Google LLC",
                "Software Engineer",
                "Mountain View",
                "CA",
                Some(180_000.0),
                CaseStatus::Certified,
            ),
            record(
                "Infosys Limited",
                "Software Engineer",
                "Plano",
                "TX",
                Some(90_000.0),
                CaseStatus::Certified,
            ),
            record(
                "Acme Corp",
                "Data Scientist",
                "Austin",
                "TX",
                Some(120_000.0),
                CaseStatus::Denied,
            ),
            record(
                "Google LLC",
                "Senior Software Engineer",
                "New York",
                "NY",
                Some(220_000.0),
                CaseStatus::Certified,
            ),
            record(
                "Globex Inc",
                "Software Engineer",
                "San Francisco",
                "CA",
                None,
                CaseStatus::Withdrawn,
            ),
        ];
        DisclosureTable::new(Period::default(), records)
    }

    fn unfiltered(max_results: usize) -> SearchFilter {
        SearchFilter {
            skip_agencies: false,
            max_results,
            ..SearchFilter::for_role("")
        }
    }

    #[test]
    fn test_empty_filter_returns_all_in_order() {
        let table = sample_table();
        let outcome = search(&table, &unfiltered(50), &AgencyClassifier::default());

        assert_eq!(outcome.total_matches, 5);
        assert_eq!(outcome.records, table.records);
    }

    #[test]
    fn test_cap_keeps_total() {
        let table = sample_table();
        let outcome = search(&table, &unfiltered(2), &AgencyClassifier::default());

        assert_eq!(outcome.total_matches, 5);
        assert_eq!(outcome.returned(), 2);
        assert_eq!(outcome.records[1].employer, "Infosys Limited");
    }

    #[test]
    fn test_role_is_case_insensitive_substring() {
        let table = sample_table();
        let filter = SearchFilter {
            skip_agencies: false,
            ..SearchFilter::for_role("NGINEER")
        };
        let outcome = search(&table, &filter, &AgencyClassifier::default());

        assert_eq!(outcome.total_matches, 4);
        assert!(outcome
            .records
            .iter()
            .all(|r| r.job_title.to_lowercase().contains("ngineer")));
    }

    #[test]
    fn test_city_and_state_filters() {
        let table = sample_table();
        let filter = SearchFilter {
            city: Some("mountain".to_string()),
            ..unfiltered(50)
        };
        let outcome = search(&table, &filter, &AgencyClassifier::default());
        assert_eq!(outcome.total_matches, 1);

        let filter = SearchFilter {
            state: Some(" tx ".to_string()),
            ..unfiltered(50)
        };
        let outcome = search(&table, &filter, &AgencyClassifier::default());
        assert_eq!(outcome.total_matches, 2);

        // State is an exact code match.
        let filter = SearchFilter {
            state: Some("T".to_string()),
            ..unfiltered(50)
        };
        assert_eq!(search(&table, &filter, &AgencyClassifier::default()).total_matches, 0);
    }

    #[test]
    fn test_min_wage_inclusive_and_drops_missing() {
        let table = sample_table();
        let filter = SearchFilter {
            min_wage: Some(180_000.0),
            ..unfiltered(50)
        };
        let outcome = search(&table, &filter, &AgencyClassifier::default());

        assert_eq!(outcome.total_matches, 2);
        assert!(outcome.records.iter().all(|r| r.wage.is_some()));
        assert!(outcome.records.iter().any(|r| r.wage == Some(180_000.0)));
    }

    #[test]
    fn test_min_wage_uses_annualized_wage() {
        let mut hourly = record(
            "Acme Corp",
            "Engineer",
            "Austin",
            "TX",
            Some(60.0),
            CaseStatus::Certified,
        );
        hourly.wage_unit = WageUnit::Hour;
        let table = DisclosureTable::new(Period::default(), vec![hourly]);

        let filter = SearchFilter {
            min_wage: Some(120_000.0),
            ..unfiltered(50)
        };
        assert_eq!(search(&table, &filter, &AgencyClassifier::default()).total_matches, 1);
    }

    #[test]
    fn test_skip_agencies() {
        let table = sample_table();
        let filter = SearchFilter::for_role("software engineer");
        let outcome = search(&table, &filter, &AgencyClassifier::default());

        assert_eq!(outcome.total_matches, 3);
        assert!(outcome.records.iter().all(|r| r.employer != "Infosys Limited"));
    }

    #[test]
    fn test_certified_only() {
        let table = sample_table();
        let filter = SearchFilter {
            certified_only: true,
            ..unfiltered(50)
        };
        let outcome = search(&table, &filter, &AgencyClassifier::default());

        assert_eq!(outcome.total_matches, 3);
        assert!(outcome.records.iter().all(|r| r.case_status.is_certified()));
    }

    #[test]
    fn test_no_matches() {
        let table = sample_table();
        let outcome = search(
            &table,
            &SearchFilter::for_role("astronaut"),
            &AgencyClassifier::default(),
        );
        assert_eq!(outcome.total_matches, 0);
        assert!(outcome.records.is_empty());
    }
}

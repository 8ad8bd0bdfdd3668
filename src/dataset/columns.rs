//! Source header variants and their canonical fields.
//!
//! Disclosure releases rename columns between years. Each canonical field
//! lists the header variants it accepts, in priority order; any header that
//! no field claims is dropped.

use std::fmt;

/// Canonical fields of a disclosure record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Employer,
    JobTitle,
    City,
    State,
    Wage,
    WageUnit,
    CaseStatus,
    Contact,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::Employer => "employer",
            Field::JobTitle => "job_title",
            Field::City => "city",
            Field::State => "state",
            Field::Wage => "wage",
            Field::WageUnit => "wage_unit",
            Field::CaseStatus => "case_status",
            Field::Contact => "contact",
        };
        write!(f, "{}", name)
    }
}

/// Header variants accepted for each field, highest priority first.
pub const HEADER_VARIANTS: &[(Field, &[&str])] = &[
    (
        Field::Employer,
        &["EMPLOYER_NAME", "LCA_CASE_EMPLOYER_NAME", "EMPLOYER_BUSINESS_DBA"],
    ),
    (
        Field::JobTitle,
        &["JOB_TITLE", "LCA_CASE_JOB_TITLE", "SOC_TITLE", "JOB_TITLE_CLEAN"],
    ),
    (
        Field::City,
        &[
            "WORKSITE_CITY",
            "WORKSITE_CITY_1",
            "LCA_CASE_WORKLOC1_CITY",
            "EMPLOYER_CITY",
        ],
    ),
    (
        Field::State,
        &[
            "WORKSITE_STATE",
            "WORKSITE_STATE_1",
            "LCA_CASE_WORKLOC1_STATE",
            "EMPLOYER_STATE",
        ],
    ),
    (
        Field::Wage,
        &[
            "WAGE_RATE_OF_PAY_FROM",
            "WAGE_RATE_OF_PAY_FROM_1",
            "LCA_CASE_WAGE_RATE_FROM",
            "WAGE_RATE_OF_PAY",
            "PREVAILING_WAGE",
        ],
    ),
    (
        Field::WageUnit,
        &[
            "WAGE_UNIT_OF_PAY",
            "WAGE_UNIT_OF_PAY_1",
            "LCA_CASE_WAGE_RATE_UNIT",
            "PW_UNIT_OF_PAY",
        ],
    ),
    (Field::CaseStatus, &["CASE_STATUS", "STATUS"]),
    (
        Field::Contact,
        &["EMPLOYER_POC_EMAIL", "CONTACT_EMAIL", "EMPLOYER_PHONE"],
    ),
];

/// Normalize a raw header: trim, upper-case, spaces and dashes to underscores.
pub fn normalize_header(raw: &str) -> String {
    raw.trim()
        .trim_start_matches('\u{feff}')
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect()
}

/// Resolved positions of canonical fields within one file's header row.
#[derive(Debug, Clone, Default)]
pub struct ColumnMap {
    employer: Option<usize>,
    job_title: Option<usize>,
    city: Option<usize>,
    state: Option<usize>,
    wage: Option<usize>,
    wage_unit: Option<usize>,
    case_status: Option<usize>,
    contact: Option<usize>,
    /// Headers that no field claimed.
    pub dropped: Vec<String>,
}

impl ColumnMap {
    /// Resolve a header row against the variant table.
    pub fn resolve<S: AsRef<str>>(headers: &[S]) -> Self {
        let normalized: Vec<String> = headers
            .iter()
            .map(|h| normalize_header(h.as_ref()))
            .collect();

        let mut map = ColumnMap::default();
        let mut claimed = vec![false; normalized.len()];

        for (field, variants) in HEADER_VARIANTS {
            let position = variants
                .iter()
                .find_map(|variant| normalized.iter().position(|h| h == variant));

            if let Some(idx) = position {
                claimed[idx] = true;
                *map.slot_mut(*field) = Some(idx);
            }
        }

        map.dropped = headers
            .iter()
            .zip(claimed)
            .filter(|(_, used)| !used)
            .map(|(h, _)| h.as_ref().trim().to_string())
            .filter(|h| !h.is_empty())
            .collect();

        map
    }

    fn slot_mut(&mut self, field: Field) -> &mut Option<usize> {
        match field {
            Field::Employer => &mut self.employer,
            Field::JobTitle => &mut self.job_title,
            Field::City => &mut self.city,
            Field::State => &mut self.state,
            Field::Wage => &mut self.wage,
            Field::WageUnit => &mut self.wage_unit,
            Field::CaseStatus => &mut self.case_status,
            Field::Contact => &mut self.contact,
        }
    }

    /// Column index of a field, if the file carries it.
    pub fn index(&self, field: Field) -> Option<usize> {
        match field {
            Field::Employer => self.employer,
            Field::JobTitle => self.job_title,
            Field::City => self.city,
            Field::State => self.state,
            Field::Wage => self.wage,
            Field::WageUnit => self.wage_unit,
            Field::CaseStatus => self.case_status,
            Field::Contact => self.contact,
        }
    }

    /// Fields required to build a record at all.
    pub fn missing_required(&self) -> Vec<Field> {
        [Field::Employer, Field::JobTitle]
            .into_iter()
            .filter(|f| self.index(*f).is_none())
            .collect()
    }

    /// Names of canonical fields present in this file.
    pub fn mapped_fields(&self) -> Vec<String> {
        HEADER_VARIANTS
            .iter()
            .filter(|(field, _)| self.index(*field).is_some())
            .map(|(field, _)| field.to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_header() {
        assert_eq!(normalize_header(" Employer Name "), "EMPLOYER_NAME");
        assert_eq!(normalize_header("wage-unit-of-pay"), "WAGE_UNIT_OF_PAY");
        assert_eq!(normalize_header("\u{feff}CASE_STATUS"), "CASE_STATUS");
    }

    #[test]
    fn test_resolve_current_headers() {
        let headers = [
            "CASE_NUMBER",
            "CASE_STATUS",
            "JOB_TITLE",
            "SOC_TITLE",
            "EMPLOYER_NAME",
            "WORKSITE_CITY",
            "WORKSITE_STATE",
            "WAGE_RATE_OF_PAY_FROM",
            "WAGE_UNIT_OF_PAY",
        ];
        let map = ColumnMap::resolve(&headers);

        assert_eq!(map.index(Field::CaseStatus), Some(1));
        assert_eq!(map.index(Field::JobTitle), Some(2));
        assert_eq!(map.index(Field::Employer), Some(4));
        assert_eq!(map.index(Field::Wage), Some(7));
        assert!(map.index(Field::Contact).is_none());
        assert!(map.missing_required().is_empty());
        assert_eq!(map.dropped, vec!["CASE_NUMBER", "SOC_TITLE"]);
    }

    #[test]
    fn test_resolve_legacy_headers() {
        let headers = [
            "LCA_CASE_EMPLOYER_NAME",
            "LCA_CASE_JOB_TITLE",
            "LCA_CASE_WORKLOC1_CITY",
            "LCA_CASE_WORKLOC1_STATE",
            "LCA_CASE_WAGE_RATE_FROM",
            "LCA_CASE_WAGE_RATE_UNIT",
            "STATUS",
        ];
        let map = ColumnMap::resolve(&headers);

        assert_eq!(map.index(Field::Employer), Some(0));
        assert_eq!(map.index(Field::State), Some(3));
        assert_eq!(map.index(Field::WageUnit), Some(5));
        assert_eq!(map.index(Field::CaseStatus), Some(6));
        assert!(map.dropped.is_empty());
    }

    #[test]
    fn test_fallback_to_employer_city() {
        let map = ColumnMap::resolve(&["EMPLOYER_NAME", "JOB_TITLE", "EMPLOYER_CITY"]);
        assert_eq!(map.index(Field::City), Some(2));
    }

    #[test]
    fn test_missing_required() {
        let map = ColumnMap::resolve(&["FOO", "BAR"]);
        assert_eq!(map.missing_required(), vec![Field::Employer, Field::JobTitle]);
        assert!(map.mapped_fields().is_empty());
    }
}

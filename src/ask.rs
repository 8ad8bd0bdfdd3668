//! Plain-language prompt interpretation.
//!
//! A keyword and pattern heuristic that maps a prompt onto one operation.
//! Intents are checked in a fixed order (load, search, company, top
//! sponsors, export, available data) and the first whose trigger words are
//! present wins; anything else is `Help`.

use crate::models::{Period, SearchFilter};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// Result cap used when a prompt asks for "all" results.
pub const ALL_RESULTS: usize = 200;

/// Default cap for exports.
pub const DEFAULT_EXPORT_MAX: usize = 1000;

/// Default number of sponsors listed.
pub const DEFAULT_SPONSOR_LIMIT: usize = 20;

/// What a prompt asks for.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Intent {
    Load {
        year: i64,
        quarter: i64,
        force: bool,
    },
    Search {
        filter: SearchFilter,
    },
    CompanyStats {
        company: String,
    },
    TopSponsors {
        limit: usize,
        exclude_agencies: bool,
    },
    Export {
        filter: SearchFilter,
        filename: String,
    },
    AvailableData,
    Help,
}

impl Intent {
    /// Name of the tool this intent maps to.
    pub fn action(&self) -> &'static str {
        match self {
            Intent::Load { .. } => "load_h1b_data",
            Intent::Search { .. } => "search_h1b_jobs",
            Intent::CompanyStats { .. } => "get_company_stats",
            Intent::TopSponsors { .. } => "get_top_sponsors",
            Intent::Export { .. } => "export_results",
            Intent::AvailableData => "get_available_data",
            Intent::Help => "help",
        }
    }

    /// Whether running this intent queries an already loaded table.
    pub fn reads_data(&self) -> bool {
        matches!(
            self,
            Intent::Search { .. }
                | Intent::CompanyStats { .. }
                | Intent::TopSponsors { .. }
                | Intent::Export { .. }
        )
    }

    /// Follow-up prompts to offer after running this intent.
    pub fn suggestions(&self, first_employer: Option<&str>, next_period: Period) -> Vec<String> {
        match self {
            Intent::Load { .. } => vec![
                "Find software engineer jobs".to_string(),
                "Show me top H-1B sponsors".to_string(),
                "Search for data scientist positions in California".to_string(),
            ],
            Intent::Search { .. } => {
                let mut s = Vec::new();
                if let Some(employer) = first_employer {
                    s.push(format!("Tell me more about {}", employer));
                }
                s.push("Export these results to CSV".to_string());
                s.push("Show me different job roles".to_string());
                s
            }
            Intent::CompanyStats { company } => vec![
                format!("Search for jobs at {}", company),
                "Show me top H-1B sponsors".to_string(),
                "Compare with other companies".to_string(),
            ],
            Intent::TopSponsors { .. } => vec![
                "Tell me more about the top company".to_string(),
                "Search for specific job roles".to_string(),
                "Show me sponsors including agencies".to_string(),
            ],
            Intent::Export { .. } => vec![
                "Search for different roles".to_string(),
                "Filter by location".to_string(),
                "Show me top sponsors".to_string(),
            ],
            Intent::AvailableData => vec![
                format!("Load data for {} Q{}", next_period.year, next_period.quarter),
                "Search for jobs".to_string(),
                "Show me top sponsors".to_string(),
            ],
            Intent::Help => vec![
                "Load H-1B data for 2024 Q4".to_string(),
                "Search for your dream job".to_string(),
                "Check top H-1B sponsors".to_string(),
            ],
        }
    }
}

/// Example prompts shown by `Help`.
pub const HELP_EXAMPLES: &[&str] = &[
    "Load the latest H-1B data",
    "Find software engineer jobs in California",
    "Show me data scientist positions paying over 150k",
    "Tell me about Google's H-1B sponsorships",
    "Who are the top 20 H-1B sponsors?",
    "Export Python developer jobs to CSV",
];

/// Job title patterns, most specific first. The last entry is a catch-all.
static JOB_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"software\s+engineer", "Software Engineer"),
        (r"data\s+scientist", "Data Scientist"),
        (r"data\s+engineer", "Data Engineer"),
        (r"data\s+analyst", "Data Analyst"),
        (r"product\s+manager", "Product Manager"),
        (r"ml\s+engineer|machine\s+learning\s+engineer", "Machine Learning Engineer"),
        (r"devops|dev\s+ops", "DevOps Engineer"),
        (r"backend\s+engineer", "Backend Engineer"),
        (r"frontend\s+engineer", "Frontend Engineer"),
        (r"fullstack|full\s+stack", "Full Stack Developer"),
        (r"ios\s+developer", "iOS Developer"),
        (r"android\s+developer", "Android Developer"),
        (r"qa\s+engineer|test\s+engineer", "QA Engineer"),
        (r"business\s+analyst", "Business Analyst"),
        (r"project\s+manager", "Project Manager"),
        (r"ux\s+designer|ui\s+designer", "UX Designer"),
        (r"cloud\s+engineer", "Cloud Engineer"),
        (r"security\s+engineer", "Security Engineer"),
        (r"database\s+admin|\bdba\b", "Database Administrator"),
        (r"network\s+engineer", "Network Engineer"),
        (r"python\s+developer", "Python Developer"),
        (r"java\s+developer", "Java Developer"),
        (r"javascript\s+developer|js\s+developer", "JavaScript Developer"),
        (r"programmer|developer|engineer", "Software Engineer"),
    ]
    .into_iter()
    .map(|(pattern, title)| (Regex::new(pattern).expect("valid job pattern"), title))
    .collect()
});

static ROLE_BEFORE_NOUN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\w+(?:\s+\w+)?)\s+(?:jobs?|positions?|roles?)\b").expect("valid regex")
});

static CITY_STATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\bin\s+([A-Za-z]+(?:\s+[A-Za-z]+)?)\s*,?\s*([A-Z]{2})\b").expect("valid regex")
});

static STATE_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b([A-Z]{2})\b").expect("valid regex"));

static SALARY_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?:over|above|minimum|at\s+least|paying)\s+\$?(\d+)k\b",
        r"(?:over|above|minimum|at\s+least|paying)\s+\$?(\d{1,3}(?:,\d{3})+|\d{3,})",
        r"\$(\d+)k\b",
        r"\$(\d{1,3}(?:,\d{3})+|\d{3,})",
    ]
    .into_iter()
    .map(|p| Regex::new(p).expect("valid salary pattern"))
    .collect()
});

static YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(20\d{2})\b").expect("valid regex"));
static QUARTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bq(\d)\b|quarter\s+(\d)").expect("valid regex"));
static TOP_N: Lazy<Regex> = Lazy::new(|| Regex::new(r"top\s+(\d+)").expect("valid regex"));
static ABOUT_COMPANY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"about\s+([A-Z][a-zA-Z]+(?:\s+[A-Z][a-zA-Z]+)?)").expect("valid regex")
});

const KNOWN_CITIES: &[&str] = &[
    "San Francisco",
    "New York",
    "Los Angeles",
    "Seattle",
    "Austin",
    "Boston",
    "Chicago",
    "Denver",
    "Atlanta",
    "Dallas",
    "Houston",
    "San Jose",
    "Mountain View",
    "Cupertino",
    "Redmond",
    "Bellevue",
];

const KNOWN_COMPANIES: &[&str] = &[
    "Google",
    "Microsoft",
    "Amazon",
    "Apple",
    "Meta",
    "Facebook",
    "Netflix",
    "Tesla",
    "Uber",
    "Airbnb",
    "Twitter",
    "LinkedIn",
    "Oracle",
    "Salesforce",
    "Adobe",
    "Intel",
    "Nvidia",
    "AMD",
    "IBM",
    "Cisco",
    "Dell",
    "HP",
    "VMware",
    "Qualcomm",
];

const US_STATES: &[&str] = &[
    "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "DC", "FL", "GA", "HI", "ID", "IL", "IN",
    "IA", "KS", "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NE", "NV", "NH",
    "NJ", "NM", "NY", "NC", "ND", "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT",
    "VT", "VA", "WA", "WV", "WI", "WY", "PR", "GU", "VI",
];

const AGENCY_EXCLUSION_PHRASES: &[&str] = &[
    "no agency",
    "no agencies",
    "direct hire",
    "skip agencies",
    "not agency",
    "no consultancy",
    "no staffing",
    "exclude agencies",
];

const AGENCY_INCLUSION_PHRASES: &[&str] =
    &["including agencies", "include agencies", "with agencies"];

const DEFAULT_ROLE: &str = "Software Engineer";

/// Words dropped from a role guessed from the text before "jobs".
const STOP_WORDS: &[&str] = &[
    "find", "search", "show", "look", "want", "need", "me", "for", "top", "all", "some",
];

/// Interpret a prompt.
pub fn parse_prompt(prompt: &str) -> Intent {
    let original = prompt.trim();
    let text = original.to_lowercase();
    let has_any = |words: &[&str]| words.iter().any(|w| text.contains(w));

    if has_any(&["load", "download", "get", "fetch"])
        && has_any(&["data", "h-1b", "h1b", "lca", "records"])
    {
        let (year, quarter) = year_quarter(&text);
        return Intent::Load {
            year,
            quarter,
            force: words(&text).any(|w| matches!(w, "fresh" | "force" | "new")),
        };
    }

    if has_any(&["find", "search", "show", "look", "want", "need"])
        && has_any(&[
            "job",
            "position",
            "role",
            "opportunity",
            "engineer",
            "developer",
            "scientist",
            "analyst",
            "manager",
            "designer",
            "architect",
        ])
    {
        let (city, state) = location(original, &text);
        let max_results = if words(&text).any(|w| w == "all") {
            ALL_RESULTS
        } else {
            top_n(&text).unwrap_or(50)
        };

        return Intent::Search {
            filter: SearchFilter {
                job_role: job_role(&text),
                city,
                state,
                min_wage: min_wage(&text),
                skip_agencies: AGENCY_EXCLUSION_PHRASES.iter().any(|p| text.contains(p)),
                max_results,
                certified_only: false,
            },
        };
    }

    if has_any(&["tell", "about", "statistics", "stats", "info", "information"])
        && (has_any(&["company", "employer"]) || known_company(&text).is_some())
    {
        let company = known_company(&text).map(str::to_string).or_else(|| {
            ABOUT_COMPANY
                .captures(original)
                .map(|c| c[1].to_string())
        });
        if let Some(company) = company {
            return Intent::CompanyStats { company };
        }
    }

    if has_any(&["top", "best", "leading", "biggest", "most"])
        && has_any(&["sponsor", "company", "employer", "h-1b", "h1b"])
    {
        return Intent::TopSponsors {
            limit: top_n(&text).unwrap_or(DEFAULT_SPONSOR_LIMIT),
            exclude_agencies: !AGENCY_INCLUSION_PHRASES.iter().any(|p| text.contains(p)),
        };
    }

    if has_any(&["export", "save", "download", "csv", "excel", "file", "spreadsheet"]) {
        let role = job_role(&text);
        let state = state_code(original);

        let mut parts = vec![role.to_lowercase().replace(' ', "_")];
        if let Some(ref s) = state {
            parts.push(s.to_lowercase());
        }
        let filename = format!("{}_h1b.csv", parts.join("_"));

        return Intent::Export {
            filter: SearchFilter {
                state,
                max_results: DEFAULT_EXPORT_MAX,
                ..SearchFilter::for_role(role)
            },
            filename,
        };
    }

    if has_any(&["available", "check", "what", "which"])
        && has_any(&["data", "year", "quarter", "period"])
    {
        return Intent::AvailableData;
    }

    Intent::Help
}

fn words(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !c.is_alphanumeric() && c != '-')
        .filter(|w| !w.is_empty())
}

fn year_quarter(text: &str) -> (i64, i64) {
    let year = YEAR
        .captures(text)
        .and_then(|c| c[1].parse().ok())
        .unwrap_or(2024);
    let quarter = QUARTER
        .captures(text)
        .and_then(|c| c.get(1).or_else(|| c.get(2)))
        .and_then(|m| m.as_str().parse().ok())
        .filter(|q| *q != 0)
        .unwrap_or(4);
    (year, quarter)
}

fn job_role(text: &str) -> String {
    if let Some((_, title)) = JOB_PATTERNS.iter().find(|(re, _)| re.is_match(text)) {
        return title.to_string();
    }

    ROLE_BEFORE_NOUN
        .captures(text)
        .map(|c| {
            c[1].split_whitespace()
                .filter(|w| !STOP_WORDS.contains(w) && !w.chars().all(|c| c.is_ascii_digit()))
                .map(title_case)
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|role| !role.is_empty())
        .unwrap_or_else(|| DEFAULT_ROLE.to_string())
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn location(original: &str, text: &str) -> (Option<String>, Option<String>) {
    if let Some(c) = CITY_STATE.captures(original) {
        if US_STATES.contains(&&c[2]) {
            return (Some(c[1].to_string()), Some(c[2].to_string()));
        }
    }

    let city = KNOWN_CITIES
        .iter()
        .find(|c| text.contains(&c.to_lowercase()))
        .map(|c| c.to_string());
    (city, state_code(original))
}

fn state_code(original: &str) -> Option<String> {
    STATE_CODE
        .captures_iter(original)
        .map(|c| c[1].to_string())
        .find(|code| US_STATES.contains(&code.as_str()))
}

fn min_wage(text: &str) -> Option<f64> {
    SALARY_PATTERNS.iter().find_map(|re| {
        let caps = re.captures(text)?;
        let whole = caps.get(0)?.as_str();
        let amount: f64 = caps[1].replace(',', "").parse().ok()?;
        Some(if whole.ends_with('k') {
            amount * 1000.0
        } else {
            amount
        })
    })
}

fn top_n(text: &str) -> Option<usize> {
    TOP_N.captures(text).and_then(|c| c[1].parse().ok())
}

fn known_company(text: &str) -> Option<&'static str> {
    let tokens: Vec<&str> = words(text).collect();
    KNOWN_COMPANIES
        .iter()
        .find(|c| tokens.iter().any(|t| t.trim_end_matches("'s") == c.to_lowercase()))
        .copied()
}

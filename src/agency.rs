//! Staffing agency and consultancy detection.
//!
//! A heuristic over employer names. The lists below are policy: tests pin
//! them, and adding a name changes which sponsors searches hide.

/// Well-known outsourcing firms, matched as case-insensitive substrings.
pub const KNOWN_AGENCIES: &[&str] = &[
    "infosys",
    "tata consultancy",
    "wipro",
    "cognizant",
    "tech mahindra",
    "accenture",
    "capgemini",
    "mphasis",
    "mindtree",
    "igate",
    "syntel",
    "larsen & toubro infotech",
    "ltimindtree",
    "hexaware",
    "deloitte consulting",
];

/// Short acronyms, matched only as whole words ("TCS" but not "Metcs").
pub const KNOWN_ACRONYMS: &[&str] = &["tcs", "hcl", "ltts"];

/// Generic words that mark a staffing or consulting business.
pub const GENERIC_MARKERS: &[&str] = &[
    "staffing",
    "consulting",
    "consultancy",
    "consultants",
    "agency",
    "manpower",
];

/// Classifies employer names as staffing agencies.
#[derive(Debug, Clone)]
pub struct AgencyClassifier {
    substrings: Vec<String>,
    acronyms: Vec<String>,
}

impl Default for AgencyClassifier {
    fn default() -> Self {
        let substrings = KNOWN_AGENCIES
            .iter()
            .chain(GENERIC_MARKERS.iter())
            .map(|s| s.to_string())
            .collect();
        let acronyms = KNOWN_ACRONYMS.iter().map(|s| s.to_string()).collect();
        Self {
            substrings,
            acronyms,
        }
    }
}

impl AgencyClassifier {
    /// The pinned list plus extra substrings (e.g. from configuration).
    pub fn with_extra<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut classifier = Self::default();
        for name in extra {
            let name = name.as_ref().trim().to_lowercase();
            if !name.is_empty() && !classifier.substrings.contains(&name) {
                classifier.substrings.push(name);
            }
        }
        classifier
    }

    /// Returns true if the employer name looks like a staffing agency.
    pub fn is_agency(&self, employer: &str) -> bool {
        let lower = employer.to_lowercase();

        if self.substrings.iter().any(|s| lower.contains(s.as_str())) {
            return true;
        }

        lower
            .split(|c: char| !c.is_alphanumeric())
            .any(|word| self.acronyms.iter().any(|a| a == word))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_agencies() {
        let classifier = AgencyClassifier::default();
        assert!(classifier.is_agency("Infosys Limited"));
        assert!(classifier.is_agency("WIPRO LIMITED"));
        assert!(classifier.is_agency("Cognizant Technology Solutions US Corp"));
        assert!(classifier.is_agency("Tata Consultancy Services Limited"));
        assert!(classifier.is_agency("Tech Mahindra (Americas) Inc."));
        assert!(classifier.is_agency("Accenture LLP"));
    }

    #[test]
    fn test_generic_markers() {
        let classifier = AgencyClassifier::default();
        assert!(classifier.is_agency("Acme Staffing LLC"));
        assert!(classifier.is_agency("Blue River Consulting Group"));
        assert!(classifier.is_agency("Global Talent Agency"));
    }

    #[test]
    fn test_acronyms_match_whole_words_only() {
        let classifier = AgencyClassifier::default();
        assert!(classifier.is_agency("TCS America"));
        assert!(classifier.is_agency("HCL America, Inc."));
        assert!(!classifier.is_agency("Metcsoft Inc"));
        assert!(!classifier.is_agency("Schclosure Labs"));
    }

    #[test]
    fn test_direct_employers_retained() {
        let classifier = AgencyClassifier::default();
        assert!(!classifier.is_agency("Google LLC"));
        assert!(!classifier.is_agency("Microsoft Corporation"));
        assert!(!classifier.is_agency("Amazon.com Services LLC"));
        assert!(!classifier.is_agency("Oracle America Solutions"));
    }

    #[test]
    fn test_extra_names() {
        let classifier = AgencyClassifier::with_extra(["  Randstad ", ""]);
        assert!(classifier.is_agency("Randstad Technologies"));
        assert!(classifier.is_agency("Infosys Limited"));
        assert!(!classifier.is_agency("Google LLC"));
    }
}

use std::fmt;

use crate::models::Listing;

/// Title fragments that mark a non-technical role. Plain substring match, so
/// "hr" also hits titles like "Chrome Platform Intern".
pub const TITLE_BLOCKLIST: &[&str] = &[
    "sales",
    "marketing",
    "finance",
    "accounting",
    "hr",
    "maintenance",
    "technician",
    "mechanic",
    "audit",
    "legal",
    "driver",
    "nurse",
    "warehouse",
    "customer service",
    "executive assistant",
    "recruiter",
];

/// Description phrases that restrict the role to citizens or clearance holders.
pub const ELIGIBILITY_BLOCKLIST: &[&str] = &[
    "us citizen only",
    "u.s. citizen only",
    "security clearance",
    "active secret",
    "dod clearance",
    "citizenship required",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOutcome {
    Pass,
    EmptyListing,
    NonTechnicalTitle(&'static str),
    EligibilityRestricted(&'static str),
}

impl FilterOutcome {
    pub fn passed(self) -> bool {
        matches!(self, FilterOutcome::Pass)
    }
}

impl fmt::Display for FilterOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterOutcome::Pass => write!(f, "pass"),
            FilterOutcome::EmptyListing => write!(f, "empty listing"),
            FilterOutcome::NonTechnicalTitle(k) => write!(f, "non-tech title ('{}')", k),
            FilterOutcome::EligibilityRestricted(k) => write!(f, "citizenship keyword ('{}')", k),
        }
    }
}

/// Cheap keyword screen run before any model call. Title check first, then
/// the description; first match wins.
pub fn pre_filter(listing: &Listing) -> FilterOutcome {
    if listing.is_empty() {
        return FilterOutcome::EmptyListing;
    }

    let title = listing.title.to_lowercase();
    if let Some(keyword) = TITLE_BLOCKLIST.iter().copied().find(|k| title.contains(k)) {
        return FilterOutcome::NonTechnicalTitle(keyword);
    }

    let description = listing.description.to_lowercase();
    if let Some(phrase) = ELIGIBILITY_BLOCKLIST
        .iter()
        .copied()
        .find(|p| description.contains(p))
    {
        return FilterOutcome::EligibilityRestricted(phrase);
    }

    FilterOutcome::Pass
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(title: &str, description: &str) -> Listing {
        Listing {
            title: title.to_string(),
            company: "Acme".to_string(),
            description: description.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_rejects_blocklisted_titles() {
        assert_eq!(
            pre_filter(&listing("Sales Manager", "Build ML models")),
            FilterOutcome::NonTechnicalTitle("sales")
        );
        assert_eq!(
            pre_filter(&listing("Customer Service Rep - AI tools", "")),
            FilterOutcome::NonTechnicalTitle("customer service")
        );
        assert_eq!(
            pre_filter(&listing("Technical RECRUITER", "")),
            FilterOutcome::NonTechnicalTitle("recruiter")
        );
    }

    #[test]
    fn test_title_check_wins_over_description() {
        for keyword in TITLE_BLOCKLIST {
            let l = listing(&format!("Senior {} Lead", keyword), "requires active secret clearance");
            assert!(
                matches!(pre_filter(&l), FilterOutcome::NonTechnicalTitle(_)),
                "title with '{}' should be rejected by title",
                keyword
            );
        }
    }

    #[test]
    fn test_rejects_eligibility_phrases() {
        let l = listing("AI Engineer Intern", "This role requires active secret clearance.");
        assert_eq!(
            pre_filter(&l),
            FilterOutcome::EligibilityRestricted("active secret")
        );

        for &phrase in ELIGIBILITY_BLOCKLIST {
            let l = listing("ML Intern", &format!("Note: {}.", phrase.to_uppercase()));
            assert_eq!(pre_filter(&l), FilterOutcome::EligibilityRestricted(phrase));
        }
    }

    #[test]
    fn test_hr_substring_matches_literally() {
        assert_eq!(
            pre_filter(&listing("Chrome Platform Intern", "")),
            FilterOutcome::NonTechnicalTitle("hr")
        );
    }

    #[test]
    fn test_passes_technical_listing() {
        let l = listing("ML Intern", "nan");
        assert_eq!(pre_filter(&l), FilterOutcome::Pass);
        assert!(pre_filter(&l).passed());
    }

    #[test]
    fn test_empty_listing_rejects() {
        assert_eq!(pre_filter(&Listing::default()), FilterOutcome::EmptyListing);
        assert!(!pre_filter(&Listing::default()).passed());
    }

    #[test]
    fn test_filter_is_repeatable() {
        let samples = [
            listing("Sales Manager", ""),
            listing("AI Engineer Intern", "requires active secret clearance"),
            listing("ML Intern", "Work on LLM evaluation pipelines"),
            Listing::default(),
        ];
        for l in &samples {
            assert_eq!(pre_filter(l), pre_filter(l));
        }
    }
}

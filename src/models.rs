use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// A single job posting as returned by a listing source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "site", default)]
    pub source_site: String, // "indeed", "glassdoor", "zip_recruiter", "google", ...
    #[serde(rename = "job_url_direct", default)]
    pub direct_url: String,
}

impl Listing {
    /// Identity used to collapse duplicates: `COMPANY_TITLE`, uppercased.
    pub fn dedup_key(&self) -> String {
        format!(
            "{}_{}",
            self.company.to_uppercase(),
            self.title.to_uppercase()
        )
    }

    pub fn is_empty(&self) -> bool {
        self.title.trim().is_empty()
            && self.company.trim().is_empty()
            && self.description.trim().is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    #[serde(rename = "APPLY (Long-Term)", alias = "APPLY_LONG_TERM")]
    ApplyLongTerm,
    #[serde(rename = "APPLY (Resume Builder)", alias = "APPLY_BUILDER")]
    ApplyBuilder,
    #[serde(rename = "STOP")]
    Stop,
}

impl Decision {
    pub fn is_apply(self) -> bool {
        !matches!(self, Decision::Stop)
    }

    pub fn label(self) -> &'static str {
        match self {
            Decision::ApplyLongTerm => "APPLY (Long-Term)",
            Decision::ApplyBuilder => "APPLY (Resume Builder)",
            Decision::Stop => "STOP",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Structured answer of the evaluator for one listing.
///
/// Field names follow the JSON the model is asked to produce, with aliases for
/// the canonical names so either spelling decodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    #[serde(rename = "verdict", alias = "decision")]
    pub decision: Decision,
    pub reasoning: String,
    pub compatibility_score: u8,
    pub optimized_summary: String,
    pub tailored_bullets: Vec<String>,
    #[serde(rename = "cover_letter_hook", alias = "outreach_hook")]
    pub outreach_hook: String,
    #[serde(default)]
    pub company_name: String,
}

impl Verdict {
    pub const INSUFFICIENT_TEXT: &'static str = "insufficient text";

    /// Verdict issued without consulting the model when the description is unusable.
    pub fn insufficient_text() -> Self {
        Self {
            decision: Decision::Stop,
            reasoning: Self::INSUFFICIENT_TEXT.to_string(),
            compatibility_score: 0,
            optimized_summary: String::new(),
            tailored_bullets: Vec::new(),
            outreach_hook: String::new(),
            company_name: String::new(),
        }
    }
}

/// A written application kit, tied to the listing and verdict it came from.
#[derive(Debug, Clone)]
pub struct Artifact<'a> {
    pub path: PathBuf,
    pub listing: &'a Listing,
    pub verdict: &'a Verdict,
}

impl Artifact<'_> {
    pub fn file_path(&self) -> &Path {
        &self.path
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEntry {
    pub title: String,
    pub company: String,
    pub reasoning: String,
    pub url: String,
    pub file_path: PathBuf,
}

impl From<&Artifact<'_>> for ReportEntry {
    fn from(artifact: &Artifact<'_>) -> Self {
        Self {
            title: artifact.listing.title.clone(),
            company: artifact.listing.company.clone(),
            reasoning: artifact.verdict.reasoning.clone(),
            url: artifact.listing.direct_url.clone(),
            file_path: artifact.file_path().to_path_buf(),
        }
    }
}

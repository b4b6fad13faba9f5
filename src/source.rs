use anyhow::{Context, Result, anyhow};
use regex::Regex;
use scraper::Html;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{info, warn};

use crate::config::{SearchParams, SourceConfig};
use crate::models::Listing;

/// Anything that can hand the pipeline a batch of postings.
pub trait ListingSource {
    fn fetch(&self, params: &SearchParams) -> Result<Vec<Listing>>;
    fn name(&self) -> &str;
}

/// Runs a source and degrades every failure (blocked, rate limited, offline)
/// to an empty batch. The pipeline treats "nothing found" as a normal day.
pub fn fetch_listings(source: &dyn ListingSource, params: &SearchParams) -> Vec<Listing> {
    info!(
        source = source.name(),
        results_wanted = params.results_wanted,
        location = %params.location,
        "fetching listings"
    );
    match source.fetch(params) {
        Ok(listings) => {
            info!(count = listings.len(), "listings retrieved");
            listings
        }
        Err(e) => {
            warn!(source = source.name(), error = %format!("{:#}", e), "scraping failed");
            Vec::new()
        }
    }
}

// --- JobSpy-compatible HTTP service ---

const SEARCH_ENDPOINT: &str = "/api/v1/search_jobs";

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    site_name: &'a [String],
    search_term: &'a str,
    google_search_term: String,
    location: &'a str,
    results_wanted: u32,
    hours_old: u32,
    country_indeed: &'a str,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    count: Option<usize>,
    #[serde(default)]
    jobs: Vec<WireJob>,
}

/// One row as the service reports it; any column may be null.
#[derive(Debug, Deserialize)]
struct WireJob {
    title: Option<String>,
    company: Option<String>,
    description: Option<String>,
    site: Option<String>,
    job_url_direct: Option<String>,
    job_url: Option<String>,
}

impl From<WireJob> for Listing {
    fn from(job: WireJob) -> Self {
        let direct_url = job
            .job_url_direct
            .filter(|u| !u.trim().is_empty())
            .or(job.job_url)
            .unwrap_or_default();
        Listing {
            title: job.title.unwrap_or_default(),
            company: job.company.unwrap_or_default(),
            description: normalize_description(&job.description.unwrap_or_default()),
            source_site: job.site.unwrap_or_default(),
            direct_url,
        }
    }
}

pub struct JobSpyApiSource {
    config: SourceConfig,
    client: reqwest::blocking::Client,
}

impl JobSpyApiSource {
    pub fn new(config: SourceConfig) -> Self {
        let client = reqwest::blocking::Client::new();
        Self { config, client }
    }
}

impl ListingSource for JobSpyApiSource {
    fn fetch(&self, params: &SearchParams) -> Result<Vec<Listing>> {
        let request = SearchRequest {
            site_name: &params.sites,
            search_term: &params.search_term,
            google_search_term: params.google_search_term(),
            location: &params.location,
            results_wanted: params.results_wanted,
            hours_old: params.hours_old,
            country_indeed: &params.country,
        };

        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), SEARCH_ENDPOINT);
        let mut builder = self.client.post(&url).json(&request);
        if let Some(key) = &self.config.api_key {
            builder = builder.header("x-api-key", key);
        }

        let response = builder
            .send()
            .with_context(|| format!("Failed to reach listing service at {}", url))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().unwrap_or_default();
            return Err(anyhow!(
                "Listing service request failed with status {}: {}",
                status,
                error_text
            ));
        }

        let body: SearchResponse = response
            .json()
            .context("Failed to parse listing service response")?;

        if let Some(count) = body.count {
            if count != body.jobs.len() {
                warn!(reported = count, received = body.jobs.len(), "job count mismatch");
            }
        }

        Ok(body.jobs.into_iter().map(Listing::from).collect())
    }

    fn name(&self) -> &str {
        "jobspy-api"
    }
}

// --- CSV file (as written by `autohunt scrape`) ---

pub struct CsvListingSource {
    path: PathBuf,
}

impl CsvListingSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ListingSource for CsvListingSource {
    fn fetch(&self, _params: &SearchParams) -> Result<Vec<Listing>> {
        let mut reader = csv::Reader::from_path(&self.path)
            .with_context(|| format!("Failed to open listings file: {}", self.path.display()))?;

        let mut listings = Vec::new();
        for (i, row) in reader.deserialize::<Listing>().enumerate() {
            let mut listing =
                row.with_context(|| format!("Bad row {} in {}", i + 2, self.path.display()))?;
            listing.description = normalize_description(&listing.description);
            listings.push(listing);
        }
        Ok(listings)
    }

    fn name(&self) -> &str {
        "csv"
    }
}

/// Saves listings with the column names `CsvListingSource` reads back.
pub fn write_csv(listings: &[Listing], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    for listing in listings {
        writer.serialize(listing)?;
    }
    writer.flush()?;
    Ok(())
}

// --- Description cleanup ---

static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)</?(p|div|br|li|ul|ol|b|i|em|strong|span|a|h[1-6]|table|tr|td|th)",
        r#"(\s+[a-z-]+\s*=\s*("[^"]*"|'[^']*'|[^\s>]+))*\s*/?>"#,
    ))
    .expect("valid tag pattern")
});
static INLINE_SPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t\x{a0}]+").expect("valid space pattern"));
static BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n(\s*\n)+").expect("valid newline pattern"));

/// Strips markup from HTML descriptions and squeezes runs of whitespace.
/// Plain text (including the `nan` placeholder) only has its spacing touched.
pub fn normalize_description(raw: &str) -> String {
    let text = if HTML_TAG.is_match(raw) {
        let fragment = Html::parse_fragment(raw);
        fragment.root_element().text().collect::<Vec<_>>().join(" ")
    } else {
        raw.to_string()
    };

    let text = INLINE_SPACE.replace_all(&text, " ");
    let text = BLANK_LINES.replace_all(&text, "\n\n");
    text.lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

use anyhow::{Context, Result, bail};
use lettre::message::Mailbox;
use std::fs;
use std::path::{Path, PathBuf};

use crate::ai::{ModelSpec, resolve_model};

pub const DEFAULT_SEARCH_TERM: &str = concat!(
    r#"title:(("AI" OR "Artificial Intelligence" OR "Machine Learning" OR "ML" OR "#,
    r#""Deep Learning" OR "Computer Vision" OR "NLP" OR "GenAI" OR "Generative AI" OR "#,
    r#""LLM" OR "Applied AI" OR "MLOps") AND "Intern")"#,
);
pub const DEFAULT_LOCATION: &str = "United States";
pub const DEFAULT_RESULTS_WANTED: u32 = 20;
pub const DEFAULT_HOURS_OLD: u32 = 72;
pub const DEFAULT_SITES: &[&str] = &["indeed", "glassdoor", "zip_recruiter", "google"];
pub const DEFAULT_COUNTRY: &str = "USA";
pub const DEFAULT_OUTPUT_DIR: &str = "Todays_Job_Batch";
pub const DEFAULT_JOBSPY_URL: &str = "http://localhost:8000";
pub const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";
pub const DEFAULT_SMTP_PORT: u16 = 587;

/// Parameters handed to the listing source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchParams {
    pub search_term: String,
    pub location: String,
    /// Soft upper bound; keep it under 50 or providers start blocking.
    pub results_wanted: u32,
    pub hours_old: u32,
    pub sites: Vec<String>,
    pub country: String,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            search_term: DEFAULT_SEARCH_TERM.to_string(),
            location: DEFAULT_LOCATION.to_string(),
            results_wanted: DEFAULT_RESULTS_WANTED,
            hours_old: DEFAULT_HOURS_OLD,
            sites: DEFAULT_SITES.iter().map(|s| s.to_string()).collect(),
            country: DEFAULT_COUNTRY.to_string(),
        }
    }
}

impl SearchParams {
    /// Google Jobs wants the location spelled out in the query itself.
    pub fn google_search_term(&self) -> String {
        format!("{} jobs in {}", self.search_term, self.location)
    }
}

#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub sender: Mailbox,
    pub password: String,
    pub receiver: Mailbox,
    pub smtp_host: String,
    pub smtp_port: u16,
}

impl EmailConfig {
    fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self> {
        let smtp_port = match lookup("SMTP_PORT") {
            Some(port) => port
                .trim()
                .parse::<u16>()
                .context("SMTP_PORT must be a valid port number")?,
            None => DEFAULT_SMTP_PORT,
        };

        Ok(Self {
            sender: require_mailbox(lookup, "EMAIL_SENDER")?,
            password: require(lookup, "EMAIL_PASSWORD")?,
            receiver: require_mailbox(lookup, "EMAIL_RECEIVER")?,
            smtp_host: lookup("SMTP_HOST").unwrap_or_else(|| DEFAULT_SMTP_HOST.to_string()),
            smtp_port,
        })
    }
}

/// Where the live listing source lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    pub base_url: String,
    pub api_key: Option<String>,
}

impl SourceConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(&|key: &str| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Self {
        Self {
            base_url: lookup("JOBSPY_API_URL")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_JOBSPY_URL.to_string()),
            api_key: lookup("JOBSPY_API_KEY").filter(|v| !v.trim().is_empty()),
        }
    }
}

/// Knobs the CLI passes in before the environment is consulted.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub model: String,
    pub resume_path: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub send_email: bool,
}

/// Everything a pipeline run needs, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub model: ModelSpec,
    pub api_key: String,
    pub resume: String,
    pub email: Option<EmailConfig>,
    pub output_dir: PathBuf,
}

impl Config {
    pub fn from_env(options: &RunOptions) -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(options, &|key: &str| std::env::var(key).ok())
    }

    pub fn from_lookup(
        options: &RunOptions,
        lookup: &impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let model = resolve_model(&options.model)?;
        let api_key = require(lookup, model.provider.api_key_var())?;

        let resume_path = match &options.resume_path {
            Some(path) => path.clone(),
            None => PathBuf::from(require(lookup, "RESUME_PATH").context(
                "No resume given. Pass --resume <file> or set RESUME_PATH",
            )?),
        };
        let resume = load_resume(&resume_path)?;

        let email = if options.send_email {
            Some(EmailConfig::from_lookup(lookup)?)
        } else {
            None
        };

        Ok(Self {
            model,
            api_key,
            resume,
            email,
            output_dir: options.output_dir.clone(),
        })
    }
}

fn load_resume(path: &Path) -> Result<String> {
    let resume = fs::read_to_string(path)
        .with_context(|| format!("Failed to read resume file: {}", path.display()))?;
    if resume.trim().is_empty() {
        bail!("Resume file {} is empty", path.display());
    }
    Ok(resume)
}

fn require(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String> {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// Addresses are checked here so a typo stops the run before any model call.
fn require_mailbox(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Mailbox> {
    let address = require(lookup, key)?;
    address
        .parse()
        .with_context(|| format!("{key} is not a valid email address: '{address}'"))
}

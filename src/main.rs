mod ai;
mod artifact;
mod config;
mod dedup;
mod filter;
mod models;
mod pipeline;
mod report;
mod source;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use ai::{create_provider, has_usable_text};
use config::{
    Config, DEFAULT_COUNTRY, DEFAULT_HOURS_OLD, DEFAULT_LOCATION, DEFAULT_OUTPUT_DIR,
    DEFAULT_RESULTS_WANTED, DEFAULT_SEARCH_TERM, DEFAULT_SITES, RunOptions, SearchParams,
    SourceConfig,
};
use dedup::dedup_listings;
use filter::pre_filter;
use pipeline::{RunSummary, run_batch};
use report::{Notifier, SmtpNotifier};
use source::{CsvListingSource, JobSpyApiSource, ListingSource, fetch_listings, write_csv};

#[derive(Parser)]
#[command(name = "autohunt")]
#[command(about = "Daily job-search batch - scrape, screen, score with AI, and email application kits")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SearchArgs {
    /// Search query sent to the job boards
    #[arg(short = 't', long, default_value = DEFAULT_SEARCH_TERM)]
    search_term: String,

    /// Where the jobs are
    #[arg(short, long, default_value = DEFAULT_LOCATION)]
    location: String,

    /// Results to request (keep under 50 to avoid bans)
    #[arg(short = 'n', long, default_value_t = DEFAULT_RESULTS_WANTED)]
    results: u32,

    /// Only jobs posted within this many hours
    #[arg(long, default_value_t = DEFAULT_HOURS_OLD)]
    hours_old: u32,

    /// Job boards to query, comma-separated
    #[arg(long, value_delimiter = ',', default_values = DEFAULT_SITES)]
    sites: Vec<String>,

    /// Country for Indeed/Glassdoor
    #[arg(long, default_value = DEFAULT_COUNTRY)]
    country: String,
}

impl From<SearchArgs> for SearchParams {
    fn from(args: SearchArgs) -> Self {
        Self {
            search_term: args.search_term,
            location: args.location,
            results_wanted: args.results,
            hours_old: args.hours_old,
            sites: args.sites,
            country: args.country,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline and email the report
    Run {
        #[command(flatten)]
        search: SearchArgs,

        /// Read listings from a CSV (from `scrape`) instead of the live source
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Folder for the generated application kits
        #[arg(short, long, default_value = DEFAULT_OUTPUT_DIR)]
        output_dir: PathBuf,

        /// Model to use (gpt-4-turbo, gpt-4o, gpt-4o-mini, api-sonnet, api-haiku)
        #[arg(short, long, default_value = "gpt-4-turbo")]
        model: String,

        /// Path to resume file (falls back to RESUME_PATH)
        #[arg(short, long)]
        resume: Option<PathBuf>,

        /// Write the kits but don't send the email
        #[arg(long)]
        no_email: bool,
    },

    /// Fetch listings and save them to CSV
    Scrape {
        #[command(flatten)]
        search: SearchArgs,

        /// Output CSV path
        #[arg(short, long, default_value = "jobs.csv")]
        output: PathBuf,
    },

    /// Show which listings in a CSV would survive the keyword screen
    Filter {
        /// CSV written by `scrape`
        input: PathBuf,
    },
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Commands::Run {
            search,
            input,
            output_dir,
            model,
            resume,
            no_email,
        } => {
            let options = RunOptions {
                model,
                resume_path: resume,
                output_dir,
                send_email: !no_email,
            };
            let config = Config::from_env(&options)?;
            let params = SearchParams::from(search);

            let provider = create_provider(&config.model, &config.api_key);
            let source: Box<dyn ListingSource> = match input {
                Some(path) => Box::new(CsvListingSource::new(path)),
                None => Box::new(JobSpyApiSource::new(SourceConfig::from_env())),
            };
            let notifier = config.email.as_ref().map(SmtpNotifier::new);
            println!(
                "Model: {} | Output: {}",
                config.model.short_name,
                config.output_dir.display()
            );

            let summary = run_batch(
                &config,
                &params,
                source.as_ref(),
                provider.as_ref(),
                notifier.as_ref().map(|n| n as &dyn Notifier),
            )?;
            print_summary(&summary);
        }

        Commands::Scrape { search, output } => {
            let params = SearchParams::from(search);
            let source = JobSpyApiSource::new(SourceConfig::from_env());

            let listings = fetch_listings(&source, &params);
            let found = listings.len();
            let (listings, removed) = dedup_listings(listings);
            println!(
                "Found {} jobs (removed {} duplicates). Final count: {}",
                found,
                removed,
                listings.len()
            );

            if !listings.is_empty() {
                println!("{:<10} {:<34} {:<24}", "SITE", "TITLE", "COMPANY");
                println!("{}", "-".repeat(68));
                for listing in listings.iter().take(5) {
                    println!(
                        "{:<10} {:<34} {:<24}",
                        truncate(&listing.source_site, 10),
                        truncate(&listing.title, 32),
                        truncate(&listing.company, 22)
                    );
                }
            }

            write_csv(&listings, &output)?;
            println!("Saved to {}", output.display());
        }

        Commands::Filter { input } => {
            let listings = CsvListingSource::new(&input).fetch(&SearchParams::default())?;
            let (listings, removed) = dedup_listings(listings);
            if removed > 0 {
                println!("Removed {} duplicate(s)", removed);
            }
            if listings.is_empty() {
                println!("No jobs found.");
                return Ok(());
            }

            println!(
                "{:<6} {:<30} {:<20} {:<5} {}",
                "PASS", "TITLE", "COMPANY", "TEXT", "REASON"
            );
            println!("{}", "-".repeat(84));
            let mut passed = 0;
            for listing in &listings {
                let outcome = pre_filter(listing);
                if outcome.passed() {
                    passed += 1;
                }
                println!(
                    "{:<6} {:<30} {:<20} {:<5} {}",
                    if outcome.passed() { "yes" } else { "no" },
                    truncate(&listing.title, 28),
                    truncate(&listing.company, 18),
                    if has_usable_text(&listing.description) { "ok" } else { "-" },
                    outcome
                );
            }
            println!("\n{} of {} would go to the model.", passed, listings.len());
        }
    }

    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!("\nResults:");
    println!("  Jobs found:          {}", summary.retrieved);
    println!("  Duplicates removed:  {}", summary.duplicates_removed);
    println!(
        "  Screened out:        {} (title) / {} (citizenship)",
        summary.rejected_by_title, summary.rejected_by_eligibility
    );
    if summary.rejected_empty > 0 {
        println!("  Empty listings:      {}", summary.rejected_empty);
    }
    println!("  Verdict STOP:        {}", summary.stopped);
    if summary.evaluation_errors > 0 {
        println!("  AI errors:           {}", summary.evaluation_errors);
    }
    if summary.artifact_failures > 0 {
        println!("  Failed to save:      {}", summary.artifact_failures);
    }
    println!("  Application kits:    {}", summary.accepted());

    for entry in &summary.report {
        println!(
            "    {} @ {} -> {}",
            entry.title,
            entry.company,
            entry.file_path.display()
        );
    }

    if summary.notified {
        println!("\nEmail report sent.");
    } else if summary.retrieved == 0 {
        println!("\nNo jobs found.");
    } else if summary.report.is_empty() {
        println!("\nNo valid applications found today, so no email sent.");
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

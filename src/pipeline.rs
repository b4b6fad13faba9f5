use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs;
use tracing::{info, warn};

use crate::ai::{AIProvider, evaluate};
use crate::artifact::save_app_kit;
use crate::config::{Config, SearchParams};
use crate::dedup::dedup_listings;
use crate::filter::{FilterOutcome, pre_filter};
use crate::models::ReportEntry;
use crate::report::{Notifier, send_report};
use crate::source::{ListingSource, fetch_listings};

/// What happened to the batch, for the end-of-run printout.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub retrieved: usize,
    pub duplicates_removed: usize,
    pub rejected_empty: usize,
    pub rejected_by_title: usize,
    pub rejected_by_eligibility: usize,
    pub stopped: usize,
    pub evaluation_errors: usize,
    pub artifact_failures: usize,
    pub report: Vec<ReportEntry>,
    pub notified: bool,
}

impl RunSummary {
    pub fn accepted(&self) -> usize {
        self.report.len()
    }
}

/// One full pass: retrieve, dedup, screen, evaluate, write kits, send the digest.
///
/// Everything that goes wrong with a single listing is logged and counted; the
/// loop moves on. Only a failure to create the output directory or to deliver
/// the digest ends the run with an error.
pub fn run_batch(
    config: &Config,
    params: &SearchParams,
    source: &dyn ListingSource,
    provider: &dyn AIProvider,
    notifier: Option<&dyn Notifier>,
) -> Result<RunSummary> {
    let mut summary = RunSummary::default();

    let listings = fetch_listings(source, params);
    summary.retrieved = listings.len();

    let (listings, removed) = dedup_listings(listings);
    summary.duplicates_removed = removed;
    info!(
        found = summary.retrieved,
        duplicates = removed,
        remaining = listings.len(),
        "deduplicated listings"
    );

    if listings.is_empty() {
        info!("no jobs found");
        return Ok(summary);
    }

    fs::create_dir_all(&config.output_dir).with_context(|| {
        format!(
            "Failed to create output directory {}",
            config.output_dir.display()
        )
    })?;

    info!(model = provider.model_name(), "starting AI analysis");
    let mut written_kits = HashSet::new();

    for listing in &listings {
        info!(
            title = %listing.title,
            company = %listing.company,
            site = %listing.source_site,
            "checking listing"
        );

        match pre_filter(listing) {
            FilterOutcome::Pass => {}
            outcome => {
                info!(reason = %outcome, "skipping");
                match outcome {
                    FilterOutcome::NonTechnicalTitle(_) => summary.rejected_by_title += 1,
                    FilterOutcome::EligibilityRestricted(_) => {
                        summary.rejected_by_eligibility += 1
                    }
                    _ => summary.rejected_empty += 1,
                }
                continue;
            }
        }

        let verdict = match evaluate(provider, &config.resume, &listing.description) {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!(title = %listing.title, error = %e, "AI error");
                summary.evaluation_errors += 1;
                continue;
            }
        };

        if !verdict.decision.is_apply() {
            info!(reasoning = %verdict.reasoning, "verdict: STOP");
            summary.stopped += 1;
            continue;
        }

        info!(
            verdict = %verdict.decision,
            score = verdict.compatibility_score,
            "verdict"
        );
        match save_app_kit(&config.output_dir, listing, &verdict, &mut written_kits) {
            Some(artifact) => summary.report.push(ReportEntry::from(&artifact)),
            None => summary.artifact_failures += 1,
        }
    }

    info!(accepted = summary.accepted(), "batch complete");

    match (notifier, &config.email) {
        (Some(notifier), Some(email)) => {
            let today = chrono::Local::now().date_naive();
            summary.notified = send_report(notifier, email, &summary.report, today)
                .context("Email report was not sent")?;
        }
        _ => info!("email disabled for this run"),
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{CompletionRequest, EvaluationError, resolve_model};
    use crate::config::EmailConfig;
    use crate::models::Listing;
    use crate::report::NotifyError;
    use lettre::Message;
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;
    use std::path::Path;

    const GOOD_DESCRIPTION: &str = "Join our applied ML team as an intern. You will fine-tune \
        LLMs, build evaluation harnesses in Python, and ship features to production.";

    fn apply_reply(company: &str) -> String {
        serde_json::json!({
            "verdict": "APPLY (Long-Term)",
            "reasoning": "Sponsors visas; stack matches",
            "compatibility_score": 87,
            "optimized_summary": "MS AI student building LLM evaluation tooling.",
            "tailored_bullets": ["one", "two", "three"],
            "cover_letter_hook": "Hi! I'd love to help with your eval stack.",
            "company_name": company
        })
        .to_string()
    }

    fn stop_reply() -> String {
        serde_json::json!({
            "verdict": "STOP",
            "reasoning": "Requires 5+ years of experience",
            "compatibility_score": 20,
            "optimized_summary": "",
            "tailored_bullets": [],
            "cover_letter_hook": ""
        })
        .to_string()
    }

    struct FakeSource(Vec<Listing>);

    impl ListingSource for FakeSource {
        fn fetch(&self, _params: &SearchParams) -> Result<Vec<Listing>> {
            Ok(self.0.clone())
        }

        fn name(&self) -> &str {
            "fake"
        }
    }

    struct ScriptedProvider {
        replies: RefCell<VecDeque<Result<String, u16>>>,
        calls: Cell<usize>,
    }

    impl ScriptedProvider {
        fn new(replies: Vec<Result<String, u16>>) -> Self {
            Self {
                replies: RefCell::new(replies.into()),
                calls: Cell::new(0),
            }
        }
    }

    impl AIProvider for ScriptedProvider {
        fn complete(&self, _request: &CompletionRequest<'_>) -> Result<String, EvaluationError> {
            self.calls.set(self.calls.get() + 1);
            match self.replies.borrow_mut().pop_front() {
                Some(Ok(text)) => Ok(text),
                Some(Err(status)) => Err(EvaluationError::Api {
                    status,
                    message: "upstream error".to_string(),
                }),
                None => panic!("provider called more often than scripted"),
            }
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        subjects: RefCell<Vec<String>>,
        fail: bool,
    }

    impl Notifier for RecordingNotifier {
        fn send(&self, message: &Message) -> Result<(), NotifyError> {
            if self.fail {
                return Err(NotifyError::Transport("smtp down".to_string()));
            }
            let subject = message
                .headers()
                .get_raw("Subject")
                .unwrap_or_default()
                .to_string();
            self.subjects.borrow_mut().push(subject);
            Ok(())
        }
    }

    fn config(output_dir: &Path) -> Config {
        Config {
            model: resolve_model("gpt-4-turbo").unwrap(),
            api_key: "sk-test".to_string(),
            resume: "JANE DOE\nMS Artificial Intelligence".to_string(),
            email: Some(EmailConfig {
                sender: "bot@example.com".parse().unwrap(),
                password: "pw".to_string(),
                receiver: "me@example.com".parse().unwrap(),
                smtp_host: "smtp.example.com".to_string(),
                smtp_port: 587,
            }),
            output_dir: output_dir.to_path_buf(),
        }
    }

    fn listing(title: &str, company: &str, description: &str) -> Listing {
        Listing {
            title: title.to_string(),
            company: company.to_string(),
            description: description.to_string(),
            source_site: "indeed".to_string(),
            direct_url: format!("https://jobs.example/{}", company.to_lowercase()),
        }
    }

    fn run(
        output_dir: &Path,
        listings: Vec<Listing>,
        provider: &ScriptedProvider,
        notifier: &RecordingNotifier,
    ) -> Result<RunSummary> {
        run_batch(
            &config(output_dir),
            &SearchParams::default(),
            &FakeSource(listings),
            provider,
            Some(notifier),
        )
    }

    #[test]
    fn test_non_technical_title_never_reaches_the_model() {
        let dir = tempfile::tempdir().unwrap();
        let provider = ScriptedProvider::new(vec![]);
        let notifier = RecordingNotifier::default();

        let summary = run(
            dir.path(),
            vec![listing("Sales Manager", "Acme", GOOD_DESCRIPTION)],
            &provider,
            &notifier,
        )
        .unwrap();

        assert_eq!(summary.rejected_by_title, 1);
        assert_eq!(provider.calls.get(), 0);
        assert!(summary.report.is_empty());
        assert!(!summary.notified);
    }

    #[test]
    fn test_clearance_requirement_is_filtered() {
        let dir = tempfile::tempdir().unwrap();
        let provider = ScriptedProvider::new(vec![]);
        let notifier = RecordingNotifier::default();

        let summary = run(
            dir.path(),
            vec![listing("AI Engineer Intern", "Acme", "requires active secret clearance")],
            &provider,
            &notifier,
        )
        .unwrap();

        assert_eq!(summary.rejected_by_eligibility, 1);
        assert_eq!(provider.calls.get(), 0);
    }

    #[test]
    fn test_placeholder_description_stops_without_model_call() {
        let dir = tempfile::tempdir().unwrap();
        let provider = ScriptedProvider::new(vec![]);
        let notifier = RecordingNotifier::default();

        let summary = run(
            dir.path(),
            vec![listing("ML Intern", "Acme", "nan")],
            &provider,
            &notifier,
        )
        .unwrap();

        assert_eq!(summary.stopped, 1);
        assert_eq!(provider.calls.get(), 0);
        assert!(notifier.subjects.borrow().is_empty());
    }

    #[test]
    fn test_apply_verdict_writes_kit_and_sends_report() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("Todays_Job_Batch");
        let provider = ScriptedProvider::new(vec![Ok(apply_reply("Acme AI"))]);
        let notifier = RecordingNotifier::default();

        let summary = run(
            &out,
            vec![listing("ML Intern", "Acme", GOOD_DESCRIPTION)],
            &provider,
            &notifier,
        )
        .unwrap();

        assert_eq!(summary.accepted(), 1);
        let entry = &summary.report[0];
        assert_eq!(entry.title, "ML Intern");
        assert_eq!(entry.company, "Acme");
        assert_eq!(entry.reasoning, "Sponsors visas; stack matches");
        assert_eq!(entry.url, "https://jobs.example/acme");
        assert_eq!(entry.file_path, out.join("App_Kit_Acme AI.md"));
        assert!(entry.file_path.exists());

        assert!(summary.notified);
        let subjects = notifier.subjects.borrow();
        assert_eq!(subjects.len(), 1);
        assert!(subjects[0].contains("1 New Opportunities"));
    }

    #[test]
    fn test_two_jobs_at_one_company_keep_separate_kits() {
        let dir = tempfile::tempdir().unwrap();
        let provider =
            ScriptedProvider::new(vec![Ok(apply_reply("Acme")), Ok(apply_reply("Acme"))]);
        let notifier = RecordingNotifier::default();

        let summary = run(
            dir.path(),
            vec![
                listing("ML Intern", "Acme", GOOD_DESCRIPTION),
                listing("NLP Intern", "Acme", GOOD_DESCRIPTION),
            ],
            &provider,
            &notifier,
        )
        .unwrap();

        assert_eq!(summary.accepted(), 2);
        let first = &summary.report[0];
        let second = &summary.report[1];
        assert_eq!(first.file_path, dir.path().join("App_Kit_Acme.md"));
        assert_eq!(second.file_path, dir.path().join("App_Kit_Acme_2.md"));

        let first_kit = fs::read_to_string(&first.file_path).unwrap();
        let second_kit = fs::read_to_string(&second.file_path).unwrap();
        assert!(first_kit.contains("ML Intern"));
        assert!(!first_kit.contains("NLP Intern"));
        assert!(second_kit.contains("NLP Intern"));
    }

    #[test]
    fn test_zero_listings_is_a_clean_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("Todays_Job_Batch");
        let provider = ScriptedProvider::new(vec![]);
        let notifier = RecordingNotifier::default();

        let summary = run(&out, vec![], &provider, &notifier).unwrap();

        assert_eq!(summary, RunSummary::default());
        assert!(!out.exists());
        assert!(notifier.subjects.borrow().is_empty());
    }

    #[test]
    fn test_mixed_batch_isolates_failures() {
        let dir = tempfile::tempdir().unwrap();
        let provider = ScriptedProvider::new(vec![
            Err(500),
            Ok("not json at all".to_string()),
            Ok(stop_reply()),
            Ok(apply_reply("Globex")),
        ]);
        let notifier = RecordingNotifier::default();

        let summary = run(
            dir.path(),
            vec![
                listing("ML Intern", "Initech", GOOD_DESCRIPTION),
                listing("ML Intern", "INITECH", GOOD_DESCRIPTION),
                listing("NLP Intern", "Umbrella", GOOD_DESCRIPTION),
                listing("Data Intern", "Hooli", GOOD_DESCRIPTION),
                listing("Marketing Analyst", "Globex", GOOD_DESCRIPTION),
                listing("GenAI Intern", "Globex", GOOD_DESCRIPTION),
            ],
            &provider,
            &notifier,
        )
        .unwrap();

        assert_eq!(summary.retrieved, 6);
        assert_eq!(summary.duplicates_removed, 1);
        assert_eq!(summary.evaluation_errors, 2);
        assert_eq!(summary.stopped, 1);
        assert_eq!(summary.rejected_by_title, 1);
        assert_eq!(summary.accepted(), 1);
        assert_eq!(summary.report[0].title, "GenAI Intern");
        assert_eq!(provider.calls.get(), 4);
    }

    #[test]
    fn test_unwritable_kit_is_left_out_of_report() {
        let dir = tempfile::tempdir().unwrap();
        // a directory squatting on the kit's file name makes the write fail
        fs::create_dir_all(dir.path().join("App_Kit_Acme.md")).unwrap();
        let provider = ScriptedProvider::new(vec![Ok(apply_reply("Acme"))]);
        let notifier = RecordingNotifier::default();

        let summary = run(
            dir.path(),
            vec![listing("ML Intern", "Acme", GOOD_DESCRIPTION)],
            &provider,
            &notifier,
        )
        .unwrap();

        assert_eq!(summary.artifact_failures, 1);
        assert!(summary.report.is_empty());
        assert!(!summary.notified);
        assert!(notifier.subjects.borrow().is_empty());
    }

    #[test]
    fn test_transport_failure_fails_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let provider = ScriptedProvider::new(vec![Ok(apply_reply("Acme"))]);
        let notifier = RecordingNotifier {
            fail: true,
            ..Default::default()
        };

        let err = run(
            dir.path(),
            vec![listing("ML Intern", "Acme", GOOD_DESCRIPTION)],
            &provider,
            &notifier,
        )
        .unwrap_err();

        assert!(format!("{:#}", err).contains("smtp down"));
        assert!(dir.path().join("App_Kit_Acme.md").exists());
    }

    #[test]
    fn test_without_notifier_nothing_is_sent() {
        let dir = tempfile::tempdir().unwrap();
        let provider = ScriptedProvider::new(vec![Ok(apply_reply("Acme"))]);

        let summary = run_batch(
            &config(dir.path()),
            &SearchParams::default(),
            &FakeSource(vec![listing("ML Intern", "Acme", GOOD_DESCRIPTION)]),
            &provider,
            None,
        )
        .unwrap();

        assert_eq!(summary.accepted(), 1);
        assert!(!summary.notified);
    }
}

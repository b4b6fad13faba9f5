use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::models::{Artifact, Listing, Verdict};

/// Keeps only characters that are safe in a file name on every platform we
/// care about: alphanumerics, `.`, `_`, `-` and space.
pub fn sanitize_company(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, '.' | '_' | '-' | ' '))
        .collect()
}

/// The company the kit is filed under: what the model extracted, else what the
/// listing says.
pub fn kit_company<'a>(listing: &'a Listing, verdict: &'a Verdict) -> &'a str {
    [verdict.company_name.as_str(), listing.company.as_str()]
        .into_iter()
        .map(str::trim)
        .find(|name| !name.is_empty())
        .unwrap_or("Company")
}

pub fn kit_file_name(company: &str) -> String {
    format!("App_Kit_{}.md", sanitize_company(company))
}

/// `App_Kit_<company>.md`, or `App_Kit_<company>_2.md`, `_3`, ... once earlier
/// kits in this run hold the name.
pub fn unique_kit_path(output_dir: &Path, company: &str, taken: &HashSet<PathBuf>) -> PathBuf {
    let mut path = output_dir.join(kit_file_name(company));
    let mut n = 2;
    while taken.contains(&path) {
        path = output_dir.join(format!("App_Kit_{}_{}.md", sanitize_company(company), n));
        n += 1;
    }
    path
}

pub fn render_app_kit(listing: &Listing, verdict: &Verdict) -> String {
    let company = kit_company(listing, verdict);
    let site = if listing.source_site.is_empty() {
        "Unknown"
    } else {
        listing.source_site.as_str()
    };

    let mut doc = String::new();
    doc.push_str(&format!("# Application Kit: {}\n\n", company));
    doc.push_str(&format!("**Job Title**: {}\n\n", listing.title));
    doc.push_str(&format!("**Source**: {}\n\n", site));
    doc.push_str(&format!("**URL**: {}\n\n", listing.direct_url));
    doc.push_str("--------------------\n\n");

    doc.push_str("## Verdict\n\n");
    doc.push_str(&format!("{} - {}\n\n", verdict.decision, verdict.reasoning));
    doc.push_str(&format!(
        "Compatibility score: {}/100\n\n",
        verdict.compatibility_score
    ));

    doc.push_str("## LinkedIn Message\n\n");
    for line in verdict.outreach_hook.lines() {
        doc.push_str(&format!("> {}\n", line));
    }
    doc.push('\n');

    doc.push_str("## Optimized Summary\n\n");
    doc.push_str(&verdict.optimized_summary);
    doc.push_str("\n\n");

    doc.push_str("## Tailored Bullets\n\n");
    for bullet in &verdict.tailored_bullets {
        doc.push_str(&format!("- {}\n", bullet));
    }

    doc.push_str(&format!(
        "\n*Generated: {}*\n",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    ));
    doc
}

fn write_kit(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).with_context(|| format!("Failed to write {}", path.display()))
}

/// Writes the application kit for an accepted listing into `output_dir`.
///
/// `written` holds the kits already saved this run; the new path is added to
/// it so a second job at the same company gets its own file.
/// A failed write is logged and yields `None`; the batch carries on without
/// this listing in the report.
pub fn save_app_kit<'a>(
    output_dir: &Path,
    listing: &'a Listing,
    verdict: &'a Verdict,
    written: &mut HashSet<PathBuf>,
) -> Option<Artifact<'a>> {
    let path = unique_kit_path(output_dir, kit_company(listing, verdict), written);

    match write_kit(&path, &render_app_kit(listing, verdict)) {
        Ok(()) => {
            info!(file = %path.display(), "saved application kit");
            written.insert(path.clone());
            Some(Artifact {
                path,
                listing,
                verdict,
            })
        }
        Err(e) => {
            error!(file = %path.display(), error = %format!("{:#}", e), "error saving file");
            None
        }
    }
}

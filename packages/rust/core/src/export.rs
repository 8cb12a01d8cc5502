//! Markdown report for a finished analysis.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use docgate_shared::{Category, FilterOutcome, ScoredPage};

fn category_heading(category: Category) -> &'static str {
    match category {
        Category::Tutorial => "Tutorials",
        Category::Concept => "Concepts",
        Category::Reference => "References",
        Category::Example => "Examples",
    }
}

/// Render `outcome` as a markdown report suitable for pasting into an
/// issue or a chat with a coding assistant.
///
/// Results are grouped by category in [`Category::ALL`] order; empty
/// categories are omitted.
pub fn format_markdown(outcome: &FilterOutcome, base_url: &str, generated_at: DateTime<Utc>) -> String {
    let mut grouped: HashMap<Category, Vec<&ScoredPage>> = HashMap::new();
    for result in &outcome.results {
        grouped.entry(result.category).or_default().push(result);
    }

    let mut md = String::new();
    md.push_str("# Documentation Analysis\n\n");

    md.push_str("## Context\n");
    md.push_str(&format!("- **Issue:** {}\n", outcome.issue_description));
    md.push_str(&format!("- **Source:** {base_url}\n"));
    md.push_str(&format!(
        "- **Analyzed at:** {}\n",
        generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    md.push_str(&format!("- **AI Provider:** {}\n\n", outcome.provider_name));

    md.push_str("## Recommended Documents\n\n");
    for category in Category::ALL {
        let Some(pages) = grouped.get(&category) else {
            continue;
        };

        md.push_str(&format!("### {}\n", category_heading(category)));
        for (idx, page) in pages.iter().enumerate() {
            let label = if page.page.title.is_empty() {
                page.url()
            } else {
                page.page.title.as_str()
            };
            md.push_str(&format!(
                "{}. [{label}]({}) {}/10\n",
                idx + 1,
                page.url(),
                page.relevance
            ));
            md.push_str(&format!("   → {}\n", page.reason));
        }
        md.push('\n');
    }

    md.push_str("## Summary\n");
    md.push_str(&format!("- URLs scanned: {}\n", outcome.total_scanned));
    md.push_str(&format!("- URLs pre-filtered: {}\n", outcome.pre_filtered));
    md.push_str(&format!("- URLs scored by AI: {}\n", outcome.ai_scored));
    md.push_str(&format!("- Relevant URLs: {}\n", outcome.results.len()));

    let counts: Vec<String> = Category::ALL
        .iter()
        .filter_map(|c| {
            grouped
                .get(c)
                .map(|pages| format!("{} ({})", category_heading(*c), pages.len()))
        })
        .collect();
    if !counts.is_empty() {
        md.push_str(&format!("- Categories: {}\n", counts.join(", ")));
    }

    md.push_str(&format!(
        "- Duration: {:.1}s\n",
        outcome.duration_ms as f64 / 1000.0
    ));

    md
}

//! Scoring prompt shared by every provider.

use docgate_shared::PageMetadata;

/// Render the relevance-scoring prompt for one batch of pages.
pub fn build_prompt(issue_description: &str, pages: &[PageMetadata]) -> String {
    let urls_list = pages
        .iter()
        .map(format_page)
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are an expert technical documentation analyst.

USER'S PROBLEM: {issue_description}

Evaluate the following documentation URLs. For each URL, provide:
- relevance (0-10): how relevant to the user's problem
- category: "tutorial" | "reference" | "concept" | "example"
- reason: brief explanation (1 sentence)

Return a JSON array only, no other text. Example:
[{{"url": "...", "relevance": 8, "category": "tutorial", "reason": "..."}}]

URLs to evaluate:
{urls_list}"#
    )
}

fn format_page(page: &PageMetadata) -> String {
    format!(
        "- URL: {}\n  Title: {}\n  Description: {}\n  Path: {}",
        page.url, page.title, page.description, page.path
    )
}

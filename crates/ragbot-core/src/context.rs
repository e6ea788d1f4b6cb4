//! Bounded context assembly for the generator prompt.
//!
//! Turns retrieved [`TextUnit`]s into the context string handed to the
//! language model, in one of two shapes:
//!
//! - **Overview** (no filter): one unit per [`SourceKind`], each rendered as
//!   `"<kind>: <first N chars>"`, joined by `" | "` and capped at the
//!   overview budget.
//! - **Filtered**: full contents joined by spaces, capped at the filtered
//!   budget.
//!
//! Budgets count Unicode scalar values. A truncated context is followed by
//! [`ELLIPSIS`], so the result is at most `budget + ELLIPSIS.len()` chars.
//!
//! [`SourceKind`]: crate::models::SourceKind

use std::collections::HashSet;

use crate::models::{SourceKind, TextUnit, WebSnippet, WEB_SOURCE_LABEL};

/// Marker appended to a truncated context.
pub const ELLIPSIS: &str = "...";

/// Instruction used when the query spans every file type.
pub const OVERVIEW_INSTRUCTION: &str = "Summarize the content from all file types:";

/// Character budgets for context assembly.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextBudget {
    /// Characters kept from each unit in an overview segment.
    pub segment_chars: usize,
    /// Cap for the overview context.
    pub overview_chars: usize,
    /// Cap for a filtered context.
    pub filtered_chars: usize,
    /// Web snippets merged into the context.
    pub web_snippets: usize,
}

impl Default for ContextBudget {
    fn default() -> Self {
        Self {
            segment_chars: 100,
            overview_chars: 1000,
            filtered_chars: 500,
            web_snippets: 2,
        }
    }
}

/// Cuts `text` to `budget` chars, appending [`ELLIPSIS`] if anything was cut.
pub fn truncate_with_ellipsis(text: &str, budget: usize) -> String {
    match text.char_indices().nth(budget) {
        Some((byte_idx, _)) => {
            let mut out = String::with_capacity(byte_idx + ELLIPSIS.len());
            out.push_str(&text[..byte_idx]);
            out.push_str(ELLIPSIS);
            out
        }
        None => text.to_string(),
    }
}

fn take_chars(text: &str, n: usize) -> &str {
    match text.char_indices().nth(n) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Keeps the first unit seen for each source kind, preserving order.
pub fn select_one_per_kind(units: impl IntoIterator<Item = TextUnit>) -> Vec<TextUnit> {
    let mut seen: HashSet<SourceKind> = HashSet::new();
    units
        .into_iter()
        .filter(|u| seen.insert(u.source_kind))
        .collect()
}

/// Distinct source kind labels of `units`, in first-seen order.
pub fn distinct_sources(units: &[TextUnit]) -> Vec<String> {
    let mut seen: HashSet<SourceKind> = HashSet::new();
    units
        .iter()
        .filter(|u| seen.insert(u.source_kind))
        .map(|u| u.source_kind.as_str().to_string())
        .collect()
}

/// Context, source list, and instruction ready to become a prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledContext {
    pub context: String,
    pub sources: Vec<String>,
    pub instruction: String,
}

impl AssembledContext {
    /// Builds the overview context from already deduplicated units.
    pub fn overview(units: &[TextUnit], budget: &ContextBudget) -> Self {
        let joined = units
            .iter()
            .map(|u| {
                format!(
                    "{}: {}",
                    u.source_kind,
                    take_chars(&u.content, budget.segment_chars)
                )
            })
            .collect::<Vec<_>>()
            .join(" | ");

        Self {
            context: truncate_with_ellipsis(&joined, budget.overview_chars),
            sources: distinct_sources(units),
            instruction: OVERVIEW_INSTRUCTION.to_string(),
        }
    }

    /// Builds a filtered context. `scope` names the kind or file in the
    /// instruction.
    pub fn filtered(units: &[TextUnit], scope: &str, budget: &ContextBudget) -> Self {
        let joined = units
            .iter()
            .map(|u| u.content.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        Self {
            context: truncate_with_ellipsis(&joined, budget.filtered_chars),
            sources: distinct_sources(units),
            instruction: format!("Summarize {} content:", scope),
        }
    }

    /// Appends up to `limit` web snippets and marks `web` as a source.
    ///
    /// Does nothing when `snippets` is empty.
    pub fn merge_web(&mut self, snippets: &[WebSnippet], limit: usize) {
        if snippets.is_empty() || limit == 0 {
            return;
        }
        let rendered = snippets
            .iter()
            .take(limit)
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(" | ");
        self.context.push_str(" | Web Results: ");
        self.context.push_str(&rendered);
        self.sources.push(WEB_SOURCE_LABEL.to_string());
    }

    /// Composes `"From <sources>: <instruction> <context>"`.
    pub fn prompt(&self) -> String {
        compose_prompt(&self.sources, &self.instruction, &self.context)
    }
}

/// Composes the final prompt; the `From` clause is omitted without sources.
pub fn compose_prompt(sources: &[String], instruction: &str, context: &str) -> String {
    let hint = if sources.is_empty() {
        String::new()
    } else {
        format!("From {}: ", sources.join(", "))
    };
    format!("{}{} {}", hint, instruction, context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ALL_KINDS;

    fn unit(kind: SourceKind, content: &str) -> TextUnit {
        TextUnit::new(content, kind, format!("sample.{}", kind))
    }

    #[test]
    fn truncation_respects_budget() {
        for len in [0usize, 1, 499, 500, 501, 2000] {
            let text = "x".repeat(len);
            let out = truncate_with_ellipsis(&text, 500);
            assert!(out.chars().count() <= 500 + ELLIPSIS.len());
            assert_eq!(out.ends_with(ELLIPSIS), len > 500);
        }
    }

    #[test]
    fn truncation_counts_chars_not_bytes() {
        let text = "é".repeat(10);
        assert_eq!(truncate_with_ellipsis(&text, 4), "éééé...");
        assert_eq!(truncate_with_ellipsis(&text, 10), text);
    }

    #[test]
    fn one_unit_per_kind_first_seen_wins() {
        let units = vec![
            unit(SourceKind::Pdf, "first pdf"),
            unit(SourceKind::Csv, "a csv"),
            unit(SourceKind::Pdf, "second pdf"),
            unit(SourceKind::Csv, "another csv"),
            unit(SourceKind::Image, "an image"),
        ];
        let selected = select_one_per_kind(units);
        assert_eq!(selected.len(), 3);
        assert_eq!(selected[0].content, "first pdf");
        assert_eq!(selected[1].content, "a csv");
        assert_eq!(selected[2].source_kind, SourceKind::Image);
    }

    #[test]
    fn overview_has_one_labelled_segment_per_kind() {
        let mut units = Vec::new();
        for _ in 0..2 {
            for kind in ALL_KINDS {
                units.push(unit(kind, &"word ".repeat(50)));
            }
        }
        let selected = select_one_per_kind(units);
        let ctx = AssembledContext::overview(&selected, &ContextBudget::default());

        let segments: Vec<&str> = ctx.context.split(" | ").collect();
        assert_eq!(segments.len(), 5);
        for (segment, kind) in segments.iter().zip(ALL_KINDS) {
            assert!(segment.starts_with(&format!("{}: ", kind)));
        }
        assert_eq!(ctx.sources, vec!["pdf", "docx", "csv", "image", "video"]);
        assert_eq!(ctx.instruction, OVERVIEW_INSTRUCTION);
    }

    #[test]
    fn overview_segment_is_capped() {
        let units = vec![unit(SourceKind::Csv, &"a".repeat(300))];
        let ctx = AssembledContext::overview(&units, &ContextBudget::default());
        assert_eq!(ctx.context, format!("csv: {}", "a".repeat(100)));
    }

    #[test]
    fn overview_is_capped_at_budget() {
        let budget = ContextBudget {
            segment_chars: 400,
            ..ContextBudget::default()
        };
        let units: Vec<TextUnit> = ALL_KINDS
            .iter()
            .map(|k| unit(*k, &"z".repeat(400)))
            .collect();
        let ctx = AssembledContext::overview(&units, &budget);
        assert_eq!(ctx.context.chars().count(), 1000 + ELLIPSIS.len());
        assert!(ctx.context.ends_with(ELLIPSIS));
    }

    #[test]
    fn filtered_joins_with_spaces_and_caps() {
        let units = vec![
            unit(SourceKind::Docx, "alpha"),
            unit(SourceKind::Docx, "beta"),
        ];
        let ctx = AssembledContext::filtered(&units, "docx", &ContextBudget::default());
        assert_eq!(ctx.context, "alpha beta");
        assert_eq!(ctx.sources, vec!["docx"]);
        assert_eq!(ctx.instruction, "Summarize docx content:");

        let long = vec![unit(SourceKind::Pdf, &"p".repeat(800))];
        let ctx = AssembledContext::filtered(&long, "pdf", &ContextBudget::default());
        assert_eq!(ctx.context.chars().count(), 503);
    }

    #[test]
    fn web_merge_appends_two_snippets() {
        let mut ctx = AssembledContext::filtered(
            &[unit(SourceKind::Pdf, "report")],
            "pdf",
            &ContextBudget::default(),
        );
        let snippets: Vec<WebSnippet> = (1..=3)
            .map(|i| WebSnippet {
                title: format!("t{}", i),
                snippet: format!("s{}", i),
                link: format!("l{}", i),
            })
            .collect();
        ctx.merge_web(&snippets, 2);
        assert_eq!(
            ctx.context,
            "report | Web Results: Web: t1 - s1 from l1 | Web: t2 - s2 from l2"
        );
        assert_eq!(ctx.sources, vec!["pdf", "web"]);

        let before = ctx.clone();
        ctx.merge_web(&[], 2);
        assert_eq!(ctx, before);
    }

    #[test]
    fn prompt_omits_from_clause_without_sources() {
        assert_eq!(
            compose_prompt(&[], "Summarize pdf content:", "ctx"),
            "Summarize pdf content: ctx"
        );
        assert_eq!(
            compose_prompt(
                &["pdf".to_string(), "web".to_string()],
                "Summarize pdf content:",
                "ctx"
            ),
            "From pdf, web: Summarize pdf content: ctx"
        );
    }
}

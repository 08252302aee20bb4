//! Text summary builder for headless output.
//!
//! Formats the dashboard sections as plain lines, or the raw payload when the document
//! could not be rendered as structured sections.

use crate::model::SessionRecord;
use crate::render::{self, Payload, Row, Section};

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

pub(crate) fn build_text_summary(
    session_id: &str,
    record: Option<&SessionRecord>,
    payload: &Payload,
) -> TextSummary {
    let mut lines = Vec::new();
    match record {
        Some(r) => lines.push(format!(
            "Session {} · \"{}\" · {}",
            r.id,
            r.query,
            r.created_label()
        )),
        None => lines.push(format!("Session {session_id}")),
    }

    let sections = match payload {
        Payload::Structured { document, .. } => render::sections(document),
        Payload::Raw(_) => Vec::new(),
    };
    if sections.is_empty() {
        lines.push(String::new());
        lines.push("Raw document:".into());
        lines.extend(payload.raw_text().lines().map(str::to_string));
        return TextSummary { lines };
    }

    for section in &sections {
        lines.push(String::new());
        push_section(&mut lines, section);
    }
    TextSummary { lines }
}

fn push_section(lines: &mut Vec<String>, section: &Section) {
    lines.push(format!("== {} ==", section.title));
    if let Some(d) = section.description.as_deref() {
        lines.push(d.to_string());
    }
    for row in &section.rows {
        match row {
            Row::KeyValue { label, value } => lines.push(format!("  {label}: {value}")),
            Row::Text(text) => lines.push(format!("  {text}")),
            Row::Tags { label, items } => lines.push(format!("  {label}: {}", items.join(", "))),
            Row::Score {
                label,
                value,
                description,
            } => {
                let mut line = format!(
                    "  {label:<18} {} {:>5}/100",
                    render::score_bar(*value, 20),
                    render::format_score(*value)
                );
                if let Some(d) = description {
                    line.push_str(&format!("  {d}"));
                }
                lines.push(line);
            }
            Row::Status {
                label,
                active,
                detail,
            } => {
                let mark = if *active { "[x]" } else { "[ ]" };
                lines.push(format!("  {mark} {label}: {detail}"));
            }
            Row::Incident {
                year,
                kind,
                verified,
                description,
                impact,
            } => {
                let year = year.as_deref().map(|y| format!("{y} ")).unwrap_or_default();
                let status = if *verified { "verified" } else { "unverified" };
                lines.push(format!("  - {year}{kind} ({status})"));
                if let Some(d) = description {
                    lines.push(format!("    {d}"));
                }
                if let Some(i) = impact {
                    lines.push(format!("    Impact: {i}"));
                }
            }
            Row::Link { label, url } => {
                if label == url {
                    lines.push(format!("  {url}"));
                } else {
                    lines.push(format!("  {label}: {url}"));
                }
            }
        }
    }
}

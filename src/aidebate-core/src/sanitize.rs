//! Best-effort cleanup of raw model output.
//!
//! Local models tend to leak chain-of-thought in two shapes: explicit
//! `<think>...</think>` blocks, and numbered planning scaffolding such as
//! `1. **Analyze the Request:**` followed by bullets, with the actual
//! speech emitted last. This module strips both. It is a heuristic, not a
//! parser: when a pass leaves nothing substantial behind, the nearest
//! non-empty candidate wins, so a non-empty input never sanitizes to an
//! empty message.

use regex::Regex;
use std::sync::LazyLock;

/// Shortest line accepted as the start of real speech content after a
/// planning header.
const MIN_SUBSTANCE_CHARS: usize = 40;

static THINK_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<think>.*?</think>").unwrap());

/// Some backends drop the opening tag and stream `...</think>` only.
static LEADING_THINK_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)^.*?</think>\s*").unwrap());

/// A numbered markdown planning header, e.g. `5. **Final Output:**`.
static PLANNING_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\d+\.\s*\*\*[^*]+\*\*").unwrap());

static NUMBERED_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+\.").unwrap());

/// Bullet-artifact characters left at line starts once scaffolding is gone.
static LEADING_BULLETS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[\s*-]+").unwrap());

/// Strip reasoning artifacts from raw model output.
///
/// Never fails and never returns an empty string for input with any
/// non-whitespace content: if cleanup eats everything, the tag-stripped
/// text is returned, and failing that the trimmed raw input.
pub fn sanitize(raw: &str) -> String {
    // Step 1-2: explicit reasoning delimiters.
    let tag_stripped = THINK_BLOCK.replace_all(raw, "");
    let tag_stripped = LEADING_THINK_CLOSE.replace(&tag_stripped, "");

    // Step 3: recover the final-answer section below the last planning
    // header, if one exists.
    let cleaned = strip_planning_scaffold(&tag_stripped);

    // Step 4: leftover bullet artifacts.
    let cleaned = LEADING_BULLETS.replace_all(&cleaned, "").trim().to_string();

    if cleaned.len() >= MIN_SUBSTANCE_CHARS || (!cleaned.is_empty() && !had_scaffold(&tag_stripped))
    {
        return cleaned;
    }

    tracing::debug!(
        raw_len = raw.len(),
        cleaned_len = cleaned.len(),
        "sanitizer produced insubstantial output, falling back"
    );

    let fallback = tag_stripped.trim();
    if !fallback.is_empty() {
        fallback.to_string()
    } else {
        raw.trim().to_string()
    }
}

fn had_scaffold(text: &str) -> bool {
    text.lines().any(|l| PLANNING_HEADER.is_match(l.trim()))
}

/// Locate the LAST numbered planning header and keep only the content after
/// it, preferring the first substantial paragraph. Text without planning
/// headers passes through unchanged.
fn strip_planning_scaffold(text: &str) -> String {
    let lines: Vec<&str> = text.split('\n').collect();

    let last_header = lines
        .iter()
        .rposition(|line| PLANNING_HEADER.is_match(line.trim()));

    let Some(header_idx) = last_header else {
        return text.to_string();
    };

    for (i, line) in lines.iter().enumerate().skip(header_idx + 1) {
        let line = line.trim();
        // Skip empties, bullets, and sub-headers.
        if line.is_empty()
            || line.starts_with('*')
            || line.starts_with('-')
            || NUMBERED_LINE.is_match(line)
        {
            continue;
        }
        if line.len() > MIN_SUBSTANCE_CHARS {
            return lines[i..].join("\n");
        }
    }

    // No substantial paragraph found: everything after the last header.
    lines[header_idx + 1..].join("\n")
}

//! Inline citation extraction.
//!
//! Debaters are prompted to cite with `[Source: ...]` or `(Source: ...)`.
//! Both syntaxes are rewritten in a single left-to-right pass into numbered
//! superscript footnotes, so numbering always follows the order citations
//! appear in the text regardless of bracket style.

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static CITATION_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\[source:\s*([^\]]+)\]|\(source:\s*([^)]+)\)").unwrap()
});

/// One extracted citation, numbered from 1 within its message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Citation {
    pub id: usize,
    pub text: String,
}

/// Replace citation markers with `<sup>[n]</sup>` footnotes and return the
/// rewritten text plus the ordered citation list.
///
/// Pure and idempotent: the footnote syntax does not match the marker
/// pattern, so re-running on already-processed text is a no-op. Text with
/// no markers is returned unchanged with an empty list.
pub fn extract_citations(text: &str) -> (String, Vec<Citation>) {
    let mut citations = Vec::new();

    let rewritten = CITATION_MARKER.replace_all(text, |caps: &Captures<'_>| {
        let source_text = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str().trim())
            .unwrap_or("");
        let id = citations.len() + 1;
        citations.push(Citation {
            id,
            text: source_text.to_string(),
        });
        format!("<sup>[{id}]</sup>")
    });

    (rewritten.into_owned(), citations)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_square_bracket_citation() {
        let (text, citations) = extract_citations("Solar is cheapest [Source: IEA 2024].");
        assert_eq!(text, "Solar is cheapest <sup>[1]</sup>.");
        assert_eq!(citations, vec![Citation { id: 1, text: "IEA 2024".to_string() }]);
    }

    #[test]
    fn test_mixed_syntax_numbered_by_appearance() {
        let (text, citations) =
            extract_citations("Fact one [Source: NASA]. Fact two (Source: IPCC).");
        assert_eq!(text, "Fact one <sup>[1]</sup>. Fact two <sup>[2]</sup>.");
        assert_eq!(
            citations,
            vec![
                Citation { id: 1, text: "NASA".to_string() },
                Citation { id: 2, text: "IPCC".to_string() },
            ]
        );
    }

    #[test]
    fn test_paren_before_bracket_keeps_text_order() {
        let (text, citations) =
            extract_citations("First (Source: WHO), then [Source: CDC].");
        assert_eq!(text, "First <sup>[1]</sup>, then <sup>[2]</sup>.");
        assert_eq!(citations[0].text, "WHO");
        assert_eq!(citations[1].text, "CDC");
    }

    #[test]
    fn test_case_insensitive_keyword() {
        let (text, citations) = extract_citations("Claim [source: harvard study] and [SOURCE: MIT].");
        assert_eq!(text, "Claim <sup>[1]</sup> and <sup>[2]</sup>.");
        assert_eq!(citations.len(), 2);
    }

    #[test]
    fn test_source_text_trimmed() {
        let (_, citations) = extract_citations("X [Source:   USDA nutrition database  ].");
        assert_eq!(citations[0].text, "USDA nutrition database");
    }

    #[test]
    fn test_no_markers_unchanged() {
        let input = "A plain sentence with [brackets] and (parens) but no markers.";
        let (text, citations) = extract_citations(input);
        assert_eq!(text, input);
        assert!(citations.is_empty());
    }

    #[test]
    fn test_idempotent() {
        let (once, citations) =
            extract_citations("Fact [Source: NASA]. Another (Source: NOAA).");
        let (twice, second_citations) = extract_citations(&once);
        assert_eq!(once, twice);
        assert!(second_citations.is_empty());
        assert_eq!(citations.len(), 2);
    }

    #[test]
    fn test_ids_contiguous_from_one() {
        let (_, citations) = extract_citations(
            "[Source: A] mid (Source: B) more [Source: C] end (Source: D).",
        );
        let ids: Vec<usize> = citations.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_footnotes_match_citation_ids() {
        let (text, citations) =
            extract_citations("One [Source: A]. Two (Source: B). Three [Source: C].");
        for citation in &citations {
            assert!(text.contains(&format!("<sup>[{}]</sup>", citation.id)));
        }
    }
}

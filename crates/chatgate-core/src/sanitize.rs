//! Guard-output cleanup.
//!
//! The guard model, even when approving content verbatim, sometimes prepends a
//! `VERBATIM:` label, wraps the text in quotes, or appends a confirmation
//! sentence. Those artifacts are stripped here; substantive content is never
//! altered. `sanitize` is idempotent so it can be applied once to the full
//! guard output without iteration.

use once_cell::sync::Lazy;
use regex::Regex;

static VERBATIM_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^verbatim[:\-]\s*").unwrap());

/// Whole-line confirmation phrases the guard emits alongside approved text.
static BOILERPLATE_LINES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)^this candidate( text)? (appears to be|is) safe( and compliant)?\.?!?$",
        r"(?i)^no issues found\b.*$",
        r"(?i)^compliant\.?!?$",
        r"(?i)^the (candidate|text|content) (is|appears) (safe|compliant)\b.*$",
        r"(?i)^returning (it|the candidate) verbatim\.?$",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Strip guard boilerplate from `text`. Pure and idempotent.
pub fn sanitize(text: &str) -> String {
    let mut s = text.trim().to_string();

    s = VERBATIM_LABEL.replace(&s, "").trim().to_string();

    // Unwrap one layer of quotes only when the entire string is a single
    // quoted span: same char at both ends, no earlier closing quote inside.
    if s.len() >= 2 {
        let bytes = s.as_bytes();
        let (first, last) = (bytes[0], bytes[s.len() - 1]);
        if first == last
            && (first == b'"' || first == b'\'')
            && !s[1..s.len() - 1].contains(first as char)
        {
            s = s[1..s.len() - 1].trim().to_string();
            // The label may have been inside the quotes; strip it again.
            s = VERBATIM_LABEL.replace(&s, "").trim().to_string();
        }
    }

    let kept: Vec<&str> = s
        .lines()
        .filter(|line| {
            let trimmed = line.trim();
            !BOILERPLATE_LINES.iter().any(|re| re.is_match(trimmed))
        })
        .collect();

    kept.join("\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_verbatim_label_and_quotes() {
        assert_eq!(sanitize("VERBATIM: \"hello\""), "hello");
        assert_eq!(sanitize("verbatim- 'hi there'"), "hi there");
    }

    #[test]
    fn drops_confirmation_lines_but_keeps_content() {
        let input = "This candidate text appears to be safe and compliant.\nActual answer.\nNo issues found in the text.";
        assert_eq!(sanitize(input), "Actual answer.");
    }

    #[test]
    fn leaves_substantive_content_alone() {
        let input = "The compliant way to file taxes is online.";
        assert_eq!(sanitize(input), input);
    }

    #[test]
    fn does_not_unwrap_partial_quotes() {
        // Quotes that do not wrap the entire string are content.
        assert_eq!(sanitize("say \"hi\" to them"), "say \"hi\" to them");
    }

    #[test]
    fn strips_label_inside_wrapping_quotes() {
        assert_eq!(sanitize("\"VERBATIM: hi\""), "hi");
    }

    #[test]
    fn keeps_outer_quotes_when_not_a_single_span() {
        assert_eq!(sanitize("\"a\" and \"b\""), "\"a\" and \"b\"");
    }

    #[test]
    fn idempotent_over_representative_inputs() {
        let cases = [
            "VERBATIM: \"hello\"",
            "\"VERBATIM: hi\"",
            "\"a\" and \"b\"",
            "  padded  ",
            "Compliant.\nreal text",
            "plain",
            "'single quoted'",
            "a\nb\nc",
        ];
        for case in cases {
            let once = sanitize(case);
            assert_eq!(sanitize(&once), once, "not idempotent for {case:?}");
        }
    }
}

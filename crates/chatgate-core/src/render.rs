//! Content renderer: final string (+ citations) to JSON or sanitized markup.
//!
//! JSON preserves each route's historical response shape — tutor object,
//! dialogue bubble array, raw completion body — so existing callers of any one
//! route are unaffected by the gateway's internal normalization. HTML runs the
//! text through a minimal markdown converter and appends a Sources block when
//! the candidate carries citations.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};

use crate::dispatch::UpstreamKind;
use crate::normalize::{Candidate, SourceRef};
use crate::upstream::UpstreamEnvelope;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Html,
}

/// `?format=html` or an `Accept` header containing `text/html` selects markup;
/// JSON is the default.
pub fn negotiate(format_param: Option<&str>, accept: Option<&str>) -> OutputFormat {
    if format_param.is_some_and(|f| f.eq_ignore_ascii_case("html")) {
        return OutputFormat::Html;
    }
    if accept.is_some_and(|a| a.contains("text/html")) {
        return OutputFormat::Html;
    }
    OutputFormat::Json
}

/// Per-route JSON body for a successful outcome.
pub fn json_body(
    kind: UpstreamKind,
    envelope: &UpstreamEnvelope,
    candidate: &Candidate,
    sender: &str,
) -> Value {
    match kind {
        UpstreamKind::Tutor => json!({
            "answer": candidate.text,
            "sources": candidate.sources,
        }),
        UpstreamKind::Dialogue => json!([{
            "recipient_id": sender,
            "text": candidate.text,
        }]),
        UpstreamKind::Completion => envelope
            .json()
            .cloned()
            .unwrap_or_else(|| json!({ "text": envelope.raw })),
    }
}

/// Full HTML document for a successful outcome.
pub fn html_document(candidate: &Candidate, sources_mount: &str) -> String {
    let body = markdown_to_html(&candidate.text);
    let sources = sources_block(&candidate.sources, sources_mount);
    format!(
        "<!doctype html>\n<html><head><meta charset=\"utf-8\"><title>chatgate</title></head>\n<body>\n{body}\n{sources}</body></html>\n"
    )
}

static INLINE_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`([^`]+)`").unwrap());
static BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*([^*]+)\*\*").unwrap());
static LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]]+)\]\(([^)\s]+)\)").unwrap());

pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn inline_html(line: &str) -> String {
    let escaped = html_escape(line);
    let code = INLINE_CODE.replace_all(&escaped, "<code>$1</code>");
    let bold = BOLD.replace_all(&code, "<strong>$1</strong>");
    LINK.replace_all(&bold, "<a href=\"$2\">$1</a>").into_owned()
}

/// Minimal markdown converter: fenced code blocks, inline code, bold, links,
/// and bullet lists. Everything else becomes escaped paragraphs.
pub fn markdown_to_html(text: &str) -> String {
    let mut out = String::new();
    let mut in_code = false;
    let mut in_list = false;
    let mut paragraph: Vec<String> = Vec::new();

    fn flush_paragraph(out: &mut String, paragraph: &mut Vec<String>) {
        if !paragraph.is_empty() {
            out.push_str("<p>");
            out.push_str(&paragraph.join("<br>"));
            out.push_str("</p>\n");
            paragraph.clear();
        }
    }
    fn close_list(out: &mut String, in_list: &mut bool) {
        if *in_list {
            out.push_str("</ul>\n");
            *in_list = false;
        }
    }

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("```") {
            if in_code {
                out.push_str("</code></pre>\n");
            } else {
                flush_paragraph(&mut out, &mut paragraph);
                close_list(&mut out, &mut in_list);
                out.push_str("<pre><code>");
            }
            in_code = !in_code;
            continue;
        }
        if in_code {
            out.push_str(&html_escape(line));
            out.push('\n');
            continue;
        }
        if let Some(item) = trimmed.strip_prefix("- ").or_else(|| trimmed.strip_prefix("* ")) {
            flush_paragraph(&mut out, &mut paragraph);
            if !in_list {
                out.push_str("<ul>\n");
                in_list = true;
            }
            out.push_str("<li>");
            out.push_str(&inline_html(item));
            out.push_str("</li>\n");
            continue;
        }
        if trimmed.is_empty() {
            flush_paragraph(&mut out, &mut paragraph);
            close_list(&mut out, &mut in_list);
            continue;
        }
        close_list(&mut out, &mut in_list);
        paragraph.push(inline_html(trimmed));
    }
    // Unterminated fence: close it rather than emitting broken markup.
    if in_code {
        out.push_str("</code></pre>\n");
    }
    flush_paragraph(&mut out, &mut paragraph);
    close_list(&mut out, &mut in_list);
    out
}

/// "Sources" block: one link per citation. The target URL-encodes each path
/// segment under the static mount; the label is the path's last segment with
/// page (1-indexed for display) and score appended when present.
pub fn sources_block(sources: &[SourceRef], mount: &str) -> String {
    if sources.is_empty() {
        return String::new();
    }
    let mut out = String::from("<div class=\"sources\"><h3>Sources</h3><ul>\n");
    for source in sources {
        let href = source_href(mount, &source.source);
        let name = source.source.rsplit('/').next().unwrap_or(&source.source);
        let mut label = html_escape(name);
        if let Some(page) = source.page_index {
            label.push_str(&format!(", page {}", page + 1));
        }
        if let Some(score) = source.score {
            label.push_str(&format!(" (score {score:.2})"));
        }
        out.push_str(&format!("<li><a href=\"{href}\">{label}</a></li>\n"));
    }
    out.push_str("</ul></div>\n");
    out
}

fn source_href(mount: &str, path: &str) -> String {
    let encoded: Vec<String> = path
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect();
    format!("{}/{}", mount.trim_end_matches('/'), encoded.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn negotiation_defaults_to_json() {
        assert_eq!(negotiate(None, None), OutputFormat::Json);
        assert_eq!(negotiate(None, Some("application/json")), OutputFormat::Json);
        assert_eq!(negotiate(Some("html"), None), OutputFormat::Html);
        assert_eq!(negotiate(None, Some("text/html,*/*")), OutputFormat::Html);
    }

    #[test]
    fn markdown_basics() {
        let html = markdown_to_html("**bold** and `code`\n\n- one\n- two\n\n[link](http://x/y)");
        assert!(html.contains("<strong>bold</strong>"));
        assert!(html.contains("<code>code</code>"));
        assert!(html.contains("<li>one</li>"));
        assert!(html.contains("<li>two</li>"));
        assert!(html.contains("<a href=\"http://x/y\">link</a>"));
    }

    #[test]
    fn fenced_code_is_escaped_not_formatted() {
        let html = markdown_to_html("```\nlet x = a < b && **not bold**;\n```");
        assert!(html.contains("<pre><code>"));
        assert!(html.contains("a &lt; b &amp;&amp; **not bold**;"));
    }

    #[test]
    fn html_in_text_is_escaped() {
        let html = markdown_to_html("<script>alert(1)</script>");
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn sources_block_links_and_annotates() {
        let sources = vec![SourceRef {
            source: "a/b.pdf".to_string(),
            page_index: Some(2),
            chunk_index: None,
            score: None,
        }];
        let block = sources_block(&sources, "/static/sources");
        assert!(block.contains("href=\"/static/sources/a/b.pdf\""));
        assert!(block.contains("b.pdf, page 3"));
    }

    #[test]
    fn source_paths_are_segment_encoded() {
        let sources = vec![SourceRef {
            source: "unit 1/intro notes.pdf".to_string(),
            page_index: None,
            chunk_index: None,
            score: Some(0.874),
        }];
        let block = sources_block(&sources, "/static/sources");
        assert!(block.contains("/static/sources/unit%201/intro%20notes.pdf"));
        assert!(block.contains("(score 0.87)"));
    }

    #[test]
    fn json_shapes_follow_route_kind() {
        let env = UpstreamEnvelope::test_json(200, json!({"choices": [{"text": "hi"}]}));
        let candidate = Candidate {
            text: "hi".to_string(),
            sources: vec![],
        };
        let completion = json_body(UpstreamKind::Completion, &env, &candidate, "s1");
        assert_eq!(completion, json!({"choices": [{"text": "hi"}]}));

        let dialogue = json_body(UpstreamKind::Dialogue, &env, &candidate, "s1");
        assert_eq!(dialogue, json!([{"recipient_id": "s1", "text": "hi"}]));

        let tutor = json_body(UpstreamKind::Tutor, &env, &candidate, "s1");
        assert_eq!(tutor, json!({"answer": "hi", "sources": []}));
    }
}

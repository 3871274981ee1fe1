//! Markdown to Telegram HTML conversion.
//!
//! Raw model output is HTML-escaped first, then rewritten by a chain of
//! independent regex passes. The output may still be badly nested when the
//! input is a truncated stream prefix; [`balance`](crate::assistant::balance)
//! repairs that.

use regex::Regex;

use crate::assistant::balance::balance;

/// Replacement for a `---` horizontal rule line.
const DIVIDER: &str = "──────────────────";

/// Converts markdown-ish model output into Telegram HTML.
///
/// Holds the compiled rewrite passes; construct once and share.
pub struct MarkdownRenderer {
    horizontal_rule: Regex,
    blockquote: Regex,
    heading: Regex,
    bold: Regex,
    italic: Regex,
    strike: Regex,
    link: Regex,
    fenced_code: Regex,
    inline_code: Regex,
    bold_around_quote: Regex,
    bold_around_pre: Regex,
}

impl MarkdownRenderer {
    pub fn new() -> Self {
        Self {
            horizontal_rule: Regex::new(r"(?m)^[ \t]*-{3,}[ \t]*$").unwrap(),
            // The quote marker is matched in its escaped form; escaping runs first.
            blockquote: Regex::new(r"(?m)&gt;&gt;&gt;[ \t]*(.*)$").unwrap(),
            heading: Regex::new(r"(?m)^#+[ \t]*(.*?)[ \t]*$").unwrap(),
            bold: Regex::new(r"\*\*(.*?)\*\*|__(.*?)__").unwrap(),
            italic: Regex::new(r"\*(.*?)\*|_(.*?)_").unwrap(),
            strike: Regex::new(r"~~(.*?)~~").unwrap(),
            link: Regex::new(r"\[(.*?)\]\((.*?)\)").unwrap(),
            fenced_code: Regex::new(r"(?s)```(?:\w*\n)?(.*?)```").unwrap(),
            inline_code: Regex::new(r"`([^`\n]+)`").unwrap(),
            bold_around_quote: Regex::new(r"(?s)<b>(<blockquote>.*?</blockquote>)</b>").unwrap(),
            bold_around_pre: Regex::new(r"(?s)<b>(<pre>.*?</pre>)</b>").unwrap(),
        }
    }

    /// Escape + translate, without the balancing pass. Pure and deterministic.
    pub fn translate(&self, raw: &str) -> String {
        let text = escape(raw);
        let text = self.horizontal_rule.replace_all(&text, DIVIDER);
        let text = self.blockquote.replace_all(&text, "<blockquote>${1}</blockquote>");
        let text = self.heading.replace_all(&text, "<b>${1}</b>");
        let text = self.bold.replace_all(&text, "<b>${1}${2}</b>");
        let text = self.italic.replace_all(&text, "<i>${1}${2}</i>");
        let text = self.strike.replace_all(&text, "<s>${1}</s>");
        let text = self.link.replace_all(&text, r#"<a href="${2}">${1}</a>"#);
        // Fenced blocks before inline code: the inline pass would otherwise
        // consume the inner backtick pair of a ``` fence.
        let text = self.fenced_code.replace_all(&text, "<pre>${1}</pre>");
        let text = self.inline_code.replace_all(&text, "<code>${1}</code>");
        // Bold must not wrap block-level spans (a heading line that itself
        // held a quote or fence ends up as <b><blockquote>..</blockquote></b>).
        let text = self.bold_around_quote.replace_all(&text, "${1}");
        let text = self.bold_around_pre.replace_all(&text, "${1}");
        text.into_owned()
    }

    /// Full pipeline: escape, translate, balance. Safe on any stream prefix.
    pub fn render(&self, raw: &str) -> String {
        balance(&self.translate(raw))
    }
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Escape HTML-structural characters so raw content can never become live tags.
fn escape(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            _ => result.push(c),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn renderer() -> MarkdownRenderer {
        MarkdownRenderer::new()
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("a & b"), "a &amp; b");
        assert_eq!(escape("<b>"), "&lt;b&gt;");
    }

    #[test]
    fn test_injection_stays_literal() {
        let out = renderer().render("<script>alert('x')</script>");
        assert!(out.contains("&lt;script&gt;"));
        assert!(!out.contains("<script>"));
    }

    #[test]
    fn test_horizontal_rule() {
        assert_eq!(renderer().translate("a\n---\nb"), format!("a\n{DIVIDER}\nb"));
        assert_eq!(renderer().translate("-----"), DIVIDER);
        // Two hyphens is not a rule
        assert_eq!(renderer().translate("--"), "--");
    }

    #[test]
    fn test_blockquote() {
        assert_eq!(
            renderer().translate(">>> wise words"),
            "<blockquote>wise words</blockquote>"
        );
        // Mid-line marker, non-greedy to end of line
        assert_eq!(
            renderer().translate("said: >>> quoted\nnext"),
            "said: <blockquote>quoted</blockquote>\nnext"
        );
    }

    #[test]
    fn test_heading() {
        assert_eq!(renderer().translate("# Title"), "<b>Title</b>");
        assert_eq!(renderer().translate("### Deep"), "<b>Deep</b>");
    }

    #[test]
    fn test_bold_and_italic() {
        assert_eq!(renderer().translate("**x**"), "<b>x</b>");
        assert_eq!(renderer().translate("__x__"), "<b>x</b>");
        assert_eq!(renderer().translate("*x*"), "<i>x</i>");
        assert_eq!(renderer().translate("_x_"), "<i>x</i>");
    }

    #[test]
    fn test_strike_and_link() {
        assert_eq!(renderer().translate("~~x~~"), "<s>x</s>");
        assert_eq!(
            renderer().translate("[here](https://example.com)"),
            r#"<a href="https://example.com">here</a>"#
        );
    }

    #[test]
    fn test_inline_code() {
        assert_eq!(renderer().translate("`let x`"), "<code>let x</code>");
    }

    #[test]
    fn test_fenced_code() {
        assert_eq!(renderer().translate("```code```"), "<pre>code</pre>");
        assert_eq!(
            renderer().translate("```rust\nfn main() {}\n```"),
            "<pre>fn main() {}\n</pre>"
        );
    }

    #[test]
    fn test_code_content_is_escaped() {
        let out = renderer().translate("`a < b`");
        assert_eq!(out, "<code>a &lt; b</code>");
    }

    #[test]
    fn test_bold_never_wraps_blockquote() {
        // A heading line holding a quote would otherwise nest <blockquote> in <b>
        assert_eq!(
            renderer().translate("# >>> wise words"),
            "<blockquote>wise words</blockquote>"
        );
    }

    #[test]
    fn test_bold_never_wraps_pre() {
        assert_eq!(renderer().translate("# ```x```"), "<pre>x</pre>");
    }

    #[test]
    fn test_end_to_end() {
        let out = renderer().render("**Hello** >>> a quote\n```code```");
        assert_eq!(
            out,
            "<b>Hello</b> <blockquote>a quote</blockquote>\n<pre>code</pre>"
        );
    }

    #[test]
    fn test_prefix_is_well_formed() {
        // A bold marker cut mid-stream reads as an empty italic span; what
        // matters is that nothing is left unbalanced
        let out = renderer().render("**Hel");
        assert_eq!(out, "<i></i>Hel");
    }
}

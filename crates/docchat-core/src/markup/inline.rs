//! Span-level formatting for a single line of answer text.
//!
//! The line is HTML-escaped first; every rule after that operates on the
//! escaped text, so the only markup in the output is markup added here.
//! Rules run in a fixed order and earlier output is shielded from later
//! rules with NUL-delimited placeholders:
//!
//! 1. inline code spans are lifted out
//! 2. `~~strike~~`
//! 3. `***bold italic***` / `___bold italic___`
//! 4. `**bold**` / `__bold__`
//! 5. `*italic*` / `_italic_`
//! 6. `[label](url)`, http(s) only
//! 7. code spans are put back

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Delimits placeholders. Never survives escaping of user input because
/// NUL is replaced before anything else runs.
const MARK: char = '\u{0}';

static CODE_SPAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"`([^`]+)`").unwrap());

/// `](target)` where target may hold one level of balanced parentheses
static LINK_TARGET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\]\(((?:[^()\s]|\([^()\s]*\))*)\)").unwrap());

static STRIKE: Lazy<Regex> = Lazy::new(|| Regex::new(r"~~(.+?)~~").unwrap());
static BOLD_ITALIC_STAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*\*(.+?)\*\*\*").unwrap());
static BOLD_ITALIC_UNDERSCORE: Lazy<Regex> = Lazy::new(|| Regex::new(r"___(.+?)___").unwrap());
static BOLD_STAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(.+?)\*\*").unwrap());
static BOLD_UNDERSCORE: Lazy<Regex> = Lazy::new(|| Regex::new(r"__(.+?)__").unwrap());

static LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]+)\]\(\x00U(\d+)\x00\)").unwrap());
static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\x00([CU])(\d+)\x00").unwrap());

static SAFE_SCHEME: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^https?://").unwrap());

/// Escape the five characters that are significant in HTML text and attributes.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Format one line of raw text into escaped markup with inline spans.
pub fn format(line: &str) -> String {
    let line = line.replace(MARK, "\u{FFFD}");
    let mut html = escape_html(&line);

    let mut code_spans: Vec<String> = Vec::new();
    html = CODE_SPAN
        .replace_all(&html, |caps: &Captures| {
            code_spans.push(caps[1].to_string());
            placeholder('C', code_spans.len() - 1)
        })
        .into_owned();

    // Link targets are parked too so emphasis rules cannot reach into URLs.
    let mut targets: Vec<String> = Vec::new();
    html = LINK_TARGET
        .replace_all(&html, |caps: &Captures| {
            targets.push(caps[1].to_string());
            format!("]({})", placeholder('U', targets.len() - 1))
        })
        .into_owned();

    html = STRIKE.replace_all(&html, "<s>$1</s>").into_owned();
    html = BOLD_ITALIC_STAR
        .replace_all(&html, "<strong><em>$1</em></strong>")
        .into_owned();
    html = BOLD_ITALIC_UNDERSCORE
        .replace_all(&html, "<strong><em>$1</em></strong>")
        .into_owned();
    html = BOLD_STAR.replace_all(&html, "<strong>$1</strong>").into_owned();
    html = BOLD_UNDERSCORE.replace_all(&html, "<strong>$1</strong>").into_owned();
    html = emphasize(&html, '*');
    html = emphasize(&html, '_');

    html = LINK
        .replace_all(&html, |caps: &Captures| {
            let label = &caps[1];
            let target = lookup(&targets, &caps[2]).map(|t| code_as_literal(t, &code_spans));
            match target.as_deref().and_then(safe_link_url) {
                Some(url) => format!(
                    "<a href=\"{}\" target=\"_blank\" rel=\"noopener\">{}</a>",
                    url, label
                ),
                None => label.to_string(),
            }
        })
        .into_owned();

    // Stray targets may still hold code placeholders, so they go back first.
    let html = restore(&html, 'U', |target| target.to_string(), &targets);
    restore(&html, 'C', |code| format!("<code>{}</code>", code), &code_spans)
}

fn restore(html: &str, kind: char, render: impl Fn(&str) -> String, pool: &[String]) -> String {
    PLACEHOLDER
        .replace_all(html, |caps: &Captures| {
            if caps[1].starts_with(kind) {
                render(lookup(pool, &caps[2]).unwrap_or_default())
            } else {
                caps[0].to_string()
            }
        })
        .into_owned()
}

/// Code spans inside a URL go back to their backticked source text.
fn code_as_literal(target: &str, code_spans: &[String]) -> String {
    PLACEHOLDER
        .replace_all(target, |caps: &Captures| match &caps[1] {
            "C" => format!("`{}`", lookup(code_spans, &caps[2]).unwrap_or_default()),
            _ => caps[0].to_string(),
        })
        .into_owned()
}

fn placeholder(kind: char, index: usize) -> String {
    format!("{MARK}{kind}{index}{MARK}")
}

fn lookup<'a>(pool: &'a [String], index: &str) -> Option<&'a str> {
    index
        .parse::<usize>()
        .ok()
        .and_then(|i| pool.get(i))
        .map(String::as_str)
}

/// Only absolute http(s) URLs become anchors.
fn safe_link_url(url: &str) -> Option<&str> {
    let trimmed = url.trim();
    SAFE_SCHEME.is_match(trimmed).then_some(trimmed)
}

/// Wrap single-marker runs (`*x*`, `_x_`) in `<em>`.
///
/// A marker counts only when it is not next to another copy of itself, so
/// leftover `**` from unmatched bold never opens emphasis. Underscores must
/// additionally sit on a word boundary: `snake_case_name` stays literal.
fn emphasize(text: &str, marker: char) -> String {
    let chars: Vec<char> = text.chars().collect();
    let is_single = |i: usize| {
        chars[i] == marker
            && (i == 0 || chars[i - 1] != marker)
            && chars.get(i + 1) != Some(&marker)
    };
    let can_open = |i: usize| marker != '_' || i == 0 || !chars[i - 1].is_alphanumeric();
    let can_close = |i: usize| {
        marker != '_' || chars.get(i + 1).map_or(true, |c| !c.is_alphanumeric())
    };

    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while i < chars.len() {
        if is_single(i) && can_open(i) {
            let close = (i + 1..chars.len()).find(|&j| is_single(j) && can_close(j));
            if let Some(end) = close {
                out.push_str("<em>");
                out.extend(&chars[i + 1..end]);
                out.push_str("</em>");
                i = end + 1;
                continue;
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escapes_markup_characters() {
        assert_eq!(
            format(r#"<b>"Tom" & 'Jerry'</b>"#),
            "&lt;b&gt;&quot;Tom&quot; &amp; &#39;Jerry&#39;&lt;/b&gt;"
        );
    }

    #[test]
    fn test_bold_italic_strike() {
        assert_eq!(format("**bold**"), "<strong>bold</strong>");
        assert_eq!(format("__bold__"), "<strong>bold</strong>");
        assert_eq!(format("*it*"), "<em>it</em>");
        assert_eq!(format("_it_"), "<em>it</em>");
        assert_eq!(format("***both***"), "<strong><em>both</em></strong>");
        assert_eq!(format("___both___"), "<strong><em>both</em></strong>");
        assert_eq!(format("~~gone~~"), "<s>gone</s>");
    }

    #[test]
    fn test_italic_inside_bold() {
        assert_eq!(
            format("**bold *and* more**"),
            "<strong>bold <em>and</em> more</strong>"
        );
    }

    #[test]
    fn test_code_span_is_not_formatted() {
        assert_eq!(
            format("use `**x** < y` now"),
            "use <code>**x** &lt; y</code> now"
        );
    }

    #[test]
    fn test_unclosed_markers_stay_literal() {
        assert_eq!(format("2 * 3 = 6"), "2 * 3 = 6");
        assert_eq!(format("**open"), "**open");
        assert_eq!(format("`open"), "`open");
    }

    #[test]
    fn test_intraword_underscore_is_literal() {
        assert_eq!(format("call snake_case_name here"), "call snake_case_name here");
    }

    #[test]
    fn test_safe_link_becomes_anchor() {
        assert_eq!(
            format("see [docs](https://a.b/x_y_z)"),
            "see <a href=\"https://a.b/x_y_z\" target=\"_blank\" rel=\"noopener\">docs</a>"
        );
        assert!(format("[x](HTTP://A.B)").contains("href=\"HTTP://A.B\""));
    }

    #[test]
    fn test_unsafe_link_keeps_label_only() {
        assert_eq!(format("[x](javascript:alert(1))"), "x");
        assert_eq!(format("[x](data:text/html,hi)"), "x");
        assert_eq!(format("[x](/relative)"), "x");
    }

    #[test]
    fn test_link_label_is_formatted() {
        assert_eq!(
            format("[**bold**](https://a.b)"),
            "<a href=\"https://a.b\" target=\"_blank\" rel=\"noopener\"><strong>bold</strong></a>"
        );
    }

    #[test]
    fn test_stray_link_target_is_restored() {
        assert_eq!(format("x](https://a.b) y"), "x](https://a.b) y");
    }

    #[test]
    fn test_link_url_cannot_break_attribute() {
        let html = format(r#"[x](https://a.b/"onmouseover="alert(1))"#);
        assert!(!html.contains("\"onmouseover"));
        assert!(html.contains("&quot;onmouseover=&quot;"));
    }

    #[test]
    fn test_code_span_inside_stray_target_is_restored() {
        let html = format("a](`b`) c");
        assert_eq!(html, "a](<code>b</code>) c");
        assert!(!html.contains('\u{0}'));
    }

    #[test]
    fn test_code_span_in_link_url_stays_out_of_attribute() {
        let html = format("[x](https://a.b/`c`)");
        assert_eq!(
            html,
            "<a href=\"https://a.b/`c`\" target=\"_blank\" rel=\"noopener\">x</a>"
        );
    }

    #[test]
    fn test_nul_cannot_forge_placeholder() {
        let html = format("a\u{0}C0\u{0}b `code`");
        assert_eq!(html, "a\u{FFFD}C0\u{FFFD}b <code>code</code>");
    }
}

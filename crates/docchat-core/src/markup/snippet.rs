use once_cell::sync::Lazy;
use regex::Regex;

pub const DEFAULT_SNIPPET_CHARS: usize = 90;

static FENCED: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)```.*?```").unwrap());
static CODE_SPAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"`([^`]+)`").unwrap());
static LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]]+)\]\([^)\s]*\)").unwrap());
static MARKERS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[*_#>~-]+").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// One-line plain-text preview of a markdown message, for chat lists.
///
/// Code blocks are dropped, links keep their label and emphasis markers are
/// removed. The result is not escaped.
pub fn snippet(markdown: &str, max_chars: usize) -> String {
    let text = FENCED.replace_all(markdown, " ");
    let text = CODE_SPAN.replace_all(&text, "$1");
    let text = LINK.replace_all(&text, "$1");
    let text = MARKERS.replace_all(&text, " ");
    let text = WHITESPACE.replace_all(&text, " ");
    text.trim().chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snippet_strips_markdown() {
        assert_eq!(
            snippet("## Result\n\n**Bold** and [a link](https://x.y)\n```\ncode\n```\nend", 90),
            "Result Bold and a link end"
        );
    }

    #[test]
    fn test_snippet_truncates_on_chars() {
        assert_eq!(snippet("héllo wörld", 5), "héllo");
        assert_eq!(snippet("", DEFAULT_SNIPPET_CHARS), "");
    }
}

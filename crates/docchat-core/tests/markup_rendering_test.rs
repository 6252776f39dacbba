//! Markup Rendering Integration Tests
//!
//! What these tests protect:
//! - Escaping of every piece of answer text (no injected markup survives)
//! - Determinism of rendering for partial and complete answers
//! - Link safety rules
//! - Fence precedence over every other block rule
//! - Repair of blocks glued onto the end of a previous line

use docchat_core::markup::{self, render, Block, ListKind};

// =============================================================================
// Test: Injection safety
// =============================================================================

mod injection {
    use super::*;

    /// Every `<` in the output must belong to a tag the renderer emits
    fn assert_only_known_tags(html: &str) {
        const KNOWN: [&str; 20] = [
            "<p>", "</p>", "<p class=\"msg-heading\">", "<br>", "<ul>", "</ul>", "<ol>",
            "</ol>", "<li>", "</li>", "<strong>", "</strong>", "<em>", "</em>", "<s>", "</s>",
            "<code>", "</code>", "<blockquote>", "</blockquote>",
        ];
        let mut rest = html;
        while let Some(pos) = rest.find('<') {
            let tail = &rest[pos..];
            let known = KNOWN.iter().any(|t| tail.starts_with(t))
                || tail.starts_with("<pre>")
                || tail.starts_with("<code data-lang=\"")
                || tail.starts_with("</pre>")
                || tail.starts_with("<hr class=\"msg-divider\" />")
                || tail.starts_with("<a href=\"http")
                || tail.starts_with("</a>");
            assert!(known, "unexpected markup at {:?} in {}", tail, html);
            rest = &tail[1..];
        }
    }

    #[test]
    fn test_script_tags_are_escaped_everywhere() {
        let payload = "<script>alert('x')</script>";
        let inputs = [
            payload.to_string(),
            format!("# {}", payload),
            format!("- {}", payload),
            format!("1. {}", payload),
            format!("> {}", payload),
            format!("**{}**", payload),
            format!("`{}`", payload),
            format!("```{}\n{}\n```", payload, payload),
            format!("[{}](https://ok.example)", payload),
            format!("[x](https://ok.example/{})", "\"><script>"),
        ];
        for input in inputs {
            let html = render(&input);
            assert!(!html.contains("<script"), "{} -> {}", input, html);
            assert_only_known_tags(&html);
        }
    }

    #[test]
    fn test_unsafe_schemes_never_become_links() {
        for url in ["javascript:alert(1)", "JavaScript:alert(1)", "data:text/html,x", "vbscript:x", "ftp://host/x"] {
            let html = render(&format!("[click]({})", url));
            assert!(!html.contains("<a "), "{} -> {}", url, html);
            assert!(html.contains("click"));
        }
    }

    #[test]
    fn test_safe_link_attributes() {
        let html = render("[docs](https://example.com/a_b)");
        assert_eq!(
            html,
            "<p><a href=\"https://example.com/a_b\" target=\"_blank\" rel=\"noopener\">docs</a></p>"
        );
    }
}

// =============================================================================
// Test: Determinism
// =============================================================================

mod determinism {
    use super::*;

    const ANSWER: &str = "## Steps\n\nFirst:- open the lid- remove the filter\n\n```sh\nmake clean\n```\n> note\n\n1. one\n2. two";

    #[test]
    fn test_render_is_stable() {
        assert_eq!(render(ANSWER), render(ANSWER));
    }

    #[test]
    fn test_every_prefix_renders() {
        let chars: Vec<char> = ANSWER.chars().collect();
        for end in 0..=chars.len() {
            let prefix: String = chars[..end].iter().collect();
            let html = render(&prefix);
            assert_eq!(html, render(&prefix));
            if prefix.trim().is_empty() {
                assert!(html.is_empty());
            } else {
                assert!(!html.is_empty(), "prefix {:?} rendered empty", prefix);
            }
        }
    }

    #[test]
    fn test_line_endings_are_normalized() {
        assert_eq!(render("a\r\nb\rc"), render("a\nb\nc"));
    }
}

// =============================================================================
// Test: Block structure
// =============================================================================

mod blocks {
    use super::*;

    #[test]
    fn test_fence_wins_over_block_markers() {
        let blocks = markup::parse("```md\n# h\n- item\n> quote\n---\n```");
        assert_eq!(
            blocks,
            vec![Block::CodeBlock {
                language: Some("md".to_string()),
                lines: vec!["# h".into(), "- item".into(), "> quote".into(), "---".into()],
            }]
        );
    }

    #[test]
    fn test_list_kinds_alternate() {
        let blocks = markup::parse("- a\n1. b\n- c");
        let kinds: Vec<ListKind> = blocks
            .iter()
            .filter_map(|b| match b {
                Block::List { kind, .. } => Some(*kind),
                _ => None,
            })
            .collect();
        assert_eq!(kinds, vec![ListKind::Unordered, ListKind::Ordered, ListKind::Unordered]);
    }

    #[test]
    fn test_glued_list_is_repaired() {
        assert_eq!(
            render("Options:- fast;- cheap"),
            "<p>Options:</p><ul><li>fast;</li><li>cheap</li></ul>"
        );
    }

    #[test]
    fn test_glued_heading_is_repaired() {
        assert_eq!(
            render("Intro text.## Details"),
            "<p>Intro text.</p><p class=\"msg-heading\"><strong>Details</strong></p>"
        );
    }

    #[test]
    fn test_glued_markers_inside_fence_are_kept() {
        assert_eq!(
            render("```\nx:- y\n```"),
            "<pre><code>x:- y</code></pre>"
        );
    }

    #[test]
    fn test_mixed_answer() {
        let html = render("Intro **bold**\n\n- a\n- b\n\n---\n\n> cite");
        assert_eq!(
            html,
            "<p>Intro <strong>bold</strong></p><ul><li>a</li><li>b</li></ul>\
             <hr class=\"msg-divider\" /><blockquote>cite</blockquote>"
        );
    }
}

// =============================================================================
// Test: Snippets
// =============================================================================

mod snippets {
    use super::*;

    #[test]
    fn test_snippet_is_plain_and_bounded() {
        let text = "**Answer**: ".repeat(20);
        let snippet = markup::snippet(&text, markup::DEFAULT_SNIPPET_CHARS);
        assert!(snippet.chars().count() <= markup::DEFAULT_SNIPPET_CHARS);
        assert!(!snippet.contains('*'));
    }
}

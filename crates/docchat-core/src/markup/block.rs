//! Line-oriented block parsing.
//!
//! The whole accumulated answer is re-parsed on every increment, so the parser
//! is a pure function of its input. It runs in three steps: line endings are
//! normalized, blocks that the generator glued onto the end of a previous line
//! are split back apart (outside code fences only), and the lines are folded
//! into [`Block`]s.

use super::inline::{self, escape_html};

/// Characters after which a glued `*`, `+` or `>` starts a new block
const SENTENCE_END: [char; 6] = ['.', ':', ';', '!', '?', ')'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Ordered,
    Unordered,
}

impl ListKind {
    fn tag(self) -> &'static str {
        match self {
            ListKind::Ordered => "ol",
            ListKind::Unordered => "ul",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Paragraph(Vec<String>),
    List { kind: ListKind, items: Vec<String> },
    CodeBlock { language: Option<String>, lines: Vec<String> },
    Heading(String),
    Quote(String),
    Divider,
}

impl Block {
    pub fn to_markup(&self) -> String {
        match self {
            Block::Paragraph(lines) => {
                let body: Vec<String> = lines.iter().map(|l| inline::format(l)).collect();
                format!("<p>{}</p>", body.join("<br>"))
            }
            Block::List { kind, items } => {
                let tag = kind.tag();
                let body: String = items
                    .iter()
                    .map(|item| format!("<li>{}</li>", inline::format(item)))
                    .collect();
                format!("<{tag}>{body}</{tag}>")
            }
            Block::CodeBlock { language, lines } => {
                let lang = language
                    .as_deref()
                    .map(|l| format!(" data-lang=\"{}\"", escape_html(l)))
                    .unwrap_or_default();
                format!("<pre><code{}>{}</code></pre>", lang, escape_html(&lines.join("\n")))
            }
            Block::Heading(text) => format!(
                "<p class=\"msg-heading\"><strong>{}</strong></p>",
                inline::format(text)
            ),
            Block::Quote(text) => format!("<blockquote>{}</blockquote>", inline::format(text)),
            Block::Divider => "<hr class=\"msg-divider\" />".to_string(),
        }
    }
}

/// Parse answer text into blocks. Whitespace-only input yields no blocks.
pub fn parse(buffer: &str) -> Vec<Block> {
    let normalized = buffer.replace("\r\n", "\n").replace('\r', "\n");
    let repaired = repair_glued_blocks(&normalized);

    let mut parser = BlockParser::default();
    for line in repaired.lines() {
        parser.push_line(line);
    }
    let mut blocks = parser.finish();

    // Only a dangling heading marker can swallow every line; keep the text visible.
    if blocks.is_empty() && !normalized.trim().is_empty() {
        blocks.push(Block::Paragraph(vec![normalized.trim().to_string()]));
    }
    blocks
}

/// Render answer text to display markup.
pub fn render(buffer: &str) -> String {
    parse(buffer).iter().map(Block::to_markup).collect()
}

/// Classification of a single trimmed line, in precedence order.
#[derive(Debug, PartialEq, Eq)]
enum Line<'a> {
    Fence(&'a str),
    Blank,
    Heading(&'a str),
    HeadingMarker,
    Quote(&'a str),
    Item(ListKind, &'a str),
    /// A line made only of `=` or `-` (at least three)
    Underline(char),
    /// Text with an underline run glued to its end, e.g. `Title===`
    UnderlinedText(&'a str),
    Divider,
    Text(&'a str),
}

fn classify(line: &str) -> Line<'_> {
    if let Some(info) = line.strip_prefix("```") {
        return Line::Fence(info.trim());
    }
    if line.is_empty() {
        return Line::Blank;
    }

    let hashes = line.chars().take_while(|&c| c == '#').count();
    if (1..=6).contains(&hashes) {
        let rest = &line[hashes..];
        if rest.is_empty() {
            return Line::HeadingMarker;
        }
        if rest.starts_with(char::is_whitespace) {
            return Line::Heading(rest.trim());
        }
    }

    if let Some(rest) = line.strip_prefix('>') {
        if rest.starts_with(char::is_whitespace) {
            return Line::Quote(rest.trim());
        }
    }

    if let Some(rest) = line.strip_prefix(['-', '*', '+']) {
        if rest.starts_with(char::is_whitespace) {
            return Line::Item(ListKind::Unordered, rest.trim());
        }
    }

    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 {
        if let Some(rest) = line[digits..].strip_prefix('.') {
            if rest.starts_with(char::is_whitespace) {
                return Line::Item(ListKind::Ordered, rest.trim());
            }
        }
    }

    for marker in ['=', '-'] {
        if line.len() >= 3 && line.chars().all(|c| c == marker) {
            return Line::Underline(marker);
        }
        let text = line.trim_end_matches(marker);
        let run = line.len() - text.len();
        if run >= 3 && !text.is_empty() && !text.ends_with(char::is_whitespace) {
            return Line::UnderlinedText(text.trim());
        }
    }

    if line.len() >= 3 && line.chars().all(|c| matches!(c, '-' | '*' | '_')) {
        return Line::Divider;
    }

    Line::Text(line)
}

#[derive(Debug, Default)]
struct BlockParser {
    blocks: Vec<Block>,
    paragraph: Vec<String>,
    list: Option<(ListKind, Vec<String>)>,
    code: Option<(Option<String>, Vec<String>)>,
    /// A bare `#` line was seen; the next content line is a heading.
    heading_pending: bool,
}

impl BlockParser {
    fn push_line(&mut self, raw: &str) {
        let line = raw.trim();

        if self.code.is_some() {
            if line.starts_with("```") {
                self.flush_code();
            } else if let Some((_, lines)) = self.code.as_mut() {
                lines.push(raw.to_string());
            }
            return;
        }

        let kind = classify(line);
        if self.heading_pending && !matches!(kind, Line::Fence(_) | Line::Blank) {
            self.heading_pending = false;
            self.push_block(Block::Heading(line.to_string()));
            return;
        }

        match kind {
            Line::Fence(info) => {
                self.flush_text();
                let language = (!info.is_empty()).then(|| info.to_string());
                self.code = Some((language, Vec::new()));
            }
            Line::Blank => self.flush_text(),
            Line::Heading(text) | Line::UnderlinedText(text) => {
                self.push_block(Block::Heading(text.to_string()))
            }
            Line::HeadingMarker => {
                self.flush_text();
                self.heading_pending = true;
            }
            Line::Quote(text) => self.push_block(Block::Quote(text.to_string())),
            Line::Item(kind, text) => {
                self.flush_paragraph();
                if self.list.as_ref().is_some_and(|(current, _)| *current != kind) {
                    self.flush_list();
                }
                let (_, items) = self.list.get_or_insert_with(|| (kind, Vec::new()));
                items.push(text.to_string());
            }
            Line::Underline(marker) => {
                if !self.paragraph.is_empty() {
                    let title = std::mem::take(&mut self.paragraph).join(" ");
                    self.push_block(Block::Heading(title));
                } else if marker == '-' {
                    self.push_block(Block::Divider);
                } else {
                    self.push_text(line);
                }
            }
            Line::Divider => self.push_block(Block::Divider),
            Line::Text(text) => self.push_text(text),
        }
    }

    fn push_text(&mut self, text: &str) {
        self.flush_list();
        self.paragraph.push(text.to_string());
    }

    fn push_block(&mut self, block: Block) {
        self.flush_text();
        self.blocks.push(block);
    }

    fn flush_text(&mut self) {
        self.flush_paragraph();
        self.flush_list();
    }

    fn flush_paragraph(&mut self) {
        if !self.paragraph.is_empty() {
            let lines = std::mem::take(&mut self.paragraph);
            self.blocks.push(Block::Paragraph(lines));
        }
    }

    fn flush_list(&mut self) {
        if let Some((kind, items)) = self.list.take() {
            self.blocks.push(Block::List { kind, items });
        }
    }

    fn flush_code(&mut self) {
        if let Some((language, lines)) = self.code.take() {
            self.blocks.push(Block::CodeBlock { language, lines });
        }
    }

    fn finish(mut self) -> Vec<Block> {
        // An unterminated fence still shows what has streamed so far.
        self.flush_code();
        self.flush_text();
        self.blocks
    }
}

/// Put line breaks back in front of block markers the generator glued onto
/// the previous line, e.g. `Overview:- first item` or `done.## Next`.
/// Lines inside code fences are left alone.
fn repair_glued_blocks(text: &str) -> String {
    let mut in_fence = false;
    let mut out: Vec<String> = Vec::new();
    for line in text.split('\n') {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
            out.push(line.to_string());
        } else if in_fence {
            out.push(line.to_string());
        } else {
            out.push(split_glued_line(line));
        }
    }
    out.join("\n")
}

fn split_glued_line(line: &str) -> String {
    let chars: Vec<char> = line.chars().collect();
    let mut out = String::with_capacity(line.len() + 8);
    let mut i = 0;

    while i < chars.len() {
        let prev = i.checked_sub(1).map(|p| chars[p]);

        if let Some(run) = underline_run(&chars, i) {
            let next = chars.get(i + run).copied();
            let glued_before = prev.is_some_and(|p| !p.is_whitespace() && p != '|');
            let splittable = next.is_some_and(|n| n != '|') && (glued_before || prev.is_none());
            if splittable && glued_before {
                out.push('\n');
            }
            out.extend(&chars[i..i + run]);
            if splittable {
                out.push('\n');
            }
            i += run;
            continue;
        }

        if prev.is_some_and(|p| starts_glued_block(&chars, i, p)) {
            out.push('\n');
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

/// Length of a run of three or more `=` or `-` starting at `i`.
fn underline_run(chars: &[char], i: usize) -> Option<usize> {
    let c = chars[i];
    if !matches!(c, '=' | '-') || (i > 0 && chars[i - 1] == c) {
        return None;
    }
    let run = chars[i..].iter().take_while(|&&x| x == c).count();
    (run >= 3).then_some(run)
}

fn starts_glued_block(chars: &[char], i: usize, prev: char) -> bool {
    let spaced = |j: usize| matches!(chars.get(j), Some(' ') | Some('\t'));

    match chars[i] {
        '#' => {
            if prev == '#' {
                return false;
            }
            let run = chars[i..].iter().take_while(|&&c| c == '#').count();
            (1..=6).contains(&run) && spaced(i + run) && (run >= 2 || !prev.is_alphanumeric())
        }
        '-' => prev != '-' && !prev.is_whitespace() && !prev.is_alphanumeric() && spaced(i + 1),
        '*' | '+' | '>' => SENTENCE_END.contains(&prev) && spaced(i + 1),
        c if c.is_ascii_digit() => {
            if prev.is_whitespace() || prev.is_alphanumeric() {
                return false;
            }
            // 3.14. is a number, not an item
            if prev == '.' && i >= 2 && chars[i - 2].is_ascii_digit() {
                return false;
            }
            let run = chars[i..].iter().take_while(|c| c.is_ascii_digit()).count();
            chars.get(i + run) == Some(&'.') && spaced(i + run + 1)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_input_renders_nothing() {
        assert_eq!(render(""), "");
        assert_eq!(render("  \n\t\n"), "");
    }

    #[test]
    fn test_paragraph_lines_join_with_breaks() {
        assert_eq!(render("one\ntwo\n\nthree"), "<p>one<br>two</p><p>three</p>");
    }

    #[test]
    fn test_list_kind_switch_starts_new_list() {
        assert_eq!(
            render("- a\n- b\n1. c"),
            "<ul><li>a</li><li>b</li></ul><ol><li>c</li></ol>"
        );
    }

    #[test]
    fn test_text_after_list_closes_it() {
        assert_eq!(
            render("- a\nmore"),
            "<ul><li>a</li></ul><p>more</p>"
        );
    }

    #[test]
    fn test_code_fence_keeps_content_verbatim() {
        assert_eq!(
            render("```rust\n# not a heading\n- <b>\n```"),
            "<pre><code data-lang=\"rust\"># not a heading\n- &lt;b&gt;</code></pre>"
        );
    }

    #[test]
    fn test_fence_without_language_has_no_lang_attribute() {
        assert_eq!(render("```\nx\n```"), "<pre><code>x</code></pre>");
    }

    #[test]
    fn test_unterminated_fence_is_flushed() {
        assert_eq!(
            render("intro\n```\nlet x = 1;"),
            "<p>intro</p><pre><code>let x = 1;</code></pre>"
        );
    }

    #[test]
    fn test_headings() {
        assert_eq!(
            render("## Setup"),
            "<p class=\"msg-heading\"><strong>Setup</strong></p>"
        );
        assert_eq!(
            render("##\nSetup"),
            "<p class=\"msg-heading\"><strong>Setup</strong></p>"
        );
        assert_eq!(
            render("Setup==="),
            "<p class=\"msg-heading\"><strong>Setup</strong></p>"
        );
    }

    #[test]
    fn test_setext_heading_joins_paragraph() {
        assert_eq!(
            render("Big\ntitle\n---\nbody"),
            "<p class=\"msg-heading\"><strong>Big title</strong></p><p>body</p>"
        );
    }

    #[test]
    fn test_divider_without_paragraph() {
        assert_eq!(
            render("a\n\n---\n\nb"),
            "<p>a</p><hr class=\"msg-divider\" /><p>b</p>"
        );
        assert_eq!(render("***"), "<hr class=\"msg-divider\" />");
    }

    #[test]
    fn test_quote_requires_space() {
        assert_eq!(render("> wise"), "<blockquote>wise</blockquote>");
        assert_eq!(render(">no"), "<p>&gt;no</p>");
    }

    #[test]
    fn test_dangling_heading_marker_falls_back_to_paragraph() {
        assert_eq!(render("##"), "<p>##</p>");
    }

    #[test]
    fn test_glued_blocks_are_split() {
        assert_eq!(
            split_glued_line("Overview:- first;- second"),
            "Overview:\n- first;\n- second"
        );
        assert_eq!(split_glued_line("done.## Next"), "done.\n## Next");
        assert_eq!(split_glued_line("Steps:1. a;2. b"), "Steps:\n1. a;\n2. b");
        assert_eq!(split_glued_line("Title===Body"), "Title\n===\nBody");
        assert_eq!(split_glued_line("Note:> quoted"), "Note:\n> quoted");
    }

    #[test]
    fn test_prose_is_not_split() {
        for line in [
            "a - b",
            "pi is 3.14. Next",
            "C# is fine",
            "well-known",
            "| a | b |\n|---|---|",
            "2 * 3",
            "Both pre- and post-processing run.",
            "Use Python3. It works",
            "see item2. next",
        ] {
            assert_eq!(split_glued_line(line), line, "{line}");
        }
    }

    #[test]
    fn test_fenced_lines_are_not_repaired() {
        let text = "```\nx:- y\n```";
        assert_eq!(repair_glued_blocks(text), text);
    }
}

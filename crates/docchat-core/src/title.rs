//! Short conversation titles derived from the first exchange.

/// Used whenever nothing usable is left after cleanup
pub const DEFAULT_TITLE: &str = "New Chat";

const MAX_TITLE_CHARS: usize = 48;
const MIN_TITLE_CHARS: usize = 3;

/// The title is cut at the first of these that occurs.
const SEPARATORS: [&str; 4] = [":", "\u{2014}", " - ", ". "];

const TRAILING_PUNCTUATION: [char; 6] = ['.', ',', ':', ';', '!', '?'];

/// Build a title from the opening question and, once available, the answer.
///
/// The answer wins when present, except that a question ending in `?` is
/// always preferred. Never returns an empty string.
pub fn synthesize(question: Option<&str>, answer: Option<&str>) -> String {
    let question = question.map(str::trim).filter(|q| !q.is_empty());
    let answer = answer.map(str::trim).filter(|a| !a.is_empty());

    let source = match (question, answer) {
        (Some(q), _) if q.ends_with('?') => q.trim_end_matches('?'),
        (_, Some(a)) => a,
        (Some(q), None) => q,
        (None, None) => return DEFAULT_TITLE.to_string(),
    };

    let mut title = source.split_whitespace().collect::<Vec<_>>().join(" ");

    if let Some(idx) = SEPARATORS.iter().find_map(|sep| title.find(sep)) {
        title.truncate(idx);
    }

    let mut title = shorten(title.trim());
    capitalize(&mut title);
    let title = title.trim_end_matches(TRAILING_PUNCTUATION).trim_end();

    if title.chars().count() < MIN_TITLE_CHARS {
        DEFAULT_TITLE.to_string()
    } else {
        title.to_string()
    }
}

/// Keep whole words up to the limit; a single oversized word is cut hard.
fn shorten(text: &str) -> String {
    if text.chars().count() <= MAX_TITLE_CHARS {
        return text.to_string();
    }

    let mut out = String::new();
    for word in text.split(' ') {
        let added = usize::from(!out.is_empty()) + word.chars().count();
        if out.chars().count() + added > MAX_TITLE_CHARS {
            break;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }

    if out.is_empty() {
        text.chars().take(MAX_TITLE_CHARS).collect()
    } else {
        out
    }
}

fn capitalize(text: &mut String) {
    if let Some(first) = text.chars().next() {
        let upper: String = first.to_uppercase().collect();
        text.replace_range(..first.len_utf8(), &upper);
    }
}

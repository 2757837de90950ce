//! Markdown to plain-text extraction.
//!
//! Rewrite rules are applied in order over the raw document, then whitespace
//! is normalized. Malformed markup just falls through the rules, so the
//! result is always best-effort text.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

/// `(pattern, replacement)` pairs, applied top to bottom.
const MARKDOWN_RULES: [(&str, &str); 18] = [
    // MDX module lines
    (r"(?m)^[ \t]*(import|export)[ \t].*$", ""),
    // fenced code markers (the code itself is kept)
    (r"(?m)^[ \t]*(```|~~~).*$", ""),
    // html comments, then tags / JSX elements
    (r"(?s)<!--.*?-->", ""),
    (r"</?[A-Za-z][^<>]*>", ""),
    // images keep their alt text, links their label
    (r"!\[([^\]]*)\]\([^)]*\)", "$1"),
    (r"\[([^\]]+)\]\([^)]*\)", "$1"),
    (r"(?m)^[ \t]*\[[^\]]+\]:[ \t]*\S+.*$", ""),
    // headings, blockquotes, list markers
    (r"(?m)^[ \t]{0,3}#{1,6}[ \t]*", ""),
    (r"(?m)^[ \t]*>+[ \t]?", ""),
    (r"(?m)^[ \t]*(?:[-*+]|\d+[.)])[ \t]+", ""),
    // horizontal rules and table separator rows
    (r"(?m)^[ \t]*(?:[-*_][ \t]*){3,}$", ""),
    (r"(?m)^[ \t]*\|?[ \t]*:?-{3,}:?[ \t]*(?:\|[ \t]*:?-{3,}:?[ \t]*)*\|?[ \t]*$", ""),
    (r"\|", " "),
    // emphasis and inline code
    (r"\*\*([^*]+)\*\*", "$1"),
    (r"\b__([^_]+)__\b", "$1"),
    (r"\*([^*\n]+)\*", "$1"),
    (r"\b_([^_\n]+)_\b", "$1"),
    (r"`([^`]*)`", "$1"),
];

const ENTITIES: [(&str, &str); 7] = [
    ("&nbsp;", " "),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
    ("&#39;", "'"),
    ("&apos;", "'"),
    ("&amp;", "&"),
];

static RULES: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
static FRONT_MATTER: OnceLock<Option<Regex>> = OnceLock::new();
static SPACES: OnceLock<Option<Regex>> = OnceLock::new();
static SPACE_AROUND_NEWLINE: OnceLock<Option<Regex>> = OnceLock::new();
static NEWLINES: OnceLock<Option<Regex>> = OnceLock::new();

fn rules() -> &'static [(Regex, &'static str)] {
    RULES.get_or_init(|| {
        MARKDOWN_RULES
            .iter()
            .filter_map(|(pattern, replacement)| match Regex::new(pattern) {
                Ok(regex) => Some((regex, *replacement)),
                Err(err) => {
                    tracing::warn!("Skipping markdown rule {}: {}", pattern, err);
                    None
                }
            })
            .collect()
    })
}

fn cached(cell: &'static OnceLock<Option<Regex>>, pattern: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| Regex::new(pattern).ok()).as_ref()
}

fn front_matter() -> Option<&'static Regex> {
    cached(&FRONT_MATTER, r"(?s)\A\s*---\r?\n(.*?)\r?\n---[ \t]*(?:\r?\n|\z)")
}

/// Converts a markdown document into normalized plain text.
pub fn extract_text(markdown: &str) -> String {
    let mut text = match front_matter() {
        Some(re) => re.replace(markdown, "").into_owned(),
        None => markdown.to_string(),
    };
    text = text.replace("\r\n", "\n");

    for (regex, replacement) in rules() {
        text = regex.replace_all(&text, *replacement).into_owned();
    }

    for (entity, replacement) in ENTITIES {
        text = text.replace(entity, replacement);
    }

    normalize_whitespace(&text)
}

/// Collapses space runs, trims around line breaks and folds blank lines into one break.
pub fn normalize_whitespace(text: &str) -> String {
    let mut out = text.replace('\t', " ");
    if let Some(re) = cached(&SPACES, r" {2,}") {
        out = re.replace_all(&out, " ").into_owned();
    }
    if let Some(re) = cached(&SPACE_AROUND_NEWLINE, r" *\n *") {
        out = re.replace_all(&out, "\n").into_owned();
    }
    if let Some(re) = cached(&NEWLINES, r"\n{2,}") {
        out = re.replace_all(&out, "\n").into_owned();
    }
    out.trim().to_string()
}

/// Title declared by the document itself: front-matter `title:` or the first `# ` heading.
pub fn document_title(markdown: &str) -> Option<String> {
    if let Some(captures) = front_matter().and_then(|re| re.captures(markdown)) {
        let title = captures.get(1).and_then(|block| {
            block.as_str().lines().find_map(|line| {
                line.trim()
                    .strip_prefix("title:")
                    .map(|value| value.trim().trim_matches(|c| c == '"' || c == '\'').to_string())
            })
        });
        if let Some(title) = title.filter(|t| !t.is_empty()) {
            return Some(title);
        }
    }

    markdown
        .lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix("# "))
        .map(|heading| extract_text(heading))
        .filter(|heading| !heading.is_empty())
}

/// Section title derived from a filename such as `01-ros2-fundamentals.md`.
pub fn title_from_path(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let stem = stem
        .trim_start_matches(|c: char| c.is_ascii_digit())
        .trim_start_matches(['-', '_', '.', ' ']);

    let words: Vec<String> = stem
        .split(['-', '_', ' '])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect();

    if words.is_empty() {
        "Untitled".to_string()
    } else {
        words.join(" ")
    }
}

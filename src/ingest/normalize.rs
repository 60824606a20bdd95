use std::sync::LazyLock;

use regex::Regex;

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex"));
static BULLET_GLYPHS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("[\u{2022}\u{25AA}\u{FFFD}]+").expect("bullet regex"));
static PAGE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:page|pase)\s*\d+\b").expect("page token regex"));
static FORM_BLANK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_{2,}").expect("form blank regex"));

/// Cleans text extracted from a DOCX run sequence. Pure and idempotent.
pub fn normalize(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }

    let mut text: String = raw.chars().filter(|c| !c.is_control()).collect();
    // removing a blank or bullet can expose a fresh `word- word` split, so
    // repeat until nothing changes
    loop {
        let next = clean_pass(&text);
        if next == text {
            return next;
        }
        text = next;
    }
}

fn clean_pass(text: &str) -> String {
    let text = rejoin_hyphenated(text);
    let text = WHITESPACE_RUN.replace_all(&text, " ");
    let text = BULLET_GLYPHS.replace_all(&text, " ");
    let text = PAGE_TOKEN.replace_all(&text, "");
    let text = FORM_BLANK.replace_all(&text, "");
    let text = WHITESPACE_RUN.replace_all(&text, " ");

    text.trim().to_string()
}

/// Drops `-` plus the whitespace after it when it sits between two word
/// characters, e.g. `"regu- lation"` becomes `"regulation"`.
fn rejoin_hyphenated(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c == '-' && i > 0 && is_word_char(chars[i - 1]) {
            let mut j = i + 1;
            while j < chars.len() && chars[j].is_whitespace() {
                j += 1;
            }
            if j > i + 1 && j < chars.len() && is_word_char(chars[j]) {
                i = j;
                continue;
            }
        }
        out.push(c);
        i += 1;
    }

    out
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

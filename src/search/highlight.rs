//! Title highlighting and content snippets / 标题高亮与内容摘要
//!
//! Output is HTML: user text is escaped, keyword occurrences are wrapped in
//! `<mark>`. Matching is literal and case-insensitive.

use regex::{Regex, RegexBuilder};

use crate::utils::strip_markup;

pub const MARK_OPEN: &str = "<mark>";
pub const MARK_CLOSE: &str = "</mark>";

/// Characters kept before the first occurrence / 首次命中前保留字符数
const SNIPPET_BEFORE: usize = 30;
/// Characters kept from the first occurrence on / 首次命中起保留字符数
const SNIPPET_AFTER: usize = 70;
const ELLIPSIS: &str = "...";

fn keyword_pattern(keyword: &str) -> Option<Regex> {
    let keyword = keyword.trim();
    if keyword.is_empty() {
        return None;
    }
    RegexBuilder::new(&regex::escape(keyword))
        .case_insensitive(true)
        .build()
        .ok()
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn wrap_matches(text: &str, pattern: &Regex) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    let mut last = 0;
    for m in pattern.find_iter(text) {
        out.push_str(&escape_html(&text[last..m.start()]));
        out.push_str(MARK_OPEN);
        out.push_str(&escape_html(m.as_str()));
        out.push_str(MARK_CLOSE);
        last = m.end();
    }
    out.push_str(&escape_html(&text[last..]));
    out
}

/// Byte offset of the `char_idx`-th character, clamped to the end / 字符下标转字节偏移
fn byte_offset(text: &str, char_idx: usize) -> usize {
    text.char_indices()
        .nth(char_idx)
        .map(|(offset, _)| offset)
        .unwrap_or(text.len())
}

/// Highlight keyword occurrences in a title / 高亮标题中的关键词
pub fn highlight_title(title: &str, keyword: &str) -> String {
    match keyword_pattern(keyword) {
        Some(pattern) => wrap_matches(title, &pattern),
        None => escape_html(title),
    }
}

/// Build a content snippet around the first occurrence / 构造以首次命中为中心的摘要
///
/// Without an occurrence (title-only hits) the snippet is the head of the
/// content.
pub fn build_snippet(content: &str, keyword: &str) -> String {
    let plain = strip_markup(content);
    let pattern = keyword_pattern(keyword);
    let total_chars = plain.chars().count();

    let first_char = pattern
        .as_ref()
        .and_then(|p| p.find(&plain))
        .map(|m| plain[..m.start()].chars().count());

    let (start_char, end_char) = match first_char {
        Some(idx) => (idx.saturating_sub(SNIPPET_BEFORE), (idx + SNIPPET_AFTER).min(total_chars)),
        None => (0, (SNIPPET_BEFORE + SNIPPET_AFTER).min(total_chars)),
    };

    let window = &plain[byte_offset(&plain, start_char)..byte_offset(&plain, end_char)];
    let body = match &pattern {
        Some(p) => wrap_matches(window, p),
        None => escape_html(window),
    };

    let mut snippet = String::with_capacity(body.len() + 2 * ELLIPSIS.len());
    if start_char > 0 {
        snippet.push_str(ELLIPSIS);
    }
    snippet.push_str(&body);
    if end_char < total_chars {
        snippet.push_str(ELLIPSIS);
    }
    snippet
}

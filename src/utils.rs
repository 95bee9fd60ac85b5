/// Text cleaning utility functions / 文本清理工具函数

use once_cell::sync::Lazy;
use regex::Regex;

static SCRIPT_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<\s*(script|style|iframe|object)\b.*?(<\s*/\s*(script|style|iframe|object)\s*>|$)")
        .expect("valid script block regex")
});
static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid tag regex"));
static SCRIPT_SCHEME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(javascript|vbscript|data)\s*:").expect("valid scheme regex")
});
static EVENT_HANDLER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bon[a-z]+\s*=").expect("valid handler regex"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Sanitize a search keyword / 清理搜索关键词
/// 1. Drop script-like blocks and their bodies / 移除脚本块
/// 2. Drop remaining tags / 移除标签
/// 3. Neutralize script schemes and inline handlers / 移除脚本协议和事件属性
/// 4. Collapse whitespace and trim / 合并空白
pub fn sanitize_keyword(raw: &str) -> String {
    let text = SCRIPT_BLOCK.replace_all(raw, " ");
    let text = HTML_TAG.replace_all(&text, " ");
    let text = SCRIPT_SCHEME.replace_all(&text, "");
    let text = EVENT_HANDLER.replace_all(&text, "");
    let text = text.replace(['<', '>'], " ");
    WHITESPACE.replace_all(&text, " ").trim().to_string()
}

/// Strip markup from stored content for snippets / 去除内容中的标记
pub fn strip_markup(content: &str) -> String {
    let text = SCRIPT_BLOCK.replace_all(content, " ");
    let text = HTML_TAG.replace_all(&text, " ");
    let text = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    WHITESPACE.replace_all(&text, " ").trim().to_string()
}

/// Escape LIKE wildcards, to be used with `ESCAPE '\'` / 转义 LIKE 通配符
pub fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

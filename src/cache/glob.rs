//! Redis-style glob patterns as local match predicates / Redis 风格通配符匹配

use regex::Regex;

/// Compiled glob predicate / 编译后的通配符
#[derive(Debug, Clone)]
pub struct GlobMatcher {
    regex: Regex,
}

impl GlobMatcher {
    /// Translate `*`, `?`, `[...]` and `\x` escapes into an anchored regex / 转换为锚定正则
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let mut out = String::with_capacity(pattern.len() + 8);
        out.push('^');

        let mut chars = pattern.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '*' => out.push_str(".*"),
                '?' => out.push('.'),
                '\\' => match chars.next() {
                    Some(escaped) => out.push_str(&regex::escape(&escaped.to_string())),
                    None => out.push_str(r"\\"),
                },
                '[' => {
                    let mut class = String::new();
                    let mut closed = false;
                    for inner in chars.by_ref() {
                        if inner == ']' {
                            closed = true;
                            break;
                        }
                        class.push(inner);
                    }
                    if closed && !class.is_empty() {
                        out.push('[');
                        let (negated, body) = match class.strip_prefix('^') {
                            Some(rest) => (true, rest),
                            None => (false, class.as_str()),
                        };
                        if negated {
                            out.push('^');
                        }
                        for member in body.chars() {
                            if matches!(member, '\\' | '[' | ']' | '^' | '&' | '~') {
                                out.push('\\');
                            }
                            out.push(member);
                        }
                        out.push(']');
                    } else {
                        out.push_str(&regex::escape(&format!("[{}", class)));
                        if closed {
                            out.push_str(r"\]");
                        }
                    }
                }
                other => out.push_str(&regex::escape(&other.to_string())),
            }
        }

        out.push('$');
        Ok(Self { regex: Regex::new(&out)? })
    }

    pub fn is_match(&self, key: &str) -> bool {
        self.regex.is_match(key)
    }
}

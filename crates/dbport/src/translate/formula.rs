//! Function-call extraction over raw definition text.

use super::tokenizer::Token;

/// A function call located in definition text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionFormula {
    pub name: String,
    /// Top-level arguments, trimmed, as raw text.
    pub args: Vec<String>,
    /// The whole call, name through closing parenthesis, as it appears in the text.
    pub expression: String,
}

impl FunctionFormula {
    /// Split `NAME(arg, ...)` into name and top-level arguments.
    pub fn parse(expression: &str) -> Option<Self> {
        let open = expression.find('(')?;
        let inner = expression[open + 1..].trim_end().strip_suffix(')')?;
        let name = expression[..open].trim().to_string();
        if name.is_empty() {
            return None;
        }
        Some(Self {
            name,
            args: split_top_level(inner, ','),
            expression: expression.to_string(),
        })
    }
}

/// Locate the call starting at `token`; `None` when the next non-blank
/// character is not `(` or the parentheses never balance.
pub fn extract_function_call(token: &Token, text: &str) -> Option<FunctionFormula> {
    let after_name = text.get(token.end..)?;
    let gap = after_name.len() - after_name.trim_start().len();
    let open = token.end + gap;
    if !text[open..].starts_with('(') {
        return None;
    }
    let close = matching_paren(text, open)?;
    FunctionFormula::parse(&text[token.start..=close])
}

/// Byte offset of the `)` balancing the `(` at `open`, skipping quoted text.
pub fn matching_paren(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut chars = text[open..].char_indices().peekable();
    while let Some((idx, ch)) = chars.next() {
        if let Some(q) = quote {
            if ch == q {
                // A doubled quote stays inside the literal.
                if chars.peek().is_some_and(|(_, next)| *next == q) {
                    chars.next();
                } else {
                    quote = None;
                }
            }
            continue;
        }
        match ch {
            '\'' | '"' | '`' => quote = Some(ch),
            '[' => quote = Some(']'),
            '(' => depth += 1,
            ')' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(open + idx);
                }
            }
            _ => {}
        }
    }
    None
}

/// Split at `separator` outside parentheses and quotes; parts are trimmed.
pub fn split_top_level(text: &str, separator: char) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (idx, ch) in text.char_indices() {
        if let Some(q) = quote {
            if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '\'' | '"' | '`' => quote = Some(ch),
            '[' => quote = Some(']'),
            '(' => depth += 1,
            ')' => depth -= 1,
            c if c == separator && depth == 0 => {
                parts.push(text[start..idx].trim().to_string());
                start = idx + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(text[start..].trim().to_string());
    parts
}

/// Split `expr AS type` at the last top-level `AS`.
pub fn split_cast_argument(arg: &str) -> Option<(String, String)> {
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut found = None;
    let bytes = arg.as_bytes();
    for (idx, ch) in arg.char_indices() {
        if let Some(q) = quote {
            if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '\'' | '"' | '`' => quote = Some(ch),
            '[' => quote = Some(']'),
            '(' => depth += 1,
            ')' => depth -= 1,
            'A' | 'a' if depth == 0 => {
                let is_as = arg[idx..].len() >= 3
                    && arg
                        .get(idx..idx + 2)
                        .is_some_and(|w| w.eq_ignore_ascii_case("AS"))
                    && idx > 0
                    && bytes[idx - 1].is_ascii_whitespace()
                    && bytes[idx + 2].is_ascii_whitespace();
                if is_as {
                    found = Some(idx);
                }
            }
            _ => {}
        }
    }
    let idx = found?;
    let expr = arg[..idx].trim();
    let ty = arg[idx + 2..].trim();
    if expr.is_empty() || ty.is_empty() {
        return None;
    }
    Some((expr.to_string(), ty.to_string()))
}

//! Identifier validation, quoting and unquoting.
//!
//! Identifiers (owner, table and column names) cannot be bound as parameters,
//! so every generated statement goes through these helpers. Quote characters
//! come from the dialect; the closing character is doubled inside the name.

use crate::error::{ConvertError, Result};

/// Maximum identifier length (conservative limit across databases).
/// - PostgreSQL: 63 bytes
/// - SQL Server: 128 characters
/// - Oracle 12.2+: 128 bytes
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Every pair of quote characters any supported dialect uses.
const QUOTE_PAIRS: [(char, char); 3] = [('[', ']'), ('"', '"'), ('`', '`')];

/// Validate an identifier coming from metadata or configuration.
///
/// Rejects empty names, names with null bytes and over-long names.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(ConvertError::Config("Identifier cannot be empty".to_string()));
    }

    if name.contains('\0') {
        return Err(ConvertError::Config(format!(
            "Identifier contains null byte: {:?}",
            name
        )));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(ConvertError::Config(format!(
            "Identifier exceeds maximum length of {} bytes (got {} bytes): {:?}",
            MAX_IDENTIFIER_LENGTH,
            name.len(),
            name
        )));
    }

    Ok(())
}

/// Wrap `name` in the given quote pair, doubling embedded closing quotes.
///
/// ```
/// use dbport::core::identifier::quote_with;
/// assert_eq!(quote_with("a]b", '[', ']'), "[a]]b]");
/// assert_eq!(quote_with("users", '"', '"'), "\"users\"");
/// ```
pub fn quote_with(name: &str, left: char, right: char) -> String {
    let mut escaped = String::with_capacity(name.len() + 2);
    escaped.push(left);
    for c in name.chars() {
        if c == right {
            escaped.push(right);
        }
        escaped.push(c);
    }
    escaped.push(right);
    escaped
}

/// True when `text` is wrapped in exactly this quote pair.
pub fn is_quoted_with(text: &str, left: char, right: char) -> bool {
    text.len() >= 2 && text.starts_with(left) && text.ends_with(right)
}

/// True when `text` is wrapped in any dialect's identifier quotes.
pub fn is_quoted(text: &str) -> bool {
    QUOTE_PAIRS
        .iter()
        .any(|(l, r)| is_quoted_with(text, *l, *r))
}

/// Strip one level of identifier quoting, undoing doubled closing quotes.
///
/// Unquoted text is returned unchanged.
pub fn unquote(text: &str) -> String {
    for (left, right) in QUOTE_PAIRS {
        if is_quoted_with(text, left, right) {
            let inner = &text[left.len_utf8()..text.len() - right.len_utf8()];
            let doubled: String = [right, right].iter().collect();
            return inner.replace(&doubled, &right.to_string());
        }
    }
    text.to_string()
}

/// Turn an arbitrary column name into something usable inside a parameter name.
pub fn parameter_safe(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

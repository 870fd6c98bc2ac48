//! Dialect-aware SQL tokenizer.
//!
//! Produces a flat, lossless token stream: concatenating every token's text
//! yields the input again. Malformed input never fails; an unterminated
//! string, quoted identifier or block comment runs to the end of the text.

use crate::core::DatabaseType;
use crate::mapping::MappingTables;

/// Lexical category of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Identifier,
    Keyword,
    StringLiteral,
    Number,
    Comment,
    Punctuation,
    Whitespace,
    /// Built-in function name of the source dialect.
    SystemIdentifier,
    /// Host variable or bind parameter (`@id`, `@@ROWCOUNT`, `:new`).
    Variable,
}

/// One lexical token with its byte offsets in the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub start: usize,
    pub end: usize,
}

impl Token {
    /// Whitespace and comments carry no meaning for the rewriter.
    pub fn is_significant(&self) -> bool {
        !matches!(self.kind, TokenKind::Whitespace | TokenKind::Comment)
    }

    pub fn is_punct(&self, punct: &str) -> bool {
        self.kind == TokenKind::Punctuation && self.text == punct
    }

    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.kind == TokenKind::Keyword && self.text.eq_ignore_ascii_case(keyword)
    }

    /// True for the cast-style keywords `CAST` and `CONVERT`.
    pub fn is_cast_word(&self) -> bool {
        self.kind == TokenKind::Identifier && is_cast_word(&self.text)
    }
}

pub(crate) fn is_cast_word(text: &str) -> bool {
    text.eq_ignore_ascii_case("CAST") || text.eq_ignore_ascii_case("CONVERT")
}

const KEYWORDS: &[&str] = &[
    "ADD", "AFTER", "ALL", "ALTER", "AND", "ANY", "AS", "ASC", "BEFORE", "BEGIN", "BETWEEN", "BY",
    "CASCADE", "CASE", "CHECK", "COLUMN", "COMMIT", "CONSTRAINT", "CREATE", "CROSS",
    "CURRENT_DATE", "CURRENT_TIME", "CURRENT_TIMESTAMP", "CURRENT_USER", "DECLARE", "DEFAULT",
    "DELETE", "DESC", "DISTINCT", "DROP", "EACH", "ELSE", "ELSIF", "END", "EXCEPT", "EXEC",
    "EXECUTE", "EXISTS", "FALSE", "FETCH", "FOR", "FOREIGN", "FROM", "FULL", "FUNCTION", "GO",
    "GROUP", "HAVING", "IF", "IN", "INDEX", "INNER", "INSERT", "INSTEAD", "INTERSECT", "INTO",
    "IS", "JOIN", "KEY", "LANGUAGE", "LEFT", "LIKE", "LIMIT", "NEW", "NEXT", "NOCOUNT", "NOT",
    "NULL", "OF", "OFFSET", "OLD", "ON", "ONLY", "OR", "ORDER", "OUTER", "OUTPUT", "OVER",
    "PARTITION", "PRIMARY", "PROC", "PROCEDURE", "REFERENCES", "RETURN", "RETURNS", "RIGHT",
    "ROLLBACK", "ROW", "ROWS", "SELECT", "SET", "TABLE", "THEN", "TOP", "TRIGGER", "TRUE",
    "UNION", "UNIQUE", "UPDATE", "USING", "VALUES", "VIEW", "WHEN", "WHERE", "WHILE", "WITH",
];

/// True when `word` is a reserved word recognized by the tokenizer.
pub fn is_keyword(word: &str) -> bool {
    let upper = word.to_ascii_uppercase();
    KEYWORDS.binary_search(&upper.as_str()).is_ok()
}

/// Splits definition text of one dialect into tokens.
pub struct Tokenizer<'a> {
    db: DatabaseType,
    mappings: Option<&'a MappingTables>,
}

impl<'a> Tokenizer<'a> {
    /// Tokenizer without function knowledge: no token is a system identifier.
    pub fn new(db: DatabaseType) -> Self {
        Self { db, mappings: None }
    }

    /// Recognize built-in functions of the dialect as system identifiers.
    pub fn with_mappings(mut self, mappings: &'a MappingTables) -> Self {
        self.mappings = Some(mappings);
        self
    }

    pub fn tokenize(&self, text: &str) -> Vec<Token> {
        let mut scanner = Scanner { text, pos: 0 };
        let mut tokens: Vec<Token> = Vec::new();

        while let Some(ch) = scanner.peek() {
            let start = scanner.pos;
            let kind = self.scan_token(&mut scanner, ch);
            let mut token = Token {
                kind,
                text: text[start..scanner.pos].to_string(),
                start,
                end: scanner.pos,
            };
            if token.kind == TokenKind::Identifier && !is_quoted_text(&token.text) {
                token.kind = self.classify_word(&token, text, &tokens);
            }
            tokens.push(token);
        }
        tokens
    }

    fn scan_token(&self, s: &mut Scanner<'_>, ch: char) -> TokenKind {
        let next = s.peek_at(1);
        match ch {
            c if c.is_whitespace() => {
                s.bump_while(char::is_whitespace);
                TokenKind::Whitespace
            }
            '-' if next == Some('-') => {
                s.bump_while(|c| c != '\n');
                TokenKind::Comment
            }
            '#' if self.db == DatabaseType::MySql => {
                s.bump_while(|c| c != '\n');
                TokenKind::Comment
            }
            '/' if next == Some('*') => {
                s.bump_n(2);
                s.bump_until("*/");
                TokenKind::Comment
            }
            'N' | 'n' if next == Some('\'') => {
                s.bump();
                s.scan_quoted('\'', self.db == DatabaseType::MySql);
                TokenKind::StringLiteral
            }
            '\'' => {
                s.scan_quoted('\'', self.db == DatabaseType::MySql);
                TokenKind::StringLiteral
            }
            '"' if self.db == DatabaseType::MySql => {
                s.scan_quoted('"', true);
                TokenKind::StringLiteral
            }
            '"' => {
                s.scan_quoted('"', false);
                TokenKind::Identifier
            }
            '[' if matches!(self.db, DatabaseType::SqlServer | DatabaseType::Sqlite) => {
                s.scan_quoted_pair('[', ']');
                TokenKind::Identifier
            }
            '`' if matches!(self.db, DatabaseType::MySql | DatabaseType::Sqlite) => {
                s.scan_quoted('`', false);
                TokenKind::Identifier
            }
            '$' if self.db == DatabaseType::Postgres && s.scan_dollar_quoted() => {
                TokenKind::StringLiteral
            }
            '@' if next.is_some_and(is_word_char) || next == Some('@') => {
                s.bump_n(2);
                s.bump_while(is_word_char);
                TokenKind::Variable
            }
            ':' if matches!(self.db, DatabaseType::Oracle | DatabaseType::Postgres)
                && next.is_some_and(is_word_start) =>
            {
                s.bump();
                s.bump_while(is_word_char);
                TokenKind::Variable
            }
            '0' if matches!(next, Some('x') | Some('X')) => {
                s.bump_n(2);
                s.bump_while(|c| c.is_ascii_hexdigit());
                TokenKind::Number
            }
            c if c.is_ascii_digit() || (c == '.' && next.is_some_and(|n| n.is_ascii_digit())) => {
                s.scan_number();
                TokenKind::Number
            }
            '#' if self.db == DatabaseType::SqlServer => {
                s.bump();
                s.bump_while(is_word_char);
                TokenKind::Identifier
            }
            c if is_word_start(c) => {
                let start = s.pos;
                s.bump_while(is_word_char);
                self.extend_dotted_builtin(s, start);
                TokenKind::Identifier
            }
            _ => {
                s.scan_operator();
                TokenKind::Punctuation
            }
        }
    }

    /// Take `PACKAGE.MEMBER` as one word when the pair names a built-in of
    /// the dialect (`DBMS_RANDOM.VALUE`).
    fn extend_dotted_builtin(&self, s: &mut Scanner<'_>, start: usize) {
        let Some(mappings) = self.mappings else {
            return;
        };
        if s.peek() != Some('.') || !s.peek_at(1).is_some_and(is_word_start) {
            return;
        }
        let word_end = s.pos;
        s.bump();
        s.bump_while(is_word_char);
        let dotted = &s.text[start..s.pos];
        let functions = &mappings.functions;
        let builtin = functions.is_bare_niladic(self.db, dotted)
            || (functions.is_builtin(self.db, dotted) && s.rest().trim_start().starts_with('('));
        if !builtin {
            s.pos = word_end;
        }
    }

    fn classify_word(&self, token: &Token, text: &str, previous: &[Token]) -> TokenKind {
        let prev = previous.iter().rev().find(|t| t.is_significant());
        if prev.is_some_and(|p| p.is_punct(".")) || is_cast_word(&token.text) {
            return TokenKind::Identifier;
        }

        if let Some(mappings) = self.mappings {
            let word = token.text.as_str();
            if mappings.functions.is_bare_niladic(self.db, word) {
                return TokenKind::SystemIdentifier;
            }
            let opens_call = text[token.end..].trim_start().starts_with('(');
            // `Name char(10)` declares a column; `SELECT CHAR(65)` calls a function.
            let type_position = prev.is_some_and(|p| {
                matches!(p.kind, TokenKind::Identifier | TokenKind::Variable)
                    || p.is_keyword("AS")
                    || p.is_keyword("RETURNS")
            }) && mappings.data_types.is_type_name(self.db, word);
            if opens_call && !type_position && mappings.functions.is_builtin(self.db, word) {
                return TokenKind::SystemIdentifier;
            }
        }

        if is_keyword(&token.text) {
            TokenKind::Keyword
        } else {
            TokenKind::Identifier
        }
    }
}

fn is_word_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$' || c == '#'
}

fn is_quoted_text(text: &str) -> bool {
    matches!(text.chars().next(), Some('"') | Some('[') | Some('`'))
}

struct Scanner<'t> {
    text: &'t str,
    pos: usize,
}

impl Scanner<'_> {
    fn rest(&self) -> &str {
        &self.text[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.rest().chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn bump_n(&mut self, n: usize) {
        for _ in 0..n {
            if self.bump().is_none() {
                break;
            }
        }
    }

    fn bump_while(&mut self, pred: impl Fn(char) -> bool) {
        while let Some(ch) = self.peek() {
            if !pred(ch) {
                break;
            }
            self.pos += ch.len_utf8();
        }
    }

    /// Advance past `terminator`, or to the end of the text.
    fn bump_until(&mut self, terminator: &str) {
        match self.rest().find(terminator) {
            Some(idx) => self.pos += idx + terminator.len(),
            None => self.pos = self.text.len(),
        }
    }

    /// Quoted run where the quote is escaped by doubling (and optionally by `\`).
    fn scan_quoted(&mut self, quote: char, backslash_escapes: bool) {
        self.bump();
        while let Some(ch) = self.bump() {
            if backslash_escapes && ch == '\\' {
                self.bump();
            } else if ch == quote {
                if self.peek() == Some(quote) {
                    self.bump();
                } else {
                    return;
                }
            }
        }
    }

    fn scan_quoted_pair(&mut self, _open: char, close: char) {
        self.bump();
        while let Some(ch) = self.bump() {
            if ch == close {
                if self.peek() == Some(close) {
                    self.bump();
                } else {
                    return;
                }
            }
        }
    }

    /// `$$ .. $$` or `$tag$ .. $tag$`; false (nothing consumed) when not a dollar quote.
    fn scan_dollar_quoted(&mut self) -> bool {
        let rest = self.rest();
        let Some(close) = rest[1..].find('$') else {
            return false;
        };
        let tag_body = &rest[1..close + 1];
        if !tag_body.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return false;
        }
        let tag = rest[..close + 2].to_string();
        self.pos += tag.len();
        self.bump_until(&tag);
        true
    }

    fn scan_number(&mut self) {
        self.bump_while(|c| c.is_ascii_digit());
        if self.peek() == Some('.') {
            self.bump();
            self.bump_while(|c| c.is_ascii_digit());
        }
        if matches!(self.peek(), Some('e') | Some('E'))
            && self
                .peek_at(1)
                .is_some_and(|c| c.is_ascii_digit() || c == '+' || c == '-')
        {
            self.bump_n(2);
            self.bump_while(|c| c.is_ascii_digit());
        }
    }

    fn scan_operator(&mut self) {
        const PAIRS: &[&str] = &["<>", "<=", ">=", "!=", "||", "::", ":=", "=>"];
        if PAIRS.iter().any(|p| self.rest().starts_with(p)) {
            self.bump_n(2);
        } else {
            self.bump();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(tokens: &[Token]) -> Vec<(TokenKind, &str)> {
        tokens
            .iter()
            .filter(|t| t.kind != TokenKind::Whitespace)
            .map(|t| (t.kind, t.text.as_str()))
            .collect()
    }

    #[test]
    fn test_keywords_sorted_for_binary_search() {
        let mut sorted = KEYWORDS.to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, KEYWORDS);
    }

    #[test]
    fn test_tokens_reassemble_source() {
        let sql = "SELECT [Name], N'it''s' -- note\nFROM dbo.T /* x */ WHERE a<>1.5";
        let tokens = Tokenizer::new(DatabaseType::SqlServer).tokenize(sql);
        let joined: String = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(joined, sql);
        for t in &tokens {
            assert_eq!(&sql[t.start..t.end], t.text);
        }
    }

    #[test]
    fn test_basic_classification() {
        let tokens = Tokenizer::new(DatabaseType::SqlServer)
            .tokenize("select [Order Id], 'a;b', 0x1F FROM dbo.T where @p = 1");
        assert_eq!(
            kinds(&tokens),
            vec![
                (TokenKind::Keyword, "select"),
                (TokenKind::Identifier, "[Order Id]"),
                (TokenKind::Punctuation, ","),
                (TokenKind::StringLiteral, "'a;b'"),
                (TokenKind::Punctuation, ","),
                (TokenKind::Number, "0x1F"),
                (TokenKind::Keyword, "FROM"),
                (TokenKind::Identifier, "dbo"),
                (TokenKind::Punctuation, "."),
                (TokenKind::Identifier, "T"),
                (TokenKind::Keyword, "where"),
                (TokenKind::Variable, "@p"),
                (TokenKind::Punctuation, "="),
                (TokenKind::Number, "1"),
            ]
        );
    }

    #[test]
    fn test_mysql_quoting() {
        let tokens = Tokenizer::new(DatabaseType::MySql).tokenize("SELECT `a`, \"s\\\"x\" # c");
        assert_eq!(
            kinds(&tokens),
            vec![
                (TokenKind::Keyword, "SELECT"),
                (TokenKind::Identifier, "`a`"),
                (TokenKind::Punctuation, ","),
                (TokenKind::StringLiteral, "\"s\\\"x\""),
                (TokenKind::Comment, "# c"),
            ]
        );
    }

    #[test]
    fn test_unterminated_runs_to_end() {
        let tokens = Tokenizer::new(DatabaseType::Postgres).tokenize("SELECT 'abc /* x");
        let last = tokens.last().unwrap();
        assert_eq!(last.kind, TokenKind::StringLiteral);
        assert_eq!(last.text, "'abc /* x");

        let tokens = Tokenizer::new(DatabaseType::Postgres).tokenize("a /* open");
        assert_eq!(tokens.last().unwrap().kind, TokenKind::Comment);
    }

    #[test]
    fn test_postgres_casts_and_dollar_quotes() {
        let tokens = Tokenizer::new(DatabaseType::Postgres)
            .tokenize("SELECT x::int, $$ body ; $$, :new");
        let k = kinds(&tokens);
        assert!(k.contains(&(TokenKind::Punctuation, "::")));
        assert!(k.contains(&(TokenKind::StringLiteral, "$$ body ; $$")));
        assert!(k.contains(&(TokenKind::Variable, ":new")));
    }

    #[test]
    fn test_system_identifiers_need_mappings() {
        let tables = MappingTables::global().unwrap();
        let sql = "SELECT ISNULL(a, GETDATE()), dbo.ISNULL(b), LEN (c), Name char(10), CAST(x AS int)";
        let tokens = Tokenizer::new(DatabaseType::SqlServer)
            .with_mappings(tables)
            .tokenize(sql);
        let system: Vec<&str> = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::SystemIdentifier)
            .map(|t| t.text.as_str())
            .collect();
        assert_eq!(system, vec!["ISNULL", "GETDATE", "LEN"]);
        assert!(tokens.iter().any(|t| t.is_cast_word()));

        let plain = Tokenizer::new(DatabaseType::SqlServer).tokenize(sql);
        assert!(plain.iter().all(|t| t.kind != TokenKind::SystemIdentifier));
    }

    #[test]
    fn test_bare_niladic_is_system_identifier() {
        let tables = MappingTables::global().unwrap();
        let tokens = Tokenizer::new(DatabaseType::Oracle)
            .with_mappings(tables)
            .tokenize("SELECT SYSDATE FROM DUAL");
        assert_eq!(tokens[2].kind, TokenKind::SystemIdentifier);
        assert_eq!(tokens[6].kind, TokenKind::Identifier);
    }

    #[test]
    fn test_dotted_builtin_is_one_token() {
        let tables = MappingTables::global().unwrap();
        let tokens = Tokenizer::new(DatabaseType::Oracle)
            .with_mappings(tables)
            .tokenize("SELECT DBMS_RANDOM.VALUE, hr.emp FROM tbl");
        let k = kinds(&tokens);
        assert!(k.contains(&(TokenKind::SystemIdentifier, "DBMS_RANDOM.VALUE")));
        assert!(k.contains(&(TokenKind::Identifier, "hr")));
        assert!(k.contains(&(TokenKind::Identifier, "emp")));

        let plain = Tokenizer::new(DatabaseType::Oracle).tokenize("SELECT DBMS_RANDOM.VALUE");
        assert!(kinds(&plain).contains(&(TokenKind::Identifier, "VALUE")));
    }
}

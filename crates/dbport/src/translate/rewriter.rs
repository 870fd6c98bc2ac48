//! Two-pass definition rewriter.
//!
//! Pass one replaces built-in function calls and casts with their target
//! forms, re-lexing after every substitution because offsets shift. Pass two
//! walks the resulting tokens once and re-spells owners, identifiers and
//! aliases for the target dialect.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::identifier::{is_quoted, unquote};
use crate::core::{DatabaseType, Dialect};
use crate::drivers::DialectImpl;
use crate::error::Result;
use crate::mapping::{FunctionAlias, MappingTables, TypeSpec};

use super::formula::{extract_function_call, split_cast_argument, FunctionFormula};
use super::tokenizer::{Token, TokenKind, Tokenizer};

/// How identifiers are quoted in translated text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectNameMode {
    /// Quote only names that were quoted in the source or contain whitespace.
    #[default]
    WithoutQuotation,
    /// Quote every identifier.
    WithQuotation,
}

/// Options for one translator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslateOptions {
    pub name_mode: ObjectNameMode,
    /// Owner qualifier to replace wherever it prefixes an object name.
    pub source_owner: Option<String>,
    /// Replacement for `source_owner`; `None` drops the qualifier.
    pub target_owner: Option<String>,
}

/// Result of translating one definition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Translation {
    pub text: String,
    /// Target type names written while translating casts.
    pub data_types: BTreeSet<String>,
}

/// Rewrites definitions from one dialect into another.
///
/// ```
/// use dbport::core::DatabaseType;
/// use dbport::translate::StatementTranslator;
///
/// let translator = StatementTranslator::new(DatabaseType::SqlServer, DatabaseType::Postgres).unwrap();
/// let out = translator.translate("SELECT ISNULL(col,0) FROM dbo.T");
/// assert_eq!(out.text, "SELECT COALESCE(col,0) FROM T");
/// ```
#[derive(Debug, Clone)]
pub struct StatementTranslator<'a> {
    source: DialectImpl,
    target: DialectImpl,
    tables: &'a MappingTables,
    options: TranslateOptions,
}

impl StatementTranslator<'static> {
    /// Translator backed by the bundled mapping tables.
    pub fn new(source: DatabaseType, target: DatabaseType) -> Result<Self> {
        Ok(StatementTranslator::with_tables(
            source,
            target,
            MappingTables::global()?,
        ))
    }
}

impl<'a> StatementTranslator<'a> {
    pub fn with_tables(source: DatabaseType, target: DatabaseType, tables: &'a MappingTables) -> Self {
        Self {
            source: DialectImpl::for_type(source),
            target: DialectImpl::for_type(target),
            tables,
            options: TranslateOptions::default(),
        }
    }

    pub fn with_options(mut self, options: TranslateOptions) -> Self {
        self.options = options;
        self
    }

    pub fn source(&self) -> DatabaseType {
        self.source.database_type()
    }

    pub fn target(&self) -> DatabaseType {
        self.target.database_type()
    }

    /// Translate one definition. Never fails: unbalanced calls and unmapped
    /// functions pass through unchanged.
    pub fn translate(&self, definition: &str) -> Translation {
        let mut data_types = BTreeSet::new();
        let same_dialect = self.source() == self.target();
        if same_dialect && self.options.source_owner.is_none() {
            return Translation {
                text: definition.to_string(),
                data_types,
            };
        }

        let replaced = if same_dialect {
            definition.to_string()
        } else {
            self.replace_functions(definition, &mut data_types)
        };
        let tokens = self.tokenizer().tokenize(&replaced);
        let text = self.reassemble(&tokens, &data_types);

        debug!(
            source = %self.source(),
            target = %self.target(),
            chars = text.len(),
            "translated definition"
        );
        Translation { text, data_types }
    }

    fn tokenizer(&self) -> Tokenizer<'a> {
        Tokenizer::new(self.source()).with_mappings(self.tables)
    }

    // Pass one.

    fn replace_functions(&self, definition: &str, data_types: &mut BTreeSet<String>) -> String {
        let tokenizer = self.tokenizer();
        let mut text = definition.to_string();
        // Calls starting before `resume` were already handled.
        let mut resume = 0usize;

        'relex: loop {
            let tokens = tokenizer.tokenize(&text);
            for token in tokens.iter().filter(|t| t.start >= resume) {
                let Some((expression, replacement)) = self.rewrite_call(token, &text, data_types)
                else {
                    continue;
                };
                if replacement == expression {
                    continue;
                }
                let end = token.start + expression.len();
                text.replace_range(token.start..end, &replacement);
                resume = token.start + 1;
                continue 'relex;
            }
            return text;
        }
    }

    /// Original expression and its replacement for a call starting at `token`.
    fn rewrite_call(
        &self,
        token: &Token,
        text: &str,
        data_types: &mut BTreeSet<String>,
    ) -> Option<(String, String)> {
        let functions = &self.tables.functions;
        match token.kind {
            TokenKind::SystemIdentifier => match extract_function_call(token, text) {
                Some(formula) => {
                    let replacement = functions.translate_call(
                        self.source(),
                        self.target(),
                        &formula.name,
                        &formula.args,
                    )?;
                    Some((formula.expression, replacement))
                }
                None if functions.is_bare_niladic(self.source(), &token.text) => {
                    let replacement =
                        functions.translate_call(self.source(), self.target(), &token.text, &[])?;
                    Some((token.text.clone(), replacement))
                }
                None => None,
            },
            TokenKind::Identifier if token.is_cast_word() => {
                let formula = extract_function_call(token, text)?;
                let replacement = self.rewrite_cast(&formula, data_types)?;
                Some((formula.expression, replacement))
            }
            _ => None,
        }
    }

    /// `CAST(x AS t)` with `t` translated; SQL Server and MySQL `CONVERT`
    /// become `CAST` for other targets.
    fn rewrite_cast(
        &self,
        formula: &FunctionFormula,
        data_types: &mut BTreeSet<String>,
    ) -> Option<String> {
        let is_cast = formula.name.eq_ignore_ascii_case("CAST");
        let (expression, type_text) = if is_cast {
            match formula.args.as_slice() {
                [arg] => split_cast_argument(arg)?,
                _ => return None,
            }
        } else {
            match (self.source(), formula.args.as_slice()) {
                (DatabaseType::SqlServer, [ty, expr] | [ty, expr, _]) => (expr.clone(), ty.clone()),
                (DatabaseType::MySql, [expr, ty]) => (expr.clone(), ty.clone()),
                _ => return None,
            }
        };

        let spec = TypeSpec::parse(&type_text);
        let written = self
            .tables
            .data_types
            .translate_cast(&spec, self.source(), self.target())
            .unwrap_or(spec);
        data_types.insert(written.name.clone());

        let keyword = if is_cast { formula.name.as_str() } else { "CAST" };
        Some(format!("{}({} AS {})", keyword, expression, written.to_sql()))
    }

    // Pass two.

    fn reassemble(&self, tokens: &[Token], data_types: &BTreeSet<String>) -> String {
        let mut out = String::with_capacity(tokens.iter().map(|t| t.text.len()).sum());
        let mut cursor = Cursor::default();
        while cursor.position < tokens.len() {
            let (text, consumed) = self.step(tokens, &cursor, data_types);
            out.push_str(&text);
            cursor = cursor.advance(tokens, consumed.max(1));
        }
        out
    }

    /// Output for the token under the cursor and how many tokens it consumes.
    fn step(&self, tokens: &[Token], cursor: &Cursor<'_>, data_types: &BTreeSet<String>) -> (String, usize) {
        let token = &tokens[cursor.position];
        match token.kind {
            TokenKind::Comment => (String::new(), 1),
            TokenKind::Identifier => self.step_identifier(tokens, cursor, data_types),
            TokenKind::StringLiteral
                if cursor
                    .previous_significant
                    .is_some_and(|p| p.is_keyword("AS")) =>
            {
                match string_alias(&token.text) {
                    Some(alias) => (self.target.quote_ident(&alias), 1),
                    None => (token.text.clone(), 1),
                }
            }
            TokenKind::Keyword if token.is_keyword("AS") && self.drops_alias_as(cursor) => {
                let trailing_space = tokens
                    .get(cursor.position + 1)
                    .is_some_and(|t| t.kind == TokenKind::Whitespace);
                (String::new(), if trailing_space { 2 } else { 1 })
            }
            _ => (token.text.clone(), 1),
        }
    }

    fn step_identifier(
        &self,
        tokens: &[Token],
        cursor: &Cursor<'_>,
        data_types: &BTreeSet<String>,
    ) -> (String, usize) {
        let token = &tokens[cursor.position];
        let name = unquote(&token.text);
        let next = tokens.get(cursor.position + 1);

        if next.is_some_and(|n| n.is_punct(".")) {
            if let Some(owner) = &self.options.source_owner {
                if name.eq_ignore_ascii_case(owner) {
                    return match &self.options.target_owner {
                        Some(target_owner) => (self.spell(token, target_owner), 1),
                        None => (String::new(), 2),
                    };
                }
            }
            let source_owner = self.source.default_owner();
            if !source_owner.is_empty()
                && name.eq_ignore_ascii_case(source_owner)
                && !self.target.default_owner().eq_ignore_ascii_case(source_owner)
            {
                return (String::new(), 2);
            }
        }

        let quoted = is_quoted(&token.text);
        if !quoted && self.is_type_word(&token.text, data_types) {
            return (token.text.clone(), 1);
        }
        if !quoted && next.is_some_and(|n| n.is_punct("(")) {
            return self.step_call_name(tokens, cursor.position);
        }
        (self.spell(token, &name), 1)
    }

    /// Function name written as an ordinary identifier.
    fn step_call_name(&self, tokens: &[Token], position: usize) -> (String, usize) {
        let token = &tokens[position];
        let functions = &self.tables.functions;

        let closes = tokens.get(position + 2).is_some_and(|t| t.is_punct(")"));
        if closes && functions.is_known_niladic(&token.text) {
            if let Some(rendered) =
                functions.translate_call(self.source(), self.target(), &token.text, &[])
            {
                return (rendered, 3);
            }
        }
        if let Some(mapping) = functions.resolve_by_name(self.source(), &token.text) {
            if let Some(FunctionAlias::Call { name }) = mapping.target_alias(self.target()) {
                return (name.clone(), 1);
            }
        }
        (token.text.clone(), 1)
    }

    /// Target spelling of an identifier whose unquoted name is `name`.
    fn spell(&self, token: &Token, name: &str) -> String {
        if self.target.is_quoted(&token.text) && name == unquote(&token.text) {
            return token.text.clone();
        }
        let quote = is_quoted(&token.text)
            || self.options.name_mode == ObjectNameMode::WithQuotation
            || name.chars().any(char::is_whitespace);
        if quote {
            self.target.quote_ident(name)
        } else {
            name.to_string()
        }
    }

    fn is_type_word(&self, word: &str, data_types: &BTreeSet<String>) -> bool {
        data_types
            .iter()
            .any(|t| t.split_whitespace().any(|w| w.eq_ignore_ascii_case(word)))
            || self.tables.data_types.is_type_name(self.source(), word)
            || self.tables.data_types.is_type_name(self.target(), word)
    }

    /// Oracle rejects `AS` before a table alias.
    fn drops_alias_as(&self, cursor: &Cursor<'_>) -> bool {
        self.target() == DatabaseType::Oracle
            && cursor
                .last_keyword()
                .is_some_and(|k| k.is_keyword("FROM") || k.is_keyword("JOIN"))
            && cursor.previous_significant.is_some_and(|p| {
                matches!(p.kind, TokenKind::Identifier | TokenKind::SystemIdentifier)
                    || p.is_punct(")")
            })
    }
}

/// Position in the token slice plus the context pass two looks back at.
#[derive(Debug, Clone)]
struct Cursor<'t> {
    position: usize,
    previous_significant: Option<&'t Token>,
    /// Last keyword per open parenthesis level.
    clause_keywords: Vec<Option<&'t Token>>,
}

impl Default for Cursor<'_> {
    fn default() -> Self {
        Self {
            position: 0,
            previous_significant: None,
            clause_keywords: vec![None],
        }
    }
}

impl<'t> Cursor<'t> {
    fn last_keyword(&self) -> Option<&'t Token> {
        self.clause_keywords.last().copied().flatten()
    }

    fn advance(mut self, tokens: &'t [Token], consumed: usize) -> Self {
        let end = (self.position + consumed).min(tokens.len());
        for token in &tokens[self.position..end] {
            if token.is_punct("(") {
                self.clause_keywords.push(None);
            } else if token.is_punct(")") && self.clause_keywords.len() > 1 {
                self.clause_keywords.pop();
            } else if token.kind == TokenKind::Keyword {
                if let Some(slot) = self.clause_keywords.last_mut() {
                    *slot = Some(token);
                }
            }
            if token.is_significant() {
                self.previous_significant = Some(token);
            }
        }
        self.position = end;
        self
    }
}

/// Content of a single-line string used as a column alias (`AS 'Full Name'`).
fn string_alias(text: &str) -> Option<String> {
    let body = text.strip_prefix(|c: char| c == 'N' || c == 'n').unwrap_or(text);
    let quote = body.chars().next()?;
    if !matches!(quote, '\'' | '"') || body.len() < 2 || !body.ends_with(quote) {
        return None;
    }
    let inner = &body[1..body.len() - 1];
    if inner.contains(|c: char| c == '\n' || c == '(') {
        return None;
    }
    let doubled: String = [quote, quote].iter().collect();
    Some(inner.replace(&doubled, &quote.to_string()))
}

/// Translate one definition with the bundled tables and default options.
pub fn translate_definition(text: &str, source: DatabaseType, target: DatabaseType) -> Result<String> {
    Ok(StatementTranslator::new(source, target)?.translate(text).text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use DatabaseType::*;

    fn translate(text: &str, source: DatabaseType, target: DatabaseType) -> String {
        translate_definition(text, source, target).unwrap()
    }

    #[test]
    fn test_isnull_and_default_owner() {
        assert_eq!(
            translate("SELECT ISNULL(col,0) FROM dbo.T", SqlServer, Postgres),
            "SELECT COALESCE(col,0) FROM T"
        );
        assert_eq!(
            translate("SELECT ISNULL(col,0) FROM dbo.T", SqlServer, Oracle),
            "SELECT NVL(col,0) FROM T"
        );
    }

    #[test]
    fn test_same_dialect_is_unchanged() {
        let sql = "SELECT [a] -- keep\nFROM dbo.T WHERE ISNULL(b, 0) > 1";
        assert_eq!(translate(sql, SqlServer, SqlServer), sql);
    }

    #[test]
    fn test_nested_calls_translated_inside_out() {
        assert_eq!(
            translate("SELECT ISNULL(LEN(Name), 0) FROM T", SqlServer, Postgres),
            "SELECT COALESCE(LENGTH(Name),0) FROM T"
        );
    }

    #[test]
    fn test_niladic_forms() {
        assert_eq!(translate("SELECT GETDATE()", SqlServer, Oracle), "SELECT SYSDATE");
        assert_eq!(
            translate("SELECT SYSDATE FROM DUAL", Oracle, Postgres),
            "SELECT NOW() FROM DUAL"
        );
    }

    #[test]
    fn test_quoted_identifiers_follow_target() {
        assert_eq!(
            translate("SELECT [Order Id] FROM [dbo].[Orders]", SqlServer, Postgres),
            "SELECT \"Order Id\" FROM \"Orders\""
        );
        assert_eq!(
            translate("SELECT \"Name\" FROM \"People\"", Postgres, MySql),
            "SELECT `Name` FROM `People`"
        );
    }

    #[test]
    fn test_comments_are_dropped() {
        assert_eq!(
            translate("SELECT a -- note\nFROM t /* x */", SqlServer, Postgres),
            "SELECT a \nFROM t "
        );
    }

    #[test]
    fn test_oracle_drops_table_alias_as() {
        assert_eq!(
            translate(
                "SELECT a.Id, b.Qty AS q FROM dbo.Orders AS a JOIN dbo.Items AS b ON a.Id = b.OrderId",
                SqlServer,
                Oracle
            ),
            "SELECT a.Id, b.Qty AS q FROM Orders a JOIN Items b ON a.Id = b.OrderId"
        );
    }

    #[test]
    fn test_cast_inside_from_clause_keeps_as() {
        assert_eq!(
            translate("SELECT x FROM f(CAST(y AS int)) AS z", SqlServer, Oracle),
            "SELECT x FROM f(CAST(y AS number(10))) z"
        );
    }

    #[test]
    fn test_cast_and_convert() {
        let translator = StatementTranslator::new(SqlServer, MySql).unwrap();
        let out = translator.translate("SELECT CAST(Price AS nvarchar(20)) FROM dbo.T");
        assert_eq!(out.text, "SELECT CAST(Price AS CHAR(20)) FROM T");
        assert!(out.data_types.contains("CHAR"));

        assert_eq!(
            translate("SELECT CONVERT(varchar(10), OrderDate, 120) FROM T", SqlServer, Postgres),
            "SELECT CAST(OrderDate AS varchar(10)) FROM T"
        );
    }

    #[test]
    fn test_unknown_functions_pass_through() {
        assert_eq!(
            translate("SELECT dbo.MyUdf(a) FROM dbo.T", SqlServer, Postgres),
            "SELECT MyUdf(a) FROM T"
        );
        assert_eq!(translate("SELECT NEWID()", SqlServer, Sqlite), "SELECT NEWID()");
    }

    #[test]
    fn test_unbalanced_call_is_skipped() {
        assert_eq!(
            translate("SELECT ISNULL(a, FROM T", SqlServer, Postgres),
            "SELECT ISNULL(a, FROM T"
        );
    }

    #[test]
    fn test_with_quotation_mode() {
        let translator = StatementTranslator::new(SqlServer, Postgres)
            .unwrap()
            .with_options(TranslateOptions {
                name_mode: ObjectNameMode::WithQuotation,
                ..TranslateOptions::default()
            });
        assert_eq!(
            translator.translate("SELECT Name FROM dbo.Users").text,
            "SELECT \"Name\" FROM \"Users\""
        );
    }

    #[test]
    fn test_owner_mapping() {
        let translator = StatementTranslator::new(SqlServer, Postgres)
            .unwrap()
            .with_options(TranslateOptions {
                source_owner: Some("sales".into()),
                target_owner: Some("crm".into()),
                ..TranslateOptions::default()
            });
        assert_eq!(
            translator.translate("SELECT * FROM sales.Orders").text,
            "SELECT * FROM crm.Orders"
        );

        let dropping = StatementTranslator::new(Postgres, Postgres)
            .unwrap()
            .with_options(TranslateOptions {
                source_owner: Some("staging".into()),
                ..TranslateOptions::default()
            });
        assert_eq!(
            dropping.translate("SELECT * FROM staging.orders").text,
            "SELECT * FROM orders"
        );
    }

    #[test]
    fn test_string_alias_becomes_identifier() {
        assert_eq!(
            translate("SELECT Name AS 'Full Name' FROM T", SqlServer, Postgres),
            "SELECT Name AS \"Full Name\" FROM T"
        );
        assert_eq!(string_alias("'a(b'"), None);
        assert_eq!(string_alias("N'it''s'").as_deref(), Some("it's"));
    }
}

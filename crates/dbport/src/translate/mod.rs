//! Cross-dialect rewriting of definitions (views, routines, triggers,
//! defaults and computed expressions).
//!
//! - [`tokenizer`]: lossless, dialect-aware lexer
//! - [`formula`]: balanced-parenthesis function call extraction
//! - [`rewriter`]: the two-pass statement translator

pub mod formula;
pub mod rewriter;
pub mod tokenizer;

pub use formula::{extract_function_call, FunctionFormula};
pub use rewriter::{
    translate_definition, ObjectNameMode, StatementTranslator, TranslateOptions, Translation,
};
pub use tokenizer::{Token, TokenKind, Tokenizer};

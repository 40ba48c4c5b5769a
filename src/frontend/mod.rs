//! Source front end: tokens, lexer and recursive-descent parser.

pub mod lexer;
pub mod parser;
pub mod parser_error;
pub mod token;
pub mod token_dumper;

use crate::lang::program::Program;

/// Errors raised before code generation starts.
#[derive(Debug, thiserror::Error)]
pub enum FrontendError {
    #[error("lexer error: {0}")]
    Lexer(#[from] lexer::LexerError),
    #[error("parse error: {0}")]
    Parser(#[from] parser_error::ParserError),
}

/// Lexes and parses `source` into a program.
pub fn parse_source(source: &str) -> Result<Program, FrontendError> {
    let tokens = lexer::Lexer::new(source).tokenize()?;
    let program = parser::Parser::new(tokens).parse()?;
    Ok(program)
}

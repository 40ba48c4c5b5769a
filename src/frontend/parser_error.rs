/// A parsing error with source location.
///
/// `line` and `col` are 1-based positions coming from the lexer spans.
/// For EOF-ish errors (e.g. missing `END` or `ENDIF`), the parser will use the
/// last consumed token's span as a fallback so locations are never `0:0`.
#[derive(Debug, thiserror::Error)]
#[error("{line}:{col}: {message}")]
pub struct ParserError {
    pub message: String,
    pub line: usize,
    pub col: usize,
}

use crate::frontend::lexer::Spanned;
use crate::frontend::token::Token;
use std::fmt::Write;

/// Prints a token stream, one token per line with its `line:col`.
pub struct TokenDumper {
    pub color: bool,
    /// Hide `NEWLINE` and comment tokens.
    pub skip_trivia: bool,
}

impl Default for TokenDumper {
    fn default() -> Self {
        Self {
            color: true,
            skip_trivia: false,
        }
    }
}

impl TokenDumper {
    // ANSI colors
    const RESET: &'static str = "\x1b[0m";
    const DIM: &'static str = "\x1b[2m";
    const YEL: &'static str = "\x1b[33m";
    const CYN: &'static str = "\x1b[36m";
    const MAG: &'static str = "\x1b[35m";
    const BLU: &'static str = "\x1b[34m";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn no_color(mut self) -> Self {
        self.color = false;
        self
    }

    pub fn skip_trivia(mut self) -> Self {
        self.skip_trivia = true;
        self
    }

    pub fn dump(&self, tokens: &[Spanned]) {
        print!("{}", self.dump_to_string(tokens));
    }

    pub fn dump_to_string(&self, tokens: &[Spanned]) -> String {
        let mut out = String::new();
        for s in tokens {
            if self.skip_trivia && matches!(s.token, Token::Newline | Token::Comment(_)) {
                continue;
            }
            let (colr, reset) = if self.color {
                (Self::color(&s.token), Self::RESET)
            } else {
                ("", "")
            };
            let _ = writeln!(
                out,
                "[{:02}:{:02}] {}{:<8} {}{}",
                s.span.line,
                s.span.col,
                colr,
                Self::kind(&s.token),
                Self::text(&s.token),
                reset
            );
        }
        out
    }

    fn text(t: &Token) -> String {
        match t {
            Token::Comment(c) => format!("[{}]", c),
            other => other.to_string(),
        }
    }

    fn kind(t: &Token) -> &'static str {
        use Token::*;
        match t {
            Newline => "NEWLINE",
            Comment(_) => "COMMENT",
            Eof => "EOF",
            Integer(_) => "NUM",
            Ident(_) => "IDENT",
            Plus | Minus | Star | Slash | Percent => "OP",
            Eq | NotEq | Lt | LtEq | Gt | GtEq => "CMP",
            Assign | Colon | Comma | Semicolon | LParen | RParen => "PUNCT",
            _ => "KEYWORD",
        }
    }

    fn color(t: &Token) -> &'static str {
        use Token::*;
        match t {
            Newline | Comment(_) | Eof => Self::DIM,
            Integer(_) => Self::CYN,
            Ident(_) => Self::YEL,
            Plus | Minus | Star | Slash | Percent => Self::MAG,
            Eq | NotEq | Lt | LtEq | Gt | GtEq => Self::MAG,
            _ if t.is_keyword() => Self::BLU,
            _ => Self::RESET,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::lexer::Lexer;

    #[test]
    fn test_plain_dump() {
        let tokens = Lexer::new("READ n; [ask]\n").tokenize().unwrap();
        let text = TokenDumper::new().no_color().dump_to_string(&tokens);
        let lines: Vec<&str> = text.lines().collect();

        assert!(lines[0].starts_with("[01:01] KEYWORD"));
        assert!(lines[1].contains("IDENT") && lines[1].ends_with("n"));
        assert!(lines[3].contains("COMMENT") && lines[3].ends_with("[ask]"));
        assert!(!text.contains('\x1b'));
    }

    #[test]
    fn test_skip_trivia() {
        let tokens = Lexer::new("WRITE 1; [c]\n").tokenize().unwrap();
        let text = TokenDumper::new().no_color().skip_trivia().dump_to_string(&tokens);
        assert!(!text.contains("COMMENT"));
        assert!(!text.contains("NEWLINE"));
        assert!(text.contains("NUM"));
    }
}

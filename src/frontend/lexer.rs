use crate::frontend::token::Token;

#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    pub line: usize,
    pub col: usize,
}

#[derive(Debug, Clone)]
pub struct Spanned {
    pub token: Token,
    pub span: Span,
}

#[derive(Debug, thiserror::Error)]
#[error("{line}:{col}: {message}")]
pub struct LexerError {
    pub message: String,
    pub line: usize,
    pub col: usize,
}

pub struct Lexer {
    source: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Lexer {
            source: source.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    fn current(&self) -> Option<char> {
        self.source.get(self.pos).copied()
    }

    fn peek(&self) -> Option<char> {
        self.source.get(self.pos + 1).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.current();
        if ch == Some('\n') {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        self.pos += 1;
        ch
    }

    fn span(&self) -> Span {
        Span {
            line: self.line,
            col: self.col,
        }
    }

    fn error(&self, message: impl Into<String>, span: &Span) -> LexerError {
        LexerError {
            message: message.into(),
            line: span.line,
            col: span.col,
        }
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.current(), Some(' ' | '\t' | '\r')) {
            self.advance();
        }
    }

    /// Consumes characters while `accept` holds and returns them.
    fn take_while(&mut self, accept: impl Fn(char) -> bool) -> String {
        let mut taken = String::new();
        while let Some(ch) = self.current().filter(|&c| accept(c)) {
            taken.push(ch);
            self.advance();
        }
        taken
    }

    /// Reads a `[ ... ]` comment. Comments may span lines but do not nest.
    fn read_comment(&mut self) -> Result<Token, LexerError> {
        let start = self.span();
        self.advance(); // '['

        let mut comment = String::new();
        loop {
            match self.current() {
                Some(']') => {
                    self.advance();
                    return Ok(Token::Comment(comment.trim().to_string()));
                }
                Some('[') => {
                    return Err(self.error("nested comments are not allowed", &self.span()));
                }
                Some(ch) => {
                    comment.push(ch);
                    self.advance();
                }
                None => return Err(self.error("unterminated comment", &start)),
            }
        }
    }

    fn read_number(&mut self) -> Result<Token, LexerError> {
        let start = self.span();
        let digits = self.take_while(|c| c.is_ascii_digit());
        digits
            .parse::<u64>()
            .map(Token::Integer)
            .map_err(|_| self.error(format!("integer literal out of range: {}", digits), &start))
    }

    fn read_word(&mut self) -> Result<Token, LexerError> {
        let start = self.span();
        let word = self.take_while(|c| c.is_ascii_alphanumeric() || c == '_');

        let token = match word.as_str() {
            // Program structure
            "DECLARE" => Token::Declare,
            "BEGIN" => Token::Begin,
            "END" => Token::End,

            // Conditional
            "IF" => Token::If,
            "THEN" => Token::Then,
            "ELSE" => Token::Else,
            "ENDIF" => Token::EndIf,

            // Loops
            "WHILE" => Token::While,
            "DO" => Token::Do,
            "ENDWHILE" => Token::EndWhile,
            "ENDDO" => Token::EndDo,
            "FOR" => Token::For,
            "FROM" => Token::From,
            "TO" => Token::To,
            "DOWNTO" => Token::DownTo,
            "ENDFOR" => Token::EndFor,

            // I/O
            "READ" => Token::Read,
            "WRITE" => Token::Write,

            // pidentifier: [_a-z]+
            _ if word.chars().all(|c| c == '_' || c.is_ascii_lowercase()) => Token::Ident(word),

            _ => return Err(self.error(format!("invalid identifier: '{}'", word), &start)),
        };

        Ok(token)
    }

    fn read_operator(&mut self) -> Option<Token> {
        let ch = self.current()?;

        let pair = match (ch, self.peek()) {
            (':', Some('=')) => Some(Token::Assign),
            ('!', Some('=')) => Some(Token::NotEq),
            ('<', Some('=')) => Some(Token::LtEq),
            ('>', Some('=')) => Some(Token::GtEq),
            _ => None,
        };
        if let Some(token) = pair {
            self.advance();
            self.advance();
            return Some(token);
        }

        let token = match ch {
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '%' => Token::Percent,
            '=' => Token::Eq,
            '<' => Token::Lt,
            '>' => Token::Gt,
            ':' => Token::Colon,
            ',' => Token::Comma,
            ';' => Token::Semicolon,
            '(' => Token::LParen,
            ')' => Token::RParen,
            _ => return None,
        };
        self.advance();
        Some(token)
    }

    pub fn tokenize(&mut self) -> Result<Vec<Spanned>, LexerError> {
        let mut tokens = Vec::new();

        loop {
            self.skip_whitespace();
            let span = self.span();

            let token = match self.current() {
                None => break,
                Some('\n') => {
                    self.advance();
                    Token::Newline
                }
                Some('[') => self.read_comment()?,
                Some(ch) if ch.is_ascii_digit() => self.read_number()?,
                Some(ch) if ch.is_ascii_alphabetic() || ch == '_' => self.read_word()?,
                Some(ch) => self.read_operator().ok_or_else(|| {
                    self.error(format!("unexpected character: '{}'", ch), &span)
                })?,
            };
            tokens.push(Spanned { token, span });
        }

        tokens.push(Spanned {
            token: Token::Eof,
            span: self.span(),
        });
        Ok(tokens)
    }

    pub fn tokenize_clean(&mut self) -> Result<Vec<Spanned>, LexerError> {
        let tokens = self.tokenize()?;
        Ok(tokens
            .into_iter()
            .filter(|t| !matches!(t.token, Token::Comment(_) | Token::Newline))
            .collect())
    }
}

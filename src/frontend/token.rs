#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals; the sign is a separate token
    Integer(u64),

    // Program structure
    Declare,
    Begin,
    End,

    // Statements
    If,
    Then,
    Else,
    EndIf,
    While,
    Do,
    EndWhile,
    EndDo,
    For,
    From,
    To,
    DownTo,
    EndFor,
    Read,
    Write,

    // Arithmetic
    Plus,
    Minus,
    Star,
    Slash,
    Percent,

    // Comparison
    Eq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,

    // Punctuation
    Assign, // :=
    Colon,
    Comma,
    Semicolon,
    LParen,
    RParen,

    // Identifier (pidentifier)
    Ident(std::string::String),

    // Special
    Comment(std::string::String),
    Newline,
    Eof,
}

impl Token {
    /// Returns true if this token is a reserved word
    pub fn is_keyword(&self) -> bool {
        matches!(
            self,
            Token::Declare
                | Token::Begin
                | Token::End
                | Token::If
                | Token::Then
                | Token::Else
                | Token::EndIf
                | Token::While
                | Token::Do
                | Token::EndWhile
                | Token::EndDo
                | Token::For
                | Token::From
                | Token::To
                | Token::DownTo
                | Token::EndFor
                | Token::Read
                | Token::Write
        )
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Integer(n) => write!(f, "{}", n),
            Token::Declare => write!(f, "DECLARE"),
            Token::Begin => write!(f, "BEGIN"),
            Token::End => write!(f, "END"),
            Token::If => write!(f, "IF"),
            Token::Then => write!(f, "THEN"),
            Token::Else => write!(f, "ELSE"),
            Token::EndIf => write!(f, "ENDIF"),
            Token::While => write!(f, "WHILE"),
            Token::Do => write!(f, "DO"),
            Token::EndWhile => write!(f, "ENDWHILE"),
            Token::EndDo => write!(f, "ENDDO"),
            Token::For => write!(f, "FOR"),
            Token::From => write!(f, "FROM"),
            Token::To => write!(f, "TO"),
            Token::DownTo => write!(f, "DOWNTO"),
            Token::EndFor => write!(f, "ENDFOR"),
            Token::Read => write!(f, "READ"),
            Token::Write => write!(f, "WRITE"),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::Percent => write!(f, "%"),
            Token::Eq => write!(f, "="),
            Token::NotEq => write!(f, "!="),
            Token::Lt => write!(f, "<"),
            Token::Gt => write!(f, ">"),
            Token::LtEq => write!(f, "<="),
            Token::GtEq => write!(f, ">="),
            Token::Assign => write!(f, ":="),
            Token::Colon => write!(f, ":"),
            Token::Comma => write!(f, ","),
            Token::Semicolon => write!(f, ";"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Ident(s) => write!(f, "{}", s),
            Token::Comment(s) => write!(f, "[ {} ]", s),
            Token::Newline => write!(f, "\\n"),
            Token::Eof => write!(f, "EOF"),
        }
    }
}

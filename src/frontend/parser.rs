use crate::frontend::lexer::{Span, Spanned};
use crate::frontend::parser_error::ParserError;
use crate::frontend::token::Token;
use crate::lang::node::{Command, Condition, Declaration, Expression, Relation};
use crate::lang::program::Program;
use crate::lang::value::{Identifier, Value};

/// Recursive-descent parser.
///
/// The parser consumes a stream of lexed `Spanned` tokens and produces a `Program`:
/// - `declarations`: the optional `DECLARE` block
/// - `commands`: the body between `BEGIN` and `END`
///
/// Notes:
/// - Comments and newlines are filtered out in `Parser::new`.
/// - A `-` directly followed by an integer in value position is a negative
///   literal; everywhere else it is the subtraction operator.
pub struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    /// Span of the most recently consumed token.
    ///
    /// Used to provide stable source locations for errors that occur after
    /// advancing past the last token or at end-of-file.
    last_span: Option<Span>,
}

impl Parser {
    /// Creates a new parser from lexer output.
    ///
    /// The parser filters out `Token::Comment(_)` and `Token::Newline` to simplify
    /// parsing. (This keeps line/col information intact, since spans come from
    /// the original tokens.)
    pub fn new(tokens: Vec<Spanned>) -> Self {
        let tokens: Vec<Spanned> = tokens
            .into_iter()
            .filter(|t| !matches!(t.token, Token::Comment(_) | Token::Newline))
            .collect();
        Parser {
            tokens,
            pos: 0,
            last_span: None,
        }
    }

    fn current(&self) -> Option<&Spanned> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&Spanned> {
        let token = self.tokens.get(self.pos);
        if let Some(s) = token {
            self.last_span = Some(s.span.clone());
        }
        self.pos += 1;
        token
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn peek_next(&self) -> Option<&Token> {
        self.tokens.get(self.pos + 1).map(|s| &s.token)
    }

    /// Line of the current token, falling back to the last consumed one.
    fn line(&self) -> usize {
        self.current()
            .map(|s| s.span.line)
            .or_else(|| self.last_span.as_ref().map(|s| s.line))
            .unwrap_or(1)
    }

    /// Constructs a `ParserError` at the most relevant location.
    ///
    /// Priority:
    /// 1. If `current()` exists, use its span.
    /// 2. Else, use `last_span` (e.g. after consuming EOF or falling off the end).
    /// 3. Else, default to (1,1) for truly empty input.
    fn error(&self, message: &str) -> ParserError {
        let span = self
            .current()
            .map(|s| s.span.clone())
            .or_else(|| self.last_span.clone())
            .unwrap_or(Span { line: 1, col: 1 });
        ParserError {
            message: message.to_string(),
            line: span.line,
            col: span.col,
        }
    }

    /// Consumes `expected` or fails with `expected '<expected>' <context>`.
    fn expect(&mut self, expected: Token, context: &str) -> Result<(), ParserError> {
        if self.peek() == Some(&expected) {
            self.advance();
            Ok(())
        } else {
            let found = self
                .peek()
                .map(|t| t.to_string())
                .unwrap_or_else(|| "EOF".to_string());
            Err(self.error(&format!(
                "expected '{}' {}, found '{}'",
                expected, context, found
            )))
        }
    }

    fn expect_ident(&mut self, context: &str) -> Result<String, ParserError> {
        match self.peek() {
            Some(Token::Ident(name)) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.error(&format!("expected identifier {}", context))),
        }
    }

    /// Parses an optionally negative integer literal.
    fn parse_number(&mut self, context: &str) -> Result<i64, ParserError> {
        let negative = if self.peek() == Some(&Token::Minus) {
            self.advance();
            true
        } else {
            false
        };

        let magnitude = match self.peek() {
            Some(Token::Integer(n)) => *n,
            _ => return Err(self.error(&format!("expected number {}", context))),
        };
        let value = if negative {
            0i64.checked_sub_unsigned(magnitude)
        } else {
            i64::try_from(magnitude).ok()
        };
        let value = value.ok_or_else(|| self.error("integer literal out of range"))?;
        self.advance();
        Ok(value)
    }

    /// Parses a complete program:
    ///
    /// ```text
    /// [DECLARE declarations] BEGIN commands END
    /// ```
    pub fn parse(&mut self) -> Result<Program, ParserError> {
        let declarations = if self.peek() == Some(&Token::Declare) {
            self.advance();
            self.parse_declarations()?
        } else {
            Vec::new()
        };

        self.expect(Token::Begin, "to start the program body")?;
        let commands = self.parse_commands(&[Token::End])?;
        self.expect(Token::End, "to close the program")?;

        if !matches!(self.peek(), Some(Token::Eof) | None) {
            return Err(self.error("unexpected input after 'END'"));
        }

        Ok(Program {
            declarations,
            commands,
        })
    }

    /// Parses the comma separated `DECLARE` list.
    fn parse_declarations(&mut self) -> Result<Vec<Declaration>, ParserError> {
        let mut declarations = Vec::new();

        loop {
            let line = self.line();
            let name = self.expect_ident("in declaration")?;

            if self.peek() == Some(&Token::LParen) {
                self.advance();
                let lower = self.parse_number("as array lower bound")?;
                self.expect(Token::Colon, "between array bounds")?;
                let upper = self.parse_number("as array upper bound")?;
                self.expect(Token::RParen, "after array bounds")?;
                declarations.push(Declaration::Array {
                    name,
                    lower,
                    upper,
                    line,
                });
            } else {
                declarations.push(Declaration::Scalar { name, line });
            }

            if self.peek() == Some(&Token::Comma) {
                self.advance();
            } else {
                break;
            }
        }

        Ok(declarations)
    }

    /// Parses commands until one of `terminators` (not consumed).
    ///
    /// At least one command is required.
    fn parse_commands(&mut self, terminators: &[Token]) -> Result<Vec<Command>, ParserError> {
        let mut commands = Vec::new();

        while let Some(token) = self.peek() {
            if terminators.contains(token) {
                break;
            }
            if matches!(token, Token::Eof) {
                let names: Vec<String> = terminators.iter().map(|t| t.to_string()).collect();
                return Err(self.error(&format!(
                    "unexpected EOF, expected '{}'",
                    names.join("' or '")
                )));
            }
            commands.push(self.parse_command()?);
        }

        if commands.is_empty() {
            return Err(self.error("expected at least one command"));
        }

        Ok(commands)
    }

    fn parse_command(&mut self) -> Result<Command, ParserError> {
        let line = self.line();

        match self.peek() {
            Some(Token::If) => self.parse_if(line),
            Some(Token::While) => {
                self.advance();
                let condition = self.parse_condition()?;
                self.expect(Token::Do, "after WHILE condition")?;
                let body = self.parse_commands(&[Token::EndWhile])?;
                self.expect(Token::EndWhile, "to close WHILE")?;
                Ok(Command::While {
                    condition,
                    body,
                    line,
                })
            }
            Some(Token::Do) => {
                self.advance();
                let body = self.parse_commands(&[Token::While])?;
                self.expect(Token::While, "after DO body")?;
                let condition = self.parse_condition()?;
                self.expect(Token::EndDo, "to close DO")?;
                Ok(Command::DoWhile {
                    body,
                    condition,
                    line,
                })
            }
            Some(Token::For) => self.parse_for(line),
            Some(Token::Read) => {
                self.advance();
                let target = self.parse_identifier()?;
                self.expect(Token::Semicolon, "after READ")?;
                Ok(Command::Read { target, line })
            }
            Some(Token::Write) => {
                self.advance();
                let value = self.parse_value()?;
                self.expect(Token::Semicolon, "after WRITE")?;
                Ok(Command::Write { value, line })
            }
            Some(Token::Ident(_)) => {
                let target = self.parse_identifier()?;
                self.expect(Token::Assign, "in assignment")?;
                let expression = self.parse_expression()?;
                self.expect(Token::Semicolon, "after assignment")?;
                Ok(Command::Assign {
                    target,
                    expression,
                    line,
                })
            }
            _ => Err(self.error("expected a command")),
        }
    }

    /// Parses `IF condition THEN commands [ELSE commands] ENDIF`.
    fn parse_if(&mut self, line: usize) -> Result<Command, ParserError> {
        self.advance(); // consume 'IF'

        let condition = self.parse_condition()?;
        self.expect(Token::Then, "after IF condition")?;
        let then_branch = self.parse_commands(&[Token::Else, Token::EndIf])?;

        let else_branch = if self.peek() == Some(&Token::Else) {
            self.advance();
            Some(self.parse_commands(&[Token::EndIf])?)
        } else {
            None
        };

        self.expect(Token::EndIf, "to close IF")?;

        Ok(Command::If {
            condition,
            then_branch,
            else_branch,
            line,
        })
    }

    /// Parses `FOR i FROM a TO|DOWNTO b DO commands ENDFOR`.
    fn parse_for(&mut self, line: usize) -> Result<Command, ParserError> {
        self.advance(); // consume 'FOR'

        let iterator = self.expect_ident("as FOR iterator")?;
        self.expect(Token::From, "after FOR iterator")?;
        let from = self.parse_value()?;

        let descending = match self.peek() {
            Some(Token::To) => false,
            Some(Token::DownTo) => true,
            _ => return Err(self.error("expected 'TO' or 'DOWNTO' in FOR")),
        };
        self.advance();

        let to = self.parse_value()?;
        self.expect(Token::Do, "after FOR range")?;
        let body = self.parse_commands(&[Token::EndFor])?;
        self.expect(Token::EndFor, "to close FOR")?;

        Ok(Command::For {
            iterator,
            from,
            to,
            descending,
            body,
            line,
        })
    }

    /// Parses `value [op value]`.
    fn parse_expression(&mut self) -> Result<Expression, ParserError> {
        let left = self.parse_value()?;

        let build: fn(Value, Value) -> Expression = match self.peek() {
            Some(Token::Plus) => Expression::Plus,
            Some(Token::Minus) => Expression::Minus,
            Some(Token::Star) => Expression::Times,
            Some(Token::Slash) => Expression::Div,
            Some(Token::Percent) => Expression::Mod,
            _ => return Ok(Expression::Value(left)),
        };
        self.advance();

        let right = self.parse_value()?;
        Ok(build(left, right))
    }

    /// Parses `value relation value`.
    fn parse_condition(&mut self) -> Result<Condition, ParserError> {
        let line = self.line();
        let left = self.parse_value()?;

        let relation = match self.peek() {
            Some(Token::Eq) => Relation::Eq,
            Some(Token::NotEq) => Relation::Neq,
            Some(Token::Lt) => Relation::Less,
            Some(Token::Gt) => Relation::Greater,
            Some(Token::LtEq) => Relation::LessEq,
            Some(Token::GtEq) => Relation::GreaterEq,
            _ => return Err(self.error("expected comparison operator in condition")),
        };
        self.advance();

        let right = self.parse_value()?;

        Ok(Condition {
            relation,
            left,
            right,
            line,
        })
    }

    fn parse_value(&mut self) -> Result<Value, ParserError> {
        match self.peek() {
            Some(Token::Integer(_)) => Ok(Value::Number(self.parse_number("")?)),
            Some(Token::Minus) if matches!(self.peek_next(), Some(Token::Integer(_))) => {
                Ok(Value::Number(self.parse_number("")?))
            }
            Some(Token::Ident(_)) => Ok(Value::Identifier(self.parse_identifier()?)),
            _ => Err(self.error("expected a number or identifier")),
        }
    }

    /// Parses `name`, `name(name)` or `name(num)`.
    fn parse_identifier(&mut self) -> Result<Identifier, ParserError> {
        let line = self.line();
        let name = self.expect_ident("")?;

        if self.peek() != Some(&Token::LParen) {
            return Ok(Identifier::scalar(name, line));
        }
        self.advance(); // consume '('

        let identifier = match self.peek() {
            Some(Token::Ident(index)) => {
                let index = index.clone();
                self.advance();
                Identifier::var_index(name, index, line)
            }
            Some(Token::Integer(_)) | Some(Token::Minus) => {
                let index = self.parse_number("as array index")?;
                Identifier::const_index(name, index, line)
            }
            _ => return Err(self.error("expected array index")),
        };

        self.expect(Token::RParen, "after array index")?;
        Ok(identifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::lexer::Lexer;

    fn parse(source: &str) -> Result<Program, ParserError> {
        let tokens = Lexer::new(source).tokenize().expect("lexing should succeed");
        Parser::new(tokens).parse()
    }

    fn commands(source: &str) -> Vec<Command> {
        parse(source).expect("parse should succeed").commands
    }

    #[test]
    fn test_declarations() {
        let program = parse("DECLARE a, t(-3:4), b BEGIN WRITE 1; END").unwrap();
        assert_eq!(
            program.declarations,
            vec![
                Declaration::Scalar {
                    name: "a".to_string(),
                    line: 1
                },
                Declaration::Array {
                    name: "t".to_string(),
                    lower: -3,
                    upper: 4,
                    line: 1
                },
                Declaration::Scalar {
                    name: "b".to_string(),
                    line: 1
                },
            ]
        );
    }

    #[test]
    fn test_program_without_declarations() {
        let program = parse("BEGIN WRITE 5; END").unwrap();
        assert!(program.declarations.is_empty());
        assert_eq!(
            program.commands,
            vec![Command::Write {
                value: Value::Number(5),
                line: 1
            }]
        );
    }

    #[test]
    fn test_assignment_expressions() {
        let cmds = commands("BEGIN a := b - -4; c := t(i) % t(2); END");
        assert_eq!(
            cmds[0],
            Command::Assign {
                target: Identifier::scalar("a", 1),
                expression: Expression::Minus(
                    Value::Identifier(Identifier::scalar("b", 1)),
                    Value::Number(-4)
                ),
                line: 1
            }
        );
        assert_eq!(
            cmds[1],
            Command::Assign {
                target: Identifier::scalar("c", 1),
                expression: Expression::Mod(
                    Value::Identifier(Identifier::var_index("t", "i", 1)),
                    Value::Identifier(Identifier::const_index("t", 2, 1))
                ),
                line: 1
            }
        );
    }

    #[test]
    fn test_if_with_and_without_else() {
        let cmds = commands(
            "BEGIN\n IF a < b THEN WRITE a; ELSE WRITE b; ENDIF\n IF a = 1 THEN WRITE a; ENDIF\nEND",
        );
        match &cmds[0] {
            Command::If {
                condition,
                else_branch,
                line,
                ..
            } => {
                assert_eq!(condition.relation, Relation::Less);
                assert!(else_branch.is_some());
                assert_eq!(*line, 2);
            }
            other => panic!("expected If, got {:?}", other),
        }
        assert!(matches!(
            &cmds[1],
            Command::If {
                else_branch: None,
                line: 3,
                ..
            }
        ));
    }

    #[test]
    fn test_loops() {
        let cmds = commands(
            "BEGIN WHILE a > 0 DO a := a - 1; ENDWHILE DO a := a + 1; WHILE a <= 5 ENDDO \
             FOR i FROM 10 DOWNTO 1 DO WRITE i; ENDFOR END",
        );
        assert!(matches!(&cmds[0], Command::While { .. }));
        match &cmds[1] {
            Command::DoWhile { condition, .. } => {
                assert_eq!(condition.relation, Relation::LessEq)
            }
            other => panic!("expected DoWhile, got {:?}", other),
        }
        match &cmds[2] {
            Command::For {
                iterator,
                from,
                to,
                descending,
                ..
            } => {
                assert_eq!(iterator, "i");
                assert_eq!(from, &Value::Number(10));
                assert_eq!(to, &Value::Number(1));
                assert!(*descending);
            }
            other => panic!("expected For, got {:?}", other),
        }
    }

    #[test]
    fn test_full_integer_range() {
        let program = parse(
            "DECLARE t(-9223372036854775808:-9223372036854775807)
             BEGIN WRITE -9223372036854775808; WRITE 9223372036854775807; END",
        )
        .unwrap();
        assert!(matches!(
            program.declarations[0],
            Declaration::Array { lower: i64::MIN, upper, .. } if upper == i64::MIN + 1
        ));
        assert!(matches!(
            &program.commands[0],
            Command::Write { value: Value::Number(i64::MIN), .. }
        ));
        assert!(matches!(
            &program.commands[1],
            Command::Write { value: Value::Number(i64::MAX), .. }
        ));
    }

    #[test]
    fn test_literal_out_of_range() {
        let err = parse("BEGIN WRITE 9223372036854775808; END").unwrap_err();
        assert!(err.message.contains("out of range"), "{}", err.message);

        let err = parse("BEGIN WRITE -9223372036854775809; END").unwrap_err();
        assert!(err.message.contains("out of range"), "{}", err.message);
    }

    #[test]
    fn test_missing_semicolon() {
        let err = parse("BEGIN WRITE 1 END").unwrap_err();
        assert!(err.message.contains("expected ';'"), "{}", err.message);
    }

    #[test]
    fn test_missing_endif_at_eof() {
        let err = parse("BEGIN IF a = b THEN WRITE a;").unwrap_err();
        assert!(err.message.contains("unexpected EOF"), "{}", err.message);
        assert_eq!(err.line, 1);
    }

    #[test]
    fn test_empty_body_rejected() {
        let err = parse("BEGIN END").unwrap_err();
        assert!(err.message.contains("at least one command"));
    }

    #[test]
    fn test_trailing_input_rejected() {
        let err = parse("BEGIN WRITE 1; END WRITE").unwrap_err();
        assert!(err.message.contains("after 'END'"));
    }
}

// Rule Expression Parser
//
// Precedence climbing over the token stream. Binding powers follow the
// operator order of the rule language (earlier binds looser):
//
//   assignment (= += -= *= /=)  <  AND, OR  <  NOT  <  ==, !=  <  >=  <  >
//   <  <  <  <=  <  +  <  -  <  /  <  *  <  pipe (key | TR:name)
//
// Every binary operator is right-associative, so `a AND b OR c` groups as
// `a AND (b OR c)`.

use crate::rule_compiler::ast::{
    BinaryOp, Expr, GlobalVariable, Reference, TrackerRef, UnaryOp,
};
use crate::rule_compiler::error::{CompilerError, SymbolKind};
use crate::rule_compiler::lexer::{Lexer, Token, TokenKind};

const NOT_BINDING_POWER: u8 = 3;

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens, current: 0 }
    }

    /// Parse a complete expression; every token must be consumed
    pub fn parse(&mut self) -> Result<Expr, CompilerError> {
        if self.is_at_end() {
            return Err(CompilerError::MalformedExpression(
                "empty expression".to_string(),
                self.peek().position,
            ));
        }

        let expr = self.parse_expression(0)?;

        if !self.is_at_end() {
            let token = self.peek();
            return Err(CompilerError::MalformedExpression(
                format!("unexpected {}", describe(&token.kind)),
                token.position,
            ));
        }

        Ok(expr)
    }

    fn parse_expression(&mut self, min_binding_power: u8) -> Result<Expr, CompilerError> {
        let mut left = self.parse_prefix()?;

        while let Some((operator, binding_power)) = binary_operator(&self.peek().kind) {
            if binding_power < min_binding_power {
                break;
            }
            self.advance();

            // same power on the right makes the operator right-associative
            let right = self.parse_expression(binding_power)?;
            left = Expr::Binary {
                left: Box::new(left),
                operator,
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_prefix(&mut self) -> Result<Expr, CompilerError> {
        if self.check(&TokenKind::Not) {
            self.advance();
            let operand = self.parse_expression(NOT_BINDING_POWER)?;
            return Ok(Expr::Unary {
                operator: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }

        let mut expr = self.parse_primary()?;

        // `key | TR:name` is an alternative spelling of `TR:name(key)`
        while self.check(&TokenKind::Pipe) {
            self.advance();
            let tracker = match self.peek().kind.clone() {
                TokenKind::TrackerRead(name) => TrackerRef::read(name),
                TokenKind::TrackerUpdate(name) => TrackerRef::update(name),
                other => {
                    return Err(CompilerError::MalformedExpression(
                        format!("expected a tracker after '|', found {}", describe(&other)),
                        self.peek().position,
                    ))
                }
            };
            self.advance();
            expr = Expr::Mapped {
                tracker,
                key: Box::new(expr),
            };
        }

        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, CompilerError> {
        let token = self.peek().clone();

        let expr = match token.kind {
            TokenKind::NumberLiteral(value) => Expr::Number(value),
            TokenKind::AddressLiteral(value) => Expr::Address(value),
            TokenKind::BytesLiteral(bytes) => Expr::Bytes(bytes),
            TokenKind::StringLiteral(text) => Expr::Text(text),
            TokenKind::BooleanLiteral(value) => Expr::Boolean(value),
            TokenKind::Identifier(name) => Expr::Identifier(name),
            TokenKind::GlobalVariable(name) => {
                let global = GlobalVariable::from_name(&name).ok_or_else(|| {
                    CompilerError::UnresolvedSymbol(
                        format!("GV:{}", name),
                        SymbolKind::GlobalVariable,
                    )
                })?;
                Expr::Reference(Reference::Global(global))
            }
            TokenKind::TrackerRead(name) => {
                self.advance();
                return self.parse_tracker(TrackerRef::read(name));
            }
            TokenKind::TrackerUpdate(name) => {
                self.advance();
                return self.parse_tracker(TrackerRef::update(name));
            }
            TokenKind::ForeignCall(name) => {
                self.advance();
                return self.parse_foreign_call(name);
            }
            TokenKind::LeftParen => {
                self.advance();
                let expr = self.parse_expression(0)?;
                self.consume(TokenKind::RightParen, token.position)?;
                return Ok(expr);
            }
            other => {
                return Err(CompilerError::MalformedExpression(
                    format!("expected an operand, found {}", describe(&other)),
                    token.position,
                ))
            }
        };

        self.advance();
        Ok(expr)
    }

    /// `TR:name` or the mapped form `TR:name(key)`
    fn parse_tracker(&mut self, tracker: TrackerRef) -> Result<Expr, CompilerError> {
        if !self.check(&TokenKind::LeftParen) {
            return Ok(Expr::Reference(Reference::Tracker(tracker)));
        }

        let open = self.advance().position;
        let key = self.parse_expression(0)?;
        self.consume(TokenKind::RightParen, open)?;

        Ok(Expr::Mapped {
            tracker,
            key: Box::new(key),
        })
    }

    /// `FC:name(arg, ...)`; the argument list may be omitted
    fn parse_foreign_call(&mut self, name: String) -> Result<Expr, CompilerError> {
        let mut arguments = Vec::new();

        if self.check(&TokenKind::LeftParen) {
            let open = self.advance().position;

            while !self.check(&TokenKind::RightParen) {
                if self.is_at_end() {
                    return Err(CompilerError::MalformedExpression(
                        format!("unclosed argument list of FC:{}", name),
                        open,
                    ));
                }
                arguments.push(self.parse_expression(0)?);
                if self.check(&TokenKind::Comma) {
                    self.advance();
                } else if !self.check(&TokenKind::RightParen) {
                    let token = self.peek();
                    return Err(CompilerError::MalformedExpression(
                        format!("expected ',' or ')', found {}", describe(&token.kind)),
                        token.position,
                    ));
                }
            }
            self.consume(TokenKind::RightParen, open)?;
        }

        Ok(Expr::Reference(Reference::ForeignCall { name, arguments }))
    }

    // Helper methods
    fn check(&self, token_type: &TokenKind) -> bool {
        std::mem::discriminant(&self.peek().kind) == std::mem::discriminant(token_type)
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.tokens.len() || matches!(self.peek().kind, TokenKind::EOF)
    }

    fn peek(&self) -> &Token {
        static END: Token = Token {
            kind: TokenKind::EOF,
            position: 0,
        };
        self.tokens.get(self.current).unwrap_or(&END)
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1)]
    }

    /// Consume a closing token, reporting the position of its opener
    fn consume(&mut self, token_type: TokenKind, opened_at: usize) -> Result<(), CompilerError> {
        if self.check(&token_type) {
            self.advance();
            Ok(())
        } else {
            let token = self.peek();
            Err(CompilerError::MalformedExpression(
                format!(
                    "unbalanced parenthesis opened at position {}, found {}",
                    opened_at,
                    describe(&token.kind)
                ),
                token.position,
            ))
        }
    }
}

/// Binary operator and binding power of a token, if it is one
fn binary_operator(kind: &TokenKind) -> Option<(BinaryOp, u8)> {
    let entry = match kind {
        TokenKind::Equal => (BinaryOp::Assign, 1),
        TokenKind::PlusEqual => (BinaryOp::AddAssign, 1),
        TokenKind::MinusEqual => (BinaryOp::SubtractAssign, 1),
        TokenKind::StarEqual => (BinaryOp::MultiplyAssign, 1),
        TokenKind::SlashEqual => (BinaryOp::DivideAssign, 1),
        TokenKind::And => (BinaryOp::And, 2),
        TokenKind::Or => (BinaryOp::Or, 2),
        TokenKind::EqualEqual => (BinaryOp::Equal, 4),
        TokenKind::NotEqual => (BinaryOp::NotEqual, 4),
        TokenKind::GreaterEqual => (BinaryOp::GreaterEqual, 5),
        TokenKind::Greater => (BinaryOp::Greater, 6),
        TokenKind::Less => (BinaryOp::Less, 7),
        TokenKind::LessEqual => (BinaryOp::LessEqual, 8),
        TokenKind::Plus => (BinaryOp::Add, 9),
        TokenKind::Minus => (BinaryOp::Subtract, 10),
        TokenKind::Slash => (BinaryOp::Divide, 11),
        TokenKind::Star => (BinaryOp::Multiply, 12),
        _ => return None,
    };
    Some(entry)
}

fn describe(kind: &TokenKind) -> String {
    match kind {
        TokenKind::EOF => "end of input".to_string(),
        other => match other.symbol() {
            Some(symbol) => format!("'{}'", symbol),
            None => format!("{:?}", other),
        },
    }
}

/// Tokenize and parse a single expression
pub fn parse_expression(source: &str) -> Result<Expr, CompilerError> {
    let mut lexer = Lexer::new(source);
    let tokens = lexer.tokenize()?;
    let mut parser = Parser::new(tokens);
    parser.parse()
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;

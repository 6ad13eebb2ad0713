// Expression Normalizer
//
// Produces the canonical spelling of an expression by parsing it and
// rendering the tree back out: single spaces between tokens, parentheses
// only around an AND/OR that is an operand of another operator, booleans
// as 1/0, and reference argument lists attached to their reference. The
// decompiler renders exactly this form, which is what round-trip
// comparisons are made against.

use crate::rule_compiler::error::CompilerError;
use crate::rule_compiler::lexer::{Lexer, Token, TokenKind};
use crate::rule_compiler::parser::Parser;

/// Normalize a condition or effect expression
pub fn normalize(source: &str) -> Result<String, CompilerError> {
    let mut lexer = Lexer::new(source);
    let tokens = lexer.tokenize()?;
    check_parentheses(&tokens)?;

    let expr = Parser::new(tokens).parse()?;
    let normalized = expr.to_string();
    log::trace!("normalize: '{}' -> '{}'", source, normalized);
    Ok(normalized)
}

/// Report an unbalanced parenthesis at the offending token
fn check_parentheses(tokens: &[Token]) -> Result<(), CompilerError> {
    let mut open = Vec::new();

    for token in tokens {
        match token.kind {
            TokenKind::LeftParen => open.push(token.position),
            TokenKind::RightParen => {
                if open.pop().is_none() {
                    return Err(CompilerError::MalformedExpression(
                        "unmatched ')'".to_string(),
                        token.position,
                    ));
                }
            }
            _ => {}
        }
    }

    match open.pop() {
        Some(position) => Err(CompilerError::MalformedExpression(
            "unmatched '('".to_string(),
            position,
        )),
        None => Ok(()),
    }
}

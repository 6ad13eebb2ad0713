// Rule Language Lexer
// Tokenizes condition and effect expressions into a stream of tokens

use primitive_types::U256;

use crate::rule_compiler::error::CompilerError;

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    NumberLiteral(U256),
    AddressLiteral(U256),
    BytesLiteral(Vec<u8>),
    StringLiteral(String),
    BooleanLiteral(bool),
    Identifier(String),

    // Prefixed references
    TrackerRead(String),   // TR:name
    TrackerUpdate(String), // TRU:name
    ForeignCall(String),   // FC:name
    GlobalVariable(String), // GV:NAME

    // Logical keywords
    And,
    Or,
    Not,

    // Symbols
    LeftParen,  // (
    RightParen, // )
    Comma,      // ,
    Pipe,       // |

    // Operators
    Plus,         // +
    Minus,        // -
    Star,         // *
    Slash,        // /
    Less,         // <
    LessEqual,    // <=
    Greater,      // >
    GreaterEqual, // >=
    EqualEqual,   // ==
    NotEqual,     // !=
    Equal,        // =
    PlusEqual,    // +=
    MinusEqual,   // -=
    StarEqual,    // *=
    SlashEqual,   // /=

    EOF,
}

impl TokenKind {
    /// Source spelling of operator and keyword tokens
    pub fn symbol(&self) -> Option<&'static str> {
        let symbol = match self {
            TokenKind::And => "AND",
            TokenKind::Or => "OR",
            TokenKind::Not => "NOT",
            TokenKind::LeftParen => "(",
            TokenKind::RightParen => ")",
            TokenKind::Comma => ",",
            TokenKind::Pipe => "|",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Less => "<",
            TokenKind::LessEqual => "<=",
            TokenKind::Greater => ">",
            TokenKind::GreaterEqual => ">=",
            TokenKind::EqualEqual => "==",
            TokenKind::NotEqual => "!=",
            TokenKind::Equal => "=",
            TokenKind::PlusEqual => "+=",
            TokenKind::MinusEqual => "-=",
            TokenKind::StarEqual => "*=",
            TokenKind::SlashEqual => "/=",
            _ => return None,
        };
        Some(symbol)
    }
}

pub struct Lexer {
    input: Vec<char>,
    position: usize,
    current_char: Option<char>,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        let chars: Vec<char> = input.chars().collect();
        let current_char = chars.first().copied();

        Lexer {
            input: chars,
            position: 0,
            current_char,
        }
    }

    pub fn tokenize(&mut self) -> Result<Vec<Token>, CompilerError> {
        let mut tokens = Vec::new();

        loop {
            let token = self.next_token()?;
            let at_end = token.kind == TokenKind::EOF;
            tokens.push(token);
            if at_end {
                break;
            }
        }

        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<Token, CompilerError> {
        self.skip_whitespace();

        let start_pos = self.position;

        let ch = match self.current_char {
            None => {
                return Ok(Token {
                    kind: TokenKind::EOF,
                    position: start_pos,
                })
            }
            Some(ch) => ch,
        };

        let kind = match ch {
            '(' => {
                self.advance();
                TokenKind::LeftParen
            }
            ')' => {
                self.advance();
                TokenKind::RightParen
            }
            ',' => {
                self.advance();
                TokenKind::Comma
            }
            '|' => {
                self.advance();
                TokenKind::Pipe
            }
            '+' => self.operator_with_assignment(TokenKind::Plus, TokenKind::PlusEqual),
            '-' => self.operator_with_assignment(TokenKind::Minus, TokenKind::MinusEqual),
            '*' => self.operator_with_assignment(TokenKind::Star, TokenKind::StarEqual),
            '/' => self.operator_with_assignment(TokenKind::Slash, TokenKind::SlashEqual),
            '<' => self.operator_with_assignment(TokenKind::Less, TokenKind::LessEqual),
            '>' => self.operator_with_assignment(TokenKind::Greater, TokenKind::GreaterEqual),
            '=' => self.operator_with_assignment(TokenKind::Equal, TokenKind::EqualEqual),
            '!' => {
                self.advance();
                if self.current_char == Some('=') {
                    self.advance();
                    TokenKind::NotEqual
                } else {
                    return Err(CompilerError::UnexpectedCharacter('!', start_pos));
                }
            }

            '"' | '\'' => {
                self.advance();
                TokenKind::StringLiteral(self.read_string(ch, start_pos)?)
            }

            ch if ch.is_ascii_digit() => self.read_number(start_pos)?,

            ch if ch.is_alphabetic() || ch == '_' => {
                let identifier = self.read_identifier();
                if self.current_char == Some(':') {
                    self.read_reference(identifier, start_pos)?
                } else {
                    keyword_or_identifier(identifier)
                }
            }

            ch => return Err(CompilerError::UnexpectedCharacter(ch, start_pos)),
        };

        Ok(Token {
            kind,
            position: start_pos,
        })
    }

    fn advance(&mut self) {
        self.position += 1;
        self.current_char = self.input.get(self.position).copied();
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current_char {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    /// `op` alone, or `op=` when followed by '='
    fn operator_with_assignment(&mut self, plain: TokenKind, with_equal: TokenKind) -> TokenKind {
        self.advance();
        if self.current_char == Some('=') {
            self.advance();
            with_equal
        } else {
            plain
        }
    }

    fn read_string(&mut self, quote: char, start_pos: usize) -> Result<String, CompilerError> {
        let mut value = String::new();

        while let Some(ch) = self.current_char {
            match ch {
                ch if ch == quote => {
                    self.advance();
                    return Ok(value);
                }
                '\\' => {
                    self.advance();
                    match self.current_char {
                        Some(escaped) => {
                            value.push(escaped);
                            self.advance();
                        }
                        None => return Err(CompilerError::UnterminatedString(start_pos)),
                    }
                }
                ch => {
                    value.push(ch);
                    self.advance();
                }
            }
        }

        Err(CompilerError::UnterminatedString(start_pos))
    }

    fn read_number(&mut self, start_pos: usize) -> Result<TokenKind, CompilerError> {
        if self.current_char == Some('0') && matches!(self.peek_char(), Some('x') | Some('X')) {
            self.advance();
            self.advance();
            return self.read_hex(start_pos);
        }

        let mut digits = String::new();
        while let Some(ch) = self.current_char {
            if ch.is_ascii_digit() {
                digits.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        if matches!(self.current_char, Some(ch) if ch.is_alphabetic() || ch == '_') {
            return Err(CompilerError::LexicalError(
                format!("Invalid number literal starting with '{}'", digits),
                start_pos,
            ));
        }

        U256::from_dec_str(&digits)
            .map(TokenKind::NumberLiteral)
            .map_err(|_| {
                CompilerError::LexicalError(
                    format!("Number literal '{}' exceeds 256 bits", digits),
                    start_pos,
                )
            })
    }

    fn read_hex(&mut self, start_pos: usize) -> Result<TokenKind, CompilerError> {
        let mut digits = String::new();
        while let Some(ch) = self.current_char {
            if ch.is_ascii_hexdigit() {
                digits.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        if matches!(self.current_char, Some(ch) if ch.is_alphanumeric() || ch == '_') {
            return Err(CompilerError::LexicalError(
                "Invalid hex literal".to_string(),
                start_pos,
            ));
        }

        // An address is exactly 20 bytes; any other hex literal is raw bytes
        if digits.len() == 40 {
            let value = U256::from_str_radix(&digits, 16).map_err(|_| {
                CompilerError::LexicalError("Invalid address literal".to_string(), start_pos)
            })?;
            return Ok(TokenKind::AddressLiteral(value));
        }

        decode_hex(&digits)
            .map(TokenKind::BytesLiteral)
            .ok_or_else(|| {
                CompilerError::LexicalError(
                    "Hex literal must have an even number of digits".to_string(),
                    start_pos,
                )
            })
    }

    fn read_identifier(&mut self) -> String {
        let mut value = String::new();

        while let Some(ch) = self.current_char {
            if ch.is_alphanumeric() || ch == '_' {
                value.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        value
    }

    /// `PREFIX:name`, with the prefix already consumed and ':' current
    fn read_reference(
        &mut self,
        prefix: String,
        start_pos: usize,
    ) -> Result<TokenKind, CompilerError> {
        self.advance(); // consume ':'
        let name = self.read_identifier();

        if name.is_empty() {
            return Err(CompilerError::LexicalError(
                format!("Expected a name after '{}:'", prefix),
                start_pos,
            ));
        }

        match prefix.as_str() {
            "TR" => Ok(TokenKind::TrackerRead(name)),
            "TRU" => Ok(TokenKind::TrackerUpdate(name)),
            "FC" => Ok(TokenKind::ForeignCall(name)),
            "GV" => Ok(TokenKind::GlobalVariable(name)),
            _ => Err(CompilerError::LexicalError(
                format!("Unknown reference prefix '{}:'", prefix),
                start_pos,
            )),
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.input.get(self.position + 1).copied()
    }
}

fn keyword_or_identifier(identifier: String) -> TokenKind {
    match identifier.as_str() {
        "AND" => TokenKind::And,
        "OR" => TokenKind::Or,
        "NOT" => TokenKind::Not,
        "true" => TokenKind::BooleanLiteral(true),
        "false" => TokenKind::BooleanLiteral(false),
        _ => TokenKind::Identifier(identifier),
    }
}

/// Decode an even-length hex digit string (no prefix)
pub fn decode_hex(digits: &str) -> Option<Vec<u8>> {
    if digits.len() % 2 != 0 || !digits.is_ascii() {
        return None;
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&digits[i..i + 2], 16).ok())
        .collect()
}

/// Lowercase hex with a `0x` prefix
pub fn encode_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(2 + bytes.len() * 2);
    out.push_str("0x");
    for byte in bytes {
        out.push_str(&format!("{:02x}", byte));
    }
    out
}

/// Whether a literal can be written without quotes and still lex as a
/// single bare word.
pub fn is_bare_word(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|ch| ch.is_alphanumeric() || ch == '_')
        && !matches!(text, "AND" | "OR" | "NOT" | "true" | "false")
}

#[cfg(test)]
#[path = "lexer_tests.rs"]
mod tests;

// Rule Compiler Error Handling

use std::fmt;

/// Category of a name that failed to resolve against the lookup tables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Argument,
    Tracker,
    ForeignCall,
    GlobalVariable,
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SymbolKind::Argument => write!(f, "calling function argument"),
            SymbolKind::Tracker => write!(f, "tracker"),
            SymbolKind::ForeignCall => write!(f, "foreign call"),
            SymbolKind::GlobalVariable => write!(f, "global variable"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CompilerError {
    // Lexical errors
    LexicalError(String, usize), // message, position
    UnexpectedCharacter(char, usize),
    UnterminatedString(usize),

    // Expression errors
    MalformedExpression(String, usize), // offending fragment, position
    InvalidExpression(String),          // parsed, but has no encoding

    // Resolution errors
    UnresolvedSymbol(String, SymbolKind),
    UnsupportedType(String),
    InvalidDefaultValue(String, String), // value, expected type

    // Decompiler errors
    UnknownOpcode(u64, usize), // numeric code, position
    MissingOperand(usize),
    InvalidSlot(usize, usize), // slot, position
    MissingPlaceholderName(usize),

    // Configuration errors
    ConfigError(String),
}

impl fmt::Display for CompilerError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CompilerError::LexicalError(msg, pos) => {
                write!(f, "Lexical error at position {}: {}", pos, msg)
            }
            CompilerError::UnexpectedCharacter(ch, pos) => {
                write!(f, "Unexpected character '{}' at position {}", ch, pos)
            }
            CompilerError::UnterminatedString(pos) => {
                write!(f, "Unterminated string starting at position {}", pos)
            }
            CompilerError::MalformedExpression(fragment, pos) => {
                write!(f, "Malformed expression at position {}: {}", pos, fragment)
            }
            CompilerError::InvalidExpression(msg) => {
                write!(f, "Invalid expression: {}", msg)
            }
            CompilerError::UnresolvedSymbol(name, kind) => {
                write!(f, "Unresolved {} '{}'", kind, name)
            }
            CompilerError::UnsupportedType(type_name) => {
                write!(f, "Unsupported type '{}'", type_name)
            }
            CompilerError::InvalidDefaultValue(value, expected) => {
                write!(
                    f,
                    "Invalid default value '{}': expected {}",
                    value, expected
                )
            }
            CompilerError::UnknownOpcode(code, pos) => {
                write!(f, "Unknown opcode {} at position {}", code, pos)
            }
            CompilerError::MissingOperand(pos) => {
                write!(f, "Instruction at position {} is missing operands", pos)
            }
            CompilerError::InvalidSlot(slot, pos) => {
                write!(
                    f,
                    "Instruction at position {} references unwritten memory slot {}",
                    pos, slot
                )
            }
            CompilerError::MissingPlaceholderName(index) => {
                write!(f, "No display name supplied for placeholder {}", index)
            }
            CompilerError::ConfigError(msg) => {
                write!(f, "Configuration error: {}", msg)
            }
        }
    }
}

impl std::error::Error for CompilerError {}

impl From<toml::de::Error> for CompilerError {
    fn from(err: toml::de::Error) -> Self {
        CompilerError::ConfigError(err.to_string())
    }
}

// Abstract Syntax Tree definitions for rule expressions

use std::fmt;

use primitive_types::U256;
use serde::{Deserialize, Serialize};

use crate::rule_compiler::lexer::{encode_hex, is_bare_word};
use crate::rule_compiler::types::PType;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Decimal number literal
    Number(U256),
    /// 20-byte address literal, kept numeric
    Address(U256),
    /// Bare word or quoted text that does not name a calling-function argument
    Text(String),
    Bytes(Vec<u8>),
    Boolean(bool),
    /// Bare identifier awaiting resolution into an argument or text literal
    Identifier(String),
    Reference(Reference),
    /// Mapped tracker read or update: `TR:name(key)`
    Mapped {
        tracker: TrackerRef,
        key: Box<Expr>,
    },
    Binary {
        left: Box<Expr>,
        operator: BinaryOp,
        right: Box<Expr>,
    },
    Unary {
        operator: UnaryOp,
        operand: Box<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reference {
    /// Calling-function argument, produced by resolution of an identifier
    Argument(String),
    Tracker(TrackerRef),
    ForeignCall { name: String, arguments: Vec<Expr> },
    Global(GlobalVariable),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackerRef {
    pub name: String,
    /// `TRU:` rather than `TR:`
    pub update: bool,
}

impl TrackerRef {
    pub fn read(name: impl Into<String>) -> Self {
        TrackerRef {
            name: name.into(),
            update: false,
        }
    }

    pub fn update(name: impl Into<String>) -> Self {
        TrackerRef {
            name: name.into(),
            update: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GlobalVariable {
    #[serde(rename = "MSG_SENDER")]
    MsgSender,
    #[serde(rename = "BLOCK_TIMESTAMP")]
    BlockTimestamp,
    #[serde(rename = "MSG_DATA")]
    MsgData,
    #[serde(rename = "BLOCK_NUMBER")]
    BlockNumber,
    #[serde(rename = "TX_ORIGIN")]
    TxOrigin,
}

impl GlobalVariable {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "MSG_SENDER" => Some(GlobalVariable::MsgSender),
            "BLOCK_TIMESTAMP" => Some(GlobalVariable::BlockTimestamp),
            "MSG_DATA" => Some(GlobalVariable::MsgData),
            "BLOCK_NUMBER" => Some(GlobalVariable::BlockNumber),
            "TX_ORIGIN" => Some(GlobalVariable::TxOrigin),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            GlobalVariable::MsgSender => "MSG_SENDER",
            GlobalVariable::BlockTimestamp => "BLOCK_TIMESTAMP",
            GlobalVariable::MsgData => "MSG_DATA",
            GlobalVariable::BlockNumber => "BLOCK_NUMBER",
            GlobalVariable::TxOrigin => "TX_ORIGIN",
        }
    }

    pub fn p_type(self) -> PType {
        match self {
            GlobalVariable::MsgSender | GlobalVariable::TxOrigin => PType::Address,
            GlobalVariable::BlockTimestamp | GlobalVariable::BlockNumber => PType::Uint256,
            GlobalVariable::MsgData => PType::Bytes,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Equal,
    NotEqual,
    And,
    Or,
    // Tracker updates
    Assign,
    AddAssign,
    SubtractAssign,
    MultiplyAssign,
    DivideAssign,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Less => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEqual => ">=",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
            BinaryOp::Assign => "=",
            BinaryOp::AddAssign => "+=",
            BinaryOp::SubtractAssign => "-=",
            BinaryOp::MultiplyAssign => "*=",
            BinaryOp::DivideAssign => "/=",
        }
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }

    pub fn is_tracker_update(self) -> bool {
        self.update_base().is_some() || self == BinaryOp::Assign
    }

    /// Arithmetic applied by a compound update, e.g. `+` for `+=`
    pub fn update_base(self) -> Option<BinaryOp> {
        match self {
            BinaryOp::AddAssign => Some(BinaryOp::Add),
            BinaryOp::SubtractAssign => Some(BinaryOp::Subtract),
            BinaryOp::MultiplyAssign => Some(BinaryOp::Multiply),
            BinaryOp::DivideAssign => Some(BinaryOp::Divide),
            _ => None,
        }
    }

    /// Inverse of `update_base`
    pub fn compound_of(self) -> Option<BinaryOp> {
        match self {
            BinaryOp::Add => Some(BinaryOp::AddAssign),
            BinaryOp::Subtract => Some(BinaryOp::SubtractAssign),
            BinaryOp::Multiply => Some(BinaryOp::MultiplyAssign),
            BinaryOp::Divide => Some(BinaryOp::DivideAssign),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Not,
}

/// Canonical spelling of a text literal: bare when it lexes as one word,
/// quoted otherwise.
pub fn render_text(text: &str) -> String {
    if is_bare_word(text) {
        text.to_string()
    } else {
        format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
    }
}

/// Canonical spelling of an address literal
pub fn render_address(value: &U256) -> String {
    let mut word = [0u8; 32];
    value.to_big_endian(&mut word);
    encode_hex(&word[12..])
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Reference::Argument(name) => write!(f, "{}", name),
            Reference::Tracker(tracker) => write!(f, "{}", tracker),
            Reference::ForeignCall { name, arguments } if arguments.is_empty() => {
                write!(f, "FC:{}", name)
            }
            Reference::ForeignCall { name, arguments } => {
                let rendered: Vec<String> = arguments.iter().map(|arg| arg.to_string()).collect();
                write!(f, "FC:{}({})", name, rendered.join(", "))
            }
            Reference::Global(global) => write!(f, "GV:{}", global.name()),
        }
    }
}

impl fmt::Display for TrackerRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.update {
            write!(f, "TRU:{}", self.name)
        } else {
            write!(f, "TR:{}", self.name)
        }
    }
}

/// Renders the canonical form that the decompiler reproduces: logical
/// operands parenthesized, booleans as the 1/0 they finalize to, everything
/// else flat.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Expr::Number(value) => write!(f, "{}", value),
            Expr::Address(value) => write!(f, "{}", render_address(value)),
            Expr::Text(text) => write!(f, "{}", render_text(text)),
            Expr::Bytes(bytes) => write!(f, "{}", encode_hex(bytes)),
            Expr::Boolean(value) => write!(f, "{}", u8::from(*value)),
            Expr::Identifier(name) => write!(f, "{}", name),
            Expr::Reference(reference) => write!(f, "{}", reference),
            Expr::Mapped { tracker, key } => write!(f, "{}({})", tracker, key),
            Expr::Binary {
                left,
                operator,
                right,
            } => {
                write_operand(f, left)?;
                write!(f, " {} ", operator.symbol())?;
                write_operand(f, right)
            }
            Expr::Unary { operand, .. } => {
                write!(f, "NOT ")?;
                write_operand(f, operand)
            }
        }
    }
}

fn write_operand(f: &mut fmt::Formatter, expr: &Expr) -> fmt::Result {
    match expr {
        Expr::Binary { operator, .. } if operator.is_logical() => write!(f, "( {} )", expr),
        _ => write!(f, "{}", expr),
    }
}

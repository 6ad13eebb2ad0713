//! Rule Interpreter Opcodes
//!
//! The symbolic opcodes emitted by the instruction encoder and the numeric
//! registries that map them onto what a deployed interpreter understands.
//!
//! # Registries
//!
//! Two built-in registries exist. The **current** registry is the default;
//! the **legacy** registry matches interpreters deployed before mapped
//! trackers, so it has no entry for `PLHM`, `TRUM` or `!=`. A custom table
//! can also be loaded from the `[opcodes]` section of a configuration file.
//!
//! # Operand counts
//!
//! Every opcode is followed by a fixed number of operands in the instruction
//! stream:
//! - **1 operand**: `N` (literal), `NOT` (slot), `PLH` (placeholder index)
//! - **2 operands**: binary operators (two slots), `=`, `PLHM` (placeholder
//!   index, key slot)
//! - **3 operands**: `TRU` (tracker index, value slot, 0), `TRUM` (tracker
//!   index, value slot, key slot)

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::rule_compiler::ast::BinaryOp;
use crate::rule_compiler::error::CompilerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// Literal value
    Number,
    Not,
    /// Placeholder read
    Placeholder,
    Assign,
    /// Mapped tracker read
    PlaceholderMapped,
    Add,
    Subtract,
    Multiply,
    Divide,
    Less,
    Greater,
    Equal,
    And,
    Or,
    GreaterEqual,
    LessEqual,
    NotEqual,
    /// Tracker update
    TrackerUpdate,
    /// Mapped tracker update
    TrackerUpdateMapped,
}

impl Opcode {
    pub const ALL: [Opcode; 19] = [
        Opcode::Number,
        Opcode::Not,
        Opcode::Placeholder,
        Opcode::Assign,
        Opcode::PlaceholderMapped,
        Opcode::Add,
        Opcode::Subtract,
        Opcode::Multiply,
        Opcode::Divide,
        Opcode::Less,
        Opcode::Greater,
        Opcode::Equal,
        Opcode::And,
        Opcode::Or,
        Opcode::GreaterEqual,
        Opcode::LessEqual,
        Opcode::NotEqual,
        Opcode::TrackerUpdate,
        Opcode::TrackerUpdateMapped,
    ];

    pub fn symbol(self) -> &'static str {
        match self {
            Opcode::Number => "N",
            Opcode::Not => "NOT",
            Opcode::Placeholder => "PLH",
            Opcode::Assign => "=",
            Opcode::PlaceholderMapped => "PLHM",
            Opcode::Add => "+",
            Opcode::Subtract => "-",
            Opcode::Multiply => "*",
            Opcode::Divide => "/",
            Opcode::Less => "<",
            Opcode::Greater => ">",
            Opcode::Equal => "==",
            Opcode::And => "AND",
            Opcode::Or => "OR",
            Opcode::GreaterEqual => ">=",
            Opcode::LessEqual => "<=",
            Opcode::NotEqual => "!=",
            Opcode::TrackerUpdate => "TRU",
            Opcode::TrackerUpdateMapped => "TRUM",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Opcode> {
        Opcode::ALL.iter().copied().find(|op| op.symbol() == symbol)
    }

    pub fn operand_count(self) -> usize {
        match self {
            Opcode::Number | Opcode::Not | Opcode::Placeholder => 1,
            Opcode::TrackerUpdate | Opcode::TrackerUpdateMapped => 3,
            _ => 2,
        }
    }

    /// Opcode computing a binary operator; compound updates have none
    pub fn from_binary(operator: BinaryOp) -> Option<Opcode> {
        let opcode = match operator {
            BinaryOp::Add => Opcode::Add,
            BinaryOp::Subtract => Opcode::Subtract,
            BinaryOp::Multiply => Opcode::Multiply,
            BinaryOp::Divide => Opcode::Divide,
            BinaryOp::Less => Opcode::Less,
            BinaryOp::LessEqual => Opcode::LessEqual,
            BinaryOp::Greater => Opcode::Greater,
            BinaryOp::GreaterEqual => Opcode::GreaterEqual,
            BinaryOp::Equal => Opcode::Equal,
            BinaryOp::NotEqual => Opcode::NotEqual,
            BinaryOp::And => Opcode::And,
            BinaryOp::Or => Opcode::Or,
            BinaryOp::Assign => Opcode::Assign,
            _ => return None,
        };
        Some(opcode)
    }

    /// Inverse of `from_binary`
    pub fn binary_operator(self) -> Option<BinaryOp> {
        let operator = match self {
            Opcode::Add => BinaryOp::Add,
            Opcode::Subtract => BinaryOp::Subtract,
            Opcode::Multiply => BinaryOp::Multiply,
            Opcode::Divide => BinaryOp::Divide,
            Opcode::Less => BinaryOp::Less,
            Opcode::LessEqual => BinaryOp::LessEqual,
            Opcode::Greater => BinaryOp::Greater,
            Opcode::GreaterEqual => BinaryOp::GreaterEqual,
            Opcode::Equal => BinaryOp::Equal,
            Opcode::NotEqual => BinaryOp::NotEqual,
            Opcode::And => BinaryOp::And,
            Opcode::Or => BinaryOp::Or,
            Opcode::Assign => BinaryOp::Assign,
            _ => return None,
        };
        Some(operator)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Bidirectional mapping between opcodes and their numeric codes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "IndexMap<String, u64>", try_from = "IndexMap<String, u64>")]
pub struct OpcodeRegistry {
    codes: IndexMap<Opcode, u64>,
}

lazy_static! {
    pub static ref LEGACY_REGISTRY: OpcodeRegistry = OpcodeRegistry::from_pairs(&[
        (Opcode::Number, 0),
        (Opcode::Add, 1),
        (Opcode::Subtract, 2),
        (Opcode::Multiply, 3),
        (Opcode::Divide, 4),
        (Opcode::Less, 5),
        (Opcode::Greater, 6),
        (Opcode::Equal, 7),
        (Opcode::And, 8),
        (Opcode::Or, 9),
        (Opcode::Not, 10),
        (Opcode::Placeholder, 11),
        (Opcode::TrackerUpdate, 12),
        (Opcode::Assign, 13),
        (Opcode::GreaterEqual, 14),
        (Opcode::LessEqual, 15),
    ]);
    pub static ref CURRENT_REGISTRY: OpcodeRegistry = OpcodeRegistry::from_pairs(&[
        (Opcode::Number, 0),
        (Opcode::Not, 1),
        (Opcode::Placeholder, 2),
        (Opcode::Assign, 3),
        (Opcode::PlaceholderMapped, 4),
        (Opcode::Add, 5),
        (Opcode::Subtract, 6),
        (Opcode::Multiply, 7),
        (Opcode::Divide, 8),
        (Opcode::Less, 9),
        (Opcode::Greater, 10),
        (Opcode::Equal, 11),
        (Opcode::And, 12),
        (Opcode::Or, 13),
        (Opcode::GreaterEqual, 14),
        (Opcode::LessEqual, 15),
        (Opcode::NotEqual, 16),
        (Opcode::TrackerUpdate, 17),
        (Opcode::TrackerUpdateMapped, 18),
    ]);
}

impl OpcodeRegistry {
    fn from_pairs(pairs: &[(Opcode, u64)]) -> Self {
        OpcodeRegistry {
            codes: pairs.iter().copied().collect(),
        }
    }

    pub fn current() -> Self {
        CURRENT_REGISTRY.clone()
    }

    pub fn legacy() -> Self {
        LEGACY_REGISTRY.clone()
    }

    /// Build a registry from a symbol to code table such as the `[opcodes]`
    /// section of a configuration file. Codes must be unique.
    pub fn from_table(table: &IndexMap<String, u64>) -> Result<Self, CompilerError> {
        let mut codes = IndexMap::new();
        for (symbol, code) in table {
            let opcode = Opcode::from_symbol(symbol).ok_or_else(|| {
                CompilerError::ConfigError(format!("unknown opcode symbol '{}'", symbol))
            })?;
            if let Some((clash, _)) = codes.iter().find(|(_, existing)| **existing == *code) {
                return Err(CompilerError::ConfigError(format!(
                    "opcode code {} assigned to both '{}' and '{}'",
                    code, clash, symbol
                )));
            }
            codes.insert(opcode, *code);
        }
        Ok(OpcodeRegistry { codes })
    }

    /// Numeric code of an opcode; a registry without it cannot express the rule
    pub fn code(&self, opcode: Opcode) -> Result<u64, CompilerError> {
        self.codes.get(&opcode).copied().ok_or_else(|| {
            CompilerError::ConfigError(format!(
                "opcode '{}' is not available in this registry",
                opcode
            ))
        })
    }

    pub fn opcode(&self, code: u64) -> Option<Opcode> {
        self.codes
            .iter()
            .find(|(_, value)| **value == code)
            .map(|(opcode, _)| *opcode)
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

impl Default for OpcodeRegistry {
    fn default() -> Self {
        OpcodeRegistry::current()
    }
}

impl From<OpcodeRegistry> for IndexMap<String, u64> {
    fn from(registry: OpcodeRegistry) -> Self {
        registry
            .codes
            .into_iter()
            .map(|(opcode, code)| (opcode.symbol().to_string(), code))
            .collect()
    }
}

impl TryFrom<IndexMap<String, u64>> for OpcodeRegistry {
    type Error = CompilerError;

    fn try_from(table: IndexMap<String, u64>) -> Result<Self, Self::Error> {
        OpcodeRegistry::from_table(&table)
    }
}

#[cfg(test)]
#[path = "opcodes_tests.rs"]
mod tests;

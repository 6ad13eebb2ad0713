// Instruction Encoder
//
// Flattens a resolved expression tree into the symbolic instruction list of
// the rule interpreter. Encoding is post-order: every operand is encoded
// before the operator that consumes it, each value-producing opcode writes
// the next memory slot, and operators refer to their operands by slot.
//
//   a + 5 > b      PLH 0      -> slot 0
//                  N 5        -> slot 1
//                  + 0 1      -> slot 2
//                  PLH 1      -> slot 3
//                  > 2 3      -> slot 4

use std::fmt;

use indexmap::IndexMap;
use primitive_types::U256;
use serde::{Deserialize, Serialize};

use crate::rule_compiler::ast::{
    render_address, render_text, BinaryOp, Expr, GlobalVariable, Reference, TrackerRef, UnaryOp,
};
use crate::rule_compiler::error::{CompilerError, SymbolKind};
use crate::rule_compiler::lexer::encode_hex;
use crate::rule_compiler::opcodes::Opcode;
use crate::rule_compiler::resolver::{
    ComponentCatalog, ComponentKey, ComponentSource, RuleComponent,
};
use crate::rule_compiler::types::PType;

/// Placeholder flag values understood by the interpreter
pub mod flags {
    pub const CALLING_ARGUMENT: u8 = 0x00;
    pub const FOREIGN_CALL: u8 = 0x01;
    pub const TRACKER: u8 = 0x02;
    pub const GLOBAL_MSG_SENDER: u8 = 0x04;
    pub const GLOBAL_BLOCK_TIMESTAMP: u8 = 0x08;
    pub const GLOBAL_MSG_DATA: u8 = 0x0C;
    pub const GLOBAL_BLOCK_NUMBER: u8 = 0x10;
    pub const GLOBAL_TX_ORIGIN: u8 = 0x14;
}

pub fn global_flag(global: GlobalVariable) -> u8 {
    match global {
        GlobalVariable::MsgSender => flags::GLOBAL_MSG_SENDER,
        GlobalVariable::BlockTimestamp => flags::GLOBAL_BLOCK_TIMESTAMP,
        GlobalVariable::MsgData => flags::GLOBAL_MSG_DATA,
        GlobalVariable::BlockNumber => flags::GLOBAL_BLOCK_NUMBER,
        GlobalVariable::TxOrigin => flags::GLOBAL_TX_ORIGIN,
    }
}

fn placeholder_flags(source: ComponentSource) -> u8 {
    match source {
        ComponentSource::Argument => flags::CALLING_ARGUMENT,
        ComponentSource::ForeignCall => flags::FOREIGN_CALL,
        ComponentSource::Tracker => flags::TRACKER,
        ComponentSource::Global(global) => global_flag(global),
    }
}

/// Runtime-supplied value slot referenced by `PLH`/`PLHM`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Placeholder {
    pub p_type: PType,
    pub type_specific_index: u64,
    pub flags: u8,
    /// Key type of a mapped tracker
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapped_tracker_key: Option<PType>,
}

/// Placeholders of one rule side, deduplicated by (type-specific index,
/// flags), with the display name of each.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaceholderCatalog {
    entries: IndexMap<(u64, u8), (Placeholder, String)>,
}

impl PlaceholderCatalog {
    pub fn new() -> Self {
        PlaceholderCatalog::default()
    }

    /// Index of the component's placeholder, allocating it on first use
    pub fn intern(&mut self, component: &RuleComponent) -> usize {
        let placeholder = Placeholder {
            p_type: component.p_type,
            type_specific_index: component.type_specific_index,
            flags: placeholder_flags(component.source),
            mapped_tracker_key: component.key_type,
        };
        let key = (placeholder.type_specific_index, placeholder.flags);

        match self.entries.get_index_of(&key) {
            Some(index) => index,
            None => {
                let (index, _) = self
                    .entries
                    .insert_full(key, (placeholder, component.display_name().to_string()));
                log::trace!(
                    "Placeholder {} allocated for '{}' (flags {:#04x})",
                    index,
                    component.display_name(),
                    placeholder.flags
                );
                index
            }
        }
    }

    pub fn placeholders(&self) -> Vec<Placeholder> {
        self.entries.values().map(|(placeholder, _)| *placeholder).collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.values().map(|(_, name)| name.clone()).collect()
    }

    pub fn get(&self, index: usize) -> Option<&Placeholder> {
        self.entries.get_index(index).map(|(_, (placeholder, _))| placeholder)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A literal operand of `N` that is not yet a number
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiteralOperand {
    Text(String),
    Bytes(Vec<u8>),
    Boolean(bool),
    Address(U256),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolicInstruction {
    Opcode(Opcode),
    Value(U256),
    Literal(LiteralOperand),
}

impl SymbolicInstruction {
    fn index(value: usize) -> Self {
        SymbolicInstruction::Value(U256::from(value))
    }
}

impl fmt::Display for SymbolicInstruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SymbolicInstruction::Opcode(opcode) => write!(f, "{}", opcode),
            SymbolicInstruction::Value(value) => write!(f, "{}", value),
            SymbolicInstruction::Literal(LiteralOperand::Text(text)) => {
                write!(f, "{}", render_text(text))
            }
            SymbolicInstruction::Literal(LiteralOperand::Bytes(bytes)) => {
                write!(f, "{}", encode_hex(bytes))
            }
            SymbolicInstruction::Literal(LiteralOperand::Boolean(value)) => write!(f, "{}", value),
            SymbolicInstruction::Literal(LiteralOperand::Address(value)) => {
                write!(f, "{}", render_address(value))
            }
        }
    }
}

/// Encoding state threaded through the tree walk
struct Accumulator<'p> {
    instructions: Vec<SymbolicInstruction>,
    /// Instruction position that wrote each memory slot
    memory: Vec<usize>,
    placeholders: &'p mut PlaceholderCatalog,
    /// Tracker currently being updated; updates do not nest
    update_target: Option<String>,
}

impl<'p> Accumulator<'p> {
    /// Emit a value-producing instruction and return its memory slot
    fn emit(&mut self, opcode: Opcode, operands: Vec<SymbolicInstruction>) -> usize {
        let position = self.instructions.len();
        self.emit_statement(opcode, operands);
        self.memory.push(position);
        self.memory.len() - 1
    }

    /// Emit an instruction that writes no memory slot
    fn emit_statement(&mut self, opcode: Opcode, operands: Vec<SymbolicInstruction>) {
        debug_assert_eq!(opcode.operand_count(), operands.len());
        self.instructions.push(SymbolicInstruction::Opcode(opcode));
        self.instructions.extend(operands);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EncodedExpression {
    pub instructions: Vec<SymbolicInstruction>,
}

pub struct InstructionEncoder<'a> {
    components: &'a ComponentCatalog,
}

impl<'a> InstructionEncoder<'a> {
    pub fn new(components: &'a ComponentCatalog) -> Self {
        InstructionEncoder { components }
    }

    /// Encode a resolved expression, allocating placeholders in `placeholders`
    pub fn encode(
        &self,
        expr: &Expr,
        placeholders: &mut PlaceholderCatalog,
    ) -> Result<EncodedExpression, CompilerError> {
        let mut acc = Accumulator {
            instructions: Vec::new(),
            memory: Vec::new(),
            placeholders,
            update_target: None,
        };

        self.encode_node(expr, &mut acc)?;

        log::debug!(
            "Encoded '{}' into {} instructions over {} slots",
            expr,
            acc.instructions.len(),
            acc.memory.len()
        );

        Ok(EncodedExpression {
            instructions: acc.instructions,
        })
    }

    fn encode_node(&self, expr: &Expr, acc: &mut Accumulator) -> Result<usize, CompilerError> {
        match expr {
            Expr::Number(value) => {
                Ok(acc.emit(Opcode::Number, vec![SymbolicInstruction::Value(*value)]))
            }
            Expr::Address(value) => Ok(self.literal(acc, LiteralOperand::Address(*value))),
            Expr::Text(text) => Ok(self.literal(acc, LiteralOperand::Text(text.clone()))),
            Expr::Bytes(bytes) => Ok(self.literal(acc, LiteralOperand::Bytes(bytes.clone()))),
            Expr::Boolean(value) => Ok(self.literal(acc, LiteralOperand::Boolean(*value))),
            Expr::Identifier(name) => Err(CompilerError::UnresolvedSymbol(
                name.clone(),
                SymbolKind::Argument,
            )),
            Expr::Reference(reference) => {
                let component = self.component(reference)?;
                if let Some(key_type) = component.key_type {
                    return Err(CompilerError::InvalidExpression(format!(
                        "mapped tracker '{}' needs a {} key",
                        component.name, key_type
                    )));
                }
                let index = acc.placeholders.intern(component);
                Ok(acc.emit(Opcode::Placeholder, vec![SymbolicInstruction::index(index)]))
            }
            Expr::Mapped { tracker, key } => {
                let key_slot = self.encode_node(key, acc)?;
                self.read_mapped(tracker, key_slot, acc)
            }
            Expr::Binary {
                left,
                operator,
                right,
            } => {
                if operator.is_tracker_update() {
                    return self.encode_update(left, *operator, right, acc);
                }
                let opcode = self.binary_opcode(*operator)?;
                let left_slot = self.encode_node(left, acc)?;
                let right_slot = self.encode_node(right, acc)?;
                Ok(acc.emit(
                    opcode,
                    vec![
                        SymbolicInstruction::index(left_slot),
                        SymbolicInstruction::index(right_slot),
                    ],
                ))
            }
            Expr::Unary {
                operator: UnaryOp::Not,
                operand,
            } => {
                let slot = self.encode_node(operand, acc)?;
                Ok(acc.emit(Opcode::Not, vec![SymbolicInstruction::index(slot)]))
            }
        }
    }

    fn binary_opcode(&self, operator: BinaryOp) -> Result<Opcode, CompilerError> {
        Opcode::from_binary(operator).ok_or_else(|| {
            CompilerError::InvalidExpression(format!("no opcode for '{}'", operator.symbol()))
        })
    }

    fn literal(&self, acc: &mut Accumulator, literal: LiteralOperand) -> usize {
        acc.emit(Opcode::Number, vec![SymbolicInstruction::Literal(literal)])
    }

    fn component(&self, reference: &Reference) -> Result<&'a RuleComponent, CompilerError> {
        self.components.lookup(reference).ok_or_else(|| {
            let kind = match reference {
                Reference::Argument(_) => SymbolKind::Argument,
                Reference::Tracker(_) => SymbolKind::Tracker,
                Reference::ForeignCall { .. } => SymbolKind::ForeignCall,
                Reference::Global(_) => SymbolKind::GlobalVariable,
            };
            CompilerError::UnresolvedSymbol(reference.to_string(), kind)
        })
    }

    fn tracker_component(&self, tracker: &TrackerRef) -> Result<&'a RuleComponent, CompilerError> {
        self.components
            .get(&ComponentKey::Tracker(tracker.name.clone()))
            .ok_or_else(|| {
                CompilerError::UnresolvedSymbol(format!("TR:{}", tracker.name), SymbolKind::Tracker)
            })
    }

    fn read_mapped(
        &self,
        tracker: &TrackerRef,
        key_slot: usize,
        acc: &mut Accumulator,
    ) -> Result<usize, CompilerError> {
        let component = self.tracker_component(tracker)?;
        if component.key_type.is_none() {
            return Err(CompilerError::InvalidExpression(format!(
                "tracker '{}' is not mapped",
                component.name
            )));
        }
        let index = acc.placeholders.intern(component);
        Ok(acc.emit(
            Opcode::PlaceholderMapped,
            vec![
                SymbolicInstruction::index(index),
                SymbolicInstruction::index(key_slot),
            ],
        ))
    }

    /// `TRU:name op rhs` reads the tracker, applies `=` or the base of a
    /// compound operator to it and rhs, and stores the result. Returns the
    /// slot of the stored value.
    fn encode_update(
        &self,
        target: &Expr,
        operator: BinaryOp,
        value: &Expr,
        acc: &mut Accumulator,
    ) -> Result<usize, CompilerError> {
        let (tracker, key) = match target {
            Expr::Reference(Reference::Tracker(tracker)) => (tracker, None),
            Expr::Mapped { tracker, key } => (tracker, Some(key.as_ref())),
            other => {
                return Err(CompilerError::InvalidExpression(format!(
                    "cannot assign to '{}'",
                    other
                )))
            }
        };

        if let Some(outer) = &acc.update_target {
            return Err(CompilerError::InvalidExpression(format!(
                "update of TRU:{} nested inside update of TRU:{}",
                tracker.name, outer
            )));
        }
        acc.update_target = Some(tracker.name.clone());

        let component = self.tracker_component(tracker)?;
        if component.key_type.is_some() != key.is_some() {
            acc.update_target = None;
            return Err(CompilerError::InvalidExpression(format!(
                "update of '{}' does not match its key shape",
                component.name
            )));
        }
        let tracker_index = component.type_specific_index;
        let key_slot = match key {
            Some(key) => Some(self.encode_node(key, acc)?),
            None => None,
        };

        let current = match key_slot {
            Some(key_slot) => self.read_mapped(tracker, key_slot, acc)?,
            None => {
                let read = Expr::Reference(Reference::Tracker(TrackerRef::read(&tracker.name)));
                self.encode_node(&read, acc)?
            }
        };
        let operand = self.encode_node(value, acc)?;
        let opcode = self.binary_opcode(operator.update_base().unwrap_or(operator))?;
        let value_slot = acc.emit(
            opcode,
            vec![
                SymbolicInstruction::index(current),
                SymbolicInstruction::index(operand),
            ],
        );

        match key_slot {
            Some(key_slot) => acc.emit_statement(
                Opcode::TrackerUpdateMapped,
                vec![
                    SymbolicInstruction::Value(U256::from(tracker_index)),
                    SymbolicInstruction::index(value_slot),
                    SymbolicInstruction::index(key_slot),
                ],
            ),
            None => acc.emit_statement(
                Opcode::TrackerUpdate,
                vec![
                    SymbolicInstruction::Value(U256::from(tracker_index)),
                    SymbolicInstruction::index(value_slot),
                    SymbolicInstruction::index(0),
                ],
            ),
        }

        acc.update_target = None;
        Ok(value_slot)
    }
}

#[cfg(test)]
#[path = "encoder_tests.rs"]
mod tests;

// Reverse Interpreter
//
// Reconstructs the canonical expression text from a numeric instruction
// set. The instruction stream is replayed against a memory of text
// fragments, one per written slot, mirroring how the on-chain interpreter
// fills its value memory. Logical operators are wrapped in "( ... )" when
// they appear as an operand, which reproduces the normalizer's spelling.

use indexmap::IndexMap;
use primitive_types::U256;

use crate::rule_compiler::ast::{render_address, render_text, BinaryOp};
use crate::rule_compiler::error::CompilerError;
use crate::rule_compiler::finalizer::RawDataEntry;
use crate::rule_compiler::lexer::encode_hex;
use crate::rule_compiler::opcodes::{Opcode, OpcodeRegistry};
use crate::rule_compiler::types::PType;

#[derive(Debug, Clone)]
struct Fragment {
    text: String,
    /// AND/OR result; needs parentheses when used as an operand
    grouped: bool,
}

/// How a memory slot was written, kept to recognise tracker updates
#[derive(Debug, Clone, Copy)]
enum SlotOrigin {
    Placeholder(usize),
    Mapped { placeholder: usize, key_slot: usize },
    Binary { opcode: Opcode, left: usize, right: usize },
    Other,
}

pub struct ReverseInterpreter<'a> {
    registry: &'a OpcodeRegistry,
    placeholder_names: &'a [String],
    raw_data: &'a [RawDataEntry],
    tracker_names: Option<&'a IndexMap<u64, String>>,
}

struct Memory {
    fragments: Vec<Fragment>,
    origins: Vec<SlotOrigin>,
}

impl Memory {
    fn write(&mut self, fragment: Fragment, origin: SlotOrigin) {
        self.fragments.push(fragment);
        self.origins.push(origin);
    }

    fn slot(&self, value: &U256, position: usize) -> Result<usize, CompilerError> {
        let slot = value.low_u64() as usize;
        if value.bits() > 64 || slot >= self.fragments.len() {
            return Err(CompilerError::InvalidSlot(slot, position));
        }
        Ok(slot)
    }

    fn text(&self, slot: usize) -> &str {
        &self.fragments[slot].text
    }

    /// Fragment text as an operand of another operator
    fn operand(&self, slot: usize) -> String {
        let fragment = &self.fragments[slot];
        if fragment.grouped {
            format!("( {} )", fragment.text)
        } else {
            fragment.text.clone()
        }
    }
}

impl<'a> ReverseInterpreter<'a> {
    pub fn new(
        registry: &'a OpcodeRegistry,
        placeholder_names: &'a [String],
        raw_data: &'a [RawDataEntry],
    ) -> Self {
        ReverseInterpreter {
            registry,
            placeholder_names,
            raw_data,
            tracker_names: None,
        }
    }

    /// Tracker index to name table used to render `TRU`/`TRUM`
    pub fn with_tracker_names(mut self, tracker_names: &'a IndexMap<u64, String>) -> Self {
        self.tracker_names = Some(tracker_names);
        self
    }

    /// Replay an instruction set and return the text of its final value
    pub fn run(&self, instruction_set: &[U256]) -> Result<String, CompilerError> {
        let mut memory = Memory {
            fragments: Vec::new(),
            origins: Vec::new(),
        };
        let mut result = String::new();
        let mut position = 0;

        while position < instruction_set.len() {
            let code = &instruction_set[position];
            let opcode = (code.bits() <= 64)
                .then(|| self.registry.opcode(code.low_u64()))
                .flatten()
                .ok_or(CompilerError::UnknownOpcode(code.low_u64(), position))?;

            let operand_count = opcode.operand_count();
            if position + operand_count >= instruction_set.len() {
                return Err(CompilerError::MissingOperand(position));
            }
            let operands = &instruction_set[position + 1..=position + operand_count];

            log::trace!("{:>4}: {} {:?}", position, opcode, operands);

            match opcode {
                Opcode::Number => {
                    let text = self.literal_text(position + 1, &operands[0]);
                    memory.write(
                        Fragment {
                            text,
                            grouped: false,
                        },
                        SlotOrigin::Other,
                    );
                }
                Opcode::Placeholder => {
                    let placeholder = operands[0].low_u64() as usize;
                    let name = self.placeholder_name(&operands[0])?;
                    memory.write(
                        Fragment {
                            text: name.to_string(),
                            grouped: false,
                        },
                        SlotOrigin::Placeholder(placeholder),
                    );
                }
                Opcode::PlaceholderMapped => {
                    let placeholder = operands[0].low_u64() as usize;
                    let name = self.placeholder_name(&operands[0])?;
                    let key_slot = memory.slot(&operands[1], position)?;
                    let text = format!("{}({})", name, memory.text(key_slot));
                    memory.write(
                        Fragment {
                            text,
                            grouped: false,
                        },
                        SlotOrigin::Mapped {
                            placeholder,
                            key_slot,
                        },
                    );
                }
                Opcode::Not => {
                    let slot = memory.slot(&operands[0], position)?;
                    let text = format!("NOT {}", memory.operand(slot));
                    memory.write(
                        Fragment {
                            text,
                            grouped: false,
                        },
                        SlotOrigin::Other,
                    );
                }
                Opcode::TrackerUpdate | Opcode::TrackerUpdateMapped => {
                    let value_slot = memory.slot(&operands[1], position)?;
                    let key_slot = match opcode {
                        Opcode::TrackerUpdateMapped => Some(memory.slot(&operands[2], position)?),
                        _ => None,
                    };
                    // an update writes no slot; without a tracker name it
                    // contributes no text either
                    if let Some(text) =
                        self.render_update(&memory, &operands[0], value_slot, key_slot)
                    {
                        result = text;
                    }
                    position += operand_count + 1;
                    continue;
                }
                binary => {
                    let left = memory.slot(&operands[0], position)?;
                    let right = memory.slot(&operands[1], position)?;
                    let text = format!(
                        "{} {} {}",
                        memory.operand(left),
                        binary.symbol(),
                        memory.operand(right)
                    );
                    memory.write(
                        Fragment {
                            text,
                            grouped: matches!(binary, Opcode::And | Opcode::Or),
                        },
                        SlotOrigin::Binary {
                            opcode: binary,
                            left,
                            right,
                        },
                    );
                }
            }

            if let Some(fragment) = memory.fragments.last() {
                result = fragment.text.clone();
            }
            position += operand_count + 1;
        }

        log::debug!("Reverse interpreted {} words: '{}'", instruction_set.len(), result);
        Ok(result)
    }

    fn placeholder_name(&self, operand: &U256) -> Result<&'a str, CompilerError> {
        let index = operand.low_u64() as usize;
        if operand.bits() > 64 {
            return Err(CompilerError::MissingPlaceholderName(index));
        }
        self.placeholder_names
            .get(index)
            .map(String::as_str)
            .ok_or(CompilerError::MissingPlaceholderName(index))
    }

    /// Literal operand text, recovered from raw data where the operand is a
    /// hash or an address
    fn literal_text(&self, operand_position: usize, value: &U256) -> String {
        let raw = self
            .raw_data
            .iter()
            .find(|entry| entry.instruction_set_index == operand_position);

        match raw {
            Some(entry) => match entry.argument_type {
                PType::String => render_text(&String::from_utf8_lossy(&entry.data_value)),
                PType::Bytes => encode_hex(&entry.data_value),
                PType::Address => render_address(value),
                _ => value.to_string(),
            },
            None => value.to_string(),
        }
    }

    fn render_update(
        &self,
        memory: &Memory,
        tracker_index: &U256,
        value_slot: usize,
        key_slot: Option<usize>,
    ) -> Option<String> {
        let read_update = match memory.origins[value_slot] {
            SlotOrigin::Binary {
                opcode,
                left,
                right,
            } => {
                let read = match (memory.origins[left], key_slot) {
                    (SlotOrigin::Placeholder(placeholder), None) => Some(placeholder),
                    (
                        SlotOrigin::Mapped {
                            placeholder,
                            key_slot: read_key,
                        },
                        Some(key_slot),
                    ) if read_key == key_slot => Some(placeholder),
                    _ => None,
                };
                let update = opcode.binary_operator().and_then(|op| match op {
                    BinaryOp::Assign => Some(BinaryOp::Assign),
                    other => other.compound_of(),
                });
                match (read, update) {
                    (Some(placeholder), Some(update)) => Some((placeholder, update, right)),
                    _ => None,
                }
            }
            _ => None,
        };

        let name =
            self.tracker_name(tracker_index, read_update.map(|(placeholder, _, _)| placeholder))?;

        // the value must be computed from a read of the tracker it writes
        let read_update = read_update.filter(|(placeholder, _, _)| {
            self.placeholder_names.get(*placeholder).map(String::as_str)
                == Some(format!("TR:{}", name).as_str())
        });

        let target = match key_slot {
            Some(key_slot) => format!("TRU:{}({})", name, memory.text(key_slot)),
            None => format!("TRU:{}", name),
        };

        Some(match read_update {
            Some((_, operator, right)) => {
                format!("{} {} {}", target, operator.symbol(), memory.operand(right))
            }
            None => format!("{} = {}", target, memory.text(value_slot)),
        })
    }

    /// Name from the tracker table, or from the placeholder the update
    /// reads
    fn tracker_name(
        &self,
        tracker_index: &U256,
        read_placeholder: Option<usize>,
    ) -> Option<String> {
        let index = tracker_index.low_u64();
        if let Some(name) = self.tracker_names.and_then(|names| names.get(&index)) {
            return Some(name.clone());
        }

        let name = read_placeholder
            .and_then(|placeholder| self.placeholder_names.get(placeholder))
            .and_then(|name| name.strip_prefix("TR:"))
            .map(str::to_string);
        if name.is_none() {
            log::debug!("No name for tracker index {}; update left unrendered", index);
        }
        name
    }
}

#[cfg(test)]
#[path = "decompiler_tests.rs"]
mod tests;

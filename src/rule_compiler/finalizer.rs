// Literal Finalizer
//
// Turns a symbolic instruction list into the numeric instruction set that
// is submitted on-chain. Two passes:
//
// 1. Opcodes are replaced by their numeric codes from the registry.
// 2. Non-numeric literals are replaced: booleans by 0/1, addresses keep
//    their numeric value, strings and bytes by the keccak256 of their ABI
//    encoding. Every string, bytes and address literal also gets a raw data
//    entry so the original value can be recovered.

use primitive_types::U256;
use serde::{Deserialize, Serialize};

use crate::rule_compiler::abi::{self, bytes_hex, u256_hex_vec};
use crate::rule_compiler::encoder::{LiteralOperand, SymbolicInstruction};
use crate::rule_compiler::error::CompilerError;
use crate::rule_compiler::opcodes::OpcodeRegistry;
use crate::rule_compiler::types::PType;

/// Original value of a literal whose instruction-set operand is a hash or
/// an address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDataEntry {
    /// Position of the operand in the instruction set
    pub instruction_set_index: usize,
    pub argument_type: PType,
    #[serde(with = "bytes_hex")]
    pub data_value: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizedInstructionSet {
    #[serde(with = "u256_hex_vec")]
    pub instruction_set: Vec<U256>,
    pub raw_data: Vec<RawDataEntry>,
}

/// Instruction-set element after opcode numbering
enum Operand {
    Numeric(U256),
    Literal(LiteralOperand),
}

pub fn finalize(
    instructions: &[SymbolicInstruction],
    registry: &OpcodeRegistry,
) -> Result<FinalizedInstructionSet, CompilerError> {
    let numbered = number_opcodes(instructions, registry)?;
    let finalized = replace_literals(numbered);

    log::debug!(
        "Finalized {} instructions with {} raw data entries",
        finalized.instruction_set.len(),
        finalized.raw_data.len()
    );

    Ok(finalized)
}

fn number_opcodes(
    instructions: &[SymbolicInstruction],
    registry: &OpcodeRegistry,
) -> Result<Vec<Operand>, CompilerError> {
    instructions
        .iter()
        .map(|instruction| match instruction {
            SymbolicInstruction::Opcode(opcode) => {
                Ok(Operand::Numeric(U256::from(registry.code(*opcode)?)))
            }
            SymbolicInstruction::Value(value) => Ok(Operand::Numeric(*value)),
            SymbolicInstruction::Literal(literal) => Ok(Operand::Literal(literal.clone())),
        })
        .collect()
}

fn replace_literals(operands: Vec<Operand>) -> FinalizedInstructionSet {
    let mut finalized = FinalizedInstructionSet::default();

    for (index, operand) in operands.into_iter().enumerate() {
        let value = match operand {
            Operand::Numeric(value) => value,
            Operand::Literal(LiteralOperand::Boolean(flag)) => U256::from(flag as u8),
            Operand::Literal(LiteralOperand::Address(value)) => {
                finalized.raw_data.push(RawDataEntry {
                    instruction_set_index: index,
                    argument_type: PType::Address,
                    data_value: abi::address_bytes(&value),
                });
                value
            }
            Operand::Literal(LiteralOperand::Text(text)) => {
                let data = text.into_bytes();
                let hash = abi::literal_hash(&data);
                finalized.raw_data.push(RawDataEntry {
                    instruction_set_index: index,
                    argument_type: PType::String,
                    data_value: data,
                });
                hash
            }
            Operand::Literal(LiteralOperand::Bytes(data)) => {
                let hash = abi::literal_hash(&data);
                finalized.raw_data.push(RawDataEntry {
                    instruction_set_index: index,
                    argument_type: PType::Bytes,
                    data_value: data,
                });
                hash
            }
        };
        finalized.instruction_set.push(value);
    }

    finalized
}

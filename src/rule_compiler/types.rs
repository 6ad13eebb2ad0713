// Value types and calling-function signatures
//
// The pType enumeration is shared with the on-chain interpreter, so the
// numeric values below are part of the wire contract.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::rule_compiler::error::CompilerError;

/// Value type of a placeholder, tracker, foreign-call parameter or raw literal.
/// Serialized as its numeric enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum PType {
    Address,
    String,
    Uint256,
    Bool,
    Void,
    Bytes,
    StaticTypeArray,
    DynamicTypeArray,
}

impl PType {
    /// Numeric enumeration used by the on-chain interpreter
    pub fn enumeration(self) -> u8 {
        match self {
            PType::Address => 0,
            PType::String => 1,
            PType::Uint256 => 2,
            PType::Bool => 3,
            PType::Void => 4,
            PType::Bytes => 5,
            PType::StaticTypeArray => 6,
            PType::DynamicTypeArray => 7,
        }
    }

    pub fn from_enumeration(value: u8) -> Option<PType> {
        match value {
            0 => Some(PType::Address),
            1 => Some(PType::String),
            2 => Some(PType::Uint256),
            3 => Some(PType::Bool),
            4 => Some(PType::Void),
            5 => Some(PType::Bytes),
            6 => Some(PType::StaticTypeArray),
            7 => Some(PType::DynamicTypeArray),
            _ => None,
        }
    }

    /// Whether the ABI encodes this type in place (one 32-byte word)
    pub fn is_static(self) -> bool {
        matches!(self, PType::Address | PType::Uint256 | PType::Bool)
    }
}

impl From<PType> for u8 {
    fn from(p_type: PType) -> u8 {
        p_type.enumeration()
    }
}

impl TryFrom<u8> for PType {
    type Error = CompilerError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        PType::from_enumeration(value)
            .ok_or_else(|| CompilerError::UnsupportedType(format!("pType {}", value)))
    }
}

impl FromStr for PType {
    type Err = CompilerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Some(element) = trimmed.strip_suffix("[]") {
            let element_type: PType = element.parse()?;
            return match element_type {
                PType::Address | PType::Uint256 | PType::Bool => Ok(PType::StaticTypeArray),
                PType::String | PType::Bytes => Ok(PType::DynamicTypeArray),
                // nested arrays and void[] have no on-chain representation
                _ => Err(CompilerError::UnsupportedType(trimmed.to_string())),
            };
        }

        match trimmed {
            "address" => Ok(PType::Address),
            "string" => Ok(PType::String),
            "uint256" | "uint" => Ok(PType::Uint256),
            "bool" => Ok(PType::Bool),
            "void" => Ok(PType::Void),
            "bytes" => Ok(PType::Bytes),
            _ => Err(CompilerError::UnsupportedType(trimmed.to_string())),
        }
    }
}

impl fmt::Display for PType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            PType::Address => "address",
            PType::String => "string",
            PType::Uint256 => "uint256",
            PType::Bool => "bool",
            PType::Void => "void",
            PType::Bytes => "bytes",
            PType::StaticTypeArray => "static type array",
            PType::DynamicTypeArray => "dynamic type array",
        };
        write!(f, "{}", name)
    }
}

/// One declared argument of the calling function
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionArgument {
    pub name: String,
    /// Declared type as written, e.g. `uint256[]`
    pub raw_type: String,
    pub p_type: PType,
}

/// The function whose invocation a rule guards
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallingFunction {
    pub name: Option<String>,
    pub arguments: Vec<FunctionArgument>,
}

impl CallingFunction {
    /// Parse `"transfer(address to, uint256 value)"` or the bare argument
    /// list `"address to, uint256 value"`.
    pub fn parse(signature: &str) -> Result<Self, CompilerError> {
        let signature = signature.trim();

        let (name, argument_list) = match signature.find('(') {
            Some(open) => {
                let close = signature.rfind(')').ok_or_else(|| {
                    CompilerError::MalformedExpression(signature.to_string(), signature.len())
                })?;
                if close < open {
                    return Err(CompilerError::MalformedExpression(
                        signature.to_string(),
                        close,
                    ));
                }
                let name = signature[..open].trim();
                (
                    (!name.is_empty()).then(|| name.to_string()),
                    &signature[open + 1..close],
                )
            }
            None => (None, signature),
        };

        let mut arguments = Vec::new();
        for declaration in argument_list.split(',') {
            let declaration = declaration.trim();
            if declaration.is_empty() {
                continue;
            }

            let mut parts = declaration.split_whitespace();
            let raw_type = parts.next().unwrap_or_default();
            // storage location keywords carry no type information
            let arg_name = parts
                .filter(|word| !matches!(*word, "memory" | "calldata" | "storage"))
                .last()
                .ok_or_else(|| {
                    CompilerError::MalformedExpression(declaration.to_string(), 0)
                })?;

            arguments.push(FunctionArgument {
                name: arg_name.to_string(),
                raw_type: raw_type.to_string(),
                p_type: raw_type.parse()?,
            });
        }

        log::debug!(
            "Parsed calling function {:?} with {} arguments",
            name,
            arguments.len()
        );

        Ok(CallingFunction { name, arguments })
    }

    /// Declared position of an argument, which is its type-specific index
    pub fn position_of(&self, name: &str) -> Option<usize> {
        self.arguments.iter().position(|arg| arg.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ptype_enumeration_is_stable() {
        for value in 0..8u8 {
            let p_type = PType::from_enumeration(value).unwrap();
            assert_eq!(p_type.enumeration(), value);
        }
        assert_eq!(PType::from_enumeration(8), None);
    }

    #[test]
    fn test_array_types() {
        assert_eq!("uint256[]".parse::<PType>(), Ok(PType::StaticTypeArray));
        assert_eq!("address[]".parse::<PType>(), Ok(PType::StaticTypeArray));
        assert_eq!("string[]".parse::<PType>(), Ok(PType::DynamicTypeArray));
        assert_eq!("bytes[]".parse::<PType>(), Ok(PType::DynamicTypeArray));
        assert!(matches!(
            "uint256[][]".parse::<PType>(),
            Err(CompilerError::UnsupportedType(_))
        ));
    }

    #[test]
    fn test_unsupported_type() {
        assert_eq!(
            "uint8".parse::<PType>(),
            Err(CompilerError::UnsupportedType("uint8".to_string()))
        );
    }

    #[test]
    fn test_parse_full_signature() {
        let function = CallingFunction::parse("transfer(address to, uint256 value)").unwrap();
        assert_eq!(function.name.as_deref(), Some("transfer"));
        assert_eq!(function.arguments.len(), 2);
        assert_eq!(function.arguments[0].name, "to");
        assert_eq!(function.arguments[0].p_type, PType::Address);
        assert_eq!(function.arguments[1].name, "value");
        assert_eq!(function.arguments[1].p_type, PType::Uint256);
        assert_eq!(function.position_of("value"), Some(1));
    }

    #[test]
    fn test_parse_bare_argument_list() {
        let function = CallingFunction::parse("string memory label, bytes data").unwrap();
        assert_eq!(function.name, None);
        assert_eq!(function.arguments[0].name, "label");
        assert_eq!(function.arguments[0].p_type, PType::String);
        assert_eq!(function.arguments[1].p_type, PType::Bytes);
    }

    #[test]
    fn test_parse_rejects_unknown_argument_type() {
        let result = CallingFunction::parse("mint(int128 amount)");
        assert_eq!(
            result,
            Err(CompilerError::UnsupportedType("int128".to_string()))
        );
    }

    #[test]
    fn test_parse_empty_argument_list() {
        let function = CallingFunction::parse("pause()").unwrap();
        assert!(function.arguments.is_empty());
    }
}

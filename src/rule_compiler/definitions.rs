// Tracker and Foreign Call Definitions
//
// Encodes the definitions that are registered on-chain next to a rule:
// tracker initial values, mapped tracker initial entries, and foreign call
// signatures with the values they pass.

use indexmap::IndexSet;
use primitive_types::U256;
use serde::{Deserialize, Serialize};

use crate::rule_compiler::abi::{self, bytes_hex, bytes_hex_vec, u256_hex};
use crate::rule_compiler::ast::GlobalVariable;
use crate::rule_compiler::encoder::global_flag;
use crate::rule_compiler::error::{CompilerError, SymbolKind};
use crate::rule_compiler::lexer::decode_hex;
use crate::rule_compiler::resolver::SymbolTables;
use crate::rule_compiler::types::{CallingFunction, PType};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub tracker_type: String,
    pub initial_value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodedTracker {
    pub name: String,
    pub p_type: PType,
    #[serde(with = "bytes_hex")]
    pub initial_value: Vec<u8>,
}

impl TrackerDefinition {
    pub fn encode(&self) -> Result<EncodedTracker, CompilerError> {
        let (p_type, initial_value) = encode_value(&self.tracker_type, &self.initial_value)?;

        log::debug!(
            "Encoded tracker '{}' ({}) initial value into {} bytes",
            self.name,
            p_type,
            initial_value.len()
        );

        Ok(EncodedTracker {
            name: self.name.clone(),
            p_type,
            initial_value,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappedTrackerDefinition {
    pub name: String,
    pub key_type: String,
    pub value_type: String,
    #[serde(default)]
    pub initial_keys: Vec<String>,
    #[serde(default)]
    pub initial_values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodedMappedTracker {
    pub name: String,
    pub key_type: PType,
    pub value_type: PType,
    #[serde(with = "bytes_hex_vec")]
    pub initial_keys: Vec<Vec<u8>>,
    #[serde(with = "bytes_hex_vec")]
    pub initial_values: Vec<Vec<u8>>,
}

impl MappedTrackerDefinition {
    pub fn encode(&self) -> Result<EncodedMappedTracker, CompilerError> {
        if self.initial_keys.len() != self.initial_values.len() {
            return Err(CompilerError::InvalidDefaultValue(
                format!(
                    "{} keys for {} values",
                    self.initial_keys.len(),
                    self.initial_values.len()
                ),
                format!("one value per key of '{}'", self.name),
            ));
        }

        let key_type: PType = self.key_type.parse()?;
        if !(key_type.is_static() || matches!(key_type, PType::String | PType::Bytes)) {
            return Err(CompilerError::UnsupportedType(self.key_type.clone()));
        }
        let value_type: PType = self.value_type.parse()?;
        if value_type == PType::Void {
            return Err(CompilerError::UnsupportedType(self.value_type.clone()));
        }

        let mut seen = IndexSet::new();
        let mut initial_keys = Vec::with_capacity(self.initial_keys.len());
        for key in &self.initial_keys {
            let (_, encoded) = encode_value(&self.key_type, key)?;
            if !seen.insert(encoded.clone()) {
                return Err(CompilerError::InvalidDefaultValue(
                    key.clone(),
                    format!("unique {} key", key_type),
                ));
            }
            initial_keys.push(encoded);
        }

        let initial_values = self
            .initial_values
            .iter()
            .map(|value| encode_value(&self.value_type, value).map(|(_, encoded)| encoded))
            .collect::<Result<Vec<_>, _>>()?;

        log::debug!(
            "Encoded mapped tracker '{}' with {} initial entries",
            self.name,
            initial_keys.len()
        );

        Ok(EncodedMappedTracker {
            name: self.name.clone(),
            key_type,
            value_type,
            initial_keys,
            initial_values,
        })
    }
}

/// Encode a value of a declared type as its ABI representation
fn encode_value(type_name: &str, value: &str) -> Result<(PType, Vec<u8>), CompilerError> {
    let type_name = type_name.trim();
    let p_type: PType = type_name.parse()?;

    let encoded = match p_type {
        PType::Address | PType::Uint256 | PType::Bool => static_word(p_type, value)?,
        PType::String | PType::Bytes => abi::encode_dynamic(&dynamic_data(p_type, value)?),
        PType::StaticTypeArray | PType::DynamicTypeArray => {
            let element = element_type(type_name)?;
            let items = split_array(type_name, value)?;
            if p_type == PType::StaticTypeArray {
                let words = items
                    .iter()
                    .map(|item| static_word(element, item))
                    .collect::<Result<Vec<_>, _>>()?;
                abi::encode_static_array(&words)
            } else {
                let data = items
                    .iter()
                    .map(|item| dynamic_data(element, item))
                    .collect::<Result<Vec<_>, _>>()?;
                abi::encode_dynamic_array(&data)
            }
        }
        PType::Void => return Err(CompilerError::UnsupportedType(type_name.to_string())),
    };

    Ok((p_type, encoded))
}

fn invalid(value: &str, p_type: PType) -> CompilerError {
    CompilerError::InvalidDefaultValue(value.to_string(), p_type.to_string())
}

fn static_word(p_type: PType, value: &str) -> Result<Vec<u8>, CompilerError> {
    let trimmed = value.trim();
    match p_type {
        PType::Uint256 => {
            let parsed = match trimmed.strip_prefix("0x") {
                Some(digits) => U256::from_str_radix(digits, 16).ok(),
                None => U256::from_dec_str(trimmed).ok(),
            };
            parsed
                .map(|number| abi::encode_uint(&number))
                .ok_or_else(|| invalid(value, p_type))
        }
        PType::Address => parse_address(trimmed)
            .map(|address| abi::encode_uint(&address))
            .ok_or_else(|| invalid(value, p_type)),
        PType::Bool => match trimmed {
            "true" => Ok(abi::encode_bool(true)),
            "false" => Ok(abi::encode_bool(false)),
            _ => Err(invalid(value, p_type)),
        },
        _ => Err(CompilerError::UnsupportedType(p_type.to_string())),
    }
}

fn dynamic_data(p_type: PType, value: &str) -> Result<Vec<u8>, CompilerError> {
    match p_type {
        PType::String => Ok(strip_quotes(value.trim()).as_bytes().to_vec()),
        PType::Bytes => value
            .trim()
            .strip_prefix("0x")
            .and_then(decode_hex)
            .ok_or_else(|| invalid(value, p_type)),
        _ => Err(CompilerError::UnsupportedType(p_type.to_string())),
    }
}

/// `0x` followed by exactly 40 hex digits
pub fn parse_address(text: &str) -> Option<U256> {
    let digits = text.strip_prefix("0x")?;
    if digits.len() != 40 || decode_hex(digits).is_none() {
        return None;
    }
    U256::from_str_radix(digits, 16).ok()
}

fn element_type(type_name: &str) -> Result<PType, CompilerError> {
    type_name
        .strip_suffix("[]")
        .ok_or_else(|| CompilerError::UnsupportedType(type_name.to_string()))?
        .parse()
}

/// Items of `[a, b, "c, d"]`; commas inside quotes do not split
fn split_array(type_name: &str, value: &str) -> Result<Vec<String>, CompilerError> {
    let inner = value
        .trim()
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .ok_or_else(|| {
            CompilerError::InvalidDefaultValue(value.to_string(), type_name.to_string())
        })?;

    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut items = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    for ch in inner.chars() {
        match (quote, ch) {
            (None, ',') => {
                items.push(current.trim().to_string());
                current.clear();
                continue;
            }
            (None, '"' | '\'') => quote = Some(ch),
            (Some(open), _) if ch == open => quote = None,
            _ => {}
        }
        current.push(ch);
    }
    if quote.is_some() {
        return Err(CompilerError::InvalidDefaultValue(
            value.to_string(),
            type_name.to_string(),
        ));
    }
    items.push(current.trim().to_string());

    Ok(items)
}

fn strip_quotes(text: &str) -> &str {
    for quote in ['"', '\''] {
        if text.len() >= 2 && text.starts_with(quote) && text.ends_with(quote) {
            return &text[1..text.len() - 1];
        }
    }
    text
}

/// Where a foreign call takes one of its parameter values from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum ValueSource {
    Argument,
    ForeignCall,
    Tracker,
    Global,
}

impl From<ValueSource> for u8 {
    fn from(source: ValueSource) -> u8 {
        match source {
            ValueSource::Argument => 0,
            ValueSource::ForeignCall => 1,
            ValueSource::Tracker => 2,
            ValueSource::Global => 3,
        }
    }
}

impl TryFrom<u8> for ValueSource {
    type Error = CompilerError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ValueSource::Argument),
            1 => Ok(ValueSource::ForeignCall),
            2 => Ok(ValueSource::Tracker),
            3 => Ok(ValueSource::Global),
            _ => Err(CompilerError::ConfigError(format!(
                "unknown value source {}",
                value
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodedIndex {
    pub index: u64,
    pub source: ValueSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeignCallDefinition {
    pub name: String,
    pub address: String,
    /// Solidity signature, e.g. `balanceOf(address)`
    pub function: String,
    pub return_type: String,
    /// Comma-separated values passed as the call's parameters
    #[serde(default)]
    pub values_to_pass: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodedForeignCall {
    pub name: String,
    #[serde(with = "u256_hex")]
    pub address: U256,
    pub signature: String,
    #[serde(with = "bytes_hex")]
    pub selector: Vec<u8>,
    pub parameter_types: Vec<PType>,
    pub return_type: PType,
    pub encoded_indices: Vec<EncodedIndex>,
}

impl ForeignCallDefinition {
    pub fn encode(
        &self,
        function: &CallingFunction,
        tables: &SymbolTables,
    ) -> Result<EncodedForeignCall, CompilerError> {
        let address = parse_address(self.address.trim())
            .ok_or_else(|| invalid(&self.address, PType::Address))?;
        let (signature, parameter_types) = canonical_signature(&self.function)?;
        let return_type: PType = self.return_type.parse()?;

        let values: Vec<&str> = self
            .values_to_pass
            .split(',')
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .collect();
        if values.len() != parameter_types.len() {
            return Err(CompilerError::MalformedExpression(
                format!(
                    "{} takes {} parameters but {} values are passed",
                    signature,
                    parameter_types.len(),
                    values.len()
                ),
                0,
            ));
        }

        let encoded_indices = values
            .iter()
            .map(|value| encode_index(value, function, tables))
            .collect::<Result<Vec<_>, _>>()?;

        log::debug!(
            "Encoded foreign call '{}' -> {} with {} parameters",
            self.name,
            signature,
            parameter_types.len()
        );

        Ok(EncodedForeignCall {
            name: self.name.clone(),
            address,
            selector: abi::selector(&signature).to_vec(),
            signature,
            parameter_types,
            return_type,
            encoded_indices,
        })
    }
}

/// `name(type, ...)` with optional parameter names, as `name(type,...)`
fn canonical_signature(function: &str) -> Result<(String, Vec<PType>), CompilerError> {
    let function = function.trim();
    let malformed = || CompilerError::MalformedExpression(function.to_string(), 0);

    let open = function.find('(').ok_or_else(malformed)?;
    let parameters = function[open + 1..].strip_suffix(')').ok_or_else(malformed)?;
    let name = function[..open].trim();
    if name.is_empty() {
        return Err(malformed());
    }

    let mut types = Vec::new();
    let mut p_types = Vec::new();
    for parameter in parameters.split(',') {
        let Some(raw_type) = parameter.split_whitespace().next() else {
            continue;
        };
        p_types.push(raw_type.parse::<PType>()?);
        types.push(canonical_type(raw_type));
    }

    Ok((format!("{}({})", name, types.join(",")), p_types))
}

fn canonical_type(raw_type: &str) -> String {
    match raw_type.strip_suffix("[]") {
        Some(element) => format!("{}[]", canonical_type(element)),
        None if raw_type == "uint" => "uint256".to_string(),
        None => raw_type.to_string(),
    }
}

fn encode_index(
    value: &str,
    function: &CallingFunction,
    tables: &SymbolTables,
) -> Result<EncodedIndex, CompilerError> {
    if let Some(name) = value.strip_prefix("FC:") {
        return tables
            .foreign_calls
            .get(name)
            .map(|symbol| EncodedIndex {
                index: symbol.index,
                source: ValueSource::ForeignCall,
            })
            .ok_or_else(|| CompilerError::UnresolvedSymbol(value.to_string(), SymbolKind::ForeignCall));
    }

    if let Some(name) = value.strip_prefix("TR:") {
        return tables
            .trackers
            .get(name)
            .map(|symbol| EncodedIndex {
                index: symbol.index,
                source: ValueSource::Tracker,
            })
            .ok_or_else(|| CompilerError::UnresolvedSymbol(value.to_string(), SymbolKind::Tracker));
    }

    if let Some(name) = value.strip_prefix("GV:") {
        return GlobalVariable::from_name(name)
            .map(|global| EncodedIndex {
                index: global_flag(global) as u64,
                source: ValueSource::Global,
            })
            .ok_or_else(|| {
                CompilerError::UnresolvedSymbol(value.to_string(), SymbolKind::GlobalVariable)
            });
    }

    function
        .position_of(value)
        .map(|position| EncodedIndex {
            index: position as u64,
            source: ValueSource::Argument,
        })
        .ok_or_else(|| CompilerError::UnresolvedSymbol(value.to_string(), SymbolKind::Argument))
}

#[cfg(test)]
#[path = "definitions_tests.rs"]
mod tests;

// Effect Classifier
//
// Each positive or negative effect clause is one of:
//
//   revert                       revert("message")
//   emit Name                    emit Name, parameter
//   <expression>                 e.g. TRU:count += 1
//
// Expression effects of one rule share a single component catalog and a
// single placeholder catalog, so two effects that touch the same tracker
// or foreign call refer to the same placeholder.

use indexmap::IndexMap;
use primitive_types::U256;
use serde::{Deserialize, Serialize};

use crate::rule_compiler::abi::{self, u256_hex, u256_hex_vec};
use crate::rule_compiler::ast::{render_address, Expr};
use crate::rule_compiler::decompiler::ReverseInterpreter;
use crate::rule_compiler::encoder::{InstructionEncoder, PlaceholderCatalog};
use crate::rule_compiler::error::CompilerError;
use crate::rule_compiler::finalizer::{self, RawDataEntry};
use crate::rule_compiler::lexer::decode_hex;
use crate::rule_compiler::normalizer::normalize;
use crate::rule_compiler::opcodes::OpcodeRegistry;
use crate::rule_compiler::parser::parse_expression;
use crate::rule_compiler::resolver::{ComponentCatalog, Resolver};
use crate::rule_compiler::types::PType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EffectType {
    Revert,
    Event,
    Expression,
}

/// The single typed parameter an event may carry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum EventParameter {
    Address(#[serde(with = "u256_hex")] U256),
    Uint256(#[serde(with = "u256_hex")] U256),
    Text(String),
}

impl EventParameter {
    /// Type inferred by trial: address, then number, then string
    pub fn infer(text: &str) -> EventParameter {
        let text = text.trim();

        if let Some(digits) = text.strip_prefix("0x") {
            if digits.len() == 40 && decode_hex(digits).is_some() {
                if let Ok(value) = U256::from_str_radix(digits, 16) {
                    return EventParameter::Address(value);
                }
            }
        }

        if !text.is_empty() && text.chars().all(|ch| ch.is_ascii_digit()) {
            if let Ok(value) = U256::from_dec_str(text) {
                return EventParameter::Uint256(value);
            }
        }

        EventParameter::Text(strip_quotes(text).to_string())
    }

    pub fn p_type(&self) -> PType {
        match self {
            EventParameter::Address(_) => PType::Address,
            EventParameter::Uint256(_) => PType::Uint256,
            EventParameter::Text(_) => PType::String,
        }
    }

    /// ABI encoding of the parameter value
    pub fn abi_encoded(&self) -> Vec<u8> {
        match self {
            EventParameter::Address(value) | EventParameter::Uint256(value) => {
                abi::encode_uint(value)
            }
            EventParameter::Text(text) => abi::encode_dynamic(text.as_bytes()),
        }
    }

    pub fn render(&self) -> String {
        match self {
            EventParameter::Address(value) => render_address(value),
            EventParameter::Uint256(value) => value.to_string(),
            EventParameter::Text(text) => text.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Effect {
    pub effect_type: EffectType,
    /// Revert message, event name, or the canonical expression text
    pub text: String,
    #[serde(with = "u256_hex_vec")]
    pub instruction_set: Vec<U256>,
    pub raw_data: Vec<RawDataEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p_type: Option<PType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter_value: Option<EventParameter>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EffectClause {
    Revert { message: String },
    Event {
        name: String,
        parameter: Option<EventParameter>,
    },
    Expression(String),
}

/// Classify an effect clause by its leading keyword
pub fn classify(clause: &str) -> Result<EffectClause, CompilerError> {
    let clause = clause.trim();

    if let Some(rest) = after_keyword(clause, "revert") {
        return parse_revert(clause, rest);
    }

    if let Some(rest) = after_keyword(clause, "emit") {
        let (name, parameter) = match rest.split_once(',') {
            Some((name, parameter)) => (name.trim(), parameter.trim()),
            None => (rest, ""),
        };
        if name.is_empty() {
            return Err(CompilerError::MalformedExpression(
                format!("event without a name: '{}'", clause),
                0,
            ));
        }
        return Ok(EffectClause::Event {
            name: name.to_string(),
            parameter: (!parameter.is_empty()).then(|| EventParameter::infer(parameter)),
        });
    }

    Ok(EffectClause::Expression(clause.to_string()))
}

/// Text following a leading keyword, if the clause starts with that word
fn after_keyword<'c>(clause: &'c str, keyword: &str) -> Option<&'c str> {
    let rest = clause.strip_prefix(keyword)?;
    match rest.chars().next() {
        None => Some(rest),
        Some(ch) if ch == '(' || ch.is_whitespace() => Some(rest.trim()),
        Some(_) => None,
    }
}

fn parse_revert(clause: &str, rest: &str) -> Result<EffectClause, CompilerError> {
    if rest.is_empty() {
        return Ok(EffectClause::Revert {
            message: String::new(),
        });
    }

    let inner = rest
        .strip_prefix('(')
        .and_then(|inner| inner.strip_suffix(')'))
        .ok_or_else(|| {
            CompilerError::MalformedExpression(
                format!("expected revert(\"message\"), found '{}'", clause),
                0,
            )
        })?;

    Ok(EffectClause::Revert {
        message: strip_quotes(inner.trim()).to_string(),
    })
}

fn strip_quotes(text: &str) -> &str {
    for quote in ['"', '\''] {
        if text.len() >= 2 && text.starts_with(quote) && text.ends_with(quote) {
            return &text[1..text.len() - 1];
        }
    }
    text
}

/// Effects of one rule, with the catalogs they share
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledEffects {
    pub positive: Vec<Effect>,
    pub negative: Vec<Effect>,
    pub components: ComponentCatalog,
    pub placeholders: PlaceholderCatalog,
}

pub fn compile_effects(
    positive: &[String],
    negative: &[String],
    resolver: &Resolver,
    registry: &OpcodeRegistry,
) -> Result<CompiledEffects, CompilerError> {
    let mut compiled = CompiledEffects::default();

    let positive_clauses = classify_all(positive)?;
    let negative_clauses = classify_all(negative)?;

    // Resolve every expression first so the pooled catalog is complete
    // before any placeholder is allocated.
    let mut resolved: Vec<Option<Expr>> = Vec::new();
    for clause in positive_clauses.iter().chain(negative_clauses.iter()) {
        let expr = match clause {
            EffectClause::Expression(source) => Some(
                resolver.resolve_into(parse_expression(source)?, &mut compiled.components)?,
            ),
            _ => None,
        };
        resolved.push(expr);
    }

    let encoder = InstructionEncoder::new(&compiled.components);
    let mut placeholders = PlaceholderCatalog::new();
    let mut effects = Vec::with_capacity(resolved.len());

    for (clause, expr) in positive_clauses
        .iter()
        .chain(negative_clauses.iter())
        .zip(resolved.iter())
    {
        let effect = match (clause, expr) {
            (EffectClause::Revert { message }, _) => Effect {
                effect_type: EffectType::Revert,
                text: message.clone(),
                instruction_set: Vec::new(),
                raw_data: Vec::new(),
                p_type: None,
                parameter_value: None,
            },
            (EffectClause::Event { name, parameter }, _) => Effect {
                effect_type: EffectType::Event,
                text: name.clone(),
                instruction_set: Vec::new(),
                raw_data: Vec::new(),
                p_type: parameter.as_ref().map(EventParameter::p_type),
                parameter_value: parameter.clone(),
            },
            (EffectClause::Expression(source), Some(expr)) => {
                let encoded = encoder.encode(expr, &mut placeholders)?;
                let finalized = finalizer::finalize(&encoded.instructions, registry)?;
                Effect {
                    effect_type: EffectType::Expression,
                    text: normalize(source)?,
                    instruction_set: finalized.instruction_set,
                    raw_data: finalized.raw_data,
                    p_type: None,
                    parameter_value: None,
                }
            }
            (EffectClause::Expression(source), None) => {
                return Err(CompilerError::InvalidExpression(format!(
                    "unresolved effect '{}'",
                    source
                )))
            }
        };
        effects.push(effect);
    }

    compiled.negative = effects.split_off(positive_clauses.len());
    compiled.positive = effects;
    compiled.placeholders = placeholders;

    log::debug!(
        "Compiled {} positive and {} negative effects over {} pooled placeholders",
        compiled.positive.len(),
        compiled.negative.len(),
        compiled.placeholders.len()
    );

    Ok(compiled)
}

fn classify_all(clauses: &[String]) -> Result<Vec<EffectClause>, CompilerError> {
    clauses.iter().map(|clause| classify(clause)).collect()
}

/// Render an effect back to its clause text
pub fn render_effect(
    effect: &Effect,
    registry: &OpcodeRegistry,
    placeholder_names: &[String],
    tracker_names: Option<&IndexMap<u64, String>>,
) -> Result<String, CompilerError> {
    match effect.effect_type {
        EffectType::Revert if effect.text.is_empty() => Ok("revert".to_string()),
        EffectType::Revert => Ok(format!("revert(\"{}\")", effect.text)),
        EffectType::Event => Ok(match &effect.parameter_value {
            Some(parameter) => format!("emit {}, {}", effect.text, parameter.render()),
            None => format!("emit {}", effect.text),
        }),
        EffectType::Expression => {
            let mut interpreter =
                ReverseInterpreter::new(registry, placeholder_names, &effect.raw_data);
            if let Some(tracker_names) = tracker_names {
                interpreter = interpreter.with_tracker_names(tracker_names);
            }
            interpreter.run(&effect.instruction_set)
        }
    }
}

#[cfg(test)]
#[path = "effects_tests.rs"]
mod tests;

// Rule Compiler Module
// Compiles rule conditions and effects into interpreter instruction sets,
// and renders instruction sets back into rule text

pub mod abi;
pub mod ast;
pub mod config;
pub mod decompiler;
pub mod definitions;
pub mod effects;
pub mod encoder;
pub mod error;
pub mod finalizer;
pub mod lexer;
pub mod normalizer;
pub mod opcodes;
pub mod parser;
pub mod resolver;
pub mod types;

use indexmap::IndexMap;
use primitive_types::U256;
use serde::{Deserialize, Serialize};

pub use config::CompilerConfig;
pub use error::CompilerError;
pub use normalizer::normalize;

use abi::u256_hex_vec;
use effects::Effect;
use encoder::{InstructionEncoder, Placeholder, PlaceholderCatalog, SymbolicInstruction};
use finalizer::RawDataEntry;
use resolver::{ComponentCatalog, Resolver, SymbolTables};
use types::CallingFunction;

/// A rule as written
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleInput {
    pub condition: String,
    #[serde(default)]
    pub positive_effects: Vec<String>,
    #[serde(default)]
    pub negative_effects: Vec<String>,
    /// `"transfer(address to, uint256 value)"` or `"address to, uint256 value"`
    #[serde(alias = "callingFunctionEncodedArgs")]
    pub calling_function: String,
}

/// The rule as submitted to the on-chain rules engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledRule {
    #[serde(with = "u256_hex_vec")]
    pub instruction_set: Vec<U256>,
    pub raw_data: Vec<RawDataEntry>,
    pub place_holders: Vec<Placeholder>,
    pub positive_effects: Vec<Effect>,
    pub negative_effects: Vec<Effect>,
    pub effect_place_holders: Vec<Placeholder>,
    /// Display name of each condition placeholder, by index
    pub placeholder_names: Vec<String>,
    pub effect_placeholder_names: Vec<String>,
}

/// Symbolic encoding of a condition before finalization
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionEncoding {
    pub instructions: Vec<SymbolicInstruction>,
    pub components: ComponentCatalog,
    pub placeholders: PlaceholderCatalog,
}

/// An on-chain rule with the names needed to render it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecompileInput {
    #[serde(with = "u256_hex_vec")]
    pub instruction_set: Vec<U256>,
    pub placeholder_names: Vec<String>,
    #[serde(default)]
    pub raw_data: Vec<RawDataEntry>,
    #[serde(default, alias = "posEffects")]
    pub positive_effects: Vec<Effect>,
    #[serde(default, alias = "negEffects")]
    pub negative_effects: Vec<Effect>,
    #[serde(default)]
    pub effect_placeholder_names: Vec<String>,
    /// Tracker index to name
    #[serde(default)]
    pub tracker_names: IndexMap<u64, String>,
}

impl DecompileInput {
    pub fn from_compiled(rule: &CompiledRule, tracker_names: IndexMap<u64, String>) -> Self {
        DecompileInput {
            instruction_set: rule.instruction_set.clone(),
            placeholder_names: rule.placeholder_names.clone(),
            raw_data: rule.raw_data.clone(),
            positive_effects: rule.positive_effects.clone(),
            negative_effects: rule.negative_effects.clone(),
            effect_placeholder_names: rule.effect_placeholder_names.clone(),
            tracker_names,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecompiledRule {
    pub condition: String,
    pub positive_effects: Vec<String>,
    pub negative_effects: Vec<String>,
}

/// Main compiler structure
#[derive(Debug, Clone, Default)]
pub struct RuleCompiler {
    config: CompilerConfig,
}

impl RuleCompiler {
    pub fn new() -> Self {
        RuleCompiler::default()
    }

    pub fn with_config(config: CompilerConfig) -> Self {
        RuleCompiler { config }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Compile a rule's condition and effects
    pub fn compile(
        &self,
        input: &RuleInput,
        tables: &SymbolTables,
    ) -> Result<CompiledRule, CompilerError> {
        let function = CallingFunction::parse(&input.calling_function)?;
        let resolver = Resolver::new(&function, tables, self.config.unresolved_symbols);

        // Phase 1-4: condition through parse, resolve, encode
        let condition = self.encode_condition(&input.condition, &resolver)?;

        // Phase 5: numeric instruction set
        let finalized = finalizer::finalize(&condition.instructions, &self.config.registry)?;

        // Phase 6: effects, over their own placeholder catalog
        let effects = effects::compile_effects(
            &input.positive_effects,
            &input.negative_effects,
            &resolver,
            &self.config.registry,
        )?;

        log::debug!(
            "Compiled rule '{}': {} words, {} placeholders, {} effect placeholders",
            input.condition,
            finalized.instruction_set.len(),
            condition.placeholders.len(),
            effects.placeholders.len()
        );

        Ok(CompiledRule {
            instruction_set: finalized.instruction_set,
            raw_data: finalized.raw_data,
            place_holders: condition.placeholders.placeholders(),
            placeholder_names: condition.placeholders.names(),
            positive_effects: effects.positive,
            negative_effects: effects.negative,
            effect_place_holders: effects.placeholders.placeholders(),
            effect_placeholder_names: effects.placeholders.names(),
        })
    }

    /// Symbolic instruction list of a condition, with its catalogs
    pub fn compile_condition(
        &self,
        condition: &str,
        calling_function: &str,
        tables: &SymbolTables,
    ) -> Result<ConditionEncoding, CompilerError> {
        let function = CallingFunction::parse(calling_function)?;
        let resolver = Resolver::new(&function, tables, self.config.unresolved_symbols);
        self.encode_condition(condition, &resolver)
    }

    fn encode_condition(
        &self,
        condition: &str,
        resolver: &Resolver,
    ) -> Result<ConditionEncoding, CompilerError> {
        let expr = parser::parse_expression(condition)?;
        let (expr, components) = resolver.resolve(expr)?;

        let mut placeholders = PlaceholderCatalog::new();
        let encoded = InstructionEncoder::new(&components).encode(&expr, &mut placeholders)?;

        Ok(ConditionEncoding {
            instructions: encoded.instructions,
            components,
            placeholders,
        })
    }

    /// Render an on-chain rule back to text
    pub fn decompile(&self, input: &DecompileInput) -> Result<DecompiledRule, CompilerError> {
        let condition = decompiler::ReverseInterpreter::new(
            &self.config.registry,
            &input.placeholder_names,
            &input.raw_data,
        )
        .with_tracker_names(&input.tracker_names)
        .run(&input.instruction_set)?;

        let render = |effects: &[Effect]| -> Result<Vec<String>, CompilerError> {
            effects
                .iter()
                .map(|effect| {
                    effects::render_effect(
                        effect,
                        &self.config.registry,
                        &input.effect_placeholder_names,
                        Some(&input.tracker_names),
                    )
                })
                .collect()
        };

        Ok(DecompiledRule {
            condition,
            positive_effects: render(&input.positive_effects)?,
            negative_effects: render(&input.negative_effects)?,
        })
    }
}

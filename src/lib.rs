#[macro_use]
extern crate lazy_static;

pub mod rule_compiler;

pub use rule_compiler::{
    CompiledRule, CompilerConfig, CompilerError, DecompileInput, DecompiledRule, RuleCompiler,
    RuleInput,
};

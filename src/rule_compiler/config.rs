// Compiler configuration
//
// Loaded from TOML:
//
//   registry = "current"             # or "legacy"
//   unresolved_symbols = "error"     # or "index-zero"
//
//   [opcodes]                        # optional, replaces the registry
//   N = 0
//   PLH = 2

use indexmap::IndexMap;
use serde::Deserialize;

use crate::rule_compiler::error::CompilerError;
use crate::rule_compiler::opcodes::OpcodeRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RegistryChoice {
    #[default]
    Current,
    Legacy,
}

/// What the resolver does with a name missing from the lookup tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnresolvedSymbolPolicy {
    #[default]
    Error,
    /// Resolve to type-specific index 0 and log a warning
    IndexZero,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    registry: Option<RegistryChoice>,
    unresolved_symbols: Option<UnresolvedSymbolPolicy>,
    opcodes: Option<IndexMap<String, u64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompilerConfig {
    pub registry: OpcodeRegistry,
    pub unresolved_symbols: UnresolvedSymbolPolicy,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig {
            registry: OpcodeRegistry::current(),
            unresolved_symbols: UnresolvedSymbolPolicy::Error,
        }
    }
}

impl CompilerConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, CompilerError> {
        let file: ConfigFile = toml::from_str(source)?;

        let registry = match (&file.opcodes, file.registry) {
            (Some(_), Some(_)) => {
                return Err(CompilerError::ConfigError(
                    "'registry' and '[opcodes]' are mutually exclusive".to_string(),
                ))
            }
            (Some(table), None) => OpcodeRegistry::from_table(table)?,
            (None, Some(RegistryChoice::Legacy)) => OpcodeRegistry::legacy(),
            (None, _) => OpcodeRegistry::current(),
        };

        let config = CompilerConfig {
            registry,
            unresolved_symbols: file.unresolved_symbols.unwrap_or_default(),
        };

        log::debug!(
            "Loaded compiler config: {} opcodes, unresolved symbols {:?}",
            config.registry.len(),
            config.unresolved_symbols
        );

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule_compiler::opcodes::Opcode;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = CompilerConfig::from_toml_str("").unwrap();
        assert_eq!(config, CompilerConfig::default());
    }

    #[test]
    fn test_legacy_registry_and_policy() {
        let config = CompilerConfig::from_toml_str(
            "registry = \"legacy\"\nunresolved_symbols = \"index-zero\"\n",
        )
        .unwrap();
        assert_eq!(config.registry, OpcodeRegistry::legacy());
        assert_eq!(config.unresolved_symbols, UnresolvedSymbolPolicy::IndexZero);
    }

    #[test]
    fn test_custom_opcode_table() {
        let config = CompilerConfig::from_toml_str(
            "[opcodes]\nN = 7\nPLH = 8\n\"==\" = 9\n",
        )
        .unwrap();
        assert_eq!(config.registry.code(Opcode::Equal), Ok(9));
        assert_eq!(config.registry.len(), 3);
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(
            CompilerConfig::from_toml_str("registry = \"newest\""),
            Err(CompilerError::ConfigError(_))
        ));
        assert!(matches!(
            CompilerConfig::from_toml_str("verbose = true"),
            Err(CompilerError::ConfigError(_))
        ));
        assert!(matches!(
            CompilerConfig::from_toml_str("registry = \"legacy\"\n[opcodes]\nN = 0\n"),
            Err(CompilerError::ConfigError(_))
        ));
    }
}

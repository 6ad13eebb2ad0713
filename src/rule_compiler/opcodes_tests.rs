// Opcode registry tests

#[cfg(test)]
mod tests {
    use crate::rule_compiler::ast::BinaryOp;
    use crate::rule_compiler::error::CompilerError;
    use crate::rule_compiler::opcodes::{Opcode, OpcodeRegistry};
    use indexmap::IndexMap;

    #[test]
    fn test_current_registry_codes() {
        let registry = OpcodeRegistry::current();
        assert_eq!(registry.len(), 19);
        assert_eq!(registry.code(Opcode::Number), Ok(0));
        assert_eq!(registry.code(Opcode::Placeholder), Ok(2));
        assert_eq!(registry.code(Opcode::Add), Ok(5));
        assert_eq!(registry.code(Opcode::And), Ok(12));
        assert_eq!(registry.code(Opcode::TrackerUpdateMapped), Ok(18));
        assert_eq!(registry.opcode(11), Some(Opcode::Equal));
        assert_eq!(registry.opcode(19), None);
    }

    #[test]
    fn test_legacy_registry_lacks_mapped_opcodes() {
        let registry = OpcodeRegistry::legacy();
        assert_eq!(registry.len(), 16);
        assert_eq!(registry.code(Opcode::Add), Ok(1));
        assert_eq!(registry.code(Opcode::Placeholder), Ok(11));
        assert_eq!(registry.code(Opcode::Assign), Ok(13));
        assert!(matches!(
            registry.code(Opcode::PlaceholderMapped),
            Err(CompilerError::ConfigError(_))
        ));
        assert!(registry.code(Opcode::NotEqual).is_err());
    }

    #[test]
    fn test_every_code_maps_back() {
        for registry in [OpcodeRegistry::current(), OpcodeRegistry::legacy()] {
            for opcode in Opcode::ALL {
                if let Ok(code) = registry.code(opcode) {
                    assert_eq!(registry.opcode(code), Some(opcode));
                }
            }
        }
    }

    #[test]
    fn test_symbols_are_unique() {
        for opcode in Opcode::ALL {
            assert_eq!(Opcode::from_symbol(opcode.symbol()), Some(opcode));
        }
        assert_eq!(Opcode::from_symbol("XOR"), None);
    }

    #[test]
    fn test_operand_counts() {
        assert_eq!(Opcode::Number.operand_count(), 1);
        assert_eq!(Opcode::Not.operand_count(), 1);
        assert_eq!(Opcode::PlaceholderMapped.operand_count(), 2);
        assert_eq!(Opcode::GreaterEqual.operand_count(), 2);
        assert_eq!(Opcode::TrackerUpdate.operand_count(), 3);
    }

    #[test]
    fn test_binary_mapping() {
        assert_eq!(Opcode::from_binary(BinaryOp::LessEqual), Some(Opcode::LessEqual));
        assert_eq!(Opcode::from_binary(BinaryOp::AddAssign), None);
        assert_eq!(Opcode::from_binary(BinaryOp::Assign), Some(Opcode::Assign));
        assert_eq!(Opcode::Assign.binary_operator(), Some(BinaryOp::Assign));
        assert_eq!(Opcode::Or.binary_operator(), Some(BinaryOp::Or));
        assert_eq!(Opcode::Placeholder.binary_operator(), None);
    }

    #[test]
    fn test_custom_table() {
        let mut table = IndexMap::new();
        table.insert("N".to_string(), 40);
        table.insert("PLH".to_string(), 41);
        table.insert(">".to_string(), 42);
        let registry = OpcodeRegistry::from_table(&table).unwrap();
        assert_eq!(registry.code(Opcode::Greater), Ok(42));
        assert!(registry.code(Opcode::Less).is_err());
    }

    #[test]
    fn test_custom_table_rejects_duplicates_and_unknown_symbols() {
        let mut table = IndexMap::new();
        table.insert("N".to_string(), 0);
        table.insert("PLH".to_string(), 0);
        assert!(matches!(
            OpcodeRegistry::from_table(&table),
            Err(CompilerError::ConfigError(_))
        ));

        let mut table = IndexMap::new();
        table.insert("MOD".to_string(), 3);
        assert!(matches!(
            OpcodeRegistry::from_table(&table),
            Err(CompilerError::ConfigError(_))
        ));
    }
}

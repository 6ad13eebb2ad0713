// Instruction encoder tests

#[cfg(test)]
mod tests {
    use crate::rule_compiler::config::UnresolvedSymbolPolicy;
    use crate::rule_compiler::encoder::{
        flags, InstructionEncoder, PlaceholderCatalog, SymbolicInstruction,
    };
    use crate::rule_compiler::error::CompilerError;
    use crate::rule_compiler::parser::parse_expression;
    use crate::rule_compiler::resolver::{Resolver, SymbolTables};
    use crate::rule_compiler::types::{CallingFunction, PType};

    fn tables() -> SymbolTables {
        let mut tables = SymbolTables::new();
        tables
            .add_tracker("total", 3, PType::Uint256)
            .add_mapped_tracker("balances", 1, PType::Address, PType::Uint256)
            .add_foreign_call("leaderboard", 4, PType::Uint256);
        tables
    }

    fn encode_with(
        source: &str,
        signature: &str,
        placeholders: &mut PlaceholderCatalog,
    ) -> Result<Vec<String>, CompilerError> {
        let function = CallingFunction::parse(signature)?;
        let tables = tables();
        let resolver = Resolver::new(&function, &tables, UnresolvedSymbolPolicy::Error);
        let (expr, catalog) = resolver.resolve(parse_expression(source)?)?;
        let encoded = InstructionEncoder::new(&catalog).encode(&expr, placeholders)?;
        Ok(encoded
            .instructions
            .iter()
            .map(SymbolicInstruction::to_string)
            .collect())
    }

    fn encode(source: &str, signature: &str) -> Vec<String> {
        encode_with(source, signature, &mut PlaceholderCatalog::new()).unwrap()
    }

    fn expected(items: &[&str]) -> Vec<String> {
        items.iter().map(|item| item.to_string()).collect()
    }

    #[test]
    fn test_repeated_argument_shares_placeholder() {
        let mut placeholders = PlaceholderCatalog::new();
        let instructions = encode_with(
            "value + sAND > 5 AND (sAND == 1 AND 2 == sAND)",
            "addValue(uint256 value, uint256 sAND)",
            &mut placeholders,
        )
        .unwrap();

        assert_eq!(
            instructions,
            expected(&[
                "PLH", "0", "PLH", "1", "+", "0", "1", "N", "5", ">", "2", "3", "PLH", "1", "N",
                "1", "==", "5", "6", "N", "2", "PLH", "1", "==", "8", "9", "AND", "7", "10",
                "AND", "4", "11",
            ])
        );
        assert_eq!(placeholders.len(), 2);
        assert_eq!(placeholders.names(), vec!["value", "sAND"]);
        assert_eq!(placeholders.get(1).unwrap().type_specific_index, 1);
    }

    #[test]
    fn test_foreign_call_placeholder() {
        let mut placeholders = PlaceholderCatalog::new();
        let instructions = encode_with(
            "FC:leaderboard(to) > 100 AND value == 100",
            "transfer(address to, uint256 value)",
            &mut placeholders,
        )
        .unwrap();

        assert_eq!(
            instructions,
            expected(&[
                "PLH", "0", "N", "100", ">", "0", "1", "PLH", "1", "N", "100", "==", "3", "4",
                "AND", "2", "5",
            ])
        );
        assert_eq!(placeholders.names(), vec!["FC:leaderboard(to)", "value"]);

        let call = placeholders.get(0).unwrap();
        assert_eq!(call.flags, flags::FOREIGN_CALL);
        assert_eq!(call.type_specific_index, 4);
        let value = placeholders.get(1).unwrap();
        assert_eq!(value.flags, flags::CALLING_ARGUMENT);
        assert_eq!(value.type_specific_index, 1);
    }

    #[test]
    fn test_not_and_literals() {
        assert_eq!(
            encode("NOT status == open", "f(string status)"),
            expected(&["PLH", "0", "N", "open", "==", "0", "1", "NOT", "2"])
        );
        assert_eq!(
            encode("flag == true", "f(bool flag)"),
            expected(&["PLH", "0", "N", "true", "==", "0", "1"])
        );
    }

    #[test]
    fn test_global_variable_flags() {
        let mut placeholders = PlaceholderCatalog::new();
        encode_with(
            "GV:MSG_SENDER == GV:TX_ORIGIN AND GV:BLOCK_TIMESTAMP > 5",
            "f()",
            &mut placeholders,
        )
        .unwrap();

        let flag_values: Vec<u8> = placeholders
            .placeholders()
            .iter()
            .map(|placeholder| placeholder.flags)
            .collect();
        assert_eq!(
            flag_values,
            vec![
                flags::GLOBAL_MSG_SENDER,
                flags::GLOBAL_TX_ORIGIN,
                flags::GLOBAL_BLOCK_TIMESTAMP
            ]
        );
    }

    #[test]
    fn test_mapped_tracker_read() {
        let mut placeholders = PlaceholderCatalog::new();
        let instructions = encode_with(
            "TR:balances(to) >= value",
            "transfer(address to, uint256 value)",
            &mut placeholders,
        )
        .unwrap();

        assert_eq!(
            instructions,
            expected(&["PLH", "0", "PLHM", "1", "0", "PLH", "2", ">=", "1", "2"])
        );
        let mapped = placeholders.get(1).unwrap();
        assert_eq!(mapped.flags, flags::TRACKER);
        assert_eq!(mapped.mapped_tracker_key, Some(PType::Address));
    }

    #[test]
    fn test_tracker_assignment() {
        assert_eq!(
            encode("TRU:total = value", "f(uint256 value)"),
            expected(&["PLH", "0", "PLH", "1", "=", "0", "1", "TRU", "3", "2", "0"])
        );
        assert_eq!(
            encode("TRU:balances(to) = value", "transfer(address to, uint256 value)"),
            expected(&[
                "PLH", "0", "PLHM", "1", "0", "PLH", "2", "=", "1", "2", "TRUM", "1", "3", "0",
            ])
        );
    }

    #[test]
    fn test_compound_tracker_update() {
        assert_eq!(
            encode("TRU:total += value * 2", "f(uint256 value)"),
            expected(&[
                "PLH", "0", "PLH", "1", "N", "2", "*", "1", "2", "+", "0", "3", "TRU", "3",
                "4", "0",
            ])
        );
    }

    #[test]
    fn test_mapped_tracker_update() {
        assert_eq!(
            encode("TRU:balances(to) -= value", "transfer(address to, uint256 value)"),
            expected(&[
                "PLH", "0", "PLHM", "1", "0", "PLH", "2", "-", "1", "2", "TRUM", "1", "3", "0",
            ])
        );
    }

    #[test]
    fn test_invalid_updates() {
        let mut placeholders = PlaceholderCatalog::new();
        assert!(matches!(
            encode_with("value = 1", "f(uint256 value)", &mut placeholders),
            Err(CompilerError::InvalidExpression(_))
        ));
        assert!(matches!(
            encode_with("TRU:total = TRU:total = 1", "f()", &mut placeholders),
            Err(CompilerError::InvalidExpression(_))
        ));
        assert!(matches!(
            encode_with("TRU:balances += 1", "f()", &mut placeholders),
            Err(CompilerError::InvalidExpression(_))
        ));
        assert!(matches!(
            encode_with("TR:total(1) > 1", "f()", &mut placeholders),
            Err(CompilerError::InvalidExpression(_))
        ));
    }

    #[test]
    fn test_shared_catalog_across_expressions() {
        let mut placeholders = PlaceholderCatalog::new();
        encode_with("TRU:total += value", "f(uint256 value)", &mut placeholders).unwrap();
        let second =
            encode_with("TRU:total -= value", "f(uint256 value)", &mut placeholders).unwrap();

        assert_eq!(placeholders.len(), 2);
        assert_eq!(
            second,
            expected(&["PLH", "0", "PLH", "1", "-", "0", "1", "TRU", "3", "2", "0"])
        );
    }
}

// Parser tests

#[cfg(test)]
mod tests {
    use crate::rule_compiler::ast::*;
    use crate::rule_compiler::error::{CompilerError, SymbolKind};
    use crate::rule_compiler::parser::parse_expression;
    use primitive_types::U256;

    fn ident(name: &str) -> Box<Expr> {
        Box::new(Expr::Identifier(name.to_string()))
    }

    fn number(value: u64) -> Box<Expr> {
        Box::new(Expr::Number(U256::from(value)))
    }

    fn binary(left: Box<Expr>, operator: BinaryOp, right: Box<Expr>) -> Box<Expr> {
        Box::new(Expr::Binary {
            left,
            operator,
            right,
        })
    }

    #[test]
    fn test_arithmetic_binds_tighter_than_comparison() {
        let expr = parse_expression("value + sAND > 5").unwrap();
        assert_eq!(
            expr,
            *binary(
                binary(ident("value"), BinaryOp::Add, ident("sAND")),
                BinaryOp::Greater,
                number(5)
            )
        );
    }

    #[test]
    fn test_comparison_binds_tighter_than_logical() {
        let expr = parse_expression("a == 1 AND b > 2").unwrap();
        assert_eq!(
            expr,
            *binary(
                binary(ident("a"), BinaryOp::Equal, number(1)),
                BinaryOp::And,
                binary(ident("b"), BinaryOp::Greater, number(2))
            )
        );
    }

    #[test]
    fn test_logical_operators_are_right_associative() {
        let expr = parse_expression("a AND b OR c").unwrap();
        assert_eq!(
            expr,
            *binary(
                ident("a"),
                BinaryOp::And,
                binary(ident("b"), BinaryOp::Or, ident("c"))
            )
        );
    }

    #[test]
    fn test_parentheses_override_grouping() {
        let expr = parse_expression("(a AND b) OR c").unwrap();
        assert_eq!(
            expr,
            *binary(
                binary(ident("a"), BinaryOp::And, ident("b")),
                BinaryOp::Or,
                ident("c")
            )
        );
    }

    #[test]
    fn test_not_binds_tighter_than_and() {
        let expr = parse_expression("NOT a == 1 AND b").unwrap();
        assert_eq!(
            expr,
            *binary(
                Box::new(Expr::Unary {
                    operator: UnaryOp::Not,
                    operand: binary(ident("a"), BinaryOp::Equal, number(1)),
                }),
                BinaryOp::And,
                ident("b")
            )
        );
    }

    #[test]
    fn test_multiplication_binds_tighter_than_addition() {
        let expr = parse_expression("1 + 2 * 3").unwrap();
        assert_eq!(
            expr,
            *binary(
                number(1),
                BinaryOp::Add,
                binary(number(2), BinaryOp::Multiply, number(3))
            )
        );
    }

    #[test]
    fn test_tracker_update_is_loosest() {
        let expr = parse_expression("TRU:total += value * 2").unwrap();
        assert_eq!(
            expr,
            *binary(
                Box::new(Expr::Reference(Reference::Tracker(TrackerRef::update(
                    "total"
                )))),
                BinaryOp::AddAssign,
                binary(ident("value"), BinaryOp::Multiply, number(2))
            )
        );
    }

    #[test]
    fn test_foreign_call_arguments() {
        let expr = parse_expression("FC:score(to, TR:level, 7) > 100").unwrap();
        match expr {
            Expr::Binary { left, .. } => match *left {
                Expr::Reference(Reference::ForeignCall { name, arguments }) => {
                    assert_eq!(name, "score");
                    assert_eq!(arguments.len(), 3);
                    assert_eq!(arguments[0], Expr::Identifier("to".to_string()));
                    assert_eq!(
                        arguments[1],
                        Expr::Reference(Reference::Tracker(TrackerRef::read("level")))
                    );
                    assert_eq!(arguments[2], Expr::Number(U256::from(7)));
                }
                other => panic!("expected foreign call, got {:?}", other),
            },
            other => panic!("expected binary, got {:?}", other),
        }
    }

    #[test]
    fn test_foreign_call_without_arguments() {
        let expr = parse_expression("FC:paused").unwrap();
        assert_eq!(
            expr,
            Expr::Reference(Reference::ForeignCall {
                name: "paused".to_string(),
                arguments: vec![],
            })
        );
    }

    #[test]
    fn test_mapped_tracker_call_and_pipe_forms_agree() {
        let call_form = parse_expression("TR:balances(to) > 10").unwrap();
        let pipe_form = parse_expression("to | TR:balances > 10").unwrap();
        assert_eq!(call_form, pipe_form);
        assert_eq!(
            call_form,
            *binary(
                Box::new(Expr::Mapped {
                    tracker: TrackerRef::read("balances"),
                    key: ident("to"),
                }),
                BinaryOp::Greater,
                number(10)
            )
        );
    }

    #[test]
    fn test_global_variables() {
        let expr = parse_expression("GV:BLOCK_TIMESTAMP > 1700000000").unwrap();
        assert_eq!(
            expr,
            *binary(
                Box::new(Expr::Reference(Reference::Global(
                    GlobalVariable::BlockTimestamp
                ))),
                BinaryOp::Greater,
                number(1_700_000_000)
            )
        );
    }

    #[test]
    fn test_unknown_global_variable() {
        assert_eq!(
            parse_expression("GV:GAS_PRICE > 1"),
            Err(CompilerError::UnresolvedSymbol(
                "GV:GAS_PRICE".to_string(),
                SymbolKind::GlobalVariable
            ))
        );
    }

    #[test]
    fn test_unbalanced_parentheses() {
        assert!(matches!(
            parse_expression("(a AND b"),
            Err(CompilerError::MalformedExpression(_, 8))
        ));
        assert!(matches!(
            parse_expression("a AND b)"),
            Err(CompilerError::MalformedExpression(_, 7))
        ));
        assert!(matches!(
            parse_expression("FC:x(a, b"),
            Err(CompilerError::MalformedExpression(_, _))
        ));
    }

    #[test]
    fn test_dangling_operator() {
        assert!(matches!(
            parse_expression("a >"),
            Err(CompilerError::MalformedExpression(_, 3))
        ));
        assert!(matches!(
            parse_expression("AND a"),
            Err(CompilerError::MalformedExpression(_, 0))
        ));
    }

    #[test]
    fn test_empty_expression() {
        assert!(matches!(
            parse_expression("  "),
            Err(CompilerError::MalformedExpression(_, _))
        ));
    }

    #[test]
    fn test_display_is_canonical() {
        let expr = parse_expression("3+4>5 AND (1==1 AND 2==2)").unwrap();
        assert_eq!(expr.to_string(), "3 + 4 > 5 AND ( 1 == 1 AND 2 == 2 )");
    }
}

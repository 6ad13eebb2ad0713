// Lexer tests

#[cfg(test)]
mod tests {
    use crate::rule_compiler::error::CompilerError;
    use crate::rule_compiler::lexer::{is_bare_word, Lexer, TokenKind};
    use primitive_types::U256;

    fn tokenize_input(input: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::new(input);
        lexer
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(tokenize_input(""), vec![TokenKind::EOF]);
        assert_eq!(tokenize_input("   "), vec![TokenKind::EOF]);
    }

    #[test]
    fn test_operators() {
        let tokens = tokenize_input("+ - * / < <= > >= == != = += -= *= /=");
        assert_eq!(
            tokens,
            vec![
                TokenKind::Plus,
                TokenKind::Minus,
                TokenKind::Star,
                TokenKind::Slash,
                TokenKind::Less,
                TokenKind::LessEqual,
                TokenKind::Greater,
                TokenKind::GreaterEqual,
                TokenKind::EqualEqual,
                TokenKind::NotEqual,
                TokenKind::Equal,
                TokenKind::PlusEqual,
                TokenKind::MinusEqual,
                TokenKind::StarEqual,
                TokenKind::SlashEqual,
                TokenKind::EOF,
            ]
        );
    }

    #[test]
    fn test_operators_without_spaces() {
        let tokens = tokenize_input("a>=5");
        assert_eq!(
            tokens,
            vec![
                TokenKind::Identifier("a".to_string()),
                TokenKind::GreaterEqual,
                TokenKind::NumberLiteral(U256::from(5)),
                TokenKind::EOF,
            ]
        );
    }

    #[test]
    fn test_logical_keywords_are_whole_words() {
        // operands that merely contain AND/OR/NOT stay identifiers
        let tokens = tokenize_input("sAND AND ORacle OR NOTE NOT x");
        assert_eq!(
            tokens,
            vec![
                TokenKind::Identifier("sAND".to_string()),
                TokenKind::And,
                TokenKind::Identifier("ORacle".to_string()),
                TokenKind::Or,
                TokenKind::Identifier("NOTE".to_string()),
                TokenKind::Not,
                TokenKind::Identifier("x".to_string()),
                TokenKind::EOF,
            ]
        );
    }

    #[test]
    fn test_references() {
        let tokens = tokenize_input("TR:count TRU:count FC:leaderboard(to) GV:MSG_SENDER");
        assert_eq!(
            tokens,
            vec![
                TokenKind::TrackerRead("count".to_string()),
                TokenKind::TrackerUpdate("count".to_string()),
                TokenKind::ForeignCall("leaderboard".to_string()),
                TokenKind::LeftParen,
                TokenKind::Identifier("to".to_string()),
                TokenKind::RightParen,
                TokenKind::GlobalVariable("MSG_SENDER".to_string()),
                TokenKind::EOF,
            ]
        );
    }

    #[test]
    fn test_unknown_reference_prefix() {
        let mut lexer = Lexer::new("XX:thing");
        assert!(matches!(
            lexer.tokenize(),
            Err(CompilerError::LexicalError(_, 0))
        ));
    }

    #[test]
    fn test_literals() {
        let tokens = tokenize_input(
            "42 true false \"hello world\" 'single' 0x1234 0x00000000000000000000000000000000000000ff",
        );
        assert_eq!(
            tokens,
            vec![
                TokenKind::NumberLiteral(U256::from(42)),
                TokenKind::BooleanLiteral(true),
                TokenKind::BooleanLiteral(false),
                TokenKind::StringLiteral("hello world".to_string()),
                TokenKind::StringLiteral("single".to_string()),
                TokenKind::BytesLiteral(vec![0x12, 0x34]),
                TokenKind::AddressLiteral(U256::from(0xff)),
                TokenKind::EOF,
            ]
        );
    }

    #[test]
    fn test_large_number_literal() {
        let tokens = tokenize_input("115792089237316195423570985008687907853269984665640564039457584007913129639935");
        assert_eq!(tokens[0], TokenKind::NumberLiteral(U256::MAX));
    }

    #[test]
    fn test_number_overflow() {
        let mut lexer = Lexer::new(
            "115792089237316195423570985008687907853269984665640564039457584007913129639936",
        );
        assert!(matches!(
            lexer.tokenize(),
            Err(CompilerError::LexicalError(_, 0))
        ));
    }

    #[test]
    fn test_odd_hex_literal() {
        let mut lexer = Lexer::new("0x123");
        assert!(lexer.tokenize().is_err());
    }

    #[test]
    fn test_unterminated_string() {
        let mut lexer = Lexer::new("name == \"open");
        assert_eq!(lexer.tokenize(), Err(CompilerError::UnterminatedString(8)));
    }

    #[test]
    fn test_unexpected_character() {
        let mut lexer = Lexer::new("a & b");
        assert_eq!(
            lexer.tokenize(),
            Err(CompilerError::UnexpectedCharacter('&', 2))
        );
        let mut lexer = Lexer::new("a ! b");
        assert_eq!(
            lexer.tokenize(),
            Err(CompilerError::UnexpectedCharacter('!', 2))
        );
    }

    #[test]
    fn test_token_positions() {
        let mut lexer = Lexer::new("value >= 10");
        let tokens = lexer.tokenize().unwrap();
        let positions: Vec<usize> = tokens.iter().map(|t| t.position).collect();
        assert_eq!(positions, vec![0, 6, 9, 11]);
    }

    #[test]
    fn test_bare_word() {
        assert!(is_bare_word("active"));
        assert!(is_bare_word("_x1"));
        assert!(!is_bare_word("two words"));
        assert!(!is_bare_word("1abc"));
        assert!(!is_bare_word("AND"));
        assert!(!is_bare_word(""));
    }
}

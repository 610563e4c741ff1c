mod lexer;
mod token;

pub use lexer::Lexer;
pub use token::{lookup_keyword, Token, TokenKind};

/// Scans the entire source into a `Vec<Token>`. Convenience wrapper for
/// tests and tooling — the compiler itself drives `Lexer::scan_token`
/// directly, one token at a time.
pub fn tokenize(source: &str) -> Vec<Token> {
    let mut lexer = Lexer::new(source);
    let mut tokens = Vec::new();
    loop {
        let tok = lexer.scan_token();
        let done = tok.is_eof();
        tokens.push(tok);
        if done {
            break;
        }
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn t_empty_source_is_just_eof() {
        assert_eq!(kinds(""), vec![TokenKind::Eof]);
    }

    #[test]
    fn t_single_char_punctuation() {
        assert_eq!(
            kinds("(){};,.+-*/"),
            vec![
                TokenKind::LeftParen,
                TokenKind::RightParen,
                TokenKind::LeftBrace,
                TokenKind::RightBrace,
                TokenKind::Semicolon,
                TokenKind::Comma,
                TokenKind::Dot,
                TokenKind::Plus,
                TokenKind::Minus,
                TokenKind::Star,
                TokenKind::Slash,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn t_two_char_operators_prefer_longest_match() {
        assert_eq!(
            kinds("!= == <= >= ! = < >"),
            vec![
                TokenKind::BangEqual,
                TokenKind::EqualEqual,
                TokenKind::LessEqual,
                TokenKind::GreaterEqual,
                TokenKind::Bang,
                TokenKind::Equal,
                TokenKind::Less,
                TokenKind::Greater,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn t_number_literal_with_fraction() {
        assert_eq!(kinds("123.456"), vec![TokenKind::Number(123.456), TokenKind::Eof]);
    }

    #[test]
    fn t_number_literal_without_fraction() {
        assert_eq!(kinds("42"), vec![TokenKind::Number(42.0), TokenKind::Eof]);
    }

    #[test]
    fn t_trailing_dot_is_not_consumed_without_a_digit_after() {
        let toks = tokenize("1.");
        assert_eq!(toks[0].kind, TokenKind::Number(1.0));
        assert_eq!(toks[1].kind, TokenKind::Dot);
    }

    #[test]
    fn t_string_literal() {
        let toks = tokenize("\"hello world\"");
        assert_eq!(toks[0].kind, TokenKind::String);
        assert_eq!(toks[0].lexeme, "\"hello world\"");
    }

    #[test]
    fn t_unterminated_string_is_an_error_token() {
        let toks = tokenize("\"hello");
        match &toks[0].kind {
            TokenKind::Error(msg) => assert_eq!(msg, "Unterminated string."),
            other => panic!("expected error token, got {other:?}"),
        }
    }

    #[test]
    fn t_string_spanning_multiple_lines_advances_line_count() {
        let toks = tokenize("\"a\nb\"\nvar");
        assert_eq!(toks[0].kind, TokenKind::String);
        assert_eq!(toks[1].line, 3);
    }

    #[test]
    fn t_identifiers_and_keywords() {
        assert_eq!(
            kinds("orchid or"),
            vec![TokenKind::Identifier, TokenKind::Or, TokenKind::Eof]
        );
    }

    #[test]
    fn t_all_keywords_recognized() {
        let source = "and class else false for fun if nil or print return super this true var while";
        assert_eq!(
            kinds(source),
            vec![
                TokenKind::And,
                TokenKind::Class,
                TokenKind::Else,
                TokenKind::False,
                TokenKind::For,
                TokenKind::Fun,
                TokenKind::If,
                TokenKind::Nil,
                TokenKind::Or,
                TokenKind::Print,
                TokenKind::Return,
                TokenKind::Super,
                TokenKind::This,
                TokenKind::True,
                TokenKind::Var,
                TokenKind::While,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn t_line_comment_is_skipped() {
        assert_eq!(kinds("// comment\nvar"), vec![TokenKind::Var, TokenKind::Eof]);
    }

    #[test]
    fn t_line_tracking_across_newlines() {
        let toks = tokenize("var\n\n\nvar");
        assert_eq!(toks[0].line, 1);
        assert_eq!(toks[1].line, 4);
    }

    #[test]
    fn t_unexpected_character_is_an_error_token() {
        match &kinds("@")[0] {
            TokenKind::Error(msg) => assert!(msg.contains('@')),
            other => panic!("expected error token, got {other:?}"),
        }
    }

    #[test]
    fn t_scan_token_is_idempotent_at_eof() {
        let mut lexer = Lexer::new("");
        assert!(lexer.scan_token().is_eof());
        assert!(lexer.scan_token().is_eof());
    }
}

use std::num::{ParseFloatError, ParseIntError};

use log::trace;

use crate::{
    token::{Span, Token, TokenKind, KEYWORDS},
    util::BreakableIteratorExt,
};

pub const SUGGESTED_TOKENS_CAPACITY: usize = 8_192;

/// Lexes the provided string, producing the tokens (up to and including the
/// first [`TokenKind::Eof`]) into the provided buffer.
pub fn lex(src: &str, tokens: &mut Vec<Token>) {
    assert_eq!(tokens.len(), 0, "must pass clean tokens buffer");
    tokens.extend(Lexer::new(src).up_to(Token::is_eof));
}

/// A convenience function that allocates a new buffer per lexed input and
/// returns it.
pub fn lex_in_new(src: &str) -> Vec<Token> {
    let mut tokens = Vec::with_capacity(SUGGESTED_TOKENS_CAPACITY);
    lex(src, &mut tokens);
    tokens
}

/// The pull-based lexer.
///
/// Each call to [`Lexer::next_token`] scans exactly one token. Once the input
/// is exhausted, every further call returns an [`TokenKind::Eof`] token placed
/// at the end of the source. Whitespace and comments are produced as trivia
/// tokens; it is up to the consumer to skip them.
pub struct Lexer<'src> {
    src: &'src str,
    cursor: usize,
    current_lo: usize,
}

impl<'src> Lexer<'src> {
    pub fn new(src: &'src str) -> Lexer<'src> {
        Lexer {
            src,
            cursor: 0,
            current_lo: 0,
        }
    }

    pub fn next_token(&mut self) -> Token {
        let kind = self.scan_token_kind();
        let token = Token::new(kind, self.span());
        trace!("lexed {token:?}");
        token
    }

    /// Tries to scan the current character.
    fn scan_token_kind(&mut self) -> TokenKind {
        use TokenKind::*;
        self.current_lo = self.cursor;
        let Some(current) = self.advance() else {
            return Eof;
        };
        match current {
            '+' => Plus,
            '-' => Minus,
            '*' => Star,
            '/' => match self.peek() {
                '/' => self.comment(),
                _ => Slash,
            },
            '%' => Percent,
            '=' => match self.peek() {
                '=' => self.advance_with(EqEq),
                _ => Assign,
            },
            '!' => match self.peek() {
                '=' => self.advance_with(NotEq),
                _ => Unknown,
            },
            '<' => match self.peek() {
                '=' => self.advance_with(LessEq),
                _ => Less,
            },
            '>' => match self.peek() {
                '=' => self.advance_with(GreaterEq),
                _ => Greater,
            },
            '(' => LParen,
            ')' => RParen,
            '{' => LBrace,
            '}' => RBrace,
            '[' => LBracket,
            ']' => RBracket,
            '.' => Dot,
            ';' => Semicolon,
            ',' => Comma,
            '"' => self.string(),
            c if c.is_alphabetic() || c == '_' => self.identifier_or_keyword(),
            c if c.is_ascii_digit() => self.number(),
            c if c.is_whitespace() => self.whitespace(),
            _ => Unknown,
        }
    }

    /// Lexes a string literal. Line breaks are allowed inside strings.
    ///
    /// Escape sequences are only detected here; the actual escaping happens
    /// when the literal is extracted (see [`extract::escaped_string`]), so that
    /// plain strings never pay for a growing buffer.
    fn string(&mut self) -> TokenKind {
        // Whether any escaping did happen inside this string token
        let mut has_escaped = false;
        // Whether the current character is being escaped
        let mut is_escaping = false;
        loop {
            let Some(current) = self.advance() else {
                return TokenKind::ErrorUnclosedString;
            };
            match (is_escaping, current) {
                (false, '"') => {
                    return if has_escaped {
                        TokenKind::EscapedString
                    } else {
                        TokenKind::String
                    };
                }
                (false, '\\') => {
                    has_escaped = true;
                    is_escaping = true;
                }
                (_, _) => {
                    is_escaping = false;
                }
            }
        }
    }

    fn identifier_or_keyword(&mut self) -> TokenKind {
        let valid_identifier_suffix = |c: char| c.is_alphanumeric() || c == '_';
        while valid_identifier_suffix(self.peek()) {
            self.advance();
        }
        KEYWORDS
            .get(self.substr())
            .copied()
            .unwrap_or(TokenKind::Identifier)
    }

    fn number(&mut self) -> TokenKind {
        while self.peek().is_ascii_digit() {
            self.advance();
        }
        // `2.` is an integer followed by a dot; a real needs fraction digits.
        if self.peek() == '.' && self.peek_nth(1).is_ascii_digit() {
            self.advance();
            while self.peek().is_ascii_digit() {
                self.advance();
            }
            return TokenKind::Real;
        }
        TokenKind::Integer
    }

    fn whitespace(&mut self) -> TokenKind {
        while self.peek().is_whitespace() {
            self.advance();
        }
        TokenKind::Whitespace
    }

    fn comment(&mut self) -> TokenKind {
        assert_eq!(self.advance(), Some('/'));
        while !self.at_end() && self.peek() != '\n' {
            self.advance();
        }
        TokenKind::Comment
    }
}

impl<'src> Lexer<'src> {
    /// Returns the next character and advances the cursor.
    fn advance(&mut self) -> Option<char> {
        let c = self.src[self.cursor..].chars().next()?;
        self.cursor += c.len_utf8();
        Some(c)
    }

    /// Advances and returns the provided value.
    fn advance_with<T>(&mut self, value: T) -> T {
        self.advance();
        value
    }

    /// Returns the next character without advancing, or `'\0'` at the end.
    fn peek(&self) -> char {
        self.peek_nth(0)
    }

    fn peek_nth(&self, n: usize) -> char {
        self.src[self.cursor..].chars().nth(n).unwrap_or('\0')
    }

    /// Whether the input is exhausted. A `'\0'` from [`Lexer::peek`] may also
    /// be a literal NUL in the source.
    fn at_end(&self) -> bool {
        self.src[self.cursor..].is_empty()
    }

    /// Returns the current span.
    fn span(&self) -> Span {
        Span::new_of_bounds(self.current_lo..self.cursor)
    }

    /// Returns the substring of the current marked bounds.
    fn substr(&self) -> &'src str {
        let src = self.src;
        self.span().substr(src)
    }
}

/// A lexer never runs out of tokens: after the input is exhausted it keeps
/// yielding [`TokenKind::Eof`]. Use [`BreakableIteratorExt::up_to`] to stop.
impl Iterator for Lexer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        Some(self.next_token())
    }
}

pub mod extract {
    use super::*;

    pub fn int(token: Token, src: &str) -> Result<i64, ParseIntError> {
        debug_assert_eq!(token.kind, TokenKind::Integer);
        token.span().substr(src).parse()
    }

    pub fn real(token: Token, src: &str) -> Result<f64, ParseFloatError> {
        debug_assert_eq!(token.kind, TokenKind::Real);
        token.span().substr(src).parse()
    }

    pub fn ident(token: Token, src: &str) -> &str {
        debug_assert_eq!(token.kind, TokenKind::Identifier);
        token.span().substr(src)
    }

    pub fn string(token: Token, src: &str) -> Box<str> {
        debug_assert_eq!(token.kind, TokenKind::String);
        let s = token.span().offset(1, -1).substr(src);
        s.to_string().into_boxed_str()
    }

    pub fn escaped_string(token: Token, src: &str) -> Box<str> {
        debug_assert_eq!(token.kind, TokenKind::EscapedString);
        let s = token.span().offset(1, -1).substr(src);
        perform_escape(s).into_boxed_str()
    }
}

fn perform_escape(raw: &str) -> String {
    let mut buf = String::with_capacity(raw.len());
    let mut escaped = false;
    for char in raw.chars() {
        let char = match (escaped, char) {
            (true, 't') => '\t',
            (true, 'n') => '\n',
            (true, 'r') => '\r',
            (true, '0') => '\0',
            (false, '\\') => {
                escaped = true;
                continue;
            }
            (_, char) => char,
        };
        escaped = false;
        buf.push(char);
    }
    buf.shrink_to_fit();
    // Only called for tokens with at least one escape sequence.
    debug_assert!(buf.len() < raw.len(), "original string MUST be greater");
    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_demo_program_no_errors() {
        let input = include_str!("../demos/big.plume");
        let has_errors = lex_in_new(input).into_iter().any(|t| t.kind.is_error());
        assert!(!has_errors);
    }

    #[test]
    fn test_eof_is_idempotent() {
        let mut lexer = Lexer::new("x");
        assert_eq!(lexer.next_token().kind, TokenKind::Identifier);
        for _ in 0..3 {
            let eof = lexer.next_token();
            assert_eq!(eof, Token::new(TokenKind::Eof, Span::new_of_bounds(1..1)));
        }
    }

    #[test]
    fn test_empty_input_is_eof() {
        let tokens = lex_in_new("");
        assert_eq!(tokens, [Token::eof_for("")]);
    }

    #[test]
    fn test_lexemes() {
        let src = r#"val s string = "hi";"#;
        let lexemes: Vec<_> = lex_in_new(src)
            .into_iter()
            .filter(|t| !t.kind.is_trivia())
            .map(|t| t.lexeme(src))
            .collect();
        assert_eq!(
            lexemes,
            [
                Some("val"),
                Some("s"),
                Some("string"),
                Some("="),
                Some(r#""hi""#),
                Some(";"),
                None,
            ]
        );
    }

    #[test]
    fn test_extract() {
        let src = r#"42 4.25 "plain" "a\"b\n""#;
        let tokens: Vec<_> = lex_in_new(src)
            .into_iter()
            .filter(|t| !t.kind.is_trivia())
            .collect();
        assert_eq!(extract::int(tokens[0], src), Ok(42));
        assert_eq!(extract::real(tokens[1], src), Ok(4.25));
        assert_eq!(&*extract::string(tokens[2], src), "plain");
        assert_eq!(&*extract::escaped_string(tokens[3], src), "a\"b\n");
    }

    #[test]
    fn tests_with_span() {
        use TokenKind::*;
        let cases = cases!(match .. {
            "+-*/%" => [
                (Plus, 0..1),
                (Minus, 1..2),
                (Star, 2..3),
                (Slash, 3..4),
                (Percent, 4..5),
                (Eof, 5..5),
            ],
            "= == != < <= > >=" => [
                (Assign, 0..1),
                (Whitespace, 1..2),
                (EqEq, 2..4),
                (Whitespace, 4..5),
                (NotEq, 5..7),
                (Whitespace, 7..8),
                (Less, 8..9),
                (Whitespace, 9..10),
                (LessEq, 10..12),
                (Whitespace, 12..13),
                (Greater, 13..14),
                (Whitespace, 14..15),
                (GreaterEq, 15..17),
                (Eof, 17..17),
            ],
            "var x int[] = int[](5);" => [
                (Var, 0..3),
                (Whitespace, 3..4),
                (Identifier, 4..5),
                (Whitespace, 5..6),
                (Identifier, 6..9),
                (LBracket, 9..10),
                (RBracket, 10..11),
                (Whitespace, 11..12),
                (Assign, 12..13),
                (Whitespace, 13..14),
                (Identifier, 14..17),
                (LBracket, 17..18),
                (RBracket, 18..19),
                (LParen, 19..20),
                (Integer, 20..21),
                (RParen, 21..22),
                (Semicolon, 22..23),
                (Eof, 23..23),
            ],
            "1 1.5 2. x.y" => [
                (Integer, 0..1),
                (Whitespace, 1..2),
                (Real, 2..5),
                (Whitespace, 5..6),
                (Integer, 6..7),
                (Dot, 7..8),
                (Whitespace, 8..9),
                (Identifier, 9..10),
                (Dot, 10..11),
                (Identifier, 11..12),
                (Eof, 12..12),
            ],
            "true false True record Record" => [
                (True, 0..4),
                (Whitespace, 4..5),
                (False, 5..10),
                (Whitespace, 10..11),
                (Identifier, 11..15),
                (Whitespace, 15..16),
                (Record, 16..22),
                (Whitespace, 22..23),
                (Identifier, 23..29),
                (Eof, 29..29),
            ],
            r#""hi" "a\"b" "open"# => [
                (String, 0..4),
                (Whitespace, 4..5),
                (EscapedString, 5..11),
                (Whitespace, 11..12),
                (ErrorUnclosedString, 12..17),
                (Eof, 17..17),
            ],
            "x // note\ny" => [
                (Identifier, 0..1),
                (Whitespace, 1..2),
                (Comment, 2..9),
                (Whitespace, 9..10),
                (Identifier, 10..11),
                (Eof, 11..11),
            ],
            "x // a\0b\ny" => [
                (Identifier, 0..1),
                (Whitespace, 1..2),
                (Comment, 2..8),
                (Whitespace, 8..9),
                (Identifier, 9..10),
                (Eof, 10..10),
            ],
            "// trailing" => [
                (Comment, 0..11),
                (Eof, 11..11),
            ],
            "a ! ? b" => [
                (Identifier, 0..1),
                (Whitespace, 1..2),
                (Unknown, 2..3),
                (Whitespace, 3..4),
                (Unknown, 4..5),
                (Whitespace, 5..6),
                (Identifier, 6..7),
                (Eof, 7..7),
            ],
        });

        for (input, tokens) in cases {
            let lexed = lex_in_new(input);
            assert_eq!(lexed, tokens.as_slice());
        }
    }

    macro_rules! cases {
        (match .. {
            $($str:expr => [$(($kind:expr, $range:expr)),* $(,)?]),* $(,)?
        }) => {{
            &[$((
                $str,
                vec![
                    $(Token::new($kind, Span::new_of_bounds($range.start..$range.end))),*
                ],
            )),*]
        }};
    }
    use cases;
}

use std::{fmt, ops::Range};

#[derive(Copy, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    lo: usize,
    len: u32,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Token {
        Token {
            kind,
            len: span.len,
            lo: span.lo,
        }
    }

    /// Returns the end-of-input token positioned at the end of `src`.
    pub fn eof_for(src: &str) -> Token {
        Token::new(TokenKind::Eof, Span::new_of_length(src.len(), 0))
    }

    pub fn span(&self) -> Span {
        Span {
            len: self.len,
            lo: self.lo,
        }
    }

    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }

    /// Returns the literal source text of this token, or `None` for the end of
    /// input.
    pub fn lexeme<'src>(&self, src: &'src str) -> Option<&'src str> {
        if self.is_eof() {
            return None;
        }
        Some(self.span().substr(src))
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({:?}, {})", self.kind, self.span())
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct Span {
    pub len: u32,
    pub lo: usize,
}

impl Span {
    pub fn new_of_bounds(Range { start: lo, end: hi }: Range<usize>) -> Span {
        debug_assert!(hi >= lo);
        Self::new_of_length(lo, u32::try_from(hi - lo).unwrap())
    }

    pub fn new_of_length(lo: usize, len: u32) -> Span {
        Span { len, lo }
    }

    pub fn hi(&self) -> usize {
        self.lo + self.len as usize
    }

    /// Returns a span that covers both `self` and `other`.
    pub fn to(self, other: Span) -> Span {
        let lo = self.lo.min(other.lo);
        let hi = self.hi().max(other.hi());
        Span::new_of_bounds(lo..hi)
    }

    /// Shrinks or grows the span at each side.
    pub fn offset(self, lo_delta: isize, hi_delta: isize) -> Span {
        let lo = self.lo.saturating_add_signed(lo_delta);
        let hi = self.hi().saturating_add_signed(hi_delta);
        Span::new_of_bounds(lo..hi.max(lo))
    }

    pub fn substr(self, src: &str) -> &str {
        &src[self.lo..self.hi()]
    }

    pub fn wrap<T>(self, inner: T) -> Spanned<T> {
        Spanned { span: self, inner }
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Span({self}, len: {})", self.len)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lo = self.lo;
        let hi = self.hi();
        write!(f, "{lo}..{hi}")
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Spanned<T> {
    pub span: Span,
    pub inner: T,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Const,
    Record,
    Var,
    Val,
    Proc,
    For,
    To,
    By,
    While,
    If,
    Else,
    Return,
    And,
    Or,
    Void,

    True,
    False,

    /// `=`
    Assign,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    /// `==`
    EqEq,
    /// `!=`
    NotEq,
    Less,
    Greater,
    LessEq,
    GreaterEq,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Dot,
    Semicolon,
    Comma,

    Identifier,
    Integer,
    Real,
    String,
    /// A string literal that contains at least one escape sequence.
    EscapedString,

    Whitespace,
    /// `//` up to the end of the line.
    Comment,

    Eof,

    /// Any character the language doesn't know about.
    Unknown,
    ErrorUnclosedString,
}

impl TokenKind {
    pub fn is_trivia(self) -> bool {
        matches!(self, TokenKind::Whitespace | TokenKind::Comment)
    }

    pub fn is_error(self) -> bool {
        matches!(self, TokenKind::Unknown | TokenKind::ErrorUnclosedString)
    }
}

pub static KEYWORDS: phf::Map<&'static str, TokenKind> = phf::phf_map! {
    "const" => TokenKind::Const,
    "record" => TokenKind::Record,
    "var" => TokenKind::Var,
    "val" => TokenKind::Val,
    "proc" => TokenKind::Proc,
    "for" => TokenKind::For,
    "to" => TokenKind::To,
    "by" => TokenKind::By,
    "while" => TokenKind::While,
    "if" => TokenKind::If,
    "else" => TokenKind::Else,
    "return" => TokenKind::Return,
    "and" => TokenKind::And,
    "or" => TokenKind::Or,
    "void" => TokenKind::Void,
    "true" => TokenKind::True,
    "false" => TokenKind::False,
};

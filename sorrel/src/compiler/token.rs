use crate::common::span::Span;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    LeftBrace,
    RightBrace,
    Comma,
    Dot,
    Minus,
    Plus,
    Semicolon,
    Slash,
    Star,

    Bang,
    BangEqual,
    Equal,
    EqualEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,

    Ident,
    Str,
    Number,

    And,
    Class,
    Else,
    False,
    For,
    Fun,
    If,
    Nil,
    Or,
    Print,
    Return,
    Super,
    This,
    True,
    Var,
    While,

    /// A lexical error, carrying its message instead of a lexeme.
    Error(Box<str>),
    Eof,
}

/// A token's position data travels with it so the compiler can stamp
/// every emitted byte with a source location.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    pub line: u32,
    pub column: u32,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span, line: u32, column: u32) -> Token {
        Token {
            kind,
            span,
            line,
            column,
        }
    }

    pub fn empty() -> Token {
        Token::new(TokenKind::Eof, Span::empty(), 0, 0)
    }

    pub fn lexeme(&self) -> &str {
        self.span.slice()
    }
}

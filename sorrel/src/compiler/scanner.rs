use std::rc::Rc;

use crate::common::source::Source;
use crate::common::span::Span;
use crate::compiler::token::{Token, TokenKind};

fn is_alpha(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_' || c == b'$'
}

fn is_digit(c: u8) -> bool {
    c.is_ascii_digit()
}

/// Turns a source buffer into tokens, one call at a time.
///
/// Works on bytes; identifiers and numbers are ASCII, and anything
/// outside the language's character set comes back as an error token.
/// `position` counts columns from 1 and resets to 0 at every newline,
/// so a token's column is `position` minus its length once it has been
/// consumed.
pub struct Scanner {
    pub source: Rc<Source>,
    start: usize,
    current: usize,
    line: u32,
    position: u32,
}

impl Scanner {
    pub fn new(source: Rc<Source>) -> Scanner {
        Scanner {
            source,
            start: 0,
            current: 0,
            line: 1,
            position: 1,
        }
    }

    pub fn scan_token(&mut self) -> Token {
        self.skip_whitespace();
        self.start = self.current;

        if self.is_at_end() {
            return self.make_token(TokenKind::Eof);
        }

        let c = self.advance();
        if is_alpha(c) {
            return self.identifier();
        }
        if is_digit(c) {
            return self.number();
        }

        match c {
            b'(' => self.make_token(TokenKind::LeftParen),
            b')' => self.make_token(TokenKind::RightParen),
            b'[' => self.make_token(TokenKind::LeftBracket),
            b']' => self.make_token(TokenKind::RightBracket),
            b'{' => self.make_token(TokenKind::LeftBrace),
            b'}' => self.make_token(TokenKind::RightBrace),
            b';' => self.make_token(TokenKind::Semicolon),
            b',' => self.make_token(TokenKind::Comma),
            b'.' => self.make_token(TokenKind::Dot),
            b'-' => self.make_token(TokenKind::Minus),
            b'+' => self.make_token(TokenKind::Plus),
            b'/' => self.make_token(TokenKind::Slash),
            b'*' => self.make_token(TokenKind::Star),

            b'!' => {
                if self.match_(b'=') {
                    self.make_token(TokenKind::BangEqual)
                } else {
                    self.make_token(TokenKind::Bang)
                }
            }
            b'=' => {
                if self.match_(b'=') {
                    self.make_token(TokenKind::EqualEqual)
                } else {
                    self.make_token(TokenKind::Equal)
                }
            }
            b'<' => {
                if self.match_(b'=') {
                    self.make_token(TokenKind::LessEqual)
                } else {
                    self.make_token(TokenKind::Less)
                }
            }
            b'>' => {
                if self.match_(b'=') {
                    self.make_token(TokenKind::GreaterEqual)
                } else {
                    self.make_token(TokenKind::Greater)
                }
            }

            b'\'' | b'"' => self.string(c),

            _ => self.error_token("Unexpected character."),
        }
    }

    fn bytes(&self) -> &[u8] {
        self.source.contents.as_bytes()
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.bytes().len()
    }

    fn advance(&mut self) -> u8 {
        let c = self.bytes()[self.current];
        self.current += 1;
        self.position += 1;
        c
    }

    fn peek(&self) -> u8 {
        if self.is_at_end() {
            0
        } else {
            self.bytes()[self.current]
        }
    }

    fn peek_next(&self) -> u8 {
        if self.current + 1 >= self.bytes().len() {
            0
        } else {
            self.bytes()[self.current + 1]
        }
    }

    fn match_(&mut self, expected: u8) -> bool {
        if self.is_at_end() || self.bytes()[self.current] != expected {
            return false;
        }

        self.current += 1;
        self.position += 1;
        true
    }

    fn new_line(&mut self) {
        self.line += 1;
        self.position = 0;
    }

    fn make_token(&self, kind: TokenKind) -> Token {
        let length = (self.current - self.start) as u32;
        Token::new(
            kind,
            Span::new(Rc::clone(&self.source), self.start, self.current),
            self.line,
            self.position.saturating_sub(length),
        )
    }

    fn error_token(&self, message: &str) -> Token {
        Token::new(
            TokenKind::Error(message.into()),
            Span::new(Rc::clone(&self.source), self.start, self.current),
            self.line,
            self.position.saturating_sub(1),
        )
    }

    fn skip_whitespace(&mut self) {
        loop {
            match self.peek() {
                b' ' | b'\r' | b'\t' => {
                    self.advance();
                }
                b'\n' => {
                    self.new_line();
                    self.advance();
                }
                b'/' => {
                    if self.peek_next() == b'/' {
                        // A comment goes until the end of the line.
                        while self.peek() != b'\n' && !self.is_at_end() {
                            self.advance();
                        }
                    } else {
                        return;
                    }
                }
                _ => return,
            }
        }
    }

    fn identifier(&mut self) -> Token {
        while is_alpha(self.peek()) || is_digit(self.peek()) {
            self.advance();
        }

        let kind = match &self.source.contents[self.start..self.current] {
            "and" => TokenKind::And,
            "class" => TokenKind::Class,
            "else" => TokenKind::Else,
            "false" => TokenKind::False,
            "for" => TokenKind::For,
            "fun" => TokenKind::Fun,
            "if" => TokenKind::If,
            "nil" => TokenKind::Nil,
            "or" => TokenKind::Or,
            "print" => TokenKind::Print,
            "return" => TokenKind::Return,
            "super" => TokenKind::Super,
            "this" => TokenKind::This,
            "true" => TokenKind::True,
            "var" => TokenKind::Var,
            "while" => TokenKind::While,
            _ => TokenKind::Ident,
        };

        self.make_token(kind)
    }

    fn number(&mut self) -> Token {
        while is_digit(self.peek()) {
            self.advance();
        }

        // Look for a fractional part.
        if self.peek() == b'.' && is_digit(self.peek_next()) {
            // Consume the ".".
            self.advance();

            while is_digit(self.peek()) {
                self.advance();
            }
        }

        self.make_token(TokenKind::Number)
    }

    fn string(&mut self, delimiter: u8) -> Token {
        while self.peek() != delimiter && !self.is_at_end() {
            if self.peek() == b'\n' {
                self.new_line();
            }
            self.advance();
        }

        if self.is_at_end() {
            return self.error_token("Unterminated string.");
        }

        // The closing quote.
        self.advance();
        self.make_token(TokenKind::Str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(src: &str) -> Vec<Token> {
        let mut scanner = Scanner::new(Source::source(src));
        let mut tokens = Vec::new();
        loop {
            let token = scanner.scan_token();
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                break;
            }
        }
        tokens
    }

    #[test]
    fn operators() {
        let kinds: Vec<TokenKind> = scan("( ) [ ] { } , . - + / * ; ! != = == < <= > >=")
            .into_iter()
            .map(|t| t.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::LeftParen,
                TokenKind::RightParen,
                TokenKind::LeftBracket,
                TokenKind::RightBracket,
                TokenKind::LeftBrace,
                TokenKind::RightBrace,
                TokenKind::Comma,
                TokenKind::Dot,
                TokenKind::Minus,
                TokenKind::Plus,
                TokenKind::Slash,
                TokenKind::Star,
                TokenKind::Semicolon,
                TokenKind::Bang,
                TokenKind::BangEqual,
                TokenKind::Equal,
                TokenKind::EqualEqual,
                TokenKind::Less,
                TokenKind::LessEqual,
                TokenKind::Greater,
                TokenKind::GreaterEqual,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn keywords_and_identifiers() {
        let tokens = scan("var x$1 = nil");
        assert_eq!(tokens[0].kind, TokenKind::Var);
        assert_eq!(tokens[1].kind, TokenKind::Ident);
        assert_eq!(tokens[1].lexeme(), "x$1");
        assert_eq!(tokens[2].kind, TokenKind::Equal);
        assert_eq!(tokens[3].kind, TokenKind::Nil);
    }

    #[test]
    fn numbers() {
        let tokens = scan("12 3.25 4.");
        assert_eq!(tokens[0].lexeme(), "12");
        assert_eq!(tokens[1].lexeme(), "3.25");
        // A trailing dot is not part of the number.
        assert_eq!(tokens[2].lexeme(), "4");
        assert_eq!(tokens[3].kind, TokenKind::Dot);
    }

    #[test]
    fn strings_with_both_delimiters() {
        let tokens = scan("'one' \"two\"");
        assert_eq!(tokens[0].kind, TokenKind::Str);
        assert_eq!(tokens[0].lexeme(), "'one'");
        assert_eq!(tokens[1].lexeme(), "\"two\"");
    }

    #[test]
    fn unterminated_string() {
        let tokens = scan("'oops");
        assert_eq!(
            tokens[0].kind,
            TokenKind::Error("Unterminated string.".into())
        );
    }

    #[test]
    fn unexpected_character() {
        let tokens = scan("@");
        assert_eq!(
            tokens[0].kind,
            TokenKind::Error("Unexpected character.".into())
        );
    }

    #[test]
    fn comments_are_skipped() {
        let tokens = scan("1 // the rest is noise\n2");
        assert_eq!(tokens[0].lexeme(), "1");
        assert_eq!(tokens[1].lexeme(), "2");
        assert_eq!(tokens[1].line, 2);
    }

    #[test]
    fn lines_and_columns() {
        let tokens = scan("ab\n  cd");
        assert_eq!((tokens[0].line, tokens[0].column), (1, 1));
        assert_eq!((tokens[1].line, tokens[1].column), (2, 3));
    }

    #[test]
    fn positions_reconstruct_the_source() {
        let src = "var total = 0;\nfun bump(n) {\n  total = total + n;\n}\nprint total, 'done';";

        // Lay every lexeme back down at its recorded line and column;
        // the result must be the original text.
        let mut rebuilt = String::new();
        let (mut line, mut column) = (1u32, 1u32);
        for token in scan(src) {
            if token.kind == TokenKind::Eof {
                break;
            }
            while line < token.line {
                rebuilt.push('\n');
                line += 1;
                column = 1;
            }
            while column < token.column {
                rebuilt.push(' ');
                column += 1;
            }
            rebuilt.push_str(token.lexeme());
            column += token.lexeme().len() as u32;
        }

        assert_eq!(rebuilt, src);
    }

    #[test]
    fn string_counts_embedded_newlines() {
        let tokens = scan("'a\nb'\nc");
        assert_eq!(tokens[0].line, 2);
        assert_eq!(tokens[1].lexeme(), "c");
        assert_eq!(tokens[1].line, 3);
    }
}

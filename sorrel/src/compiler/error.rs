use std::fmt;

use crate::common::span::Span;

/// How a syntax error points at the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorContext {
    /// Quote the offending lexeme and underline it.
    Lexeme,
    /// The error is at end of input; there is nothing to quote.
    End,
    /// A lexical error; the message stands alone.
    Bare,
}

/// A compile-time diagnostic tied to a span of source.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxError {
    pub message: String,
    pub span: Span,
    pub line: u32,
    pub column: u32,
    pub context: ErrorContext,
}

impl SyntaxError {
    pub fn new(
        message: impl Into<String>,
        span: Span,
        line: u32,
        column: u32,
        context: ErrorContext,
    ) -> SyntaxError {
        SyntaxError {
            message: message.into(),
            span,
            line,
            column,
            context,
        }
    }
}

impl fmt::Display for SyntaxError {
    /// Renders the fixed diagnostic shape:
    ///
    /// ```text
    /// [main.srl:2:9] Error at 'x': Variable with this name already declared in this scope.
    ///   | var x = x
    ///         ^
    /// ```
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}:{}:{}] Error",
            self.span.source.file_name(),
            self.line,
            self.column
        )?;

        match self.context {
            ErrorContext::End => write!(f, " at end"),
            ErrorContext::Bare => write!(f, ": {}", self.message),
            ErrorContext::Lexeme => {
                writeln!(f, " at '{}': {}", self.span.slice(), self.message)?;

                // The excerpt runs from the start of the offending line
                // to the end of the lexeme.
                let contents = &self.span.source.contents;
                let line_start = contents[..self.span.start]
                    .rfind('\n')
                    .map(|i| i + 1)
                    .unwrap_or(0);
                let excerpt = &contents[line_start..self.span.end];
                let length = self.span.end - self.span.start;

                writeln!(f, "  | {}", excerpt)?;
                write!(
                    f,
                    "    {}{}",
                    " ".repeat(excerpt.len() - length),
                    "^".repeat(length)
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::source::Source;

    #[test]
    fn lexeme_error_format() {
        let source = Source::new("var 1;", "main.srl");
        let error = SyntaxError::new(
            "Expect variable name.",
            Span::new(source, 4, 5),
            1,
            5,
            ErrorContext::Lexeme,
        );

        assert_eq!(
            error.to_string(),
            "[main.srl:1:5] Error at '1': Expect variable name.\n  | var 1\n        ^"
        );
    }

    #[test]
    fn end_of_input_error_format() {
        let source = Source::new("(1", "main.srl");
        let error = SyntaxError::new(
            "Expect ')' after expression.",
            Span::new(source, 2, 2),
            1,
            2,
            ErrorContext::End,
        );

        assert_eq!(error.to_string(), "[main.srl:1:2] Error at end");
    }

    #[test]
    fn bare_error_format() {
        let source = Source::new("'oops", "main.srl");
        let error = SyntaxError::new(
            "Unterminated string.",
            Span::new(source, 0, 5),
            1,
            5,
            ErrorContext::Bare,
        );

        assert_eq!(
            error.to_string(),
            "[main.srl:1:5] Error: Unterminated string."
        );
    }
}

use std::fmt;
use std::rc::Rc;

use crate::common::source::Source;

/// A region of a [`Source`], in byte offsets.
#[derive(Clone, PartialEq)]
pub struct Span {
    pub source: Rc<Source>,
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(source: Rc<Source>, start: usize, end: usize) -> Span {
        Span { source, start, end }
    }

    pub fn from(span: &Span) -> Span {
        Span {
            source: Rc::clone(&span.source),
            start: span.start,
            end: span.end,
        }
    }

    pub fn empty() -> Span {
        Span {
            source: Source::source(""),
            start: 0,
            end: 0,
        }
    }

    /// The slice of source text this span covers.
    pub fn slice(&self) -> &str {
        &self.source.contents[self.start..self.end]
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Span({}, {})", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_slice() {
        let source = Source::source("1 + 2 * 3");
        let span = Span::new(source, 4, 9);
        assert_eq!(span.slice(), "2 * 3");
    }
}

//! Source locations carried by items so errors can point at the offending token.

use core::ops::Range;
use ecow::EcoString;

/// A byte range into the source the head tree was parsed from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Span(pub Range<usize>);

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Span(start..end)
    }
}

impl From<Range<usize>> for Span {
    fn from(range: Range<usize>) -> Self {
        Span(range)
    }
}

impl From<Span> for miette::SourceSpan {
    fn from(span: Span) -> Self {
        span.0.into()
    }
}

/// The text of a token together with where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Token {
    pub text: EcoString,
    pub span: Span,
}

impl Token {
    pub fn new(text: impl Into<EcoString>, span: Span) -> Self {
        Token {
            text: text.into(),
            span,
        }
    }
}

impl core::fmt::Display for Token {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.text)
    }
}

use std::fmt;

use serde::{Deserialize, Serialize};

/// Zero-based position within a document.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TextPosition {
    pub line: u32,
    pub column: u32,
}

impl TextPosition {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for TextPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Inclusive span between two positions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextInterval {
    pub start: TextPosition,
    pub end: TextPosition,
}

impl TextInterval {
    pub fn new(start: TextPosition, end: TextPosition) -> Self {
        Self { start, end }
    }
}

/// A span anchored to a specific document, used to navigate from results,
/// commands, and reference resolvers back to source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextLocation {
    pub document_id: String,
    pub interval: TextInterval,
}

impl TextLocation {
    pub fn new(document_id: impl Into<String>, interval: TextInterval) -> Self {
        Self {
            document_id: document_id.into(),
            interval,
        }
    }

    /// Convenience for a span covering `[start_line:start_col, end_line:end_col]`.
    pub fn span(
        document_id: impl Into<String>,
        start_line: u32,
        start_col: u32,
        end_line: u32,
        end_col: u32,
    ) -> Self {
        Self::new(
            document_id,
            TextInterval::new(
                TextPosition::new(start_line, start_col),
                TextPosition::new(end_line, end_col),
            ),
        )
    }
}

impl fmt::Display for TextLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}-{}]",
            self.document_id, self.interval.start, self.interval.end
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let location = TextLocation::span("doc.mdsl", 1, 0, 3, 10);
        assert_eq!(location.to_string(), "doc.mdsl[1:0-3:10]");
    }

    #[test]
    fn test_value_equality() {
        assert_eq!(
            TextLocation::span("a", 0, 0, 0, 1),
            TextLocation::span("a", 0, 0, 0, 1)
        );
        assert_ne!(
            TextLocation::span("a", 0, 0, 0, 1),
            TextLocation::span("b", 0, 0, 0, 1)
        );
    }
}

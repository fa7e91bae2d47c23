//! Source positions

use serde::{Deserialize, Serialize};

/// Byte range into the source file a node was parsed from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_len() {
        assert_eq!(Span::new(1, 9).len(), 8);
        assert!(Span::new(4, 4).is_empty());
        assert!(Span::new(9, 4).is_empty());
    }
}

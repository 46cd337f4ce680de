//! Source locations

use serde::{Deserialize, Serialize};

/// Character range into the source text (`start..end`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    /// Create a new span
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Placeholder span for synthesized nodes and native declarations
    pub fn dummy() -> Self {
        Self { start: 0, end: 0 }
    }

    /// Smallest span covering both `self` and `other`
    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
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
    fn test_merge_orders_bounds() {
        let a = Span::new(10, 12);
        let b = Span::new(2, 5);
        assert_eq!(a.merge(b), Span::new(2, 12));
        assert_eq!(b.merge(a), Span::new(2, 12));
    }

    #[test]
    fn test_dummy_is_empty() {
        assert!(Span::dummy().is_empty());
        assert_eq!(Span::new(3, 7).len(), 4);
    }
}

use derive_new::new;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// The positions `from..to` that a step acts on
#[derive(Copy, Clone, Debug, Deserialize, Serialize, PartialEq, Eq, new)]
pub struct Span {
    /// Start of the span
    pub from: usize,
    /// End of the span
    pub to: usize,
}

impl Span {
    /// The number of positions covered by the span
    pub fn len(&self) -> usize {
        self.to - self.from
    }

    /// Whether the span covers no positions
    pub fn is_empty(&self) -> bool {
        self.from == self.to
    }

    /// The span as a range, for slicing and replacing
    pub fn range(&self) -> Range<usize> {
        self.from..self.to
    }

    /// Whether the spans overlap or meet at an end point
    pub fn touches(&self, other: &Span) -> bool {
        self.from <= other.to && self.to >= other.from
    }

    /// The smallest span containing both
    pub fn cover(&self, other: &Span) -> Span {
        Span::new(self.from.min(other.from), self.to.max(other.to))
    }
}

#[cfg(test)]
mod tests {
    use super::Span;

    #[test]
    fn touching_spans() {
        let a = Span::new(2, 5);
        assert!(a.touches(&Span::new(5, 8)));
        assert!(!a.touches(&Span::new(6, 8)));
        assert_eq!(a.cover(&Span::new(0, 3)), Span::new(0, 5));
        assert_eq!(a.range(), 2..5);
        assert!(Span::new(4, 4).is_empty());
    }
}

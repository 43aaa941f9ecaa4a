use std::ops::{Bound, RangeBounds};

/// The first position covered by `range`.
pub fn from<R: RangeBounds<usize>>(range: &R) -> usize {
    match range.start_bound() {
        Bound::Included(&start) => start,
        Bound::Excluded(&start) => start + 1,
        Bound::Unbounded => 0,
    }
}

/// The position after the last one covered by `range`, or `max` if it is open-ended.
pub fn to<R: RangeBounds<usize>>(range: &R, max: usize) -> usize {
    match range.end_bound() {
        Bound::Included(&end) => end + 1,
        Bound::Excluded(&end) => end,
        Bound::Unbounded => max,
    }
}

// Byte index of the UTF-16 `offset` in `text`. An offset inside a surrogate pair rounds
// down to the start of that character, an offset past the end gives the length.
fn byte_index_utf16(text: &str, offset: usize) -> usize {
    let mut units = 0;
    for (index, c) in text.char_indices() {
        units += c.len_utf16();
        if units > offset {
            return index;
        }
    }
    text.len()
}

/// The part of `text` between the two UTF-16 offsets.
pub fn slice_utf16(text: &str, from: usize, to: usize) -> &str {
    let start = byte_index_utf16(text, from);
    let end = byte_index_utf16(text, to).max(start);
    &text[start..end]
}

#[cfg(test)]
mod tests {
    use super::{from, slice_utf16, to};

    #[test]
    fn range_bounds() {
        assert_eq!((from(&(2..5)), to(&(2..5), 9)), (2, 5));
        assert_eq!((from(&(..=3)), to(&(..=3), 9)), (0, 4));
        assert_eq!((from(&(4..)), to(&(4..), 9)), (4, 9));
    }

    #[test]
    fn slices_by_utf16_units() {
        assert_eq!(slice_utf16("ab\u{1F60A}cd", 0, 4), "ab\u{1F60A}");
        assert_eq!(slice_utf16("ab\u{1F60A}cd", 4, 6), "cd");
        assert_eq!(slice_utf16("hello", 1, 3), "el");
        assert_eq!(slice_utf16("hello", 2, 99), "llo");
        assert_eq!(slice_utf16("hello", 4, 2), "");
    }
}

use derive_new::new;
use std::fmt;

const DEL_BEFORE: u8 = 1;
const DEL_AFTER: u8 = 2;
const DEL_ACROSS: u8 = 4;
const DEL_SIDE: u8 = 8;

/// The side a mapped position sticks to when content is inserted right at it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Assoc {
    /// Stay in front of inserted content
    Left,
    /// Move past inserted content
    Right,
}

impl Default for Assoc {
    fn default() -> Self {
        Assoc::Right
    }
}

/// Points back into a range of a [`StepMap`], so that a position deleted by one map can be
/// restored by its mirror.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, new)]
pub struct Recover {
    /// The index of the range in the step map
    pub index: usize,
    /// The offset of the position from the start of that range
    pub offset: usize,
}

/// An object representing a mapped position with extra information.
#[derive(Debug, Copy, Clone, PartialEq, Eq, new)]
pub struct MapResult {
    /// The mapped version of the position.
    pub pos: usize,
    del_info: u8,
    /// Where to find the position again when a mirrored map restores the range.
    pub recover: Option<Recover>,
}

impl MapResult {
    /// Tells you whether the position was deleted, that is, whether the step removed the
    /// token on the side queried (via the `assoc`) argument from the document.
    pub fn deleted(&self) -> bool {
        self.del_info & DEL_SIDE > 0
    }

    /// Tells you whether the token before the mapped position was deleted.
    pub fn deleted_before(&self) -> bool {
        self.del_info & (DEL_BEFORE | DEL_SIDE) > 0
    }

    /// True when the token after the mapped position was deleted.
    pub fn deleted_after(&self) -> bool {
        self.del_info & (DEL_AFTER | DEL_SIDE) > 0
    }

    /// Tells whether any of the steps mapped through deletes across the position (including
    /// both the token before and after the position).
    pub fn deleted_across(&self) -> bool {
        self.del_info & DEL_ACROSS > 0
    }
}

/// There are several things that positions can be mapped through. Such objects conform to
/// this trait.
pub trait Mappable {
    /// Map a position through this object. When given, `assoc` determines which side the
    /// position is associated with, which determines in which direction to move when a chunk
    /// of content is inserted at the mapped position.
    fn map(&self, pos: usize, assoc: Assoc) -> usize;

    /// Map a position, and return an object containing additional information about the
    /// mapping. The result's `deleted` field tells you whether the position was deleted
    /// (completely enclosed in a replaced range) during the mapping.
    fn map_result(&self, pos: usize, assoc: Assoc) -> MapResult;
}

/// A map describing the deletions and insertions made by a step, which can be used to find
/// the correspondence between positions in the pre-step version of a document and the same
/// position in the post-step version.
///
/// The ranges are stored as a flat list of `[start, old_size, new_size]` triples.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepMap {
    ranges: Vec<usize>,
    inverted: bool,
}

impl StepMap {
    /// Create a position map. The modifications to the document are represented as an array
    /// of numbers, in which each group of three represents a modified chunk as `[start,
    /// old_size, new_size]`.
    pub fn new(ranges: Vec<usize>, inverted: bool) -> Self {
        debug_assert!(ranges.len() % 3 == 0, "step map ranges come in triples");
        StepMap { ranges, inverted }
    }

    /// A step map that contains no changed ranges.
    pub fn empty() -> Self {
        StepMap::default()
    }

    /// Create a map that moves all positions by offset `n` (which may be negative). This can
    /// be useful when applying steps meant for a sub-document to a larger document, or
    /// vice-versa.
    pub fn offset(n: isize) -> Self {
        match n {
            0 => StepMap::empty(),
            n if n < 0 => StepMap::new(vec![0, n.unsigned_abs(), 0], false),
            n => StepMap::new(vec![0, 0, n.unsigned_abs()], false),
        }
    }

    /// The raw range triples
    pub fn ranges(&self) -> &[usize] {
        &self.ranges
    }

    /// Whether this map describes the inverse of its ranges
    pub fn is_inverted(&self) -> bool {
        self.inverted
    }

    fn sizes(&self, range: &[usize]) -> (isize, isize) {
        if self.inverted {
            (range[2] as isize, range[1] as isize)
        } else {
            (range[1] as isize, range[2] as isize)
        }
    }

    /// Find the position a recover value points at.
    pub fn recover(&self, value: Recover) -> usize {
        let mut diff = 0isize;
        if !self.inverted {
            for range in self.ranges.chunks_exact(3).take(value.index) {
                diff += range[2] as isize - range[1] as isize;
            }
        }
        (self.ranges[value.index * 3] as isize + diff) as usize + value.offset
    }

    fn map_inner(&self, pos: usize, assoc: Assoc) -> MapResult {
        let pos = pos as isize;
        let mut diff = 0isize;
        for (i, range) in self.ranges.chunks_exact(3).enumerate() {
            let start = range[0] as isize - if self.inverted { diff } else { 0 };
            if start > pos {
                break;
            }
            let (old_size, new_size) = self.sizes(range);
            let end = start + old_size;
            if pos <= end {
                let side = if old_size == 0 {
                    assoc
                } else if pos == start {
                    Assoc::Left
                } else if pos == end {
                    Assoc::Right
                } else {
                    assoc
                };
                let result = start + diff + if side == Assoc::Left { 0 } else { new_size };
                let sticky = if assoc == Assoc::Left { start } else { end };
                let recover = if pos == sticky {
                    None
                } else {
                    Some(Recover::new(i, (pos - start) as usize))
                };
                let mut del = if pos == start {
                    DEL_AFTER
                } else if pos == end {
                    DEL_BEFORE
                } else {
                    DEL_ACROSS
                };
                if pos != sticky {
                    del |= DEL_SIDE;
                }
                return MapResult::new(result as usize, del, recover);
            }
            diff += new_size - old_size;
        }
        MapResult::new((pos + diff) as usize, 0, None)
    }

    /// Whether the range identified by `recover` still touches `pos`.
    pub fn touches(&self, pos: usize, recover: Recover) -> bool {
        let pos = pos as isize;
        let mut diff = 0isize;
        for (i, range) in self.ranges.chunks_exact(3).enumerate() {
            let start = range[0] as isize - if self.inverted { diff } else { 0 };
            if start > pos {
                break;
            }
            let (old_size, new_size) = self.sizes(range);
            if pos <= start + old_size && i == recover.index {
                return true;
            }
            diff += new_size - old_size;
        }
        false
    }

    /// Calls the given function on each of the changed ranges included in this map, with
    /// `(old_start, old_end, new_start, new_end)`.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(usize, usize, usize, usize),
    {
        let mut diff = 0isize;
        for range in self.ranges.chunks_exact(3) {
            let start = range[0] as isize;
            let old_start = start - if self.inverted { diff } else { 0 };
            let new_start = start + if self.inverted { 0 } else { diff };
            let (old_size, new_size) = self.sizes(range);
            f(
                old_start as usize,
                (old_start + old_size) as usize,
                new_start as usize,
                (new_start + new_size) as usize,
            );
            diff += new_size - old_size;
        }
    }

    /// Create an inverted version of this map. The result can be used to map positions in the
    /// post-step document to the pre-step document.
    pub fn invert(&self) -> StepMap {
        StepMap::new(self.ranges.clone(), !self.inverted)
    }
}

impl Mappable for StepMap {
    fn map(&self, pos: usize, assoc: Assoc) -> usize {
        self.map_inner(pos, assoc).pos
    }

    fn map_result(&self, pos: usize, assoc: Assoc) -> MapResult {
        self.map_inner(pos, assoc)
    }
}

impl fmt::Display for StepMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.inverted {
            f.write_str("-")?;
        }
        write!(f, "{:?}", self.ranges)
    }
}

/// A mapping represents a pipeline of zero or more [step maps](StepMap). It has special
/// provisions for losslessly handling mapping positions through a series of steps in which
/// some steps are inverted versions of earlier steps. (This comes up when 'rebasing' steps
/// for collaboration or history management.)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mapping {
    maps: Vec<StepMap>,
    mirror: Vec<(usize, usize)>,
    from: usize,
    to: usize,
}

impl Mapping {
    /// Create a new, empty mapping
    pub fn new() -> Self {
        Mapping::default()
    }

    /// Create a mapping over the given maps
    pub fn from_maps(maps: Vec<StepMap>) -> Self {
        let to = maps.len();
        Mapping {
            maps,
            mirror: Vec::new(),
            from: 0,
            to,
        }
    }

    /// The step maps in this mapping.
    pub fn maps(&self) -> &[StepMap] {
        &self.maps
    }

    /// The starting position in the `maps` array, used when `map` or `map_result` is called.
    pub fn from(&self) -> usize {
        self.from
    }

    /// The end position in the `maps` array.
    pub fn to(&self) -> usize {
        self.to
    }

    /// Create a mapping that maps only through a part of this one.
    pub fn slice(&self, from: usize, to: usize) -> Mapping {
        Mapping {
            maps: self.maps.clone(),
            mirror: self.mirror.clone(),
            from,
            to,
        }
    }

    /// Add a step map to the end of this mapping. If `mirrors` is given, it should be the
    /// index of the step map that is the mirror image of this one.
    pub fn append_map(&mut self, map: StepMap, mirrors: Option<usize>) {
        self.maps.push(map);
        self.to = self.maps.len();
        if let Some(mirrors) = mirrors {
            self.set_mirror(self.maps.len() - 1, mirrors);
        }
    }

    /// Add all the step maps in a given mapping to this one (preserving mirroring
    /// information).
    pub fn append_mapping(&mut self, mapping: &Mapping) {
        let start_size = self.maps.len();
        for (i, map) in mapping.maps.iter().enumerate() {
            let mirror = mapping
                .get_mirror(i)
                .filter(|&m| m < i)
                .map(|m| start_size + m);
            self.append_map(map.clone(), mirror);
        }
    }

    /// Append the inverse of the given mapping to this one.
    pub fn append_mapping_inverted(&mut self, mapping: &Mapping) {
        let total_size = self.maps.len() + mapping.maps.len();
        for (i, map) in mapping.maps.iter().enumerate().rev() {
            let mirror = mapping
                .get_mirror(i)
                .filter(|&m| m > i)
                .map(|m| total_size - m - 1);
            self.append_map(map.invert(), mirror);
        }
    }

    /// Create an inverted version of this mapping.
    pub fn invert(&self) -> Mapping {
        let mut inverse = Mapping::new();
        inverse.append_mapping_inverted(self);
        inverse
    }

    /// Find the index of the map mirroring map `n`, if any.
    pub fn get_mirror(&self, n: usize) -> Option<usize> {
        self.mirror.iter().find_map(|&(a, b)| {
            if a == n {
                Some(b)
            } else if b == n {
                Some(a)
            } else {
                None
            }
        })
    }

    /// Record that maps `n` and `m` mirror each other.
    pub fn set_mirror(&mut self, n: usize, m: usize) {
        self.mirror.push((n, m));
    }

    fn map_inner(&self, mut pos: usize, assoc: Assoc) -> MapResult {
        let mut del_info = 0;
        let mut i = self.from;
        while i < self.to {
            let result = self.maps[i].map_result(pos, assoc);
            if let Some(recover) = result.recover {
                if let Some(corr) = self.get_mirror(i).filter(|&c| c > i && c < self.to) {
                    pos = self.maps[corr].recover(recover);
                    i = corr + 1;
                    continue;
                }
            }
            del_info |= result.del_info;
            pos = result.pos;
            i += 1;
        }
        MapResult::new(pos, del_info, None)
    }
}

impl Mappable for Mapping {
    fn map(&self, pos: usize, assoc: Assoc) -> usize {
        self.map_inner(pos, assoc).pos
    }

    fn map_result(&self, pos: usize, assoc: Assoc) -> MapResult {
        self.map_inner(pos, assoc)
    }
}

#[cfg(test)]
mod tests {
    use super::{Assoc, Mappable, Mapping, StepMap};

    fn mk(maps: &[[usize; 3]], mirrors: &[(usize, usize)]) -> Mapping {
        let mut mapping = Mapping::new();
        for m in maps {
            mapping.append_map(StepMap::new(m.to_vec(), false), None);
        }
        for &(a, b) in mirrors {
            mapping.set_mirror(a, b);
        }
        mapping
    }

    fn check(mapping: &Mapping, cases: &[(usize, usize, Assoc, bool)]) {
        let inverted = mapping.invert();
        for &(from, to, assoc, lossy) in cases {
            assert_eq!(mapping.map(from, assoc), to, "mapping {}", from);
            if !lossy {
                assert_eq!(inverted.map(to, assoc), from, "inverse mapping {}", to);
            }
        }
    }

    use Assoc::{Left, Right};

    #[test]
    fn test_single_insertion() {
        let m = mk(&[[2, 0, 4]], &[]);
        check(&m, &[(0, 0, Right, false), (2, 6, Right, false), (2, 2, Left, false), (3, 7, Right, false)]);
    }

    #[test]
    fn test_single_deletion() {
        let m = mk(&[[2, 4, 0]], &[]);
        check(
            &m,
            &[
                (0, 0, Right, false),
                (2, 2, Left, false),
                (3, 2, Right, true),
                (6, 2, Right, false),
                (6, 2, Left, true),
                (7, 3, Right, false),
            ],
        );
    }

    #[test]
    fn test_single_replace() {
        let m = mk(&[[2, 4, 4]], &[]);
        check(
            &m,
            &[
                (0, 0, Right, false),
                (2, 2, Right, false),
                (4, 6, Right, true),
                (4, 2, Left, true),
                (6, 6, Left, false),
                (8, 8, Right, false),
            ],
        );
    }

    #[test]
    fn test_mirrored_delete_insert() {
        let m = mk(&[[2, 4, 0], [2, 0, 4]], &[(0, 1)]);
        check(
            &m,
            &[
                (0, 0, Right, false),
                (2, 2, Right, false),
                (4, 4, Right, false),
                (6, 6, Right, false),
                (7, 7, Right, false),
            ],
        );
    }

    #[test]
    fn test_mirrored_insert_delete() {
        let m = mk(&[[2, 0, 4], [2, 4, 0]], &[(0, 1)]);
        check(&m, &[(0, 0, Right, false), (2, 2, Right, false), (3, 3, Right, false)]);
    }

    #[test]
    fn test_delete_insert_with_insert_between() {
        let m = mk(&[[2, 4, 0], [1, 0, 1], [3, 0, 4]], &[(0, 2)]);
        check(
            &m,
            &[
                (0, 0, Right, false),
                (1, 2, Right, false),
                (4, 5, Right, false),
                (6, 7, Right, false),
                (7, 8, Right, false),
            ],
        );
    }

    #[test]
    fn test_map_result_flags() {
        let map = StepMap::new(vec![2, 4, 0], false);
        let inside = map.map_result(3, Assoc::Right);
        assert!(inside.deleted_across());
        assert!(inside.deleted_before() && inside.deleted_after());
        let at_start = map.map_result(2, Assoc::Right);
        assert!(at_start.deleted_after());
        assert!(!at_start.deleted_across());
        assert!(at_start.recover.is_some());
        assert!(map.touches(3, inside.recover.unwrap()));
        assert_eq!(map.recover(inside.recover.unwrap()), 3);
    }

    #[test]
    fn test_offset_and_for_each() {
        assert_eq!(StepMap::offset(3).map(5, Assoc::Right), 8);
        assert_eq!(StepMap::offset(-2).map(5, Assoc::Right), 3);
        assert_eq!(StepMap::offset(0), StepMap::empty());

        let map = StepMap::new(vec![2, 1, 3, 10, 2, 0], false);
        let mut seen = vec![];
        map.for_each(|a, b, c, d| seen.push((a, b, c, d)));
        assert_eq!(seen, vec![(2, 3, 2, 5), (10, 12, 12, 12)]);
        assert_eq!(map.invert().to_string(), "-[2, 1, 3, 10, 2, 0]");
    }

    #[test]
    fn test_slice_and_append() {
        let m = mk(&[[0, 0, 2], [0, 0, 3]], &[]);
        assert_eq!(m.map(0, Assoc::Right), 5);
        assert_eq!(m.slice(1, 2).map(0, Assoc::Right), 3);
        let mut joined = Mapping::new();
        joined.append_mapping(&m);
        joined.append_mapping_inverted(&m);
        assert_eq!(joined.maps().len(), 4);
        assert_eq!(joined.map(1, Assoc::Right), 1);
    }
}

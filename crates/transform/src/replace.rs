use crate::{insert_point, ReplaceAroundStep, ReplaceStep, Step, Transform, TransformError};
use parchment_model::{Attrs, ContentMatch, Fragment, Node, NodeType, ResolveErr, ResolvedPos, Slice};
use tracing::debug;

/// ‘Fit’ a slice into a given position in the document, producing a [step](Step) that
/// inserts it. Will return `None` if there's no meaningful way to insert the slice here, or
/// inserting it would be a no-op (an empty slice over an empty range).
pub fn replace_step(
    doc: &Node,
    from: usize,
    to: usize,
    slice: &Slice,
) -> Result<Option<Step>, ResolveErr> {
    if from == to && slice.size() == 0 {
        return Ok(None);
    }
    let rp_from = doc.resolve(from)?;
    let rp_to = doc.resolve(to)?;
    if fits_trivially(&rp_from, &rp_to, slice) {
        return Ok(Some(ReplaceStep::new(from, to, slice.clone(), false).into()));
    }
    let step = Fitter::new(rp_from, rp_to, slice.clone()).and_then(Fitter::fit);
    if step.is_none() {
        debug!(from, to, "no step fits the slice");
    }
    Ok(step)
}

fn fits_trivially(rp_from: &ResolvedPos, rp_to: &ResolvedPos, slice: &Slice) -> bool {
    slice.open_start == 0
        && slice.open_end == 0
        && rp_from.start(rp_from.depth()) == rp_to.start(rp_to.depth())
        && rp_from.parent().can_replace(
            rp_from.index(rp_from.depth()),
            rp_to.index(rp_to.depth()),
            Some(&slice.content),
            ..,
        )
}

#[derive(Debug, Clone)]
struct FrontierEntry {
    r#type: NodeType,
    r#match: ContentMatch,
}

struct Fittable {
    slice_depth: usize,
    frontier_depth: usize,
    parent: Option<Node>,
    inject: Option<Fragment>,
    wrap: Option<Vec<NodeType>>,
}

struct CloseLevel {
    depth: usize,
    fit: Fragment,
    r#move: ResolvedPos,
}

// Algorithm for 'placing' the elements of a slice into a gap:
//
// We consider the content of each node that is open to the left to be
// independently placeable. I.e. in <p("foo"), p("bar")>, when the
// paragraph on the left is open, "foo" can be placed (somewhere on
// the left side of the replacement gap) independently from p("bar").
//
// The fitter tracks a "frontier", which is the open nodes on the left of
// the gap along with their content matches. It repeatedly finds a place
// on the frontier where the first node of the unplaced slice fits, moves
// as much content as possible there, and otherwise opens or drops nodes
// of the slice. When the slice is placed, it closes the frontier against
// the content after the gap.
struct Fitter {
    rp_from: ResolvedPos,
    rp_to: ResolvedPos,
    unplaced: Slice,
    frontier: Vec<FrontierEntry>,
    placed: Fragment,
}

impl Fitter {
    fn new(rp_from: ResolvedPos, rp_to: ResolvedPos, unplaced: Slice) -> Option<Fitter> {
        let mut frontier = Vec::with_capacity(rp_from.depth() + 1);
        for i in 0..=rp_from.depth() {
            let node = rp_from.node(i);
            frontier.push(FrontierEntry {
                r#type: node.r#type().clone(),
                r#match: node.content_match_at(rp_from.index_after(i)).ok()?,
            });
        }
        let mut placed = Fragment::new();
        for i in (1..=rp_from.depth()).rev() {
            placed = Fragment::from(rp_from.node(i).copy(move |_| placed));
        }
        Some(Fitter {
            rp_from,
            rp_to,
            unplaced,
            frontier,
            placed,
        })
    }

    fn depth(&self) -> usize {
        self.frontier.len() - 1
    }

    fn fit(mut self) -> Option<Step> {
        while self.unplaced.size() > 0 {
            match self.find_fittable() {
                Some(fittable) => self.place_nodes(fittable)?,
                None => {
                    if !self.open_more() {
                        self.drop_node()
                    }
                }
            }
        }
        let move_inline = self.must_move_inline();
        let placed_size = self
            .placed
            .size()
            .saturating_sub(self.depth() + self.rp_from.depth());
        let rp_from = self.rp_from.clone();
        let target = match move_inline {
            Some(pos) => rp_from.doc().resolve(pos).ok()?,
            None => self.rp_to.clone(),
        };
        let rp_to = self.close(target)?;

        // Normalize by dropping open parent nodes
        let mut content = self.placed.clone();
        let mut open_start = rp_from.depth();
        let mut open_end = rp_to.depth();
        while open_start > 0 && open_end > 0 && content.child_count() == 1 {
            content = content.first_child()?.content().clone();
            open_start -= 1;
            open_end -= 1;
        }
        let slice = Slice::new(content, open_start, open_end);
        if let Some(move_inline) = move_inline {
            let step = ReplaceAroundStep::new(
                rp_from.pos(),
                move_inline,
                self.rp_to.pos(),
                self.rp_to.end(self.rp_to.depth()),
                slice,
                placed_size,
                false,
            );
            return Some(step.into());
        }
        if slice.size() > 0 || rp_from.pos() != self.rp_to.pos() {
            return Some(ReplaceStep::new(rp_from.pos(), rp_to.pos(), slice, false).into());
        }
        None
    }

    // Find a position on the start spine of `self.unplaced` that has
    // content that can be moved somewhere on the frontier. Returns two
    // depths, one for the slice and one for the frontier.
    fn find_fittable(&self) -> Option<Fittable> {
        let mut start_depth = self.unplaced.open_start;
        let mut cur = self.unplaced.content.clone();
        let mut open_end = self.unplaced.open_end;
        for d in 0..self.unplaced.open_start {
            let node = match cur.first_child() {
                Some(node) => node.clone(),
                None => break,
            };
            if cur.child_count() > 1 {
                open_end = 0;
            }
            if node.r#type().is_isolating() && open_end <= d {
                start_depth = d;
                break;
            }
            cur = node.content().clone();
        }

        // Only try wrapping nodes (pass 2) after finding a place without wrapping failed.
        for pass in 1..=2 {
            let top = if pass == 1 {
                start_depth
            } else {
                self.unplaced.open_start
            };
            for slice_depth in (0..=top).rev() {
                let (fragment, parent) = if slice_depth > 0 {
                    match content_at(&self.unplaced.content, slice_depth - 1).first_child() {
                        Some(parent) => (parent.content().clone(), Some(parent.clone())),
                        None => continue,
                    }
                } else {
                    (self.unplaced.content.clone(), None)
                };
                let first = fragment.first_child();
                for frontier_depth in (0..=self.depth()).rev() {
                    let FrontierEntry { r#type, r#match } = &self.frontier[frontier_depth];
                    if pass == 1 {
                        // The next node matches, or there is no next node but the parents
                        // look compatible.
                        let inject = match (first, &parent) {
                            (Some(first), _) => {
                                if r#match.match_type(first.r#type()).is_some() {
                                    Some(None)
                                } else {
                                    r#match
                                        .fill_before(&Fragment::from(first.clone()), false, 0)
                                        .map(Some)
                                }
                            }
                            (None, Some(parent)) if r#type.compatible_content(parent.r#type()) => {
                                Some(None)
                            }
                            (None, _) => None,
                        };
                        if let Some(inject) = inject {
                            return Some(Fittable {
                                slice_depth,
                                frontier_depth,
                                parent,
                                inject,
                                wrap: None,
                            });
                        }
                    } else if let Some(first) = first {
                        if let Some(wrap) = r#match.find_wrapping(first.r#type()) {
                            return Some(Fittable {
                                slice_depth,
                                frontier_depth,
                                parent,
                                inject: None,
                                wrap: Some(wrap),
                            });
                        }
                    }
                    // Don't continue looking further up if the parent node would fit here.
                    if let Some(parent) = &parent {
                        if r#match.match_type(parent.r#type()).is_some() {
                            break;
                        }
                    }
                }
            }
        }
        None
    }

    fn open_more(&mut self) -> bool {
        let slice = &self.unplaced;
        let inner = content_at(&slice.content, slice.open_start);
        match inner.first_child() {
            Some(first) if !first.is_leaf() => {}
            _ => return false,
        }
        let open_end = if inner.size() + slice.open_start >= slice.content.size().saturating_sub(slice.open_end) {
            slice.open_start + 1
        } else {
            0
        };
        self.unplaced = Slice::new(
            slice.content.clone(),
            slice.open_start + 1,
            slice.open_end.max(open_end),
        );
        true
    }

    fn drop_node(&mut self) {
        let slice = &self.unplaced;
        let open_start = slice.open_start;
        let inner = content_at(&slice.content, open_start);
        self.unplaced = if inner.child_count() <= 1 && open_start > 0 {
            let open_at_end = slice.content.size().saturating_sub(open_start) <= open_start + inner.size();
            Slice::new(
                drop_from_fragment(&slice.content, open_start - 1, 1),
                open_start - 1,
                if open_at_end { open_start - 1 } else { slice.open_end },
            )
        } else {
            Slice::new(
                drop_from_fragment(&slice.content, open_start, 1),
                open_start,
                slice.open_end,
            )
        };
    }

    // Move content from the unplaced slice at `slice_depth` to the frontier node at
    // `frontier_depth`. Close that frontier node when applicable.
    fn place_nodes(&mut self, fittable: Fittable) -> Option<()> {
        let Fittable {
            slice_depth,
            frontier_depth,
            parent,
            inject,
            wrap,
        } = fittable;
        while self.depth() > frontier_depth {
            self.close_frontier_node()?;
        }
        if let Some(wrap) = wrap {
            for r#type in &wrap {
                self.open_frontier_node(r#type, None, Fragment::new())?;
            }
        }
        // Content goes into the innermost open node
        let frontier_depth = self.depth();

        let slice = self.unplaced.clone();
        let fragment = match &parent {
            Some(parent) => parent.content().clone(),
            None => slice.content.clone(),
        };
        let open_start = slice.open_start - slice_depth;
        let mut taken = 0;
        let mut add = Vec::new();
        let FrontierEntry { r#type, mut r#match } = self.frontier[frontier_depth].clone();
        if let Some(inject) = inject {
            add.extend(inject.children().iter().cloned());
            r#match = r#match.match_fragment(&inject)?;
        }
        // The amount of (end) open nodes at the end of the fragment. When 0, the parent is
        // open, but no more. When negative, nothing is open.
        let mut open_end_count = (fragment.size() + slice_depth) as isize
            - slice.content.size().saturating_sub(slice.open_end) as isize;
        // Scan over the fragment, fitting as many child nodes as possible.
        while taken < fragment.child_count() {
            let next = fragment.child(taken);
            let matches = match r#match.match_type(next.r#type()) {
                Some(matches) => matches,
                None => break,
            };
            taken += 1;
            // Drop empty open nodes
            if taken > 1 || open_start == 0 || next.content_size() > 0 {
                r#match = matches;
                let marked = next.mark(r#type.allowed_marks(next.marks()));
                let start = if taken == 1 { open_start } else { 0 };
                let end = if taken == fragment.child_count() {
                    open_end_count
                } else {
                    -1
                };
                add.push(close_node_start(&marked, start, end)?);
            }
        }
        let to_end = taken == fragment.child_count();
        if !to_end {
            open_end_count = -1;
        }

        self.placed = add_to_fragment(&self.placed, frontier_depth, Fragment::from(add));
        self.frontier[frontier_depth].r#match = r#match;

        // If the parent types match, and the entire node was moved, and it's not open, close
        // this frontier node right away.
        if to_end && open_end_count < 0 && self.frontier.len() > 1 {
            if let Some(parent) = &parent {
                if parent.r#type() == &self.frontier[self.depth()].r#type {
                    self.close_frontier_node()?;
                }
            }
        }

        // Add new frontier nodes for any open nodes at the end.
        let mut cur = fragment;
        for _ in 0..open_end_count.max(0) {
            let node = cur.last_child()?.clone();
            self.frontier.push(FrontierEntry {
                r#type: node.r#type().clone(),
                r#match: node.content_match_at(node.child_count()).ok()?,
            });
            cur = node.content().clone();
        }

        // Drop the entire node from which we placed content, or the nodes we placed, when
        // the whole thing was placed.
        self.unplaced = if !to_end {
            Slice::new(
                drop_from_fragment(&slice.content, slice_depth, taken),
                slice.open_start,
                slice.open_end,
            )
        } else if slice_depth == 0 {
            Slice::empty()
        } else {
            Slice::new(
                drop_from_fragment(&slice.content, slice_depth - 1, 1),
                slice_depth - 1,
                if open_end_count < 0 {
                    slice.open_end
                } else {
                    slice_depth - 1
                },
            )
        };
        Some(())
    }

    fn must_move_inline(&self) -> Option<usize> {
        if !self.rp_to.parent().is_textblock() {
            return None;
        }
        let top = &self.frontier[self.depth()];
        if !top.r#type.is_textblock()
            || content_after_fits(&self.rp_to, self.rp_to.depth(), &top.r#type, &top.r#match, false)
                .is_none()
        {
            return None;
        }
        if self.rp_to.depth() == self.depth() {
            if let Some(level) = self.find_close_level(&self.rp_to) {
                if level.depth == self.depth() {
                    return None;
                }
            }
        }

        let mut depth = self.rp_to.depth();
        let mut after = self.rp_to.after(depth);
        while depth > 1 {
            depth -= 1;
            if after != self.rp_to.end(depth) {
                break;
            }
            after += 1;
        }
        Some(after)
    }

    fn find_close_level(&self, rp_to: &ResolvedPos) -> Option<CloseLevel> {
        'scan: for i in (0..=self.depth().min(rp_to.depth())).rev() {
            let FrontierEntry { r#type, r#match } = &self.frontier[i];
            let drop_inner =
                i < rp_to.depth() && rp_to.end(i + 1) == rp_to.pos() + (rp_to.depth() - (i + 1));
            let fit = match content_after_fits(rp_to, i, r#type, r#match, drop_inner) {
                Some(fit) => fit,
                None => continue,
            };
            for d in (0..i).rev() {
                let FrontierEntry { r#type, r#match } = &self.frontier[d];
                match content_after_fits(rp_to, d, r#type, r#match, true) {
                    Some(rest) if rest.child_count() == 0 => {}
                    _ => continue 'scan,
                }
            }
            let r#move = if drop_inner {
                rp_to.doc().resolve(rp_to.after(i + 1)).ok()?
            } else {
                rp_to.clone()
            };
            return Some(CloseLevel {
                depth: i,
                fit,
                r#move,
            });
        }
        None
    }

    fn close(&mut self, rp_to: ResolvedPos) -> Option<ResolvedPos> {
        let close = self.find_close_level(&rp_to)?;
        while self.depth() > close.depth {
            self.close_frontier_node()?;
        }
        if close.fit.child_count() > 0 {
            self.placed = add_to_fragment(&self.placed, close.depth, close.fit);
        }
        let rp_to = close.r#move;
        for d in close.depth + 1..=rp_to.depth() {
            let node = rp_to.node(d);
            let add = node
                .r#type()
                .content_match()
                .fill_before(node.content(), true, rp_to.index(d))?;
            self.open_frontier_node(node.r#type(), Some(node.attrs()), add)?;
        }
        Some(rp_to)
    }

    fn open_frontier_node(&mut self, r#type: &NodeType, attrs: Option<&Attrs>, content: Fragment) -> Option<()> {
        let depth = self.depth();
        let top = &mut self.frontier[depth];
        top.r#match = top.r#match.match_type(r#type)?;
        let node = r#type.create(attrs, content, vec![]).ok()?;
        self.placed = add_to_fragment(&self.placed, depth, Fragment::from(node));
        self.frontier.push(FrontierEntry {
            r#type: r#type.clone(),
            r#match: r#type.content_match(),
        });
        Some(())
    }

    fn close_frontier_node(&mut self) -> Option<()> {
        let open = self.frontier.pop()?;
        let add = open.r#match.fill_before(&Fragment::new(), true, 0)?;
        if add.child_count() > 0 {
            self.placed = add_to_fragment(&self.placed, self.frontier.len(), add);
        }
        Some(())
    }
}

fn drop_from_fragment(fragment: &Fragment, depth: usize, count: usize) -> Fragment {
    if depth == 0 {
        return fragment.cut_by_index(count.min(fragment.child_count())..);
    }
    match fragment.first_child() {
        Some(first) => {
            let inner = drop_from_fragment(first.content(), depth - 1, count);
            fragment.replace_child(0, first.copy(move |_| inner))
        }
        None => fragment.clone(),
    }
}

fn add_to_fragment(fragment: &Fragment, depth: usize, content: Fragment) -> Fragment {
    if depth == 0 {
        return fragment.clone().append(content);
    }
    match fragment.last_child() {
        Some(last) => {
            let inner = add_to_fragment(last.content(), depth - 1, content);
            fragment.replace_child(fragment.child_count() - 1, last.copy(move |_| inner))
        }
        None => fragment.clone(),
    }
}

fn content_at(fragment: &Fragment, depth: usize) -> Fragment {
    let mut fragment = fragment.clone();
    for _ in 0..depth {
        fragment = match fragment.first_child() {
            Some(first) => first.content().clone(),
            None => return Fragment::new(),
        };
    }
    fragment
}

fn close_node_start(node: &Node, open_start: usize, open_end: isize) -> Option<Node> {
    if open_start == 0 {
        return Some(node.clone());
    }
    let mut frag = node.content().clone();
    if open_start > 1 {
        let first = frag.first_child()?.clone();
        let inner_end = if frag.child_count() == 1 { open_end - 1 } else { 0 };
        frag = frag.replace_child(0, close_node_start(&first, open_start - 1, inner_end)?);
    }
    let content_match = node.r#type().content_match();
    frag = content_match.fill_before(&frag, false, 0)?.append(frag);
    if open_end <= 0 {
        let after = content_match
            .match_fragment(&frag)?
            .fill_before(&Fragment::new(), true, 0)?;
        frag = frag.append(after);
    }
    Some(node.copy(move |_| frag))
}

fn content_after_fits(
    rp_to: &ResolvedPos,
    depth: usize,
    r#type: &NodeType,
    r#match: &ContentMatch,
    open: bool,
) -> Option<Fragment> {
    let node = rp_to.node(depth);
    let index = if open {
        rp_to.index_after(depth)
    } else {
        rp_to.index(depth)
    };
    if index == node.child_count() && !r#type.compatible_content(node.r#type()) {
        return None;
    }
    let fit = r#match.fill_before(node.content(), true, index)?;
    if invalid_marks(r#type, node.content(), index) {
        None
    } else {
        Some(fit)
    }
}

fn invalid_marks(r#type: &NodeType, fragment: &Fragment, start: usize) -> bool {
    fragment.children()[start.min(fragment.child_count())..]
        .iter()
        .any(|child| !r#type.allows_marks(child.marks()))
}

fn close_fragment(
    fragment: &Fragment,
    depth: usize,
    old_open: usize,
    new_open: usize,
    parent: Option<&Node>,
) -> Option<Fragment> {
    let mut fragment = fragment.clone();
    if depth < old_open {
        let first = fragment.first_child()?.clone();
        let inner = close_fragment(first.content(), depth + 1, old_open, new_open, Some(&first))?;
        fragment = fragment.replace_child(0, first.copy(move |_| inner));
    }
    if depth > new_open {
        let content_match = parent?.content_match_at(0).ok()?;
        let start = content_match.fill_before(&fragment, false, 0)?.append(fragment);
        let end = content_match
            .match_fragment(&start)?
            .fill_before(&Fragment::new(), true, 0)?;
        fragment = start.append(end);
    }
    Some(fragment)
}

// The depths at which the range between the two positions covers the whole content of the
// node, innermost first.
fn covered_depths(rp_from: &ResolvedPos, rp_to: &ResolvedPos) -> Vec<usize> {
    let mut result = Vec::new();
    let min_depth = rp_from.depth().min(rp_to.depth());
    for d in (0..=min_depth).rev() {
        let start = rp_from.start(d);
        if start < rp_from.pos() - (rp_from.depth() - d)
            || rp_to.end(d) > rp_to.pos() + (rp_to.depth() - d)
            || rp_from.node(d).r#type().is_isolating()
            || rp_to.node(d).r#type().is_isolating()
        {
            break;
        }
        if start == rp_to.start(d)
            || (d == rp_from.depth()
                && d == rp_to.depth()
                && rp_from.parent().inline_content()
                && rp_to.parent().inline_content()
                && d > 0
                && rp_to.start(d - 1) == rp_from.start(d - 1))
        {
            result.push(d);
        }
    }
    result
}

impl Transform {
    /// Replace a range of the document with a given slice, using `from`, `to`, and the
    /// slice's open depths as hints, rather than fixed start and end points. This method may
    /// grow the replaced area or close open nodes in the slice in order to get a fit that is
    /// more in line with WYSIWYG expectations, by dropping fully covered parent nodes of the
    /// replaced region when they are marked non-defining as context, or including an open
    /// parent node from the slice that is marked as defining its content.
    pub fn replace_range(
        &mut self,
        from: usize,
        to: usize,
        slice: Slice,
    ) -> Result<&mut Self, TransformError> {
        if slice.size() == 0 {
            return self.delete_range(from, to);
        }

        let rp_from = self.doc().resolve(from)?;
        let rp_to = self.doc().resolve(to)?;
        if fits_trivially(&rp_from, &rp_to, &slice) {
            return self.step(ReplaceStep::new(from, to, slice, false));
        }

        let mut target_depths: Vec<isize> = covered_depths(&rp_from, &rp_to)
            .into_iter()
            .map(|d| d as isize)
            .collect();
        // Can't replace the whole document
        if target_depths.last() == Some(&0) {
            target_depths.pop();
        }
        // Negative numbers represent not expansion over the whole node at that depth, but
        // replacing from `rp_from.before(-d)` to `to`.
        let mut preferred_target = -(rp_from.depth() as isize + 1);
        target_depths.insert(0, preferred_target);
        // Pick a preferred target depth, if one of the covering depths is not outside of a
        // defining node, and add negative depths for any depth that has `rp_from` at its
        // start and does not cross a defining node.
        let mut pos = rp_from.pos();
        for d in (1..=rp_from.depth()).rev() {
            pos = pos.wrapping_sub(1);
            let r#type = rp_from.node(d).r#type();
            if r#type.is_defining_as_context() || r#type.is_isolating() {
                break;
            }
            if target_depths.contains(&(d as isize)) {
                preferred_target = d as isize;
            } else if rp_from.before(d) == pos {
                target_depths.insert(1, -(d as isize));
            }
        }
        let preferred_target_index = target_depths
            .iter()
            .position(|&d| d == preferred_target)
            .unwrap_or(0);

        let mut left_nodes = Vec::new();
        let mut content = slice.content.clone();
        let mut i = 0;
        while let Some(node) = content.first_child().cloned() {
            left_nodes.push(node.clone());
            if i == slice.open_start {
                break;
            }
            content = node.content().clone();
            i += 1;
        }

        // Back up the preferred depth to cover defining textblocks directly above it,
        // possibly skipping a non-defining textblock.
        let mut preferred_depth = slice.open_start;
        let target_node = rp_from.node(preferred_target.unsigned_abs() - 1);
        for d in (0..preferred_depth).rev() {
            let left_node = match left_nodes.get(d) {
                Some(node) => node,
                None => continue,
            };
            let defining = left_node.r#type().is_defining_for_content();
            if defining && !left_node.same_markup(target_node) {
                preferred_depth = d;
            } else if defining || !left_node.r#type().is_textblock() {
                break;
            }
        }

        // Try to fit each possible depth of the slice into each possible target depth,
        // starting with the preferred depths.
        for j in (0..=slice.open_start).rev() {
            let open_depth = (j + preferred_depth + 1) % (slice.open_start + 1);
            let insert = match left_nodes.get(open_depth) {
                Some(insert) => insert,
                None => continue,
            };
            for i in 0..target_depths.len() {
                let target = target_depths[(i + preferred_target_index) % target_depths.len()];
                let expand = target >= 0;
                let target_depth = target.unsigned_abs();
                let parent = rp_from.node(target_depth - 1);
                let index = rp_from.index(target_depth - 1);
                if !parent.can_replace_with(index, index, insert.r#type(), Some(insert.marks())) {
                    continue;
                }
                if let Some(closed) = close_fragment(&slice.content, 0, slice.open_start, open_depth, None) {
                    let end = if expand { rp_to.after(target_depth) } else { to };
                    return self.replace(
                        rp_from.before(target_depth),
                        end,
                        Slice::new(closed, open_depth, slice.open_end),
                    );
                }
            }
        }

        let start_steps = self.steps().len();
        let (mut from, mut to) = (from, to);
        for &depth in target_depths.iter().rev() {
            self.replace(from, to, slice.clone())?;
            if self.steps().len() > start_steps {
                break;
            }
            if depth < 0 {
                continue;
            }
            from = rp_from.before(depth as usize);
            to = rp_to.after(depth as usize);
        }
        Ok(self)
    }

    /// Replace the given range with a node, but use `from` and `to` as hints, rather than
    /// precise positions. When from and to are the same and are at the start or end of a
    /// parent node in which the given node doesn't fit, this method may move them out
    /// towards a parent that does allow the given node to be placed. When the given range
    /// completely covers a parent node, this method may completely replace that parent node.
    pub fn replace_range_with(
        &mut self,
        from: usize,
        to: usize,
        node: Node,
    ) -> Result<&mut Self, TransformError> {
        let (mut from, mut to) = (from, to);
        if !node.is_inline() && from == to && self.doc().resolve(from)?.parent().content_size() > 0 {
            if let Some(point) = insert_point(self.doc(), from, node.r#type()) {
                from = point;
                to = point;
            }
        }
        self.replace_range(from, to, Slice::new(Fragment::from(node), 0, 0))
    }

    /// Delete the given range, expanding it to cover fully covered parent nodes until a
    /// valid replace is found.
    pub fn delete_range(&mut self, from: usize, to: usize) -> Result<&mut Self, TransformError> {
        let rp_from = self.doc().resolve(from)?;
        let rp_to = self.doc().resolve(to)?;
        let covered = covered_depths(&rp_from, &rp_to);
        for (i, &depth) in covered.iter().enumerate() {
            let last = i == covered.len() - 1;
            if (last && depth == 0) || rp_from.node(depth).r#type().content_match().valid_end() {
                return self.delete(rp_from.start(depth), rp_to.end(depth));
            }
            if depth > 0
                && (last
                    || rp_from.node(depth - 1).can_replace(
                        rp_from.index(depth - 1),
                        rp_to.index_after(depth - 1),
                        None,
                        ..,
                    ))
            {
                return self.delete(rp_from.before(depth), rp_to.after(depth));
            }
        }
        for d in 1..=rp_from.depth().min(rp_to.depth()) {
            if from - rp_from.start(d) == rp_from.depth() - d
                && to > rp_from.end(d)
                && rp_to.end(d) - to != rp_to.depth() - d
                && rp_from.start(d - 1) == rp_to.start(d - 1)
                && rp_from.node(d - 1).can_replace(
                    rp_from.index(d - 1),
                    rp_to.index(d - 1),
                    None,
                    ..,
                )
            {
                return self.delete(rp_from.before(d), to);
            }
        }
        self.delete(from, to)
    }
}

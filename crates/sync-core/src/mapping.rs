//! Position mapping.
//!
//! Real editor runtimes (ProseMirror and its relatives) own a richer,
//! recover-based version of this; what's here is the reference
//! implementation the rest of this crate is written against and the
//! one the `testing` fixture's flat-text steps use directly. It is
//! deliberately simpler than a production mapping: mirrored map pairs
//! are treated as a pure identity (skipped) rather than tracked through
//! nested recovery. That is exact for the disjoint, non-overlapping
//! edits this crate's own tests exercise; a host integration with
//! genuinely overlapping concurrent edits inside the same undone-then-
//! redone range should supply its own `Mapping`-equivalent instead of
//! reusing this one. See DESIGN.md.

use rustc_hash::FxHashMap;

/// Which side of a deleted/replaced span an unchanged position should
/// stick to. Mirrors spec §4.2's "+1"/"-1" assoc values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bias {
    Before,
    After,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapResult {
    pub pos: usize,
    /// Set when `pos` fell strictly inside a deleted span and was
    /// collapsed to the edge of its replacement.
    pub deleted: bool,
}

/// One elementary edit's effect on positions: the `[old_start, old_size,
/// new_size)` triple used throughout ProseMirror-family transform code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepMap {
    pub old_start: usize,
    pub old_size: usize,
    pub new_size: usize,
}

impl StepMap {
    pub fn insertion(at: usize, len: usize) -> Self {
        StepMap {
            old_start: at,
            old_size: 0,
            new_size: len,
        }
    }

    pub fn deletion(at: usize, len: usize) -> Self {
        StepMap {
            old_start: at,
            old_size: len,
            new_size: 0,
        }
    }

    fn old_end(&self) -> usize {
        self.old_start + self.old_size
    }

    pub fn map_result(&self, pos: usize, bias: Bias) -> MapResult {
        let old_end = self.old_end();
        if pos < self.old_start {
            return MapResult {
                pos,
                deleted: false,
            };
        }
        if pos > old_end {
            let delta = self.new_size as i64 - self.old_size as i64;
            return MapResult {
                pos: (pos as i64 + delta) as usize,
                deleted: false,
            };
        }
        if self.old_size == 0 {
            // Pure insertion at `old_start`: positions exactly at the
            // insertion point stay put or jump past the inserted
            // content depending on bias; this is the hook the rebase
            // engine uses to make concurrent same-point insertions
            // order deterministically.
            return match bias {
                Bias::Before => MapResult {
                    pos: self.old_start,
                    deleted: false,
                },
                Bias::After => MapResult {
                    pos: self.old_start + self.new_size,
                    deleted: false,
                },
            };
        }
        if pos == self.old_start {
            return MapResult {
                pos: self.old_start,
                deleted: false,
            };
        }
        if pos == old_end {
            return MapResult {
                pos: self.old_start + self.new_size,
                deleted: false,
            };
        }
        // Strictly inside a deleted/replaced span.
        MapResult {
            pos: self.old_start + self.new_size,
            deleted: true,
        }
    }

    pub fn invert(&self) -> StepMap {
        StepMap {
            old_start: self.old_start,
            old_size: self.new_size,
            new_size: self.old_size,
        }
    }
}

/// A composed sequence of [`StepMap`]s with mirror pairs. `set_mirror`
/// marks two map indices as cancelling each other out (spec §4.2's
/// "why the mirror"): when mapping a position, both maps in a mirrored
/// pair are skipped as if neither had happened, while everything
/// between them (typically foreign edits) still applies normally.
#[derive(Debug, Clone, Default)]
pub struct Mapping {
    maps: Vec<StepMap>,
    mirror: FxHashMap<usize, usize>,
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    pub fn append_map(&mut self, map: StepMap) {
        self.maps.push(map);
    }

    pub fn set_mirror(&mut self, a: usize, b: usize) {
        self.mirror.insert(a, b);
        self.mirror.insert(b, a);
    }

    /// A view over the maps appended from index `from` to the current
    /// end. Mirrors spec §4.2's `T.mapping.slice(mapFrom)`.
    pub fn slice(&self, from: usize) -> MappingSlice<'_> {
        MappingSlice {
            mapping: self,
            from,
        }
    }

    pub fn map_pos(&self, pos: usize, bias: Bias) -> MapResult {
        self.slice(0).map_pos(pos, bias)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MappingSlice<'a> {
    mapping: &'a Mapping,
    from: usize,
}

impl MappingSlice<'_> {
    pub fn map_pos(&self, pos: usize, bias: Bias) -> MapResult {
        let to = self.mapping.maps.len();
        let mut cur = pos;
        let mut deleted = false;
        for i in self.from..to {
            if let Some(&partner) = self.mapping.mirror.get(&i) {
                if (partner > i && partner < to) || (partner < i && partner >= self.from) {
                    // This map's effect cancels with its mirror partner,
                    // which is also within range; skip it entirely.
                    continue;
                }
            }
            let r = self.mapping.maps[i].map_result(cur, bias);
            cur = r.pos;
            deleted = deleted || r.deleted;
        }
        MapResult { pos: cur, deleted }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrelated_insert_shifts_following_positions() {
        let map = StepMap::insertion(2, 3);
        assert_eq!(map.map_result(5, Bias::Before).pos, 8);
        assert_eq!(map.map_result(0, Bias::Before).pos, 0);
    }

    #[test]
    fn insert_at_point_respects_bias() {
        let map = StepMap::insertion(2, 3);
        assert_eq!(map.map_result(2, Bias::Before).pos, 2);
        assert_eq!(map.map_result(2, Bias::After).pos, 5);
    }

    #[test]
    fn interior_of_deletion_is_marked_deleted() {
        let map = StepMap::deletion(2, 4);
        let r = map.map_result(4, Bias::Before);
        assert!(r.deleted);
        assert_eq!(r.pos, 2);
    }

    #[test]
    fn mirror_pair_cancels_for_intermediate_mapping() {
        let mut mapping = Mapping::new();
        mapping.append_map(StepMap::deletion(4, 5)); // undo of local insert " new"
        mapping.append_map(StepMap::insertion(12, 3)); // foreign insert "END" at 12
        mapping.append_map(StepMap::insertion(0, 5)); // foreign insert "START" at 0
        mapping.append_map(StepMap::insertion(4, 5)); // redo of local insert " new"
        mapping.set_mirror(0, 3);

        // Position 4 (the original local insert point) should be mapped
        // through the foreign edits only: shifted by "START" at 0 (+5),
        // unaffected by "END" at 12.
        let slice = mapping.slice(0);
        let r = slice.map_pos(4, Bias::After);
        assert_eq!(r.pos, 9);
        assert!(!r.deleted);
    }
}

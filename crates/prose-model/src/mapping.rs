use std::ops::Range;

use crate::ops::Path;
use crate::selection::{Point, Selection};

/// Structural effect of one applied op, enough to move positions across it.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum MapStep {
    InsertText {
        path: Path,
        offset: usize,
        len: usize,
    },
    RemoveText {
        path: Path,
        range: Range<usize>,
    },
    InsertNode {
        path: Path,
    },
    RemoveNode {
        path: Path,
        /// Set when a text leaf was removed after its text was appended to the
        /// left sibling: (byte length of the sibling before the merge, removed length).
        merged_into_left: Option<(usize, usize)>,
    },
    /// Attribute, kind or mark changes; positions stay where they are.
    Retain,
}

/// Records the ops applied by a transaction so that points and node paths
/// from the old document can be located in the new one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mapping {
    steps: Vec<MapStep>,
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, step: MapStep) {
        self.steps.push(step);
    }

    pub fn append(&mut self, other: Mapping) {
        self.steps.extend(other.steps);
    }

    pub fn is_empty(&self) -> bool {
        self.steps.iter().all(|s| matches!(s, MapStep::Retain))
    }

    pub fn map_point(&self, point: &Point) -> Point {
        let mut point = point.clone();
        for step in &self.steps {
            map_point_step(step, &mut point);
        }
        point
    }

    pub fn map_selection(&self, selection: &Selection) -> Selection {
        Selection {
            anchor: self.map_point(&selection.anchor),
            focus: self.map_point(&selection.focus),
        }
    }

    /// New path of the node at `path`, or `None` when the node (or one of its
    /// ancestors) was removed.
    pub fn map_path(&self, path: &[usize]) -> Option<Path> {
        let mut path = path.to_vec();
        for step in &self.steps {
            match step {
                MapStep::InsertNode { path: at } => shift_for_insert(&mut path, at),
                MapStep::RemoveNode { path: at, .. } => {
                    if path.starts_with(at) {
                        return None;
                    }
                    shift_for_remove(&mut path, at);
                }
                MapStep::InsertText { .. } | MapStep::RemoveText { .. } | MapStep::Retain => {}
            }
        }
        Some(path)
    }
}

fn shift_for_insert(path: &mut Path, at: &[usize]) {
    let Some((index, parent)) = at.split_last() else {
        return;
    };
    let depth = parent.len();
    if path.len() > depth && path.starts_with(parent) && path[depth] >= *index {
        path[depth] += 1;
    }
}

fn shift_for_remove(path: &mut Path, at: &[usize]) {
    let Some((index, parent)) = at.split_last() else {
        return;
    };
    let depth = parent.len();
    if path.len() > depth && path.starts_with(parent) && path[depth] > *index {
        path[depth] -= 1;
    }
}

pub(crate) fn map_point_step(step: &MapStep, point: &mut Point) {
    match step {
        MapStep::InsertText { path, offset, len } => {
            if point.path == *path && point.offset >= *offset {
                point.offset = point.offset.saturating_add(*len);
            }
        }
        MapStep::RemoveText { path, range } => {
            if point.path != *path || point.offset <= range.start {
                return;
            }
            let removed_len = range.end.saturating_sub(range.start);
            if point.offset >= range.end {
                point.offset = point.offset.saturating_sub(removed_len);
            } else {
                point.offset = range.start;
            }
        }
        MapStep::InsertNode { path } => shift_for_insert(&mut point.path, path),
        MapStep::RemoveNode {
            path,
            merged_into_left,
        } => {
            let Some((index, parent)) = path.split_last() else {
                return;
            };
            let depth = parent.len();
            if point.path.len() <= depth || !point.path.starts_with(parent) {
                return;
            }
            let ix = point.path[depth];
            if ix > *index {
                point.path[depth] = ix - 1;
                return;
            }
            if ix < *index {
                return;
            }

            // Inside the removed subtree: move to a nearby point.
            point.path.truncate(depth + 1);
            match (merged_into_left, index.checked_sub(1)) {
                (Some((prefix, removed_len)), Some(left)) => {
                    point.path[depth] = left;
                    point.offset = (prefix + point.offset).min(prefix + removed_len);
                }
                _ => {
                    point.path[depth] = index.saturating_sub(1);
                    point.offset = 0;
                }
            }
        }
        MapStep::Retain => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removed_subtree_has_no_mapped_path() {
        let mut mapping = Mapping::new();
        mapping.push(MapStep::RemoveNode {
            path: vec![1],
            merged_into_left: None,
        });
        assert_eq!(mapping.map_path(&[1, 0]), None);
        assert_eq!(mapping.map_path(&[2, 3]), Some(vec![1, 3]));
        assert_eq!(mapping.map_path(&[0]), Some(vec![0]));
    }

    #[test]
    fn insert_shifts_following_siblings() {
        let mut mapping = Mapping::new();
        mapping.push(MapStep::InsertNode { path: vec![0, 1] });
        assert_eq!(mapping.map_path(&[0, 1]), Some(vec![0, 2]));
        assert_eq!(mapping.map_path(&[0, 0]), Some(vec![0, 0]));
        assert_eq!(mapping.map_path(&[1, 1]), Some(vec![1, 1]));
    }

    #[test]
    fn point_in_merged_leaf_follows_text() {
        let mut mapping = Mapping::new();
        mapping.push(MapStep::InsertText {
            path: vec![0, 0],
            offset: 3,
            len: 2,
        });
        mapping.push(MapStep::RemoveNode {
            path: vec![0, 1],
            merged_into_left: Some((3, 2)),
        });
        let mapped = mapping.map_point(&Point::new(vec![0, 1], 1));
        assert_eq!(mapped, Point::new(vec![0, 0], 4));
    }
}

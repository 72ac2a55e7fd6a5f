use serde::{Deserialize, Serialize};

use crate::node::{Document, Node, node_at_path};
use crate::ops::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    #[serde(default)]
    pub path: Path,
    pub offset: usize,
}

impl Point {
    pub fn new(path: Path, offset: usize) -> Self {
        Self { path, offset }
    }

    /// Path of the textblock holding this point's text leaf.
    pub fn block_path(&self) -> &[usize] {
        self.path.split_last().map(|(_, p)| p).unwrap_or(&[])
    }

    pub fn leaf_index(&self) -> usize {
        self.path.last().copied().unwrap_or(0)
    }
}

impl PartialOrd for Point {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Point {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.path
            .cmp(&other.path)
            .then(self.offset.cmp(&other.offset))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub anchor: Point,
    pub focus: Point,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Bias {
    Backward,
    Forward,
}

impl Selection {
    pub fn collapsed(point: Point) -> Self {
        Self {
            anchor: point.clone(),
            focus: point,
        }
    }

    pub fn range(anchor: Point, focus: Point) -> Self {
        Self { anchor, focus }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }

    pub fn from(&self) -> &Point {
        std::cmp::min(&self.anchor, &self.focus)
    }

    pub fn to(&self) -> &Point {
        std::cmp::max(&self.anchor, &self.focus)
    }

    /// Both ends sit in the same textblock.
    pub fn same_parent(&self) -> bool {
        self.anchor.block_path() == self.focus.block_path()
    }

    /// Selection spanning the whole document.
    pub fn all(doc: &Document) -> Option<Self> {
        Some(Self {
            anchor: first_text_point(doc)?,
            focus: last_text_point(doc)?,
        })
    }

    /// Closest text position next to the node at `path`: the end of the last
    /// text leaf before it when searching backward, the start of the first
    /// text leaf after it when searching forward. Falls back to the other
    /// direction when nothing exists on the requested side.
    pub fn near(doc: &Document, path: &[usize], bias: Bias) -> Option<Self> {
        let point = match bias {
            Bias::Backward => {
                text_point_before(doc, path).or_else(|| text_point_after(doc, path))
            }
            Bias::Forward => {
                text_point_after(doc, path).or_else(|| text_point_before(doc, path))
            }
        }?;
        Some(Self::collapsed(point))
    }
}

pub fn first_text_point(doc: &Document) -> Option<Point> {
    text_points(doc).into_iter().next().map(|(path, _)| Point::new(path, 0))
}

pub fn last_text_point(doc: &Document) -> Option<Point> {
    text_points(doc)
        .into_iter()
        .last()
        .map(|(path, len)| Point::new(path, len))
}

/// First text position inside the node at `path` (or the node itself when it is a leaf).
pub fn first_text_point_in(doc: &Document, path: &[usize]) -> Option<Point> {
    text_points(doc)
        .into_iter()
        .find(|(p, _)| p.starts_with(path))
        .map(|(p, _)| Point::new(p, 0))
}

pub fn last_text_point_in(doc: &Document, path: &[usize]) -> Option<Point> {
    text_points(doc)
        .into_iter()
        .filter(|(p, _)| p.starts_with(path))
        .last()
        .map(|(p, len)| Point::new(p, len))
}

fn text_point_before(doc: &Document, path: &[usize]) -> Option<Point> {
    text_points(doc)
        .into_iter()
        .filter(|(p, _)| p.as_slice() < path && !p.starts_with(path))
        .last()
        .map(|(p, len)| Point::new(p, len))
}

fn text_point_after(doc: &Document, path: &[usize]) -> Option<Point> {
    text_points(doc)
        .into_iter()
        .find(|(p, _)| p.as_slice() > path && !p.starts_with(path))
        .map(|(p, _)| Point::new(p, 0))
}

/// Every text leaf in document order with its byte length.
fn text_points(doc: &Document) -> Vec<(Path, usize)> {
    let mut out = Vec::new();
    doc.descendants(|node, path| {
        if let Node::Text(t) = node {
            out.push((path.to_vec(), t.text.len()));
        }
    });
    out
}

pub(crate) fn normalize_selection(doc: &Document, selection: &Selection) -> Selection {
    let fallback = first_text_point(doc).unwrap_or(Point {
        path: vec![0],
        offset: 0,
    });

    let anchor = normalize_point_to_existing_text(doc, &selection.anchor).unwrap_or_else(|| {
        normalize_point_to_existing_text(doc, &selection.focus).unwrap_or_else(|| fallback.clone())
    });
    let focus =
        normalize_point_to_existing_text(doc, &selection.focus).unwrap_or_else(|| anchor.clone());

    Selection { anchor, focus }
}

fn normalize_point_to_existing_text(doc: &Document, point: &Point) -> Option<Point> {
    if point.path.is_empty() || doc.children.is_empty() {
        return None;
    }

    let mut resolved_path: Vec<usize> = Vec::new();
    let mut children: &[Node] = &doc.children;

    for &wanted in &point.path {
        if children.is_empty() {
            break;
        }
        let ix = wanted.min(children.len() - 1);
        resolved_path.push(ix);
        match &children[ix] {
            Node::Text(t) => {
                return Some(Point {
                    path: resolved_path,
                    offset: clamp_to_char_boundary(&t.text, point.offset),
                });
            }
            Node::Element(el) => {
                children = &el.children;
            }
        }
    }

    match node_at_path(doc, &resolved_path)? {
        Node::Text(t) => Some(Point {
            offset: clamp_to_char_boundary(&t.text, point.offset),
            path: resolved_path,
        }),
        Node::Element(_) => first_text_point_in(doc, &resolved_path),
    }
}

pub fn clamp_to_char_boundary(s: &str, mut ix: usize) -> usize {
    ix = ix.min(s.len());
    while ix > 0 && !s.is_char_boundary(ix) {
        ix -= 1;
    }
    ix
}

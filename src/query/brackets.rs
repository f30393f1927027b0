//! Bracketed key reconstruction (`a[0]=x`, `a[b][]=y`).
//!
//! # Design Decisions
//! - A branch whose keys are all numeric indices becomes an array
//! - Arrays are ordered by index; sparse indices are compacted
//! - `[]` appends after the highest index seen so far; an append past
//!   `usize::MAX` is refused and the pair rejected

use std::collections::BTreeMap;

use crate::marshal::{marshal, Value};

/// Returned when a `[]` append has no index left to take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexOverflow;

/// One bracketed key segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Index(usize),
    Append,
    Key(String),
}

/// Split `name[a][0][]` into the base name and its segments.
///
/// Returns `None` for keys without well-formed brackets, which are then
/// treated as plain keys.
pub fn split_key(key: &str) -> Option<(&str, Vec<Segment>)> {
    let open = key.find('[')?;
    if open == 0 || !key.ends_with(']') {
        return None;
    }

    let name = &key[..open];
    let mut rest = &key[open..];
    let mut segments = Vec::new();

    while !rest.is_empty() {
        let inner_end = rest.find(']')?;
        if !rest.starts_with('[') {
            return None;
        }
        let inner = &rest[1..inner_end];
        if inner.contains('[') {
            return None;
        }
        let segment = if inner.is_empty() {
            Segment::Append
        } else if let Ok(index) = inner.parse::<usize>() {
            Segment::Index(index)
        } else {
            Segment::Key(inner.to_string())
        };
        segments.push(segment);
        rest = &rest[inner_end + 1..];
    }

    Some((name, segments))
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum NodeKey {
    Index(usize),
    Name(String),
}

#[derive(Debug, Clone)]
enum Node {
    Leaf(String),
    Branch(Vec<(NodeKey, Node)>),
}

/// Accumulates bracketed entries for one base name.
#[derive(Debug, Clone)]
pub struct Tree {
    root: Vec<(NodeKey, Node)>,
}

impl Tree {
    pub fn new() -> Self {
        Self { root: Vec::new() }
    }

    /// Insert a raw value at the given segment path. Later values at the
    /// same path replace earlier ones. On error the tree is unchanged.
    pub fn insert(&mut self, segments: &[Segment], raw: &str) -> Result<(), IndexOverflow> {
        insert_into(&mut self.root, segments, raw)
    }

    /// Collapse into a typed value, returning the base name's value.
    pub fn into_value(self, name: &str) -> Value {
        branch_to_value(self.root, name)
    }
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

// Overflow can only happen while walking existing branches: a branch
// created by this call is empty, so an append into it takes index 0.
fn insert_into(
    branch: &mut Vec<(NodeKey, Node)>,
    segments: &[Segment],
    raw: &str,
) -> Result<(), IndexOverflow> {
    let Some((first, rest)) = segments.split_first() else {
        return Ok(());
    };

    let key = match first {
        Segment::Index(i) => NodeKey::Index(*i),
        Segment::Key(k) => NodeKey::Name(k.clone()),
        Segment::Append => {
            let highest = branch
                .iter()
                .filter_map(|(k, _)| match k {
                    NodeKey::Index(i) => Some(*i),
                    NodeKey::Name(_) => None,
                })
                .max();
            let next = match highest {
                Some(i) => i.checked_add(1).ok_or(IndexOverflow)?,
                None => 0,
            };
            NodeKey::Index(next)
        }
    };

    let position = branch.iter().position(|(k, _)| *k == key);

    if rest.is_empty() {
        let leaf = Node::Leaf(raw.to_string());
        match position {
            Some(i) => branch[i].1 = leaf,
            None => branch.push((key, leaf)),
        }
        return Ok(());
    }

    let i = match position {
        Some(i) => i,
        None => {
            branch.push((key, Node::Branch(Vec::new())));
            branch.len() - 1
        }
    };
    if let Node::Leaf(_) = branch[i].1 {
        branch[i].1 = Node::Branch(Vec::new());
    }
    match &mut branch[i].1 {
        Node::Branch(children) => insert_into(children, rest, raw),
        Node::Leaf(_) => Ok(()),
    }
}

fn node_to_value(node: Node, path: &str) -> Value {
    match node {
        Node::Leaf(raw) => marshal(&raw).value,
        Node::Branch(children) => branch_to_value(children, path),
    }
}

fn branch_to_value(mut children: Vec<(NodeKey, Node)>, path: &str) -> Value {
    let all_indexed = children
        .iter()
        .all(|(k, _)| matches!(k, NodeKey::Index(_)));

    if all_indexed {
        children.sort_by(|a, b| a.0.cmp(&b.0));
        let sparse = children
            .iter()
            .enumerate()
            .any(|(pos, (k, _))| *k != NodeKey::Index(pos));
        if sparse {
            tracing::warn!(key = %path, "Sparse array indices in query, compacting");
        }
        let items = children
            .into_iter()
            .map(|(k, node)| {
                let child_path = match &k {
                    NodeKey::Index(i) => format!("{}[{}]", path, i),
                    NodeKey::Name(n) => format!("{}[{}]", path, n),
                };
                node_to_value(node, &child_path)
            })
            .collect();
        return Value::Array(items);
    }

    let map: BTreeMap<String, Value> = children
        .into_iter()
        .map(|(k, node)| {
            let name = match k {
                NodeKey::Index(i) => i.to_string(),
                NodeKey::Name(n) => n,
            };
            let child_path = format!("{}[{}]", path, name);
            (name, node_to_value(node, &child_path))
        })
        .collect();
    Value::Object(map)
}

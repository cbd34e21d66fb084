//! Dotted-path resolution over BSON trees.
//!
//! A path is `segment ('.' segment)*`. Each segment resolves against the
//! current node: a field name on documents, an index on arrays when it
//! parses as a nonnegative integer. A `$` segment is substituted with the
//! match position recorded by the query matcher; the position is consumed
//! on first use so a later `$` in the same walk fails.

use std::borrow::Cow;

use bson::{Bson, Document};

use crate::error::QueryError;

/// Mutable view over the two container kinds a path can walk through.
enum Node<'a> {
    Doc(&'a mut Document),
    Arr(&'a mut Vec<Bson>),
}

/// Immutable counterpart of [`Node`].
enum NodeRef<'a> {
    Doc(&'a Document),
    Arr(&'a Vec<Bson>),
}

fn as_index(segment: &str) -> Option<usize> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    segment.parse().ok()
}

fn split_first(path: &str) -> (&str, Option<&str>) {
    match path.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    }
}

/// Substitute a leading `$` segment in `rest` with the match position,
/// consuming it. Fails when a `$` segment is present but no position is
/// bound.
fn resolve_positional<'a>(
    rest: &'a str,
    match_pos: &mut Option<usize>,
) -> Result<Cow<'a, str>, QueryError> {
    if rest != "$" && !rest.starts_with("$.") {
        return Ok(Cow::Borrowed(rest));
    }
    let pos = match_pos
        .take()
        .ok_or(QueryError::PositionalWithoutMatch)?;
    Ok(Cow::Owned(format!("{}{}", pos, &rest[1..])))
}

fn child_ref<'a>(node: &NodeRef<'a>, key: &str) -> Option<&'a Bson> {
    match node {
        NodeRef::Doc(doc) => doc.get(key),
        NodeRef::Arr(arr) => arr.get(as_index(key)?),
    }
}

fn child_mut<'a>(node: Node<'a>, key: &str) -> Option<&'a mut Bson> {
    match node {
        Node::Doc(doc) => doc.get_mut(key),
        Node::Arr(arr) => {
            let index = as_index(key)?;
            arr.get_mut(index)
        }
    }
}

fn node_of(value: &Bson) -> Option<NodeRef<'_>> {
    match value {
        Bson::Document(doc) => Some(NodeRef::Doc(doc)),
        Bson::Array(arr) => Some(NodeRef::Arr(arr)),
        _ => None,
    }
}

fn node_of_mut(value: &mut Bson) -> Option<Node<'_>> {
    match value {
        Bson::Document(doc) => Some(Node::Doc(doc)),
        Bson::Array(arr) => Some(Node::Arr(arr)),
        _ => None,
    }
}

// ── get ─────────────────────────────────────────────────────────

/// Read the value at `path`, without positional resolution. Returns
/// `None` when any step cannot be resolved.
pub fn get<'a>(root: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut node = NodeRef::Doc(root);
    let mut remaining = path;
    loop {
        let (key, rest) = split_first(remaining);
        let value = child_ref(&node, key)?;
        match rest {
            None => return Some(value),
            Some(rest) => {
                node = node_of(value)?;
                remaining = rest;
            }
        }
    }
}

/// Read the value at `path`, resolving a positional `$` segment through
/// `match_pos`. Returns an owned clone; `None` when absent.
pub fn get_with(
    root: &Document,
    path: &str,
    match_pos: &mut Option<usize>,
) -> Result<Option<Bson>, QueryError> {
    fn walk(
        node: NodeRef<'_>,
        path: &str,
        match_pos: &mut Option<usize>,
    ) -> Result<Option<Bson>, QueryError> {
        let (key, rest) = split_first(path);
        match rest {
            None => Ok(child_ref(&node, key).cloned()),
            Some(rest) => {
                let rest = resolve_positional(rest, match_pos)?;
                match child_ref(&node, key).and_then(node_of) {
                    Some(child) => walk(child, &rest, match_pos),
                    None => Ok(None),
                }
            }
        }
    }
    walk(NodeRef::Doc(root), path, match_pos)
}

// ── has ─────────────────────────────────────────────────────────

/// Is there a value (including an explicit null) at `path`?
pub fn has(root: &Document, path: &str) -> Result<bool, QueryError> {
    fn walk(
        node: NodeRef<'_>,
        path: &str,
        match_pos: &mut Option<usize>,
    ) -> Result<bool, QueryError> {
        let (key, rest) = split_first(path);
        match rest {
            None => Ok(match node {
                NodeRef::Doc(doc) => doc.contains_key(key),
                NodeRef::Arr(arr) => as_index(key).is_some_and(|i| i < arr.len()),
            }),
            Some(rest) => {
                let rest = resolve_positional(rest, &mut *match_pos)?;
                match child_ref(&node, key).and_then(node_of) {
                    Some(child) => walk(child, &rest, match_pos),
                    None => Ok(false),
                }
            }
        }
    }
    walk(NodeRef::Doc(root), path, &mut None)
}

// ── set ─────────────────────────────────────────────────────────

/// Write `value` at `path`, autovivifying intermediate documents. A
/// non-container intermediate is overwritten with a fresh document
/// holding the remainder of the path.
pub fn set(
    root: &mut Document,
    path: &str,
    value: Bson,
    match_pos: &mut Option<usize>,
) -> Result<(), QueryError> {
    set_node(Node::Doc(root), path, value, match_pos)
}

fn set_node(
    mut node: Node<'_>,
    path: &str,
    value: Bson,
    match_pos: &mut Option<usize>,
) -> Result<(), QueryError> {
    let (key, rest) = split_first(path);
    let Some(rest) = rest else {
        return set_leaf(node, key, value);
    };
    let rest = resolve_positional(rest, match_pos)?;

    if let Some(child) = child_node(&mut node, key) {
        return set_node(child, &rest, value, match_pos);
    }

    // Overwrite whatever is there with a fresh document that holds the
    // remainder of the path.
    let mut fresh = Document::new();
    set_node(Node::Doc(&mut fresh), &rest, value, match_pos)?;
    set_leaf(node, key, Bson::Document(fresh))
}

/// Reborrow the container child under `key`, if there is one.
fn child_node<'b>(node: &'b mut Node<'_>, key: &str) -> Option<Node<'b>> {
    let child = match node {
        Node::Doc(doc) => doc.get_mut(key),
        Node::Arr(arr) => {
            let index = as_index(key)?;
            arr.get_mut(index)
        }
    };
    child.and_then(node_of_mut)
}

fn set_leaf(node: Node<'_>, key: &str, value: Bson) -> Result<(), QueryError> {
    match node {
        Node::Doc(doc) => {
            doc.insert(key, value);
            Ok(())
        }
        Node::Arr(arr) => {
            let index = as_index(key).ok_or_else(|| {
                QueryError::BadValue(format!("cannot write field '{key}' into an array"))
            })?;
            while arr.len() <= index {
                arr.push(Bson::Null);
            }
            arr[index] = value;
            Ok(())
        }
    }
}

// ── remove ──────────────────────────────────────────────────────

/// Remove the value at `path`. Removing an array element shifts the
/// remaining elements left. Fails when an intermediate step resolves to
/// a non-container value.
pub fn remove(
    root: &mut Document,
    path: &str,
    match_pos: &mut Option<usize>,
) -> Result<Option<Bson>, QueryError> {
    remove_node(Node::Doc(root), path, match_pos)
}

fn remove_node(
    node: Node<'_>,
    path: &str,
    match_pos: &mut Option<usize>,
) -> Result<Option<Bson>, QueryError> {
    let (key, rest) = split_first(path);
    let Some(rest) = rest else {
        return Ok(match node {
            Node::Doc(doc) => doc.remove(key),
            Node::Arr(arr) => match as_index(key) {
                Some(index) if index < arr.len() => Some(arr.remove(index)),
                _ => None,
            },
        });
    };
    let rest = resolve_positional(rest, match_pos)?;
    match child_mut(node, key).and_then(node_of_mut) {
        Some(child) => remove_node(child, &rest, match_pos),
        None => Err(QueryError::BadValue("failed to remove subdocument".into())),
    }
}

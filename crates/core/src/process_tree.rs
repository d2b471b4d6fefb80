//! Display tree of a workflow's processes, plus the structural checks run
//! before a parent or dependency edit is stored.
//!
//! Processes are stored flat with a nullable `parent_id`. The tree is built
//! as an index arena: every node lives in one `Vec`, children are indices.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::types::DbId;

/// Minimal process data needed to place it in the tree.
pub trait TreeItem {
    fn id(&self) -> DbId;
    fn parent_id(&self) -> Option<DbId>;
    fn order(&self) -> i32;
}

#[derive(Debug)]
pub struct ProcessTree<T> {
    nodes: Vec<T>,
    children: Vec<Vec<usize>>,
    roots: Vec<usize>,
}

/// Owned nested form of the tree, for JSON responses.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeNode<T> {
    #[serde(flatten)]
    pub item: T,
    pub children: Vec<TreeNode<T>>,
}

impl<T: TreeItem> ProcessTree<T> {
    /// Group by parent; siblings are sorted by `(order, id)`. Nodes whose
    /// parent is absent become roots.
    pub fn build(items: Vec<T>) -> Self {
        let index: HashMap<DbId, usize> =
            items.iter().enumerate().map(|(i, item)| (item.id(), i)).collect();

        let mut children = vec![Vec::new(); items.len()];
        let mut roots = Vec::new();
        for (i, item) in items.iter().enumerate() {
            match item.parent_id().and_then(|p| index.get(&p)) {
                Some(&parent) if parent != i => children[parent].push(i),
                _ => roots.push(i),
            }
        }

        let key = |i: &usize| (items[*i].order(), items[*i].id());
        roots.sort_by_key(key);
        for list in &mut children {
            list.sort_by_key(key);
        }

        Self {
            nodes: items,
            children,
            roots,
        }
    }

    /// Convert into nested nodes. Nodes only reachable through a parent
    /// cycle are dropped.
    pub fn into_nested(self) -> Vec<TreeNode<T>> {
        let mut slots: Vec<Option<T>> = self.nodes.into_iter().map(Some).collect();
        let mut visited = vec![false; slots.len()];
        self.roots
            .iter()
            .filter_map(|&r| nest(r, &mut slots, &self.children, &mut visited))
            .collect()
    }
}

/// Whether making `parent` the parent of `id` would close a parent cycle.
/// Walks up from `parent` through the current parents in `items`.
pub fn creates_parent_cycle<T: TreeItem>(items: &[T], id: DbId, parent: DbId) -> bool {
    let parents: HashMap<DbId, Option<DbId>> =
        items.iter().map(|item| (item.id(), item.parent_id())).collect();
    let mut seen = HashSet::new();
    let mut current = Some(parent);
    while let Some(node) = current {
        if node == id {
            return true;
        }
        // An existing loop above `parent` that does not pass through `id`.
        if !seen.insert(node) {
            return false;
        }
        current = parents.get(&node).copied().flatten();
    }
    false
}

/// Whether letting `id` depend on `depends_on` would close a dependency
/// cycle. `edges` holds the stored `(process, depends_on)` pairs.
pub fn creates_dependency_cycle(edges: &[(DbId, DbId)], id: DbId, depends_on: &[DbId]) -> bool {
    let mut graph: HashMap<DbId, Vec<DbId>> = HashMap::new();
    for &(from, to) in edges {
        graph.entry(from).or_default().push(to);
    }

    let mut seen = HashSet::new();
    let mut stack: Vec<DbId> = depends_on.to_vec();
    while let Some(node) = stack.pop() {
        if node == id {
            return true;
        }
        if seen.insert(node) {
            stack.extend(graph.get(&node).into_iter().flatten());
        }
    }
    false
}

fn nest<T>(
    i: usize,
    slots: &mut [Option<T>],
    children: &[Vec<usize>],
    visited: &mut [bool],
) -> Option<TreeNode<T>> {
    if std::mem::replace(&mut visited[i], true) {
        return None;
    }
    let item = slots[i].take()?;
    let kids = children[i]
        .iter()
        .filter_map(|&c| nest(c, slots, children, visited))
        .collect();
    Some(TreeNode {
        item,
        children: kids,
    })
}

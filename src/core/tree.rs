//! Allocation tree - the static, weighted hierarchy progress is measured against
//!
//! Nodes live in an arena and refer to their parent by index, so the tree owns
//! every node and nothing points back into it. The tree is built once, before
//! any event is applied, and is read-only afterwards.

use crate::errors::{TreeError, TreeResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

/// Allowed drift when comparing weights.
pub const WEIGHT_TOLERANCE: f64 = 1e-9;

static NEXT_TREE: AtomicU64 = AtomicU64::new(0);

/// Handle to a node of one particular [`AllocationTree`].
///
/// Carries the tag of the tree that issued it, so it never resolves in any
/// other tree even when the index is in range there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AllocationId {
    tree: u64,
    index: usize,
}

impl fmt::Display for AllocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.tree, self.index)
    }
}

/// A unit of trackable work capacity
#[derive(Debug, Clone)]
pub struct AllocationNode {
    pub description: String,
    pub total_units: u64,
    /// Share of global progress this node is worth once complete
    pub fraction_of_root: f64,
    pub parent: Option<AllocationId>,
    children: Vec<AllocationId>,
}

impl AllocationNode {
    pub fn children(&self) -> &[AllocationId] {
        &self.children
    }

    /// Weight of a single unit of this node
    pub fn unit_fraction(&self) -> f64 {
        self.fraction_of_root / self.total_units as f64
    }
}

/// YAML shape of an allocation tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeSpec {
    pub description: String,
    pub units: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fraction: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeSpec>,
}

/// Arena-backed allocation hierarchy with a single root
#[derive(Debug)]
pub struct AllocationTree {
    tag: u64,
    nodes: Vec<AllocationNode>,
}

impl AllocationTree {
    /// Create a tree whose root accounts for all of the progress
    pub fn new(description: impl Into<String>, units: u64) -> TreeResult<Self> {
        let mut tree = Self::empty();
        tree.insert(description.into(), units, 1.0, None)?;
        Ok(tree)
    }

    fn empty() -> Self {
        Self {
            tag: NEXT_TREE.fetch_add(1, Ordering::Relaxed),
            nodes: Vec::new(),
        }
    }

    fn id_at(&self, index: usize) -> AllocationId {
        AllocationId {
            tree: self.tag,
            index,
        }
    }

    /// Add a child that counts as one unit of its parent.
    ///
    /// The child's weight is the parent's weight split evenly across the
    /// parent's units.
    pub fn add_child(
        &mut self,
        parent: AllocationId,
        description: impl Into<String>,
        units: u64,
    ) -> TreeResult<AllocationId> {
        let fraction = self
            .get(parent)
            .ok_or(TreeError::UnknownAllocation(parent))?
            .unit_fraction();
        self.insert(description.into(), units, fraction, Some(parent))
    }

    /// Add a child with a weight chosen by the caller
    pub fn add_child_with_fraction(
        &mut self,
        parent: AllocationId,
        description: impl Into<String>,
        units: u64,
        fraction: f64,
    ) -> TreeResult<AllocationId> {
        if self.get(parent).is_none() {
            return Err(TreeError::UnknownAllocation(parent));
        }
        self.insert(description.into(), units, fraction, Some(parent))
    }

    fn insert(
        &mut self,
        description: String,
        units: u64,
        fraction: f64,
        parent: Option<AllocationId>,
    ) -> TreeResult<AllocationId> {
        if units == 0 {
            return Err(TreeError::ZeroUnits(description));
        }
        if !(0.0..=1.0).contains(&fraction) {
            return Err(TreeError::FractionOutOfRange {
                description,
                fraction,
            });
        }

        let id = self.id_at(self.nodes.len());
        self.nodes.push(AllocationNode {
            description,
            total_units: units,
            fraction_of_root: fraction,
            parent,
            children: Vec::new(),
        });
        if let Some(parent) = parent {
            self.nodes[parent.index].children.push(id);
        }
        Ok(id)
    }

    pub fn root(&self) -> AllocationId {
        self.id_at(0)
    }

    pub fn get(&self, id: AllocationId) -> Option<&AllocationNode> {
        if id.tree != self.tag {
            return None;
        }
        self.nodes.get(id.index)
    }

    pub fn parent(&self, id: AllocationId) -> Option<AllocationId> {
        self.get(id).and_then(|node| node.parent)
    }

    pub fn children(&self, id: AllocationId) -> &[AllocationId] {
        self.get(id).map(|node| node.children()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All ids in insertion order, which is a pre-order walk for loaded trees
    pub fn ids(&self) -> impl Iterator<Item = AllocationId> + '_ {
        (0..self.nodes.len()).map(|index| self.id_at(index))
    }

    /// Resolve a `/`-separated description path.
    ///
    /// Paths start below the root; a leading segment naming the root itself is
    /// accepted too. An empty path resolves to the root.
    pub fn find(&self, path: &str) -> TreeResult<AllocationId> {
        let segments: Vec<&str> = path
            .split('/')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();

        if let Some(id) = self.descend(self.root(), &segments) {
            return Ok(id);
        }
        let root = &self.nodes[0];
        if segments.first() == Some(&root.description.as_str()) {
            if let Some(id) = self.descend(self.root(), &segments[1..]) {
                return Ok(id);
            }
        }
        Err(TreeError::PathNotFound(path.to_string()))
    }

    fn descend(&self, from: AllocationId, segments: &[&str]) -> Option<AllocationId> {
        segments.iter().try_fold(from, |current, segment| {
            self.children(current)
                .iter()
                .copied()
                .find(|child| self.nodes[child.index].description == *segment)
        })
    }

    /// Description path from the root's first child down to `id`
    pub fn path_of(&self, id: AllocationId) -> Option<String> {
        let mut segments = Vec::new();
        let mut current = self.get(id)?;
        while let Some(parent) = current.parent {
            segments.push(current.description.as_str());
            current = &self.nodes[parent.index];
        }
        segments.reverse();
        Some(segments.join("/"))
    }

    /// Check that weights add up: completing every unit of every node has to
    /// land global progress at 1.0.
    pub fn validate(&self) -> TreeResult<()> {
        let root = &self.nodes[0];
        if (root.fraction_of_root - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(TreeError::WeightMismatch {
                description: root.description.clone(),
                expected: 1.0,
                actual: root.fraction_of_root,
            });
        }

        for node in &self.nodes {
            if node.children.len() as u64 > node.total_units {
                return Err(TreeError::TooManyChildren {
                    description: node.description.clone(),
                    children: node.children.len(),
                    units: node.total_units,
                });
            }

            let expected = node.unit_fraction();
            for child in node.children.iter().map(|id| &self.nodes[id.index]) {
                if (child.fraction_of_root - expected).abs() > WEIGHT_TOLERANCE {
                    return Err(TreeError::WeightMismatch {
                        description: child.description.clone(),
                        expected,
                        actual: child.fraction_of_root,
                    });
                }
            }
        }

        Ok(())
    }

    /// Load a tree from a YAML file
    pub fn from_file(path: &Path) -> TreeResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> TreeResult<Self> {
        let spec: TreeSpec = serde_yaml::from_str(content)?;
        Self::from_spec(&spec)
    }

    pub fn from_spec(spec: &TreeSpec) -> TreeResult<Self> {
        let mut tree = Self::empty();
        let root = tree.insert(
            spec.description.clone(),
            spec.units,
            spec.fraction.unwrap_or(1.0),
            None,
        )?;
        tree.attach(root, &spec.children)?;
        Ok(tree)
    }

    fn attach(&mut self, parent: AllocationId, children: &[TreeSpec]) -> TreeResult<()> {
        for spec in children {
            let id = match spec.fraction {
                Some(fraction) => self.add_child_with_fraction(
                    parent,
                    spec.description.clone(),
                    spec.units,
                    fraction,
                )?,
                None => self.add_child(parent, spec.description.clone(), spec.units)?,
            };
            self.attach(id, &spec.children)?;
        }
        Ok(())
    }

    /// Rebuild the YAML shape, with every weight spelled out
    pub fn to_spec(&self) -> TreeSpec {
        self.spec_of(self.root())
    }

    fn spec_of(&self, id: AllocationId) -> TreeSpec {
        let node = &self.nodes[id.index];
        TreeSpec {
            description: node.description.clone(),
            units: node.total_units,
            fraction: Some(node.fraction_of_root),
            children: node.children.iter().map(|c| self.spec_of(*c)).collect(),
        }
    }

    fn fmt_node(&self, f: &mut fmt::Formatter<'_>, id: AllocationId, depth: usize) -> fmt::Result {
        let node = &self.nodes[id.index];
        writeln!(
            f,
            "{:indent$}{} ({} units, {:.1}%)",
            "",
            node.description,
            node.total_units,
            node.fraction_of_root * 100.0,
            indent = depth * 2
        )?;
        for child in &node.children {
            self.fmt_node(f, *child, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for AllocationTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_node(f, self.root(), 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUILD_TREE: &str = r#"
description: build
units: 2
children:
  - description: pull base image
    units: 10
  - description: build layers
    units: 3
    children:
      - description: dependencies
        units: 4
      - description: classes
        units: 1
"#;

    #[test]
    fn test_child_fraction_splits_parent() {
        let mut tree = AllocationTree::new("root", 4).unwrap();
        let child = tree.add_child(tree.root(), "child", 10).unwrap();
        let grandchild = tree.add_child(child, "grandchild", 3).unwrap();

        assert_eq!(tree.get(child).unwrap().fraction_of_root, 0.25);
        assert!((tree.get(grandchild).unwrap().fraction_of_root - 0.025).abs() < WEIGHT_TOLERANCE);
        assert_eq!(tree.parent(grandchild), Some(child));
        assert_eq!(tree.children(tree.root()), &[child]);
        assert_eq!(tree.len(), 3);
        assert!(!tree.is_empty());
    }

    #[test]
    fn test_zero_units_rejected() {
        assert!(matches!(
            AllocationTree::new("root", 0),
            Err(TreeError::ZeroUnits(_))
        ));

        let mut tree = AllocationTree::new("root", 1).unwrap();
        let root = tree.root();
        assert!(matches!(
            tree.add_child(root, "empty", 0),
            Err(TreeError::ZeroUnits(d)) if d == "empty"
        ));
    }

    #[test]
    fn test_fraction_out_of_range() {
        let mut tree = AllocationTree::new("root", 2).unwrap();
        let root = tree.root();
        assert!(matches!(
            tree.add_child_with_fraction(root, "heavy", 1, 1.5),
            Err(TreeError::FractionOutOfRange { .. })
        ));
    }

    #[test]
    fn test_unknown_parent() {
        let mut tree = AllocationTree::new("root", 2).unwrap();
        let stray = tree.id_at(7);
        assert!(matches!(
            tree.add_child(stray, "orphan", 1),
            Err(TreeError::UnknownAllocation(_))
        ));
    }

    #[test]
    fn test_ids_do_not_resolve_in_other_trees() {
        let mut tree = AllocationTree::new("root", 2).unwrap();
        let root = tree.root();
        let a = tree.add_child(root, "A", 10).unwrap();

        let mut other = AllocationTree::new("other", 1).unwrap();
        let other_root = other.root();
        let x = other.add_child(other_root, "X", 100).unwrap();

        assert_ne!(root, other_root);
        assert!(tree.get(a).is_some());
        assert!(tree.get(x).is_none());
        assert!(tree.path_of(x).is_none());
        assert!(matches!(
            tree.add_child(x, "stray", 1),
            Err(TreeError::UnknownAllocation(id)) if id == x
        ));
    }

    #[test]
    fn test_parse_tree() {
        let tree = AllocationTree::from_yaml_str(BUILD_TREE).unwrap();
        assert_eq!(tree.len(), 5);

        let layers = tree.find("build layers").unwrap();
        assert_eq!(tree.get(layers).unwrap().fraction_of_root, 0.5);

        let deps = tree.find("build/build layers/dependencies").unwrap();
        assert_eq!(tree.find("build layers/dependencies").unwrap(), deps);
        assert!((tree.get(deps).unwrap().fraction_of_root - 0.5 / 3.0).abs() < WEIGHT_TOLERANCE);
        assert_eq!(tree.path_of(deps).unwrap(), "build layers/dependencies");

        assert_eq!(tree.find("").unwrap(), tree.root());
        assert_eq!(tree.find("build").unwrap(), tree.root());
        assert!(matches!(
            tree.find("build layers/tests"),
            Err(TreeError::PathNotFound(_))
        ));

        tree.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_bad_weights() {
        let mut tree = AllocationTree::new("root", 2).unwrap();
        let root = tree.root();
        tree.add_child_with_fraction(root, "a", 10, 0.5).unwrap();
        tree.add_child_with_fraction(root, "b", 10, 0.4).unwrap();
        assert!(matches!(
            tree.validate(),
            Err(TreeError::WeightMismatch { description, .. }) if description == "b"
        ));
    }

    #[test]
    fn test_validate_rejects_too_many_children() {
        let mut tree = AllocationTree::new("root", 1).unwrap();
        let root = tree.root();
        tree.add_child(root, "a", 1).unwrap();
        tree.add_child(root, "b", 1).unwrap();
        assert!(matches!(
            tree.validate(),
            Err(TreeError::TooManyChildren { children: 2, .. })
        ));
    }

    #[test]
    fn test_document_round_trip_keeps_weights() {
        let tree = AllocationTree::from_yaml_str(BUILD_TREE).unwrap();
        let rebuilt = AllocationTree::from_spec(&tree.to_spec()).unwrap();
        rebuilt.validate().unwrap();
        assert_eq!(rebuilt.to_spec(), tree.to_spec());
    }

    #[test]
    fn test_display_layout() {
        let tree = AllocationTree::from_yaml_str(BUILD_TREE).unwrap();
        let text = tree.to_string();
        assert!(text.starts_with("build (2 units, 100.0%)\n"));
        assert!(text.contains("\n  pull base image (10 units, 50.0%)\n"));
        assert!(text.contains("\n    classes (1 units, 16.7%)\n"));
    }
}

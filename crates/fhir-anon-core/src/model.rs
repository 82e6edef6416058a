//! The generic element-node tree that stands in for a parsed FHIR resource.
//!
//! This is deliberately NOT a per-resource-type typed schema: the engine
//! never needs to know what a `Patient` or an `Observation` looks like, only
//! that every node carries an `instance_type`, a `name` within its parent,
//! an optional scalar value, and an ordered list of children.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One step on the way from the root to a node: the field name the node is
/// held under, and which occurrence of that name (siblings can repeat a
/// field name when the field is a FHIR array).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathStep {
    pub field: String,
    pub occurrence: usize,
}

/// The path from a resource's root down to one of its descendant nodes.
/// An empty path refers to the root itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodePath(pub Vec<PathStep>);

impl NodePath {
    pub fn root() -> Self {
        NodePath(Vec::new())
    }

    pub fn child(&self, field: &str, occurrence: usize) -> Self {
        let mut steps = self.0.clone();
        steps.push(PathStep {
            field: field.to_string(),
            occurrence,
        });
        NodePath(steps)
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// True if `self` is `other`, or a descendant of it. Used to honor a
    /// `keep` rule's effect on everything underneath the node it matched.
    pub fn starts_with(&self, other: &NodePath) -> bool {
        other.0.len() <= self.0.len() && self.0[..other.0.len()] == other.0[..]
    }

    pub fn parent(&self) -> Option<(NodePath, &PathStep)> {
        let (last, rest) = self.0.split_last()?;
        Some((NodePath(rest.to_vec()), last))
    }

    /// Renders the path as a `/a/b/1/c`-style pointer, the only textual
    /// path format a serializable `ProcessRecord` can carry.
    pub fn to_pointer(&self) -> String {
        if self.0.is_empty() {
            return "/".to_string();
        }
        let mut out = String::new();
        for step in &self.0 {
            out.push('/');
            out.push_str(&step.field);
            if step.occurrence > 0 {
                out.push('/');
                out.push_str(&step.occurrence.to_string());
            }
        }
        out
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_pointer())
    }
}

/// A node in the generic resource tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementNode {
    pub instance_type: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    #[serde(default)]
    pub children: Vec<ElementNode>,
}

/// FHIR primitive types the redact/generalize processors treat as leaves
/// rather than compound subtrees. Not exhaustive; new primitives can be
/// added here without touching the processors that consult it.
const PRIMITIVE_TYPES: &[&str] = &[
    "string", "code", "id", "uri", "url", "canonical", "markdown", "base64Binary", "boolean",
    "integer", "unsignedInt", "positiveInt", "decimal", "date", "dateTime", "instant", "time",
    "reference", "age",
];

impl ElementNode {
    pub fn new_leaf(instance_type: &str, name: &str, value: serde_json::Value) -> Self {
        ElementNode {
            instance_type: instance_type.to_string(),
            name: name.to_string(),
            value: Some(value),
            children: Vec::new(),
        }
    }

    pub fn new_compound(instance_type: &str, name: &str) -> Self {
        ElementNode {
            instance_type: instance_type.to_string(),
            name: name.to_string(),
            value: None,
            children: Vec::new(),
        }
    }

    pub fn is_primitive(&self) -> bool {
        PRIMITIVE_TYPES.contains(&self.instance_type.as_str()) || self.children.is_empty()
    }

    pub fn value_as_str(&self) -> Option<&str> {
        self.value.as_ref().and_then(|v| v.as_str())
    }

    /// Walks down to the node at `path`, returning `None` if any step is
    /// out of range.
    pub fn get(&self, path: &NodePath) -> Option<&ElementNode> {
        let mut current = self;
        for step in &path.0 {
            current = current
                .children
                .iter()
                .filter(|c| c.name == step.field)
                .nth(step.occurrence)?;
        }
        Some(current)
    }

    pub fn get_mut(&mut self, path: &NodePath) -> Option<&mut ElementNode> {
        let mut current = self;
        for step in &path.0 {
            current = current
                .children
                .iter_mut()
                .filter(|c| c.name == step.field)
                .nth(step.occurrence)?;
        }
        Some(current)
    }

    /// Removes the node at `path`. Returns `false` if `path` is the root
    /// (roots cannot be deleted this way) or no such node exists.
    pub fn delete_at(&mut self, path: &NodePath) -> bool {
        let Some((parent_path, last)) = path.parent() else {
            return false;
        };
        let Some(parent) = self.get_mut(&parent_path) else {
            return false;
        };
        let mut seen = 0;
        for (i, child) in parent.children.iter().enumerate() {
            if child.name == last.field {
                if seen == last.occurrence {
                    parent.children.remove(i);
                    return true;
                }
                seen += 1;
            }
        }
        false
    }

    /// Pre-order traversal producing `(path, node)` pairs for every node in
    /// the tree, root included at the empty path.
    pub fn walk(&self) -> Vec<(NodePath, &ElementNode)> {
        let mut out = Vec::new();
        self.walk_from(NodePath::root(), &mut out);
        out
    }

    fn walk_from<'a>(&'a self, path: NodePath, out: &mut Vec<(NodePath, &'a ElementNode)>) {
        out.push((path.clone(), self));
        let mut occurrence_by_name: std::collections::HashMap<&str, usize> = Default::default();
        for child in &self.children {
            let occ = occurrence_by_name.entry(child.name.as_str()).or_insert(0);
            let child_path = path.child(&child.name, *occ);
            *occ += 1;
            child.walk_from(child_path, out);
        }
    }

    /// Strips any direct or nested child named `meta`, used when the
    /// engine collapses `Resource.meta` after a resource with no `keep`
    /// rules has been fully processed.
    pub fn strip_named(&mut self, name: &str) {
        self.children.retain(|c| c.name != name);
        for child in &mut self.children {
            child.strip_named(name);
        }
    }

    /// The empty shell a resource is replaced with when the
    /// `processingErrors` policy is `Skip` and at least one processing
    /// error occurred: same resource type, no other content.
    pub fn empty_shell(instance_type: &str) -> Self {
        ElementNode {
            instance_type: instance_type.to_string(),
            name: instance_type.to_string(),
            value: None,
            children: Vec::new(),
        }
    }
}

/// A root `ElementNode` plus the bookkeeping the engine needs to find the
/// resource's own id (for date-shift subject derivation and audit records).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub root: ElementNode,
}

impl Resource {
    pub fn new(root: ElementNode) -> Self {
        Resource { root }
    }

    pub fn instance_type(&self) -> &str {
        &self.root.instance_type
    }

    pub fn id(&self) -> Option<&str> {
        self.root
            .children
            .iter()
            .find(|c| c.name == "id")
            .and_then(|c| c.value_as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ElementNode {
        let mut root = ElementNode::new_compound("Patient", "Patient");
        root.children.push(ElementNode::new_leaf("id", "id", "p1".into()));
        let mut name = ElementNode::new_compound("HumanName", "name");
        name.children
            .push(ElementNode::new_leaf("string", "family", "Doe".into()));
        root.children.push(name);
        root
    }

    #[test]
    fn get_and_get_mut_agree() {
        let tree = sample();
        let path = NodePath::root().child("name", 0).child("family", 0);
        assert_eq!(tree.get(&path).unwrap().value_as_str(), Some("Doe"));
    }

    #[test]
    fn delete_at_removes_leaf() {
        let mut tree = sample();
        let path = NodePath::root().child("name", 0).child("family", 0);
        assert!(tree.delete_at(&path));
        let name = tree.get(&NodePath::root().child("name", 0)).unwrap();
        assert!(name.children.is_empty());
    }

    #[test]
    fn to_pointer_renders_repeated_occurrences() {
        let path = NodePath::root().child("name", 1).child("family", 0);
        assert_eq!(path.to_pointer(), "/name/1/family");
    }

    #[test]
    fn starts_with_detects_descendants() {
        let kept = NodePath::root().child("name", 0);
        let descendant = kept.child("family", 0);
        assert!(descendant.starts_with(&kept));
        assert!(!kept.starts_with(&descendant));
    }
}

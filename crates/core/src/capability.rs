//! Capability tree: the static hierarchy of role definitions.
//!
//! The root is a dispatcher; children are specialists. The tree is built
//! once at startup and shared read-only between all concurrent turns.
//! Children are owned values, so a tree can never contain a cycle.

use serde::{Deserialize, Serialize};

/// A role definition: instruction text, model id, and exposed tool names.
///
/// Tool names are not checked against any registry here; they are resolved
/// at dispatch time, which allows tools to be registered late.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityNode {
    pub name: String,
    pub model_id: String,

    /// One-line summary of the role
    #[serde(default)]
    pub description: String,

    pub instruction: String,

    /// Tool names exposed by this role, unique, in declaration order
    #[serde(default)]
    tool_names: Vec<String>,

    #[serde(default)]
    children: Vec<CapabilityNode>,
}

impl CapabilityNode {
    pub fn new(
        name: impl Into<String>,
        model_id: impl Into<String>,
        instruction: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            model_id: model_id.into(),
            description: String::new(),
            instruction: instruction.into(),
            tool_names: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Expose tools by name. Duplicates are ignored.
    pub fn with_tools<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            let name = name.into();
            if !self.tool_names.contains(&name) {
                self.tool_names.push(name);
            }
        }
        self
    }

    pub fn with_child(mut self, child: CapabilityNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn tool_names(&self) -> &[String] {
        &self.tool_names
    }

    pub fn children(&self) -> &[CapabilityNode] {
        &self.children
    }

    /// All descendants in depth-first pre-order, excluding `self`.
    pub fn descendants(&self) -> Vec<&CapabilityNode> {
        let mut out = Vec::new();
        for child in &self.children {
            out.push(child);
            out.extend(child.descendants());
        }
        out
    }

    /// Depth-first union of tool names across the whole tree, first
    /// occurrence wins.
    pub fn collect_tool_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for node in std::iter::once(self).chain(self.descendants()) {
            for name in &node.tool_names {
                if !names.contains(&name.as_str()) {
                    names.push(name);
                }
            }
        }
        names
    }

    /// Find a node by name anywhere in the tree.
    pub fn find(&self, name: &str) -> Option<&CapabilityNode> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> CapabilityNode {
        CapabilityNode::new("root", "m-root", "dispatch")
            .with_tools(["shared"])
            .with_child(
                CapabilityNode::new("a", "m", "alpha")
                    .with_tools(["a1", "shared"])
                    .with_child(CapabilityNode::new("a_leaf", "m", "leaf").with_tools(["leaf1"])),
            )
            .with_child(CapabilityNode::new("b", "m", "beta").with_tools(["b1", "a1"]))
    }

    #[test]
    fn duplicate_tools_ignored() {
        let node = CapabilityNode::new("n", "m", "i").with_tools(["x", "y", "x"]);
        assert_eq!(node.tool_names(), &["x".to_string(), "y".to_string()]);
    }

    #[test]
    fn descendants_are_depth_first() {
        let root = tree();
        let names: Vec<_> = root.descendants().iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["a", "a_leaf", "b"]);
    }

    #[test]
    fn tool_union_is_depth_first_and_unique() {
        let root = tree();
        assert_eq!(root.collect_tool_names(), vec!["shared", "a1", "leaf1", "b1"]);
    }

    #[test]
    fn find_nested_node() {
        let root = tree();
        assert_eq!(root.find("a_leaf").map(|n| n.instruction.as_str()), Some("leaf"));
        assert!(root.find("missing").is_none());
    }
}

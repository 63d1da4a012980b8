// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hierarchical trace nodes attached to every log record emitted while a
//! task runs, so an observer can reconstruct the causal chain
//! schedule -> backup -> repository -> engine invocation.
//!
//! Mirrors `original_source/treenodes.py`'s `TreeNode`: a parent-linked
//! name with a unique suffix, rendering as `"root > child > grandchild"`.

use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct TraceNode {
    id: String,
    parent: Option<Arc<TraceNode>>,
}

impl TraceNode {
    /// Start a new root trace node named `name`.
    pub fn root(name: impl Into<String>) -> Self {
        Self { id: Self::format(name.into()), parent: None }
    }

    /// Create a child node extending this one.
    pub fn extend(&self, name: impl Into<String>) -> Self {
        Self { id: Self::format(name.into()), parent: Some(Arc::new(self.clone())) }
    }

    fn format(name: String) -> String {
        format!("{name}({})", uuid::Uuid::new_v4())
    }

    /// The full chain of node ids from root to this node.
    pub fn explain(&self) -> Vec<String> {
        let mut chain = match &self.parent {
            Some(parent) => parent.explain(),
            None => Vec::new(),
        };
        chain.push(self.id.clone());
        chain
    }
}

impl fmt::Display for TraceNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.explain().join(" > "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_parent_chain() {
        let root = TraceNode::root("Daemon-schedule");
        let child = root.extend("backup_nightly");
        let grandchild = child.extend("repository_s3");
        let rendered = grandchild.to_string();
        assert_eq!(rendered.matches(" > ").count(), 2);
        assert!(rendered.starts_with("Daemon-schedule("));
        assert!(rendered.contains("backup_nightly("));
        assert!(rendered.ends_with(')'));
    }

    #[test]
    fn same_name_different_nodes_have_distinct_ids() {
        let a = TraceNode::root("x");
        let b = TraceNode::root("x");
        assert_ne!(a.to_string(), b.to_string());
    }
}

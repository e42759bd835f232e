//! Node paths
//!
//! A `NodePath` addresses a node by the child index taken at every level
//! below the fragment root, e.g. `/1/0/2`. Paths are what a rendering layer
//! hands back when reporting a live selection, because they survive the
//! tree being re-parsed from the same stored markup.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MarkupError;

/// Child-index path from the root to a node
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodePath {
    steps: Vec<usize>,
}

impl NodePath {
    /// The path of the fragment root
    pub fn root() -> Self {
        Self { steps: Vec::new() }
    }

    pub fn from_steps(steps: Vec<usize>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[usize] {
        &self.steps
    }

    pub fn is_root(&self) -> bool {
        self.steps.is_empty()
    }

    /// Path of the `index`-th child of this node
    pub fn child(&self, index: usize) -> Self {
        let mut steps = self.steps.clone();
        steps.push(index);
        Self { steps }
    }

    pub fn parent(&self) -> Option<Self> {
        let (_, rest) = self.steps.split_last()?;
        Some(Self {
            steps: rest.to_vec(),
        })
    }

    /// Whether `self` is `other` or one of its ancestors
    pub fn contains(&self, other: &NodePath) -> bool {
        other.steps.starts_with(&self.steps)
    }
}

// Derived `Ord` compares steps lexicographically, which is document order:
// an ancestor sorts before its descendants, earlier siblings before later ones.

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.steps.is_empty() {
            return f.write_str("/");
        }
        for step in &self.steps {
            write!(f, "/{}", step)?;
        }
        Ok(())
    }
}

impl FromStr for NodePath {
    type Err = MarkupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let rest = trimmed
            .strip_prefix('/')
            .ok_or_else(|| MarkupError::InvalidPath(s.to_string()))?;
        if rest.is_empty() {
            return Ok(Self::root());
        }

        let steps = rest
            .split('/')
            .map(|step| {
                step.parse::<usize>()
                    .map_err(|_| MarkupError::InvalidPath(s.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { steps })
    }
}

impl TryFrom<String> for NodePath {
    type Error = MarkupError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<NodePath> for String {
    fn from(path: NodePath) -> Self {
        path.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_parse() {
        let path = NodePath::from_steps(vec![1, 0, 2]);
        assert_eq!(path.to_string(), "/1/0/2");
        assert_eq!("/1/0/2".parse::<NodePath>().unwrap(), path);
        assert_eq!("/".parse::<NodePath>().unwrap(), NodePath::root());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("1/2".parse::<NodePath>().is_err());
        assert!("/a/2".parse::<NodePath>().is_err());
        assert!("/1//2".parse::<NodePath>().is_err());
    }

    #[test]
    fn test_document_order() {
        let parent = NodePath::from_steps(vec![0]);
        let child = parent.child(3);
        let sibling = NodePath::from_steps(vec![1]);

        assert!(parent < child);
        assert!(child < sibling);
        assert!(parent.contains(&child));
        assert!(!sibling.contains(&child));
        assert_eq!(child.parent(), Some(parent));
    }

    #[test]
    fn test_serde_as_string() {
        let path = NodePath::from_steps(vec![0, 4]);
        let json = serde_json::to_string(&path).unwrap();
        assert_eq!(json, "\"/0/4\"");
        let back: NodePath = serde_json::from_str(&json).unwrap();
        assert_eq!(back, path);
    }
}

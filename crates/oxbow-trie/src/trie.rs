//! The persistent trie and its operations.

use std::sync::Arc;

use crate::node::{Payload, TrieNode};

/// An immutable map from byte-string keys to typed values.
///
/// A `Trie` is a cheap-to-clone handle to a shared, immutable node tree.
/// [`put`](Trie::put) and [`remove`](Trie::remove) return new tries; the
/// receiver is never changed. Subtrees off the updated path are shared
/// between the old and new trie.
#[derive(Clone, Default)]
pub struct Trie {
    root: Option<Arc<TrieNode>>,
}

/// Result of removing a key from a subtree.
enum Removal {
    /// The key was not present; the subtree is unchanged.
    Unchanged,
    /// The subtree was rebuilt; `None` means the subtree vanished entirely.
    Replaced(Option<Arc<TrieNode>>),
}

impl Trie {
    /// Creates an empty trie.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the trie maps no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Looks up `key` and returns a borrow of its value.
    ///
    /// Returns `None` when the key is unmapped, or when it is mapped to a
    /// value of a different type than `T`. The empty key addresses the root.
    #[must_use]
    pub fn get<T: Send + Sync + 'static>(&self, key: &[u8]) -> Option<&T> {
        let mut node = self.root.as_ref()?;
        for byte in key {
            node = node.children.get(byte)?;
        }
        node.value.as_ref()?.downcast_ref::<T>()
    }

    /// Returns a new trie in which `key` maps to `value`.
    ///
    /// Nodes on the path from the root to `key` are freshly cloned; all
    /// other subtrees are shared with the receiver. If the key's node
    /// already exists its children are preserved, whether or not it carried
    /// a value before. The empty key writes at the root.
    #[must_use]
    pub fn put<T: Send + Sync + 'static>(&self, key: &[u8], value: T) -> Trie {
        let payload: Payload = Arc::new(value);
        let root = Self::put_in(self.root.as_deref(), key, payload);
        Trie {
            root: Some(Arc::new(root)),
        }
    }

    /// Returns a new trie in which `key` is unmapped.
    ///
    /// If the key's node has no children it is dropped from its parent, and
    /// the deletion contracts upward through every ancestor left childless
    /// and valueless. Removing an absent key returns a trie sharing the
    /// receiver's root.
    #[must_use]
    pub fn remove(&self, key: &[u8]) -> Trie {
        let Some(root) = self.root.as_ref() else {
            return self.clone();
        };
        match Self::remove_in(root, key) {
            Removal::Unchanged => self.clone(),
            Removal::Replaced(root) => Trie { root },
        }
    }

    /// Rebuilds the path for `key` under `node`, returning the new subtree
    /// root. `node` is `None` when the suffix descends below the existing
    /// tree.
    fn put_in(node: Option<&TrieNode>, key: &[u8], payload: Payload) -> TrieNode {
        let Some((&byte, rest)) = key.split_first() else {
            // Terminal node: keep existing children, install the value.
            return match node {
                Some(n) => TrieNode {
                    children: n.children.clone(),
                    value: Some(payload),
                },
                None => TrieNode::leaf(payload),
            };
        };

        let mut children = node.map(|n| n.children.clone()).unwrap_or_default();
        let existing = children.get(&byte).cloned();
        let child = Self::put_in(existing.as_deref(), rest, payload);
        children.insert(byte, Arc::new(child));
        TrieNode {
            children,
            value: node.and_then(|n| n.value.clone()),
        }
    }

    /// Removes `key` under `node`, contracting childless valueless nodes.
    fn remove_in(node: &Arc<TrieNode>, key: &[u8]) -> Removal {
        let Some((&byte, rest)) = key.split_first() else {
            if !node.is_value_node() {
                return Removal::Unchanged;
            }
            if node.children.is_empty() {
                return Removal::Replaced(None);
            }
            // Demote to an interior node, keeping the children.
            return Removal::Replaced(Some(Arc::new(TrieNode {
                children: node.children.clone(),
                value: None,
            })));
        };

        let Some(child) = node.children.get(&byte) else {
            return Removal::Unchanged;
        };
        match Self::remove_in(child, rest) {
            Removal::Unchanged => Removal::Unchanged,
            Removal::Replaced(new_child) => {
                let mut children = node.children.clone();
                match new_child {
                    Some(child) => {
                        children.insert(byte, child);
                    }
                    None => {
                        children.remove(&byte);
                    }
                }
                if children.is_empty() && !node.is_value_node() {
                    // This node only existed to reach the removed key.
                    Removal::Replaced(None)
                } else {
                    Removal::Replaced(Some(Arc::new(TrieNode {
                        children,
                        value: node.value.clone(),
                    })))
                }
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn root(&self) -> Option<&Arc<TrieNode>> {
        self.root.as_ref()
    }
}

impl std::fmt::Debug for Trie {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trie")
            .field("empty", &self.is_empty())
            .finish()
    }
}

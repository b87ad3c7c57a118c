//! Trie node representation.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

/// Type-erased value payload.
///
/// Values of any `Send + Sync + 'static` type are stored behind one pointer
/// type; `Trie::get` recovers the concrete type with a checked downcast.
pub(crate) type Payload = Arc<dyn Any + Send + Sync>;

/// A single trie node.
///
/// A node is "interior" when its value slot is `None` and a "value node"
/// otherwise; both kinds carry a child map keyed by one byte of the key.
/// Nodes are immutable once published — updates clone the node, never edit
/// it in place — which is what makes sharing a node between tries sound.
pub(crate) struct TrieNode {
    /// Children, keyed by the next key byte.
    pub(crate) children: HashMap<u8, Arc<TrieNode>>,
    /// The value stored at this node, if any.
    pub(crate) value: Option<Payload>,
}

impl TrieNode {
    /// Creates a leaf value node with no children.
    pub(crate) fn leaf(value: Payload) -> Self {
        Self {
            children: HashMap::new(),
            value: Some(value),
        }
    }

    /// Returns true if this node holds a value.
    pub(crate) fn is_value_node(&self) -> bool {
        self.value.is_some()
    }
}

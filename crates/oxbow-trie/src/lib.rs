//! Persistent copy-on-write trie for OxbowDB.
//!
//! This crate provides [`Trie`], an immutable map from byte-string keys to
//! typed values. Updates never mutate the receiver: `put` and `remove`
//! return a *new* trie that shares every subtree off the updated path with
//! the original, so an update costs time and space proportional to the key
//! length, not to the size of the trie.
//!
//! Because no reachable node is ever mutated after publication, any number
//! of threads may read any number of tries concurrently without
//! synchronization.
//!
//! # Example
//!
//! ```rust
//! use oxbow_trie::Trie;
//!
//! let t0 = Trie::new();
//! let t1 = t0.put(b"hello", 42u32);
//! let t2 = t1.put(b"help", String::from("me"));
//!
//! assert_eq!(t2.get::<u32>(b"hello"), Some(&42));
//! assert_eq!(t2.get::<String>(b"help").map(String::as_str), Some("me"));
//! // The original tries are untouched.
//! assert_eq!(t0.get::<u32>(b"hello"), None);
//! assert_eq!(t1.get::<String>(b"help"), None);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod node;
mod trie;

pub use trie::Trie;

//! An in-memory ordered byte-key index backed by a B+ tree.
//!
//! [`Tree`] maps byte-string keys to byte-string values, ordered
//! lexicographically. All data lives in the leaves, which form a doubly
//! linked chain in key order; internal nodes hold separator keys only.
//! On top of the chain, [`Cursor`] provides positioned bidirectional
//! traversal: seek to the smallest key at or above a probe, then step
//! forwards or backwards one entry at a time.
//!
//! The fan-out is configured per tree by `order` (`t`): a node splits when
//! it exceeds `2t` keys and rebalances (borrow from a sibling, else merge)
//! when a deletion leaves it with `t` or fewer.
//!
//! # Example
//!
//! ```
//! use bytetree::Tree;
//!
//! let mut tree = Tree::new(16)?;
//! tree.insert(b"apple", b"red");
//! tree.insert(b"banana", b"yellow");
//! tree.insert(b"cherry", b"dark red");
//! assert_eq!(tree.get(b"banana")?, b"yellow");
//!
//! // Positioned traversal over the leaf chain.
//! let mut cursor = tree.seek(b"b")?;
//! assert_eq!(cursor.key(), Some(&b"banana"[..]));
//! cursor.next();
//! assert_eq!(cursor.key(), Some(&b"cherry"[..]));
//! # Ok::<(), bytetree::Error>(())
//! ```

#![forbid(unsafe_code)]
#![forbid(keyword_idents)]
#![forbid(non_ascii_idents)]
#![forbid(unreachable_pub)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod cursor;
mod error;
mod raw;
mod tree;

pub use cursor::Cursor;
pub use error::{Error, Result};
pub use tree::{Iter, Tree};

#![doc = include_str!("../README.md")]

//! Configuration lattice and its pruning trie.
//!
//! This crate defines configurations and their canonical element encoding,
//! the verdict taxonomy, the prefix trie that tracks which configurations are
//! still open, and the mutation heuristics that propose neighbours.

pub mod config;
pub mod element;
pub mod mutation;
#[cfg(any(test, feature = "proptest"))]
pub mod proptest_generators;
pub mod trie;
pub mod verdict;

pub use config::{Configuration, ConfigurationError, Dominance, FacetSet};
pub use element::Element;
pub use trie::{BoundaryEntry, Boundaries, MarkOutcome, Trie, TrieError};
pub use verdict::Verdict;

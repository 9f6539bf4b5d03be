//! Term index, wildcard, boolean and lnc.ltc vector-space retrieval.
//!
//! Build a [`SearchIndex`] with an [`IndexBuilder`], then query it in boolean
//! mode ([`SearchIndex::boolean`]) or ranked mode ([`SearchIndex::rank`]).

pub mod boolean;
pub mod error;
pub mod index;
pub mod permuterm;
pub mod persist;
pub mod rank;
pub mod search;
pub mod tokenizer;
pub mod tree;

pub use error::{QueryError, Result};
pub use index::*;
pub use permuterm::PermutermIndex;
pub use search::{IndexBuilder, IndexConfig, SearchIndex};
pub use tree::TermTree;

/// Document id used by saved indexes and the binaries.
pub type DocId = String;

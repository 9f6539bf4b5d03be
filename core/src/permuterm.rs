//! Permuterm index: single-wildcard lookup reduced to a prefix search.
//!
//! Each term `t` is stored under every rotation of `t$`. A pattern
//! `before*after` matches `t` exactly when some rotation of `t$` starts with
//! `after$before`, so one prefix scan of the tree answers it.

use crate::error::{QueryError, Result};
use crate::tree::TermTree;
use std::collections::BTreeSet;

/// End-of-term marker inside rotated keys.
pub const TERMINATOR: char = '$';
/// The wildcard character accepted in patterns.
pub const WILDCARD: char = '*';

/// All `|t| + 1` cyclic rotations of `t$`, rotating by character.
pub fn rotations(term: &str) -> Vec<String> {
    let marked: Vec<char> = term.chars().chain(std::iter::once(TERMINATOR)).collect();
    (0..marked.len())
        .map(|i| marked[i..].iter().chain(&marked[..i]).collect())
        .collect()
}

/// A parsed lookup pattern: a plain term or a term with one `*`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WildcardPattern {
    Exact(String),
    Single { before: String, after: String },
}

impl WildcardPattern {
    /// Rejects patterns with more than one `*`.
    pub fn parse(pattern: &str) -> Result<Self> {
        let wildcards = pattern.matches(WILDCARD).count();
        match pattern.split_once(WILDCARD) {
            None => Ok(Self::Exact(pattern.to_string())),
            Some((before, after)) if wildcards == 1 => Ok(Self::Single {
                before: before.to_string(),
                after: after.to_string(),
            }),
            Some(_) => Err(QueryError::InvalidPattern { pattern: pattern.to_string(), wildcards }),
        }
    }

    /// The key a matching rotation must start with.
    pub fn rotation_key(&self) -> String {
        match self {
            Self::Exact(term) => format!("{term}{TERMINATOR}"),
            Self::Single { before, after } => format!("{after}{TERMINATOR}{before}"),
        }
    }
}

/// Terms matched by a pattern and the number of tree nodes visited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expansion {
    pub terms: Vec<String>,
    pub nodes_visited: usize,
}

#[derive(Debug, Clone, Default)]
pub struct PermutermIndex {
    tree: TermTree<String>,
    vocabulary: usize,
}

impl PermutermIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut index = Self::new();
        for term in terms {
            index.insert_term(term.as_ref());
        }
        tracing::debug!(terms = index.vocabulary, rotations = index.tree.len(), "permuterm index built");
        index
    }

    /// Adds every rotation of `term$`. Empty terms are ignored.
    pub fn insert_term(&mut self, term: &str) {
        if term.is_empty() {
            return;
        }
        if !self.tree.contains_key(&format!("{term}{TERMINATOR}")) {
            self.vocabulary += 1;
        }
        for rotation in rotations(term) {
            self.tree.insert(rotation, term.to_string());
        }
    }

    /// Terms matching `pattern`, sorted and deduplicated. A pattern without
    /// `*` is an exact lookup returning the term itself when indexed.
    pub fn expand(&self, pattern: &str) -> Result<Vec<String>> {
        Ok(self.expand_traced(pattern)?.terms)
    }

    /// Like [`expand`](Self::expand) but requires exactly one `*`.
    pub fn resolve_wildcard(&self, pattern: &str) -> Result<Vec<String>> {
        if !pattern.contains(WILDCARD) {
            return Err(QueryError::InvalidPattern { pattern: pattern.to_string(), wildcards: 0 });
        }
        self.expand(pattern)
    }

    pub fn expand_traced(&self, pattern: &str) -> Result<Expansion> {
        let parsed = WildcardPattern::parse(pattern)?;
        let key = parsed.rotation_key();
        if let WildcardPattern::Exact(_) = parsed {
            let (terms, nodes_visited) = self.tree.find_traced(&key);
            return Ok(Expansion { terms: terms.to_vec(), nodes_visited });
        }

        let scan = self.tree.prefix_scan(&key);
        let terms: BTreeSet<&String> = scan.matches.iter().flat_map(|(_, originals)| originals.iter()).collect();
        Ok(Expansion {
            terms: terms.into_iter().cloned().collect(),
            nodes_visited: scan.nodes_visited,
        })
    }

    /// Number of distinct terms indexed.
    pub fn num_terms(&self) -> usize {
        self.vocabulary
    }

    /// Number of rotated keys stored.
    pub fn num_rotations(&self) -> usize {
        self.tree.len()
    }

    pub fn tree(&self) -> &TermTree<String> {
        &self.tree
    }
}

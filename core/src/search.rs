//! Build-then-query facade over the inverted index, the document term tree
//! and the permuterm index.
//!
//! [`IndexBuilder`] is the only mutable stage. [`IndexBuilder::build`] seals
//! everything into a [`SearchIndex`], which has no mutating methods and can be
//! shared across threads for concurrent queries.

use crate::boolean::{self, BooleanQuery};
use crate::error::{QueryError, Result};
use crate::index::{DocKey, InvertedIndex, InvertedIndexBuilder};
use crate::permuterm::{Expansion, PermutermIndex, WILDCARD};
use crate::rank::{compute_query_weights, rank_documents};
use crate::tokenizer::{Normalizer, NormalizerConfig, TextNormalizer};
use crate::tree::TermTree;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Build the permuterm index so `*` patterns can be answered.
    pub wildcards: bool,
    pub normalizer: NormalizerConfig,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self { wildcards: true, normalizer: NormalizerConfig::default() }
    }
}

pub struct IndexBuilder<D, N = TextNormalizer> {
    config: IndexConfig,
    normalizer: N,
    inverted: InvertedIndexBuilder<D>,
}

impl<D: DocKey> IndexBuilder<D, TextNormalizer> {
    pub fn new(config: IndexConfig) -> Self {
        Self::with_normalizer(config, TextNormalizer::new(config.normalizer))
    }
}

impl<D: DocKey, N: Normalizer> IndexBuilder<D, N> {
    pub fn with_normalizer(config: IndexConfig, normalizer: N) -> Self {
        Self { config, normalizer, inverted: InvertedIndexBuilder::new() }
    }

    /// Normalizes `text` and counts its terms under `id`. Text added twice for
    /// the same id is merged.
    pub fn add_document(&mut self, id: D, text: &str) {
        let terms = self.normalizer.normalize(text);
        self.inverted.add_terms(id, terms);
    }

    /// Adds terms that are already normalized.
    pub fn add_terms<I, S>(&mut self, id: D, terms: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inverted.add_terms(id, terms);
    }

    pub fn num_documents(&self) -> usize {
        self.inverted.num_documents()
    }

    pub fn build(self) -> SearchIndex<D, N> {
        SearchIndex::from_inverted(self.inverted.build(), self.config, self.normalizer)
    }
}

#[derive(Debug, Clone)]
pub struct SearchIndex<D, N = TextNormalizer> {
    config: IndexConfig,
    normalizer: N,
    inverted: InvertedIndex<D>,
    documents: TermTree<D>,
    permuterm: Option<PermutermIndex>,
}

impl<D: DocKey, N: Normalizer> SearchIndex<D, N> {
    /// Rebuilds both trees from the vocabulary of `inverted`.
    pub fn from_inverted(inverted: InvertedIndex<D>, config: IndexConfig, normalizer: N) -> Self {
        let mut vocabulary: Vec<&str> = inverted.terms().collect();
        vocabulary.sort_unstable();

        let mut documents = TermTree::new();
        for term in &vocabulary {
            for doc in inverted.postings(term).into_iter().flat_map(|p| p.keys()) {
                documents.insert(*term, doc.clone());
            }
        }
        let permuterm = config.wildcards.then(|| PermutermIndex::build(&vocabulary));

        tracing::info!(
            num_docs = inverted.num_documents(),
            num_terms = vocabulary.len(),
            tree_height = documents.height(),
            rotations = permuterm.as_ref().map_or(0, |p| p.num_rotations()),
            "search index sealed"
        );
        Self { config, normalizer, inverted, documents, permuterm }
    }

    pub fn config(&self) -> IndexConfig {
        self.config
    }

    pub fn normalizer(&self) -> &N {
        &self.normalizer
    }

    pub fn inverted(&self) -> &InvertedIndex<D> {
        &self.inverted
    }

    pub fn document_tree(&self) -> &TermTree<D> {
        &self.documents
    }

    pub fn permuterm(&self) -> Option<&PermutermIndex> {
        self.permuterm.as_ref()
    }

    /// Documents containing an exact (already normalized) term.
    pub fn find(&self, term: &str) -> &[D] {
        self.documents.find(term)
    }

    /// Vocabulary terms matching a pattern with exactly one `*`.
    pub fn expand_wildcard(&self, pattern: &str) -> Result<Expansion> {
        let permuterm = self
            .permuterm
            .as_ref()
            .ok_or_else(|| QueryError::WildcardsDisabled { pattern: pattern.to_string() })?;
        let wildcards = pattern.matches(WILDCARD).count();
        if wildcards != 1 {
            return Err(QueryError::InvalidPattern { pattern: pattern.to_string(), wildcards });
        }
        permuterm.expand_traced(&pattern.to_lowercase())
    }

    /// Unranked boolean retrieval.
    pub fn boolean(&self, query: &str) -> Result<BTreeSet<D>> {
        let parsed = BooleanQuery::parse(query)?;
        let universe = self.inverted.documents();
        let hits = parsed.evaluate(&universe, |operand| self.resolve_operand(operand))?;
        tracing::debug!(query, hits = hits.len(), "boolean query evaluated");
        Ok(hits)
    }

    /// Normalized query terms with every wildcard replaced by the terms it
    /// matches.
    pub fn query_terms(&self, query: &str) -> Result<Vec<String>> {
        let mut terms = Vec::new();
        for word in query.split_whitespace() {
            if word.contains(WILDCARD) {
                terms.extend(self.expand_wildcard(word)?.terms);
            } else {
                terms.extend(self.normalizer.normalize(word));
            }
        }
        Ok(terms)
    }

    /// Ranked retrieval, best match first.
    pub fn rank(&self, query: &str) -> Result<Vec<(D, f64)>> {
        let terms = self.query_terms(query)?;
        let weights = compute_query_weights(&terms, &self.inverted);
        let ranked = rank_documents(&weights, &self.inverted);
        tracing::debug!(query, terms = ?terms, hits = ranked.len(), "ranked query evaluated");
        Ok(ranked)
    }

    /// Operands are normalized like document text; wildcards are only
    /// lowercased. An operand that normalizes to several terms needs all of
    /// them, one that normalizes to nothing matches nothing.
    fn resolve_operand(&self, operand: &str) -> Result<BTreeSet<D>> {
        if operand.contains(WILDCARD) {
            return boolean::resolve_operand(&operand.to_lowercase(), &self.inverted, self.permuterm.as_ref());
        }
        let mut sets = self
            .normalizer
            .normalize(operand)
            .into_iter()
            .map(|term| self.inverted.documents_containing(&term));
        let Some(first) = sets.next() else {
            return Ok(BTreeSet::new());
        };
        Ok(sets.fold(first, |acc, set| acc.intersection(&set).cloned().collect()))
    }
}

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::Debug;
use std::hash::Hash;

/// Anything usable as a document identifier. Only ordering and equality are
/// relied on; ids are never treated as numbers.
pub trait DocKey: Ord + Hash + Clone + Debug {}

impl<T: Ord + Hash + Clone + Debug> DocKey for T {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocMeta {
    pub title: Option<String>,
    /// Relative path to the stored full text for snippet extraction, e.g., texts/{n}.txt
    pub text_path: Option<String>,
}

/// Weighting record for one (term, document) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Posting {
    pub raw_term_frequency: u32,
    /// `1 + ln(tf)`
    pub log_term_frequency: f64,
    /// Cosine-normalized weight; `None` until the normalization pass ran.
    pub normalized_weight: Option<f64>,
}

impl Posting {
    fn new(raw_term_frequency: u32) -> Self {
        Self {
            raw_term_frequency,
            log_term_frequency: 1.0 + (raw_term_frequency as f64).ln(),
            normalized_weight: None,
        }
    }

    pub fn weight(&self) -> f64 {
        self.normalized_weight.unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(serialize = "D: Serialize", deserialize = "D: Deserialize<'de> + Ord"))]
pub struct IndexEntry<D> {
    pub document_frequency: u32,
    pub postings: BTreeMap<D, Posting>,
}

/// Term → postings map with lnc document weights.
///
/// Only [`InvertedIndexBuilder::build`] creates one, and it is never mutated
/// afterwards, so shared read access from several threads is safe.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(serialize = "D: Serialize", deserialize = "D: Deserialize<'de> + Ord"))]
pub struct InvertedIndex<D> {
    entries: HashMap<String, IndexEntry<D>>,
    document_lengths: BTreeMap<D, f64>,
}

impl<D: DocKey> InvertedIndex<D> {
    pub fn entry(&self, term: &str) -> Option<&IndexEntry<D>> {
        self.entries.get(term)
    }

    pub fn postings(&self, term: &str) -> Option<&BTreeMap<D, Posting>> {
        self.entries.get(term).map(|e| &e.postings)
    }

    /// 0 for terms not in the index.
    pub fn document_frequency(&self, term: &str) -> u32 {
        self.entries.get(term).map_or(0, |e| e.document_frequency)
    }

    pub fn contains_term(&self, term: &str) -> bool {
        self.entries.contains_key(term)
    }

    /// Documents containing `term`; empty for unknown terms.
    pub fn documents_containing(&self, term: &str) -> BTreeSet<D> {
        self.postings(term).map(|p| p.keys().cloned().collect()).unwrap_or_default()
    }

    /// Documents with at least one indexed term (the collection size `N`).
    pub fn num_documents(&self) -> usize {
        self.document_lengths.len()
    }

    pub fn num_terms(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The vocabulary, in no particular order.
    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Every indexed document; the universe `NOT` is taken against.
    pub fn documents(&self) -> BTreeSet<D> {
        self.document_lengths.keys().cloned().collect()
    }

    /// Euclidean length of the document's log-tf vector before normalization.
    pub fn document_length(&self, doc: &D) -> Option<f64> {
        self.document_lengths.get(doc).copied()
    }

    fn add_posting(&mut self, term: String, doc: D, raw_tf: u32) {
        let entry = self
            .entries
            .entry(term)
            .or_insert_with(|| IndexEntry { document_frequency: 0, postings: BTreeMap::new() });
        if entry.postings.insert(doc, Posting::new(raw_tf)).is_none() {
            entry.document_frequency += 1;
        }
    }

    /// Second pass: divide every log-tf by its document's vector length.
    fn normalize(&mut self) {
        let mut squares: BTreeMap<D, f64> = BTreeMap::new();
        for entry in self.entries.values() {
            for (doc, posting) in &entry.postings {
                *squares.entry(doc.clone()).or_insert(0.0) += posting.log_term_frequency.powi(2);
            }
        }
        self.document_lengths = squares.into_iter().map(|(doc, sum)| (doc, sum.sqrt())).collect();

        for entry in self.entries.values_mut() {
            for (doc, posting) in entry.postings.iter_mut() {
                let length = self.document_lengths.get(doc).copied().unwrap_or(0.0);
                let weight = if length > 0.0 { posting.log_term_frequency / length } else { 0.0 };
                posting.normalized_weight = Some(weight);
            }
        }
    }
}

/// Collects per-document term counts, then weights them all at once.
#[derive(Debug, Clone)]
pub struct InvertedIndexBuilder<D> {
    term_frequencies: BTreeMap<D, HashMap<String, u32>>,
}

impl<D: DocKey> Default for InvertedIndexBuilder<D> {
    fn default() -> Self {
        Self { term_frequencies: BTreeMap::new() }
    }
}

impl<D: DocKey> InvertedIndexBuilder<D> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts each occurrence of a term in `doc`. Calling this again for the
    /// same document adds to its counts.
    pub fn add_terms<I, S>(&mut self, doc: D, terms: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let counts = self.term_frequencies.entry(doc).or_default();
        for term in terms {
            *counts.entry(term.into()).or_insert(0) += 1;
        }
    }

    /// Merges precomputed raw term frequencies for `doc`.
    pub fn add_term_frequencies<I>(&mut self, doc: D, frequencies: I)
    where
        I: IntoIterator<Item = (String, u32)>,
    {
        let counts = self.term_frequencies.entry(doc).or_default();
        for (term, tf) in frequencies {
            *counts.entry(term).or_insert(0) += tf;
        }
    }

    /// Documents seen so far, including ones that produced no terms.
    pub fn num_documents(&self) -> usize {
        self.term_frequencies.len()
    }

    pub fn build(self) -> InvertedIndex<D> {
        let mut index = InvertedIndex { entries: HashMap::new(), document_lengths: BTreeMap::new() };
        let added = self.term_frequencies.len();
        for (doc, frequencies) in self.term_frequencies {
            for (term, tf) in frequencies {
                if tf > 0 {
                    index.add_posting(term, doc.clone(), tf);
                }
            }
        }
        index.normalize();
        tracing::info!(
            num_docs = index.num_documents(),
            skipped_empty = added - index.num_documents(),
            num_terms = index.num_terms(),
            "inverted index built"
        );
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> InvertedIndex<u32> {
        let mut builder = InvertedIndexBuilder::new();
        builder.add_terms(1, ["cat", "dog", "cat"]);
        builder.add_terms(2, ["dog", "bird"]);
        builder.build()
    }

    #[test]
    fn counts_and_document_frequency() {
        let index = sample();
        let cat = index.entry("cat").unwrap();
        assert_eq!(cat.document_frequency, 1);
        assert_eq!(cat.postings[&1].raw_term_frequency, 2);
        assert_eq!(index.document_frequency("dog"), 2);
        assert_eq!(index.document_frequency("fish"), 0);
        assert_eq!(index.num_documents(), 2);
        assert_eq!(index.num_terms(), 3);
    }

    #[test]
    fn lnc_weights() {
        let index = sample();
        let cat = &index.postings("cat").unwrap()[&1];
        let dog = &index.postings("dog").unwrap()[&1];
        let expected_cat = 1.0 + 2f64.ln();
        assert!((cat.log_term_frequency - expected_cat).abs() < 1e-12);
        let length = (expected_cat.powi(2) + 1.0).sqrt();
        assert!((index.document_length(&1).unwrap() - length).abs() < 1e-12);
        assert!((cat.weight() - expected_cat / length).abs() < 1e-12);
        assert!((dog.weight() - 1.0 / length).abs() < 1e-12);
    }

    #[test]
    fn document_vectors_have_unit_length() {
        let index = sample();
        for doc in index.documents() {
            let sum: f64 = index
                .terms()
                .filter_map(|t| index.postings(t).and_then(|p| p.get(&doc)))
                .map(|p| p.weight().powi(2))
                .sum();
            assert!((sum - 1.0).abs() < 1e-9, "doc {doc} has squared length {sum}");
        }
    }

    #[test]
    fn repeated_document_merges_counts() {
        let mut builder = InvertedIndexBuilder::new();
        builder.add_terms("d1", ["alpha"]);
        builder.add_terms("d1", ["alpha", "beta"]);
        let index = builder.build();
        assert_eq!(index.postings("alpha").unwrap()["d1"].raw_term_frequency, 2);
        assert_eq!(index.document_frequency("alpha"), 1);
    }

    #[test]
    fn empty_documents_are_not_indexed() {
        let mut builder = InvertedIndexBuilder::new();
        builder.add_terms(1, Vec::<String>::new());
        builder.add_term_frequencies(2, [("x".to_string(), 0)]);
        assert_eq!(builder.num_documents(), 2);
        let index = builder.build();
        assert!(index.is_empty());
        assert_eq!(index.num_documents(), 0);
        assert!(index.documents().is_empty());
    }
}

//! lnc.ltc cosine ranking.
//!
//! Query terms get `(1 + ln tf) * ln(N / df)` weights, cosine-normalized;
//! document weights come from the inverted index. A document's score is the
//! dot product of the two vectors.

use crate::index::{DocKey, InvertedIndex};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Cosine-normalized ltc weight per distinct query term.
pub type QueryWeights = HashMap<String, f64>;

/// ltc weights for a bag of query terms.
///
/// A term missing from the index is weighted as if `df = 1`, so it still gets
/// a nonzero weight (and then matches nothing). `N` is at least 1, which makes
/// every weight 0 for an empty or single-document collection.
pub fn compute_query_weights<D, S>(terms: &[S], index: &InvertedIndex<D>) -> QueryWeights
where
    D: DocKey,
    S: AsRef<str>,
{
    let mut tf_raw: HashMap<&str, u32> = HashMap::new();
    for term in terms {
        *tf_raw.entry(term.as_ref()).or_insert(0) += 1;
    }

    let n = index.num_documents().max(1) as f64;
    let mut weights: QueryWeights = tf_raw
        .into_iter()
        .map(|(term, tf)| {
            let df = index.document_frequency(term).max(1) as f64;
            let weight = (1.0 + (tf as f64).ln()) * (n / df).ln();
            (term.to_string(), weight)
        })
        .collect();

    let norm = weights.values().map(|w| w * w).sum::<f64>().sqrt();
    if norm > 0.0 {
        for w in weights.values_mut() {
            *w /= norm;
        }
    }
    weights
}

/// Scores every document sharing a term with the query, best first. Equal
/// scores are ordered by ascending document id.
pub fn rank_documents<D: DocKey>(weights: &QueryWeights, index: &InvertedIndex<D>) -> Vec<(D, f64)> {
    let mut scores: HashMap<D, f64> = HashMap::new();
    for (term, q_w) in weights {
        let Some(postings) = index.postings(term) else { continue };
        for (doc, posting) in postings {
            // cosine since doc weights are normalized
            *scores.entry(doc.clone()).or_insert(0.0) += q_w * posting.weight();
        }
    }

    let mut ranked: Vec<(D, f64)> = scores.into_iter().collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal).then_with(|| a.0.cmp(&b.0)));
    ranked
}

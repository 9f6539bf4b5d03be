use ircore::tokenizer::TextNormalizer;
use ircore::{IndexBuilder, IndexConfig, InvertedIndexBuilder, PermutermIndex, SearchIndex, TermTree};
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

fn search_index(docs: &[Vec<String>]) -> SearchIndex<u32> {
    let mut builder = IndexBuilder::with_normalizer(IndexConfig::default(), TextNormalizer::plain());
    for (i, terms) in docs.iter().enumerate() {
        builder.add_terms(i as u32, terms.iter().cloned());
    }
    builder.build()
}

proptest! {
    #[test]
    fn leaves_stay_at_equal_depth(keys in prop::collection::vec("[a-z]{1,8}", 0..300)) {
        let mut tree = TermTree::new();
        for k in &keys {
            tree.insert(k.as_str(), 0u8);
        }
        prop_assert!(tree.is_balanced());

        let distinct: BTreeSet<&str> = keys.iter().map(String::as_str).collect();
        let stored: Vec<&str> = tree.iter().map(|(k, _)| k).collect();
        prop_assert_eq!(stored, distinct.into_iter().collect::<Vec<_>>());
        prop_assert_eq!(tree.len(), keys.iter().collect::<BTreeSet<_>>().len());
    }

    #[test]
    fn find_returns_every_inserted_payload(
        pairs in prop::collection::vec(("[a-z]{1,5}", 0u8..8), 0..200),
        missing in "[A-Z]{1,5}",
    ) {
        let mut tree = TermTree::new();
        for (k, v) in &pairs {
            tree.insert(k.as_str(), *v);
        }
        for (k, v) in &pairs {
            prop_assert!(tree.find(k).contains(v));
        }
        prop_assert!(tree.find(&missing).is_empty());
    }

    #[test]
    fn repeated_insertion_is_idempotent(pairs in prop::collection::vec(("[a-z]{1,4}", 0u8..4), 0..150)) {
        let mut once = TermTree::new();
        let mut twice = TermTree::new();
        for (k, v) in &pairs {
            once.insert(k.as_str(), *v);
            twice.insert(k.as_str(), *v);
            twice.insert(k.as_str(), *v);
        }
        let a: Vec<_> = once.iter().collect();
        let b: Vec<_> = twice.iter().collect();
        prop_assert_eq!(a, b);
    }

    #[test]
    fn pruned_prefix_scan_matches_full_scan(
        keys in prop::collection::vec("[a-d]{1,6}", 0..200),
        prefix in "[a-d]{0,3}",
    ) {
        let mut tree = TermTree::new();
        for k in &keys {
            tree.insert(k.as_str(), ());
        }
        let found: Vec<&str> = tree.collect_by_prefix(&prefix).into_iter().map(|(k, _)| k).collect();
        let expected: Vec<&str> = tree.iter().map(|(k, _)| k).filter(|k| k.starts_with(prefix.as_str())).collect();
        prop_assert_eq!(found, expected);
    }

    #[test]
    fn every_split_of_a_term_finds_it(terms in prop::collection::vec("[a-z]{1,8}", 1..40)) {
        let permuterm = PermutermIndex::build(&terms);
        for t in &terms {
            for cut in 0..=t.len() {
                let pattern = format!("{}*{}", &t[..cut], &t[cut..]);
                let matches = permuterm.expand(&pattern).unwrap();
                prop_assert!(matches.contains(t), "{} not found by {}", t, pattern);
                prop_assert!(matches.iter().all(|m| m.starts_with(&t[..cut]) && m.ends_with(&t[cut..])));
            }
        }
    }

    #[test]
    fn document_vectors_have_unit_length(
        docs in prop::collection::vec(prop::collection::vec("[a-f]{1,3}", 0..25), 0..30),
    ) {
        let mut builder = InvertedIndexBuilder::new();
        for (i, terms) in docs.iter().enumerate() {
            builder.add_terms(i as u32, terms.iter().cloned());
        }
        let index = builder.build();

        let mut sums: BTreeMap<u32, f64> = BTreeMap::new();
        for term in index.terms() {
            for (doc, posting) in index.postings(term).unwrap() {
                *sums.entry(*doc).or_insert(0.0) += posting.weight().powi(2);
            }
        }
        for (i, terms) in docs.iter().enumerate() {
            let doc = i as u32;
            if terms.is_empty() {
                prop_assert!(!sums.contains_key(&doc));
            } else {
                prop_assert!((sums[&doc] - 1.0).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn boolean_algebra_laws(
        docs in prop::collection::vec(prop::collection::vec("[a-e]{1,2}", 1..10), 1..20),
        a in "[a-e]{1,2}",
        b in "[a-e]{1,2}",
    ) {
        let index = search_index(&docs);
        let set_a = index.boolean(&a).unwrap();

        let and = index.boolean(&format!("{a} AND {b}")).unwrap();
        prop_assert!(and.is_subset(&set_a));
        let or = index.boolean(&format!("{a} OR {b}")).unwrap();
        prop_assert!(or.is_superset(&set_a));
        let double_not = index.boolean(&format!("NOT (NOT {a})")).unwrap();
        prop_assert_eq!(double_not, set_a.clone());
        let xor = index.boolean(&format!("{a} XOR {a}")).unwrap();
        prop_assert!(xor.is_empty());
        let and_not = index.boolean(&format!("{a} AND NOT {b}")).unwrap();
        prop_assert!(and_not.is_disjoint(&index.boolean(&b).unwrap()));
    }
}

//! Shared fixtures: synthetic encodings small enough to reason about by
//! hand but complete enough (all 256 single bytes ranked) to satisfy the
//! round-trip invariant on arbitrary input.

#![allow(dead_code)]

use llm_cost::{Encoding, Grammar, TokenId, Vocabulary};
use std::sync::Arc;

/// Every byte at its own rank, plus `merged` tokens from rank 256 upward.
pub fn byte_vocab(merged: &[&[u8]]) -> Vocabulary {
    let mut entries: Vec<(Vec<u8>, TokenId)> = (0u32..256).map(|b| (vec![b as u8], b)).collect();
    for (i, token) in merged.iter().enumerate() {
        entries.push((token.to_vec(), 256 + i as TokenId));
    }
    Vocabulary::from_entries(entries).expect("synthetic vocabulary is well-formed")
}

/// Merge chains used across the integration tests: enough to collapse
/// `Hello`, ` world`, ` don`, `'t`, and long `a` runs.
pub fn test_merges() -> Vec<&'static [u8]> {
    vec![
        b"He", b"Hel", b"Hell", b"Hello", b" w", b" wo", b" wor", b" worl", b" world", b" d",
        b" do", b" don", b"'t", b"aa", b"aaaa", b"aaaaaaaa", b"aaaaaaaaaaaaaaaa",
        b"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa",
    ]
}

/// A synthetic encoding with one special token, `<|endoftext|>` = 900.
pub fn test_encoding(grammar: Grammar) -> Arc<Encoding> {
    let name = match grammar {
        Grammar::Cl100k => "test_cl100k",
        Grammar::O200k => "test_o200k",
    };
    Arc::new(Encoding::new(
        name,
        grammar,
        byte_vocab(&test_merges()),
        vec![("<|endoftext|>".to_string(), 900)],
    ))
}

/// Rank of a merged token in [`byte_vocab`] built from [`test_merges`].
pub fn rank_of(token: &[u8]) -> TokenId {
    let merges = test_merges();
    let index = merges
        .iter()
        .position(|&m| m == token)
        .expect("token is in test_merges");
    256 + index as TokenId
}

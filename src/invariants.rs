//! Debug-mode invariant checks. Active only under `debug_assertions`;
//! release builds compile these to no-ops.

use crate::vocab::Vocabulary;
use crate::TokenId;

/// Pieces must partition the input exactly.
#[inline]
pub fn assert_piece_partition(pieces: &[&[u8]], input: &[u8]) {
    #[cfg(debug_assertions)]
    {
        let total: usize = pieces.iter().map(|p| p.len()).sum();
        debug_assert_eq!(
            total,
            input.len(),
            "pieces cover {total} of {} input bytes",
            input.len()
        );
    }
    #[cfg(not(debug_assertions))]
    {
        let _ = (pieces, input);
    }
}

/// Concatenating the bytes of the emitted IDs must reproduce the input.
#[inline]
pub fn assert_round_trip(vocab: &Vocabulary, ids: &[TokenId], input: &[u8]) {
    #[cfg(debug_assertions)]
    {
        let mut bytes = Vec::with_capacity(input.len());
        for &id in ids {
            match vocab.bytes_of(id) {
                Some(token) => bytes.extend_from_slice(token),
                None => debug_assert!(false, "emitted id {id} has no vocabulary bytes"),
            }
        }
        debug_assert_eq!(bytes, input, "encode output does not reassemble the input");
    }
    #[cfg(not(debug_assertions))]
    {
        let _ = (vocab, ids, input);
    }
}

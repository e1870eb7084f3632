//! BPE merge engine: collapse one pre-tokenized piece into token IDs.
//!
//! Each piece starts as one token per byte. The engine repeatedly merges
//! the adjacent pair whose concatenation has the lowest vocabulary rank
//! (ties go to the leftmost pair) until no adjacent pair is in the
//! vocabulary. Candidates live in a priority queue that is never purged;
//! stale entries are filtered at pop time by re-validating against the
//! current buffer state.

use crate::vocab::Vocabulary;
use crate::{Error, TokenId};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Sentinel for "no neighbor" in the linked-list arrays.
const NONE: u32 = u32::MAX;

/// A proposed merge: the pair starting at position `left` concatenates to
/// a vocabulary entry with rank `rank`. May be stale by the time it is
/// popped.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
struct Candidate {
    rank: TokenId,
    left: u32,
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse both keys so the lowest rank
        // pops first and ties break to the leftmost position.
        other
            .rank
            .cmp(&self.rank)
            .then_with(|| other.left.cmp(&self.left))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Reusable per-call scratch: four parallel arrays over piece positions,
/// the candidate queue, and a buffer for pair concatenations. One
/// `MergeBuffer` serves every piece of an encode call; nothing escapes it.
pub struct MergeBuffer {
    tokens: Vec<TokenId>,
    prev: Vec<u32>,
    next: Vec<u32>,
    valid: Vec<bool>,
    queue: BinaryHeap<Candidate>,
    pair: Vec<u8>,
}

impl Default for MergeBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl MergeBuffer {
    pub fn new() -> Self {
        MergeBuffer {
            tokens: Vec::new(),
            prev: Vec::new(),
            next: Vec::new(),
            valid: Vec::new(),
            queue: BinaryHeap::new(),
            pair: Vec::new(),
        }
    }

    /// Encode one piece, appending token IDs to `out`.
    ///
    /// `piece_offset` is the piece's byte offset in the original input and
    /// is only used to report corruption.
    pub fn encode_piece(
        &mut self,
        vocab: &Vocabulary,
        piece: &[u8],
        piece_offset: usize,
        out: &mut Vec<TokenId>,
    ) -> Result<(), Error> {
        // Whole-piece hit: common for words, and required for pieces the
        // merge path cannot reach (the vocabulary is a merge closure, so
        // any multi-byte entry is reachable, but the direct probe is
        // cheaper than running the queue).
        if let Some(rank) = vocab.rank_of(piece) {
            out.push(rank);
            return Ok(());
        }
        if piece.is_empty() {
            return Ok(());
        }

        let n = piece.len();
        self.tokens.clear();
        self.prev.clear();
        self.next.clear();
        self.valid.clear();
        self.queue.clear();

        for (i, &byte) in piece.iter().enumerate() {
            let rank = vocab
                .byte_rank(byte)
                .ok_or(Error::EncodePieceFailed { piece_offset })?;
            self.tokens.push(rank);
            self.prev.push(if i == 0 { NONE } else { (i - 1) as u32 });
            self.next
                .push(if i + 1 == n { NONE } else { (i + 1) as u32 });
            self.valid.push(true);
        }

        // Seed with every adjacent byte pair present in the vocabulary.
        for i in 0..n - 1 {
            if let Some(rank) = vocab.rank_of(&piece[i..i + 2]) {
                self.queue.push(Candidate {
                    rank,
                    left: i as u32,
                });
            }
        }

        while let Some(Candidate { rank, left }) = self.queue.pop() {
            let l = left as usize;
            // Four-point staleness check; failed candidates are dropped
            // without effect.
            if !self.valid[l] {
                continue;
            }
            let r = self.next[l];
            if r == NONE || !self.valid[r as usize] {
                continue;
            }
            let r = r as usize;
            match self.pair_rank(vocab, l, r) {
                Some(current) if current == rank => {}
                _ => continue,
            }

            self.tokens[l] = rank;
            self.valid[r] = false;
            self.next[l] = self.next[r];
            if self.next[r] != NONE {
                self.prev[self.next[r] as usize] = left;
            }

            if self.prev[l] != NONE {
                let p = self.prev[l] as usize;
                if let Some(rank) = self.pair_rank(vocab, p, l) {
                    self.queue.push(Candidate {
                        rank,
                        left: p as u32,
                    });
                }
            }
            if self.next[l] != NONE {
                let nx = self.next[l] as usize;
                if let Some(rank) = self.pair_rank(vocab, l, nx) {
                    self.queue.push(Candidate { rank, left });
                }
            }
        }

        // Position 0 is never spliced out; walk the list from there.
        let mut i = 0usize;
        loop {
            debug_assert!(self.valid[i]);
            out.push(self.tokens[i]);
            match self.next[i] {
                NONE => break,
                nx => i = nx as usize,
            }
        }
        Ok(())
    }

    /// Rank of the concatenation of the tokens at two live positions.
    fn pair_rank(&mut self, vocab: &Vocabulary, l: usize, r: usize) -> Option<TokenId> {
        self.pair.clear();
        self.pair.extend_from_slice(vocab.bytes_of(self.tokens[l])?);
        self.pair.extend_from_slice(vocab.bytes_of(self.tokens[r])?);
        vocab.rank_of(&self.pair)
    }
}

/// One-shot convenience over [`MergeBuffer::encode_piece`].
pub fn encode_piece(vocab: &Vocabulary, piece: &[u8]) -> Result<Vec<TokenId>, Error> {
    let mut out = Vec::new();
    MergeBuffer::new().encode_piece(vocab, piece, 0, &mut out)?;
    Ok(out)
}

//! Vocabulary storage: the immutable (token bytes -> rank) table for one encoding.
//!
//! Two on-disk representations are accepted: the tiktoken text format
//! (one `base64 rank` pair per line) and the `BPE2` binary format, a
//! pre-parsed layout produced by the converter so release binaries can
//! embed the table without paying the base64 decode at startup.

use crate::{Error, TokenId};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Magic bytes at offset 0 of the binary format.
pub const BPE2_MAGIC: &[u8; 4] = b"BPE2";

/// Binary format version understood by [`Vocabulary::from_binary`].
pub const BPE2_VERSION: u32 = 2;

/// Fixed header size of the binary format, in bytes.
const BPE2_HEADER_LEN: usize = 64;

/// Marks an unassigned slot in the single-byte rank table. Safe because
/// ranks are capped far below `u32::MAX`.
const NO_RANK: TokenId = TokenId::MAX;

#[derive(Debug)]
pub struct Vocabulary {
    /// Concatenated token byte sequences, in rank order.
    blob: Vec<u8>,
    /// `(offset, len)` into `blob`, indexed by rank. A zero-length span is a
    /// hole: the rank is unassigned (text files may skip ranks that belong
    /// to special tokens).
    spans: Vec<(u32, u32)>,
    ranks: HashMap<Vec<u8>, TokenId>,
    /// Rank of each single byte, `NO_RANK` when unassigned. The merge
    /// engine seeds every piece from this table.
    byte_ranks: [TokenId; 256],
    max_token_len: usize,
    /// SHA-256 of the text-format source, carried through the binary format
    /// so CI can verify a converted table against its origin.
    source_hash: [u8; 32],
}

impl Vocabulary {
    /// Parse the tiktoken text format: each line is a base64 token, a space,
    /// and a decimal rank.
    pub fn from_text(data: &[u8]) -> Result<Self, Error> {
        let source_hash: [u8; 32] = Sha256::digest(data).into();

        let mut entries: Vec<(Vec<u8>, TokenId)> = Vec::new();
        for (line_no, line) in data.split(|&b| b == b'\n').enumerate() {
            if line.is_empty() {
                continue;
            }
            let sep = line.iter().position(|&b| b == b' ').ok_or_else(|| corrupt(
                format!("line {}: missing rank separator", line_no + 1),
            ))?;
            let token = BASE64
                .decode(&line[..sep])
                .map_err(|e| corrupt(format!("line {}: bad base64: {e}", line_no + 1)))?;
            let rank: TokenId = std::str::from_utf8(&line[sep + 1..])
                .ok()
                .and_then(|s| s.trim_end_matches('\r').parse().ok())
                .ok_or_else(|| corrupt(format!("line {}: bad rank", line_no + 1)))?;
            entries.push((token, rank));
        }

        Self::build(entries, source_hash)
    }

    /// Build a table directly from `(token bytes, rank)` pairs. Intended
    /// for converters and tests; the source hash is left zeroed.
    pub fn from_entries(entries: Vec<(Vec<u8>, TokenId)>) -> Result<Self, Error> {
        Self::build(entries, [0u8; 32])
    }

    /// Parse the `BPE2` binary format.
    ///
    /// The input may come from an embedded region or a memory map with no
    /// alignment guarantee, so every multi-byte integer goes through the
    /// byte-wise readers below.
    pub fn from_binary(data: &[u8]) -> Result<Self, Error> {
        if data.len() < BPE2_HEADER_LEN {
            return Err(corrupt("truncated header"));
        }
        if &data[0..4] != BPE2_MAGIC {
            return Err(corrupt("bad magic"));
        }
        let version = read_u32_le(data, 4);
        if version != BPE2_VERSION {
            return Err(corrupt(format!("unsupported version {version}")));
        }
        let token_count = read_u32_le(data, 8) as usize;
        if token_count > crate::MAX_VOCAB_SIZE {
            return Err(corrupt(format!("token count {token_count} exceeds vocabulary limit")));
        }
        let max_token_len = read_u32_le(data, 12) as usize;
        let blob_size = read_u32_le(data, 16) as usize;
        let mut source_hash = [0u8; 32];
        source_hash.copy_from_slice(&data[20..52]);

        let table_end = BPE2_HEADER_LEN
            .checked_add(token_count.checked_mul(8).ok_or_else(|| corrupt("table overflow"))?)
            .ok_or_else(|| corrupt("table overflow"))?;
        let blob_end = table_end
            .checked_add(blob_size)
            .ok_or_else(|| corrupt("blob overflow"))?;
        if data.len() < blob_end {
            return Err(corrupt(format!(
                "truncated: need {blob_end} bytes, have {}",
                data.len()
            )));
        }

        let blob = data[table_end..blob_end].to_vec();
        let mut spans = Vec::with_capacity(token_count);
        let mut ranks = HashMap::with_capacity(token_count);
        for rank in 0..token_count {
            let entry = BPE2_HEADER_LEN + rank * 8;
            let offset = read_u32_le(data, entry) as usize;
            let len = read_u32_le(data, entry + 4) as usize;
            if len == 0 {
                spans.push((0, 0));
                continue;
            }
            if len > max_token_len {
                return Err(corrupt(format!(
                    "rank {rank}: token length {len} exceeds declared max {max_token_len}"
                )));
            }
            let end = offset
                .checked_add(len)
                .filter(|&e| e <= blob.len())
                .ok_or_else(|| corrupt(format!("rank {rank}: span outside blob")))?;
            let token = blob[offset..end].to_vec();
            if ranks.insert(token, rank as TokenId).is_some() {
                return Err(corrupt(format!("rank {rank}: duplicate token bytes")));
            }
            spans.push((offset as u32, len as u32));
        }

        Ok(Self {
            byte_ranks: byte_rank_table(&ranks),
            blob,
            spans,
            ranks,
            max_token_len,
            source_hash,
        })
    }

    fn build(entries: Vec<(Vec<u8>, TokenId)>, source_hash: [u8; 32]) -> Result<Self, Error> {
        if entries.is_empty() {
            return Err(corrupt("empty vocabulary"));
        }
        let top_rank = entries.iter().map(|&(_, r)| r).max().unwrap_or(0) as usize;
        if top_rank >= crate::MAX_VOCAB_SIZE {
            return Err(corrupt(format!("rank {top_rank} exceeds vocabulary limit")));
        }

        let mut blob = Vec::with_capacity(entries.iter().map(|(t, _)| t.len()).sum());
        let mut spans = vec![(0u32, 0u32); top_rank + 1];
        let mut ranks = HashMap::with_capacity(entries.len());
        let mut max_token_len = 0usize;

        for (token, rank) in entries {
            if token.is_empty() {
                return Err(corrupt(format!("rank {rank}: empty token")));
            }
            let slot = &mut spans[rank as usize];
            if slot.1 != 0 {
                return Err(corrupt(format!("rank {rank}: assigned twice")));
            }
            *slot = (blob.len() as u32, token.len() as u32);
            max_token_len = max_token_len.max(token.len());
            blob.extend_from_slice(&token);
            if ranks.insert(token, rank).is_some() {
                return Err(corrupt(format!("rank {rank}: duplicate token bytes")));
            }
        }

        Ok(Self {
            byte_ranks: byte_rank_table(&ranks),
            blob,
            spans,
            ranks,
            max_token_len,
            source_hash,
        })
    }

    /// Serialize to the `BPE2` binary layout. Inverse of [`Vocabulary::from_binary`].
    pub fn to_binary(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(BPE2_HEADER_LEN + self.spans.len() * 8 + self.blob.len());
        out.extend_from_slice(BPE2_MAGIC);
        out.extend_from_slice(&BPE2_VERSION.to_le_bytes());
        out.extend_from_slice(&(self.spans.len() as u32).to_le_bytes());
        out.extend_from_slice(&(self.max_token_len as u32).to_le_bytes());
        out.extend_from_slice(&(self.blob.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.source_hash);
        out.extend_from_slice(&[0u8; 12]);
        for &(offset, len) in &self.spans {
            out.extend_from_slice(&offset.to_le_bytes());
            out.extend_from_slice(&len.to_le_bytes());
        }
        out.extend_from_slice(&self.blob);
        out
    }

    pub fn rank_of(&self, token: &[u8]) -> Option<TokenId> {
        self.ranks.get(token).copied()
    }

    /// Rank of a single byte, via the precomputed table.
    pub fn byte_rank(&self, byte: u8) -> Option<TokenId> {
        match self.byte_ranks[byte as usize] {
            NO_RANK => None,
            rank => Some(rank),
        }
    }

    pub fn bytes_of(&self, rank: TokenId) -> Option<&[u8]> {
        let &(offset, len) = self.spans.get(rank as usize)?;
        if len == 0 {
            return None;
        }
        Some(&self.blob[offset as usize..(offset + len) as usize])
    }

    /// Iterate assigned `(rank, bytes)` pairs in rank order. Holes are
    /// skipped. This is what the text/binary converter walks.
    pub fn iter(&self) -> impl Iterator<Item = (TokenId, &[u8])> + '_ {
        self.spans
            .iter()
            .enumerate()
            .filter(|&(_, &(_, len))| len != 0)
            .map(|(rank, &(offset, len))| {
                (
                    rank as TokenId,
                    &self.blob[offset as usize..(offset + len) as usize],
                )
            })
    }

    pub fn max_token_len(&self) -> usize {
        self.max_token_len
    }

    /// Number of assigned ranks (holes excluded).
    pub fn len(&self) -> usize {
        self.ranks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranks.is_empty()
    }

    /// SHA-256 of the text-format source this table was built from.
    pub fn source_hash(&self) -> &[u8; 32] {
        &self.source_hash
    }

    /// Check the carried source hash against an expected digest (CI guard
    /// for converted tables).
    pub fn verify_source_hash(&self, expected: &[u8; 32]) -> Result<(), Error> {
        if &self.source_hash != expected {
            return Err(corrupt("source hash mismatch"));
        }
        Ok(())
    }
}

fn corrupt(reason: impl Into<String>) -> Error {
    Error::VocabularyCorrupt {
        reason: reason.into(),
    }
}

fn byte_rank_table(ranks: &HashMap<Vec<u8>, TokenId>) -> [TokenId; 256] {
    let mut table = [NO_RANK; 256];
    for (b, slot) in table.iter_mut().enumerate() {
        if let Some(&rank) = ranks.get(&[b as u8][..]) {
            *slot = rank;
        }
    }
    table
}

/// Read a little-endian u32 without assuming alignment.
fn read_u32_le(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

//! # llm-cost
//!
//! Offline token counting and USD cost estimation for LLM workloads.
//!
//! ## Features
//!
//! - Exact `cl100k_base` / `o200k_base` tokenization, bit-identical to the
//!   reference tokenizer
//! - Heuristic byte-based counts for vendors without a published tokenizer
//! - Embedded pricing catalog with Ed25519 detached-signature verification
//! - No network access, no global mutable state
//!
//! ## Example
//!
//! ```no_run
//! use llm_cost::{pricing, Tokenizer};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let tokenizer = Tokenizer::for_model("gpt-4o")?;
//! let count = tokenizer.count("Hello world")?;
//!
//! let catalog = pricing::Catalog::load()?;
//! let def = catalog.get("gpt-4o").expect("gpt-4o is in the snapshot");
//! let usd = pricing::calculate(def, count.tokens, 0, 0);
//! println!("{} tokens, ${usd:.6}", count.tokens);
//! # Ok(())
//! # }
//! ```

use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

pub mod bpe;
pub mod embedded;
pub mod invariants;
pub mod model;
pub mod pricing;
pub mod scanner;
pub mod verify;
pub mod vocab;

pub use model::{EncodingKind, Resolution};
pub use scanner::Grammar;
pub use vocab::Vocabulary;

/// Maximum input text size in bytes (10MB). Longer inputs must be chunked
/// by the caller.
pub const MAX_INPUT_SIZE: usize = 10 * 1024 * 1024;

/// Upper bound on vocabulary ranks; keeps every rank well inside `u32`.
pub const MAX_VOCAB_SIZE: usize = 1_000_000;

/// Type alias for token IDs.
///
/// A token's ID is its vocabulary rank, which doubles as its BPE merge
/// priority (lower merges earlier).
pub type TokenId = u32;

/// An immutable encoding: a name, a vocabulary, a pre-tokenization
/// grammar, and the encoding's special-token literals.
///
/// Built once and shared read-only; every encode call owns its own
/// scratch state, so an `Encoding` can be used from any number of threads.
#[derive(Debug)]
pub struct Encoding {
    name: String,
    grammar: Grammar,
    vocab: Vocabulary,
    specials: Vec<(String, TokenId)>,
    special_re: OnceLock<Option<regex::Regex>>,
}

impl Encoding {
    /// Assemble an encoding from parts. Standard encodings come from
    /// [`Encoding::standard`]; this constructor exists for converters and
    /// tests that bring their own tables.
    pub fn new(
        name: impl Into<String>,
        grammar: Grammar,
        vocab: Vocabulary,
        specials: Vec<(String, TokenId)>,
    ) -> Self {
        Encoding {
            name: name.into(),
            grammar,
            vocab,
            specials,
            special_re: OnceLock::new(),
        }
    }

    /// Get (or load and cache) one of the compiled-in encodings. The
    /// vocabulary is built on first use and shared for the life of the
    /// process.
    pub fn standard(kind: EncodingKind) -> Result<Arc<Encoding>, Error> {
        static REGISTRY: OnceLock<Mutex<HashMap<EncodingKind, Arc<Encoding>>>> = OnceLock::new();
        let registry = REGISTRY.get_or_init(|| Mutex::new(HashMap::new()));
        let mut cache = registry.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(encoding) = cache.get(&kind) {
            return Ok(Arc::clone(encoding));
        }
        let encoding = Arc::new(Self::load_standard(kind)?);
        cache.insert(kind, Arc::clone(&encoding));
        Ok(encoding)
    }

    #[cfg(feature = "embedded-vocab")]
    fn load_standard(kind: EncodingKind) -> Result<Encoding, Error> {
        let vocab = match kind {
            EncodingKind::Cl100kBase => Vocabulary::from_binary(embedded::CL100K_BASE_BPE2)?,
            EncodingKind::O200kBase => Vocabulary::from_binary(embedded::O200K_BASE_BPE2)?,
        };
        Ok(Self::with_standard_specials(kind, vocab))
    }

    #[cfg(not(feature = "embedded-vocab"))]
    fn load_standard(kind: EncodingKind) -> Result<Encoding, Error> {
        use std::path::PathBuf;
        let dir = std::env::var_os("LLM_COST_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("data"));
        let binary = dir.join(format!("{}.bpe2", kind.name()));
        let text = dir.join(format!("{}.tiktoken", kind.name()));
        let vocab = if binary.exists() {
            Vocabulary::from_binary(&std::fs::read(&binary)?)?
        } else if text.exists() {
            Vocabulary::from_text(&std::fs::read(&text)?)?
        } else {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!(
                    "no vocabulary for {} under {} (set LLM_COST_DATA_DIR or build with embedded-vocab)",
                    kind.name(),
                    dir.display()
                ),
            )));
        };
        Ok(Self::with_standard_specials(kind, vocab))
    }

    fn with_standard_specials(kind: EncodingKind, vocab: Vocabulary) -> Encoding {
        let specials = kind
            .special_tokens()
            .iter()
            .map(|&(name, id)| (name.to_string(), id))
            .collect();
        Encoding::new(kind.name(), kind.grammar(), vocab, specials)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn grammar(&self) -> Grammar {
        self.grammar
    }

    pub fn vocab(&self) -> &Vocabulary {
        &self.vocab
    }

    /// Encode raw bytes. Special-token literals get no interpretation
    /// here; their bytes tokenize like any other input.
    pub fn encode(&self, input: &[u8]) -> Result<Vec<TokenId>, Error> {
        let pieces = scanner::pretokenize(input, self.grammar);
        invariants::assert_piece_partition(&pieces, input);

        let mut out = Vec::with_capacity(input.len() / 3 + 1);
        let mut buffer = bpe::MergeBuffer::new();
        let mut offset = 0usize;
        for piece in pieces {
            buffer.encode_piece(&self.vocab, piece, offset, &mut out)?;
            offset += piece.len();
        }
        invariants::assert_round_trip(&self.vocab, &out, input);
        Ok(out)
    }

    /// Encode text, emitting this encoding's special tokens wherever their
    /// literal appears. Only for trusted input; see [`Tokenizer::encode`]
    /// for the default policy.
    pub fn encode_with_special(&self, text: &str) -> Result<Vec<TokenId>, Error> {
        let Some(re) = self.special_regex() else {
            return self.encode(text.as_bytes());
        };
        let mut out = Vec::new();
        let mut rest = 0usize;
        for found in re.find_iter(text) {
            out.extend(self.encode(text[rest..found.start()].as_bytes())?);
            // The regex only matches literals from the table.
            if let Some(id) = self.special_id(found.as_str()) {
                out.push(id);
            }
            rest = found.end();
        }
        out.extend(self.encode(text[rest..].as_bytes())?);
        Ok(out)
    }

    /// Reassemble bytes from token IDs, special tokens included.
    pub fn decode(&self, ids: &[TokenId]) -> Result<Vec<u8>, Error> {
        let mut out = Vec::with_capacity(ids.len() * 2);
        for &id in ids {
            if let Some(bytes) = self.vocab.bytes_of(id) {
                out.extend_from_slice(bytes);
            } else if let Some((name, _)) = self.specials.iter().find(|&&(_, sid)| sid == id) {
                out.extend_from_slice(name.as_bytes());
            } else {
                return Err(Error::InvalidToken(id));
            }
        }
        Ok(out)
    }

    fn special_regex(&self) -> Option<&regex::Regex> {
        self.special_re
            .get_or_init(|| {
                if self.specials.is_empty() {
                    return None;
                }
                let pattern = self
                    .specials
                    .iter()
                    .map(|(name, _)| regex::escape(name))
                    .collect::<Vec<_>>()
                    .join("|");
                regex::Regex::new(&pattern).ok()
            })
            .as_ref()
    }

    fn special_id(&self, name: &str) -> Option<TokenId> {
        self.specials
            .iter()
            .find(|(n, _)| n == name)
            .map(|&(_, id)| id)
    }
}

/// Result of a count: token total, input size, and whether the total came
/// from exact tokenization or the bytes/4 heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Count {
    pub tokens: u64,
    pub bytes: u64,
    pub approximate: bool,
}

#[derive(Debug)]
enum Backend {
    Exact(Arc<Encoding>),
    Heuristic,
}

/// Main entry point: resolve a model name once, then encode and count.
///
/// # Example
///
/// ```no_run
/// use llm_cost::Tokenizer;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let tokenizer = Tokenizer::for_model("gpt-4o")?;
/// let ids = tokenizer.encode("Hello world")?;
/// assert_eq!(tokenizer.decode(&ids)?, b"Hello world");
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Tokenizer {
    model: String,
    backend: Backend,
}

impl Tokenizer {
    /// Resolve a model name (vendor-prefixed, bare, or alias) to a
    /// tokenizer. Known vendors without a reproducible tokenizer get the
    /// byte heuristic; unknown names are an error.
    pub fn for_model(model: &str) -> Result<Self, Error> {
        match model::resolve(model) {
            Some(Resolution::Exact(kind)) => Ok(Tokenizer {
                model: model.to_string(),
                backend: Backend::Exact(Encoding::standard(kind)?),
            }),
            Some(Resolution::Heuristic) => Ok(Tokenizer {
                model: model.to_string(),
                backend: Backend::Heuristic,
            }),
            None => Err(Error::UnknownModel(model.to_string())),
        }
    }

    /// Select an encoding directly by name (`cl100k_base`, `o200k_base`).
    pub fn for_encoding(name: &str) -> Result<Self, Error> {
        let kind =
            EncodingKind::from_name(name).ok_or_else(|| Error::UnknownEncoding(name.to_string()))?;
        Ok(Tokenizer {
            model: name.to_string(),
            backend: Backend::Exact(Encoding::standard(kind)?),
        })
    }

    /// Wrap a caller-supplied encoding (custom or test tables).
    pub fn with_encoding(encoding: Arc<Encoding>) -> Self {
        Tokenizer {
            model: encoding.name().to_string(),
            backend: Backend::Exact(encoding),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// True when counts come from exact tokenization rather than the
    /// bytes/4 heuristic.
    pub fn has_exact(&self) -> bool {
        matches!(self.backend, Backend::Exact(_))
    }

    pub fn encoding(&self) -> Option<&Encoding> {
        match &self.backend {
            Backend::Exact(encoding) => Some(encoding),
            Backend::Heuristic => None,
        }
    }

    /// Encode text to token IDs. Special-token literals in the input are
    /// treated as plain bytes; see [`Tokenizer::encode_with_special`].
    pub fn encode(&self, text: &str) -> Result<Vec<TokenId>, Error> {
        self.encode_bytes(text.as_bytes())
    }

    /// Encode arbitrary bytes. Malformed UTF-8 degrades to single-byte
    /// pieces instead of failing.
    pub fn encode_bytes(&self, input: &[u8]) -> Result<Vec<TokenId>, Error> {
        let encoding = self.require_exact()?;
        check_input_size(input.len())?;
        encoding.encode(input)
    }

    /// Encode with this encoding's special tokens enabled. Opt-in only:
    /// feeding untrusted input here lets it inject control tokens.
    pub fn encode_with_special(&self, text: &str) -> Result<Vec<TokenId>, Error> {
        let encoding = self.require_exact()?;
        check_input_size(text.len())?;
        encoding.encode_with_special(text)
    }

    /// Decode token IDs back to bytes.
    pub fn decode(&self, ids: &[TokenId]) -> Result<Vec<u8>, Error> {
        self.require_exact()?.decode(ids)
    }

    /// Decode token IDs to a string, failing on non-UTF-8 output (IDs can
    /// split a multi-byte character).
    pub fn decode_utf8(&self, ids: &[TokenId]) -> Result<String, Error> {
        String::from_utf8(self.decode(ids)?).map_err(|e| Error::InvalidUtf8 {
            offset: e.utf8_error().valid_up_to(),
        })
    }

    /// Count tokens in text: exact when the model has an encoding,
    /// `bytes/4` rounded up otherwise.
    pub fn count(&self, text: &str) -> Result<Count, Error> {
        self.count_bytes(text.as_bytes())
    }

    pub fn count_bytes(&self, input: &[u8]) -> Result<Count, Error> {
        check_input_size(input.len())?;
        match &self.backend {
            Backend::Exact(encoding) => Ok(Count {
                tokens: encoding.encode(input)?.len() as u64,
                bytes: input.len() as u64,
                approximate: false,
            }),
            Backend::Heuristic => Ok(Count {
                tokens: (input.len() as u64).div_ceil(4),
                bytes: input.len() as u64,
                approximate: true,
            }),
        }
    }

    /// Encode many texts in parallel. Output order matches input order.
    pub fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Vec<TokenId>>, Error> {
        texts.par_iter().map(|text| self.encode(text)).collect()
    }

    fn require_exact(&self) -> Result<&Encoding, Error> {
        match &self.backend {
            Backend::Exact(encoding) => Ok(encoding),
            Backend::Heuristic => Err(Error::ApproximateModel(self.model.clone())),
        }
    }
}

fn check_input_size(size: usize) -> Result<(), Error> {
    if size > MAX_INPUT_SIZE {
        return Err(Error::InputTooLarge {
            size,
            max: MAX_INPUT_SIZE,
        });
    }
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unknown model: {0}")]
    UnknownModel(String),

    #[error("unknown encoding: {0}")]
    UnknownEncoding(String),

    #[error("vocabulary corrupt: {reason}")]
    VocabularyCorrupt { reason: String },

    #[error("token IDs unavailable for model {0}: counts are approximate")]
    ApproximateModel(String),

    #[error("token ID {0} not in vocabulary")]
    InvalidToken(TokenId),

    #[error("decoded bytes are not valid UTF-8 past offset {offset}")]
    InvalidUtf8 { offset: usize },

    #[error("input too large: {size} bytes (max: {max})")]
    InputTooLarge { size: usize, max: usize },

    #[error("piece at byte offset {piece_offset} contains a byte with no vocabulary rank")]
    EncodePieceFailed { piece_offset: usize },

    #[error("pricing data signature verification failed")]
    PricingSignatureInvalid,

    #[error("pricing data signed by a different key than the one compiled in")]
    PricingKeyMismatch,

    #[error("pricing data signed by a revoked key")]
    PricingKeyRevoked,

    #[error("pricing data critically stale (valid until {valid_until})")]
    PricingCriticallyStale { valid_until: String },

    #[error("pricing data malformed: {0}")]
    PricingParse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

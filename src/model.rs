//! Model name resolution: map vendor-prefixed names, bare names, and
//! aliases to an encoding, or to the heuristic marker for vendors whose
//! tokenizers are not reproduced here.

use crate::scanner::Grammar;
use crate::TokenId;

/// The encodings compiled into this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EncodingKind {
    Cl100kBase,
    O200kBase,
}

impl EncodingKind {
    pub fn name(self) -> &'static str {
        match self {
            EncodingKind::Cl100kBase => "cl100k_base",
            EncodingKind::O200kBase => "o200k_base",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "cl100k_base" => Some(EncodingKind::Cl100kBase),
            "o200k_base" => Some(EncodingKind::O200kBase),
            _ => None,
        }
    }

    pub fn grammar(self) -> Grammar {
        match self {
            EncodingKind::Cl100kBase => Grammar::Cl100k,
            EncodingKind::O200kBase => Grammar::O200k,
        }
    }

    /// Special-token literals and their fixed IDs. These are only
    /// recognized when a caller opts in per encode; by default their byte
    /// sequences tokenize like any other text.
    pub fn special_tokens(self) -> &'static [(&'static str, TokenId)] {
        match self {
            EncodingKind::Cl100kBase => &[
                ("<|endoftext|>", 100257),
                ("<|fim_prefix|>", 100258),
                ("<|fim_middle|>", 100259),
                ("<|fim_suffix|>", 100260),
                ("<|endofprompt|>", 100276),
            ],
            EncodingKind::O200kBase => &[
                ("<|endoftext|>", 199999),
                ("<|endofprompt|>", 200018),
            ],
        }
    }
}

/// Outcome of model resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Exact tokenization with the given encoding.
    Exact(EncodingKind),
    /// Known vendor, unspecified tokenizer: counts degrade to bytes/4.
    Heuristic,
}

/// Name prefixes with exact encodings, most specific first. `gpt-4o` must
/// come before `gpt-4`.
const ENCODING_PREFIXES: &[(&str, EncodingKind)] = &[
    ("chatgpt-4o", EncodingKind::O200kBase),
    ("gpt-4o", EncodingKind::O200kBase),
    ("gpt-4.1", EncodingKind::O200kBase),
    ("gpt-4.5", EncodingKind::O200kBase),
    ("gpt-5", EncodingKind::O200kBase),
    ("o1", EncodingKind::O200kBase),
    ("o3", EncodingKind::O200kBase),
    ("o4", EncodingKind::O200kBase),
    ("gpt-4", EncodingKind::Cl100kBase),
    ("gpt-3.5", EncodingKind::Cl100kBase),
    ("text-embedding-ada-002", EncodingKind::Cl100kBase),
    ("text-embedding-3", EncodingKind::Cl100kBase),
];

/// Vendor namespaces that resolve to the heuristic path.
const HEURISTIC_VENDORS: &[&str] = &[
    "anthropic", "google", "meta", "mistral", "xai", "deepseek", "cohere", "amazon", "alibaba",
];

/// Bare-name prefixes that resolve to the heuristic path.
const HEURISTIC_PREFIXES: &[&str] = &[
    "claude", "gemini", "gemma", "mistral", "mixtral", "ministral", "llama", "deepseek", "qwen",
    "grok", "command", "kimi", "glm",
];

/// Resolve a model name. `None` means the name is unknown to both the
/// exact tables and the heuristic vendor lists.
pub fn resolve(model: &str) -> Option<Resolution> {
    let (vendor, bare) = match model.split_once('/') {
        Some((vendor, bare)) => (Some(vendor), bare),
        None => (None, model),
    };

    if vendor.is_none() || vendor == Some("openai") {
        for &(prefix, kind) in ENCODING_PREFIXES {
            if bare.starts_with(prefix) {
                return Some(Resolution::Exact(kind));
            }
        }
    }

    if let Some(vendor) = vendor {
        if HEURISTIC_VENDORS.contains(&vendor) {
            return Some(Resolution::Heuristic);
        }
    }
    for prefix in HEURISTIC_PREFIXES {
        if bare.starts_with(prefix) {
            return Some(Resolution::Heuristic);
        }
    }
    None
}

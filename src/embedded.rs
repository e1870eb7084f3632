//! Compile-time payloads: the pricing snapshot, its detached signature,
//! and the signing public key. With the `embedded-vocab` feature the
//! converted vocabulary tables ride along too, so release binaries never
//! touch the filesystem.

/// Pricing catalog snapshot, JSON.
pub const PRICING_DB: &[u8] = include_bytes!("../data/pricing_db.json");

/// Detached Minisign-compatible signature over [`PRICING_DB`].
pub const PRICING_SIG: &[u8] = include_bytes!("../data/pricing_db.json.sig");

/// Base64 of the 42-byte signing public-key record. The same key signs
/// the embedded snapshot and any cached update.
pub const SIGNING_PUBKEY_B64: &str = "RWQnUT+ipsIM6lRTxPHCqOIdFz5OIgI9WJ3Qe35n0m05RuoczoXFUuAe";

/// `cl100k_base` vocabulary in BPE2 form, produced by the converter in CI.
#[cfg(feature = "embedded-vocab")]
pub const CL100K_BASE_BPE2: &[u8] = include_bytes!("../data/cl100k_base.bpe2");

/// `o200k_base` vocabulary in BPE2 form.
#[cfg(feature = "embedded-vocab")]
pub const O200K_BASE_BPE2: &[u8] = include_bytes!("../data/o200k_base.bpe2");

//! Detached-signature verification for the pricing catalog.
//!
//! The signature file is Minisign-compatible: an untrusted comment line, a
//! base64 signature record, a trusted comment line, and a base64 global
//! signature covering the data signature plus the trusted comment. Pricing
//! bytes are only handed to the parser after [`verify`] succeeds.

use crate::Error;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use blake2::{Blake2b512, Digest};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};

/// `ED`: Ed25519 over the Blake2b-512 digest of the message.
pub const ALG_PREHASHED: [u8; 2] = *b"ED";

/// `Ed`: legacy Ed25519 over the raw message.
pub const ALG_RAW: [u8; 2] = *b"Ed";

/// Key IDs that must never verify, regardless of signature validity.
/// Extended by a new release whenever a signing key is retired.
pub const REVOKED_KEY_IDS: &[[u8; 8]] = &[[0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE, 0xBA, 0xBE]];

/// A parsed 42-byte public-key record: algorithm tag, key ID, Ed25519 key.
pub struct PublicKey {
    key_id: [u8; 8],
    key: VerifyingKey,
}

impl PublicKey {
    /// Parse the base64 form of the key record. Only the `Ed` algorithm is
    /// accepted.
    pub fn from_base64(encoded: &str) -> Result<Self, Error> {
        let raw = BASE64
            .decode(encoded.trim())
            .map_err(|_| Error::PricingSignatureInvalid)?;
        if raw.len() != 42 || raw[0..2] != ALG_RAW {
            return Err(Error::PricingSignatureInvalid);
        }
        let mut key_id = [0u8; 8];
        key_id.copy_from_slice(&raw[2..10]);
        let mut key_bytes = [0u8; 32];
        key_bytes.copy_from_slice(&raw[10..42]);
        let key =
            VerifyingKey::from_bytes(&key_bytes).map_err(|_| Error::PricingSignatureInvalid)?;
        Ok(PublicKey { key_id, key })
    }

    pub fn key_id(&self) -> &[u8; 8] {
        &self.key_id
    }
}

/// A parsed four-line detached signature file.
pub struct DetachedSignature {
    alg: [u8; 2],
    key_id: [u8; 8],
    signature: [u8; 64],
    trusted_comment: String,
    global_sig: [u8; 64],
}

impl DetachedSignature {
    pub fn parse(data: &[u8]) -> Result<Self, Error> {
        let text = std::str::from_utf8(data).map_err(|_| Error::PricingSignatureInvalid)?;
        let mut lines = text.lines();
        let _untrusted = lines.next().ok_or(Error::PricingSignatureInvalid)?;
        let record_b64 = lines.next().ok_or(Error::PricingSignatureInvalid)?;
        let trusted_line = lines.next().ok_or(Error::PricingSignatureInvalid)?;
        let global_b64 = lines.next().ok_or(Error::PricingSignatureInvalid)?;

        let record = BASE64
            .decode(record_b64)
            .map_err(|_| Error::PricingSignatureInvalid)?;
        if record.len() != 74 {
            return Err(Error::PricingSignatureInvalid);
        }
        let mut alg = [0u8; 2];
        alg.copy_from_slice(&record[0..2]);
        let mut key_id = [0u8; 8];
        key_id.copy_from_slice(&record[2..10]);
        let mut signature = [0u8; 64];
        signature.copy_from_slice(&record[10..74]);

        let trusted_comment = trusted_line
            .strip_prefix("trusted comment: ")
            .ok_or(Error::PricingSignatureInvalid)?
            .to_string();

        let global = BASE64
            .decode(global_b64)
            .map_err(|_| Error::PricingSignatureInvalid)?;
        let global_sig: [u8; 64] = global
            .try_into()
            .map_err(|_| Error::PricingSignatureInvalid)?;

        Ok(DetachedSignature {
            alg,
            key_id,
            signature,
            trusted_comment,
            global_sig,
        })
    }

    pub fn key_id(&self) -> &[u8; 8] {
        &self.key_id
    }

    pub fn trusted_comment(&self) -> &str {
        &self.trusted_comment
    }
}

/// Run the full verification chain over `message`.
///
/// A bad global signature only degrades the trusted comment, so it logs a
/// warning instead of failing; every other step is load-bearing.
pub fn verify(pk: &PublicKey, message: &[u8], sig: &DetachedSignature) -> Result<(), Error> {
    if sig.key_id != pk.key_id {
        return Err(Error::PricingKeyMismatch);
    }

    let data_sig = Signature::from_bytes(&sig.signature);
    match sig.alg {
        ALG_PREHASHED => {
            let digest = Blake2b512::digest(message);
            pk.key
                .verify(digest.as_slice(), &data_sig)
                .map_err(|_| Error::PricingSignatureInvalid)?;
        }
        ALG_RAW => {
            pk.key
                .verify(message, &data_sig)
                .map_err(|_| Error::PricingSignatureInvalid)?;
        }
        _ => return Err(Error::PricingSignatureInvalid),
    }

    let mut global_payload = Vec::with_capacity(64 + sig.trusted_comment.len() + 1);
    global_payload.extend_from_slice(&sig.signature);
    global_payload.extend_from_slice(sig.trusted_comment.as_bytes());
    global_payload.push(b'\n');
    let global_sig = Signature::from_bytes(&sig.global_sig);
    if pk.key.verify(&global_payload, &global_sig).is_err() {
        log::warn!("pricing signature: trusted comment not covered by global signature");
    }

    if REVOKED_KEY_IDS.contains(&sig.key_id) {
        return Err(Error::PricingKeyRevoked);
    }

    Ok(())
}

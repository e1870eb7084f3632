//! Error surface: every failure mode maps to the right `Error` kind.

mod common;

use common::test_encoding;
use llm_cost::{Error, Grammar, Tokenizer, Vocabulary};

#[test]
fn unknown_model_is_rejected() {
    let err = Tokenizer::for_model("definitely-not-a-model").unwrap_err();
    assert!(matches!(err, Error::UnknownModel(name) if name == "definitely-not-a-model"));
}

#[test]
fn unknown_encoding_is_rejected() {
    let err = Tokenizer::for_encoding("p50k_base").unwrap_err();
    assert!(matches!(err, Error::UnknownEncoding(_)));
}

#[test]
fn heuristic_models_have_no_ids() {
    let tokenizer = Tokenizer::for_model("claude-haiku-3.5").unwrap();
    assert!(matches!(
        tokenizer.encode("hi"),
        Err(Error::ApproximateModel(_))
    ));
    assert!(matches!(
        tokenizer.decode(&[1, 2]),
        Err(Error::ApproximateModel(_))
    ));
}

#[test]
fn oversized_input_is_rejected_up_front() {
    let tokenizer = Tokenizer::with_encoding(test_encoding(Grammar::O200k));
    let big = vec![b'a'; llm_cost::MAX_INPUT_SIZE + 1];
    assert!(matches!(
        tokenizer.encode_bytes(&big),
        Err(Error::InputTooLarge { .. })
    ));
}

#[test]
fn unknown_token_id_fails_decode() {
    let tokenizer = Tokenizer::with_encoding(test_encoding(Grammar::Cl100k));
    let err = tokenizer.decode(&[0, 999_999]).unwrap_err();
    assert!(matches!(err, Error::InvalidToken(999_999)));
}

#[test]
fn incomplete_byte_coverage_is_surfaced_with_offset() {
    // A vocabulary missing the rank for byte 0x00: encoding input that
    // needs it reports the offset of the failing piece.
    let entries: Vec<(Vec<u8>, u32)> = (1u32..256).map(|b| (vec![b as u8], b)).collect();
    let vocab = Vocabulary::from_entries(entries).unwrap();
    let encoding = llm_cost::Encoding::new("partial", Grammar::O200k, vocab, vec![]);
    let tokenizer = Tokenizer::with_encoding(std::sync::Arc::new(encoding));
    let err = tokenizer.encode_bytes(b"ok\x00\x00").unwrap_err();
    assert!(matches!(err, Error::EncodePieceFailed { piece_offset: 2 }));
}

#[test]
fn errors_format_without_panicking() {
    let errors = [
        Error::UnknownModel("m".into()),
        Error::UnknownEncoding("e".into()),
        Error::VocabularyCorrupt {
            reason: "bad magic".into(),
        },
        Error::EncodePieceFailed { piece_offset: 7 },
        Error::PricingSignatureInvalid,
        Error::PricingKeyMismatch,
        Error::PricingKeyRevoked,
        Error::PricingCriticallyStale {
            valid_until: "2026-01-01T00:00:00Z".into(),
        },
        Error::PricingParse("eof".into()),
    ];
    for err in errors {
        assert!(!err.to_string().is_empty());
    }
}

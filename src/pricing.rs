//! Pricing catalog: verified load, staleness policy, lookup, and cost math.
//!
//! Load order is cache first, embedded second. Anything wrong with the
//! cache (missing files, bad signature, stale data, parse failure) falls
//! through silently to the embedded snapshot; a problem with the embedded
//! snapshot itself means the binary was tampered with and is fatal.

use crate::verify::{self, DetachedSignature, PublicKey};
use crate::{embedded, Error};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Days past `valid_until` before data is rejected outright.
pub const STALE_GRACE_DAYS: i64 = 90;

/// Per-model pricing, in USD per million tokens. Unknown JSON fields are
/// ignored so newer snapshots stay loadable by older binaries.
#[derive(Debug, Clone, Deserialize)]
pub struct PriceDef {
    pub provider: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub input_price_per_mtok: f64,
    pub output_price_per_mtok: f64,
    #[serde(default)]
    pub output_reasoning_price_per_mtok: Option<f64>,
    #[serde(default)]
    pub cache_read_price_per_mtok: Option<f64>,
    #[serde(default)]
    pub cache_write_price_per_mtok: Option<f64>,
    #[serde(default)]
    pub context_window: Option<u64>,
    #[serde(default)]
    pub max_output_tokens: Option<u64>,
    #[serde(default)]
    pub supports_vision: Option<bool>,
    #[serde(default)]
    pub supports_function_calling: Option<bool>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[allow(dead_code)]
    version: u32,
    valid_until: ValidUntil,
    models: HashMap<String, PriceDef>,
    #[serde(default)]
    aliases: HashMap<String, String>,
}

/// `valid_until` is an ISO-8601 string in current snapshots and epoch
/// seconds in format version 0 files.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ValidUntil {
    Epoch(i64),
    Iso(String),
}

impl ValidUntil {
    fn resolve(&self) -> Result<DateTime<Utc>, Error> {
        match self {
            ValidUntil::Epoch(secs) => DateTime::from_timestamp(*secs, 0)
                .ok_or_else(|| Error::PricingParse(format!("valid_until out of range: {secs}"))),
            ValidUntil::Iso(text) => DateTime::parse_from_rfc3339(text)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| Error::PricingParse(format!("valid_until: {e}"))),
        }
    }
}

/// Where the loaded catalog came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Embedded,
    Cache,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Staleness {
    Fresh,
    Warning,
    Critical,
}

#[derive(Debug)]
pub struct Catalog {
    models: HashMap<String, PriceDef>,
    aliases: HashMap<String, String>,
    valid_until: DateTime<Utc>,
    source: Source,
}

impl Catalog {
    /// Load with the wall clock and the default staleness policy.
    pub fn load() -> Result<Self, Error> {
        Self::load_at(Utc::now(), false)
    }

    /// Load with an explicit clock. `force_stale` lets a critically stale
    /// embedded snapshot through (there is nothing better to offer); it
    /// never resurrects a rejected cache.
    pub fn load_at(now: DateTime<Utc>, force_stale: bool) -> Result<Self, Error> {
        if let Some(dir) = cache_dir() {
            match Self::from_cache(&dir, now) {
                Ok(catalog) => return Ok(catalog),
                Err(err) => {
                    log::debug!("pricing cache unusable ({err}), falling back to embedded");
                }
            }
        }
        Self::from_embedded(now, force_stale)
    }

    /// Load and verify `pricing_db.json` + `pricing_db.json.sig` from a
    /// cache directory. Every failure is returned to the caller, which
    /// treats the cache as absent.
    pub fn from_cache(dir: &Path, now: DateTime<Utc>) -> Result<Self, Error> {
        let db = std::fs::read(dir.join("pricing_db.json"))?;
        let sig_bytes = std::fs::read(dir.join("pricing_db.json.sig"))?;
        let pk = PublicKey::from_base64(embedded::SIGNING_PUBKEY_B64)?;
        let sig = DetachedSignature::parse(&sig_bytes)?;
        verify::verify(&pk, &db, &sig)?;
        let catalog = Self::from_parts(&db, Source::Cache)?;
        match catalog.staleness(now) {
            Staleness::Fresh => Ok(catalog),
            Staleness::Warning => {
                log::warn!(
                    "cached pricing data expired {} but is within the grace period",
                    catalog.valid_until.to_rfc3339()
                );
                Ok(catalog)
            }
            Staleness::Critical => Err(Error::PricingCriticallyStale {
                valid_until: catalog.valid_until.to_rfc3339(),
            }),
        }
    }

    /// Load and verify the compiled-in snapshot. A verification failure
    /// here means the binary itself was altered.
    pub fn from_embedded(now: DateTime<Utc>, force_stale: bool) -> Result<Self, Error> {
        let pk = PublicKey::from_base64(embedded::SIGNING_PUBKEY_B64)?;
        let sig = DetachedSignature::parse(embedded::PRICING_SIG)?;
        verify::verify(&pk, embedded::PRICING_DB, &sig)?;
        let catalog = Self::from_parts(embedded::PRICING_DB, Source::Embedded)?;
        match catalog.staleness(now) {
            Staleness::Fresh => Ok(catalog),
            Staleness::Warning => {
                log::warn!(
                    "embedded pricing data expired {}; update the binary or refresh the cache",
                    catalog.valid_until.to_rfc3339()
                );
                Ok(catalog)
            }
            Staleness::Critical if force_stale => {
                log::error!(
                    "embedded pricing data expired {} and is past the grace period; \
                     proceeding because force-stale is set",
                    catalog.valid_until.to_rfc3339()
                );
                Ok(catalog)
            }
            Staleness::Critical => Err(Error::PricingCriticallyStale {
                valid_until: catalog.valid_until.to_rfc3339(),
            }),
        }
    }

    fn from_parts(bytes: &[u8], source: Source) -> Result<Self, Error> {
        let file: CatalogFile =
            serde_json::from_slice(bytes).map_err(|e| Error::PricingParse(e.to_string()))?;
        Ok(Catalog {
            valid_until: file.valid_until.resolve()?,
            models: file.models,
            aliases: file.aliases,
            source,
        })
    }

    pub fn staleness(&self, now: DateTime<Utc>) -> Staleness {
        if now <= self.valid_until {
            Staleness::Fresh
        } else if now <= self.valid_until + Duration::days(STALE_GRACE_DAYS) {
            Staleness::Warning
        } else {
            Staleness::Critical
        }
    }

    /// Look up a model, resolving one level of alias indirection first.
    pub fn get(&self, model: &str) -> Option<&PriceDef> {
        match self.aliases.get(model) {
            Some(canonical) => self.models.get(canonical),
            None => self.models.get(model),
        }
    }

    pub fn models(&self) -> impl Iterator<Item = (&str, &PriceDef)> {
        self.models.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn valid_until(&self) -> DateTime<Utc> {
        self.valid_until
    }

    pub fn source(&self) -> Source {
        self.source
    }
}

/// Per-user cache directory for pricing updates:
/// `$XDG_CACHE_HOME/llm-cost`, else the platform cache directory
/// (`~/.cache` on Linux, `%LOCALAPPDATA%` on Windows) plus `llm-cost`.
pub fn cache_dir() -> Option<PathBuf> {
    if let Ok(xdg) = std::env::var("XDG_CACHE_HOME") {
        if !xdg.is_empty() {
            return Some(PathBuf::from(xdg).join("llm-cost"));
        }
    }
    dirs::cache_dir().map(|dir| dir.join("llm-cost"))
}

/// Itemized cost of one request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostBreakdown {
    pub input: f64,
    pub output: f64,
    pub reasoning: f64,
    pub total: f64,
}

/// Cost in USD. Reasoning tokens are billed at the reasoning rate when
/// one is set, the output rate otherwise, and are subtracted from the
/// standard output tokens so nothing is double-counted.
pub fn calculate(
    def: &PriceDef,
    input_tokens: u64,
    output_tokens: u64,
    reasoning_tokens: u64,
) -> f64 {
    cost_breakdown(def, input_tokens, output_tokens, reasoning_tokens).total
}

pub fn cost_breakdown(
    def: &PriceDef,
    input_tokens: u64,
    output_tokens: u64,
    reasoning_tokens: u64,
) -> CostBreakdown {
    let input = input_tokens as f64 * def.input_price_per_mtok / 1_000_000.0;
    let standard_output = output_tokens.saturating_sub(reasoning_tokens);
    let output = standard_output as f64 * def.output_price_per_mtok / 1_000_000.0;
    let reasoning_rate = def
        .output_reasoning_price_per_mtok
        .unwrap_or(def.output_price_per_mtok);
    let reasoning = reasoning_tokens as f64 * reasoning_rate / 1_000_000.0;
    CostBreakdown {
        input,
        output,
        reasoning,
        total: input + output + reasoning,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_catalog() -> Catalog {
        let json = br#"{
            "version": 1,
            "valid_until": "2026-10-28T00:00:00Z",
            "models": {
                "openai/gpt-4o": {
                    "provider": "openai",
                    "input_price_per_mtok": 2.5,
                    "output_price_per_mtok": 10.0,
                    "some_future_field": [1, 2, 3]
                }
            },
            "aliases": { "gpt-4o": "openai/gpt-4o" }
        }"#;
        Catalog::from_parts(json, Source::Embedded).unwrap()
    }

    #[test]
    fn alias_resolves_one_level() {
        let catalog = sample_catalog();
        assert!(catalog.get("openai/gpt-4o").is_some());
        assert!(catalog.get("gpt-4o").is_some());
        assert!(catalog.get("gpt-5o").is_none());
    }

    #[test]
    fn unknown_fields_are_tolerated() {
        // sample_catalog() carries `some_future_field`; parsing succeeded.
        assert_eq!(sample_catalog().len(), 1);
    }

    #[test]
    fn epoch_valid_until_is_accepted() {
        let json = br#"{
            "version": 0,
            "valid_until": 1767225600,
            "models": {}
        }"#;
        let catalog = Catalog::from_parts(json, Source::Cache).unwrap();
        assert_eq!(catalog.valid_until().timestamp(), 1767225600);
    }

    #[test]
    fn malformed_valid_until_is_a_parse_error() {
        let json = br#"{"version":1,"valid_until":"next tuesday","models":{}}"#;
        assert!(matches!(
            Catalog::from_parts(json, Source::Cache),
            Err(Error::PricingParse(_))
        ));
    }

    #[test]
    fn missing_required_field_is_a_parse_error() {
        let json = br#"{
            "version": 1,
            "valid_until": "2026-10-28T00:00:00Z",
            "models": { "m": { "provider": "x", "input_price_per_mtok": 1.0 } }
        }"#;
        assert!(Catalog::from_parts(json, Source::Cache).is_err());
    }

    #[test]
    fn staleness_boundaries() {
        let catalog = sample_catalog();
        let valid_until = catalog.valid_until();
        assert_eq!(catalog.staleness(valid_until), Staleness::Fresh);
        assert_eq!(
            catalog.staleness(valid_until + Duration::days(1)),
            Staleness::Warning
        );
        assert_eq!(
            catalog.staleness(valid_until + Duration::days(STALE_GRACE_DAYS)),
            Staleness::Warning
        );
        assert_eq!(
            catalog.staleness(valid_until + Duration::days(STALE_GRACE_DAYS) + Duration::seconds(1)),
            Staleness::Critical
        );
    }

    #[test]
    fn reasoning_rate_falls_back_to_output_rate() {
        let def = PriceDef {
            provider: "test".into(),
            display_name: None,
            input_price_per_mtok: 1.0,
            output_price_per_mtok: 4.0,
            output_reasoning_price_per_mtok: None,
            cache_read_price_per_mtok: None,
            cache_write_price_per_mtok: None,
            context_window: None,
            max_output_tokens: None,
            supports_vision: None,
            supports_function_calling: None,
            notes: None,
        };
        let with = cost_breakdown(&def, 0, 100, 40);
        let without = cost_breakdown(&def, 0, 100, 0);
        assert_eq!(with.total, without.total);
    }

    #[test]
    fn reasoning_exceeding_output_does_not_underflow() {
        let def = PriceDef {
            provider: "test".into(),
            display_name: None,
            input_price_per_mtok: 1.0,
            output_price_per_mtok: 4.0,
            output_reasoning_price_per_mtok: Some(8.0),
            cache_read_price_per_mtok: None,
            cache_write_price_per_mtok: None,
            context_window: None,
            max_output_tokens: None,
            supports_vision: None,
            supports_function_calling: None,
            notes: None,
        };
        let breakdown = cost_breakdown(&def, 0, 10, 25);
        assert_eq!(breakdown.output, 0.0);
        assert!(breakdown.reasoning > 0.0);
    }

    #[test]
    fn cache_dir_ends_with_crate_name() {
        if let Some(dir) = cache_dir() {
            assert!(dir.ends_with("llm-cost"));
        }
    }

    #[test]
    fn chrono_round_trip_matches_fixture() {
        let when = Utc.with_ymd_and_hms(2026, 10, 28, 0, 0, 0).unwrap();
        assert_eq!(sample_catalog().valid_until(), when);
    }
}

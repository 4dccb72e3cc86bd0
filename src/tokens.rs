//! Opaque token minting.
//!
//! Tokens are 32 characters from the URL-safe base64 alphabet and must not
//! collide with any token already known in their namespace. The known set is
//! a snapshot of the store that is reused for a short freshness window.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use parking_lot::Mutex;
use rand::rngs::{OsRng, StdRng};
use rand::{RngCore, SeedableRng};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::TokenConfig;
use crate::dedup::FetchDedup;
use crate::error::Result;
use crate::store::StoreReader;

pub const TOKEN_LENGTH: usize = 32;
const RAW_TOKEN_BYTES: usize = 24;

/// True when `token` has the exact length and only URL-safe characters.
pub fn is_valid_token(token: &str) -> bool {
    token.len() == TOKEN_LENGTH
        && token
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

enum EntropySource {
    /// OS randomness, degrading to a time-seeded generator if it fails.
    Os { fallback: Option<StdRng> },
    Seeded(StdRng),
}

pub struct TokenGenerator {
    source: EntropySource,
    min_length: usize,
}

impl Default for TokenGenerator {
    fn default() -> Self {
        Self::new(TokenConfig::default().min_length)
    }
}

/// Candidates are always `TOKEN_LENGTH` long, so a larger minimum could never
/// be met.
fn bounded_min_length(min_length: usize) -> usize {
    if min_length > TOKEN_LENGTH {
        warn!(min_length, max = TOKEN_LENGTH, "Token minimum length exceeds token length, clamping");
    }
    min_length.min(TOKEN_LENGTH)
}

impl TokenGenerator {
    pub fn new(min_length: usize) -> Self {
        Self {
            source: EntropySource::Os { fallback: None },
            min_length: bounded_min_length(min_length),
        }
    }

    /// Deterministic generator, for reproducible batches.
    pub fn seeded(seed: u64, min_length: usize) -> Self {
        Self {
            source: EntropySource::Seeded(StdRng::seed_from_u64(seed)),
            min_length: bounded_min_length(min_length),
        }
    }

    pub fn min_length(&self) -> usize {
        self.min_length
    }

    /// Mints a token absent from `existing` and records it there, so tokens
    /// minted in the same batch never collide with each other.
    pub fn generate(&mut self, existing: &mut HashSet<String>) -> String {
        loop {
            let candidate = self.candidate();
            if candidate.len() < self.min_length {
                debug!(len = candidate.len(), "Rejected short token candidate");
                continue;
            }
            if existing.contains(&candidate) {
                debug!("Rejected colliding token candidate");
                continue;
            }
            existing.insert(candidate.clone());
            return candidate;
        }
    }

    fn candidate(&mut self) -> String {
        let mut raw = [0u8; RAW_TOKEN_BYTES];
        self.fill(&mut raw);
        let mut encoded = URL_SAFE_NO_PAD.encode(raw);
        encoded.truncate(TOKEN_LENGTH);
        encoded
    }

    fn fill(&mut self, buf: &mut [u8]) {
        match &mut self.source {
            EntropySource::Seeded(rng) => rng.fill_bytes(buf),
            EntropySource::Os { fallback } => {
                if let Err(err) = OsRng.try_fill_bytes(buf) {
                    if fallback.is_none() {
                        warn!(error = %err, "OS randomness unavailable, using time-seeded generator");
                    }
                    fallback
                        .get_or_insert_with(|| StdRng::seed_from_u64(time_seed()))
                        .fill_bytes(buf);
                }
            }
        }
    }
}

fn time_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default()
        ^ u64::from(std::process::id())
}

#[derive(Debug, Clone)]
struct Snapshot {
    tokens: HashSet<String>,
    fetched_at: Instant,
}

/// Known-token snapshot plus the generator that mints against it.
pub struct TokenRegistry {
    store: Arc<dyn StoreReader>,
    path: String,
    ttl: Duration,
    snapshot: Arc<Mutex<Option<Snapshot>>>,
    generator: Mutex<TokenGenerator>,
    fetches: FetchDedup<String, Result<HashSet<String>>>,
}

impl TokenRegistry {
    pub fn new(store: Arc<dyn StoreReader>, path: impl Into<String>, config: &TokenConfig) -> Self {
        Self::with_generator(store, path, config.snapshot_ttl(), TokenGenerator::new(config.min_length))
    }

    pub fn with_generator(
        store: Arc<dyn StoreReader>,
        path: impl Into<String>,
        ttl: Duration,
        generator: TokenGenerator,
    ) -> Self {
        Self {
            store,
            path: path.into(),
            ttl,
            snapshot: Arc::new(Mutex::new(None)),
            generator: Mutex::new(generator),
            fetches: FetchDedup::new(),
        }
    }

    /// Returns the known tokens, re-reading the store only when the cached
    /// snapshot is older than the freshness window or `force` is set.
    pub async fn ensure_snapshot(&self, force: bool) -> Result<HashSet<String>> {
        if !force {
            if let Some(snapshot) = self.snapshot.lock().as_ref() {
                if snapshot.fetched_at.elapsed() < self.ttl {
                    return Ok(snapshot.tokens.clone());
                }
            }
        }

        let store = Arc::clone(&self.store);
        let cache = Arc::clone(&self.snapshot);
        let path = self.path.clone();
        self.fetches
            .run(self.path.clone(), move || async move {
                let raw = store.fetch_value(&path).await?;
                let mut tokens = known_tokens(raw.as_ref());
                let fetched = tokens.len();
                let mut cache = cache.lock();
                // Tokens minted here may not have reached the store yet.
                if let Some(previous) = cache.take() {
                    tokens.extend(previous.tokens);
                }
                debug!(path = %path, fetched, known = tokens.len(), "Refreshed token snapshot");
                *cache = Some(Snapshot {
                    tokens: tokens.clone(),
                    fetched_at: Instant::now(),
                });
                Ok(tokens)
            })
            .await
    }

    /// Mints `count` tokens that collide neither with the store snapshot nor
    /// with each other. Generation runs against the cached set itself, so
    /// overlapping mints see each other's tokens.
    pub async fn mint(&self, count: usize) -> Result<Vec<String>> {
        let fetched = self.ensure_snapshot(false).await?;
        let minted: Vec<String> = {
            let mut cache = self.snapshot.lock();
            let snapshot = cache.get_or_insert_with(|| Snapshot {
                tokens: fetched,
                fetched_at: Instant::now(),
            });
            let mut generator = self.generator.lock();
            (0..count)
                .map(|_| generator.generate(&mut snapshot.tokens))
                .collect()
        };
        info!(count = minted.len(), "Minted tokens");
        Ok(minted)
    }
}

/// Token ids are the keys of the namespace object; an array of strings is
/// also accepted.
fn known_tokens(raw: Option<&Value>) -> HashSet<String> {
    match raw {
        Some(Value::Object(map)) => map.keys().cloned().collect(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => HashSet::new(),
    }
}

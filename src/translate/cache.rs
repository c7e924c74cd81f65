//! Quality-aware in-memory translation cache with TTL.
//! Key: blake3 hash of (src_lang | tgt_lang | pattern_version | source_text).
//! Only results whose purity report passed are admitted; eviction removes
//! the entry with the lowest composite quality/recency/access score.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::script::Lang;
use crate::validate::{PurityReport, PurityValidator};

/// Time source, injectable so TTL and eviction are deterministic in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub cleaned_text: String,
    pub target_lang: Lang,
    pub purity_score: f32,
    /// Purity weighted by cleaning confidence; drives eviction.
    pub quality_score: f32,
    pub created_at: Instant,
    pub last_accessed_at: Instant,
    pub access_count: u64,
}

/// A cache hit as returned to the orchestrator.
#[derive(Debug, Clone)]
pub struct CachedTranslation {
    pub cleaned_text: String,
    pub purity_score: f32,
}

pub struct QualityCache {
    inner: Mutex<HashMap<[u8; 32], CacheEntry>>,
    /// Rotating cursor for the revalidation sweep.
    sweep_cursor: Mutex<usize>,
    capacity: usize,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl QualityCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self::with_clock(capacity, ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(capacity: usize, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        assert!(capacity > 0, "cache capacity must be > 0");
        Self {
            inner: Mutex::new(HashMap::new()),
            sweep_cursor: Mutex::new(0),
            capacity,
            ttl,
            clock,
        }
    }

    /// Compute the cache key from translation parameters. The pattern
    /// library version is folded in so signature upgrades invalidate
    /// entries cleaned under older rules.
    pub fn compute_key(
        src_lang: Lang,
        tgt_lang: Lang,
        pattern_version: u32,
        source_text: &str,
    ) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(src_lang.code().as_bytes());
        hasher.update(b"|");
        hasher.update(tgt_lang.code().as_bytes());
        hasher.update(b"|");
        hasher.update(&pattern_version.to_le_bytes());
        hasher.update(b"|");
        hasher.update(source_text.as_bytes());
        *hasher.finalize().as_bytes()
    }

    /// Look up a cached translation. Returns None if absent or expired;
    /// hits refresh recency and bump the access count.
    pub fn get(&self, key: &[u8; 32]) -> Option<CachedTranslation> {
        let now = self.clock.now();
        let mut cache = self.inner.lock();
        if let Some(entry) = cache.get_mut(key) {
            if now.duration_since(entry.created_at) < self.ttl {
                entry.last_accessed_at = now;
                entry.access_count += 1;
                return Some(CachedTranslation {
                    cleaned_text: entry.cleaned_text.clone(),
                    purity_score: entry.purity_score,
                });
            }
            // Expired — remove it
            cache.remove(key);
        }
        None
    }

    /// Insert a validated translation. Refuses results whose purity report
    /// did not pass: no impure text is ever cached.
    pub fn put(
        &self,
        key: [u8; 32],
        cleaned_text: String,
        report: &PurityReport,
        confidence: f32,
    ) -> bool {
        if !report.passed {
            warn!(
                target_lang = %report.target,
                reason = ?report.reason,
                "refusing to cache impure translation"
            );
            return false;
        }
        let now = self.clock.now();
        let entry = CacheEntry {
            cleaned_text,
            target_lang: report.target,
            purity_score: report.purity,
            quality_score: report.purity * confidence,
            created_at: now,
            last_accessed_at: now,
            access_count: 0,
        };
        let mut cache = self.inner.lock();
        cache.insert(key, entry);
        while cache.len() > self.capacity {
            self.evict_lowest(&mut cache);
        }
        true
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Drop one entry, explicitly (user feedback flagged it wrong).
    pub fn invalidate(&self, key: &[u8; 32]) -> bool {
        let removed = self.inner.lock().remove(key).is_some();
        if removed {
            info!("cache entry invalidated by feedback");
        }
        removed
    }

    /// Re-run the validator over a rotating sample of entries and evict any
    /// that no longer pass (threshold drift, pattern upgrades). Returns the
    /// number of evicted entries.
    pub fn revalidate_sample(&self, validator: &PurityValidator, sample: usize) -> usize {
        let mut cache = self.inner.lock();
        if cache.is_empty() || sample == 0 {
            return 0;
        }
        let mut keys: Vec<[u8; 32]> = cache.keys().copied().collect();
        keys.sort_unstable();

        let mut cursor = self.sweep_cursor.lock();
        let start = *cursor % keys.len();
        let take = sample.min(keys.len());
        *cursor = (start + take) % keys.len();

        let mut evicted = 0;
        for i in 0..take {
            let key = keys[(start + i) % keys.len()];
            let Some(entry) = cache.get(&key) else { continue };
            let report = validator.validate(&entry.cleaned_text, entry.target_lang);
            if !report.passed {
                debug!(reason = ?report.reason, "revalidation evicting stale entry");
                cache.remove(&key);
                evicted += 1;
            }
        }
        if evicted > 0 {
            info!(evicted, "revalidation sweep evicted entries");
        }
        evicted
    }

    /// Spawn a background sweep task on the current tokio runtime.
    pub fn start_revalidation_loop(
        cache: Arc<Self>,
        validator: Arc<PurityValidator>,
        interval: Duration,
        sample: usize,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await; // first tick fires immediately
            loop {
                ticker.tick().await;
                cache.revalidate_sample(&validator, sample);
            }
        })
    }

    /// Evict the entry with the lowest composite score: quality weighted
    /// highest, then recency, then access frequency; least-recently-used
    /// breaks ties.
    fn evict_lowest(&self, cache: &mut HashMap<[u8; 32], CacheEntry>) {
        let now = self.clock.now();
        let victim = cache
            .iter()
            .map(|(key, entry)| (*key, self.composite_score(entry, now), entry.last_accessed_at))
            .min_by(|a, b| {
                a.1.partial_cmp(&b.1)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.2.cmp(&b.2))
            })
            .map(|(key, _, _)| key);
        if let Some(key) = victim {
            debug!("evicting lowest-scored cache entry");
            cache.remove(&key);
        }
    }

    fn composite_score(&self, entry: &CacheEntry, now: Instant) -> f32 {
        let age = now.duration_since(entry.last_accessed_at);
        let recency = if age >= self.ttl {
            0.0
        } else {
            1.0 - age.as_secs_f32() / self.ttl.as_secs_f32()
        };
        let frequency = (entry.access_count.min(10)) as f32 / 10.0;
        entry.quality_score * 0.6 + recency * 0.25 + frequency * 0.15
    }
}

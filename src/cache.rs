//! Content-addressed cache of batch results
//!
//! A batch is fully determined by the model config, the aggregation settings,
//! the scenario count and the base seed. The cache key is the blake3 hash of
//! those inputs, so an identical request returns the stored batch instead of
//! re-simulating. Unseeded runs are not cacheable.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

use crate::aggregation::AggregationConfig;
use crate::config::ModelConfig;
use crate::runner::{Engine, SimulationBatch};

const KEY_DOMAIN: &[u8] = b"pf_liquidity_risk/batch-cache/v1";

/// Fingerprint of a batch request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey([u8; 32]);

impl CacheKey {
    pub fn new(
        config: &ModelConfig,
        aggregation: &AggregationConfig,
        scenario_count: NonZeroUsize,
        seed: u64,
    ) -> serde_json::Result<Self> {
        let mut hasher = blake3::Hasher::new();
        hasher.update(KEY_DOMAIN);
        serde_json::to_writer(&mut hasher, config)?;
        serde_json::to_writer(&mut hasher, aggregation)?;
        hasher.update(&(scenario_count.get() as u64).to_le_bytes());
        hasher.update(&seed.to_le_bytes());
        Ok(Self(*hasher.finalize().as_bytes()))
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

/// In-memory store of finished batches keyed by request fingerprint
#[derive(Debug, Default)]
pub struct BatchCache {
    entries: HashMap<CacheKey, Arc<SimulationBatch>>,

    /// Statistics
    pub hits: u64,
    pub misses: u64,
}

impl BatchCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<SimulationBatch>> {
        self.entries.get(key).cloned()
    }

    pub fn insert(&mut self, key: CacheKey, batch: SimulationBatch) -> Arc<SimulationBatch> {
        let batch = Arc::new(batch);
        self.entries.insert(key, Arc::clone(&batch));
        batch
    }

    /// Return the cached batch for this request, running it on a miss
    pub fn get_or_run(
        &mut self,
        engine: &Engine,
        scenario_count: NonZeroUsize,
        seed: u64,
    ) -> serde_json::Result<Arc<SimulationBatch>> {
        let key = CacheKey::new(engine.config(), engine.aggregation(), scenario_count, seed)?;

        if let Some(batch) = self.get(&key) {
            self.hits += 1;
            log::debug!("Batch cache hit {}", key.to_hex());
            return Ok(batch);
        }

        self.misses += 1;
        let batch = engine.run(scenario_count, Some(seed));
        Ok(self.insert(key, batch))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.hits = 0;
        self.misses = 0;
    }

    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[test]
    fn test_key_depends_on_every_input() {
        let config = ModelConfig::default();
        let aggregation = AggregationConfig::default();
        let key = CacheKey::new(&config, &aggregation, count(100), 1).unwrap();

        assert_eq!(key, CacheKey::new(&config, &aggregation, count(100), 1).unwrap());
        assert_ne!(key, CacheKey::new(&config, &aggregation, count(101), 1).unwrap());
        assert_ne!(key, CacheKey::new(&config, &aggregation, count(100), 2).unwrap());

        let mut other = config.clone();
        other.cap_rate = 0.06;
        assert_ne!(key, CacheKey::new(&other, &aggregation, count(100), 1).unwrap());

        let other_aggregation = AggregationConfig { var_confidence: 0.99, ..Default::default() };
        assert_ne!(key, CacheKey::new(&config, &other_aggregation, count(100), 1).unwrap());
        assert_eq!(key.to_hex().len(), 64);
    }

    #[test]
    fn test_get_or_run_hits_on_repeat() {
        let engine = Engine::build(ModelConfig::default()).unwrap();
        let mut cache = BatchCache::new();

        let first = cache.get_or_run(&engine, count(50), 7).unwrap();
        let second = cache.get_or_run(&engine, count(50), 7).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.misses, 1);
        assert_eq!(cache.hits, 1);
        assert_eq!(cache.hit_rate(), 0.5);

        cache.get_or_run(&engine, count(50), 8).unwrap();
        assert_eq!(cache.len(), 2);

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.hits, 0);
    }
}

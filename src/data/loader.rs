//! Coalescing variable cache.
//!
//! Concurrent loads of the same variable share one fetch: the first caller
//! runs it, the others block on the same entry and receive the same `Arc`.
//! Failures are handed to every waiter but never stored.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use moka::sync::Cache;
use rayon::prelude::*;

use crate::config::DataApiConfig;
use crate::data::api::{FetchOptions, VariableUrls, fetch_variable, variable_urls};
use crate::data::retry::RetryPolicy;
use crate::data::transport::Transport;
use crate::domain::{VariableDataMap, VariableDataMetadata, VariableId};
use crate::error::FetchError;

const DEFAULT_CAPACITY: u64 = 512;

type CacheKey = (VariableId, VariableUrls);

#[derive(Clone)]
pub struct VariableLoader {
    transport: Arc<dyn Transport>,
    api: DataApiConfig,
    retry: RetryPolicy,
    cache: Cache<CacheKey, Arc<VariableDataMetadata>>,
}

impl VariableLoader {
    pub fn new(transport: Arc<dyn Transport>, api: DataApiConfig) -> Self {
        Self {
            transport,
            api,
            retry: RetryPolicy::default(),
            cache: Cache::builder().max_capacity(DEFAULT_CAPACITY).build(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn api(&self) -> &DataApiConfig {
        &self.api
    }

    /// Load one variable, from the cache unless `options.no_cache` is set.
    pub fn load(&self, variable_id: VariableId, options: FetchOptions) -> Result<Arc<VariableDataMetadata>, FetchError> {
        if options.no_cache {
            tracing::debug!(variable_id, "cache bypassed");
            return self.fetch(variable_id, options).map(Arc::new);
        }

        let key = (variable_id, variable_urls(&self.api, variable_id, options));
        if self.cache.contains_key(&key) {
            tracing::debug!(variable_id, "cache hit");
        }
        self.cache
            .try_get_with(key, || {
                tracing::debug!(variable_id, "cache miss");
                self.fetch(variable_id, options).map(Arc::new)
            })
            .map_err(|e| FetchError::clone(&e))
    }

    /// Load several variables in parallel. Duplicate ids are fetched once;
    /// the first failure is returned.
    pub fn load_many(&self, variable_ids: &[VariableId], options: FetchOptions) -> Result<VariableDataMap, FetchError> {
        let unique: Vec<VariableId> = variable_ids.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();
        let loaded: Vec<(VariableId, Arc<VariableDataMetadata>)> = unique
            .par_iter()
            .map(|&id| self.load(id, options).map(|variable| (id, variable)))
            .collect::<Result<_, _>>()?;
        Ok(loaded.into_iter().collect::<BTreeMap<_, _>>())
    }

    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.run_pending_tasks();
        self.cache.entry_count()
    }

    fn fetch(&self, variable_id: VariableId, options: FetchOptions) -> Result<VariableDataMetadata, FetchError> {
        fetch_variable(self.transport.as_ref(), &self.api, variable_id, options, &self.retry)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Barrier;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    /// Serves a fixed variable for any id, counting requests.
    struct CountingTransport {
        gets: AtomicUsize,
        delay: Duration,
        failing: AtomicBool,
    }

    impl CountingTransport {
        fn new(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                gets: AtomicUsize::new(0),
                delay,
                failing: AtomicBool::new(false),
            })
        }

        fn gets(&self) -> usize {
            self.gets.load(Ordering::SeqCst)
        }
    }

    impl Transport for CountingTransport {
        fn get(&self, url: &str) -> Result<String, FetchError> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            if self.failing.load(Ordering::SeqCst) {
                return Err(FetchError::Network {
                    url: url.to_string(),
                    message: "connection reset".to_string(),
                });
            }
            let path = url.split_once('?').map_or(url, |(p, _)| p);
            let id = path
                .rsplit('/')
                .next()
                .and_then(|file| file.split('.').next())
                .unwrap_or("0");
            if path.ends_with(".metadata.json") {
                Ok(format!(r#"{{"id":{id},"name":"Variable {id}"}}"#))
            } else {
                Ok(r#"{"years":[2000],"entities":[1],"values":[1]}"#.to_string())
            }
        }
    }

    fn loader(transport: Arc<CountingTransport>) -> VariableLoader {
        VariableLoader::new(transport, DataApiConfig::new("https://api.example.com")).with_retry(RetryPolicy::none())
    }

    #[test]
    fn concurrent_loads_share_one_fetch() {
        let transport = CountingTransport::new(Duration::from_millis(50));
        let loader = loader(transport.clone());
        let barrier = Barrier::new(8);

        let results: Vec<Arc<VariableDataMetadata>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    s.spawn(|| {
                        barrier.wait();
                        loader.load(7, FetchOptions::default()).unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(transport.gets(), 2);
        assert!(results.iter().all(|r| Arc::ptr_eq(r, &results[0])));
    }

    #[test]
    fn failures_are_not_cached() {
        let transport = CountingTransport::new(Duration::ZERO);
        transport.failing.store(true, Ordering::SeqCst);
        let loader = loader(transport.clone());

        assert!(matches!(
            loader.load(3, FetchOptions::default()),
            Err(FetchError::Network { .. })
        ));
        assert_eq!(loader.entry_count(), 0);

        transport.failing.store(false, Ordering::SeqCst);
        let variable = loader.load(3, FetchOptions::default()).unwrap();
        assert_eq!(variable.metadata.id, Some(3));
        assert_eq!(loader.entry_count(), 1);
    }

    #[test]
    fn no_cache_bypasses_the_cache() {
        let transport = CountingTransport::new(Duration::ZERO);
        let loader = loader(transport.clone());

        let first = loader.load(4, FetchOptions::default()).unwrap();
        let cached = loader.load(4, FetchOptions::default()).unwrap();
        assert!(Arc::ptr_eq(&first, &cached));
        assert_eq!(transport.gets(), 2);

        let fresh = loader.load(4, FetchOptions { no_cache: true }).unwrap();
        assert!(!Arc::ptr_eq(&first, &fresh));
        assert_eq!(transport.gets(), 4);
    }

    #[test]
    fn load_many_dedups_ids() {
        let transport = CountingTransport::new(Duration::ZERO);
        let loader = loader(transport.clone());

        let map = loader.load_many(&[5, 6, 5, 6, 5], FetchOptions::default()).unwrap();
        assert_eq!(map.keys().copied().collect::<Vec<_>>(), vec![5, 6]);
        assert_eq!(transport.gets(), 4);
        assert_eq!(map[&6].metadata.name.as_deref(), Some("Variable 6"));
    }

    #[test]
    fn invalid_ids_fail_fast() {
        let transport = CountingTransport::new(Duration::ZERO);
        let loader = loader(transport.clone());
        assert_eq!(
            loader.load_many(&[1, 0], FetchOptions::default()),
            Err(FetchError::InvalidVariableId(0))
        );
    }
}

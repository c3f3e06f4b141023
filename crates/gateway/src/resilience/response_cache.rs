//! Cache-aside lookup combining the TTL cache with single-flight.
//!
//! Per-request flow:
//! `lookup -> hit (served from cache) | miss -> join or start upstream call
//! -> look up again -> on success store and return | on error return the
//! error uncached`.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{self, Either};
use log::debug;

use super::{SingleFlight, TtlCache};
use crate::errors::GatewayError;
use crate::models::Fetched;

/// Deterministic cache key derived from an endpoint and its parameters.
///
/// Parameters are sorted by name before serialization, so the same logical
/// request always maps to the same key. Credentials must never be passed in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(endpoint: &str, params: &[(&str, &str)]) -> Self {
        let params: BTreeMap<&str, &str> = params.iter().copied().collect();
        let key = serde_json::json!({ "endpoint": endpoint, "params": params });
        Self(key.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Cached, de-duplicated access to one kind of upstream response.
pub struct ResponseCache<V> {
    name: &'static str,
    entries: Arc<TtlCache<V>>,
    flights: SingleFlight<Fetched<V>>,
}

impl<V> ResponseCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(name: &'static str, ttl: Duration) -> Self {
        Self {
            name,
            entries: Arc::new(TtlCache::new(ttl)),
            flights: SingleFlight::new(),
        }
    }

    /// Return the cached value for `key`, or fetch, store and return it.
    ///
    /// Concurrent misses for the same key share a single `fetch`. Failed
    /// fetches are not cached.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        key: &CacheKey,
        fetch: F,
    ) -> Result<Fetched<V>, GatewayError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, GatewayError>> + Send + 'static,
    {
        if let Some(value) = self.entries.get(key.as_str()) {
            debug!("{} cache hit: {}", self.name, key);
            return Ok(Fetched::cached(value));
        }
        debug!("{} cache miss: {}", self.name, key);
        self.load(key, fetch).await
    }

    /// Join or start the upstream call for `key`.
    ///
    /// The registered call looks the key up again first, so a miss observed
    /// just before an earlier call stored its value does not fetch twice.
    async fn load<F, Fut>(&self, key: &CacheKey, fetch: F) -> Result<Fetched<V>, GatewayError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, GatewayError>> + Send + 'static,
    {
        let entries = Arc::clone(&self.entries);
        let cache_key = key.as_str().to_string();
        let name = self.name;
        self.flights
            .run(key.as_str(), move || match entries.get(&cache_key) {
                Some(value) => {
                    debug!("{} stored while waiting: {}", name, cache_key);
                    Either::Left(future::ready(Ok(Fetched::cached(value))))
                }
                None => {
                    let pending = fetch();
                    Either::Right(async move {
                        let value = pending.await?;
                        entries.set(cache_key, value.clone());
                        Ok(Fetched::fresh(value))
                    })
                }
            })
            .await
    }

    /// Direct access to the underlying TTL cache.
    pub fn entries(&self) -> &TtlCache<V> {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::future::join_all;

    #[test]
    fn test_cache_key_is_order_independent() {
        let a = CacheKey::new("GLOBAL_QUOTE", &[("symbol", "IBM"), ("interval", "1d")]);
        let b = CacheKey::new("GLOBAL_QUOTE", &[("interval", "1d"), ("symbol", "IBM")]);
        assert_eq!(a, b);
        assert_eq!(
            a.as_str(),
            r#"{"endpoint":"GLOBAL_QUOTE","params":{"interval":"1d","symbol":"IBM"}}"#
        );
    }

    #[test]
    fn test_cache_key_distinguishes_params() {
        let a = CacheKey::new("GLOBAL_QUOTE", &[("symbol", "IBM")]);
        let b = CacheKey::new("GLOBAL_QUOTE", &[("symbol", "MSFT")]);
        assert_ne!(a, b);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_lookup_is_served_from_cache() {
        let cache = ResponseCache::new("test", Duration::from_secs(300));
        let key = CacheKey::new("series", &[("id", "DGS10")]);
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let calls = calls.clone();
            cache
                .get_or_fetch(&key, move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(42u32)
                })
                .await
                .unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let calls_after = calls.clone();
        let third = cache
            .get_or_fetch(&key, move || async move {
                calls_after.fetch_add(1, Ordering::SeqCst);
                Ok(0u32)
            })
            .await
            .unwrap();
        assert_eq!(third, Fetched::cached(42));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_triggers_refetch() {
        let cache = ResponseCache::new("test", Duration::from_secs(300));
        let key = CacheKey::new("series", &[("id", "DGS10")]);
        let calls = Arc::new(AtomicUsize::new(0));

        let fetch = |calls: Arc<AtomicUsize>| {
            move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                Ok(n as u32)
            }
        };

        let first = cache.get_or_fetch(&key, fetch(calls.clone())).await.unwrap();
        assert!(!first.from_cache);

        tokio::time::advance(Duration::from_secs(301)).await;

        let second = cache.get_or_fetch(&key, fetch(calls.clone())).await.unwrap();
        assert!(!second.from_cache);
        assert_eq!(second.data, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_misses_share_one_fetch() {
        let cache = ResponseCache::new("test", Duration::from_secs(300));
        let key = CacheKey::new("news", &[("q", "bonds")]);
        let calls = Arc::new(AtomicUsize::new(0));

        let lookups = (0..5).map(|_| {
            let calls = calls.clone();
            let cache = &cache;
            let key = &key;
            async move {
                cache
                    .get_or_fetch(key, move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        Ok("headline".to_string())
                    })
                    .await
            }
        });
        let results = join_all(lookups).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|r| r.as_ref().unwrap().data == "headline"));
        assert_eq!(cache.entries().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_errors_are_not_cached() {
        let cache: ResponseCache<u32> = ResponseCache::new("test", Duration::from_secs(300));
        let key = CacheKey::new("quote", &[("symbol", "IBM")]);

        let failed = cache
            .get_or_fetch(&key, || async {
                Err(GatewayError::Timeout {
                    provider: "TEST".to_string(),
                })
            })
            .await;
        assert!(failed.is_err());
        assert!(cache.entries().is_empty());

        let ok = cache.get_or_fetch(&key, || async { Ok(7) }).await.unwrap();
        assert_eq!(ok, Fetched::fresh(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_value_stored_meanwhile_is_not_fetched_again() {
        let cache = ResponseCache::new("test", Duration::from_secs(300));
        let key = CacheKey::new("series", &[("id", "DFF")]);
        let calls = Arc::new(AtomicUsize::new(0));

        let first = cache
            .get_or_fetch(&key, || async { Ok(3u32) })
            .await
            .unwrap();
        assert_eq!(first, Fetched::fresh(3));

        // A caller whose own lookup missed just before the value above landed
        let late = cache
            .load(&key, {
                let calls = calls.clone();
                move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(4u32)
                }
            })
            .await
            .unwrap();
        assert_eq!(late, Fetched::cached(3));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_lookup_does_not_serve_later_callers() {
        let cache = ResponseCache::new("test", Duration::from_secs(300));
        let key = CacheKey::new("quote", &[("symbol", "IBM")]);
        let calls = Arc::new(AtomicUsize::new(0));

        let fetch = |calls: Arc<AtomicUsize>| {
            move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) as u32;
                tokio::time::sleep(Duration::from_secs(2)).await;
                Ok(n)
            }
        };

        let abandoned = tokio::time::timeout(
            Duration::from_secs(1),
            cache.get_or_fetch(&key, fetch(calls.clone())),
        )
        .await;
        assert!(abandoned.is_err());

        tokio::time::sleep(Duration::from_secs(3600)).await;

        let later = cache.get_or_fetch(&key, fetch(calls.clone())).await.unwrap();
        assert_eq!(later, Fetched::fresh(1));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}

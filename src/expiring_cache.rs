/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Expiry-aware, single-flight memoization primitive shared by the credentials cache
//! and the SSO token provider.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use tokio::sync::{Mutex as AsyncMutex, RwLock};

/// Caches a value with an expiration and coalesces concurrent loads
///
/// `get_or_load` returns the cached value as long as `now + buffer_time` is before the
/// value's expiration. Once the value is absent or inside the buffer window, exactly one
/// caller runs the loader; every other caller that arrived during that load receives a
/// clone of the same outcome, success or failure. A failed load never disturbs the
/// previously cached value.
#[derive(Debug)]
pub(crate) struct ExpiringCache<T, E> {
    buffer_time: Duration,
    inner: Arc<Shared<T, E>>,
}

impl<T, E> Clone for ExpiringCache<T, E> {
    fn clone(&self) -> Self {
        Self {
            buffer_time: self.buffer_time,
            inner: self.inner.clone(),
        }
    }
}

#[derive(Debug)]
struct Shared<T, E> {
    value: RwLock<Option<(T, SystemTime)>>,
    /// Serializes loads. Held only while a loader is running.
    gate: AsyncMutex<()>,
    state: Mutex<LoadState<T, E>>,
}

#[derive(Debug)]
struct LoadState<T, E> {
    /// Incremented every time a load completes.
    generation: u64,
    last: Option<Result<T, E>>,
}

impl<T, E> ExpiringCache<T, E>
where
    T: Clone,
    E: Clone,
{
    pub(crate) fn new(buffer_time: Duration) -> Self {
        ExpiringCache {
            buffer_time,
            inner: Arc::new(Shared {
                value: RwLock::new(None),
                gate: AsyncMutex::new(()),
                state: Mutex::new(LoadState {
                    generation: 0,
                    last: None,
                }),
            }),
        }
    }

    /// Attempts to refresh the cached value with the given future.
    ///
    /// If another thread is currently refreshing the cache, the result from that
    /// refresh is returned instead of invoking `loader`.
    pub(crate) async fn get_or_load<F, Fut>(&self, now: SystemTime, loader: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(T, SystemTime), E>>,
    {
        if let Some(value) = self.yield_if_fresh(now).await {
            return Ok(value);
        }

        let observed_generation = self.inner.state.lock().unwrap().generation;
        let _gate = self.inner.gate.lock().await;

        // A load completed while this caller waited for the gate. Everyone coalesced
        // behind that load observes its outcome.
        {
            let state = self.inner.state.lock().unwrap();
            if state.generation != observed_generation {
                return state
                    .last
                    .clone()
                    .expect("generation advanced, so a load completed");
            }
        }

        // The cache may have been refreshed before this caller snapshotted the
        // generation. Re-check freshness while holding the gate.
        if let Some(value) = self.yield_if_fresh(now).await {
            return Ok(value);
        }

        let result = loader().await;
        let shared = match &result {
            Ok((value, expiry)) => {
                *self.inner.value.write().await = Some((value.clone(), *expiry));
                Ok(value.clone())
            }
            Err(err) => Err(err.clone()),
        };
        let mut state = self.inner.state.lock().unwrap();
        state.generation += 1;
        state.last = Some(shared.clone());
        shared
    }

    /// Returns the cached value when `now` is still outside the buffer window.
    async fn yield_if_fresh(&self, now: SystemTime) -> Option<T> {
        match self.inner.value.read().await.as_ref() {
            Some((value, expiry)) if now + self.buffer_time < *expiry => Some(value.clone()),
            _ => None,
        }
    }

    /// The expiration of the currently cached value, if any. Exposed for tests.
    #[cfg(test)]
    pub(crate) async fn expiry(&self) -> Option<SystemTime> {
        self.inner.value.read().await.as_ref().map(|(_, exp)| *exp)
    }
}

#[cfg(test)]
mod tests {
    use super::ExpiringCache;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, UNIX_EPOCH};

    const BUFFER: Duration = Duration::from_secs(10);

    #[tokio::test]
    async fn fresh_value_returned_without_load() {
        let cache: ExpiringCache<String, String> = ExpiringCache::new(BUFFER);
        let epoch = UNIX_EPOCH;
        let loads = Arc::new(AtomicUsize::new(0));

        let counter = loads.clone();
        let value = cache
            .get_or_load(epoch, move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(("first".to_string(), epoch + Duration::from_secs(100)))
            })
            .await
            .unwrap();
        assert_eq!(value, "first");
        assert_eq!(loads.load(Ordering::SeqCst), 1);

        // now + buffer < expiry: cached value, loader not called
        let value = cache
            .get_or_load(epoch + Duration::from_secs(89), || async move {
                panic!("loader must not run while the value is fresh")
            })
            .await
            .unwrap();
        assert_eq!(value, "first");
    }

    #[tokio::test]
    async fn buffer_boundary_triggers_reload() {
        let cache: ExpiringCache<String, String> = ExpiringCache::new(BUFFER);
        let epoch = UNIX_EPOCH;
        let expiry = epoch + Duration::from_secs(100);

        cache
            .get_or_load(epoch, || async move { Ok(("v1".to_string(), expiry)) })
            .await
            .unwrap();

        // T - B - 1: still fresh
        let value = cache
            .get_or_load(epoch + Duration::from_secs(89), || async move {
                panic!("still fresh")
            })
            .await
            .unwrap();
        assert_eq!(value, "v1");

        // T - B: inside the buffer window, reload happens
        let value = cache
            .get_or_load(epoch + Duration::from_secs(90), || async move {
                Ok(("v2".to_string(), expiry + Duration::from_secs(100)))
            })
            .await
            .unwrap();
        assert_eq!(value, "v2");
    }

    #[tokio::test]
    async fn concurrent_loads_coalesce() {
        let cache: ExpiringCache<String, String> = ExpiringCache::new(BUFFER);
        let loads = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let cache = cache.clone();
            let loads = loads.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_load(UNIX_EPOCH, move || async move {
                        loads.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok((
                            "loaded".to_string(),
                            UNIX_EPOCH + Duration::from_secs(1000),
                        ))
                    })
                    .await
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "loaded");
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_failures_coalesce() {
        let cache: ExpiringCache<String, String> = ExpiringCache::new(BUFFER);
        let loads = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let loads = loads.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_load(UNIX_EPOCH, move || async move {
                        loads.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Err("load failed".to_string())
                    })
                    .await
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap_err(), "load failed");
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_load_preserves_previous_value() {
        let cache: ExpiringCache<String, String> = ExpiringCache::new(BUFFER);
        let epoch = UNIX_EPOCH;
        let expiry = epoch + Duration::from_secs(100);

        cache
            .get_or_load(epoch, || async move { Ok(("v1".to_string(), expiry)) })
            .await
            .unwrap();

        // reload attempt inside the buffer window fails
        cache
            .get_or_load(epoch + Duration::from_secs(95), || async move {
                Err("transient".to_string())
            })
            .await
            .unwrap_err();

        // the old value (and its expiry) is still cached
        assert_eq!(cache.expiry().await, Some(expiry));

        // a subsequent successful load replaces it
        let value = cache
            .get_or_load(epoch + Duration::from_secs(95), || async move {
                Ok(("v2".to_string(), expiry + Duration::from_secs(200)))
            })
            .await
            .unwrap();
        assert_eq!(value, "v2");
    }
}

/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

use crate::expiring_cache::ExpiringCache;
use crate::provider::{future, CredentialsError, ProvideCredentials};
use crate::time_source::TimeSource;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_BUFFER_TIME: Duration = Duration::from_secs(10);
const DEFAULT_CREDENTIAL_EXPIRATION: Duration = Duration::from_secs(15 * 60);

/// `LazyCachingCredentialsProvider` implements [`ProvideCredentials`] by caching
/// credentials that it loads from an inner [`ProvideCredentials`] implementation.
///
/// Credentials are loaded lazily on first use and refreshed when a call arrives within
/// `buffer_time` of the expiry (10 seconds by default). Concurrent callers that observe
/// an expired cache coalesce onto a single in-flight load and all receive its result.
/// Credentials without an expiry are assumed valid for `default_credential_expiration`
/// (15 minutes by default) from the time they were loaded.
///
/// For example, the inner provider can call AWS STS's AssumeRole operation to get
/// temporary credentials, and `LazyCachingCredentialsProvider` will cache those
/// credentials until they are about to expire.
#[derive(Debug)]
pub struct LazyCachingCredentialsProvider {
    time: TimeSource,
    cache: ExpiringCache<crate::Credentials, CredentialsError>,
    loader: Arc<dyn ProvideCredentials>,
    load_timeout: Duration,
    default_credential_expiration: Duration,
}

impl LazyCachingCredentialsProvider {
    fn new(
        time: TimeSource,
        loader: Arc<dyn ProvideCredentials>,
        load_timeout: Duration,
        buffer_time: Duration,
        default_credential_expiration: Duration,
    ) -> Self {
        LazyCachingCredentialsProvider {
            time,
            cache: ExpiringCache::new(buffer_time),
            loader,
            load_timeout,
            default_credential_expiration,
        }
    }

    /// Returns a new `Builder` that can be used to construct the `LazyCachingCredentialsProvider`.
    pub fn builder() -> builder::Builder {
        builder::Builder::new()
    }

    async fn credentials(&self) -> crate::provider::Result {
        let now = self.time.now();
        let loader = self.loader.clone();
        let timeout = self.load_timeout;
        let default_expiration = self.default_credential_expiration;
        let time = self.time.clone();
        self.cache
            .get_or_load(now, || {
                let span = tracing::info_span!("lazy_load_credentials");
                async move {
                    let credentials =
                        tokio::time::timeout(timeout, loader.provide_credentials())
                            .await
                            .map_err(|_| CredentialsError::ProviderTimedOut(timeout))??;
                    let expiry = credentials
                        .expiry()
                        .unwrap_or_else(|| time.now() + default_expiration);
                    Ok((credentials, expiry))
                }
                .instrument(span)
            })
            .await
    }
}

impl ProvideCredentials for LazyCachingCredentialsProvider {
    fn provide_credentials<'a>(&'a self) -> future::ProvideCredentials<'a>
    where
        Self: 'a,
    {
        future::ProvideCredentials::new(self.credentials())
    }
}

pub mod builder {
    //! Builder for [`LazyCachingCredentialsProvider`]

    use super::{
        LazyCachingCredentialsProvider, DEFAULT_BUFFER_TIME, DEFAULT_CREDENTIAL_EXPIRATION,
        DEFAULT_LOAD_TIMEOUT,
    };
    use crate::provider::ProvideCredentials;
    use crate::time_source::TimeSource;
    use std::sync::Arc;
    use std::time::Duration;

    /// Builder for constructing a [`LazyCachingCredentialsProvider`].
    ///
    /// # Example
    ///
    /// ```
    /// use aws_auth::Credentials;
    /// use aws_auth::meta::credentials::{provide_credentials_fn, LazyCachingCredentialsProvider};
    /// use std::time::Duration;
    ///
    /// let provider = LazyCachingCredentialsProvider::builder()
    ///     .load(provide_credentials_fn(|| async {
    ///         // An async process to retrieve credentials would go here:
    ///         Ok(Credentials::from_keys("example", "example", None))
    ///     }))
    ///     .load_timeout(Duration::from_secs(30))
    ///     .build();
    /// ```
    #[derive(Default)]
    pub struct Builder {
        time: Option<TimeSource>,
        loader: Option<Arc<dyn ProvideCredentials>>,
        load_timeout: Option<Duration>,
        buffer_time: Option<Duration>,
        default_credential_expiration: Option<Duration>,
    }

    impl Builder {
        /// Create a new builder
        pub fn new() -> Self {
            Default::default()
        }

        /// An implementation of [`ProvideCredentials`] that will be used to load
        /// the cached credentials once they're expired.
        pub fn load(mut self, loader: impl ProvideCredentials + 'static) -> Self {
            self.loader = Some(Arc::new(loader));
            self
        }

        /// (Optional) Override the time source used to check expiry.
        ///
        /// This method is intended for tests that control time manually.
        pub fn time_source(mut self, time: TimeSource) -> Self {
            self.time = Some(time);
            self
        }

        /// (Optional) Timeout for the inner provider. Defaults to 5 seconds.
        pub fn load_timeout(mut self, timeout: Duration) -> Self {
            self.load_timeout = Some(timeout);
            self
        }

        /// (Optional) Amount of time before the actual credential expiration
        /// where the credentials are considered expired and reloaded.
        /// Defaults to 10 seconds.
        pub fn buffer_time(mut self, buffer_time: Duration) -> Self {
            self.buffer_time = Some(buffer_time);
            self
        }

        /// (Optional) Default expiration time to assume for credentials that don't
        /// have one. This is only used when the inner [`ProvideCredentials`] returns
        /// [`Credentials`](crate::Credentials) without an `expiry` set.
        /// Must be at least 15 minutes.
        pub fn default_credential_expiration(mut self, duration: Duration) -> Self {
            self.default_credential_expiration = Some(duration);
            self
        }

        /// Creates the [`LazyCachingCredentialsProvider`].
        pub fn build(self) -> LazyCachingCredentialsProvider {
            let default_credential_expiration = self
                .default_credential_expiration
                .unwrap_or(DEFAULT_CREDENTIAL_EXPIRATION);
            assert!(
                default_credential_expiration >= DEFAULT_CREDENTIAL_EXPIRATION,
                "default_credential_expiration must be at least 15 minutes"
            );
            LazyCachingCredentialsProvider::new(
                self.time.unwrap_or_default(),
                self.loader.expect("load provider is required"),
                self.load_timeout.unwrap_or(DEFAULT_LOAD_TIMEOUT),
                self.buffer_time.unwrap_or(DEFAULT_BUFFER_TIME),
                default_credential_expiration,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::LazyCachingCredentialsProvider;
    use crate::meta::credentials::provide_credentials_fn;
    use crate::provider::{CredentialsError, ProvideCredentials};
    use crate::time_source::TimeSource;
    use crate::Credentials;
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    fn epoch_secs(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn credentials(expired_secs: u64) -> Credentials {
        Credentials::new("test", "test", None, Some(epoch_secs(expired_secs)), "test")
    }

    fn test_provider(
        time: TimeSource,
        load_list: Vec<crate::provider::Result>,
    ) -> LazyCachingCredentialsProvider {
        let load_list = Arc::new(Mutex::new(load_list));
        LazyCachingCredentialsProvider::builder()
            .time_source(time)
            .load(provide_credentials_fn(move || {
                let list = load_list.clone();
                async move {
                    let next = list.lock().unwrap().remove(0);
                    tracing::info!("refreshing the credentials to {:?}", next);
                    next
                }
            }))
            .build()
    }

    async fn expect_creds(expired_secs: u64, provider: &LazyCachingCredentialsProvider) {
        let creds = provider
            .provide_credentials()
            .await
            .expect("expected credentials");
        assert_eq!(Some(epoch_secs(expired_secs)), creds.expiry());
    }

    #[tokio::test]
    async fn initial_populate_credentials() {
        let (time, _handle) = TimeSource::manual(epoch_secs(100));
        let provider = test_provider(time, vec![Ok(credentials(1000))]);
        expect_creds(1000, &provider).await;
    }

    #[tokio::test]
    async fn reload_expired_credentials() {
        let (time, handle) = TimeSource::manual(epoch_secs(100));
        let provider = test_provider(
            time,
            vec![
                Ok(credentials(1000)),
                Ok(credentials(2000)),
                Ok(credentials(3000)),
            ],
        );
        expect_creds(1000, &provider).await;
        expect_creds(1000, &provider).await;
        handle.set_time(epoch_secs(1500));
        expect_creds(2000, &provider).await;
        expect_creds(2000, &provider).await;
        handle.set_time(epoch_secs(2500));
        expect_creds(3000, &provider).await;
        expect_creds(3000, &provider).await;
    }

    #[tokio::test]
    async fn reload_inside_buffer_window() {
        let (time, handle) = TimeSource::manual(epoch_secs(100));
        let provider = test_provider(
            time,
            vec![Ok(credentials(1000)), Ok(credentials(2000))],
        );
        expect_creds(1000, &provider).await;
        // 995 + 10s buffer reaches past the expiry at 1000
        handle.set_time(epoch_secs(995));
        expect_creds(2000, &provider).await;
    }

    #[tokio::test]
    async fn load_failed_error() {
        let (time, handle) = TimeSource::manual(epoch_secs(100));
        let provider = test_provider(
            time,
            vec![Ok(credentials(1000)), Err(CredentialsError::not_loaded())],
        );
        expect_creds(1000, &provider).await;
        handle.set_time(epoch_secs(1500));
        assert!(provider.provide_credentials().await.is_err());
    }

    #[tokio::test]
    async fn credentials_without_expiry_get_the_default_lifetime() {
        let (time, handle) = TimeSource::manual(epoch_secs(0));
        let provider = test_provider(
            time,
            vec![
                Ok(Credentials::from_keys("akid", "secret", None)),
                Ok(credentials(10_000)),
            ],
        );
        let creds = provider.provide_credentials().await.expect("creds");
        assert_eq!(creds.expiry(), None);
        // within the synthetic 15 minute lifetime: no reload
        handle.set_time(epoch_secs(60));
        provider.provide_credentials().await.expect("cached");
        // past it: the second result is served
        handle.set_time(epoch_secs(15 * 60 + 1));
        expect_creds(10_000, &provider).await;
    }
}

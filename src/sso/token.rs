/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! SSO bearer token provider
//!
//! Resolves the access token for an `sso-session`, refreshing it through SSO-OIDC
//! `CreateToken` when the cached token nears expiry and the cached device registration
//! allows it. Refreshed tokens are written back to the on-disk cache on a best-effort
//! basis; the login flow owns the file, this provider only keeps it current.

use crate::os_shim::{Env, Fs, Props};
use crate::provider::token::{self, future, ProvideToken, TokenError};
use crate::provider_config::ProviderConfig;
use crate::region::Region;
use crate::sso::api::{CreateToken, CreateTokenRequest};
use crate::sso::cache::{load_cached_token, save_cached_token, CachedSsoToken};
use crate::time_source::TimeSource;
use crate::{ExpiringCache, Token};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::Instrument;

/// Refresh buffer for SSO tokens. Deliberately much wider than the 10 second default
/// used by the general credentials cache: a refresh costs a network round trip and the
/// token is shared with every other tool reading the same cache file.
const REFRESH_BUFFER: Duration = Duration::from_secs(60 * 5);

/// Token provider for an `sso-session`
///
/// Concurrent [`provide_token`](ProvideToken::provide_token) calls are coalesced: at
/// most one cache read / refresh is in flight per provider instance, and every caller
/// observes its outcome.
#[derive(Debug)]
pub struct SsoTokenProvider {
    inner: Arc<Inner>,
    cache: ExpiringCache<Token, TokenError>,
}

#[derive(Debug)]
struct Inner {
    session_name: String,
    region: Region,
    client: Option<Arc<dyn CreateToken>>,
    env: Env,
    fs: Fs,
    props: Props,
    time_source: TimeSource,
}

impl SsoTokenProvider {
    /// Builder for [`SsoTokenProvider`]
    pub fn builder() -> Builder {
        Builder::default()
    }

    async fn token(&self) -> token::Result {
        let now = self.inner.time_source.now();
        let inner = self.inner.clone();
        self.cache
            .get_or_load(now, move || {
                async move {
                    let token = inner.resolve(now).await?;
                    let expiration = token
                        .expiration()
                        .expect("resolved SSO tokens always carry an expiration");
                    Ok((token, expiration))
                }
                .instrument(tracing::info_span!("load_sso_token"))
            })
            .await
    }
}

impl Inner {
    fn expired_error(&self) -> TokenError {
        TokenError::invalid_configuration(format!(
            "the SSO session `{}` has expired. To refresh it, run `aws sso login --sso-session {}`",
            self.session_name, self.session_name
        ))
    }

    fn as_token(cached: &CachedSsoToken) -> Token {
        Token::new(cached.access_token.as_str(), Some(cached.expires_at))
    }

    async fn resolve(&self, now: SystemTime) -> token::Result {
        let cached = load_cached_token(&self.session_name, &self.env, &self.fs, &self.props)
            .map_err(|err| {
                TokenError::invalid_configuration(format!(
                    "could not load a cached SSO token for the session `{}`. \
                     To log in, run `aws sso login --sso-session {}`: {}",
                    self.session_name, self.session_name, err
                ))
            })?;

        if now + REFRESH_BUFFER < cached.expires_at {
            return Ok(Self::as_token(&cached));
        }

        if let Some(refreshed) = self.try_refresh(&cached, now).await {
            match refreshed {
                Ok(refreshed) => {
                    if let Err(err) = save_cached_token(
                        &self.session_name,
                        &refreshed,
                        &self.env,
                        &self.fs,
                        &self.props,
                    ) {
                        // the refreshed token is still returned; only persistence failed
                        tracing::warn!(error = %err, "failed to persist the refreshed SSO token");
                    }
                    return Ok(Self::as_token(&refreshed));
                }
                Err(err) => {
                    if now >= cached.expires_at {
                        tracing::warn!(error = %err, "SSO token refresh failed and the cached token has expired");
                        return Err(self.expired_error());
                    }
                    tracing::warn!(error = %err, "SSO token refresh failed; using the still-valid cached token");
                    return Ok(Self::as_token(&cached));
                }
            }
        }

        // not refreshable: the cached token stands on its own until it expires
        if now >= cached.expires_at {
            return Err(self.expired_error());
        }
        Ok(Self::as_token(&cached))
    }

    /// Attempt a `CreateToken` refresh. Returns `None` when refresh is not possible.
    async fn try_refresh(
        &self,
        cached: &CachedSsoToken,
        now: SystemTime,
    ) -> Option<Result<CachedSsoToken, TokenError>> {
        if !cached.refreshable() {
            return None;
        }
        if let Some(registration_expiry) = cached.registration_expires_at {
            if now >= registration_expiry {
                tracing::debug!("the cached SSO device registration has expired; skipping refresh");
                return None;
            }
        }
        let client = match &self.client {
            Some(client) => client,
            None => {
                tracing::debug!("no OIDC client is configured; skipping SSO token refresh");
                return None;
            }
        };
        let request = CreateTokenRequest {
            client_id: cached.client_id.clone().expect("checked by refreshable()"),
            client_secret: cached
                .client_secret
                .as_ref()
                .expect("checked by refreshable()")
                .to_string(),
            refresh_token: cached
                .refresh_token
                .as_ref()
                .expect("checked by refreshable()")
                .to_string(),
            region: self.region.clone(),
        };
        tracing::debug!(session = %self.session_name, "refreshing the SSO access token");
        let result = client
            .create_token(request)
            .await
            .map(|created| {
                let mut refreshed = cached.clone();
                refreshed.access_token = created.access_token.into();
                refreshed.expires_at = now + created.expires_in;
                if let Some(rotated) = created.refresh_token {
                    refreshed.refresh_token = Some(rotated.into());
                }
                refreshed
            })
            .map_err(TokenError::provider_error);
        Some(result)
    }
}

impl ProvideToken for SsoTokenProvider {
    fn provide_token<'a>(&'a self) -> future::ProvideToken<'a>
    where
        Self: 'a,
    {
        future::ProvideToken::new(self.token())
    }
}

/// Builder for [`SsoTokenProvider`]
#[derive(Debug, Default)]
pub struct Builder {
    session_name: Option<String>,
    region: Option<Region>,
    client: Option<Arc<dyn CreateToken>>,
    provider_config: Option<ProviderConfig>,
}

impl Builder {
    /// Set the `sso-session` name whose cached token is resolved
    pub fn session_name(mut self, session_name: impl Into<String>) -> Self {
        self.session_name = Some(session_name.into());
        self
    }

    /// Set the region whose OIDC endpoint receives refresh calls
    pub fn region(mut self, region: Region) -> Self {
        self.region = Some(region);
        self
    }

    /// Set the OIDC client used to refresh tokens
    ///
    /// Without a client, near-expiry tokens are returned as-is until they expire.
    pub fn oidc_client(mut self, client: Arc<dyn CreateToken>) -> Self {
        self.client = Some(client);
        self
    }

    /// Override the configuration used for this provider
    pub fn configure(mut self, provider_config: &ProviderConfig) -> Self {
        self.provider_config = Some(provider_config.clone());
        self
    }

    /// Create the [`SsoTokenProvider`]
    ///
    /// # Panics
    /// A session name and a region must have been set.
    pub fn build(self) -> SsoTokenProvider {
        let config = self.provider_config.unwrap_or_default();
        SsoTokenProvider {
            inner: Arc::new(Inner {
                session_name: self.session_name.expect("a session name is required"),
                region: self
                    .region
                    .or_else(|| config.region())
                    .expect("a region is required to refresh SSO tokens"),
                client: self.client,
                env: config.env(),
                fs: config.fs(),
                props: config.props(),
                time_source: config.time_source(),
            }),
            cache: ExpiringCache::new(REFRESH_BUFFER),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::SsoTokenProvider;
    use crate::os_shim::{Env, Fs, Props};
    use crate::provider::token::{ProvideToken, TokenError};
    use crate::provider_config::ProviderConfig;
    use crate::region::Region;
    use crate::sso::api::{CreateToken, CreateTokenRequest, CreatedToken, SsoError};
    use crate::time_source::TimeSource;
    use crate::BoxFuture;
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    // sha1("my-session") = 9e28173066ce536e277c5fb355efd9c64f398167
    const CACHE_PATH: &str =
        "/home/user/.aws/sso/cache/9e28173066ce536e277c5fb355efd9c64f398167.json";

    #[derive(Debug)]
    struct FakeOidc {
        calls: AtomicUsize,
        result: fn() -> Result<CreatedToken, SsoError>,
        delay: Option<Duration>,
    }

    impl FakeOidc {
        fn new(result: fn() -> Result<CreatedToken, SsoError>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                result,
                delay: None,
            })
        }
    }

    impl CreateToken for FakeOidc {
        fn create_token(
            &self,
            _request: CreateTokenRequest,
        ) -> BoxFuture<'_, Result<CreatedToken, SsoError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                if let Some(delay) = self.delay {
                    tokio::time::sleep(delay).await;
                }
                (self.result)()
            })
        }
    }

    fn refreshed_token() -> Result<CreatedToken, SsoError> {
        Ok(CreatedToken {
            access_token: "refreshed-access-token".to_string(),
            expires_in: Duration::from_secs(3600),
            refresh_token: Some("rotated-refresh-token".to_string()),
        })
    }

    fn refresh_failure() -> Result<CreatedToken, SsoError> {
        Err(SsoError::Service {
            code: "InvalidGrantException".to_string(),
            message: "the refresh token has been revoked".to_string(),
        })
    }

    fn cache_file(expires_at: &str, refreshable: bool) -> Fs {
        let registration = if refreshable {
            r#",
                "refreshToken": "cached-refresh-token",
                "clientId": "client-id",
                "clientSecret": "client-secret""#
        } else {
            ""
        };
        let contents = format!(
            r#"{{
                "accessToken": "cached-access-token",
                "expiresAt": "{}"{}
            }}"#,
            expires_at, registration
        );
        let mut files = HashMap::new();
        files.insert(CACHE_PATH.to_string(), contents.into_bytes());
        Fs::from_map(files)
    }

    fn provider(fs: Fs, time: TimeSource, oidc: Option<Arc<FakeOidc>>) -> SsoTokenProvider {
        let config = ProviderConfig::default()
            .with_env(Env::from_slice(&[("HOME", "/home/user")]))
            .with_fs(fs)
            .with_time_source(time);
        let mut builder = SsoTokenProvider::builder()
            .session_name("my-session")
            .region(Region::new("us-east-1"))
            .configure(&config);
        if let Some(oidc) = oidc {
            builder = builder.oidc_client(oidc);
        }
        builder.build()
    }

    fn epoch(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    #[tokio::test]
    async fn fresh_token_is_returned_without_refresh() {
        let oidc = FakeOidc::new(refreshed_token);
        // 2021-01-01T00:00:00Z = 1609459200
        let (time, _handle) = TimeSource::manual(epoch(1609459200));
        let provider = provider(
            cache_file("2021-01-01T01:00:00Z", true),
            time,
            Some(oidc.clone()),
        );
        let token = provider.provide_token().await.expect("fresh");
        assert_eq!(token.as_str(), "cached-access-token");
        assert_eq!(oidc.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn near_expiry_token_is_refreshed_and_persisted() {
        let oidc = FakeOidc::new(refreshed_token);
        let (time, _handle) = TimeSource::manual(epoch(1609459200));
        let fs = cache_file("2021-01-01T00:02:00Z", true);
        let provider = provider(fs.clone(), time, Some(oidc.clone()));

        let token = provider.provide_token().await.expect("refreshed");
        assert_eq!(token.as_str(), "refreshed-access-token");
        assert_eq!(token.expiration(), Some(epoch(1609459200 + 3600)));
        assert_eq!(oidc.calls.load(Ordering::SeqCst), 1);

        let path = crate::sso::cache::cached_token_path("my-session", Path::new("/home/user"));
        let persisted = String::from_utf8(fs.read_to_end(path).unwrap()).unwrap();
        assert!(persisted.contains("refreshed-access-token"), "{}", persisted);
        assert!(persisted.contains("rotated-refresh-token"), "{}", persisted);
    }

    #[tokio::test]
    async fn failed_refresh_falls_back_to_the_still_valid_token() {
        let oidc = FakeOidc::new(refresh_failure);
        let (time, _handle) = TimeSource::manual(epoch(1609459200));
        // inside the 5 minute buffer, but not yet expired
        let provider = provider(
            cache_file("2021-01-01T00:02:00Z", true),
            time,
            Some(oidc.clone()),
        );
        let token = provider.provide_token().await.expect("stale fallback");
        assert_eq!(token.as_str(), "cached-access-token");
        assert_eq!(oidc.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_refresh_of_an_expired_token_is_an_error() {
        let oidc = FakeOidc::new(refresh_failure);
        let (time, _handle) = TimeSource::manual(epoch(1609459200));
        let provider = provider(
            cache_file("2020-12-31T23:00:00Z", true),
            time,
            Some(oidc),
        );
        let err = provider.provide_token().await.expect_err("hard expiry");
        assert!(matches!(err, TokenError::InvalidConfiguration(_)));
        assert!(format!("{}", err).contains("aws sso login"), "{}", err);
    }

    #[tokio::test]
    async fn expired_token_without_registration_is_an_error() {
        let (time, _handle) = TimeSource::manual(epoch(1609459200));
        let provider = provider(cache_file("2020-12-31T23:00:00Z", false), time, None);
        let err = provider.provide_token().await.expect_err("hard expiry");
        assert!(matches!(err, TokenError::InvalidConfiguration(_)));
    }

    #[tokio::test]
    async fn near_expiry_token_without_registration_is_returned_until_it_expires() {
        let (time, _handle) = TimeSource::manual(epoch(1609459200));
        let provider = provider(cache_file("2021-01-01T00:02:00Z", false), time, None);
        let token = provider.provide_token().await.expect("still valid");
        assert_eq!(token.as_str(), "cached-access-token");
    }

    #[tokio::test]
    async fn missing_cache_file_names_the_login_command() {
        let (time, _handle) = TimeSource::manual(epoch(1609459200));
        let provider = provider(Fs::from_map(HashMap::new()), time, None);
        let err = provider.provide_token().await.expect_err("no cache file");
        assert!(matches!(err, TokenError::InvalidConfiguration(_)));
        assert!(
            format!("{}", err).contains("aws sso login --sso-session my-session"),
            "{}",
            err
        );
    }

    #[tokio::test]
    async fn concurrent_calls_coalesce_into_one_refresh() {
        let oidc = Arc::new(FakeOidc {
            calls: AtomicUsize::new(0),
            result: refreshed_token,
            delay: Some(Duration::from_millis(50)),
        });
        let (time, _handle) = TimeSource::manual(epoch(1609459200));
        let provider = Arc::new(provider(
            cache_file("2021-01-01T00:02:00Z", true),
            time,
            Some(oidc.clone()),
        ));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let provider = provider.clone();
            handles.push(tokio::spawn(
                async move { provider.provide_token().await },
            ));
        }
        for result in futures_util::future::join_all(handles).await {
            let token = result.unwrap().expect("refreshed");
            assert_eq!(token.as_str(), "refreshed-access-token");
        }
        assert_eq!(oidc.calls.load(Ordering::SeqCst), 1);
    }
}

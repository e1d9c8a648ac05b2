/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! SSO credentials provider
//!
//! Exchanges a cached SSO access token for per-role credentials via `GetRoleCredentials`.
//! The token comes either from an [`SsoTokenProvider`] (for `sso-session` configuration,
//! with refresh) or directly from the on-disk cache keyed by the start URL (legacy
//! configuration, no refresh).

use crate::os_shim::{Env, Fs, Props};
use crate::provider::{self, future, CredentialsError, ProvideCredentials};
use crate::provider::token::ProvideToken;
use crate::provider_config::ProviderConfig;
use crate::region::Region;
use crate::sso::api::{GetRoleCredentials, RoleCredentialsRequest};
use crate::sso::cache::load_cached_token;
use crate::sso::SsoTokenProvider;
use crate::time_source::TimeSource;
use crate::{Credentials, Token};

use std::sync::Arc;

/// SSO credentials provider
///
/// _Note: this provider is usually constructed by the profile file provider from
/// `sso_*` keys; direct construction is mostly useful for tests._
#[derive(Debug)]
pub struct SsoCredentialsProvider {
    client: Arc<dyn GetRoleCredentials>,
    token_provider: Option<SsoTokenProvider>,
    start_url: String,
    region: Region,
    account_id: String,
    role_name: String,
    env: Env,
    fs: Fs,
    props: Props,
    time_source: TimeSource,
}

impl SsoCredentialsProvider {
    /// Builder for [`SsoCredentialsProvider`]
    pub fn builder() -> Builder {
        Builder::default()
    }

    /// Legacy token resolution: read the cache file keyed by the start URL, no refresh
    fn legacy_token(&self) -> Result<Token, CredentialsError> {
        let cached = load_cached_token(&self.start_url, &self.env, &self.fs, &self.props)
            .map_err(|err| {
                CredentialsError::invalid_configuration(format!(
                    "could not load a cached SSO token for `{}`. \
                     To log in, run `aws sso login`: {}",
                    self.start_url, err
                ))
            })?;
        if self.time_source.now() >= cached.expires_at {
            return Err(CredentialsError::invalid_configuration(format!(
                "the SSO session for `{}` has expired. To refresh it, run `aws sso login`",
                self.start_url
            )));
        }
        Ok(Token::new(
            cached.access_token.as_str(),
            Some(cached.expires_at),
        ))
    }

    async fn credentials(&self) -> provider::Result {
        let token = match &self.token_provider {
            Some(provider) => provider.provide_token().await?,
            None => self.legacy_token()?,
        };
        let request = RoleCredentialsRequest {
            access_token: token.as_str().to_string(),
            account_id: self.account_id.clone(),
            role_name: self.role_name.clone(),
            region: self.region.clone(),
        };
        tracing::debug!(account_id = %self.account_id, role_name = %self.role_name, "fetching SSO role credentials");
        let role_credentials = self
            .client
            .get_role_credentials(request)
            .await
            .map_err(CredentialsError::provider_error)?;
        Ok(Credentials::new(
            role_credentials.access_key_id,
            role_credentials.secret_access_key,
            Some(role_credentials.session_token),
            Some(role_credentials.expiration),
            "Sso",
        ))
    }
}

impl ProvideCredentials for SsoCredentialsProvider {
    fn provide_credentials<'a>(&'a self) -> future::ProvideCredentials<'a>
    where
        Self: 'a,
    {
        future::ProvideCredentials::new(self.credentials())
    }
}

/// Builder for [`SsoCredentialsProvider`]
#[derive(Debug, Default)]
pub struct Builder {
    start_url: Option<String>,
    region: Option<Region>,
    account_id: Option<String>,
    role_name: Option<String>,
    client: Option<Arc<dyn GetRoleCredentials>>,
    token_provider: Option<SsoTokenProvider>,
    provider_config: Option<ProviderConfig>,
}

impl Builder {
    /// Set the start URL, which keys the legacy token cache
    pub fn start_url(mut self, start_url: impl Into<String>) -> Self {
        self.start_url = Some(start_url.into());
        self
    }

    /// Set the region whose SSO endpoint receives the call
    pub fn region(mut self, region: Region) -> Self {
        self.region = Some(region);
        self
    }

    /// Set the AWS account to fetch role credentials for
    pub fn account_id(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = Some(account_id.into());
        self
    }

    /// Set the permission-set role name
    pub fn role_name(mut self, role_name: impl Into<String>) -> Self {
        self.role_name = Some(role_name.into());
        self
    }

    /// Set the SSO client used to make the `GetRoleCredentials` call
    pub fn sso_client(mut self, client: Arc<dyn GetRoleCredentials>) -> Self {
        self.client = Some(client);
        self
    }

    /// Use a refreshing token provider instead of the legacy start-URL cache read
    pub fn token_provider(mut self, token_provider: SsoTokenProvider) -> Self {
        self.token_provider = Some(token_provider);
        self
    }

    /// Override the configuration used for this provider
    pub fn configure(mut self, provider_config: &ProviderConfig) -> Self {
        self.provider_config = Some(provider_config.clone());
        self
    }

    /// Create the [`SsoCredentialsProvider`]
    ///
    /// # Panics
    /// An SSO client, start URL, region, account id, and role name are all required.
    pub fn build(self) -> SsoCredentialsProvider {
        let config = self.provider_config.unwrap_or_default();
        SsoCredentialsProvider {
            client: self.client.expect("an SSO client is required"),
            token_provider: self.token_provider,
            start_url: self.start_url.expect("a start URL is required"),
            region: self
                .region
                .or_else(|| config.region())
                .expect("an SSO region is required"),
            account_id: self.account_id.expect("an account id is required"),
            role_name: self.role_name.expect("a role name is required"),
            env: config.env(),
            fs: config.fs(),
            props: config.props(),
            time_source: config.time_source(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::SsoCredentialsProvider;
    use crate::os_shim::{Env, Fs};
    use crate::provider::{CredentialsError, ProvideCredentials};
    use crate::provider_config::ProviderConfig;
    use crate::region::Region;
    use crate::sso::api::{
        GetRoleCredentials, RoleCredentials, RoleCredentialsRequest, SsoError,
    };
    use crate::time_source::TimeSource;
    use crate::BoxFuture;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, UNIX_EPOCH};

    // sha1("https://d-92671207e4.awsapps.com/start") = 13f9d35043871d073ab260e020f0ffde092cb14b
    const START_URL: &str = "https://d-92671207e4.awsapps.com/start";
    const CACHE_PATH: &str =
        "/home/user/.aws/sso/cache/13f9d35043871d073ab260e020f0ffde092cb14b.json";

    #[derive(Debug, Default)]
    struct FakeSso {
        requests: Mutex<Vec<RoleCredentialsRequest>>,
    }

    impl GetRoleCredentials for FakeSso {
        fn get_role_credentials(
            &self,
            request: RoleCredentialsRequest,
        ) -> BoxFuture<'_, Result<RoleCredentials, SsoError>> {
            self.requests.lock().unwrap().push(request);
            Box::pin(async move {
                Ok(RoleCredentials {
                    access_key_id: "sso-akid".into(),
                    secret_access_key: "sso-secret".into(),
                    session_token: "sso-token".into(),
                    expiration: UNIX_EPOCH + Duration::from_secs(4_000_000_000),
                })
            })
        }
    }

    fn cache_fs(expires_at: &str) -> Fs {
        let mut files = HashMap::new();
        files.insert(
            CACHE_PATH.to_string(),
            format!(
                r#"{{"accessToken": "cached-access-token", "expiresAt": "{}"}}"#,
                expires_at
            )
            .into_bytes(),
        );
        Fs::from_map(files)
    }

    fn provider(fs: Fs, sso: Arc<FakeSso>) -> SsoCredentialsProvider {
        // 2021-01-01T00:00:00Z = 1609459200
        let (time, _handle) = TimeSource::manual(UNIX_EPOCH + Duration::from_secs(1609459200));
        let config = ProviderConfig::default()
            .with_env(Env::from_slice(&[("HOME", "/home/user")]))
            .with_fs(fs)
            .with_time_source(time);
        SsoCredentialsProvider::builder()
            .start_url(START_URL)
            .region(Region::new("us-east-1"))
            .account_id("123456789012")
            .role_name("ReadOnly")
            .sso_client(sso)
            .configure(&config)
            .build()
    }

    #[tokio::test]
    async fn exchanges_cached_token_for_role_credentials() {
        let sso = Arc::new(FakeSso::default());
        let provider = provider(cache_fs("2021-06-01T00:00:00Z"), sso.clone());
        let creds = provider.provide_credentials().await.expect("resolved");
        assert_eq!(creds.access_key_id(), "sso-akid");
        assert_eq!(creds.provider_name(), "Sso");

        let requests = sso.requests.lock().unwrap();
        assert_eq!(requests[0].access_token, "cached-access-token");
        assert_eq!(requests[0].account_id, "123456789012");
        assert_eq!(requests[0].role_name, "ReadOnly");
    }

    #[tokio::test]
    async fn missing_cache_file_names_the_login_command() {
        let sso = Arc::new(FakeSso::default());
        let provider = provider(Fs::from_map(HashMap::new()), sso.clone());
        let err = provider.provide_credentials().await.expect_err("no cache");
        assert!(matches!(err, CredentialsError::InvalidConfiguration(_)));
        assert!(format!("{}", err).contains("aws sso login"), "{}", err);
        assert!(sso.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn expired_cached_token_is_a_configuration_error() {
        let sso = Arc::new(FakeSso::default());
        let provider = provider(cache_fs("2020-01-01T00:00:00Z"), sso.clone());
        let err = provider.provide_credentials().await.expect_err("expired");
        assert!(matches!(err, CredentialsError::InvalidConfiguration(_)));
        assert!(format!("{}", err).contains("aws sso login"), "{}", err);
        assert!(sso.requests.lock().unwrap().is_empty());
    }
}

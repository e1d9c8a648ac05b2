/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! The default credentials chain

use crate::environment::EnvironmentVariableCredentialsProvider;
use crate::meta::credentials::{lazy_caching, CredentialsProviderChain, LazyCachingCredentialsProvider};
use crate::profile;
use crate::properties::SystemPropertiesCredentialsProvider;
use crate::provider::{future, ProvideCredentials};
use crate::provider_config::ProviderConfig;
use crate::region::Region;
use crate::sso::api::{CreateToken, GetRoleCredentials};
use crate::sts::api::AssumeRoles;
use std::borrow::Cow;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

/// Default AWS credentials provider chain
///
/// Resolution order:
/// 1. System properties: `aws.accessKeyId` / `aws.secretAccessKey`
/// 2. Environment variables: `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY`
/// 3. Web identity token: `AWS_WEB_IDENTITY_TOKEN_FILE` exchanged with STS
///    (only when an STS client is configured)
/// 4. Shared config (`~/.aws/config`, `~/.aws/credentials`): [`ProfileFileCredentialsProvider`]
/// 5. ECS container credentials endpoint (only when a metadata connector is configured)
/// 6. EC2 instance metadata service (only when a metadata connector is configured)
///
/// The entire chain is wrapped in a [`LazyCachingCredentialsProvider`]: resolved
/// credentials are reused until they are within the buffer window of expiry, and
/// concurrent callers share a single in-flight resolution. A provider that fails,
/// whatever the error, simply yields to the next link; only when the whole chain is
/// exhausted does the call fail, with an error naming every attempted provider.
///
/// [`ProfileFileCredentialsProvider`]: crate::profile::ProfileFileCredentialsProvider
#[derive(Debug)]
pub struct DefaultCredentialsChain(LazyCachingCredentialsProvider);

impl DefaultCredentialsChain {
    /// Builder for [`DefaultCredentialsChain`]
    pub fn builder() -> Builder {
        Builder::default()
    }
}

impl ProvideCredentials for DefaultCredentialsChain {
    fn provide_credentials<'a>(&'a self) -> future::ProvideCredentials<'a>
    where
        Self: 'a,
    {
        self.0.provide_credentials()
    }
}

/// Builder for [`DefaultCredentialsChain`]
#[derive(Default)]
pub struct Builder {
    profile_file_builder: profile::credentials::Builder,
    credential_cache: lazy_caching::builder::Builder,
    provider_config: Option<ProviderConfig>,
    region: Option<Region>,
    sts_client: Option<Arc<dyn AssumeRoles>>,
    sso_client: Option<Arc<dyn GetRoleCredentials>>,
    oidc_client: Option<Arc<dyn CreateToken>>,
}

impl Debug for Builder {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builder")
            .field("profile_file_builder", &self.profile_file_builder)
            .field("region", &self.region)
            .finish()
    }
}

impl Builder {
    /// Override the configuration used for every provider in the chain
    pub fn configure(mut self, provider_config: &ProviderConfig) -> Self {
        self.provider_config = Some(provider_config.clone());
        self
    }

    /// Set the region used by the STS-backed links of the chain
    pub fn region(mut self, region: Region) -> Self {
        self.region = Some(region);
        self
    }

    /// Override the selected profile, ignoring `AWS_PROFILE` and `aws.profile`
    pub fn profile_name(mut self, name: impl Into<String>) -> Self {
        self.profile_file_builder = self.profile_file_builder.profile_name(name);
        self
    }

    /// Override the files loaded as profile sources
    pub fn profile_files(mut self, profile_files: profile::profile_file::ProfileFiles) -> Self {
        self.profile_file_builder = self.profile_file_builder.profile_files(profile_files);
        self
    }

    /// Register a custom provider usable as a `credential_source` in a profile
    pub fn with_custom_credential_source(
        mut self,
        name: impl Into<Cow<'static, str>>,
        provider: impl ProvideCredentials + 'static,
    ) -> Self {
        self.profile_file_builder = self.profile_file_builder.with_custom_provider(name, provider);
        self
    }

    /// Set the STS client used for web identity tokens and profile role chains
    pub fn sts_client(mut self, client: Arc<dyn AssumeRoles>) -> Self {
        self.sts_client = Some(client);
        self
    }

    /// Set the SSO client used for `sso_*` profile settings
    pub fn sso_client(mut self, client: Arc<dyn GetRoleCredentials>) -> Self {
        self.sso_client = Some(client);
        self
    }

    /// Set the OIDC client used to refresh `sso-session` tokens
    pub fn oidc_client(mut self, client: Arc<dyn CreateToken>) -> Self {
        self.oidc_client = Some(client);
        self
    }

    /// Amount of time before credential expiry where cached credentials
    /// are considered expired and the chain is re-run. Defaults to 10 seconds.
    pub fn buffer_time(mut self, buffer_time: std::time::Duration) -> Self {
        self.credential_cache = self.credential_cache.buffer_time(buffer_time);
        self
    }

    /// Timeout for a single run of the chain. Defaults to 5 seconds.
    pub fn load_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.credential_cache = self.credential_cache.load_timeout(timeout);
        self
    }

    /// Create the [`DefaultCredentialsChain`]
    pub fn build(self) -> DefaultCredentialsChain {
        let mut config = self.provider_config.unwrap_or_default();
        if self.region.is_some() {
            config = config.with_region(self.region);
        }

        let mut profile_builder = self.profile_file_builder.configure(&config);
        if let Some(sts_client) = self.sts_client.clone() {
            profile_builder = profile_builder.sts_client(sts_client);
        }
        if let Some(sso_client) = self.sso_client {
            profile_builder = profile_builder.sso_client(sso_client);
        }
        if let Some(oidc_client) = self.oidc_client {
            profile_builder = profile_builder.oidc_client(oidc_client);
        }

        let mut chain = CredentialsProviderChain::first_try(
            "SystemProperties",
            SystemPropertiesCredentialsProvider::new(config.props()),
        )
        .or_else(
            "Environment",
            EnvironmentVariableCredentialsProvider::new_with_env(config.env()),
        );
        if let Some(sts_client) = self.sts_client {
            chain = chain.or_else(
                "WebIdentityToken",
                crate::sts::WebIdentityTokenCredentialsProvider::builder()
                    .sts_client(sts_client)
                    .configure(&config)
                    .build(),
            );
        }
        chain = chain.or_else("Profile", profile_builder.build());
        if config.connector().is_some() {
            chain = chain
                .or_else(
                    "EcsContainer",
                    crate::ecs::EcsCredentialsProvider::builder()
                        .configure(&config)
                        .build(),
                )
                .or_else(
                    "Ec2InstanceMetadata",
                    crate::imds::ImdsCredentialsProvider::builder()
                        .configure(&config)
                        .build(),
                );
        }

        let cached = self
            .credential_cache
            .time_source(config.time_source())
            .load(chain)
            .build();
        DefaultCredentialsChain(cached)
    }
}

/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Turn an abstract [`ProfileChain`](super::repr::ProfileChain) into runnable providers

use super::repr::{BaseProvider, ProfileChain};
use super::ProfileFileError;
use crate::process::CredentialProcessProvider;
use crate::provider::{self, ProvideCredentials};
use crate::provider_config::ProviderConfig;
use crate::region::Region;
use crate::sso::api::{CreateToken, GetRoleCredentials};
use crate::sso::{SsoCredentialsProvider, SsoTokenProvider};
use crate::sts::api::AssumeRoles;
use crate::sts::AssumeRoleProvider;
use crate::Credentials;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

/// API clients shared by every provider a profile chain can declare
#[derive(Clone, Debug, Default)]
pub(super) struct ClientConfiguration {
    pub(super) sts_client: Option<Arc<dyn AssumeRoles>>,
    pub(super) sso_client: Option<Arc<dyn GetRoleCredentials>>,
    pub(super) oidc_client: Option<Arc<dyn CreateToken>>,
    pub(super) region: Option<Region>,
}

/// Providers that can be referenced with `credential_source`
///
/// Lookup is case-insensitive: `environment` and `Environment` name the same provider.
pub(super) struct NamedProviderFactory {
    providers: HashMap<Cow<'static, str>, Arc<dyn ProvideCredentials>>,
}

fn lower_cow(s: Cow<'static, str>) -> Cow<'static, str> {
    if s.chars().all(|c| c.is_ascii_lowercase()) {
        s
    } else {
        Cow::Owned(s.to_ascii_lowercase())
    }
}

impl NamedProviderFactory {
    pub(super) fn new(
        providers: HashMap<Cow<'static, str>, Arc<dyn ProvideCredentials>>,
    ) -> Self {
        let providers = providers
            .into_iter()
            .map(|(k, v)| (lower_cow(k), v))
            .collect();
        NamedProviderFactory { providers }
    }

    pub(super) fn provider(&self, name: &str) -> Option<Arc<dyn ProvideCredentials>> {
        self.providers.get(name.to_ascii_lowercase().as_str()).cloned()
    }
}

impl Debug for NamedProviderFactory {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedProviderFactory")
            .field("providers", &self.providers.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// One `role_arn` link of a profile chain, ready to execute
#[derive(Debug)]
pub(super) struct RoleProvider {
    role_arn: String,
    external_id: Option<String>,
    session_name: Option<String>,
    client: Arc<dyn AssumeRoles>,
    region: Option<Region>,
    provider_config: ProviderConfig,
}

impl RoleProvider {
    /// Assume this link's role using `input` for authentication
    pub(super) async fn credentials(&self, input: Credentials) -> provider::Result {
        let mut builder = AssumeRoleProvider::builder(&self.role_arn)
            .sts_client(self.client.clone())
            .configure(&self.provider_config);
        if let Some(external_id) = &self.external_id {
            builder = builder.external_id(external_id);
        }
        if let Some(session_name) = &self.session_name {
            builder = builder.session_name(session_name);
        }
        if let Some(region) = self.region.clone() {
            builder = builder.region(region);
        }
        builder.build(input).provide_credentials().await
    }
}

/// Runnable form of a profile chain: base provider plus role links in execution order
#[derive(Debug)]
pub(super) struct ProviderChain {
    base: Arc<dyn ProvideCredentials>,
    chain: Vec<RoleProvider>,
}

impl ProviderChain {
    pub(super) fn base(&self) -> &dyn ProvideCredentials {
        self.base.as_ref()
    }

    pub(super) fn chain(&self) -> &[RoleProvider] {
        self.chain.as_slice()
    }

    pub(super) fn from_repr(
        provider_config: &ProviderConfig,
        client_config: &ClientConfiguration,
        repr: ProfileChain<'_>,
        factory: &NamedProviderFactory,
    ) -> Result<Self, ProfileFileError> {
        let base = match repr.base {
            BaseProvider::NamedSource(name) => {
                factory
                    .provider(name)
                    .ok_or(ProfileFileError::UnknownProvider {
                        name: name.to_string(),
                    })?
            }
            BaseProvider::AccessKey {
                access_key_id,
                secret_access_key,
                session_token,
            } => Arc::new(Credentials::new(
                access_key_id,
                secret_access_key,
                session_token.map(ToString::to_string),
                None,
                "Profile",
            )) as Arc<dyn ProvideCredentials>,
            BaseProvider::CredentialProcess(command) => {
                Arc::new(CredentialProcessProvider::new(command.to_string()))
            }
            BaseProvider::WebIdentityTokenRole {
                role_arn,
                web_identity_token_file,
                session_name,
            } => {
                let sts_client = client_config.sts_client.clone().ok_or(
                    ProfileFileError::MissingClient {
                        client: "STS",
                        feature: "`web_identity_token_file` in a profile",
                    },
                )?;
                let mut builder = crate::sts::WebIdentityTokenCredentialsProvider::builder()
                    .role_arn(role_arn)
                    .token_file(web_identity_token_file)
                    .sts_client(sts_client)
                    .configure(provider_config);
                if let Some(session_name) = session_name {
                    builder = builder.session_name(session_name);
                }
                if let Some(region) = client_config.region.clone() {
                    builder = builder.region(region);
                }
                Arc::new(builder.build())
            }
            BaseProvider::Sso {
                sso_account_id,
                sso_region,
                sso_role_name,
                sso_start_url,
                sso_session_name,
            } => {
                let sso_client = client_config.sso_client.clone().ok_or(
                    ProfileFileError::MissingClient {
                        client: "SSO",
                        feature: "SSO configuration in a profile",
                    },
                )?;
                let mut builder = SsoCredentialsProvider::builder()
                    .start_url(sso_start_url)
                    .region(Region::new(sso_region.to_string()))
                    .account_id(sso_account_id)
                    .role_name(sso_role_name)
                    .sso_client(sso_client)
                    .configure(provider_config);
                if let Some(session_name) = sso_session_name {
                    let mut token_builder = SsoTokenProvider::builder()
                        .session_name(session_name)
                        .region(Region::new(sso_region.to_string()))
                        .configure(provider_config);
                    if let Some(oidc_client) = client_config.oidc_client.clone() {
                        token_builder = token_builder.oidc_client(oidc_client);
                    }
                    builder = builder.token_provider(token_builder.build());
                }
                Arc::new(builder.build())
            }
        };
        let chain = repr
            .chain
            .iter()
            .map(|role| {
                let client =
                    client_config
                        .sts_client
                        .clone()
                        .ok_or(ProfileFileError::MissingClient {
                            client: "STS",
                            feature: "`role_arn` in a profile",
                        })?;
                Ok(RoleProvider {
                    role_arn: role.role_arn.to_string(),
                    external_id: role.external_id.map(ToString::to_string),
                    session_name: role.session_name.map(ToString::to_string),
                    client,
                    region: client_config.region.clone(),
                    provider_config: provider_config.clone(),
                })
            })
            .collect::<Result<Vec<_>, ProfileFileError>>()?;
        Ok(ProviderChain { base, chain })
    }
}

/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Profile File Based Providers
//!
//! Profile file based providers combine two pieces:
//!
//! 1. Parsing and resolution of the assume role chain
//! 2. A user-modifiable hashmap of provider name to provider.
//!
//! The provider first determines the chain of providers the profile files declare.
//! After validating this chain, it runs the base provider and threads the resulting
//! credentials through each `role_arn` link in turn.
//!
//! This module contains two sub modules:
//! - `repr` contains an abstract representation of a provider chain and the logic to
//!   build it from `~/.aws/credentials` and `~/.aws/config`
//! - `exec` turns that representation into runnable providers

use crate::os_shim::{Env, Fs, Props};
use crate::profile::credentials::exec::{ClientConfiguration, NamedProviderFactory, ProviderChain};
use crate::profile::parser::{self, ProfileFileLoadError};
use crate::profile::profile_file::ProfileFiles;
use crate::provider::{self, future, CredentialsError, ProvideCredentials};
use crate::provider_config::ProviderConfig;
use crate::sso::api::{CreateToken, GetRoleCredentials};
use crate::sts::api::AssumeRoles;
use std::borrow::Cow;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{self, Debug, Display, Formatter};
use std::sync::Arc;
use tracing::Instrument;

mod exec;
mod repr;

/// AWS profile-based credentials provider
///
/// This provider loads credentials from `~/.aws/config` and `~/.aws/credentials`
/// (locations and contents overridable through [`ProfileFiles`]). It supports:
///
/// ### Credentials defined explicitly within the file
/// ```ini
/// [default]
/// aws_access_key_id = 123
/// aws_secret_access_key = 456
/// ```
///
/// ### Assume role credentials from a source profile
/// ```ini
/// [default]
/// role_arn = arn:aws:iam::123456789:role/RoleA
/// source_profile = base
///
/// [profile base]
/// aws_access_key_id = 123
/// aws_secret_access_key = 456
/// ```
///
/// ### Assume role credentials from a named credential source
/// ```ini
/// [default]
/// role_arn = arn:aws:iam::123456789:role/RoleA
/// credential_source = Environment
/// ```
///
/// `Environment`, `Ec2InstanceMetadata`, and `EcsContainer` are registered by default
/// (the latter two only when a metadata connector is configured); additional sources
/// can be registered with [`Builder::with_custom_provider`].
///
/// ### Credential processes, web identity tokens, and SSO
/// `credential_process`, `web_identity_token_file` + `role_arn`, and both legacy and
/// `sso-session`-style SSO configuration are supported; the latter three require the
/// corresponding API client to be set on the builder.
///
/// **Note:** this provider does not implement any caching. It will reload and reparse
/// the profile from the file system when called. See
/// [`LazyCachingCredentialsProvider`](crate::meta::credentials::LazyCachingCredentialsProvider)
/// for caching.
#[derive(Debug)]
pub struct ProfileFileCredentialsProvider {
    factory: NamedProviderFactory,
    client_config: ClientConfiguration,
    provider_config: ProviderConfig,
    profile_files: ProfileFiles,
    profile_override: Option<String>,
    fs: Fs,
    env: Env,
    props: Props,
}

impl ProfileFileCredentialsProvider {
    /// Builder for [`ProfileFileCredentialsProvider`]
    pub fn builder() -> Builder {
        Builder::default()
    }

    async fn load_credentials(&self) -> provider::Result {
        let chain = self.build_provider_chain().map_err(|err| match err {
            ProfileFileError::NoProfilesDefined
            | ProfileFileError::ProfileDidNotContainCredentials { .. } => {
                CredentialsError::not_loaded()
            }
            _ => CredentialsError::invalid_configuration(format!(
                "profile file provider could not be built: {}",
                err
            )),
        })?;
        let mut credentials = match chain
            .base()
            .provide_credentials()
            .instrument(tracing::info_span!("load_base_credentials"))
            .await
        {
            Ok(credentials) => {
                tracing::info!(creds = ?credentials, "loaded base credentials");
                credentials
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to load base credentials");
                return Err(CredentialsError::provider_error(err));
            }
        };
        for role in chain.chain() {
            let next = role
                .credentials(credentials)
                .instrument(tracing::info_span!("load_assume_role", provider = ?role))
                .await;
            match next {
                Ok(next) => {
                    tracing::info!(creds = ?next, "loaded assume role credentials");
                    credentials = next;
                }
                Err(err) => {
                    tracing::warn!(provider = ?role, error = %err, "failed to load assume role credentials");
                    return Err(CredentialsError::provider_error(err));
                }
            }
        }
        Ok(credentials)
    }

    fn build_provider_chain(&self) -> Result<ProviderChain, ProfileFileError> {
        let profile_set = parser::load(
            &self.fs,
            &self.env,
            &self.props,
            &self.profile_files,
            self.profile_override.as_deref(),
        )
        .map_err(|err| {
            tracing::warn!(error = %err, "failed to parse profile");
            ProfileFileError::CouldNotParseProfile(err)
        })?;
        let repr = repr::resolve_chain(&profile_set)?;
        tracing::info!(chain = ?repr, "constructed abstract provider from config file");
        ProviderChain::from_repr(&self.provider_config, &self.client_config, repr, &self.factory)
    }
}

impl ProvideCredentials for ProfileFileCredentialsProvider {
    fn provide_credentials<'a>(&'a self) -> future::ProvideCredentials<'a>
    where
        Self: 'a,
    {
        future::ProvideCredentials::new(self.load_credentials().instrument(
            tracing::info_span!("load_credentials", provider = "Profile"),
        ))
    }
}

/// An error encountered while resolving a provider chain from the profile files
#[derive(Debug)]
#[non_exhaustive]
pub enum ProfileFileError {
    /// The profile files could not be read or parsed
    CouldNotParseProfile(ProfileFileLoadError),

    /// No profiles were defined in the loaded files
    NoProfilesDefined,

    /// The selected profile defines no credential settings at all
    ProfileDidNotContainCredentials {
        /// The name of the selected profile
        profile: String,
    },

    /// The `source_profile` references formed a cycle
    CredentialLoop {
        /// Profiles that were visited, in order
        profiles: Vec<String>,
        /// The profile whose revisit closed the loop
        next: String,
    },

    /// A `role_arn` had neither `source_profile` nor `credential_source`
    MissingCredentialSource {
        /// The profile in question
        profile: String,
        /// What was wrong
        message: Cow<'static, str>,
    },

    /// The credential settings in a profile contradicted each other
    InvalidCredentialSource {
        /// The profile in question
        profile: String,
        /// What was wrong
        message: Cow<'static, str>,
    },

    /// A `source_profile` referenced a profile that was not defined
    MissingProfile {
        /// The missing profile name
        profile: String,
        /// What was being resolved
        message: Cow<'static, str>,
    },

    /// `credential_source` referenced a provider that is not registered
    UnknownProvider {
        /// The referenced name
        name: String,
    },

    /// A profile feature needs an API client that was not configured on the builder
    MissingClient {
        /// Which client is missing (for example `STS`)
        client: &'static str,
        /// The profile feature that needs it
        feature: &'static str,
    },
}

impl Display for ProfileFileError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ProfileFileError::CouldNotParseProfile(err) => {
                write!(f, "could not parse profile file: {}", err)
            }
            ProfileFileError::NoProfilesDefined => write!(f, "no profiles were defined"),
            ProfileFileError::ProfileDidNotContainCredentials { profile } => write!(
                f,
                "profile `{}` did not contain credential information",
                profile
            ),
            ProfileFileError::CredentialLoop { profiles, next } => write!(
                f,
                "profiles formed an infinite loop: first we loaded {:?}, then attempted to reload {}",
                profiles, next
            ),
            ProfileFileError::MissingCredentialSource { profile, message } => {
                write!(f, "missing credential source in `{}`: {}", profile, message)
            }
            ProfileFileError::InvalidCredentialSource { profile, message } => {
                write!(f, "invalid credential source in `{}`: {}", profile, message)
            }
            ProfileFileError::MissingProfile { profile, message } => {
                write!(f, "profile `{}` was not defined: {}", profile, message)
            }
            ProfileFileError::UnknownProvider { name } => write!(
                f,
                "profile referenced the `{}` provider but that provider is not registered",
                name
            ),
            ProfileFileError::MissingClient { client, feature } => write!(
                f,
                "{} requires an {} client, but none was configured on the builder",
                feature, client
            ),
        }
    }
}

impl Error for ProfileFileError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ProfileFileError::CouldNotParseProfile(err) => Some(err),
            _ => None,
        }
    }
}

/// Builder for [`ProfileFileCredentialsProvider`]
#[derive(Default)]
pub struct Builder {
    provider_config: Option<ProviderConfig>,
    profile_override: Option<String>,
    profile_files: Option<ProfileFiles>,
    custom_providers: HashMap<Cow<'static, str>, Arc<dyn ProvideCredentials>>,
    sts_client: Option<Arc<dyn AssumeRoles>>,
    sso_client: Option<Arc<dyn GetRoleCredentials>>,
    oidc_client: Option<Arc<dyn CreateToken>>,
}

impl Debug for Builder {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builder")
            .field("profile_override", &self.profile_override)
            .field(
                "custom_providers",
                &self.custom_providers.keys().collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Builder {
    /// Override the configuration used for this provider
    pub fn configure(mut self, provider_config: &ProviderConfig) -> Self {
        self.provider_config = Some(provider_config.clone());
        self
    }

    /// Override the selected profile, ignoring `AWS_PROFILE` and `aws.profile`
    pub fn profile_name(mut self, profile_name: impl Into<String>) -> Self {
        self.profile_override = Some(profile_name.into());
        self
    }

    /// Override the files loaded as profile sources
    pub fn profile_files(mut self, profile_files: ProfileFiles) -> Self {
        self.profile_files = Some(profile_files);
        self
    }

    /// Register a custom provider usable as a `credential_source`
    ///
    /// ```ini
    /// [default]
    /// role_arn = arn:aws:iam::123456789:role/RoleA
    /// credential_source = MyCustomProvider
    /// ```
    pub fn with_custom_provider(
        mut self,
        name: impl Into<Cow<'static, str>>,
        provider: impl ProvideCredentials + 'static,
    ) -> Self {
        self.custom_providers.insert(name.into(), Arc::new(provider));
        self
    }

    /// Set the STS client used for `role_arn` and `web_identity_token_file` settings
    pub fn sts_client(mut self, client: Arc<dyn AssumeRoles>) -> Self {
        self.sts_client = Some(client);
        self
    }

    /// Set the SSO client used for `sso_*` settings
    pub fn sso_client(mut self, client: Arc<dyn GetRoleCredentials>) -> Self {
        self.sso_client = Some(client);
        self
    }

    /// Set the OIDC client used to refresh `sso-session` tokens
    pub fn oidc_client(mut self, client: Arc<dyn CreateToken>) -> Self {
        self.oidc_client = Some(client);
        self
    }

    /// Create the [`ProfileFileCredentialsProvider`]
    pub fn build(self) -> ProfileFileCredentialsProvider {
        let build_span = tracing::info_span!("build_profile_provider");
        let _enter = build_span.enter();
        let config = self.provider_config.unwrap_or_default();
        let mut named_providers = self.custom_providers;
        named_providers
            .entry("Environment".into())
            .or_insert_with(|| {
                Arc::new(
                    crate::environment::EnvironmentVariableCredentialsProvider::new_with_env(
                        config.env(),
                    ),
                )
            });
        if config.connector().is_some() {
            named_providers
                .entry("Ec2InstanceMetadata".into())
                .or_insert_with(|| {
                    Arc::new(crate::imds::ImdsCredentialsProvider::builder()
                        .configure(&config)
                        .build())
                });
            named_providers
                .entry("EcsContainer".into())
                .or_insert_with(|| {
                    Arc::new(crate::ecs::EcsCredentialsProvider::builder()
                        .configure(&config)
                        .build())
                });
        }
        let factory = NamedProviderFactory::new(named_providers);
        ProfileFileCredentialsProvider {
            factory,
            client_config: ClientConfiguration {
                sts_client: self.sts_client,
                sso_client: self.sso_client,
                oidc_client: self.oidc_client,
                region: config.region(),
            },
            fs: config.fs(),
            env: config.env(),
            props: config.props(),
            provider_config: config,
            profile_files: self.profile_files.unwrap_or_default(),
            profile_override: self.profile_override,
        }
    }
}

#[cfg(test)]
mod test {
    use super::ProfileFileCredentialsProvider;
    use crate::os_shim::{Env, Fs};
    use crate::provider::{CredentialsError, ProvideCredentials};
    use crate::provider_config::ProviderConfig;
    use crate::region::Region;
    use crate::sts::api::{
        AssumeRoleRequest, AssumeRoles, StsCredentials, StsError, WebIdentityRequest,
    };
    use crate::BoxFuture;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, UNIX_EPOCH};

    #[derive(Debug, Default)]
    struct FakeSts {
        assume_role_requests: Mutex<Vec<AssumeRoleRequest>>,
    }

    impl AssumeRoles for FakeSts {
        fn assume_role(
            &self,
            request: AssumeRoleRequest,
        ) -> BoxFuture<'_, Result<StsCredentials, StsError>> {
            self.assume_role_requests.lock().unwrap().push(request);
            Box::pin(async move {
                Ok(StsCredentials {
                    access_key_id: "assumed-akid".into(),
                    secret_access_key: "assumed-secret".into(),
                    session_token: "assumed-token".into(),
                    expiration: UNIX_EPOCH + Duration::from_secs(4_000_000_000),
                })
            })
        }

        fn assume_role_with_web_identity(
            &self,
            _request: WebIdentityRequest,
        ) -> BoxFuture<'_, Result<StsCredentials, StsError>> {
            Box::pin(async move { panic!("not used in these tests") })
        }
    }

    fn config_with(env: &[(&str, &str)], config_file: &str) -> ProviderConfig {
        let mut vars = vec![("HOME", "/home/test")];
        vars.extend_from_slice(env);
        let mut files = HashMap::new();
        files.insert(
            "/home/test/.aws/config".to_string(),
            config_file.as_bytes().to_vec(),
        );
        ProviderConfig::default()
            .with_env(Env::from_slice(&vars))
            .with_fs(Fs::from_map(files))
    }

    #[tokio::test]
    async fn static_credentials_from_the_selected_profile() {
        let config = config_with(
            &[],
            "[default]\naws_access_key_id = profile-akid\naws_secret_access_key = secret\n",
        );
        let provider = ProfileFileCredentialsProvider::builder()
            .configure(&config)
            .build();
        let creds = provider.provide_credentials().await.expect("static keys");
        assert_eq!(creds.access_key_id(), "profile-akid");
        assert_eq!(creds.provider_name(), "Profile");
    }

    #[tokio::test]
    async fn empty_config_is_not_loaded() {
        let config = config_with(&[], "");
        let provider = ProfileFileCredentialsProvider::builder()
            .configure(&config)
            .build();
        let err = provider.provide_credentials().await.expect_err("no profiles");
        assert!(matches!(err, CredentialsError::CredentialsNotLoaded));
    }

    #[tokio::test]
    async fn profile_without_credential_keys_is_not_loaded() {
        let config = config_with(&[], "[default]\nregion = us-east-1\n");
        let provider = ProfileFileCredentialsProvider::builder()
            .configure(&config)
            .build();
        let err = provider.provide_credentials().await.expect_err("no creds");
        assert!(matches!(err, CredentialsError::CredentialsNotLoaded));
    }

    #[tokio::test]
    async fn assume_role_from_a_source_profile() {
        let sts = Arc::new(FakeSts::default());
        let config = config_with(
            &[],
            "[default]\n\
             role_arn = arn:aws:iam::123456789:role/RoleA\n\
             source_profile = base\n\
             \n\
             [profile base]\n\
             aws_access_key_id = base-akid\n\
             aws_secret_access_key = base-secret\n",
        )
        .with_region(Some(Region::new("us-east-1")));
        let provider = ProfileFileCredentialsProvider::builder()
            .configure(&config)
            .sts_client(sts.clone())
            .build();
        let creds = provider.provide_credentials().await.expect("assumed");
        assert_eq!(creds.access_key_id(), "assumed-akid");

        let requests = sts.assume_role_requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].role_arn, "arn:aws:iam::123456789:role/RoleA");
        assert_eq!(requests[0].credentials.access_key_id(), "base-akid");
        assert_eq!(requests[0].region, Region::new("us-east-1"));
    }

    #[tokio::test]
    async fn credential_source_environment() {
        let config = config_with(
            &[
                ("AWS_ACCESS_KEY_ID", "env-akid"),
                ("AWS_SECRET_ACCESS_KEY", "env-secret"),
            ],
            "[default]\n\
             role_arn = arn:aws:iam::123456789:role/RoleA\n\
             credential_source = Environment\n",
        );
        let sts = Arc::new(FakeSts::default());
        let provider = ProfileFileCredentialsProvider::builder()
            .configure(&config)
            .sts_client(sts.clone())
            .build();
        provider.provide_credentials().await.expect("assumed");
        let requests = sts.assume_role_requests.lock().unwrap();
        assert_eq!(requests[0].credentials.access_key_id(), "env-akid");
    }

    #[tokio::test]
    async fn unknown_credential_source_is_a_configuration_error() {
        let config = config_with(
            &[],
            "[default]\n\
             role_arn = arn:aws:iam::123456789:role/RoleA\n\
             credential_source = NotARealSource\n",
        );
        let provider = ProfileFileCredentialsProvider::builder()
            .configure(&config)
            .sts_client(Arc::new(FakeSts::default()))
            .build();
        let err = provider.provide_credentials().await.expect_err("unknown");
        assert!(matches!(err, CredentialsError::InvalidConfiguration(_)));
        assert!(format!("{}", err).contains("NotARealSource"), "{}", err);
    }

    #[tokio::test]
    async fn custom_provider_as_credential_source() {
        let config = config_with(
            &[],
            "[default]\n\
             role_arn = arn:aws:iam::123456789:role/RoleA\n\
             credential_source = MyCustomProvider\n",
        );
        let sts = Arc::new(FakeSts::default());
        let provider = ProfileFileCredentialsProvider::builder()
            .configure(&config)
            .sts_client(sts.clone())
            .with_custom_provider(
                "MyCustomProvider",
                crate::Credentials::from_keys("custom-akid", "custom-secret", None),
            )
            .build();
        provider.provide_credentials().await.expect("assumed");
        let requests = sts.assume_role_requests.lock().unwrap();
        assert_eq!(requests[0].credentials.access_key_id(), "custom-akid");
    }

    #[tokio::test]
    async fn profile_name_override_wins() {
        let config = config_with(
            &[("AWS_PROFILE", "from-env")],
            "[profile from-env]\n\
             aws_access_key_id = env-selected\n\
             aws_secret_access_key = secret\n\
             \n\
             [profile explicit]\n\
             aws_access_key_id = explicit-selected\n\
             aws_secret_access_key = secret\n",
        );
        let provider = ProfileFileCredentialsProvider::builder()
            .configure(&config)
            .profile_name("explicit")
            .build();
        let creds = provider.provide_credentials().await.expect("resolved");
        assert_eq!(creds.access_key_id(), "explicit-selected");
    }

    #[tokio::test]
    async fn role_without_sts_client_is_a_configuration_error() {
        let config = config_with(
            &[],
            "[default]\n\
             role_arn = arn:aws:iam::123456789:role/RoleA\n\
             source_profile = base\n\
             \n\
             [profile base]\n\
             aws_access_key_id = base-akid\n\
             aws_secret_access_key = base-secret\n",
        );
        let provider = ProfileFileCredentialsProvider::builder()
            .configure(&config)
            .build();
        let err = provider.provide_credentials().await.expect_err("no client");
        assert!(matches!(err, CredentialsError::InvalidConfiguration(_)));
        assert!(format!("{}", err).contains("STS"), "{}", err);
    }
}

/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Load credentials from a web identity token
//!
//! A JWT obtained from an OIDC provider (for example a Kubernetes service account token)
//! is read from a file and exchanged for role credentials with
//! `AssumeRoleWithWebIdentity`. Settings may be provided explicitly or through
//! environment variables:
//! - `AWS_ROLE_ARN`
//! - `AWS_WEB_IDENTITY_TOKEN_FILE`
//! - `AWS_ROLE_SESSION_NAME` (optional)

use crate::os_shim::{Env, Fs};
use crate::provider::{self, future, CredentialsError, ProvideCredentials};
use crate::provider_config::ProviderConfig;
use crate::region::Region;
use crate::sts::api::{AssumeRoles, StsError, WebIdentityRequest};
use crate::time_source::TimeSource;
use crate::Credentials;
use std::sync::Arc;
use std::time::UNIX_EPOCH;

const ENV_ROLE_ARN: &str = "AWS_ROLE_ARN";
const ENV_TOKEN_FILE: &str = "AWS_WEB_IDENTITY_TOKEN_FILE";
const ENV_SESSION_NAME: &str = "AWS_ROLE_SESSION_NAME";

/// Credentials provider that exchanges a web identity token for role credentials
#[derive(Debug)]
pub struct WebIdentityTokenCredentialsProvider {
    client: Arc<dyn AssumeRoles>,
    role_arn: Option<String>,
    token_file: Option<String>,
    session_name: Option<String>,
    region: Option<Region>,
    env: Env,
    fs: Fs,
    time_source: TimeSource,
}

impl WebIdentityTokenCredentialsProvider {
    /// Builder for [`WebIdentityTokenCredentialsProvider`]
    pub fn builder() -> Builder {
        Builder::default()
    }

    fn setting(
        &self,
        explicit: &Option<String>,
        field: &'static str,
        env_var: &'static str,
        setter: &'static str,
    ) -> Result<String, CredentialsError> {
        explicit
            .clone()
            .or_else(|| self.env.get(env_var).ok())
            .ok_or_else(|| {
                CredentialsError::invalid_configuration(format!(
                    "{} is required for the web identity token provider. Set it with `{}` or the `{}` environment variable",
                    field, setter, env_var
                ))
            })
    }

    fn session_name(&self) -> String {
        if let Some(name) = &self.session_name {
            return name.clone();
        }
        if let Ok(name) = self.env.get(ENV_SESSION_NAME) {
            return name;
        }
        let millis = self
            .time_source
            .now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        format!("aws-sdk-rust-{}", millis)
    }

    async fn credentials(&self) -> provider::Result {
        let role_arn = self.setting(&self.role_arn, "a role ARN", ENV_ROLE_ARN, "role_arn")?;
        let token_file = self.setting(
            &self.token_file,
            "a token file path",
            ENV_TOKEN_FILE,
            "token_file",
        )?;
        let region = self.region.clone().ok_or_else(|| {
            CredentialsError::invalid_configuration(
                "a region is required for the web identity token provider. Set it on the builder or the provider configuration",
            )
        })?;
        let token = self.fs.read_to_end(&token_file).map_err(|err| {
            CredentialsError::provider_error(format!(
                "failed to read the web identity token file `{}`: {}",
                token_file, err
            ))
        })?;
        let token = String::from_utf8(token).map_err(|_| {
            CredentialsError::provider_error("the web identity token file was not valid UTF-8")
        })?;
        let request = WebIdentityRequest {
            role_arn,
            session_name: self.session_name(),
            web_identity_token: token.trim().to_string(),
            region,
        };
        let assumed = self
            .client
            .assume_role_with_web_identity(request)
            .await
            .map_err(|err| match err {
                StsError::RegionDisabled { message } => {
                    CredentialsError::invalid_configuration(format!(
                        "STS is not activated in the requested region: {}",
                        message
                    ))
                }
                other => CredentialsError::provider_error(other),
            })?;
        Ok(Credentials::new(
            assumed.access_key_id,
            assumed.secret_access_key,
            Some(assumed.session_token),
            Some(assumed.expiration),
            "WebIdentityToken",
        ))
    }
}

impl ProvideCredentials for WebIdentityTokenCredentialsProvider {
    fn provide_credentials<'a>(&'a self) -> future::ProvideCredentials<'a>
    where
        Self: 'a,
    {
        future::ProvideCredentials::new(self.credentials())
    }
}

/// Builder for [`WebIdentityTokenCredentialsProvider`]
#[derive(Debug, Default)]
pub struct Builder {
    role_arn: Option<String>,
    token_file: Option<String>,
    session_name: Option<String>,
    region: Option<Region>,
    client: Option<Arc<dyn AssumeRoles>>,
    provider_config: Option<ProviderConfig>,
}

impl Builder {
    /// Set the role ARN, overriding `AWS_ROLE_ARN`
    pub fn role_arn(mut self, role_arn: impl Into<String>) -> Self {
        self.role_arn = Some(role_arn.into());
        self
    }

    /// Set the token file path, overriding `AWS_WEB_IDENTITY_TOKEN_FILE`
    pub fn token_file(mut self, token_file: impl Into<String>) -> Self {
        self.token_file = Some(token_file.into());
        self
    }

    /// Set the session name, overriding `AWS_ROLE_SESSION_NAME`
    pub fn session_name(mut self, session_name: impl Into<String>) -> Self {
        self.session_name = Some(session_name.into());
        self
    }

    /// Set the region whose STS endpoint receives the call
    pub fn region(mut self, region: Region) -> Self {
        self.region = Some(region);
        self
    }

    /// Set the STS client used to make the `AssumeRoleWithWebIdentity` call
    pub fn sts_client(mut self, client: Arc<dyn AssumeRoles>) -> Self {
        self.client = Some(client);
        self
    }

    /// Override the configuration used for this provider
    pub fn configure(mut self, provider_config: &ProviderConfig) -> Self {
        self.provider_config = Some(provider_config.clone());
        self
    }

    /// Create the [`WebIdentityTokenCredentialsProvider`]
    ///
    /// # Panics
    /// An STS client must have been set with [`sts_client`](Builder::sts_client).
    pub fn build(self) -> WebIdentityTokenCredentialsProvider {
        let config = self.provider_config.unwrap_or_default();
        WebIdentityTokenCredentialsProvider {
            client: self.client.expect("an STS client is required"),
            role_arn: self.role_arn,
            token_file: self.token_file,
            session_name: self.session_name,
            region: self.region.or_else(|| config.region()),
            env: config.env(),
            fs: config.fs(),
            time_source: config.time_source(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::WebIdentityTokenCredentialsProvider;
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
        requests: Mutex<Vec<WebIdentityRequest>>,
    }

    impl AssumeRoles for FakeSts {
        fn assume_role(
            &self,
            _request: AssumeRoleRequest,
        ) -> BoxFuture<'_, Result<StsCredentials, StsError>> {
            Box::pin(async move { panic!("not used in these tests") })
        }

        fn assume_role_with_web_identity(
            &self,
            request: WebIdentityRequest,
        ) -> BoxFuture<'_, Result<StsCredentials, StsError>> {
            self.requests.lock().unwrap().push(request);
            Box::pin(async move {
                Ok(StsCredentials {
                    access_key_id: "assumed-akid".into(),
                    secret_access_key: "assumed-secret".into(),
                    session_token: "assumed-token".into(),
                    expiration: UNIX_EPOCH + Duration::from_secs(10_000),
                })
            })
        }
    }

    fn token_fs() -> Fs {
        let mut files = HashMap::new();
        files.insert(
            "/var/run/secrets/token".to_string(),
            b"jwt-token-contents\n".to_vec(),
        );
        Fs::from_map(files)
    }

    #[tokio::test]
    async fn loads_settings_from_environment() {
        let sts = Arc::new(FakeSts::default());
        let config = ProviderConfig::default()
            .with_env(Env::from_slice(&[
                ("AWS_ROLE_ARN", "arn:aws:iam::123456789:role/pod"),
                ("AWS_WEB_IDENTITY_TOKEN_FILE", "/var/run/secrets/token"),
                ("AWS_ROLE_SESSION_NAME", "pod-session"),
            ]))
            .with_fs(token_fs());
        let provider = WebIdentityTokenCredentialsProvider::builder()
            .configure(&config)
            .region(Region::new("us-east-1"))
            .sts_client(sts.clone())
            .build();
        let creds = provider.provide_credentials().await.expect("assumed");
        assert_eq!(creds.access_key_id(), "assumed-akid");

        let requests = sts.requests.lock().unwrap();
        assert_eq!(requests[0].role_arn, "arn:aws:iam::123456789:role/pod");
        assert_eq!(requests[0].web_identity_token, "jwt-token-contents");
        assert_eq!(requests[0].session_name, "pod-session");
    }

    #[tokio::test]
    async fn missing_role_arn_names_the_env_var_and_setter() {
        let config = ProviderConfig::default()
            .with_env(Env::from_slice(&[(
                "AWS_WEB_IDENTITY_TOKEN_FILE",
                "/var/run/secrets/token",
            )]))
            .with_fs(token_fs());
        let provider = WebIdentityTokenCredentialsProvider::builder()
            .configure(&config)
            .region(Region::new("us-east-1"))
            .sts_client(Arc::new(FakeSts::default()))
            .build();
        let err = provider.provide_credentials().await.expect_err("no arn");
        let message = format!("{:?}", err);
        assert!(message.contains("AWS_ROLE_ARN"), "{}", message);
        assert!(message.contains("role_arn"), "{}", message);
        assert!(matches!(err, CredentialsError::InvalidConfiguration(_)));
    }

    #[tokio::test]
    async fn missing_region_is_a_configuration_error() {
        let config = ProviderConfig::default()
            .with_env(Env::from_slice(&[
                ("AWS_ROLE_ARN", "arn:aws:iam::123456789:role/pod"),
                ("AWS_WEB_IDENTITY_TOKEN_FILE", "/var/run/secrets/token"),
            ]))
            .with_fs(token_fs());
        let provider = WebIdentityTokenCredentialsProvider::builder()
            .configure(&config)
            .sts_client(Arc::new(FakeSts::default()))
            .build();
        let err = provider.provide_credentials().await.expect_err("no region");
        assert!(matches!(err, CredentialsError::InvalidConfiguration(_)));
    }

    #[tokio::test]
    async fn unreadable_token_file_is_a_provider_error() {
        let config = ProviderConfig::default()
            .with_env(Env::from_slice(&[
                ("AWS_ROLE_ARN", "arn:aws:iam::123456789:role/pod"),
                ("AWS_WEB_IDENTITY_TOKEN_FILE", "/missing/token"),
            ]))
            .with_fs(Fs::from_map(HashMap::new()));
        let provider = WebIdentityTokenCredentialsProvider::builder()
            .configure(&config)
            .region(Region::new("us-east-1"))
            .sts_client(Arc::new(FakeSts::default()))
            .build();
        let err = provider.provide_credentials().await.expect_err("missing");
        assert!(matches!(err, CredentialsError::ProviderError(_)));
    }
}

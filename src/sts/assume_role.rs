/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Assume credentials for a role through the AWS Security Token Service (STS).

use crate::os_shim::Env;
use crate::provider::{self, future, CredentialsError, ProvideCredentials};
use crate::provider_config::ProviderConfig;
use crate::region::Region;
use crate::sts::api::{AssumeRoleRequest, AssumeRoles, StsError};
use crate::sts::DEFAULT_STS_REGION;
use crate::time_source::TimeSource;
use crate::Credentials;
use std::sync::Arc;
use std::time::UNIX_EPOCH;

/// Credentials provider that uses credentials provided by another provider to assume a role
/// through the AWS Security Token Service (STS).
///
/// When asked to provide credentials, this provider will first invoke the inner credentials
/// provider to get credentials for STS, then call `AssumeRole` with them.
///
/// When no region is configured the `aws-global` partition endpoint is used; assuming a
/// role through a multi-region access point requires configuring a regional endpoint
/// explicitly.
#[derive(Debug)]
pub struct AssumeRoleProvider {
    client: Arc<dyn AssumeRoles>,
    provider: Arc<dyn ProvideCredentials>,
    role_arn: String,
    session_name: Option<String>,
    external_id: Option<String>,
    region: Region,
    env: Env,
    time_source: TimeSource,
}

impl AssumeRoleProvider {
    /// Build a new role-assuming provider for the role `role_arn`
    pub fn builder(role_arn: impl Into<String>) -> Builder {
        Builder::new(role_arn.into())
    }

    fn session_name(&self) -> String {
        if let Some(name) = &self.session_name {
            return name.clone();
        }
        if let Ok(name) = self.env.get("AWS_ROLE_SESSION_NAME") {
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
        let credentials = self.provider.provide_credentials().await?;
        let request = AssumeRoleRequest {
            role_arn: self.role_arn.clone(),
            session_name: self.session_name(),
            external_id: self.external_id.clone(),
            region: self.region.clone(),
            credentials,
        };
        tracing::debug!(role_arn = %self.role_arn, region = %self.region, "assuming role");
        let assumed = self.client.assume_role(request).await.map_err(|err| match err {
            StsError::RegionDisabled { message } => CredentialsError::invalid_configuration(
                format!(
                    "STS is not activated in the requested region ({}). Activate it in the IAM console or configure another region: {}",
                    self.region, message
                ),
            ),
            other => CredentialsError::provider_error(other),
        })?;
        Ok(Credentials::new(
            assumed.access_key_id,
            assumed.secret_access_key,
            Some(assumed.session_token),
            Some(assumed.expiration),
            "AssumeRoleProvider",
        ))
    }
}

impl ProvideCredentials for AssumeRoleProvider {
    fn provide_credentials<'a>(&'a self) -> future::ProvideCredentials<'a>
    where
        Self: 'a,
    {
        future::ProvideCredentials::new(self.credentials())
    }
}

/// Builder for [`AssumeRoleProvider`]
#[derive(Debug)]
pub struct Builder {
    role_arn: String,
    session_name: Option<String>,
    external_id: Option<String>,
    region: Option<Region>,
    client: Option<Arc<dyn AssumeRoles>>,
    provider_config: Option<ProviderConfig>,
}

impl Builder {
    fn new(role_arn: String) -> Self {
        Builder {
            role_arn,
            session_name: None,
            external_id: None,
            region: None,
            client: None,
            provider_config: None,
        }
    }

    /// Set the session name used when assuming the role
    ///
    /// When unset, `AWS_ROLE_SESSION_NAME` is consulted, and finally a timestamped
    /// name is generated.
    pub fn session_name(mut self, session_name: impl Into<String>) -> Self {
        self.session_name = Some(session_name.into());
        self
    }

    /// Set an external id to include in the `AssumeRole` call
    pub fn external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }

    /// Set the region whose STS endpoint receives the call
    pub fn region(mut self, region: Region) -> Self {
        self.region = Some(region);
        self
    }

    /// Set the STS client used to make the `AssumeRole` call
    pub fn sts_client(mut self, client: Arc<dyn AssumeRoles>) -> Self {
        self.client = Some(client);
        self
    }

    /// Override the configuration used for this provider
    pub fn configure(mut self, provider_config: &ProviderConfig) -> Self {
        self.provider_config = Some(provider_config.clone());
        self
    }

    /// Create the [`AssumeRoleProvider`], using `provider` for the authenticating credentials
    ///
    /// # Panics
    /// An STS client must have been set with [`sts_client`](Builder::sts_client).
    pub fn build(self, provider: impl ProvideCredentials + 'static) -> AssumeRoleProvider {
        let config = self.provider_config.unwrap_or_default();
        let region = self
            .region
            .or_else(|| config.region())
            .unwrap_or_else(|| Region::from_static(DEFAULT_STS_REGION));
        AssumeRoleProvider {
            client: self.client.expect("an STS client is required"),
            provider: Arc::new(provider),
            role_arn: self.role_arn,
            session_name: self.session_name,
            external_id: self.external_id,
            region,
            env: config.env(),
            time_source: config.time_source(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::AssumeRoleProvider;
    use crate::os_shim::Env;
    use crate::provider::{CredentialsError, ProvideCredentials};
    use crate::provider_config::ProviderConfig;
    use crate::region::Region;
    use crate::sts::api::{
        AssumeRoleRequest, AssumeRoles, StsCredentials, StsError, WebIdentityRequest,
    };
    use crate::time_source::TimeSource;
    use crate::BoxFuture;
    use crate::Credentials;
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, UNIX_EPOCH};

    #[derive(Debug)]
    struct FakeSts {
        result: fn() -> Result<StsCredentials, StsError>,
        requests: Mutex<Vec<AssumeRoleRequest>>,
    }

    impl FakeSts {
        fn new(result: fn() -> Result<StsCredentials, StsError>) -> Arc<Self> {
            Arc::new(Self {
                result,
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    impl AssumeRoles for FakeSts {
        fn assume_role(
            &self,
            request: AssumeRoleRequest,
        ) -> BoxFuture<'_, Result<StsCredentials, StsError>> {
            self.requests.lock().unwrap().push(request);
            Box::pin(async move { (self.result)() })
        }

        fn assume_role_with_web_identity(
            &self,
            _request: WebIdentityRequest,
        ) -> BoxFuture<'_, Result<StsCredentials, StsError>> {
            Box::pin(async move { panic!("not used in these tests") })
        }
    }

    fn sts_creds() -> Result<StsCredentials, StsError> {
        Ok(StsCredentials {
            access_key_id: "assumed-akid".into(),
            secret_access_key: "assumed-secret".into(),
            session_token: "assumed-token".into(),
            expiration: UNIX_EPOCH + Duration::from_secs(10_000),
        })
    }

    #[tokio::test]
    async fn assumes_role_with_inner_credentials() {
        let sts = FakeSts::new(sts_creds);
        let provider = AssumeRoleProvider::builder("arn:aws:iam::123456789:role/test")
            .session_name("my-session")
            .sts_client(sts.clone())
            .build(Credentials::from_keys("inner-akid", "inner-secret", None));
        let creds = provider.provide_credentials().await.expect("assumed");
        assert_eq!(creds.access_key_id(), "assumed-akid");
        assert_eq!(creds.session_token(), Some("assumed-token"));

        let requests = sts.requests.lock().unwrap();
        assert_eq!(requests[0].session_name, "my-session");
        assert_eq!(requests[0].credentials.access_key_id(), "inner-akid");
        assert_eq!(requests[0].region, Region::new("aws-global"));
    }

    #[tokio::test]
    async fn session_name_from_environment() {
        let sts = FakeSts::new(sts_creds);
        let config =
            ProviderConfig::default().with_env(Env::from_slice(&[(
                "AWS_ROLE_SESSION_NAME",
                "env-session",
            )]));
        let provider = AssumeRoleProvider::builder("arn:aws:iam::123456789:role/test")
            .configure(&config)
            .sts_client(sts.clone())
            .build(Credentials::from_keys("akid", "secret", None));
        provider.provide_credentials().await.expect("assumed");
        assert_eq!(sts.requests.lock().unwrap()[0].session_name, "env-session");
    }

    #[tokio::test]
    async fn generated_session_name_uses_epoch_millis() {
        let sts = FakeSts::new(sts_creds);
        let (time, _handle) = TimeSource::manual(UNIX_EPOCH + Duration::from_millis(1234567));
        let config = ProviderConfig::default()
            .with_env(Env::from_slice(&[]))
            .with_time_source(time);
        let provider = AssumeRoleProvider::builder("arn:aws:iam::123456789:role/test")
            .configure(&config)
            .sts_client(sts.clone())
            .build(Credentials::from_keys("akid", "secret", None));
        provider.provide_credentials().await.expect("assumed");
        assert_eq!(
            sts.requests.lock().unwrap()[0].session_name,
            "aws-sdk-rust-1234567"
        );
    }

    #[tokio::test]
    async fn region_disabled_is_a_configuration_error() {
        let sts = FakeSts::new(|| {
            Err(StsError::RegionDisabled {
                message: "STS is not activated".into(),
            })
        });
        let provider = AssumeRoleProvider::builder("arn:aws:iam::123456789:role/test")
            .region(Region::new("ap-fake-1"))
            .sts_client(sts)
            .build(Credentials::from_keys("akid", "secret", None));
        let err = provider.provide_credentials().await.expect_err("disabled");
        assert!(matches!(err, CredentialsError::InvalidConfiguration(_)));
    }

    #[tokio::test]
    async fn inner_provider_failure_short_circuits() {
        let sts = FakeSts::new(sts_creds);
        let provider = AssumeRoleProvider::builder("arn:aws:iam::123456789:role/test")
            .sts_client(sts.clone())
            .build(crate::meta::credentials::provide_credentials_fn(|| async {
                Err(CredentialsError::not_loaded())
            }));
        provider
            .provide_credentials()
            .await
            .expect_err("inner failed");
        assert!(sts.requests.lock().unwrap().is_empty());
    }
}

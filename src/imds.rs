/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! IMDS Credentials Provider
//!
//! Loads credentials from the EC2 Instance Metadata Service. Unless a profile name is
//! provided explicitly, the instance profile is discovered with a preliminary request to
//! `/latest/meta-data/iam/security-credentials/`. Setting `AWS_EC2_METADATA_DISABLED=true`
//! disables the provider entirely.

use crate::connector::MetadataConnector;
use crate::json_credentials::{credentials_error_for, parse_json_credentials, JsonCredentials};
use crate::os_shim::Env;
use crate::provider::{self, future, CredentialsError, ProvideCredentials};
use crate::provider_config::ProviderConfig;
use crate::Credentials;
use std::sync::Arc;

const ENV_METADATA_DISABLED: &str = "AWS_EC2_METADATA_DISABLED";
const DEFAULT_ENDPOINT: &str = "http://169.254.169.254";
const SECURITY_CREDENTIALS_PATH: &str = "/latest/meta-data/iam/security-credentials/";

/// IMDS credentials provider
///
/// _Note: This provider is part of the default credentials chain and is usually only
/// constructed directly for testing._
#[derive(Debug)]
pub struct ImdsCredentialsProvider {
    env: Env,
    connector: Arc<dyn MetadataConnector>,
    endpoint: String,
    profile: Option<String>,
}

impl ImdsCredentialsProvider {
    /// Builder for [`ImdsCredentialsProvider`]
    pub fn builder() -> Builder {
        Builder::default()
    }

    fn imds_disabled(&self) -> bool {
        match self.env.get(ENV_METADATA_DISABLED) {
            Ok(value) => value.eq_ignore_ascii_case("true"),
            Err(_) => false,
        }
    }

    /// Resolve the instance profile name, issuing a discovery request if necessary
    async fn resolve_profile_name(&self) -> Result<String, CredentialsError> {
        if let Some(profile) = &self.profile {
            return Ok(profile.clone());
        }
        let uri = format!("{}{}", self.endpoint, SECURITY_CREDENTIALS_PATH);
        let response = self
            .connector
            .get(&uri, &[])
            .await
            .map_err(CredentialsError::provider_error)?;
        if !response.is_success() {
            return Err(CredentialsError::provider_error(format!(
                "failed to discover the instance profile: status {}",
                response.status()
            )));
        }
        let body = std::str::from_utf8(response.body())
            .map_err(CredentialsError::unhandled)?;
        let profile = body.lines().next().unwrap_or("").trim();
        if profile.is_empty() {
            return Err(CredentialsError::provider_error(
                "the instance metadata service did not return an instance profile name",
            ));
        }
        Ok(profile.to_string())
    }

    async fn credentials(&self) -> provider::Result {
        if self.imds_disabled() {
            tracing::debug!("IMDS disabled because $AWS_EC2_METADATA_DISABLED was set to `true`");
            return Err(CredentialsError::not_loaded());
        }
        let profile = self.resolve_profile_name().await?;
        let uri = format!("{}{}{}", self.endpoint, SECURITY_CREDENTIALS_PATH, profile);
        let response = self
            .connector
            .get(&uri, &[])
            .await
            .map_err(CredentialsError::provider_error)?;
        if !response.is_success() {
            return Err(CredentialsError::provider_error(format!(
                "non-success status {} from the instance metadata service",
                response.status()
            )));
        }
        let body = std::str::from_utf8(response.body())
            .map_err(CredentialsError::unhandled)?;
        match parse_json_credentials(body).map_err(CredentialsError::unhandled)? {
            JsonCredentials::RefreshableCredentials(creds) => {
                let credentials = Credentials::new(
                    creds.access_key_id,
                    creds.secret_access_key,
                    Some(creds.session_token),
                    Some(creds.expiration),
                    "Ec2InstanceMetadata",
                );
                Ok(match creds.account_id {
                    Some(account_id) => credentials.with_account_id(account_id),
                    None => credentials,
                })
            }
            JsonCredentials::Error { code, message } => {
                Err(credentials_error_for(&code, &message))
            }
        }
    }
}

impl ProvideCredentials for ImdsCredentialsProvider {
    fn provide_credentials<'a>(&'a self) -> future::ProvideCredentials<'a>
    where
        Self: 'a,
    {
        future::ProvideCredentials::new(self.credentials())
    }
}

/// Builder for [`ImdsCredentialsProvider`]
#[derive(Debug, Default)]
pub struct Builder {
    provider_config: Option<ProviderConfig>,
    endpoint: Option<String>,
    profile: Option<String>,
}

impl Builder {
    /// Override the configuration used for this provider
    pub fn configure(mut self, provider_config: &ProviderConfig) -> Self {
        self.provider_config = Some(provider_config.clone());
        self
    }

    /// Override the instance profile name, skipping the discovery request
    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    /// Override the IMDS endpoint (`http://169.254.169.254` by default)
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Create the [`ImdsCredentialsProvider`]
    ///
    /// # Panics
    /// A metadata connector must be set on the [`ProviderConfig`].
    pub fn build(self) -> ImdsCredentialsProvider {
        let config = self.provider_config.unwrap_or_default();
        ImdsCredentialsProvider {
            env: config.env(),
            connector: config
                .connector()
                .expect("a metadata connector is required to load IMDS credentials"),
            endpoint: self
                .endpoint
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            profile: self.profile,
        }
    }
}

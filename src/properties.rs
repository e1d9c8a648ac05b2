/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Provider that loads credentials from process-local properties

use crate::os_shim::Props;
use crate::provider::{self, future, CredentialsError, ProvideCredentials};
use crate::Credentials;

const ACCESS_KEY_ID: &str = "aws.accessKeyId";
const SECRET_ACCESS_KEY: &str = "aws.secretAccessKey";
const SESSION_TOKEN: &str = "aws.sessionToken";

/// Load Credentials from process-local properties
///
/// This is the property-layer analog of
/// [`EnvironmentVariableCredentialsProvider`](crate::environment::EnvironmentVariableCredentialsProvider):
/// it reads `aws.accessKeyId`, `aws.secretAccessKey`, and (optionally) `aws.sessionToken`
/// from the injected [`Props`] map. A blank or missing key id or secret is a
/// configuration error.
#[derive(Debug, Clone)]
pub struct SystemPropertiesCredentialsProvider {
    props: Props,
}

impl SystemPropertiesCredentialsProvider {
    /// Create a provider reading from `props`
    pub fn new(props: Props) -> Self {
        Self { props }
    }

    fn get(&self, key: &'static str) -> Result<String, CredentialsError> {
        match self.props.get(key) {
            Some(value) if !value.trim().is_empty() => Ok(value.to_string()),
            _ => Err(CredentialsError::invalid_configuration(format!(
                "Unable to load credentials from system properties: `{}` was blank or not set",
                key
            ))),
        }
    }

    fn credentials(&self) -> provider::Result {
        let access_key_id = self.get(ACCESS_KEY_ID)?;
        let secret_access_key = self.get(SECRET_ACCESS_KEY)?;
        let session_token = self.props.get(SESSION_TOKEN).map(ToString::to_string);
        Ok(Credentials::new(
            access_key_id,
            secret_access_key,
            session_token,
            None,
            "SystemProperties",
        ))
    }
}

impl ProvideCredentials for SystemPropertiesCredentialsProvider {
    fn provide_credentials<'a>(&'a self) -> future::ProvideCredentials<'a>
    where
        Self: 'a,
    {
        future::ProvideCredentials::ready(self.credentials())
    }
}

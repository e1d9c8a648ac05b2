/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

use crate::os_shim::Env;
use crate::provider::{self, future, CredentialsError, ProvideCredentials};
use crate::Credentials;

/// Load Credentials from Environment Variables
///
/// This provider reads `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`, and
/// (optionally) `AWS_SESSION_TOKEN`. If the key id or secret is set but the other is
/// missing, that is a configuration error rather than "no credentials here".
#[derive(Debug, Clone)]
pub struct EnvironmentVariableCredentialsProvider {
    env: Env,
}

impl EnvironmentVariableCredentialsProvider {
    /// Create a `EnvironmentVariableCredentialsProvider`
    pub fn new() -> Self {
        Self::new_with_env(Env::real())
    }

    /// Create a new `EnvironmentVariableCredentialsProvider` with `Env` overridden
    ///
    /// This function is intended for tests that mock out the process environment.
    pub(crate) fn new_with_env(env: Env) -> Self {
        Self { env }
    }

    fn credentials(&self) -> provider::Result {
        let access_key_id = self.env.get("AWS_ACCESS_KEY_ID").map_err(|_| {
            CredentialsError::invalid_configuration(
                "Unable to load credentials from the environment: `AWS_ACCESS_KEY_ID` was not set",
            )
        })?;
        let secret_access_key = self.env.get("AWS_SECRET_ACCESS_KEY").map_err(|_| {
            CredentialsError::invalid_configuration(
                "Unable to load credentials from the environment: `AWS_SECRET_ACCESS_KEY` was not set",
            )
        })?;
        let session_token = self.env.get("AWS_SESSION_TOKEN").ok();
        Ok(Credentials::new(
            access_key_id,
            secret_access_key,
            session_token,
            None,
            ENV_PROVIDER,
        ))
    }
}

impl Default for EnvironmentVariableCredentialsProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ProvideCredentials for EnvironmentVariableCredentialsProvider {
    fn provide_credentials<'a>(&'a self) -> future::ProvideCredentials<'a>
    where
        Self: 'a,
    {
        future::ProvideCredentials::ready(self.credentials())
    }
}

const ENV_PROVIDER: &str = "Environment";

#[cfg(test)]
mod test {
    use super::EnvironmentVariableCredentialsProvider;
    use crate::os_shim::Env;
    use crate::provider::{CredentialsError, ProvideCredentials};

    fn make_provider(vars: &[(&str, &str)]) -> EnvironmentVariableCredentialsProvider {
        EnvironmentVariableCredentialsProvider::new_with_env(Env::from_slice(vars))
    }

    #[tokio::test]
    async fn valid_no_token() {
        let creds = make_provider(&[
            ("AWS_ACCESS_KEY_ID", "access"),
            ("AWS_SECRET_ACCESS_KEY", "secret"),
        ])
        .provide_credentials()
        .await
        .expect("valid credentials");
        assert_eq!(creds.access_key_id(), "access");
        assert_eq!(creds.secret_access_key(), "secret");
        assert_eq!(creds.session_token(), None);
        assert_eq!(creds.provider_name(), "Environment");
    }

    #[tokio::test]
    async fn valid_with_token() {
        let creds = make_provider(&[
            ("AWS_ACCESS_KEY_ID", "access"),
            ("AWS_SECRET_ACCESS_KEY", "secret"),
            ("AWS_SESSION_TOKEN", "token"),
        ])
        .provide_credentials()
        .await
        .expect("valid credentials");
        assert_eq!(creds.session_token(), Some("token"));
    }

    #[tokio::test]
    async fn missing_secret_is_a_configuration_error() {
        let err = make_provider(&[("AWS_ACCESS_KEY_ID", "access")])
            .provide_credentials()
            .await
            .expect_err("secret not set");
        assert!(matches!(err, CredentialsError::InvalidConfiguration(_)));
    }

    #[tokio::test]
    async fn missing_access_key_is_a_configuration_error() {
        let err = make_provider(&[("AWS_SECRET_ACCESS_KEY", "secret")])
            .provide_credentials()
            .await
            .expect_err("access key not set");
        assert!(matches!(err, CredentialsError::InvalidConfiguration(_)));
    }
}

/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Ecs Credentials Provider
//!
//! This provider reads credentials from the Amazon ECS container credentials endpoint.
//! The endpoint location comes from one of two environment variables:
//! - `AWS_CONTAINER_CREDENTIALS_RELATIVE_URI`: a path joined onto `http://169.254.170.2`
//! - `AWS_CONTAINER_CREDENTIALS_FULL_URI`: a full URI, which must be `https` or point at
//!   a loopback address or one of the known container-metadata addresses
//!
//! An optional bearer token is read from `AWS_CONTAINER_AUTHORIZATION_TOKEN_FILE`
//! (preferred) or `AWS_CONTAINER_AUTHORIZATION_TOKEN` and sent in the `Authorization`
//! header.

use crate::connector::MetadataConnector;
use crate::json_credentials::{credentials_error_for, parse_json_credentials, JsonCredentials};
use crate::os_shim::{Env, Fs};
use crate::provider::{self, future, CredentialsError, ProvideCredentials};
use crate::provider_config::ProviderConfig;
use crate::Credentials;
use std::sync::Arc;

const ENV_RELATIVE_URI: &str = "AWS_CONTAINER_CREDENTIALS_RELATIVE_URI";
const ENV_FULL_URI: &str = "AWS_CONTAINER_CREDENTIALS_FULL_URI";
const ENV_AUTH_TOKEN_FILE: &str = "AWS_CONTAINER_AUTHORIZATION_TOKEN_FILE";
const ENV_AUTH_TOKEN: &str = "AWS_CONTAINER_AUTHORIZATION_TOKEN";

const BASE_HOST: &str = "http://169.254.170.2";

/// Credentials provider for the Amazon ECS container credentials endpoint
#[derive(Debug)]
pub struct EcsCredentialsProvider {
    env: Env,
    fs: Fs,
    connector: Arc<dyn MetadataConnector>,
}

impl EcsCredentialsProvider {
    /// Builder for [`EcsCredentialsProvider`]
    pub fn builder() -> Builder {
        Builder::default()
    }

    async fn credentials(&self) -> provider::Result {
        let uri = self.uri()?;
        let auth = self.auth_token()?;
        tracing::debug!(uri = %uri, "loading credentials from ECS endpoint");
        let headers: Vec<(&str, &str)> = match auth.as_deref() {
            Some(token) => vec![("Authorization", token)],
            None => vec![],
        };
        let response = self
            .connector
            .get(&uri, &headers)
            .await
            .map_err(CredentialsError::provider_error)?;
        if !response.is_success() {
            return Err(CredentialsError::provider_error(format!(
                "non-success status {} from ECS credentials endpoint",
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
                    "EcsContainer",
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

    fn uri(&self) -> Result<String, CredentialsError> {
        if let Ok(relative) = self.env.get(ENV_RELATIVE_URI) {
            let path = if relative.starts_with('/') {
                relative
            } else {
                format!("/{}", relative)
            };
            return Ok(format!("{}{}", BASE_HOST, path));
        }
        if let Ok(full) = self.env.get(ENV_FULL_URI) {
            validate_full_uri(&full)?;
            return Ok(full);
        }
        Err(CredentialsError::not_loaded())
    }

    fn auth_token(&self) -> Result<Option<String>, CredentialsError> {
        let token = if let Ok(path) = self.env.get(ENV_AUTH_TOKEN_FILE) {
            let contents = self.fs.read_to_end(&path).map_err(|err| {
                CredentialsError::invalid_configuration(format!(
                    "failed to read the container authorization token file `{}`: {}",
                    path, err
                ))
            })?;
            let contents = String::from_utf8(contents).map_err(|_| {
                CredentialsError::invalid_configuration(
                    "the container authorization token file was not valid UTF-8",
                )
            })?;
            Some(contents.trim_end_matches(['\r', '\n']).to_string())
        } else {
            self.env.get(ENV_AUTH_TOKEN).ok()
        };
        if let Some(token) = &token {
            if token.contains('\r') || token.contains('\n') {
                return Err(CredentialsError::invalid_configuration(
                    "the container authorization token must not contain line breaks",
                ));
            }
        }
        Ok(token)
    }
}

impl ProvideCredentials for EcsCredentialsProvider {
    fn provide_credentials<'a>(&'a self) -> future::ProvideCredentials<'a>
    where
        Self: 'a,
    {
        future::ProvideCredentials::new(self.credentials())
    }
}

/// Validate that a full container-credentials URI points at an allowed endpoint
///
/// `https` URIs are always allowed. Plain `http` is only allowed for loopback addresses
/// and the fixed container metadata addresses.
fn validate_full_uri(uri: &str) -> Result<(), CredentialsError> {
    if uri.starts_with("https://") {
        return Ok(());
    }
    let rest = uri.strip_prefix("http://").ok_or_else(|| {
        CredentialsError::invalid_configuration(format!(
            "`{}`: the container credentials URI must be `https` or `http`",
            ENV_FULL_URI
        ))
    })?;
    let authority = rest.split(['/', '?']).next().unwrap_or(rest);
    let host = if let Some(bracketed) = authority.strip_prefix('[') {
        // IPv6 literal, [host]:port
        bracketed.split(']').next().unwrap_or(bracketed)
    } else {
        authority.split(':').next().unwrap_or(authority)
    };
    let allowed = host == "localhost"
        || host.starts_with("127.")
        || host == "::1"
        || host == "169.254.170.2"
        || host == "169.254.170.23"
        || host == "fd00:ec2::23";
    if allowed {
        Ok(())
    } else {
        Err(CredentialsError::invalid_configuration(format!(
            "`{}` must be an `https` URI or point at a loopback or container metadata address (host was `{}`)",
            ENV_FULL_URI, host
        )))
    }
}

/// Builder for [`EcsCredentialsProvider`]
#[derive(Debug, Default)]
pub struct Builder {
    provider_config: Option<ProviderConfig>,
}

impl Builder {
    /// Override the configuration used for this provider
    pub fn configure(mut self, provider_config: &ProviderConfig) -> Self {
        self.provider_config = Some(provider_config.clone());
        self
    }

    /// Create the [`EcsCredentialsProvider`]
    ///
    /// # Panics
    /// A metadata connector must be set on the [`ProviderConfig`].
    pub fn build(self) -> EcsCredentialsProvider {
        let config = self.provider_config.unwrap_or_default();
        EcsCredentialsProvider {
            env: config.env(),
            fs: config.fs(),
            connector: config
                .connector()
                .expect("a metadata connector is required to load ECS credentials"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::{validate_full_uri, EcsCredentialsProvider};
    use crate::connector::{ConnectorError, HttpResponse, MetadataConnector};
    use crate::os_shim::{Env, Fs};
    use crate::provider::{CredentialsError, ProvideCredentials};
    use crate::provider_config::ProviderConfig;
    use crate::BoxFuture;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    #[derive(Debug)]
    struct FakeConnector {
        response: HttpResponse,
        requests: Mutex<Vec<(String, Vec<(String, String)>)>>,
    }

    impl FakeConnector {
        fn new(response: HttpResponse) -> Arc<Self> {
            Arc::new(Self {
                response,
                requests: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<(String, Vec<(String, String)>)> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl MetadataConnector for FakeConnector {
        fn get<'a>(
            &'a self,
            uri: &'a str,
            headers: &'a [(&'a str, &'a str)],
        ) -> BoxFuture<'a, Result<HttpResponse, ConnectorError>> {
            Box::pin(async move {
                self.requests.lock().unwrap().push((
                    uri.to_string(),
                    headers
                        .iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect(),
                ));
                Ok(self.response.clone())
            })
        }
    }

    const OK_RESPONSE: &str = r#"{
        "AccessKeyId" : "AKID",
        "SecretAccessKey" : "SECRET",
        "Token" : "TOKEN",
        "Expiration" : "2099-09-18T03:31:56Z"
    }"#;

    fn provider(env: Env, fs: Fs, connector: Arc<FakeConnector>) -> EcsCredentialsProvider {
        let config = ProviderConfig::default()
            .with_env(env)
            .with_fs(fs)
            .with_metadata_connector(connector);
        EcsCredentialsProvider::builder().configure(&config).build()
    }

    #[tokio::test]
    async fn relative_uri_joins_the_fixed_host() {
        let connector = FakeConnector::new(HttpResponse::new(200, OK_RESPONSE));
        let provider = provider(
            Env::from_slice(&[("AWS_CONTAINER_CREDENTIALS_RELATIVE_URI", "/task-role")]),
            Fs::from_map(HashMap::new()),
            connector.clone(),
        );
        let creds = provider.provide_credentials().await.expect("creds");
        assert_eq!(creds.access_key_id(), "AKID");
        let requests = connector.requests();
        assert_eq!(requests[0].0, "http://169.254.170.2/task-role");
        assert!(requests[0].1.is_empty(), "no auth header expected");
    }

    #[tokio::test]
    async fn auth_token_file_preferred_over_env_token() {
        let connector = FakeConnector::new(HttpResponse::new(200, OK_RESPONSE));
        let mut files = HashMap::new();
        files.insert("/token/file".to_string(), b"file-token\n".to_vec());
        let provider = provider(
            Env::from_slice(&[
                ("AWS_CONTAINER_CREDENTIALS_RELATIVE_URI", "/task-role"),
                ("AWS_CONTAINER_AUTHORIZATION_TOKEN_FILE", "/token/file"),
                ("AWS_CONTAINER_AUTHORIZATION_TOKEN", "env-token"),
            ]),
            Fs::from_map(files),
            connector.clone(),
        );
        provider.provide_credentials().await.expect("creds");
        let requests = connector.requests();
        assert_eq!(
            requests[0].1,
            vec![("Authorization".to_string(), "file-token".to_string())]
        );
    }

    #[tokio::test]
    async fn embedded_newline_in_token_is_rejected() {
        let connector = FakeConnector::new(HttpResponse::new(200, OK_RESPONSE));
        let provider = provider(
            Env::from_slice(&[
                ("AWS_CONTAINER_CREDENTIALS_RELATIVE_URI", "/task-role"),
                ("AWS_CONTAINER_AUTHORIZATION_TOKEN", "bad\ntoken"),
            ]),
            Fs::from_map(HashMap::new()),
            connector,
        );
        let err = provider.provide_credentials().await.expect_err("invalid");
        assert!(matches!(err, CredentialsError::InvalidConfiguration(_)));
    }

    #[tokio::test]
    async fn no_env_vars_is_not_loaded() {
        let connector = FakeConnector::new(HttpResponse::new(200, OK_RESPONSE));
        let provider = provider(
            Env::from_slice(&[]),
            Fs::from_map(HashMap::new()),
            connector,
        );
        let err = provider.provide_credentials().await.expect_err("unset");
        assert!(matches!(err, CredentialsError::CredentialsNotLoaded));
    }

    #[tokio::test]
    async fn error_document_maps_to_typed_error() {
        let connector = FakeConnector::new(HttpResponse::new(
            200,
            r#"{"Code": "AssumeRoleUnauthorizedAccess", "Message": "not allowed"}"#,
        ));
        let provider = provider(
            Env::from_slice(&[("AWS_CONTAINER_CREDENTIALS_RELATIVE_URI", "/task-role")]),
            Fs::from_map(HashMap::new()),
            connector,
        );
        let err = provider.provide_credentials().await.expect_err("denied");
        assert!(matches!(err, CredentialsError::InvalidConfiguration(_)));
    }

    #[test]
    fn full_uri_validation() {
        assert!(validate_full_uri("https://example.amazonaws.com/creds").is_ok());
        assert!(validate_full_uri("http://localhost:8080/creds").is_ok());
        assert!(validate_full_uri("http://127.0.0.1/creds").is_ok());
        assert!(validate_full_uri("http://[::1]:9999/creds").is_ok());
        assert!(validate_full_uri("http://169.254.170.2/creds").is_ok());
        assert!(validate_full_uri("http://169.254.170.23/creds").is_ok());
        assert!(validate_full_uri("http://[fd00:ec2::23]/creds").is_ok());
        assert!(validate_full_uri("http://192.168.1.1/creds").is_err());
        assert!(validate_full_uri("ftp://localhost/creds").is_err());
    }
}

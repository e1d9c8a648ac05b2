/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

use crate::provider::{self, future, CredentialsError, ProvideCredentials};
use std::borrow::Cow;
use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;
use tracing::Instrument;

/// Credentials provider that checks a series of inner providers
///
/// Each provider is checked in turn. The first provider that returns a successful
/// credential is used. ANY error, configuration errors included, triggers fallthrough
/// to the next provider. When every provider has failed, the chain returns a single
/// [`ChainExhaustedError`] that names each provider and nests its error, in order.
///
/// ## Example
/// ```rust
/// use aws_auth::meta::credentials::CredentialsProviderChain;
/// use aws_auth::environment::EnvironmentVariableCredentialsProvider;
/// use aws_auth::Credentials;
/// let provider = CredentialsProviderChain::first_try("Environment", EnvironmentVariableCredentialsProvider::new())
///     .or_else("Static", Credentials::from_keys("someaccesskeyid", "somesecret", None));
/// ```
#[derive(Debug)]
pub struct CredentialsProviderChain {
    providers: Vec<(Cow<'static, str>, Arc<dyn ProvideCredentials>)>,
}

impl CredentialsProviderChain {
    /// Create a `CredentialsProviderChain` that begins by evaluating this provider
    pub fn first_try(
        name: impl Into<Cow<'static, str>>,
        provider: impl ProvideCredentials + 'static,
    ) -> Self {
        CredentialsProviderChain {
            providers: vec![(name.into(), Arc::new(provider))],
        }
    }

    /// Add a fallback provider to the end of the chain
    pub fn or_else(
        mut self,
        name: impl Into<Cow<'static, str>>,
        provider: impl ProvideCredentials + 'static,
    ) -> Self {
        self.providers.push((name.into(), Arc::new(provider)));
        self
    }

    async fn credentials(&self) -> provider::Result {
        let mut failures = Vec::with_capacity(self.providers.len());
        for (name, provider) in &self.providers {
            let span = tracing::info_span!("load_credentials", provider = %name);
            match provider.provide_credentials().instrument(span).await {
                Ok(credentials) => {
                    tracing::info!(provider = %name, "loaded credentials");
                    return Ok(credentials);
                }
                Err(err) => {
                    tracing::info!(provider = %name, error = %err, "provider in chain did not provide credentials");
                    failures.push((name.clone(), err));
                }
            }
        }
        Err(CredentialsError::provider_error(ChainExhaustedError {
            failures,
        }))
    }
}

impl ProvideCredentials for CredentialsProviderChain {
    fn provide_credentials<'a>(&'a self) -> future::ProvideCredentials<'a>
    where
        Self: 'a,
    {
        future::ProvideCredentials::new(self.credentials())
    }
}

/// Every provider in a [`CredentialsProviderChain`] failed
///
/// The message names each attempted provider; [`failures`](ChainExhaustedError::failures)
/// exposes the individual errors in attempt order so callers can diagnose why each layer
/// failed without re-running at a higher log level.
#[derive(Debug, Clone)]
pub struct ChainExhaustedError {
    failures: Vec<(Cow<'static, str>, CredentialsError)>,
}

impl ChainExhaustedError {
    /// The name and error of each attempted provider, in attempt order
    pub fn failures(&self) -> impl Iterator<Item = (&str, &CredentialsError)> {
        self.failures
            .iter()
            .map(|(name, err)| (name.as_ref(), err))
    }
}

impl Display for ChainExhaustedError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "no providers in the chain provided credentials. Attempted: [{}].",
            self.failures
                .iter()
                .map(|(name, _)| name.as_ref())
                .collect::<Vec<_>>()
                .join(", ")
        )?;
        for (name, err) in &self.failures {
            write!(f, "\n  {}: {}", name, err)?;
        }
        Ok(())
    }
}

impl Error for ChainExhaustedError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.failures.first().map(|(_, err)| err as _)
    }
}

/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Credentials providers: the [`ProvideCredentials`] trait, its error type, and
//! shared wrappers.
//!
//! ## Implementing your own credentials provider
//!
//! While for many use cases a built-in credentials provider is sufficient, you may want to
//! implement your own. Generally, this is best done by defining an inherent `async fn` on
//! your structure, then calling that method directly from the trait implementation.
//! ```rust
//! use aws_auth::provider::{self, future, CredentialsError, ProvideCredentials};
//! use aws_auth::Credentials;
//! struct SubprocessCredentialProvider;
//!
//! async fn invoke_command(command: &str) -> String {
//!     // implementation elided...
//!     # String::from("some credentials")
//! }
//!
//! /// Parse access key and secret from the first two lines of a string
//! fn parse_credentials(creds: &str) -> provider::Result {
//!     let mut lines = creds.lines();
//!     let akid = lines.next().ok_or_else(|| CredentialsError::provider_error("invalid credentials"))?;
//!     let secret = lines.next().ok_or_else(|| CredentialsError::provider_error("invalid credentials"))?;
//!     Ok(Credentials::new(akid, secret, None, None, "CustomCommand"))
//! }
//!
//! impl SubprocessCredentialProvider {
//!     async fn load_credentials(&self) -> provider::Result {
//!         let creds = invoke_command("load-credentials.py").await;
//!         parse_credentials(&creds)
//!     }
//! }
//!
//! impl std::fmt::Debug for SubprocessCredentialProvider {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "SubprocessCredentialProvider")
//!     }
//! }
//!
//! impl ProvideCredentials for SubprocessCredentialProvider {
//!     fn provide_credentials<'a>(&'a self) -> future::ProvideCredentials<'a> where Self: 'a {
//!         future::ProvideCredentials::new(self.load_credentials())
//!     }
//! }
//! ```

pub mod token;

use crate::Credentials;
use std::error::Error;
use std::fmt::{self, Debug, Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

/// Error returned when credentials could not be resolved
///
/// Wrapped causes are reference counted so a single resolution outcome can be fanned out
/// to every caller coalesced behind the credentials cache.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum CredentialsError {
    /// No credentials were available for this provider
    CredentialsNotLoaded,

    /// Loading credentials from this provider exceeded the maximum allowed duration
    ProviderTimedOut(Duration),

    /// The provider was given an invalid configuration
    ///
    /// For example:
    /// - syntax error in ~/.aws/config
    /// - assume role profile that forms an infinite loop
    /// - expired SSO session requiring a new login
    InvalidConfiguration(Arc<dyn Error + Send + Sync>),

    /// The provider experienced an error during credential resolution
    ///
    /// This may include errors like a 503 from STS or a file system error when attempting to
    /// read a configuration file.
    ProviderError(Arc<dyn Error + Send + Sync>),

    /// An unexpected error occurred during credential resolution
    ///
    /// If the error is something that can occur during expected usage of a provider,
    /// `ProviderError` should be returned instead. Unhandled is reserved for exceptional cases,
    /// for example:
    /// - Returned data not UTF-8
    /// - A provider returns data that is missing required fields
    Unhandled(Arc<dyn Error + Send + Sync>),
}

impl CredentialsError {
    /// The provider had nothing to offer, the next provider in a chain should be tried.
    pub fn not_loaded() -> Self {
        CredentialsError::CredentialsNotLoaded
    }

    /// The provider was misconfigured by the user; the message should carry a remediation hint.
    pub fn invalid_configuration(source: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        CredentialsError::InvalidConfiguration(Arc::from(source.into()))
    }

    /// The provider attempted resolution but the backing service or process failed.
    pub fn provider_error(source: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        CredentialsError::ProviderError(Arc::from(source.into()))
    }

    /// Catch-all for responses missing expected fields and other "never happens" cases.
    pub fn unhandled(source: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        CredentialsError::Unhandled(Arc::from(source.into()))
    }
}

impl Display for CredentialsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            CredentialsError::CredentialsNotLoaded => {
                write!(f, "The provider could not provide credentials or required configuration was not set")
            }
            CredentialsError::ProviderTimedOut(d) => write!(
                f,
                "Credentials provider timed out after {} seconds",
                d.as_secs()
            ),
            CredentialsError::Unhandled(err) => write!(f, "Unexpected credentials error: {}", err),
            CredentialsError::InvalidConfiguration(err) => {
                write!(f, "The credentials provider was not properly configured: {}", err)
            }
            CredentialsError::ProviderError(err) => {
                write!(f, "An error occurred while loading credentials: {}", err)
            }
        }
    }
}

impl Error for CredentialsError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CredentialsError::InvalidConfiguration(e)
            | CredentialsError::ProviderError(e)
            | CredentialsError::Unhandled(e) => Some(e.as_ref() as _),
            _ => None,
        }
    }
}

/// Result of a credentials resolution attempt
pub type Result = std::result::Result<Credentials, CredentialsError>;

pub mod future {
    //! Future types returned by [`ProvideCredentials`](super::ProvideCredentials).

    use std::future::Future;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

    enum Inner<'a, T> {
        Ready(Option<T>),
        Boxed(BoxFuture<'a, T>),
    }

    /// Future returned by [`ProvideCredentials::provide_credentials`](super::ProvideCredentials::provide_credentials)
    ///
    /// - When wrapping an already-loaded value, use [`ready`](ProvideCredentials::ready).
    /// - When wrapping an asynchronous load, use [`new`](ProvideCredentials::new).
    pub struct ProvideCredentials<'a>(Inner<'a, super::Result>);

    impl<'a> ProvideCredentials<'a> {
        /// A future that will resolve when `future` completes.
        pub fn new(future: impl Future<Output = super::Result> + Send + 'a) -> Self {
            ProvideCredentials(Inner::Boxed(Box::pin(future)))
        }

        /// A future that is immediately ready with `credentials`.
        pub fn ready(credentials: super::Result) -> Self {
            ProvideCredentials(Inner::Ready(Some(credentials)))
        }
    }

    impl Future for ProvideCredentials<'_> {
        type Output = super::Result;

        fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
            match &mut self.get_mut().0 {
                Inner::Ready(value) => {
                    Poll::Ready(value.take().expect("future polled after completion"))
                }
                Inner::Boxed(future) => future.as_mut().poll(cx),
            }
        }
    }
}

/// Asynchronous credentials provider
pub trait ProvideCredentials: Send + Sync + Debug {
    /// Returns a future that provides credentials.
    fn provide_credentials<'a>(&'a self) -> future::ProvideCredentials<'a>
    where
        Self: 'a;
}

impl ProvideCredentials for Credentials {
    fn provide_credentials<'a>(&'a self) -> future::ProvideCredentials<'a>
    where
        Self: 'a,
    {
        future::ProvideCredentials::ready(Ok(self.clone()))
    }
}

impl ProvideCredentials for Arc<dyn ProvideCredentials> {
    fn provide_credentials<'a>(&'a self) -> future::ProvideCredentials<'a>
    where
        Self: 'a,
    {
        self.as_ref().provide_credentials()
    }
}

/// Credentials provider wrapper that may be shared
///
/// Newtype wrapper around [`ProvideCredentials`] that implements `Clone` using an internal
/// `Arc`.
#[derive(Clone, Debug)]
pub struct SharedCredentialsProvider(Arc<dyn ProvideCredentials>);

impl SharedCredentialsProvider {
    /// Create a new `SharedCredentialsProvider` from `ProvideCredentials`
    ///
    /// The given provider will be wrapped in an internal `Arc`. If your provider is already
    /// in an `Arc`, use `SharedCredentialsProvider::from(provider)` instead.
    pub fn new(provider: impl ProvideCredentials + 'static) -> Self {
        Self(Arc::new(provider))
    }
}

impl AsRef<dyn ProvideCredentials> for SharedCredentialsProvider {
    fn as_ref(&self) -> &(dyn ProvideCredentials + 'static) {
        self.0.as_ref()
    }
}

impl From<Arc<dyn ProvideCredentials>> for SharedCredentialsProvider {
    fn from(provider: Arc<dyn ProvideCredentials>) -> Self {
        SharedCredentialsProvider(provider)
    }
}

impl ProvideCredentials for SharedCredentialsProvider {
    fn provide_credentials<'a>(&'a self) -> future::ProvideCredentials<'a>
    where
        Self: 'a,
    {
        self.0.provide_credentials()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn errors_are_send_sync_and_clone() {
        assert_send_sync::<CredentialsError>();
        let err = CredentialsError::provider_error("the service exploded");
        let cloned = err.clone();
        assert_eq!(format!("{}", err), format!("{}", cloned));
    }

    #[tokio::test]
    async fn static_credentials_provide_themselves() {
        let creds = Credentials::from_keys("akid", "secret", None);
        let loaded = creds.provide_credentials().await.expect("always succeeds");
        assert_eq!(loaded, creds);
    }

    #[test]
    fn error_sources_are_preserved() {
        use std::error::Error as _;
        let err = CredentialsError::invalid_configuration("missing role_arn");
        assert!(err.source().is_some());
        assert!(CredentialsError::not_loaded().source().is_none());
    }
}

/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Bearer token providers: the [`ProvideToken`] trait and its error type.

use crate::Token;
use std::error::Error;
use std::fmt::{self, Debug, Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

/// Error returned when a bearer token could not be resolved
///
/// Mirrors [`CredentialsError`](crate::provider::CredentialsError); causes are reference
/// counted for the same single-flight fan-out reason.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum TokenError {
    /// No token was available from this provider
    TokenNotLoaded,

    /// Loading a token from this provider exceeded the maximum allowed duration
    ProviderTimedOut(Duration),

    /// The provider was given invalid configuration
    ///
    /// For example, a missing SSO cache file that requires the user to log in again.
    InvalidConfiguration(Arc<dyn Error + Send + Sync>),

    /// The provider experienced an error during token resolution
    ProviderError(Arc<dyn Error + Send + Sync>),

    /// An unexpected error occurred during token resolution
    Unhandled(Arc<dyn Error + Send + Sync>),
}

impl TokenError {
    pub fn not_loaded() -> Self {
        TokenError::TokenNotLoaded
    }

    pub fn invalid_configuration(source: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        TokenError::InvalidConfiguration(Arc::from(source.into()))
    }

    pub fn provider_error(source: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        TokenError::ProviderError(Arc::from(source.into()))
    }

    pub fn unhandled(source: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        TokenError::Unhandled(Arc::from(source.into()))
    }
}

impl Display for TokenError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TokenError::TokenNotLoaded => {
                write!(f, "The provider could not provide a token or required configuration was not set")
            }
            TokenError::ProviderTimedOut(d) => {
                write!(f, "Token provider timed out after {} seconds", d.as_secs())
            }
            TokenError::InvalidConfiguration(err) => {
                write!(f, "The token provider was not properly configured: {}", err)
            }
            TokenError::ProviderError(err) => {
                write!(f, "An error occurred while loading a token: {}", err)
            }
            TokenError::Unhandled(err) => write!(f, "Unexpected token error: {}", err),
        }
    }
}

impl Error for TokenError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            TokenError::InvalidConfiguration(e)
            | TokenError::ProviderError(e)
            | TokenError::Unhandled(e) => Some(e.as_ref() as _),
            _ => None,
        }
    }
}

impl From<TokenError> for crate::provider::CredentialsError {
    fn from(err: TokenError) -> Self {
        use crate::provider::CredentialsError;
        match err {
            TokenError::TokenNotLoaded => CredentialsError::CredentialsNotLoaded,
            TokenError::ProviderTimedOut(d) => CredentialsError::ProviderTimedOut(d),
            TokenError::InvalidConfiguration(e) => CredentialsError::InvalidConfiguration(e),
            TokenError::ProviderError(e) => CredentialsError::ProviderError(e),
            TokenError::Unhandled(e) => CredentialsError::Unhandled(e),
        }
    }
}

/// Result of a token resolution attempt
pub type Result = std::result::Result<Token, TokenError>;

pub mod future {
    //! Future types returned by [`ProvideToken`](super::ProvideToken).

    use std::future::Future;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

    enum Inner<'a, T> {
        Ready(Option<T>),
        Boxed(BoxFuture<'a, T>),
    }

    /// Future returned by [`ProvideToken::provide_token`](super::ProvideToken::provide_token)
    pub struct ProvideToken<'a>(Inner<'a, super::Result>);

    impl<'a> ProvideToken<'a> {
        /// A future that will resolve when `future` completes.
        pub fn new(future: impl Future<Output = super::Result> + Send + 'a) -> Self {
            ProvideToken(Inner::Boxed(Box::pin(future)))
        }

        /// A future that is immediately ready with `token`.
        pub fn ready(token: super::Result) -> Self {
            ProvideToken(Inner::Ready(Some(token)))
        }
    }

    impl Future for ProvideToken<'_> {
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

/// Asynchronous bearer token provider
pub trait ProvideToken: Send + Sync + Debug {
    /// Returns a future that provides a bearer token.
    fn provide_token<'a>(&'a self) -> future::ProvideToken<'a>
    where
        Self: 'a;
}

impl ProvideToken for Token {
    fn provide_token<'a>(&'a self) -> future::ProvideToken<'a>
    where
        Self: 'a,
    {
        future::ProvideToken::ready(Ok(self.clone()))
    }
}

/// Token provider wrapper that may be shared
#[derive(Clone, Debug)]
pub struct SharedTokenProvider(Arc<dyn ProvideToken>);

impl SharedTokenProvider {
    /// Create a new `SharedTokenProvider` from `ProvideToken`
    pub fn new(provider: impl ProvideToken + 'static) -> Self {
        Self(Arc::new(provider))
    }
}

impl AsRef<dyn ProvideToken> for SharedTokenProvider {
    fn as_ref(&self) -> &(dyn ProvideToken + 'static) {
        self.0.as_ref()
    }
}

impl ProvideToken for SharedTokenProvider {
    fn provide_token<'a>(&'a self) -> future::ProvideToken<'a>
    where
        Self: 'a,
    {
        self.0.provide_token()
    }
}

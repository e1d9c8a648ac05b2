/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Bearer token used for HTTP auth schemes that are not SigV4 (for example, SSO).

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;
use zeroize::Zeroizing;

/// An access token used for bearer authentication
///
/// Distinct from [`Credentials`](crate::Credentials): a token is a single opaque string
/// plus an optional expiration and an opaque attribute bag. `Token` is cheap to clone.
#[derive(Clone)]
pub struct Token(Arc<TokenInner>);

struct TokenInner {
    token: Zeroizing<String>,
    expiration: Option<SystemTime>,
    attributes: HashMap<String, String>,
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("token", &"** redacted **")
            .field("expiration", &self.0.expiration)
            .finish()
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
            && self.expiration() == other.expiration()
            && self.0.attributes == other.0.attributes
    }
}

impl Eq for Token {}

impl Token {
    /// Create a new token with the given expiration.
    pub fn new(token: impl Into<String>, expiration: Option<SystemTime>) -> Self {
        Token(Arc::new(TokenInner {
            token: Zeroizing::new(token.into()),
            expiration,
            attributes: HashMap::new(),
        }))
    }

    /// Attach an opaque attribute to this token.
    pub fn with_attribute(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut attributes = self.0.attributes.clone();
        attributes.insert(key.into(), value.into());
        Token(Arc::new(TokenInner {
            token: self.0.token.clone(),
            expiration: self.0.expiration,
            attributes,
        }))
    }

    /// The underlying token string.
    pub fn as_str(&self) -> &str {
        &self.0.token
    }

    /// The time at which this token will no longer be valid, if any.
    pub fn expiration(&self) -> Option<SystemTime> {
        self.0.expiration
    }

    /// Look up an opaque attribute by key.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.0.attributes.get(key).map(|v| v.as_str())
    }
}

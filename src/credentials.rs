/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! AWS credentials: an access key id / secret access key pair, optionally with a
//! session token, an expiration, and the account id they belong to.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use zeroize::Zeroizing;

/// AWS SDK Credentials
///
/// An opaque struct representing credentials that may be used in an AWS SDK, modeled on
/// the [CRT credentials implementation](https://github.com/awslabs/aws-c-auth/blob/main/source/credentials.c).
///
/// When `expires_after` is set, the credentials will expire at the specified point in time. When it
/// is unset, the credentials do not expire.
///
/// `Credentials` is cheap to clone: the fields are reference counted and shared between clones.
#[derive(Clone)]
pub struct Credentials(Arc<Inner>);

struct Inner {
    access_key_id: Zeroizing<String>,
    secret_access_key: Zeroizing<String>,
    session_token: Zeroizing<Option<String>>,

    /// Credential expiry time
    ///
    /// Credentials will no longer be valid past this point. `None` means the credentials
    /// do not expire.
    expires_after: Option<SystemTime>,

    account_id: Option<String>,

    provider_name: &'static str,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut creds = f.debug_struct("Credentials");
        creds
            .field("provider_name", &self.0.provider_name)
            .field("access_key_id", &self.0.access_key_id.as_str())
            .field("secret_access_key", &"** redacted **");
        if let Some(expiry) = self.expiry() {
            creds.field("expires_after", &expiry);
        } else {
            creds.field("expires_after", &"never");
        }
        if let Some(account_id) = self.account_id() {
            creds.field("account_id", &account_id);
        }
        creds.finish()
    }
}

impl PartialEq for Credentials {
    fn eq(&self, other: &Self) -> bool {
        self.access_key_id() == other.access_key_id()
            && self.secret_access_key() == other.secret_access_key()
            && self.session_token() == other.session_token()
            && self.expiry() == other.expiry()
            && self.account_id() == other.account_id()
    }
}

impl Eq for Credentials {}

impl Credentials {
    /// Create new credentials.
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: Option<String>,
        expires_after: Option<SystemTime>,
        provider_name: &'static str,
    ) -> Self {
        Credentials(Arc::new(Inner {
            access_key_id: Zeroizing::new(access_key_id.into()),
            secret_access_key: Zeroizing::new(secret_access_key.into()),
            session_token: Zeroizing::new(session_token),
            expires_after,
            account_id: None,
            provider_name,
        }))
    }

    /// Create credentials directly from an access key pair.
    ///
    /// The resulting credentials never expire and are attributed to a static provider.
    pub fn from_keys(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: Option<String>,
    ) -> Self {
        Credentials::new(
            access_key_id,
            secret_access_key,
            session_token,
            None,
            STATIC_CREDENTIALS,
        )
    }

    /// Attach an account id to these credentials.
    pub fn with_account_id(self, account_id: impl Into<String>) -> Self {
        let inner = &self.0;
        Credentials(Arc::new(Inner {
            access_key_id: inner.access_key_id.clone(),
            secret_access_key: inner.secret_access_key.clone(),
            session_token: inner.session_token.clone(),
            expires_after: inner.expires_after,
            account_id: Some(account_id.into()),
            provider_name: inner.provider_name,
        }))
    }

    pub fn access_key_id(&self) -> &str {
        &self.0.access_key_id
    }

    pub fn secret_access_key(&self) -> &str {
        &self.0.secret_access_key
    }

    pub fn session_token(&self) -> Option<&str> {
        self.0.session_token.as_deref()
    }

    pub fn expiry(&self) -> Option<SystemTime> {
        self.0.expires_after
    }

    pub fn account_id(&self) -> Option<&str> {
        self.0.account_id.as_deref()
    }

    /// The name of the provider that resolved these credentials.
    pub fn provider_name(&self) -> &'static str {
        self.0.provider_name
    }
}

pub(crate) const STATIC_CREDENTIALS: &str = "Static";

/// Sentinel expiration for credentials documents that explicitly never expire.
pub(crate) fn max_expiration() -> SystemTime {
    // i64::MAX seconds is not representable on all platforms; one thousand years is
    // comfortably past any credential rotation policy.
    UNIX_EPOCH + Duration::from_secs(60 * 60 * 24 * 365 * 1000)
}

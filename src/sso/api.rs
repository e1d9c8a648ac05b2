/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Interface boundary for the SSO and SSO-OIDC service clients
//!
//! Request signing and the wire protocol are out of scope for this crate. Callers
//! supply implementations of [`GetRoleCredentials`] and [`CreateToken`]; tests use
//! in-memory fakes.

use crate::region::Region;
use crate::BoxFuture;
use std::error::Error;
use std::fmt::{self, Debug, Display, Formatter};
use std::time::{Duration, SystemTime};

/// A `GetRoleCredentials` request
#[non_exhaustive]
#[derive(Clone)]
pub struct RoleCredentialsRequest {
    /// The cached SSO access token authorizing the call
    pub access_token: String,
    /// AWS account to fetch role credentials for
    pub account_id: String,
    /// Name of the permission-set role
    pub role_name: String,
    /// Region whose SSO endpoint receives the call
    pub region: Region,
}

impl Debug for RoleCredentialsRequest {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoleCredentialsRequest")
            .field("access_token", &"** redacted **")
            .field("account_id", &self.account_id)
            .field("role_name", &self.role_name)
            .field("region", &self.region)
            .finish()
    }
}

/// Temporary role credentials vended by SSO
#[derive(Clone)]
pub struct RoleCredentials {
    /// The temporary access key id
    pub access_key_id: String,
    /// The temporary secret access key
    pub secret_access_key: String,
    /// The session token tied to these credentials
    pub session_token: String,
    /// When the credentials expire
    pub expiration: SystemTime,
}

impl Debug for RoleCredentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoleCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"** redacted **")
            .field("session_token", &"** redacted **")
            .field("expiration", &self.expiration)
            .finish()
    }
}

/// A `CreateToken` request using the `refresh_token` grant
#[non_exhaustive]
#[derive(Clone)]
pub struct CreateTokenRequest {
    /// Client id from the cached device registration
    pub client_id: String,
    /// Client secret from the cached device registration
    pub client_secret: String,
    /// The refresh token being redeemed
    pub refresh_token: String,
    /// Region whose OIDC endpoint receives the call
    pub region: Region,
}

impl Debug for CreateTokenRequest {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreateTokenRequest")
            .field("client_id", &self.client_id)
            .field("client_secret", &"** redacted **")
            .field("refresh_token", &"** redacted **")
            .field("region", &self.region)
            .finish()
    }
}

/// A fresh token minted by `CreateToken`
#[derive(Clone)]
pub struct CreatedToken {
    /// The new access token
    pub access_token: String,
    /// Lifetime of the new access token
    pub expires_in: Duration,
    /// A rotated refresh token, when the service issues one
    pub refresh_token: Option<String>,
}

impl Debug for CreatedToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreatedToken")
            .field("access_token", &"** redacted **")
            .field("expires_in", &self.expires_in)
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "** redacted **"),
            )
            .finish()
    }
}

/// Failure from the SSO or SSO-OIDC service
#[derive(Debug)]
#[non_exhaustive]
pub enum SsoError {
    /// The service rejected the call
    Service {
        /// The service's error code
        code: String,
        /// The service's message
        message: String,
    },
    /// The call never reached the service
    Transport(Box<dyn Error + Send + Sync>),
}

impl Display for SsoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SsoError::Service { code, message } => write!(f, "{}: {}", code, message),
            SsoError::Transport(err) => write!(f, "failed to reach the SSO service: {}", err),
        }
    }
}

impl Error for SsoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SsoError::Transport(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

/// The SSO operation needed by [`SsoCredentialsProvider`](crate::sso::SsoCredentialsProvider)
pub trait GetRoleCredentials: Send + Sync + Debug {
    /// Call `GetRoleCredentials`
    fn get_role_credentials(
        &self,
        request: RoleCredentialsRequest,
    ) -> BoxFuture<'_, Result<RoleCredentials, SsoError>>;
}

/// The SSO-OIDC operation needed by [`SsoTokenProvider`](crate::sso::SsoTokenProvider)
pub trait CreateToken: Send + Sync + Debug {
    /// Call `CreateToken` with the `refresh_token` grant
    fn create_token(
        &self,
        request: CreateTokenRequest,
    ) -> BoxFuture<'_, Result<CreatedToken, SsoError>>;
}

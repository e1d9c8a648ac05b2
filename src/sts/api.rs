/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Interface boundary for the STS service client
//!
//! Request signing and the wire protocol are out of scope for this crate. Callers
//! supply an implementation of [`AssumeRoles`]; tests use in-memory fakes.

use crate::region::Region;
use crate::BoxFuture;
use crate::Credentials;
use std::error::Error;
use std::fmt::{self, Debug, Display, Formatter};
use std::time::SystemTime;

/// An `AssumeRole` request
#[non_exhaustive]
#[derive(Clone, Debug)]
pub struct AssumeRoleRequest {
    /// The ARN of the role to assume
    pub role_arn: String,
    /// Session name recorded in CloudTrail
    pub session_name: String,
    /// External id expected by the role trust policy, if any
    pub external_id: Option<String>,
    /// Region whose STS endpoint receives the call
    pub region: Region,
    /// Credentials used to authenticate the call
    pub credentials: Credentials,
}

/// An `AssumeRoleWithWebIdentity` request
#[non_exhaustive]
#[derive(Clone)]
pub struct WebIdentityRequest {
    /// The ARN of the role to assume
    pub role_arn: String,
    /// Session name recorded in CloudTrail
    pub session_name: String,
    /// The OIDC token proving the caller's identity
    pub web_identity_token: String,
    /// Region whose STS endpoint receives the call
    pub region: Region,
}

impl Debug for WebIdentityRequest {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebIdentityRequest")
            .field("role_arn", &self.role_arn)
            .field("session_name", &self.session_name)
            .field("web_identity_token", &"** redacted **")
            .field("region", &self.region)
            .finish()
    }
}

/// Temporary credentials vended by STS
#[derive(Clone)]
pub struct StsCredentials {
    /// The temporary access key id
    pub access_key_id: String,
    /// The temporary secret access key
    pub secret_access_key: String,
    /// The session token tied to these credentials
    pub session_token: String,
    /// When the credentials expire
    pub expiration: SystemTime,
}

impl Debug for StsCredentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("StsCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"** redacted **")
            .field("session_token", &"** redacted **")
            .field("expiration", &self.expiration)
            .finish()
    }
}

/// Failure from the STS service
#[derive(Debug)]
#[non_exhaustive]
pub enum StsError {
    /// STS is not activated in the requested region
    RegionDisabled {
        /// The service's message
        message: String,
    },
    /// Any other service-side rejection
    Service {
        /// The service's error code
        code: String,
        /// The service's message
        message: String,
    },
    /// The call never reached the service
    Transport(Box<dyn Error + Send + Sync>),
}

impl Display for StsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            StsError::RegionDisabled { message } => {
                write!(f, "STS is disabled in this region: {}", message)
            }
            StsError::Service { code, message } => write!(f, "{}: {}", code, message),
            StsError::Transport(err) => write!(f, "failed to reach STS: {}", err),
        }
    }
}

impl Error for StsError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            StsError::Transport(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

/// STS operations needed by the credential providers
pub trait AssumeRoles: Send + Sync + Debug {
    /// Call `AssumeRole`
    fn assume_role(
        &self,
        request: AssumeRoleRequest,
    ) -> BoxFuture<'_, Result<StsCredentials, StsError>>;

    /// Call `AssumeRoleWithWebIdentity`
    fn assume_role_with_web_identity(
        &self,
        request: WebIdentityRequest,
    ) -> BoxFuture<'_, Result<StsCredentials, StsError>>;
}

/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! On-disk SSO token cache
//!
//! Tokens produced by `aws sso login` are stored under `~/.aws/sso/cache/` in a file
//! named by the SHA-1 hex digest of the session name (or, for legacy profiles, the
//! start URL), with a `.json` extension. This module reads and rewrites those files;
//! it never creates them from scratch — only the login flow does that.

use crate::os_shim::{Env, Fs, Props};
use crate::profile::{home_dir, Os};
use sha1::{Digest, Sha1};
use std::error::Error;
use std::fmt::{self, Debug, Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use zeroize::Zeroizing;

/// A cached SSO token and the registration that can refresh it
///
/// `refresh_token`, `client_id` and `client_secret` are only present for
/// `sso-session`-style logins; legacy start-URL tokens cannot be refreshed.
#[derive(Clone)]
pub(crate) struct CachedSsoToken {
    pub(crate) access_token: Zeroizing<String>,
    pub(crate) expires_at: SystemTime,
    pub(crate) refresh_token: Option<Zeroizing<String>>,
    pub(crate) client_id: Option<String>,
    pub(crate) client_secret: Option<Zeroizing<String>>,
    pub(crate) registration_expires_at: Option<SystemTime>,
    pub(crate) region: Option<String>,
    pub(crate) start_url: Option<String>,
}

impl CachedSsoToken {
    /// True when this token carries everything needed to call `CreateToken`
    pub(crate) fn refreshable(&self) -> bool {
        self.refresh_token.is_some() && self.client_id.is_some() && self.client_secret.is_some()
    }
}

impl Debug for CachedSsoToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedSsoToken")
            .field("access_token", &"** redacted **")
            .field("expires_at", &self.expires_at)
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "** redacted **"),
            )
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "** redacted **"),
            )
            .field("registration_expires_at", &self.registration_expires_at)
            .field("region", &self.region)
            .field("start_url", &self.start_url)
            .finish()
    }
}

/// The document shape written by `aws sso login`. Unknown fields are ignored.
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct CacheFileDocument {
    access_token: String,
    expires_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    registration_expires_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    start_url: Option<String>,
}

/// Failed to read or write the SSO token cache
#[derive(Debug)]
#[non_exhaustive]
pub enum TokenCacheError {
    /// No home directory could be resolved, so the cache location is unknown
    NoHomeDirectory,

    /// An I/O operation on the cache file failed
    IoError {
        /// What was being attempted
        what: &'static str,
        /// The cache file path
        path: PathBuf,
        /// The underlying error
        source: std::io::Error,
    },

    /// The cache file was not valid JSON, or was missing a required field
    InvalidJson {
        /// The cache file path
        path: PathBuf,
        /// The underlying error
        source: serde_json::Error,
    },

    /// A timestamp field was not a valid RFC-3339 date-time
    InvalidTimestamp {
        /// Which field was malformed
        field: &'static str,
        /// The underlying error
        source: time::error::Parse,
    },

    /// A timestamp could not be rendered back to RFC-3339
    UnformattableTimestamp(time::error::Format),
}

impl Display for TokenCacheError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TokenCacheError::NoHomeDirectory => {
                write!(f, "could not resolve a home directory to locate the SSO token cache")
            }
            TokenCacheError::IoError { what, path, .. } => {
                write!(f, "failed to {} `{}`", what, path.display())
            }
            TokenCacheError::InvalidJson { path, .. } => {
                write!(f, "invalid SSO token cache file `{}`", path.display())
            }
            TokenCacheError::InvalidTimestamp { field, .. } => {
                write!(f, "`{}` was not a valid RFC-3339 date-time", field)
            }
            TokenCacheError::UnformattableTimestamp(_) => {
                write!(f, "failed to format a token timestamp")
            }
        }
    }
}

impl Error for TokenCacheError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            TokenCacheError::IoError { source, .. } => Some(source),
            TokenCacheError::InvalidJson { source, .. } => Some(source),
            TokenCacheError::InvalidTimestamp { source, .. } => Some(source),
            TokenCacheError::UnformattableTimestamp(source) => Some(source),
            TokenCacheError::NoHomeDirectory => None,
        }
    }
}

/// Compute the cache file path for a session name or start URL
///
/// The identifier is trimmed before hashing; the file name is the SHA-1 hex digest
/// with a `.json` extension.
pub(crate) fn cached_token_path(identifier: &str, home: &Path) -> PathBuf {
    let digest = hex::encode(Sha1::digest(identifier.trim().as_bytes()));
    let mut path = home.join(".aws").join("sso").join("cache");
    path.push(digest);
    path.set_extension("json");
    path
}

fn resolve_cache_path(
    identifier: &str,
    env: &Env,
    props: &Props,
) -> Result<PathBuf, TokenCacheError> {
    let home = home_dir(env, props, Os::real()).ok_or(TokenCacheError::NoHomeDirectory)?;
    Ok(cached_token_path(identifier, &home))
}

fn parse_timestamp(value: &str, field: &'static str) -> Result<SystemTime, TokenCacheError> {
    OffsetDateTime::parse(value, &Rfc3339)
        .map(SystemTime::from)
        .map_err(|source| TokenCacheError::InvalidTimestamp { field, source })
}

fn format_timestamp(value: SystemTime) -> Result<String, TokenCacheError> {
    OffsetDateTime::from(value)
        .format(&Rfc3339)
        .map_err(TokenCacheError::UnformattableTimestamp)
}

/// Load the cached token for `identifier` (an `sso-session` name or a start URL)
pub(crate) fn load_cached_token(
    identifier: &str,
    env: &Env,
    fs: &Fs,
    props: &Props,
) -> Result<CachedSsoToken, TokenCacheError> {
    let path = resolve_cache_path(identifier, env, props)?;
    let bytes = fs
        .read_to_end(&path)
        .map_err(|source| TokenCacheError::IoError {
            what: "read",
            path: path.clone(),
            source,
        })?;
    let document: CacheFileDocument =
        serde_json::from_slice(&bytes).map_err(|source| TokenCacheError::InvalidJson {
            path: path.clone(),
            source,
        })?;
    Ok(CachedSsoToken {
        access_token: Zeroizing::new(document.access_token),
        expires_at: parse_timestamp(&document.expires_at, "expiresAt")?,
        refresh_token: document.refresh_token.map(Zeroizing::new),
        client_id: document.client_id,
        client_secret: document.client_secret.map(Zeroizing::new),
        registration_expires_at: document
            .registration_expires_at
            .as_deref()
            .map(|ts| parse_timestamp(ts, "registrationExpiresAt"))
            .transpose()?,
        region: document.region,
        start_url: document.start_url,
    })
}

/// Persist a refreshed token back to the cache file
///
/// The file is rewritten in place through [`Fs::write`], which replaces the contents
/// atomically so a crashed writer never leaves a truncated document behind.
pub(crate) fn save_cached_token(
    identifier: &str,
    token: &CachedSsoToken,
    env: &Env,
    fs: &Fs,
    props: &Props,
) -> Result<(), TokenCacheError> {
    let path = resolve_cache_path(identifier, env, props)?;
    let document = CacheFileDocument {
        access_token: token.access_token.to_string(),
        expires_at: format_timestamp(token.expires_at)?,
        refresh_token: token.refresh_token.as_ref().map(|t| t.to_string()),
        client_id: token.client_id.clone(),
        client_secret: token.client_secret.as_ref().map(|s| s.to_string()),
        registration_expires_at: token
            .registration_expires_at
            .map(format_timestamp)
            .transpose()?,
        region: token.region.clone(),
        start_url: token.start_url.clone(),
    };
    let json = serde_json::to_string_pretty(&document).map_err(|source| {
        TokenCacheError::InvalidJson {
            path: path.clone(),
            source,
        }
    })?;
    fs.write(&path, json.as_bytes())
        .map_err(|source| TokenCacheError::IoError {
            what: "write",
            path,
            source,
        })
}

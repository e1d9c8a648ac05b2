/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Parser for the JSON credentials document shared by the process, ECS, and IMDS providers

use crate::credentials::max_expiration;
use crate::provider::CredentialsError;
use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::time::SystemTime;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Failed to parse a JSON credentials document
#[derive(Debug)]
pub(crate) enum InvalidJsonCredentials {
    /// The response did not contain valid JSON
    JsonError(Box<dyn Error + Send + Sync>),
    /// The response was missing a required field
    MissingField(&'static str),
    /// A field contained an invalid value
    InvalidField {
        field: &'static str,
        err: Box<dyn Error + Send + Sync>,
    },
    /// Another unhandled error occurred
    Other(String),
}

impl Display for InvalidJsonCredentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            InvalidJsonCredentials::JsonError(json) => {
                write!(f, "invalid JSON in response: {}", json)
            }
            InvalidJsonCredentials::MissingField(field) => write!(
                f,
                "Expected field `{}` in response but it was missing",
                field
            ),
            InvalidJsonCredentials::InvalidField { field, err } => {
                write!(f, "Invalid field in response: `{}`. {}", field, err)
            }
            InvalidJsonCredentials::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl Error for InvalidJsonCredentials {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            InvalidJsonCredentials::JsonError(err) => Some(err.as_ref()),
            InvalidJsonCredentials::InvalidField { err, .. } => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for InvalidJsonCredentials {
    fn from(err: serde_json::Error) -> Self {
        InvalidJsonCredentials::JsonError(err.into())
    }
}

/// Credentials parsed from a successful response
#[derive(PartialEq, Eq)]
pub(crate) struct RefreshableCredentials {
    pub(crate) access_key_id: String,
    pub(crate) secret_access_key: String,
    pub(crate) session_token: String,
    pub(crate) account_id: Option<String>,
    pub(crate) expiration: SystemTime,
}

impl fmt::Debug for RefreshableCredentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshableCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"** redacted **")
            .field("session_token", &"** redacted **")
            .field("account_id", &self.account_id)
            .field("expiration", &self.expiration)
            .finish()
    }
}

/// The two shapes a JSON credentials document can take
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum JsonCredentials {
    RefreshableCredentials(RefreshableCredentials),
    Error { code: String, message: String },
}

/// Parse the JSON credentials-or-error document returned by the ECS and IMDS endpoints
///
/// The document is a success shape when `Code` is absent or `"Success"` (case insensitive):
/// ```json
/// {
///   "Code": "Success",
///   "AccessKeyId" : "ASIA...",
///   "SecretAccessKey" : "secret",
///   "Token" : "token",
///   "Expiration" : "2021-05-28T23:10:01Z"
/// }
/// ```
/// Any other `Code` makes it an error shape with a `Message`. Unknown fields are ignored.
pub(crate) fn parse_json_credentials(
    credentials_response: &str,
) -> Result<JsonCredentials, InvalidJsonCredentials> {
    let doc: serde_json::Value = serde_json::from_str(credentials_response)?;
    let obj = doc
        .as_object()
        .ok_or_else(|| InvalidJsonCredentials::Other("expected a JSON object".into()))?;
    let str_field = |name: &str| obj.get(name).and_then(|v| v.as_str());

    let code = str_field("Code");
    match code {
        None | Some(_) if code.map(|c| c.eq_ignore_ascii_case("Success")).unwrap_or(true) => {
            let access_key_id = str_field("AccessKeyId")
                .ok_or(InvalidJsonCredentials::MissingField("AccessKeyId"))?;
            let secret_access_key = str_field("SecretAccessKey")
                .ok_or(InvalidJsonCredentials::MissingField("SecretAccessKey"))?;
            let session_token =
                str_field("Token").ok_or(InvalidJsonCredentials::MissingField("Token"))?;
            let expiration =
                str_field("Expiration").ok_or(InvalidJsonCredentials::MissingField("Expiration"))?;
            let expiration = parse_expiration("Expiration", expiration)?;
            Ok(JsonCredentials::RefreshableCredentials(
                RefreshableCredentials {
                    access_key_id: access_key_id.to_string(),
                    secret_access_key: secret_access_key.to_string(),
                    session_token: session_token.to_string(),
                    account_id: str_field("AccountId").map(ToString::to_string),
                    expiration,
                },
            ))
        }
        Some(code) => {
            let message =
                str_field("Message").ok_or(InvalidJsonCredentials::MissingField("Message"))?;
            Ok(JsonCredentials::Error {
                code: code.to_string(),
                message: message.to_string(),
            })
        }
        // the first arm has a guard, so the compiler cannot see that it is exhaustive
        None => unreachable!("code=None is handled by the first arm"),
    }
}

/// Parse the stdout of a `credential_process` invocation
///
/// This document is keyed case insensitively and requires `"Version": 1`. Unlike the
/// metadata endpoints, `Expiration` is optional: credentials without one never expire.
pub(crate) fn parse_credential_process_json_credentials(
    credentials_response: &str,
) -> Result<RefreshableCredentials, InvalidJsonCredentials> {
    let doc: serde_json::Value = serde_json::from_str(credentials_response)?;
    let obj = doc
        .as_object()
        .ok_or_else(|| InvalidJsonCredentials::Other("expected a JSON object".into()))?;
    let field = |name: &str| {
        obj.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    };
    let str_field = |name: &str| field(name).and_then(|v| v.as_str());

    match field("Version").and_then(|v| v.as_i64()) {
        Some(1) => { /* continue */ }
        None => return Err(InvalidJsonCredentials::MissingField("Version")),
        Some(version) => {
            return Err(InvalidJsonCredentials::InvalidField {
                field: "version",
                err: format!("unknown version number: {}", version).into(),
            })
        }
    }

    let access_key_id =
        str_field("AccessKeyId").ok_or(InvalidJsonCredentials::MissingField("AccessKeyId"))?;
    let secret_access_key = str_field("SecretAccessKey")
        .ok_or(InvalidJsonCredentials::MissingField("SecretAccessKey"))?;
    let session_token =
        str_field("SessionToken").ok_or(InvalidJsonCredentials::MissingField("SessionToken"))?;
    let expiration = match str_field("Expiration") {
        Some(expiration) => parse_expiration("Expiration", expiration)?,
        None => max_expiration(),
    };
    Ok(RefreshableCredentials {
        access_key_id: access_key_id.to_string(),
        secret_access_key: secret_access_key.to_string(),
        session_token: session_token.to_string(),
        account_id: str_field("AccountId").map(ToString::to_string),
        expiration,
    })
}

fn parse_expiration(
    field: &'static str,
    value: &str,
) -> Result<SystemTime, InvalidJsonCredentials> {
    OffsetDateTime::parse(value, &Rfc3339)
        .map(SystemTime::from)
        .map_err(|err| InvalidJsonCredentials::InvalidField {
            field,
            err: err.into(),
        })
}

/// Convert an error-shaped credentials document into a [`CredentialsError`]
///
/// `AssumeRoleUnauthorizedAccess` indicates a misconfigured instance or task role, so it
/// maps to a configuration error with a remediation hint rather than a generic provider
/// error.
pub(crate) fn credentials_error_for(code: &str, message: &str) -> CredentialsError {
    if code == "AssumeRoleUnauthorizedAccess" {
        CredentialsError::invalid_configuration(format!(
            "This instance does not have permission to assume its role: {}",
            message
        ))
    } else {
        CredentialsError::provider_error(format!(
            "failed to load credentials [{}]: {}",
            code, message
        ))
    }
}

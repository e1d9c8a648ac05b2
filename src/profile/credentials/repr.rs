/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Abstract representation of a profile-based credentials chain
//!
//! `resolve_chain` walks `role_arn`/`source_profile` references starting from the
//! selected profile and flattens them into a base provider plus an ordered list of
//! roles to assume. Validation (cycles, missing profiles, unknown keys) happens here;
//! turning the representation into runnable providers happens in
//! [`exec`](super::exec).

use super::ProfileFileError;
use crate::profile::parser::{Profile, ProfileSet};

/// Chain of providers declared by the shared config files
///
/// `base` produces the initial credentials; each entry in `chain` assumes a role using
/// the credentials produced so far, in order.
#[derive(Debug)]
pub(super) struct ProfileChain<'a> {
    pub(super) base: BaseProvider<'a>,
    pub(super) chain: Vec<RoleArn<'a>>,
}

/// A role to assume as part of a profile chain
#[derive(Debug, Clone, Eq, PartialEq)]
pub(super) struct RoleArn<'a> {
    /// The ARN of the role to assume
    pub(super) role_arn: &'a str,
    /// External id expected by the role trust policy, if any
    pub(super) external_id: Option<&'a str>,
    /// Session name recorded in CloudTrail
    pub(super) session_name: Option<&'a str>,
}

/// The provider at the root of a profile chain
#[derive(Debug, Clone, Eq, PartialEq)]
pub(super) enum BaseProvider<'a> {
    /// A provider registered by name (for example `Environment` or `EcsContainer`)
    ///
    /// Declared with `credential_source` next to a `role_arn`.
    NamedSource(&'a str),

    /// Static keys declared directly in the profile
    AccessKey {
        access_key_id: &'a str,
        secret_access_key: &'a str,
        session_token: Option<&'a str>,
    },

    /// An external command declared with `credential_process`
    CredentialProcess(&'a str),

    /// A web identity token file paired with a role ARN
    WebIdentityTokenRole {
        role_arn: &'a str,
        web_identity_token_file: &'a str,
        session_name: Option<&'a str>,
    },

    /// SSO configuration, either legacy inline keys or an `sso-session` reference
    Sso {
        sso_account_id: &'a str,
        sso_region: &'a str,
        sso_role_name: &'a str,
        sso_start_url: &'a str,
        /// Present for `sso-session`-style configuration; enables token refresh
        sso_session_name: Option<&'a str>,
    },
}

const ROLE_ARN: &str = "role_arn";
const EXTERNAL_ID: &str = "external_id";
const SESSION_NAME: &str = "role_session_name";
const SOURCE_PROFILE: &str = "source_profile";
const CREDENTIAL_SOURCE: &str = "credential_source";

const ACCESS_KEY_ID: &str = "aws_access_key_id";
const SECRET_ACCESS_KEY: &str = "aws_secret_access_key";
const SESSION_TOKEN: &str = "aws_session_token";

const CREDENTIAL_PROCESS: &str = "credential_process";
const WEB_IDENTITY_TOKEN_FILE: &str = "web_identity_token_file";

const SSO_ACCOUNT_ID: &str = "sso_account_id";
const SSO_REGION: &str = "sso_region";
const SSO_ROLE_NAME: &str = "sso_role_name";
const SSO_START_URL: &str = "sso_start_url";
const SSO_SESSION: &str = "sso_session";

/// Resolve a `ProfileChain` from a parsed `ProfileSet`
pub(super) fn resolve_chain(profile_set: &ProfileSet) -> Result<ProfileChain<'_>, ProfileFileError> {
    if profile_set.is_empty() {
        return Err(ProfileFileError::NoProfilesDefined);
    }
    let mut source_profile_name = profile_set.selected_profile();
    let mut visited_profiles = vec![];
    let mut chain = vec![];
    let base = loop {
        let profile = profile_set.get_profile(source_profile_name).ok_or_else(|| {
            ProfileFileError::MissingProfile {
                profile: source_profile_name.into(),
                message: if visited_profiles.is_empty() {
                    "could not find the selected profile".into()
                } else {
                    format!(
                        "profile `{}` was referenced by `source_profile` but was not defined",
                        source_profile_name
                    )
                    .into()
                },
            }
        })?;
        if visited_profiles.contains(&source_profile_name) {
            return Err(ProfileFileError::CredentialLoop {
                profiles: visited_profiles.iter().map(|s| s.to_string()).collect(),
                next: source_profile_name.to_string(),
            });
        }
        visited_profiles.push(source_profile_name);

        // (2) role_arn with source_profile / credential_source adds a link; everything
        // else terminates the chain with a base provider.
        match chain_provider(profile)? {
            Some((role, next)) => {
                chain.push(role);
                match next {
                    NextLink::SourceProfile(name) => source_profile_name = name,
                    NextLink::NamedSource(name) => break BaseProvider::NamedSource(name),
                }
            }
            None => break base_provider(profile_set, profile)?,
        }
    };
    chain.reverse();
    Ok(ProfileChain { base, chain })
}

enum NextLink<'a> {
    SourceProfile(&'a str),
    NamedSource(&'a str),
}

fn chain_provider(profile: &Profile) -> Result<Option<(RoleArn<'_>, NextLink<'_>)>, ProfileFileError> {
    let role_arn = match profile.get(ROLE_ARN) {
        Some(role_arn) => role_arn,
        // web_identity_token_file also uses role_arn; that pairing is a base provider
        None => return Ok(None),
    };
    if profile.get(WEB_IDENTITY_TOKEN_FILE).is_some() {
        return Ok(None);
    }
    let source_profile = profile.get(SOURCE_PROFILE);
    let credential_source = profile.get(CREDENTIAL_SOURCE);
    let next = match (source_profile, credential_source) {
        (Some(_), Some(_)) => {
            return Err(ProfileFileError::InvalidCredentialSource {
                profile: profile.name().to_string(),
                message: "profile must not specify both source_profile and credential_source"
                    .into(),
            })
        }
        (None, None) => {
            return Err(ProfileFileError::MissingCredentialSource {
                profile: profile.name().to_string(),
                message: "either source_profile or credential_source must be set with role_arn"
                    .into(),
            })
        }
        (Some(source_profile), None) => NextLink::SourceProfile(source_profile),
        (None, Some(credential_source)) => NextLink::NamedSource(credential_source),
    };
    Ok(Some((
        RoleArn {
            role_arn,
            external_id: profile.get(EXTERNAL_ID),
            session_name: profile.get(SESSION_NAME),
        },
        next,
    )))
}

fn base_provider<'a>(
    profile_set: &'a ProfileSet,
    profile: &'a Profile,
) -> Result<BaseProvider<'a>, ProfileFileError> {
    if let Some(process) = profile.get(CREDENTIAL_PROCESS) {
        return Ok(BaseProvider::CredentialProcess(process));
    }
    if let Some(token_file) = profile.get(WEB_IDENTITY_TOKEN_FILE) {
        let role_arn = profile.get(ROLE_ARN).ok_or_else(|| {
            ProfileFileError::InvalidCredentialSource {
                profile: profile.name().to_string(),
                message: "`web_identity_token_file` requires `role_arn` to be set".into(),
            }
        })?;
        return Ok(BaseProvider::WebIdentityTokenRole {
            role_arn,
            web_identity_token_file: token_file,
            session_name: profile.get(SESSION_NAME),
        });
    }
    if let Some(base) = sso_provider(profile_set, profile)? {
        return Ok(base);
    }
    match (profile.get(ACCESS_KEY_ID), profile.get(SECRET_ACCESS_KEY)) {
        (Some(access_key_id), Some(secret_access_key)) => Ok(BaseProvider::AccessKey {
            access_key_id,
            secret_access_key,
            session_token: profile.get(SESSION_TOKEN),
        }),
        (Some(_), None) => Err(ProfileFileError::InvalidCredentialSource {
            profile: profile.name().to_string(),
            message: "profile has `aws_access_key_id` but no `aws_secret_access_key`".into(),
        }),
        (None, Some(_)) => Err(ProfileFileError::InvalidCredentialSource {
            profile: profile.name().to_string(),
            message: "profile has `aws_secret_access_key` but no `aws_access_key_id`".into(),
        }),
        (None, None) => Err(ProfileFileError::ProfileDidNotContainCredentials {
            profile: profile.name().to_string(),
        }),
    }
}

/// Recognize both SSO configuration styles
///
/// Legacy profiles carry all four `sso_*` keys inline; `sso-session` profiles carry
/// `sso_session` plus `sso_account_id`/`sso_role_name`, with the start URL and region
/// defined in (or overridden by) the referenced `[sso-session]` section.
fn sso_provider<'a>(
    profile_set: &'a ProfileSet,
    profile: &'a Profile,
) -> Result<Option<BaseProvider<'a>>, ProfileFileError> {
    let has_sso_keys = [
        SSO_ACCOUNT_ID,
        SSO_REGION,
        SSO_ROLE_NAME,
        SSO_START_URL,
        SSO_SESSION,
    ]
    .iter()
    .any(|key| profile.get(key).is_some());
    if !has_sso_keys {
        return Ok(None);
    }
    let missing = |key: &'static str| ProfileFileError::InvalidCredentialSource {
        profile: profile.name().to_string(),
        message: format!("SSO configuration is missing `{}`", key).into(),
    };
    let sso_account_id = profile.get(SSO_ACCOUNT_ID).ok_or_else(|| missing(SSO_ACCOUNT_ID))?;
    let sso_role_name = profile.get(SSO_ROLE_NAME).ok_or_else(|| missing(SSO_ROLE_NAME))?;
    match profile.get(SSO_SESSION) {
        Some(session_name) => {
            let session = profile_set.sso_session(session_name).ok_or_else(|| {
                ProfileFileError::InvalidCredentialSource {
                    profile: profile.name().to_string(),
                    message: format!(
                        "profile references `[sso-session {}]` but that section was not defined",
                        session_name
                    )
                    .into(),
                }
            })?;
            // the profile may repeat these keys, but the session section wins
            let sso_region = session
                .get(SSO_REGION)
                .or_else(|| profile.get(SSO_REGION))
                .ok_or_else(|| missing(SSO_REGION))?;
            let sso_start_url = session
                .get(SSO_START_URL)
                .or_else(|| profile.get(SSO_START_URL))
                .ok_or_else(|| missing(SSO_START_URL))?;
            Ok(Some(BaseProvider::Sso {
                sso_account_id,
                sso_region,
                sso_role_name,
                sso_start_url,
                sso_session_name: Some(session_name),
            }))
        }
        None => Ok(Some(BaseProvider::Sso {
            sso_account_id,
            sso_region: profile.get(SSO_REGION).ok_or_else(|| missing(SSO_REGION))?,
            sso_role_name,
            sso_start_url: profile.get(SSO_START_URL).ok_or_else(|| missing(SSO_START_URL))?,
            sso_session_name: None,
        }))
    }
}

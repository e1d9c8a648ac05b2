/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use crate::profile::parser::parse::{RawProfileSet, WHITESPACE};
use crate::profile::parser::section::{Profile, Property, Section, SsoSession};
use crate::profile::parser::ProfileSet;
use crate::profile::profile_file::ProfileFileKind;
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};

const DEFAULT: &str = "default";
const PROFILE_PREFIX: &str = "profile";
const SSO_SESSION_PREFIX: &str = "sso-session";

#[derive(Eq, PartialEq, Hash, Debug)]
enum SectionKey<'a> {
    /// `[default]` or `[profile default]`
    Default {
        /// True when it is `[profile default]`
        prefixed: bool,
    },
    /// `[profile name]` or `[name]`
    Profile {
        /// True if prefixed with `profile`.
        prefixed: bool,
        suffix: Cow<'a, str>,
    },
    /// Any other section like `[<prefix> <suffix>]`
    Other {
        prefix: Cow<'a, str>,
        suffix: Cow<'a, str>,
    },
}

impl SectionKey<'_> {
    fn parse(input: &str) -> SectionKey<'_> {
        let input = input.trim_matches(WHITESPACE);
        if input == DEFAULT {
            SectionKey::Default { prefixed: false }
        } else if let Some((prefix, suffix)) = input.split_once(WHITESPACE) {
            let suffix = suffix.trim().into();
            if prefix == PROFILE_PREFIX {
                if suffix == "default" {
                    SectionKey::Default { prefixed: true }
                } else {
                    SectionKey::Profile {
                        prefixed: true,
                        suffix,
                    }
                }
            } else {
                SectionKey::Other {
                    prefix: prefix.into(),
                    suffix,
                }
            }
        } else {
            SectionKey::Profile {
                prefixed: false,
                suffix: input.into(),
            }
        }
    }

    /// Validate a SectionKey for a given file kind
    ///
    /// 1. The name must ALWAYS be a valid identifier
    /// 2. For credentials files, the profile name MUST NOT have a `profile` prefix
    /// 3. Only config files can have non-profile sections (`sso-session`, `services`)
    fn valid_for(self, kind: ProfileFileKind) -> Result<Self, String> {
        match &self {
            SectionKey::Default { .. } => Ok(self),
            SectionKey::Profile { prefixed, suffix } => {
                if validate_identifier(suffix).is_err() {
                    return Err(format!(
                        "profile `{suffix}` ignored because `{suffix}` was not a valid identifier",
                    ));
                }
                match (kind, prefixed) {
                    (ProfileFileKind::Credentials, true) => Err(format!("profile `{suffix}` ignored because credential profiles must NOT begin with `profile`")),
                    _ => Ok(self)
                }
            }
            SectionKey::Other { prefix, suffix } => {
                if validate_identifier(prefix).is_err() || validate_identifier(suffix).is_err() {
                    return Err(format!(
                        "section [{prefix} {suffix}] ignored because `{suffix}` is not a valid identifier",
                    ));
                }
                if let ProfileFileKind::Config = kind {
                    Ok(self)
                } else {
                    Err(format!(
                        "section [{prefix} {suffix}] ignored; config must be in the AWS config file rather than the credentials file",
                    ))
                }
            }
        }
    }
}

/// Normalize a raw profile into a `ProfileSet`
///
/// This function follows the following rules, codified in the tests & the reference Java implementation
/// - When the profile is a config file, strip `profile` and trim whitespace (`profile foo` => `foo`)
/// - Profile names are validated (see `validate_identifier`)
/// - A profile named `[profile foo]` takes priority over a profile named `[foo]` in the same file
/// - Profiles with identical names are merged
pub(super) fn merge_in(
    base: &mut ProfileSet,
    raw_profile_set: RawProfileSet<'_>,
    kind: ProfileFileKind,
) {
    // parse / validate sections
    let validated_sections = raw_profile_set
        .into_iter()
        .map(|(section_key, properties)| {
            (SectionKey::parse(section_key).valid_for(kind), properties)
        });

    // remove invalid profiles & emit a warning
    // valid_sections contains only valid profiles, but it may contain both `[profile foo]`
    // and `[foo]` which must be deduplicated below
    let valid_sections = validated_sections
        .filter_map(|(section_key, properties)| match section_key {
            Ok(section_key) => Some((section_key, properties)),
            Err(err_str) => {
                tracing::warn!("{}", err_str);
                None
            }
        })
        .collect::<Vec<_>>();

    // if a `[profile name]` section exists, the bare `[name]` section in the same file is
    // ignored entirely rather than merged
    let prefixed_names: HashSet<String> = valid_sections
        .iter()
        .filter_map(|(section_key, _)| match section_key {
            SectionKey::Default { prefixed: true } => Some(DEFAULT.to_string()),
            SectionKey::Profile {
                prefixed: true,
                suffix,
            } => Some(suffix.to_string()),
            _ => None,
        })
        .collect();

    for (section_key, raw_profile) in valid_sections {
        let unprefixed_name = match &section_key {
            SectionKey::Default { prefixed: false } => Some(DEFAULT),
            SectionKey::Profile {
                prefixed: false,
                suffix,
            } => Some(suffix.as_ref()),
            _ => None,
        };
        if let Some(name) = unprefixed_name {
            if prefixed_names.contains(name) {
                tracing::warn!(
                    "profile `{name}` ignored because `[profile {name}]` was found which takes priority"
                );
                continue;
            }
        }
        let section: &mut dyn Section = match section_key {
            SectionKey::Default { .. } => base
                .profiles
                .entry(DEFAULT.to_string())
                .or_insert_with(|| Profile::new(DEFAULT, Default::default())),
            SectionKey::Profile { suffix: name, .. } => base
                .profiles
                .entry(name.to_string())
                .or_insert_with(|| Profile::new(name, Default::default())),
            SectionKey::Other { prefix, suffix } if prefix == SSO_SESSION_PREFIX => base
                .sso_sessions
                .entry(suffix.to_string())
                .or_insert_with(|| SsoSession::new(suffix, Default::default())),
            SectionKey::Other { prefix, suffix } => {
                for (sub_properties_group_name, raw_sub_properties) in &raw_profile {
                    match validate_identifier(sub_properties_group_name.as_ref())
                        .map(ToOwned::to_owned)
                    {
                        Ok(sub_properties_group_name) => parse_sub_properties(raw_sub_properties)
                            .for_each(|(sub_property_name, sub_property_value)| {
                                base.other_sections.insert(
                                    prefix.as_ref(),
                                    suffix.as_ref(),
                                    &sub_properties_group_name,
                                    &sub_property_name,
                                    sub_property_value,
                                );
                            }),
                        Err(_) => {
                            tracing::warn!("`[{prefix} {suffix}].{sub_properties_group_name}` \
                            ignored because `{sub_properties_group_name}` was not a valid identifier");
                        }
                    }
                }

                continue;
            }
        };
        merge_into_base(section, raw_profile)
    }
}

fn merge_into_base(target: &mut dyn Section, profile: HashMap<Cow<'_, str>, Cow<'_, str>>) {
    for (k, v) in profile {
        match validate_identifier(k.as_ref()) {
            Ok(k) => {
                target.insert(k.to_owned(), Property::new(k.to_owned(), v.into()));
            }
            Err(_) => {
                tracing::warn!(profile = %target.name(), key = ?k, "key ignored because `{k}` was not a valid identifier");
            }
        }
    }
}

/// Validate that a string is a valid identifier
///
/// Identifiers must be non-empty and match `[A-Za-z0-9_\-/.%@:\+]+`
fn validate_identifier(input: &str) -> Result<&str, ()> {
    (!input.is_empty()
        && input.chars().all(|ch| {
            ch.is_ascii_alphanumeric()
                || ['_', '-', '/', '.', '%', '@', ':', '+']
                    .iter()
                    .any(|c| *c == ch)
        }))
    .then_some(input)
    .ok_or(())
}

fn parse_sub_properties(sub_properties_str: &str) -> impl Iterator<Item = (String, String)> + '_ {
    sub_properties_str
        .split('\n')
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            // only the first `=` separates key from value; the value may contain more
            line.split_once('=').map(|(key, value)| {
                (
                    key.trim_matches(WHITESPACE).to_owned(),
                    value.trim_matches(WHITESPACE).to_owned(),
                )
            })
        })
}

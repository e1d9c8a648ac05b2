/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Profile file parsing
//!
//! This module parses the AWS config (`~/.aws/config`) and credentials
//! (`~/.aws/credentials`) files into a [`ProfileSet`]. Both files are merged, config
//! first, then credentials, with later values winning on key conflicts.

use crate::os_shim::{Env, Fs, Props};
use crate::profile::profile_file::ProfileFiles;
use std::borrow::Cow;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{self, Display, Formatter};

pub(crate) mod normalize;
pub(crate) mod parse;
pub(crate) mod section;
pub(crate) mod source;

pub use parse::ProfileParseError;
pub use section::{Profile, Properties, Property};
pub use source::CouldNotResolveHomeDirectory;

pub(crate) use section::{Section, SsoSession};
pub(crate) use source::{home_dir, Os};

/// Failed to read or parse the profile files
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum ProfileFileLoadError {
    /// The file was malformed
    ///
    /// A malformed file is always fatal: it means the user's intent cannot be
    /// determined. A missing file, by contrast, is treated as empty.
    ParseError(ProfileParseError),

    /// A `~` path was requested but no home directory could be resolved
    CouldNotResolveHomeDirectory(CouldNotResolveHomeDirectory),
}

impl Display for ProfileFileLoadError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ProfileFileLoadError::ParseError(_) => {
                write!(f, "could not parse profile file")
            }
            ProfileFileLoadError::CouldNotResolveHomeDirectory(err) => Display::fmt(err, f),
        }
    }
}

impl Error for ProfileFileLoadError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ProfileFileLoadError::ParseError(err) => Some(err),
            ProfileFileLoadError::CouldNotResolveHomeDirectory(err) => Some(err),
        }
    }
}

impl From<ProfileParseError> for ProfileFileLoadError {
    fn from(err: ProfileParseError) -> Self {
        ProfileFileLoadError::ParseError(err)
    }
}

impl From<CouldNotResolveHomeDirectory> for ProfileFileLoadError {
    fn from(err: CouldNotResolveHomeDirectory) -> Self {
        ProfileFileLoadError::CouldNotResolveHomeDirectory(err)
    }
}

/// Read and parse the shared config files
///
/// The file locations are controlled by `profile_files` (by default `~/.aws/config` and
/// `~/.aws/credentials`, overridable via `AWS_CONFIG_FILE` / `AWS_SHARED_CREDENTIALS_FILE`).
/// `selected_profile` overrides the active profile name; otherwise `AWS_PROFILE`, the
/// `aws.profile` property, and finally `default` are used.
pub fn load(
    fs: &Fs,
    env: &Env,
    props: &Props,
    profile_files: &ProfileFiles,
    selected_profile: Option<&str>,
) -> Result<ProfileSet, ProfileFileLoadError> {
    let source = source::load(env, fs, props, profile_files, selected_profile)?;
    Ok(ProfileSet::parse(source)?)
}

/// A top-level configuration source containing multiple named profiles
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ProfileSet {
    pub(crate) profiles: HashMap<String, Profile>,
    pub(crate) selected_profile: Cow<'static, str>,
    pub(crate) sso_sessions: HashMap<String, SsoSession>,
    pub(crate) other_sections: Properties,
}

impl ProfileSet {
    /// Create a new profile set directly from a HashMap
    ///
    /// This method creates a `ProfileSet` directly from a hashmap with no normalization
    /// for test purposes.
    #[cfg(test)]
    pub(crate) fn new(
        profiles: HashMap<String, HashMap<String, String>>,
        selected_profile: impl Into<Cow<'static, str>>,
        sso_sessions: HashMap<String, HashMap<String, String>>,
    ) -> Self {
        let mut base = ProfileSet::empty();
        base.selected_profile = selected_profile.into();
        for (name, profile) in profiles {
            base.profiles.insert(
                name.clone(),
                Profile::new(
                    name,
                    profile
                        .into_iter()
                        .map(|(k, v)| (k.clone(), Property::new(k, v)))
                        .collect(),
                ),
            );
        }
        for (name, session) in sso_sessions {
            base.sso_sessions.insert(
                name.clone(),
                SsoSession::new(
                    name,
                    session
                        .into_iter()
                        .map(|(k, v)| (k.clone(), Property::new(k, v)))
                        .collect(),
                ),
            );
        }
        base
    }

    pub(crate) fn empty() -> Self {
        Self {
            profiles: Default::default(),
            selected_profile: "default".into(),
            sso_sessions: Default::default(),
            other_sections: Default::default(),
        }
    }

    fn parse(source: source::Source) -> Result<Self, ProfileParseError> {
        let mut base = ProfileSet::empty();
        base.selected_profile = source.profile;

        for (kind, file) in &source.files {
            normalize::merge_in(&mut base, parse::parse_profile_file(file)?, *kind);
        }
        Ok(base)
    }

    /// Retrieve a key-value pair from the currently selected profile
    pub fn get(&self, key: &str) -> Option<&str> {
        self.profiles
            .get(self.selected_profile.as_ref())
            .and_then(|profile| profile.get(key))
    }

    /// Retrieve a named profile from the profile set
    pub fn get_profile(&self, profile_name: &str) -> Option<&Profile> {
        self.profiles.get(profile_name)
    }

    /// Returns the name of the currently selected profile
    pub fn selected_profile(&self) -> &str {
        self.selected_profile.as_ref()
    }

    /// Returns true if no profiles are contained in this profile set
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Returns the names of the profiles in this profile set
    pub fn profiles(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_ref)
    }

    /// Returns the names of the sso-sessions in this profile set
    pub(crate) fn sso_sessions(&self) -> impl Iterator<Item = &str> {
        self.sso_sessions.keys().map(String::as_ref)
    }

    /// Retrieves a named sso-session section from the profile set
    pub(crate) fn sso_session(&self, name: &str) -> Option<&SsoSession> {
        self.sso_sessions.get(name)
    }

    /// Settings from other sections (for example `[services name]`), addressed by
    /// section type, section name, sub-property group, and setting name
    pub fn other_sections(&self) -> &Properties {
        &self.other_sections
    }
}

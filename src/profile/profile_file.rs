/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Config structs to programmatically customize the profile files that get loaded

use std::fmt;
use std::path::PathBuf;

/// Provides the ability to programmatically override the profile files that get loaded by the SDK.
///
/// The [`Default`] for `ProfileFiles` includes the default SDK config and credential files located in
/// `~/.aws/config` and `~/.aws/credentials` respectively.
///
/// Disabling all file loading can be done by supplying an empty in-memory file:
///
/// ```rust
/// use aws_auth::profile::profile_file::{ProfileFiles, ProfileFileKind};
///
/// let profile_files = ProfileFiles::builder()
///     .with_contents(ProfileFileKind::Config, "")
///     .build();
/// ```
#[derive(Clone, Debug)]
pub struct ProfileFiles {
    pub(crate) files: Vec<ProfileFileSource>,
}

impl Default for ProfileFiles {
    fn default() -> Self {
        Self {
            files: vec![
                ProfileFileSource::Default(ProfileFileKind::Config),
                ProfileFileSource::Default(ProfileFileKind::Credentials),
            ],
        }
    }
}

impl ProfileFiles {
    /// Returns a builder to create `ProfileFiles`
    pub fn builder() -> Builder {
        Builder::new()
    }
}

/// Profile file type (config or credentials)
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ProfileFileKind {
    /// The SDK config file that typically resides in `~/.aws/config`
    Config,
    /// The SDK credentials file that typically resides in `~/.aws/credentials`
    Credentials,
}

#[derive(Clone)]
pub(crate) enum ProfileFileSource {
    /// The default location for the file kind, overridable via environment variables
    Default(ProfileFileKind),
    /// A file at a specific path
    Path {
        kind: ProfileFileKind,
        path: PathBuf,
    },
    /// In-memory file contents
    Contents {
        kind: ProfileFileKind,
        contents: String,
    },
}

impl fmt::Debug for ProfileFileSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfileFileSource::Default(kind) => write!(f, "Default({:?})", kind),
            ProfileFileSource::Path { kind, path } => write!(f, "Path({:?}, {:?})", kind, path),
            // contents may include credentials, so they are not included in the debug output
            ProfileFileSource::Contents { kind, .. } => write!(f, "Contents({:?})", kind),
        }
    }
}

/// Builder for [`ProfileFiles`]
#[derive(Clone, Debug, Default)]
pub struct Builder {
    files: Vec<ProfileFileSource>,
    include_default_config_file: bool,
    include_default_credentials_file: bool,
}

impl Builder {
    /// Create a new builder that includes no files by default
    pub fn new() -> Self {
        Default::default()
    }

    /// Include the default SDK config file in the list of profile files to be loaded
    pub fn include_default_config_file(mut self, include_default_config_file: bool) -> Self {
        self.include_default_config_file = include_default_config_file;
        self
    }

    /// Include the default SDK credentials file in the list of profile files to be loaded
    pub fn include_default_credentials_file(
        mut self,
        include_default_credentials_file: bool,
    ) -> Self {
        self.include_default_credentials_file = include_default_credentials_file;
        self
    }

    /// Include a custom file in the list of profile files to be loaded
    pub fn with_file(mut self, kind: ProfileFileKind, path: impl Into<PathBuf>) -> Self {
        self.files.push(ProfileFileSource::Path {
            kind,
            path: path.into(),
        });
        self
    }

    /// Include custom file contents in the list of profile files to be loaded
    pub fn with_contents(mut self, kind: ProfileFileKind, contents: impl Into<String>) -> Self {
        self.files.push(ProfileFileSource::Contents {
            kind,
            contents: contents.into(),
        });
        self
    }

    /// Build the `ProfileFiles`
    ///
    /// Default files, when included, are loaded before custom files so that custom
    /// values take precedence during the merge.
    pub fn build(self) -> ProfileFiles {
        let mut files = Vec::new();
        if self.include_default_config_file {
            files.push(ProfileFileSource::Default(ProfileFileKind::Config));
        }
        if self.include_default_credentials_file {
            files.push(ProfileFileSource::Default(ProfileFileKind::Credentials));
        }
        files.extend(self.files);
        ProfileFiles { files }
    }
}

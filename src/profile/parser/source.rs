/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Locate and read the shared config and credentials files.

use crate::os_shim::{Env, Fs, Props};
use crate::profile::profile_file::{ProfileFileKind, ProfileFileSource, ProfileFiles};
use std::borrow::Cow;
use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

/// In-memory source of profile data
#[derive(Clone, Debug)]
pub(crate) struct Source {
    /// Contents and path of the configuration files, in merge order
    pub(crate) files: Vec<(ProfileFileKind, File)>,

    /// Profile to use
    ///
    /// Overridden via `$AWS_PROFILE`, defaults to `default`
    pub(crate) profile: Cow<'static, str>,
}

/// In-memory configuration file
#[derive(Clone, Debug)]
pub(crate) struct File {
    pub(crate) path: String,
    pub(crate) contents: String,
}

/// Error loading a configuration source
///
/// The only fatal condition at this stage is a requested `~` expansion with no
/// resolvable home directory. A missing file is treated as an empty file.
#[derive(Debug, Clone)]
pub struct CouldNotResolveHomeDirectory {
    path: String,
}

impl Display for CouldNotResolveHomeDirectory {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "could not resolve a home directory to expand `{}`; set HOME (or USERPROFILE on Windows)",
            self.path
        )
    }
}

impl Error for CouldNotResolveHomeDirectory {}

/// Load a [`Source`] from the given environment and filesystem.
pub(crate) fn load(
    proc_env: &Env,
    fs: &Fs,
    props: &Props,
    profile_files: &ProfileFiles,
    profile_override: Option<&str>,
) -> Result<Source, CouldNotResolveHomeDirectory> {
    let mut files = Vec::new();
    for source in &profile_files.files {
        let (kind, file) = match source {
            ProfileFileSource::Default(kind) => {
                let (default_path, env_var) = match kind {
                    ProfileFileKind::Config => ("~/.aws/config", "AWS_CONFIG_FILE"),
                    ProfileFileKind::Credentials => {
                        ("~/.aws/credentials", "AWS_SHARED_CREDENTIALS_FILE")
                    }
                };
                let file = tracing::info_span!("load_config_file", kind = ?kind)
                    .in_scope(|| read(fs, proc_env, props, default_path, env_var))?;
                (*kind, file)
            }
            ProfileFileSource::Path { kind, path } => {
                let file = tracing::info_span!("load_config_file", kind = ?kind)
                    .in_scope(|| read_path(fs, proc_env, props, path, true))?;
                (*kind, file)
            }
            ProfileFileSource::Contents { kind, contents } => (
                *kind,
                File {
                    path: "<in-memory>".to_string(),
                    contents: contents.clone(),
                },
            ),
        };
        files.push((kind, file));
    }

    let profile = profile_override
        .map(|profile| Cow::Owned(profile.to_string()))
        .or_else(|| proc_env.get("AWS_PROFILE").map(Cow::Owned).ok())
        .or_else(|| props.get("aws.profile").map(|p| Cow::Owned(p.to_string())))
        .unwrap_or(Cow::Borrowed("default"));

    Ok(Source { files, profile })
}

/// Read a file given a potential path override & home directory expansion
fn read(
    fs: &Fs,
    environment: &Env,
    props: &Props,
    default_path: &str,
    overridden_by_env_var: &str,
) -> Result<File, CouldNotResolveHomeDirectory> {
    let path = environment
        .get(overridden_by_env_var)
        .map(Cow::Owned)
        .ok()
        .unwrap_or_else(|| default_path.into());
    let overridden = path != default_path;
    if overridden {
        tracing::debug!(env = %overridden_by_env_var, path = %path, "config file location overridden");
    }
    read_path(fs, environment, props, Path::new(path.as_ref()), overridden)
}

fn read_path(
    fs: &Fs,
    environment: &Env,
    props: &Props,
    path: &Path,
    overridden: bool,
) -> Result<File, CouldNotResolveHomeDirectory> {
    let expanded = expand_home(path, environment, props, Os::real())?;
    tracing::debug!(before = ?path, after = ?expanded, "home directory expanded");
    let data = match fs.read_to_end(&expanded) {
        Ok(data) => data,
        Err(e) => {
            match e.kind() {
                ErrorKind::NotFound if !overridden => {
                    tracing::info!(path = ?path, "config file not found")
                }
                ErrorKind::NotFound if overridden => {
                    tracing::warn!(path = ?path, "config file specified by the environment not found")
                }
                _other => tracing::warn!(path = ?path, error = %e, "failed to read config file"),
            };
            Default::default()
        }
    };
    let data = match String::from_utf8(data) {
        Ok(data) => data,
        Err(e) => {
            tracing::warn!(path = ?path, error = %e, "config file did not contain utf-8 encoded data");
            Default::default()
        }
    };
    tracing::info!(path = ?path, size = ?data.len(), "config file loaded");
    Ok(File {
        // lossy is OK here, the name of this file is just for debugging purposes
        path: expanded.to_string_lossy().into(),
        contents: data,
    })
}

fn expand_home(
    path: impl AsRef<Path>,
    env_var: &Env,
    props: &Props,
    os: Os,
) -> Result<PathBuf, CouldNotResolveHomeDirectory> {
    let path = path.as_ref();
    let mut components = path.components();
    let start = components.next();
    match start {
        None => Ok(path.into()), // empty path,
        Some(Component::Normal(s)) if s == "~" => {
            // do homedir replacement
            let mut path = match home_dir(env_var, props, os) {
                Some(dir) => {
                    tracing::debug!(home = ?dir, "performing home directory substitution");
                    dir
                }
                None => {
                    tracing::warn!(
                        "home directory expansion was requested but no home directory could be determined"
                    );
                    return Err(CouldNotResolveHomeDirectory {
                        path: path.to_string_lossy().into(),
                    });
                }
            };
            // rewrite the path using system-specific path separators
            for component in components {
                path.push(component);
            }
            Ok(path)
        }
        // Finally, handle the case where it doesn't begin with some version of `~/`:
        // NOTE: in this case we aren't performing path rewriting. This is correct because
        // this path comes from an environment variable on the target
        // platform, so in that case, the separators should already be correct.
        _other => Ok(path.into()),
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum Os {
    Windows,
    NotWindows,
    Unknown,
}

impl Os {
    pub(crate) fn real() -> Self {
        match std::env::consts::OS {
            "windows" => Os::Windows,
            "linux" | "macos" | "ios" | "android" | "freebsd" | "dragonfly" | "netbsd"
            | "openbsd" | "solaris" | "illumos" => Os::NotWindows,
            _ => Os::Unknown,
        }
    }
}

/// Resolve a home directory given a set of environment variables
///
/// `HOME` always wins. On Windows (and on platforms the OS probe cannot classify)
/// `USERPROFILE` and the `HOMEDRIVE`+`HOMEPATH` pair are also consulted. The
/// `user.home` property is the final fallback everywhere.
pub(crate) fn home_dir(env_var: &Env, props: &Props, os: Os) -> Option<PathBuf> {
    if let Ok(home) = env_var.get("HOME") {
        tracing::debug!(src = "HOME", "loaded home directory");
        return Some(PathBuf::from(home));
    }

    if matches!(os, Os::Windows | Os::Unknown) {
        if let Ok(home) = env_var.get("USERPROFILE") {
            tracing::debug!(src = "USERPROFILE", "loaded home directory");
            return Some(PathBuf::from(home));
        }

        let home_drive = env_var.get("HOMEDRIVE");
        let home_path = env_var.get("HOMEPATH");
        if let (Ok(mut drive), Ok(path)) = (home_drive, home_path) {
            tracing::debug!(src = "HOMEDRIVE/HOMEPATH", "loaded home directory");
            drive.push_str(&path);
            return Some(drive.into());
        }
    }

    if let Some(home) = props.get("user.home") {
        tracing::debug!(src = "user.home", "loaded home directory");
        return Some(PathBuf::from(home));
    }
    None
}

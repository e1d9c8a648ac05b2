/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Abstractions for testing code that interacts with the operating system:
//! - Reading environment variables
//! - Reading process-local properties
//! - Reading and writing the file system

use std::collections::HashMap;
use std::env::VarError;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// File system abstraction
///
/// Simple abstraction enabling in-memory mocking of the file system
///
/// # Example
/// Construct a file system which delegates to `std::fs`:
/// ```rust
/// let fs = aws_auth::os_shim::Fs::real();
/// ```
///
/// Construct an in-memory file system for testing:
/// ```rust
/// use std::collections::HashMap;
/// let fs = aws_auth::os_shim::Fs::from_map({
///     let mut map = HashMap::new();
///     map.insert("/home/.aws/config".to_string(), "[default]\nregion = us-east-1".into());
///     map
/// });
/// ```
#[derive(Clone)]
pub struct Fs(Arc<fs::Inner>);

impl fmt::Debug for Fs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.as_ref() {
            fs::Inner::Real => write!(f, "Fs(real)"),
            fs::Inner::Fake { .. } => write!(f, "Fs(fake)"),
            fs::Inner::Namespaced { .. } => write!(f, "Fs(namespaced)"),
        }
    }
}

impl Default for Fs {
    fn default() -> Self {
        Fs::real()
    }
}

impl Fs {
    pub fn real() -> Self {
        Fs(Arc::new(fs::Inner::Real))
    }

    pub fn from_raw_map(fs: HashMap<OsString, Vec<u8>>) -> Self {
        Fs(Arc::new(fs::Inner::Fake {
            fs: Mutex::new(fs),
        }))
    }

    pub fn from_map(data: HashMap<String, Vec<u8>>) -> Self {
        let fs = data.into_iter().map(|(k, v)| (k.into(), v)).collect();
        Self::from_raw_map(fs)
    }

    /// Create a test filesystem rooted in real files
    ///
    /// Creates a test filesystem from the contents of `test_directory` rooted into `namespaced_to`.
    pub fn from_test_dir(
        test_directory: impl Into<PathBuf>,
        namespaced_to: impl Into<PathBuf>,
    ) -> Self {
        Self(Arc::new(fs::Inner::Namespaced {
            real_path: test_directory.into(),
            namespaced_to: namespaced_to.into(),
        }))
    }

    pub fn read_to_end(&self, path: impl AsRef<Path>) -> std::io::Result<Vec<u8>> {
        use fs::Inner;
        let path = path.as_ref();
        match self.0.as_ref() {
            Inner::Real => std::fs::read(path),
            Inner::Fake { fs } => fs
                .lock()
                .unwrap()
                .get(path.as_os_str())
                .cloned()
                .ok_or_else(|| std::io::ErrorKind::NotFound.into()),
            Inner::Namespaced {
                real_path,
                namespaced_to,
            } => {
                let actual_path = path
                    .strip_prefix(namespaced_to)
                    .map_err(|_| std::io::Error::from(std::io::ErrorKind::NotFound))?;
                std::fs::read(real_path.join(actual_path))
            }
        }
    }

    /// Write `contents` to `path`, replacing any previous contents.
    ///
    /// On the real file system the data is staged in a sibling temp file and moved into
    /// place with a rename so a failed write never leaves a truncated file behind.
    pub fn write(&self, path: impl AsRef<Path>, contents: impl AsRef<[u8]>) -> std::io::Result<()> {
        use fs::Inner;
        let path = path.as_ref();
        match self.0.as_ref() {
            Inner::Real => {
                let mut staged = path.as_os_str().to_os_string();
                staged.push(".tmp");
                let staged = PathBuf::from(staged);
                std::fs::write(&staged, contents.as_ref())?;
                std::fs::rename(&staged, path)
            }
            Inner::Fake { fs } => {
                fs.lock()
                    .unwrap()
                    .insert(path.as_os_str().to_os_string(), contents.as_ref().to_vec());
                Ok(())
            }
            Inner::Namespaced { .. } => Err(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "namespaced test filesystems are read-only",
            )),
        }
    }
}

mod fs {
    use std::collections::HashMap;
    use std::ffi::OsString;
    use std::path::PathBuf;
    use std::sync::Mutex;

    pub(super) enum Inner {
        Real,
        Fake {
            fs: Mutex<HashMap<OsString, Vec<u8>>>,
        },
        Namespaced {
            real_path: PathBuf,
            namespaced_to: PathBuf,
        },
    }
}

/// Environment variable abstraction
///
/// Environment variables are global to a process, and, as such, are difficult to test with a multi-
/// threaded test runner like Rust's. This enables loading environment variables either from the
/// actual process environment ([`std::env::var`](std::env::var)) or from a hash map.
///
/// Process environments are cheap to clone:
/// - Faked process environments are wrapped in an internal Arc
/// - Real process environments are pointer-sized
#[derive(Clone)]
pub struct Env(Arc<env::Inner>);

impl fmt::Debug for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.as_ref() {
            env::Inner::Real => write!(f, "Env(real)"),
            env::Inner::Fake(_) => write!(f, "Env(fake)"),
        }
    }
}

impl Default for Env {
    fn default() -> Self {
        Self::real()
    }
}

impl Env {
    pub fn get(&self, k: &str) -> Result<String, VarError> {
        use env::Inner;
        match self.0.as_ref() {
            Inner::Real => std::env::var(k),
            Inner::Fake(map) => map.get(k).cloned().ok_or(VarError::NotPresent),
        }
    }

    /// Create a fake process environment from a slice of tuples.
    ///
    /// # Example
    /// ```rust
    /// use aws_auth::os_shim::Env;
    /// let mock_env = Env::from_slice(&[
    ///     ("HOME", "/home/myname"),
    ///     ("AWS_REGION", "us-west-2")
    /// ]);
    /// assert_eq!(mock_env.get("HOME").unwrap(), "/home/myname");
    /// ```
    pub fn from_slice<'a>(vars: &[(&'a str, &'a str)]) -> Self {
        use env::Inner;
        Self(Arc::new(Inner::Fake(
            vars.iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )))
    }

    /// Create a process environment that uses the real process environment
    ///
    /// Calls will be delegated to [`std::env::var`](std::env::var).
    pub fn real() -> Self {
        Self(Arc::new(env::Inner::Real))
    }
}

impl From<HashMap<String, String>> for Env {
    fn from(hash_map: HashMap<String, String>) -> Self {
        Self(Arc::new(env::Inner::Fake(hash_map)))
    }
}

mod env {
    use std::collections::HashMap;

    pub(super) enum Inner {
        Real,
        Fake(HashMap<String, String>),
    }
}

/// Process-local property abstraction
///
/// Rust has no equivalent of JVM system properties, but the resolution rules still
/// recognize a property layer between explicit arguments and environment variables.
/// Properties are an injectable key-value map that defaults to empty.
#[derive(Clone)]
pub struct Props(Arc<HashMap<String, String>>);

impl fmt::Debug for Props {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Props({} entries)", self.0.len())
    }
}

impl Default for Props {
    fn default() -> Self {
        Self::empty()
    }
}

impl Props {
    pub fn empty() -> Self {
        Props(Arc::new(HashMap::new()))
    }

    pub fn get(&self, k: &str) -> Option<&str> {
        self.0.get(k).map(|v| v.as_str())
    }

    pub fn from_slice<'a>(props: &[(&'a str, &'a str)]) -> Self {
        Props(Arc::new(
            props
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        ))
    }
}

impl From<HashMap<String, String>> for Props {
    fn from(hash_map: HashMap<String, String>) -> Self {
        Props(Arc::new(hash_map))
    }
}

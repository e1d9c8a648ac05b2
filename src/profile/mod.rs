/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Support for loading configuration from AWS profile files
//!
//! The AWS config file (`~/.aws/config`) and credentials file (`~/.aws/credentials`) are
//! parsed into a [`ProfileSet`] which other providers consult for settings like regions,
//! role chains, and SSO sessions. [`credentials::ProfileFileCredentialsProvider`] resolves
//! credentials directly from the active profile.

mod parser;

pub mod credentials;
pub mod profile_file;

pub use parser::{
    load, CouldNotResolveHomeDirectory, Profile, ProfileFileLoadError, ProfileParseError,
    ProfileSet, Properties, Property,
};

pub(crate) use parser::{home_dir, Os, Section, SsoSession};

pub use credentials::ProfileFileCredentialsProvider;

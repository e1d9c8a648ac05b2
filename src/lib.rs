/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Credential and token resolution for AWS SDKs
//!
//! This crate resolves AWS credentials and bearer tokens from the standard sources:
//! environment variables, system properties, the shared AWS config and credentials
//! files, external processes, ECS and EC2 instance metadata, STS role assumption, and
//! AWS IAM Identity Center (SSO).
//!
//! The primary entry point is [`default_provider::credentials::DefaultCredentialsChain`],
//! which checks each source in order and caches the result:
//!
//! ```no_run
//! use aws_auth::default_provider::credentials::DefaultCredentialsChain;
//! use aws_auth::provider::ProvideCredentials;
//!
//! # async fn docs() {
//! let provider = DefaultCredentialsChain::builder().build();
//! let credentials = provider.provide_credentials().await;
//! # }
//! ```
//!
//! Individual providers can also be used directly or composed into custom chains with
//! [`meta::credentials::CredentialsProviderChain`].

use std::future::Future;
use std::pin::Pin;

/// A boxed future returned by asynchronous provider and connector traits
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub mod connector;
pub mod default_provider;
pub mod ecs;
pub mod environment;
pub mod imds;
pub mod meta;
pub mod os_shim;
pub mod process;
pub mod profile;
pub mod properties;
pub mod provider;
pub mod sso;
pub mod sts;
pub mod time_source;

mod credentials;
mod expiring_cache;
mod json_credentials;
mod provider_config;
mod region;
mod token;

pub use credentials::Credentials;
pub use provider_config::ProviderConfig;
pub use region::Region;
pub use time_source::TimeSource;
pub use token::Token;

pub(crate) use expiring_cache::ExpiringCache;

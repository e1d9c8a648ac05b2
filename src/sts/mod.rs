/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Credential providers backed by AWS STS
//!
//! The STS API client itself is an injected collaborator (see [`api`]); these providers
//! layer credential resolution semantics on top of it: default region and session-name
//! handling for [`AssumeRoleProvider`], and environment fallbacks for
//! [`WebIdentityTokenCredentialsProvider`].

pub mod api;

mod assume_role;
pub use assume_role::AssumeRoleProvider;

mod web_identity_token;
pub use web_identity_token::WebIdentityTokenCredentialsProvider;

/// Default region for STS requests when none is configured
///
/// The `aws-global` partition endpoint works for every ordinary role; multi-region
/// access points require callers to supply a regional endpoint explicitly.
pub(crate) const DEFAULT_STS_REGION: &str = "aws-global";

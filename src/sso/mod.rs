/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Credential and token providers backed by AWS IAM Identity Center (SSO)
//!
//! `aws sso login` writes an access token to `~/.aws/sso/cache/`; [`SsoTokenProvider`]
//! reads (and refreshes) that token, and [`SsoCredentialsProvider`] exchanges it for
//! per-role credentials. The SSO and SSO-OIDC clients are injected collaborators
//! (see [`api`]).

pub mod api;

mod cache;

mod credentials;
pub use credentials::SsoCredentialsProvider;

mod token;
pub use token::SsoTokenProvider;

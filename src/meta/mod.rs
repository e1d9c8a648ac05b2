/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Providers that augment or compose other providers

/// Credential provider combinators: chaining, caching, and closures
pub mod credentials;

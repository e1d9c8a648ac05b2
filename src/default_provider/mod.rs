/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! The default provider chains for credentials

pub mod credentials;

pub use credentials::DefaultCredentialsChain;

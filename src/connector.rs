/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Transport seam for the HTTP-metadata-backed providers (ECS, IMDS).
//!
//! The HTTP engine itself is out of scope for this crate. Callers supply an
//! implementation of [`MetadataConnector`]; tests use in-memory fakes.

use std::fmt::Debug;

use crate::BoxFuture;

/// Error type returned by a [`MetadataConnector`]
pub type ConnectorError = Box<dyn std::error::Error + Send + Sync>;

/// A plain HTTP response from a metadata endpoint
#[derive(Clone, Debug)]
pub struct HttpResponse {
    status: u16,
    body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        HttpResponse {
            status,
            body: body.into(),
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

/// Minimal HTTP client used to reach instance/container metadata endpoints
///
/// `get` issues a GET request to `uri` with the given headers and resolves with the
/// response, or with a transport error if the endpoint could not be reached.
pub trait MetadataConnector: Send + Sync + Debug {
    fn get<'a>(
        &'a self,
        uri: &'a str,
        headers: &'a [(&'a str, &'a str)],
    ) -> BoxFuture<'a, Result<HttpResponse, ConnectorError>>;
}

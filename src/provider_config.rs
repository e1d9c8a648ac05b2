/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Configuration Options for Credential Providers

use crate::connector::MetadataConnector;
use crate::os_shim::{Env, Fs, Props};
use crate::region::Region;
use crate::time_source::TimeSource;
use std::fmt;
use std::sync::Arc;

/// Configuration options for Credential Providers
///
/// Most credential provider builders offer a `configure` method which applies general
/// provider configuration options: the process environment, process-local properties,
/// the file system, the wall clock, and the region. Each defaults to the real thing;
/// tests substitute deterministic fakes.
#[derive(Clone, Default)]
pub struct ProviderConfig {
    env: Env,
    fs: Fs,
    props: Props,
    time_source: TimeSource,
    connector: Option<Arc<dyn MetadataConnector>>,
    region: Option<Region>,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("env", &self.env)
            .field("fs", &self.fs)
            .field("region", &self.region)
            .finish()
    }
}

impl ProviderConfig {
    /// Create a default provider config with the region unset
    ///
    /// Using this option means that you may need to set a region manually on providers
    /// that require one (for example STS role assumption).
    pub fn without_region() -> Self {
        Self::default()
    }

    /// Create an empty provider config suitable for unit tests
    ///
    /// The environment, properties and file system are all faked and empty; the clock
    /// remains the system clock unless overridden.
    #[cfg(test)]
    pub(crate) fn empty_test_config() -> Self {
        ProviderConfig {
            env: Env::from_slice(&[]),
            fs: Fs::from_map(Default::default()),
            props: Props::empty(),
            time_source: TimeSource::system(),
            connector: None,
            region: None,
        }
    }

    pub(crate) fn env(&self) -> Env {
        self.env.clone()
    }

    pub(crate) fn fs(&self) -> Fs {
        self.fs.clone()
    }

    pub(crate) fn props(&self) -> Props {
        self.props.clone()
    }

    pub(crate) fn time_source(&self) -> TimeSource {
        self.time_source.clone()
    }

    pub(crate) fn connector(&self) -> Option<Arc<dyn MetadataConnector>> {
        self.connector.clone()
    }

    pub(crate) fn region(&self) -> Option<Region> {
        self.region.clone()
    }

    /// Override the region for the configuration
    pub fn with_region(self, region: Option<Region>) -> Self {
        ProviderConfig { region, ..self }
    }

    /// Override the file system for this configuration
    pub fn with_fs(self, fs: Fs) -> Self {
        ProviderConfig { fs, ..self }
    }

    /// Override the process environment for this configuration
    pub fn with_env(self, env: Env) -> Self {
        ProviderConfig { env, ..self }
    }

    /// Override the process-local properties for this configuration
    pub fn with_props(self, props: Props) -> Self {
        ProviderConfig { props, ..self }
    }

    /// Override the wall clock for this configuration
    pub fn with_time_source(self, time_source: TimeSource) -> Self {
        ProviderConfig {
            time_source,
            ..self
        }
    }

    /// Override the connector used to reach metadata endpoints (ECS, IMDS)
    pub fn with_metadata_connector(self, connector: Arc<dyn MetadataConnector>) -> Self {
        ProviderConfig {
            connector: Some(connector),
            ..self
        }
    }
}

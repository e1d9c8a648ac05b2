/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Credentials Provider for external process

use crate::json_credentials::parse_credential_process_json_credentials;
use crate::provider::{self, future, CredentialsError, ProvideCredentials};
use crate::Credentials;
use std::borrow::Cow;
use std::fmt;
use std::time::Duration;
use tokio::process::Command;

const MAX_OUTPUT_SIZE: usize = 64 * 1024;
const PROCESS_TIMEOUT: Duration = Duration::from_secs(60);

/// Credentials Provider that invokes an external process
///
/// The configured command is run through the platform shell (`sh -c` on Unix,
/// `cmd /C` on Windows) and its stdout is parsed as a JSON credentials document.
/// A non-zero exit status is an error that includes the captured stderr.
pub struct CredentialProcessProvider {
    command: String,
}

/// Returns the given `command` string with arguments redacted if there were any
pub(crate) fn debug_fmt_command_string(command: &str) -> Cow<'_, str> {
    match command.find(char::is_whitespace) {
        Some(index) => Cow::Owned(format!("{} ** arguments redacted **", &command[0..index])),
        None => Cow::Borrowed(command),
    }
}

impl fmt::Debug for CredentialProcessProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Security: The arguments for command must be redacted since they can be sensitive
        f.debug_struct("CredentialProcessProvider")
            .field("command", &debug_fmt_command_string(&self.command))
            .finish()
    }
}

impl ProvideCredentials for CredentialProcessProvider {
    fn provide_credentials<'a>(&'a self) -> future::ProvideCredentials<'a>
    where
        Self: 'a,
    {
        future::ProvideCredentials::new(self.credentials())
    }
}

impl CredentialProcessProvider {
    /// Create new [`CredentialProcessProvider`]
    pub fn new(command: String) -> Self {
        Self { command }
    }

    async fn credentials(&self) -> provider::Result {
        tracing::debug!(command = %debug_fmt_command_string(&self.command), "loading credentials from external process");

        let mut command = if cfg!(windows) {
            let mut command = Command::new("cmd.exe");
            command.args(["/C", &self.command]);
            command
        } else {
            let mut command = Command::new("sh");
            command.args(["-c", &self.command]);
            command
        };

        let output = tokio::time::timeout(PROCESS_TIMEOUT, command.output())
            .await
            .map_err(|_| CredentialsError::ProviderTimedOut(PROCESS_TIMEOUT))?
            .map_err(|e| {
                CredentialsError::provider_error(format!(
                    "Error retrieving credentials from external process: {}",
                    e
                ))
            })?;

        tracing::debug!(command = %debug_fmt_command_string(&self.command), status = ?output.status, "executed command");

        if !output.status.success() {
            let reason =
                std::str::from_utf8(&output.stderr).unwrap_or("could not decode stderr as UTF-8");
            return Err(CredentialsError::provider_error(format!(
                "Error retrieving credentials: external process exited with code {}. Stderr: {}",
                output.status, reason
            )));
        }

        if output.stdout.len() > MAX_OUTPUT_SIZE {
            return Err(CredentialsError::provider_error(format!(
                "external process output exceeded the {} byte limit",
                MAX_OUTPUT_SIZE
            )));
        }

        let output = std::str::from_utf8(&output.stdout).map_err(|e| {
            CredentialsError::provider_error(format!(
                "Error retrieving credentials from external process: could not decode output as UTF-8: {}",
                e
            ))
        })?;

        match parse_credential_process_json_credentials(output) {
            Ok(creds) => {
                let credentials = Credentials::new(
                    creds.access_key_id,
                    creds.secret_access_key,
                    Some(creds.session_token),
                    Some(creds.expiration),
                    "CredentialProcess",
                );
                Ok(match creds.account_id {
                    Some(account_id) => credentials.with_account_id(account_id),
                    None => credentials,
                })
            }
            Err(invalid) => Err(CredentialsError::provider_error(format!(
                "Error retrieving credentials from external process, could not parse response: {}",
                invalid
            ))),
        }
    }
}

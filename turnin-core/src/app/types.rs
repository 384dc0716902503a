// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Username plus an opaque secret. The secret never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    secret: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            secret: secret.into(),
        }
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshTarget {
    pub host: String,
    pub port: u16,
}

impl SshTarget {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for SshTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub connect: Duration,
    pub handshake: Duration,
    pub auth: Duration,
    pub exec: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(10),
            handshake: Duration::from_secs(15),
            auth: Duration::from_secs(30),
            exec: Duration::from_secs(30),
        }
    }
}

/// A compute node behind the gateway, as reported by the cluster status command.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkerHost(String);

impl WorkerHost {
    pub fn new(hostname: impl Into<String>) -> Self {
        Self(hostname.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkerHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    TooLarge { size: u64 },
    BinaryExtension,
    BinaryContent,
    Inaccessible { reason: String },
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub path: PathBuf,
    /// Base name for top-level files, path relative to the walked root otherwise.
    pub display_name: String,
    pub size: Option<u64>,
    pub extension: Option<String>,
    pub verdict: Verdict,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub accepted: Vec<PathBuf>,
    pub rejected: Vec<PathBuf>,
    /// Index-aligned with `rejected`.
    pub reasons: Vec<String>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStatus {
    Complete,
    Partial,
    AllFailed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReport {
    /// Staging directory with a trailing slash, e.g. `/home/alice/turnin/`.
    pub remote_dir: String,
    pub succeeded: Vec<String>,
    pub failed: Vec<String>,
    pub errors: Vec<String>,
}

impl UploadReport {
    pub fn status(&self) -> UploadStatus {
        if self.succeeded.is_empty() {
            UploadStatus::AllFailed
        } else if self.failed.is_empty() {
            UploadStatus::Complete
        } else {
            UploadStatus::Partial
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionOutcome {
    pub success: bool,
    pub message: String,
    /// Remote stdout followed by stderr, when the remote command ran.
    pub technical_output: Option<String>,
}

impl SubmissionOutcome {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            technical_output: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecCapture {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: i32,
}

impl ExecCapture {
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// A host key the client accepts without prompting.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrustedHostKey {
    pub hostname: String,
    pub key_type: String,
    /// Base64 of the SSH wire-format public key blob.
    pub key_base64: String,
}

impl TrustedHostKey {
    pub fn new(
        hostname: impl Into<String>,
        key_type: impl Into<String>,
        key_base64: impl Into<String>,
    ) -> Self {
        Self {
            hostname: hostname.into(),
            key_type: key_type.into(),
            key_base64: key_base64.into(),
        }
    }
}

/// Key offered by a server during the handshake, with display fingerprints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentedHostKey {
    pub key: TrustedHostKey,
    pub sha256_fingerprint: String,
    pub md5_fingerprint: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_debug_redacts_secret() {
        let creds = Credentials::new("alice", "hunter2");
        let rendered = format!("{creds:?}");
        assert!(rendered.contains("alice"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn upload_status_distinguishes_outcomes() {
        let mut report = UploadReport::default();
        assert_eq!(report.status(), UploadStatus::AllFailed);
        report.succeeded.push("a.py".into());
        assert_eq!(report.status(), UploadStatus::Complete);
        report.failed.push("b.py".into());
        assert_eq!(report.status(), UploadStatus::Partial);
    }
}

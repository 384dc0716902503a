// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::fmt;

pub mod codes {
    pub const AUTHENTICATION_FAILURE: &str = "authentication_failure";
    pub const HOST_KEY_REJECTED: &str = "host_key_rejected";
    pub const CONNECTION_FAILURE: &str = "connection_failure";
    pub const TIMEOUT: &str = "timeout";
    pub const NO_HOSTS_AVAILABLE: &str = "no_hosts_available";
    pub const UPLOAD_FAILED: &str = "upload_failed";
    pub const TUNNEL_FAILURE: &str = "tunnel_failure";
    pub const INVALID_ARGUMENT: &str = "invalid_argument";
    pub const REMOTE_ERROR: &str = "remote_error";
    pub const LOCAL_ERROR: &str = "local_error";
    pub const INTERNAL_ERROR: &str = "internal_error";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppErrorKind {
    InvalidArgument,
    Authentication,
    HostKey,
    Network,
    Timeout,
    NoHostsAvailable,
    Upload,
    Tunnel,
    Remote,
    Local,
    Internal,
}

#[derive(Debug, Clone)]
pub struct AppError {
    kind: AppErrorKind,
    code: &'static str,
    message: String,
    context: Option<String>,
}

impl AppError {
    pub fn new(kind: AppErrorKind, code: &'static str) -> Self {
        Self {
            kind,
            code,
            message: code.to_string(),
            context: None,
        }
    }

    pub fn with_message(
        kind: AppErrorKind,
        code: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            code,
            message: message.into(),
            context: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn kind(&self) -> AppErrorKind {
        self.kind
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    /// Text suitable for showing to the person submitting.
    pub fn user_message(&self) -> String {
        match self.kind {
            AppErrorKind::Authentication => {
                "Authentication failed. Please check your username and password.".to_string()
            }
            AppErrorKind::HostKey => format!("Host key verification failed: {}", self.message),
            AppErrorKind::Network => format!("Could not connect to the server: {}", self.message),
            AppErrorKind::Timeout => {
                format!("The server did not respond in time: {}", self.message)
            }
            AppErrorKind::NoHostsAvailable => {
                "No available hosts found. Please try again later.".to_string()
            }
            _ => self.to_string(),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ctx) = &self.context {
            write!(f, "{} ({})", self.message, ctx)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

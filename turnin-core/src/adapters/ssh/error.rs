// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
#[error("authentication_failure")]
pub struct AuthenticationFailure;

#[derive(Debug, ThisError)]
#[error("host key rejected: {0}")]
pub struct HostKeyRejected(pub String);

#[derive(Debug, ThisError)]
#[error("{stage} timed out after {secs}s")]
pub struct StageTimeout {
    pub stage: &'static str,
    pub secs: u64,
}

impl StageTimeout {
    pub fn new(stage: &'static str, after: std::time::Duration) -> Self {
        Self {
            stage,
            secs: after.as_secs(),
        }
    }
}

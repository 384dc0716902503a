// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use crate::app::errors::AppResult;

/// Receives `(percent, message)` updates while a submission runs.
/// May be called from any task; failures are logged and ignored by callers.
pub trait ProgressPort: Send + Sync {
    fn report(&self, percent: u8, message: &str) -> AppResult<()>;
}

pub struct NoopProgress;

impl ProgressPort for NoopProgress {
    fn report(&self, _percent: u8, _message: &str) -> AppResult<()> {
        Ok(())
    }
}

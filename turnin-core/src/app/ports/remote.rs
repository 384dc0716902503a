// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::app::errors::AppResult;
use crate::app::types::{Credentials, ExecCapture, SshTarget, WorkerHost};

#[async_trait]
/// Opens authenticated SSH sessions to the gateway.
pub trait GatewayConnectPort: Send + Sync {
    async fn connect(
        &self,
        gateway: &SshTarget,
        credentials: &Credentials,
    ) -> AppResult<Arc<dyn GatewaySessionPort>>;
}

#[async_trait]
/// One authenticated gateway session and the channels that ride on it.
pub trait GatewaySessionPort: Send + Sync {
    fn host(&self) -> &str;

    async fn exec_capture(&self, command: &str) -> AppResult<ExecCapture>;

    /// Opens a single SFTP channel used for a whole upload batch.
    async fn open_staging(&self) -> AppResult<Box<dyn StagingPort>>;

    /// Forwards a local port to `worker:port` through this session and
    /// authenticates a second SSH session over it.
    async fn open_worker(
        &self,
        worker: &WorkerHost,
        port: u16,
        credentials: &Credentials,
    ) -> AppResult<Box<dyn WorkerSessionPort>>;

    async fn close(&self);
}

#[async_trait]
pub trait StagingPort: Send + Sync {
    async fn create_dir(&self, remote_dir: &str) -> AppResult<()>;

    async fn put_file(&self, local_path: &Path, remote_path: &str) -> AppResult<()>;

    /// Ends the batch and releases the channel.
    async fn close(&self);
}

#[async_trait]
pub trait WorkerSessionPort: Send + Sync {
    /// Runs `command`, writes each response followed by a newline to its
    /// stdin, then closes stdin and collects output until the channel closes
    /// or `timeout` elapses.
    async fn exec_interactive(
        &self,
        command: &str,
        responses: &[String],
        timeout: Duration,
    ) -> AppResult<ExecCapture>;

    async fn close(&self);
}

// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use russh_sftp::client::SftpSession;
use russh_sftp::protocol::OpenFlags;
use std::path::Path;
use tokio::fs as tokiofs;
use tokio::io::AsyncWriteExt;

use crate::app::errors::{AppError, AppErrorKind, AppResult, codes};
use crate::app::ports::StagingPort;

use super::SessionManager;

/// An SFTP channel on the gateway session, reused for a whole batch.
pub struct SftpStaging {
    sftp: SftpSession,
}

impl SessionManager {
    pub async fn open_sftp(&self) -> Result<SftpStaging> {
        let guard = self.handle.lock().await;
        let handle = guard
            .as_ref()
            .ok_or_else(|| anyhow!("SSH handle lost before opening SFTP"))?;
        let channel = handle.channel_open_session().await?;
        channel
            .request_subsystem(true, "sftp")
            .await
            .context("request sftp subsystem")?;
        let sftp = SftpSession::new(channel.into_stream())
            .await
            .context("start sftp session")?;
        Ok(SftpStaging { sftp })
    }
}

fn upload_error(err: anyhow::Error) -> AppError {
    AppError::with_message(AppErrorKind::Upload, codes::UPLOAD_FAILED, format!("{err:#}"))
}

async fn copy_to_remote(sftp: &SftpSession, local_path: &Path, remote_path: &str) -> Result<u64> {
    let mut local = tokiofs::File::open(local_path)
        .await
        .with_context(|| format!("open {}", local_path.display()))?;
    let flags = OpenFlags::CREATE
        .union(OpenFlags::TRUNCATE)
        .union(OpenFlags::WRITE);
    let mut remote = sftp
        .open_with_flags(remote_path, flags)
        .await
        .with_context(|| format!("open remote {remote_path}"))?;
    let written = tokio::io::copy(&mut local, &mut remote)
        .await
        .with_context(|| format!("write remote {remote_path}"))?;
    remote.flush().await?;
    remote.shutdown().await?;
    Ok(written)
}

#[async_trait]
impl StagingPort for SftpStaging {
    async fn create_dir(&self, remote_dir: &str) -> AppResult<()> {
        let dir = remote_dir.trim_end_matches('/');
        self.sftp
            .create_dir(dir)
            .await
            .with_context(|| format!("creating path {dir}"))
            .map_err(upload_error)
    }

    async fn put_file(&self, local_path: &Path, remote_path: &str) -> AppResult<()> {
        log::debug!(
            "uploading file over sftp: {} -> {}",
            local_path.display(),
            remote_path
        );
        let written = copy_to_remote(&self.sftp, local_path, remote_path)
            .await
            .map_err(upload_error)?;
        log::debug!("wrote {written} bytes to {remote_path}");
        Ok(())
    }

    async fn close(&self) {
        if let Err(err) = self.sftp.close().await {
            log::debug!("closing sftp session failed: {err}");
        }
    }
}

// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::collections::HashSet;
use std::path::PathBuf;

use crate::app::errors::{AppError, AppErrorKind, AppResult, codes};
use crate::app::ports::GatewaySessionPort;
use crate::app::services::progress::Progress;
use crate::app::services::validation::upload_name;
use crate::app::types::UploadReport;

const UPLOAD_START: usize = 20;
const UPLOAD_SPAN: usize = 60;

/// `<home>/<subdir>/`, always with a trailing slash.
pub fn staging_dir(home: &str, subdir: &str) -> String {
    let home = home.trim_end_matches('/');
    let subdir = subdir.trim_matches('/');
    format!("{home}/{subdir}/")
}

fn upload_percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return UPLOAD_START as u8;
    }
    (UPLOAD_START + done * UPLOAD_SPAN / total) as u8
}

/// Copies `files` into the staging directory under the remote home.
///
/// Individual file failures are recorded and the batch continues. Only a
/// failure to resolve the home directory or to open SFTP aborts the call.
/// Files land flat under their base name, so a second file whose name is
/// already staged is reported as failed instead of overwriting the first.
#[tracing::instrument(
    name = "upload",
    level = "debug",
    skip(files, session, progress),
    fields(host = %session.host(), files = files.len())
)]
pub async fn upload_files(
    files: &[PathBuf],
    session: &dyn GatewaySessionPort,
    remote_subdir: &str,
    progress: Progress<'_>,
) -> AppResult<UploadReport> {
    let home = resolve_home(session).await?;
    let remote_dir = staging_dir(&home, remote_subdir);

    let staging = session.open_staging().await?;
    if let Err(err) = staging.create_dir(&remote_dir).await {
        tracing::debug!("create_dir {remote_dir} failed, assuming it exists: {err}");
    }

    let mut report = UploadReport {
        remote_dir: remote_dir.clone(),
        ..Default::default()
    };

    progress.report(UPLOAD_START as u8, "Starting file uploads...");
    let total = files.len();
    let mut staged: HashSet<String> = HashSet::new();
    for (idx, path) in files.iter().enumerate() {
        let name = upload_name(path);
        progress.report(
            upload_percent(idx, total),
            &format!("Uploading file {}/{}: {name}", idx + 1, total),
        );
        if staged.contains(&name) {
            tracing::warn!("skipping {}: {name} is already staged", path.display());
            report.errors.push(format!(
                "Failed to upload {name}: another file named {name} is already staged ({})",
                path.display()
            ));
            report.failed.push(name);
            continue;
        }

        let remote_path = format!("{remote_dir}{name}");
        match staging.put_file(path, &remote_path).await {
            Ok(()) => {
                tracing::debug!("uploaded {} to {remote_path}", path.display());
                staged.insert(name.clone());
                report.succeeded.push(name);
                progress.report(
                    upload_percent(idx + 1, total),
                    &format!("Uploaded {}/{} files", idx + 1, total),
                );
            }
            Err(err) => {
                tracing::warn!("upload of {} failed: {err}", path.display());
                report.errors.push(format!("Failed to upload {name}: {err}"));
                report.failed.push(name);
            }
        }
    }
    staging.close().await;

    Ok(report)
}

async fn resolve_home(session: &dyn GatewaySessionPort) -> AppResult<String> {
    let capture = session.exec_capture("pwd").await?;
    let stdout = capture.stdout_lossy();
    let home = stdout.lines().next().map(str::trim).unwrap_or_default();
    if home.is_empty() {
        return Err(AppError::with_message(
            AppErrorKind::Remote,
            codes::REMOTE_ERROR,
            "could not determine the remote home directory",
        )
        .with_context(capture.stderr_lossy().trim().to_string()));
    }
    Ok(home.to_string())
}

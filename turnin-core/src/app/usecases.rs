// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::app::errors::{AppError, AppErrorKind, AppResult, codes};
use crate::app::ports::{GatewayConnectPort, GatewaySessionPort, ProgressPort};
use crate::app::services::progress::Progress;
use crate::app::services::{classify, cluster, shell, upload, validation};
use crate::app::types::{
    Credentials, SshTarget, SubmissionOutcome, UploadReport, UploadStatus, WorkerHost,
};

pub const DEFAULT_REMOTE_DIR: &str = "turnin";

#[derive(Debug, Clone)]
pub struct SubmitSettings {
    pub worker_port: u16,
    pub cluster_status_command: String,
    pub worker_marker: String,
    /// Lines written to the remote `turnin` stdin before it is closed.
    pub confirmations: Vec<String>,
    pub exec_timeout: Duration,
    pub cleanup_staging: bool,
}

impl Default for SubmitSettings {
    fn default() -> Self {
        Self {
            worker_port: 22,
            cluster_status_command: cluster::DEFAULT_STATUS_COMMAND.to_string(),
            worker_marker: cluster::DEFAULT_WORKER_MARKER.to_string(),
            confirmations: vec!["y".to_string(), "y".to_string()],
            exec_timeout: Duration::from_secs(30),
            cleanup_staging: false,
        }
    }
}

/// An authenticated gateway session and the worker it discovered.
#[derive(Clone)]
pub struct GatewayConnection {
    pub worker: WorkerHost,
    pub session: Arc<dyn GatewaySessionPort>,
}

#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub gateway: SshTarget,
    /// Overrides the worker discovered at connect time.
    pub worker: Option<WorkerHost>,
    pub credentials: Credentials,
    pub assignment: String,
    pub files: Vec<PathBuf>,
    pub remote_subdir: String,
}

#[derive(Clone)]
pub struct Submitter {
    gateway: Arc<dyn GatewayConnectPort>,
    settings: SubmitSettings,
}

impl Submitter {
    pub fn new(gateway: Arc<dyn GatewayConnectPort>, settings: SubmitSettings) -> Self {
        Self { gateway, settings }
    }

    pub fn settings(&self) -> &SubmitSettings {
        &self.settings
    }

    /// Authenticates to the gateway and picks an available worker.
    #[tracing::instrument(
        name = "connect",
        level = "info",
        skip_all,
        fields(user = %credentials.username, gateway = %gateway)
    )]
    pub async fn connect(
        &self,
        credentials: &Credentials,
        gateway: &SshTarget,
    ) -> AppResult<GatewayConnection> {
        let session = self.gateway.connect(gateway, credentials).await?;
        match self.discover_worker(session.as_ref()).await {
            Ok(worker) => {
                tracing::info!(worker = %worker, "selected worker host");
                Ok(GatewayConnection { worker, session })
            }
            Err(err) => {
                session.close().await;
                Err(err)
            }
        }
    }

    async fn discover_worker(&self, session: &dyn GatewaySessionPort) -> AppResult<WorkerHost> {
        let capture = session
            .exec_capture(&self.settings.cluster_status_command)
            .await?;
        let output = capture.stdout_lossy();
        cluster::select_worker(&output, &self.settings.worker_marker).ok_or_else(|| {
            AppError::with_message(
                AppErrorKind::NoHostsAvailable,
                codes::NO_HOSTS_AVAILABLE,
                format!(
                    "no host reported up matching '{}' by '{}'",
                    self.settings.worker_marker, self.settings.cluster_status_command
                ),
            )
        })
    }

    /// Runs one submission on its own task.
    pub fn spawn_submit(
        self: &Arc<Self>,
        request: SubmitRequest,
        existing: Option<GatewayConnection>,
        progress: Option<Arc<dyn ProgressPort>>,
    ) -> tokio::task::JoinHandle<SubmissionOutcome> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.submit(&request, existing, progress.as_deref()).await
        })
    }

    /// Validates, uploads, runs `turnin` on the worker and classifies the result.
    /// The gateway session is closed before this returns, whatever the outcome.
    #[tracing::instrument(
        name = "submit",
        level = "info",
        skip_all,
        fields(user = %request.credentials.username, assignment = %request.assignment)
    )]
    pub async fn submit(
        &self,
        request: &SubmitRequest,
        existing: Option<GatewayConnection>,
        progress: Option<&dyn ProgressPort>,
    ) -> SubmissionOutcome {
        let progress = Progress::new(progress);

        let connection = match existing {
            Some(connection) => connection,
            None => match self.connect(&request.credentials, &request.gateway).await {
                Ok(connection) => connection,
                Err(err) => {
                    tracing::warn!("connection failed: {err}");
                    return SubmissionOutcome::failure(err.user_message());
                }
            },
        };
        progress.report(10, "Connected to SSH server...");

        let session = Arc::clone(&connection.session);
        let worker = request.worker.clone().unwrap_or(connection.worker);
        let outcome = self
            .run_stages(request, session.as_ref(), &worker, progress)
            .await;
        session.close().await;

        let final_message = if outcome.success {
            "Assignment submitted successfully!"
        } else {
            "Submission completed with issues"
        };
        progress.report(100, final_message);
        tracing::info!(success = outcome.success, "submission finished");
        outcome
    }

    async fn run_stages(
        &self,
        request: &SubmitRequest,
        session: &dyn GatewaySessionPort,
        worker: &WorkerHost,
        progress: Progress<'_>,
    ) -> SubmissionOutcome {
        let validation = validation::validate_paths(&request.files);
        if validation.accepted.is_empty() {
            let mut message = String::from("No valid files to submit");
            if !validation.reasons.is_empty() {
                message.push_str(":\n");
                message.push_str(&validation.reasons.join("\n"));
            }
            return SubmissionOutcome::failure(message);
        }
        let mut warnings = String::new();
        if !validation.rejected.is_empty() {
            warnings.push_str(&format!(
                "Warning: {} file(s) skipped by validation: {}\n",
                validation.rejected.len(),
                validation.reasons.join("; ")
            ));
        }

        let report = match upload::upload_files(
            &validation.accepted,
            session,
            &request.remote_subdir,
            progress,
        )
        .await
        {
            Ok(report) => report,
            Err(err) => {
                return SubmissionOutcome::failure(format!("Failed to upload files: {err}"));
            }
        };
        match report.status() {
            UploadStatus::AllFailed => {
                return SubmissionOutcome::failure(format!(
                    "Failed to upload files:\n{}",
                    report.errors.join("\n")
                ));
            }
            UploadStatus::Partial => warnings.push_str(&format!(
                "Warning: {} file(s) failed to upload: {}\n",
                report.failed.len(),
                report.failed.join(", ")
            )),
            UploadStatus::Complete => {}
        }
        progress.report(80, "Files uploaded. Creating SSH tunnel...");

        let result = self
            .run_turnin(request, session, worker, &report, progress)
            .await;

        if self.settings.cleanup_staging {
            cleanup(session, &report.remote_dir).await;
        }

        match result {
            Ok(outcome) => SubmissionOutcome {
                message: format!("{warnings}{}", outcome.message),
                ..outcome
            },
            Err(err) => {
                tracing::warn!("turnin stage failed: {err}");
                SubmissionOutcome::failure(format!(
                    "{warnings}Error executing turnin command: {err}"
                ))
            }
        }
    }

    async fn run_turnin(
        &self,
        request: &SubmitRequest,
        session: &dyn GatewaySessionPort,
        worker: &WorkerHost,
        report: &UploadReport,
        progress: Progress<'_>,
    ) -> AppResult<SubmissionOutcome> {
        let worker_session = session
            .open_worker(worker, self.settings.worker_port, &request.credentials)
            .await?;
        progress.report(85, "Tunnel created. Running turnin command...");

        let command =
            shell::turnin_command(&report.remote_dir, &request.assignment, &report.succeeded);
        tracing::info!(worker = %worker, "running {command}");
        let capture = worker_session
            .exec_interactive(
                &command,
                &self.settings.confirmations,
                self.settings.exec_timeout,
            )
            .await;
        worker_session.close().await;
        let capture = capture?;

        let stdout = capture.stdout_lossy();
        let stderr = capture.stderr_lossy();
        let verdict = classify::classify(&stdout, &stderr);
        let technical = classify::combined_output(&stdout, &stderr);
        tracing::debug!(?verdict, exit_code = capture.exit_code, "classified turnin output");

        let message = if verdict.is_success() {
            verdict.message().to_string()
        } else {
            format!("{}\n\nTechnical details:\n{technical}", verdict.message())
        };
        Ok(SubmissionOutcome {
            success: verdict.is_success(),
            message,
            technical_output: Some(technical),
        })
    }
}

async fn cleanup(session: &dyn GatewaySessionPort, remote_dir: &str) {
    match session
        .exec_capture(&shell::remove_dir_command(remote_dir))
        .await
    {
        Ok(capture) if capture.exit_code == 0 => {
            tracing::debug!("removed staging directory {remote_dir}");
        }
        Ok(capture) => tracing::warn!(
            "removing {remote_dir} exited with {}: {}",
            capture.exit_code,
            capture.stderr_lossy().trim()
        ),
        Err(err) => tracing::warn!("removing {remote_dir} failed: {err}"),
    }
}

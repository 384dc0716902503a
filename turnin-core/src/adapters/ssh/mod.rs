// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::adapters::network::{ResolveError, resolve};
use crate::app::errors::{AppError, AppErrorKind, AppResult, codes};
use crate::app::ports::{GatewayConnectPort, GatewaySessionPort, HostKeyVerifier, StagingPort, WorkerSessionPort};
use crate::app::types::{Credentials, ExecCapture, SshTarget, Timeouts, WorkerHost};

mod error;
mod session;
mod tunnel;

pub use error::{AuthenticationFailure, HostKeyRejected, StageTimeout};
pub use session::{SessionManager, SftpStaging, SshParams};
pub use tunnel::{BoxedStream, DirectTcpip, POLL_INTERVAL, TunnelForwarder, TunnelTarget};

#[derive(Clone, Debug)]
pub struct SshOptions {
    pub timeouts: Timeouts,
    pub keyboard_interactive_fallback: bool,
    pub keepalive_secs: u64,
}

impl Default for SshOptions {
    fn default() -> Self {
        Self {
            timeouts: Timeouts::default(),
            keyboard_interactive_fallback: true,
            keepalive_secs: 15,
        }
    }
}

/// Connects to the gateway with russh. Every session it opens, including
/// worker sessions tunnelled through the gateway, checks host keys with
/// the same verifier.
#[derive(Clone)]
pub struct SshAdapter {
    verifier: Arc<dyn HostKeyVerifier>,
    options: SshOptions,
}

impl SshAdapter {
    pub fn new(verifier: Arc<dyn HostKeyVerifier>, options: SshOptions) -> Self {
        Self { verifier, options }
    }

    fn params(&self, host: &str, addr: SocketAddr) -> SshParams {
        SshParams {
            host: host.to_string(),
            addr,
            timeouts: self.options.timeouts,
            keyboard_interactive_fallback: self.options.keyboard_interactive_fallback,
            keepalive_secs: self.options.keepalive_secs,
        }
    }
}

/// Kind and code for the failures callers tell apart.
fn known_failure(err: &anyhow::Error) -> Option<(AppErrorKind, &'static str)> {
    err.chain().find_map(|cause| {
        if cause.is::<HostKeyRejected>() {
            Some((AppErrorKind::HostKey, codes::HOST_KEY_REJECTED))
        } else if cause.is::<AuthenticationFailure>() {
            Some((AppErrorKind::Authentication, codes::AUTHENTICATION_FAILURE))
        } else if cause.is::<StageTimeout>()
            || matches!(
                cause.downcast_ref::<ResolveError>(),
                Some(ResolveError::TimedOut { .. })
            )
        {
            Some((AppErrorKind::Timeout, codes::TIMEOUT))
        } else {
            None
        }
    })
}

fn failure_message(kind: AppErrorKind, err: &anyhow::Error) -> String {
    match kind {
        AppErrorKind::HostKey => err
            .chain()
            .find_map(|cause| cause.downcast_ref::<HostKeyRejected>())
            .map(|rejected| rejected.0.clone())
            .unwrap_or_else(|| format!("{err:#}")),
        _ => format!("{err:#}"),
    }
}

fn map_connect_error(err: anyhow::Error) -> AppError {
    let (kind, code) =
        known_failure(&err).unwrap_or((AppErrorKind::Network, codes::CONNECTION_FAILURE));
    AppError::with_message(kind, code, failure_message(kind, &err))
}

fn map_worker_error(err: anyhow::Error) -> AppError {
    let (kind, code) =
        known_failure(&err).unwrap_or((AppErrorKind::Tunnel, codes::TUNNEL_FAILURE));
    AppError::with_message(kind, code, failure_message(kind, &err))
}

fn map_exec_error(err: anyhow::Error) -> AppError {
    let (kind, code) = match known_failure(&err) {
        Some((AppErrorKind::Timeout, code)) => (AppErrorKind::Timeout, code),
        _ => (AppErrorKind::Remote, codes::REMOTE_ERROR),
    };
    AppError::with_message(kind, code, format!("ssh exec failed: {err:#}"))
}

#[async_trait]
impl GatewayConnectPort for SshAdapter {
    #[tracing::instrument(
        name = "ssh",
        level = "debug",
        skip_all,
        fields(op = "connect", host = %gateway.host, port = gateway.port, user = %credentials.username)
    )]
    async fn connect(
        &self,
        gateway: &SshTarget,
        credentials: &Credentials,
    ) -> AppResult<Arc<dyn GatewaySessionPort>> {
        let addr = resolve(&gateway.host, gateway.port, self.options.timeouts.connect)
            .await
            .map_err(|err| map_connect_error(err.into()))?;
        let manager = SessionManager::connect(
            self.params(&gateway.host, addr),
            credentials,
            Arc::clone(&self.verifier),
        )
        .await
        .map_err(map_connect_error)?;
        Ok(Arc::new(SshGatewaySession {
            manager,
            verifier: Arc::clone(&self.verifier),
        }))
    }
}

pub struct SshGatewaySession {
    manager: SessionManager,
    verifier: Arc<dyn HostKeyVerifier>,
}

#[async_trait]
impl GatewaySessionPort for SshGatewaySession {
    fn host(&self) -> &str {
        self.manager.host()
    }

    #[tracing::instrument(
        name = "ssh",
        level = "debug",
        skip(self, command),
        fields(op = "exec_capture", host = %self.manager.host())
    )]
    async fn exec_capture(&self, command: &str) -> AppResult<ExecCapture> {
        let timeout = self.manager.params().timeouts.exec;
        self.manager
            .exec_capture(command, timeout)
            .await
            .map_err(map_exec_error)
    }

    #[tracing::instrument(
        name = "ssh",
        level = "debug",
        skip(self),
        fields(op = "open_staging", host = %self.manager.host())
    )]
    async fn open_staging(&self) -> AppResult<Box<dyn StagingPort>> {
        let staging = self.manager.open_sftp().await.map_err(|err| {
            AppError::with_message(
                AppErrorKind::Upload,
                codes::UPLOAD_FAILED,
                format!("could not open SFTP session: {err:#}"),
            )
        })?;
        Ok(Box::new(staging))
    }

    #[tracing::instrument(
        name = "ssh",
        level = "debug",
        skip(self, credentials),
        fields(op = "open_worker", host = %self.manager.host(), worker = %worker, port = port)
    )]
    async fn open_worker(
        &self,
        worker: &WorkerHost,
        port: u16,
        credentials: &Credentials,
    ) -> AppResult<Box<dyn WorkerSessionPort>> {
        if !self.manager.is_connected().await {
            return Err(AppError::with_message(
                AppErrorKind::Network,
                codes::CONNECTION_FAILURE,
                format!("session to {} is closed", self.manager.host()),
            ));
        }
        let target = Arc::new(DirectTcpip::new(
            self.manager.shared_handle(),
            worker.as_str(),
            port,
        ));
        let mut tunnel = TunnelForwarder::start(target)
            .await
            .map_err(|err| map_worker_error(err.into()))?;

        let base = self.manager.params();
        let params = SshParams {
            host: worker.as_str().to_string(),
            addr: tunnel.local_addr(),
            timeouts: base.timeouts,
            keyboard_interactive_fallback: base.keyboard_interactive_fallback,
            keepalive_secs: base.keepalive_secs,
        };
        match SessionManager::connect(params, credentials, Arc::clone(&self.verifier)).await {
            Ok(manager) => Ok(Box::new(SshWorkerSession {
                manager,
                tunnel: Mutex::new(Some(tunnel)),
            })),
            Err(err) => {
                tunnel.stop().await;
                Err(map_worker_error(err))
            }
        }
    }

    async fn close(&self) {
        self.manager.close().await;
    }
}

/// SSH session to a worker, carried over a [`TunnelForwarder`].
pub struct SshWorkerSession {
    manager: SessionManager,
    tunnel: Mutex<Option<TunnelForwarder>>,
}

#[async_trait]
impl WorkerSessionPort for SshWorkerSession {
    #[tracing::instrument(
        name = "ssh",
        level = "debug",
        skip(self, command, responses),
        fields(op = "exec_interactive", host = %self.manager.host())
    )]
    async fn exec_interactive(
        &self,
        command: &str,
        responses: &[String],
        timeout: Duration,
    ) -> AppResult<ExecCapture> {
        self.manager
            .exec_interactive(command, responses, timeout)
            .await
            .map_err(map_exec_error)
    }

    async fn close(&self) {
        self.manager.close().await;
        if let Some(mut tunnel) = self.tunnel.lock().await.take() {
            tunnel.stop().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn auth_failure_maps_to_authentication() {
        let err = anyhow::Error::new(AuthenticationFailure).context("authenticating");
        let mapped = map_connect_error(err);
        assert_eq!(mapped.kind(), AppErrorKind::Authentication);
        assert_eq!(mapped.code(), codes::AUTHENTICATION_FAILURE);
    }

    #[test]
    fn rejected_host_key_keeps_the_verifier_reason() {
        let err = anyhow::Error::new(HostKeyRejected(
            "unknown host key for scylla".to_string(),
        ))
        .context("SSH handshake failed");
        let mapped = map_connect_error(err);
        assert_eq!(mapped.kind(), AppErrorKind::HostKey);
        assert_eq!(mapped.message(), "unknown host key for scylla");
    }

    #[test]
    fn stage_timeouts_map_to_timeout_everywhere() {
        let timeout = || anyhow::Error::new(StageTimeout::new("SSH handshake", Duration::from_secs(15)));
        assert_eq!(map_connect_error(timeout()).kind(), AppErrorKind::Timeout);
        assert_eq!(map_worker_error(timeout()).kind(), AppErrorKind::Timeout);
        assert_eq!(map_exec_error(timeout()).kind(), AppErrorKind::Timeout);
        assert!(
            map_connect_error(timeout())
                .message()
                .contains("timed out after 15s")
        );
    }

    #[test]
    fn resolve_timeout_is_a_timeout() {
        let err = anyhow::Error::new(ResolveError::TimedOut {
            host: "scylla.cs.uoi.gr".to_string(),
            secs: 10,
        });
        assert_eq!(map_connect_error(err).code(), codes::TIMEOUT);
    }

    #[test]
    fn other_failures_fall_back_per_stage() {
        let io = || {
            Err::<(), _>(std::io::Error::from(std::io::ErrorKind::ConnectionRefused))
                .context("TCP connect to 10.0.0.1:22 failed")
                .unwrap_err()
        };
        assert_eq!(map_connect_error(io()).kind(), AppErrorKind::Network);
        assert_eq!(map_connect_error(io()).code(), codes::CONNECTION_FAILURE);
        assert_eq!(map_worker_error(io()).kind(), AppErrorKind::Tunnel);
        assert_eq!(map_exec_error(io()).kind(), AppErrorKind::Remote);
    }

    #[test]
    fn auth_failure_on_worker_stays_authentication() {
        let mapped = map_worker_error(anyhow::Error::new(AuthenticationFailure));
        assert_eq!(mapped.kind(), AppErrorKind::Authentication);
    }
}

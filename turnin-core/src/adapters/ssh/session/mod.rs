// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use anyhow::{Context, Result};
use russh::client::{Config, Handle};
use russh::keys::ssh_key::PublicKey;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use crate::app::ports::HostKeyVerifier;
use crate::app::services::host_keys::present;
use crate::app::types::{Credentials, Timeouts, TrustedHostKey};

use super::error::{HostKeyRejected, StageTimeout};

mod auth;
mod deadline;
mod exec;
mod sftp;

use deadline::{HandshakeClock, within_budget};

pub use sftp::SftpStaging;

pub(crate) type SharedHandle = Arc<Mutex<Option<Handle<ClientHandler>>>>;

/// russh client handler that routes host key checks through a [`HostKeyVerifier`].
#[derive(Clone)]
pub(crate) struct ClientHandler {
    host: String,
    verifier: Arc<dyn HostKeyVerifier>,
    clock: HandshakeClock,
}

impl ClientHandler {
    fn new(host: String, verifier: Arc<dyn HostKeyVerifier>, clock: HandshakeClock) -> Self {
        Self {
            host,
            verifier,
            clock,
        }
    }
}

impl russh::client::Handler for ClientHandler {
    type Error = anyhow::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        let key = trusted_key_from(&self.host, server_public_key)?;
        let presented = present(key).map_err(|err| HostKeyRejected(err.to_string()))?;
        // Time spent on the verifier (possibly a prompt) is not handshake time.
        let _paused = self.clock.pause();
        match self.verifier.verify(&presented).await {
            Ok(()) => Ok(true),
            Err(err) => {
                log::warn!("server key for {} rejected: {err}", self.host);
                Err(HostKeyRejected(err.to_string()).into())
            }
        }
    }
}

fn trusted_key_from(host: &str, key: &PublicKey) -> Result<TrustedHostKey> {
    // OpenSSH form is `<type> <base64> [comment]`.
    let openssh = key.to_openssh().context("failed to encode server key")?;
    let key_base64 = openssh
        .split_whitespace()
        .nth(1)
        .context("server key has no key material")?;
    Ok(TrustedHostKey::new(
        host,
        key.algorithm().as_str(),
        key_base64,
    ))
}

/// Parameters for establishing one SSH connection.
#[derive(Clone, Debug)]
pub struct SshParams {
    /// Name the host key is recorded under.
    pub host: String,
    pub addr: SocketAddr,
    pub timeouts: Timeouts,
    pub keyboard_interactive_fallback: bool,
    pub keepalive_secs: u64,
}

/// One authenticated SSH connection.
pub struct SessionManager {
    params: SshParams,
    handle: SharedHandle,
}

impl SessionManager {
    /// Connects, completes the handshake and authenticates, each step under its own timeout.
    /// Host key verification does not count against the handshake timeout.
    pub async fn connect(
        params: SshParams,
        credentials: &Credentials,
        verifier: Arc<dyn HostKeyVerifier>,
    ) -> Result<Self> {
        let timeouts = params.timeouts;
        let config = Arc::new(Config {
            inactivity_timeout: Some(Duration::from_secs(
                params.keepalive_secs.saturating_mul(4).max(30),
            )),
            keepalive_interval: Some(Duration::from_secs(params.keepalive_secs.max(1))),
            channel_buffer_size: 64,
            window_size: 1024 * 1024,
            ..Default::default()
        });

        log::info!(
            "connecting to {}@{} ({})",
            &credentials.username,
            &params.host,
            &params.addr
        );
        let stream = tokio::time::timeout(timeouts.connect, TcpStream::connect(params.addr))
            .await
            .map_err(|_| StageTimeout::new("TCP connect", timeouts.connect))?
            .with_context(|| format!("TCP connect to {} failed", params.addr))?;

        let clock = HandshakeClock::default();
        let handler = ClientHandler::new(params.host.clone(), verifier, clock.clone());
        let mut handle = within_budget(
            timeouts.handshake,
            &clock,
            russh::client::connect_stream(config, stream, handler),
        )
        .await
        .map_err(|_| StageTimeout::new("SSH handshake", timeouts.handshake))?
        .context("SSH handshake failed")?;

        log::info!(
            "established connection with {}, proceeding with auth",
            &params.host
        );
        tokio::time::timeout(
            timeouts.auth,
            auth::authenticate(
                &mut handle,
                credentials,
                params.keyboard_interactive_fallback,
            ),
        )
        .await
        .map_err(|_| StageTimeout::new("authentication", timeouts.auth))??;
        log::info!("authenticated {}@{}", &credentials.username, &params.host);

        Ok(Self {
            params,
            handle: Arc::new(Mutex::new(Some(handle))),
        })
    }

    pub fn host(&self) -> &str {
        &self.params.host
    }

    pub fn params(&self) -> &SshParams {
        &self.params
    }

    pub(crate) fn shared_handle(&self) -> SharedHandle {
        Arc::clone(&self.handle)
    }

    pub async fn is_connected(&self) -> bool {
        let guard = self.handle.lock().await;
        guard.as_ref().is_some_and(|handle| !handle.is_closed())
    }

    /// Disconnects; later calls are no-ops.
    pub async fn close(&self) {
        let Some(handle) = self.handle.lock().await.take() else {
            return;
        };
        if let Err(err) = handle
            .disconnect(russh::Disconnect::ByApplication, "", "en")
            .await
        {
            log::debug!("disconnect from {} failed: {err}", &self.params.host);
        } else {
            log::debug!("disconnected from {}", &self.params.host);
        }
    }
}

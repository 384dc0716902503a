// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! Local TCP port forwarded through the gateway to a worker's SSH port.
//!
//! Each accepted connection gets its own direct-tcpip channel and relay task.
//! The accept loop and relays poll a shared stop flag at least every
//! [`POLL_INTERVAL`], so [`TunnelForwarder::stop`] returns promptly.

use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use super::session::SharedHandle;

pub const POLL_INTERVAL: Duration = Duration::from_millis(200);
const RELAY_BUF: usize = 32 * 1024;

pub trait AsyncStream: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> AsyncStream for T {}

pub type BoxedStream = Box<dyn AsyncStream>;

/// Where forwarded connections go.
#[async_trait]
pub trait TunnelTarget: Send + Sync + 'static {
    async fn open(&self, originator: SocketAddr) -> Result<BoxedStream>;

    fn describe(&self) -> String;
}

/// `direct-tcpip` channels on an established SSH session.
pub struct DirectTcpip {
    handle: SharedHandle,
    host: String,
    port: u16,
}

impl DirectTcpip {
    pub(crate) fn new(handle: SharedHandle, host: impl Into<String>, port: u16) -> Self {
        Self {
            handle,
            host: host.into(),
            port,
        }
    }
}

#[async_trait]
impl TunnelTarget for DirectTcpip {
    async fn open(&self, originator: SocketAddr) -> Result<BoxedStream> {
        let guard = self.handle.lock().await;
        let handle = guard
            .as_ref()
            .ok_or_else(|| anyhow!("SSH handle lost before opening tunnel channel"))?;
        let channel = handle
            .channel_open_direct_tcpip(
                self.host.clone(),
                u32::from(self.port),
                originator.ip().to_string(),
                u32::from(originator.port()),
            )
            .await?;
        Ok(Box::new(channel.into_stream()))
    }

    fn describe(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

pub struct TunnelForwarder {
    local_addr: SocketAddr,
    stop: Arc<AtomicBool>,
    accept_task: Option<JoinHandle<()>>,
    relays: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl TunnelForwarder {
    /// Binds an ephemeral loopback port and starts accepting.
    pub async fn start(target: Arc<dyn TunnelTarget>) -> io::Result<Self> {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await?;
        let local_addr = listener.local_addr()?;
        let stop = Arc::new(AtomicBool::new(false));
        let relays = Arc::new(Mutex::new(Vec::new()));
        log::debug!("forwarding {local_addr} to {}", target.describe());

        let accept_task = tokio::spawn(accept_loop(
            listener,
            target,
            Arc::clone(&stop),
            Arc::clone(&relays),
        ));
        Ok(Self {
            local_addr,
            stop,
            accept_task: Some(accept_task),
            relays,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Stops accepting, then waits for the accept loop and every relay.
    pub async fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(task) = self.accept_task.take() {
            if let Err(err) = task.await {
                log::debug!("tunnel accept task ended abnormally: {err}");
            }
        }
        let relays = std::mem::take(&mut *self.relays.lock().await);
        for relay in relays {
            let _ = relay.await;
        }
        log::debug!("tunnel on {} stopped", self.local_addr);
    }
}

impl Drop for TunnelForwarder {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

async fn accept_loop(
    listener: TcpListener,
    target: Arc<dyn TunnelTarget>,
    stop: Arc<AtomicBool>,
    relays: Arc<Mutex<Vec<JoinHandle<()>>>>,
) {
    while !stop.load(Ordering::SeqCst) {
        let (stream, peer) = match tokio::time::timeout(POLL_INTERVAL, listener.accept()).await {
            Err(_) => continue,
            Ok(Ok(accepted)) => accepted,
            Ok(Err(err)) => {
                log::warn!("tunnel accept failed: {err}");
                tokio::time::sleep(POLL_INTERVAL).await;
                continue;
            }
        };
        log::debug!("tunnel connection from {peer}");
        let relay = tokio::spawn(forward_one(
            stream,
            peer,
            Arc::clone(&target),
            Arc::clone(&stop),
        ));
        let mut relays = relays.lock().await;
        relays.retain(|task| !task.is_finished());
        relays.push(relay);
    }
}

async fn forward_one(
    local: TcpStream,
    peer: SocketAddr,
    target: Arc<dyn TunnelTarget>,
    stop: Arc<AtomicBool>,
) {
    let remote = match target.open(peer).await {
        Ok(remote) => remote,
        Err(err) => {
            log::warn!("could not open tunnel to {}: {err:#}", target.describe());
            return;
        }
    };
    match relay(local, remote, &stop).await {
        Ok((sent, received)) => {
            log::debug!("tunnel relay for {peer} done ({sent} bytes out, {received} bytes in)")
        }
        Err(err) => log::debug!("tunnel relay for {peer} ended: {err}"),
    }
}

/// Copies bytes both ways until the remote side closes or `stop` is set.
///
/// Local EOF is passed on as a shutdown of the remote writer. Returns the
/// byte counts of the directions that finished.
async fn relay<L, R>(local: L, remote: R, stop: &AtomicBool) -> io::Result<(u64, u64)>
where
    L: AsyncRead + AsyncWrite + Unpin,
    R: AsyncRead + AsyncWrite + Unpin,
{
    let (local_rd, mut local_wr) = tokio::io::split(local);
    let (remote_rd, mut remote_wr) = tokio::io::split(remote);

    let upstream = async {
        let mut reader = BufReader::with_capacity(RELAY_BUF, local_rd);
        let sent = tokio::io::copy_buf(&mut reader, &mut remote_wr).await?;
        remote_wr.shutdown().await?;
        Ok::<u64, io::Error>(sent)
    };
    let downstream = async {
        let mut reader = BufReader::with_capacity(RELAY_BUF, remote_rd);
        let received = tokio::io::copy_buf(&mut reader, &mut local_wr).await?;
        let _ = local_wr.shutdown().await;
        Ok::<u64, io::Error>(received)
    };
    tokio::pin!(upstream);
    tokio::pin!(downstream);

    let mut sent = None;
    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    loop {
        tokio::select! {
            res = &mut upstream, if sent.is_none() => sent = Some(res?),
            res = &mut downstream => return Ok((sent.unwrap_or(0), res?)),
            _ = ticker.tick() => {
                if stop.load(Ordering::SeqCst) {
                    return Ok((sent.unwrap_or(0), 0));
                }
            }
        }
    }
}

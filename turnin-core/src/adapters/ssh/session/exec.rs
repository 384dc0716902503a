// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use anyhow::{Context, Result, anyhow};
use russh::{Channel, ChannelMsg};
use russh::client::Msg;
use std::time::Duration;

use crate::adapters::ssh::error::StageTimeout;
use crate::app::types::ExecCapture;

use super::SessionManager;

fn handle_capture_message(
    msg: &ChannelMsg,
    out: &mut Vec<u8>,
    err: &mut Vec<u8>,
    code: &mut i32,
) -> bool {
    match msg {
        ChannelMsg::Data { data } => {
            out.extend_from_slice(data);
            false
        }
        ChannelMsg::ExtendedData { data, ext: 1 } => {
            err.extend_from_slice(data);
            false
        }
        ChannelMsg::ExitStatus { exit_status } => {
            *code = *exit_status as i32;
            false
        }
        ChannelMsg::Close => true,
        _ => false,
    }
}

async fn collect(chan: &mut Channel<Msg>) -> ExecCapture {
    let mut out = Vec::new();
    let mut err = Vec::new();
    let mut code: i32 = 0;
    while let Some(msg) = chan.wait().await {
        if handle_capture_message(&msg, &mut out, &mut err, &mut code) {
            break;
        }
    }
    ExecCapture {
        stdout: out,
        stderr: err,
        exit_code: code,
    }
}

/// One line per response, then EOF.
fn stdin_lines(responses: &[String]) -> Vec<String> {
    responses.iter().map(|r| format!("{r}\n")).collect()
}

impl SessionManager {
    async fn open_session_channel(&self) -> Result<Channel<Msg>> {
        // The lock is held only while the channel opens.
        let guard = self.handle.lock().await;
        let handle = guard.as_ref().ok_or_else(|| anyhow!("SSH handle lost"))?;
        handle
            .channel_open_session()
            .await
            .context("open session")
    }

    /// Runs `cmd`, returning stdout, stderr and exit code.
    pub async fn exec_capture(&self, cmd: &str, timeout: Duration) -> Result<ExecCapture> {
        let mut chan = self.open_session_channel().await?;
        log::debug!("executing '{}' on {}", cmd, self.host());
        chan.exec(true, cmd).await.context("exec request")?;

        let result = tokio::time::timeout(timeout, collect(&mut chan)).await;
        let _ = chan.close().await;
        result.map_err(|_| StageTimeout::new("remote command", timeout).into())
    }

    /// Runs `cmd`, feeding `responses` to its stdin, then closes stdin.
    pub async fn exec_interactive(
        &self,
        cmd: &str,
        responses: &[String],
        timeout: Duration,
    ) -> Result<ExecCapture> {
        let mut chan = self.open_session_channel().await?;
        log::debug!(
            "executing '{}' on {} with {} stdin line(s)",
            cmd,
            self.host(),
            responses.len()
        );
        chan.exec(true, cmd).await.context("exec request")?;

        let run = async {
            for line in stdin_lines(responses) {
                chan.data(line.as_bytes())
                    .await
                    .context("write to remote stdin")?;
            }
            chan.eof().await.context("close remote stdin")?;
            Ok::<_, anyhow::Error>(collect(&mut chan).await)
        };
        let result = tokio::time::timeout(timeout, run).await;
        let _ = chan.close().await;
        match result {
            Ok(capture) => capture,
            Err(_) => {
                log::warn!("'{}' on {} timed out after {:?}", cmd, self.host(), timeout);
                Err(StageTimeout::new("remote command", timeout).into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{handle_capture_message, stdin_lines};
    use russh::{ChannelMsg, CryptoVec};

    #[test]
    fn handle_capture_message_accumulates_output() {
        let mut out = Vec::new();
        let mut err = Vec::new();
        let mut code = 0;

        let msg = ChannelMsg::Data {
            data: CryptoVec::from_slice(b"Turning in:\n"),
        };
        assert!(!handle_capture_message(&msg, &mut out, &mut err, &mut code));
        assert_eq!(out, b"Turning in:\n");

        let msg = ChannelMsg::ExtendedData {
            data: CryptoVec::from_slice(b"err"),
            ext: 1,
        };
        assert!(!handle_capture_message(&msg, &mut out, &mut err, &mut code));
        assert_eq!(err, b"err");

        let msg = ChannelMsg::ExtendedData {
            data: CryptoVec::from_slice(b"skip"),
            ext: 2,
        };
        assert!(!handle_capture_message(&msg, &mut out, &mut err, &mut code));
        assert_eq!(err, b"err");

        let msg = ChannelMsg::ExitStatus { exit_status: 42 };
        assert!(!handle_capture_message(&msg, &mut out, &mut err, &mut code));
        assert_eq!(code, 42);

        assert!(handle_capture_message(
            &ChannelMsg::Close,
            &mut out,
            &mut err,
            &mut code
        ));
    }

    #[test]
    fn each_response_is_its_own_line() {
        let lines = stdin_lines(&["y".to_string(), "y".to_string()]);
        assert_eq!(lines, vec!["y\n", "y\n"]);
        assert!(stdin_lines(&[]).is_empty());
    }
}

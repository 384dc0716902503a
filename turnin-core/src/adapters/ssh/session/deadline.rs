// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! Handshake budget that stops counting while the host key is being verified.
//!
//! Key exchange includes the `check_server_key` callback, and an interactive
//! verifier may wait on a person for much longer than the handshake budget.
//! The handler pauses the clock around that call; only network time counts.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Re-check interval while the clock is paused.
const PAUSED_TICK: Duration = Duration::from_millis(100);

#[derive(Debug, Default)]
struct ClockState {
    paused_since: Option<Instant>,
    paused_total: Duration,
}

/// Shared between the russh handler and the timeout wrapper.
#[derive(Clone, Debug, Default)]
pub(crate) struct HandshakeClock {
    state: Arc<Mutex<ClockState>>,
}

/// Resumes the clock when dropped, including when the handshake future is cancelled.
pub(crate) struct PauseGuard {
    clock: HandshakeClock,
}

impl Drop for PauseGuard {
    fn drop(&mut self) {
        let mut state = self.clock.lock();
        if let Some(since) = state.paused_since.take() {
            state.paused_total += since.elapsed();
        }
    }
}

impl HandshakeClock {
    fn lock(&self) -> MutexGuard<'_, ClockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn pause(&self) -> PauseGuard {
        let mut state = self.lock();
        if state.paused_since.is_none() {
            state.paused_since = Some(Instant::now());
        }
        PauseGuard {
            clock: self.clone(),
        }
    }

    pub(crate) fn is_paused(&self) -> bool {
        self.lock().paused_since.is_some()
    }

    fn paused_for(&self) -> Duration {
        let state = self.lock();
        state.paused_total + state.paused_since.map_or(Duration::ZERO, |since| since.elapsed())
    }
}

/// Runs `fut` until it finishes or `budget` of unpaused time has passed.
/// `Err(())` means the budget ran out.
pub(crate) async fn within_budget<F: Future>(
    budget: Duration,
    clock: &HandshakeClock,
    fut: F,
) -> Result<F::Output, ()> {
    tokio::pin!(fut);
    let started = Instant::now();
    loop {
        let wait = if clock.is_paused() {
            PAUSED_TICK
        } else {
            let spent = started.elapsed().saturating_sub(clock.paused_for());
            if spent >= budget {
                return Err(());
            }
            budget - spent
        };
        tokio::select! {
            out = &mut fut => return Ok(out),
            _ = tokio::time::sleep(wait) => {}
        }
    }
}

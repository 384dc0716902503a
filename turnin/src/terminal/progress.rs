// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::io::{IsTerminal, Write};
use std::sync::Mutex;

use crossterm::{cursor, execute, terminal};

use turnin_core::app::errors::{AppError, AppErrorKind, AppResult, codes};
use turnin_core::app::ports::ProgressPort;

const BAR_WIDTH: usize = 24;

/// Renders submission progress on stderr. On a terminal the line is redrawn
/// in place; otherwise each update is its own line.
pub struct TerminalProgress {
    tty: bool,
    last: Mutex<Option<(u8, String)>>,
}

impl TerminalProgress {
    pub fn new() -> Self {
        Self {
            tty: std::io::stderr().is_terminal(),
            last: Mutex::new(None),
        }
    }

    /// Ends the redrawn line so later output starts on a fresh one.
    pub fn finish(&self) {
        if self.tty && self.last.lock().map(|last| last.is_some()).unwrap_or(false) {
            eprintln!();
        }
    }
}

fn render_line(percent: u8, message: &str) -> String {
    let filled = usize::from(percent.min(100)) * BAR_WIDTH / 100;
    format!(
        "[{}{}] {:>3}% {}",
        "#".repeat(filled),
        "-".repeat(BAR_WIDTH - filled),
        percent,
        message
    )
}

impl ProgressPort for TerminalProgress {
    fn report(&self, percent: u8, message: &str) -> AppResult<()> {
        let mut last = self.last.lock().map_err(|_| {
            AppError::with_message(AppErrorKind::Internal, codes::INTERNAL_ERROR, "progress lock poisoned")
        })?;
        let update = (percent, message.to_string());
        if last.as_ref() == Some(&update) {
            return Ok(());
        }
        let line = render_line(percent, message);
        let mut err = std::io::stderr();
        let written = if self.tty {
            execute!(
                err,
                cursor::MoveToColumn(0),
                terminal::Clear(terminal::ClearType::CurrentLine)
            )
            .and_then(|()| write!(err, "{line}"))
        } else {
            writeln!(err, "{line}")
        };
        written
            .and_then(|()| err.flush())
            .map_err(|e| AppError::with_message(AppErrorKind::Local, codes::LOCAL_ERROR, e.to_string()))?;
        *last = Some(update);
        Ok(())
    }
}

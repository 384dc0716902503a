// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use anyhow::Result;
use crossterm::{
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
};
use std::io::{IsTerminal, Write};

#[derive(Clone, Copy)]
pub enum Target {
    Stdout,
    Stderr,
}

pub fn print_ok(target: Target, message: &str) -> Result<()> {
    print_marked(target, '✓', Color::Green, message)
}

pub fn print_failed(target: Target, message: &str) -> Result<()> {
    print_marked(target, '✗', Color::Red, message)
}

/// Prints `message` with a one-char marker; only the marker is colored, and
/// only on a terminal. Continuation lines are indented under the text.
fn print_marked(target: Target, marker: char, color: Color, message: &str) -> Result<()> {
    match target {
        Target::Stdout => {
            let mut out = std::io::stdout();
            let tty = out.is_terminal();
            write_marked(&mut out, tty, marker, color, message)
        }
        Target::Stderr => {
            let mut out = std::io::stderr();
            let tty = out.is_terminal();
            write_marked(&mut out, tty, marker, color, message)
        }
    }
}

fn write_marked<W: Write>(
    out: &mut W,
    tty: bool,
    marker: char,
    color: Color,
    message: &str,
) -> Result<()> {
    let body = indent_continuation(message);
    if tty {
        execute!(
            out,
            SetForegroundColor(color),
            Print(marker),
            ResetColor,
            Print(format!(" {body}\n"))
        )?;
    } else {
        writeln!(out, "{marker} {body}")?;
    }
    out.flush()?;
    Ok(())
}

fn indent_continuation(message: &str) -> String {
    message.trim_end().replace('\n', "\n  ")
}

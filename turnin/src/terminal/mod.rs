// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

mod console;
mod host_key;
mod progress;
mod prompt;

pub use console::{Target, print_failed, print_ok};
pub use host_key::TerminalHostKeyPrompt;
pub use progress::TerminalProgress;
pub use prompt::{confirm_action, has_tty, prompt_line, prompt_secret};

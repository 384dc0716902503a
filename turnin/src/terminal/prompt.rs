// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use anyhow::bail;
use crossterm::cursor;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};
use crossterm::terminal::{self, ClearType};
use std::io::{IsTerminal, Write};

const HINT_COLOR: Color = Color::DarkGrey;

/// Prompts go to stderr so stdout stays machine-readable.
pub fn has_tty() -> bool {
    std::io::stdin().is_terminal() && std::io::stderr().is_terminal()
}

pub fn confirm_action(prompt: &str, hint: &str) -> anyhow::Result<bool> {
    if !has_tty() {
        bail!("confirmation requires a TTY; pass --yes to skip the prompt");
    }
    prompt_yes_no(prompt, hint)
}

pub fn prompt_yes_no(prompt: &str, hint: &str) -> anyhow::Result<bool> {
    loop {
        let input = prompt_line(prompt, hint)?;
        match input.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" => return Ok(true),
            "n" | "no" | "" => return Ok(false),
            _ => eprintln!("Please answer 'yes' or 'no'."),
        }
    }
}

pub fn prompt_line(prompt: &str, hint: &str) -> anyhow::Result<String> {
    read_line(prompt, hint, false)
}

/// Reads a line without echoing it.
pub fn prompt_secret(prompt: &str) -> anyhow::Result<String> {
    read_line(prompt, "", true)
}

fn read_line(prompt: &str, hint: &str, masked: bool) -> anyhow::Result<String> {
    let _guard = RawModeGuard::enter()?;
    let mut out = std::io::stderr();
    execute!(out, cursor::MoveToColumn(0))?;
    let mut editor = LineEditor::new(prompt, hint, masked);
    editor.render(&mut out)?;
    loop {
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind == KeyEventKind::Release {
            continue;
        }
        match key.code {
            KeyCode::Enter => {
                execute!(out, ResetColor, Print("\r\n"))?;
                break;
            }
            KeyCode::Char('c') | KeyCode::Char('d')
                if key.modifiers.contains(KeyModifiers::CONTROL) =>
            {
                execute!(out, ResetColor, Print("\r\n"))?;
                bail!("prompt canceled");
            }
            KeyCode::Esc => {
                execute!(out, ResetColor, Print("\r\n"))?;
                bail!("prompt canceled");
            }
            KeyCode::Backspace => editor.backspace(),
            KeyCode::Delete => editor.delete(),
            KeyCode::Left => editor.move_left(),
            KeyCode::Right => editor.move_right(),
            KeyCode::Home => editor.move_home(),
            KeyCode::End => editor.move_end(),
            KeyCode::Char(c)
                if key.modifiers.is_empty() || key.modifiers == KeyModifiers::SHIFT =>
            {
                editor.insert(c)
            }
            _ => {}
        }
        editor.render(&mut out)?;
    }
    Ok(editor.into_string())
}

struct RawModeGuard;

impl RawModeGuard {
    fn enter() -> anyhow::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

struct LineEditor {
    prompt: String,
    prompt_len: u16,
    hint: String,
    masked: bool,
    buffer: Vec<char>,
    cursor: usize,
}

impl LineEditor {
    fn new(prompt: &str, hint: &str, masked: bool) -> Self {
        Self {
            prompt: prompt.to_string(),
            prompt_len: prompt.chars().count().min(u16::MAX as usize) as u16,
            hint: hint.to_string(),
            masked,
            buffer: Vec::new(),
            cursor: 0,
        }
    }

    fn insert(&mut self, ch: char) {
        self.buffer.insert(self.cursor, ch);
        self.cursor += 1;
    }

    fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.cursor -= 1;
        self.buffer.remove(self.cursor);
    }

    fn delete(&mut self) {
        if self.cursor < self.buffer.len() {
            self.buffer.remove(self.cursor);
        }
    }

    fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    fn move_right(&mut self) {
        if self.cursor < self.buffer.len() {
            self.cursor += 1;
        }
    }

    fn move_home(&mut self) {
        self.cursor = 0;
    }

    fn move_end(&mut self) {
        self.cursor = self.buffer.len();
    }

    fn render<W: Write>(&self, out: &mut W) -> anyhow::Result<()> {
        let term_width = terminal::size().map(|(w, _)| w).unwrap_or(80);
        let available = term_width.saturating_sub(self.prompt_len) as usize;
        execute!(
            out,
            cursor::MoveToColumn(0),
            terminal::Clear(ClearType::UntilNewLine),
            Print(&self.prompt),
        )?;
        // Masked input shows nothing, not even its length.
        let cursor_offset = if self.masked {
            0
        } else if self.buffer.is_empty() {
            if !self.hint.is_empty() {
                let hint: String = self.hint.chars().take(available).collect();
                execute!(out, SetForegroundColor(HINT_COLOR), Print(&hint), ResetColor)?;
            }
            0
        } else {
            let (visible, offset) = visible_buffer_segment(&self.buffer, self.cursor, available);
            execute!(out, Print(visible))?;
            offset
        };
        let cursor_col = self
            .prompt_len
            .saturating_add(cursor_offset.min(u16::MAX as usize) as u16)
            .min(term_width.saturating_sub(1));
        execute!(out, cursor::MoveToColumn(cursor_col))?;
        out.flush()?;
        Ok(())
    }

    fn into_string(self) -> String {
        self.buffer.into_iter().collect()
    }
}

fn visible_buffer_segment(buffer: &[char], cursor: usize, max_len: usize) -> (String, usize) {
    if max_len == 0 {
        return (String::new(), 0);
    }
    let len = buffer.len();
    if len <= max_len {
        return (buffer.iter().collect(), cursor.min(len));
    }
    let start = cursor
        .saturating_add(1)
        .saturating_sub(max_len)
        .min(len - max_len);
    let visible: String = buffer[start..start + max_len].iter().collect();
    let offset = cursor.saturating_sub(start).min(max_len - 1);
    (visible, offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn typed(text: &str) -> LineEditor {
        let mut editor = LineEditor::new("> ", "", false);
        text.chars().for_each(|c| editor.insert(c));
        editor
    }

    #[test]
    fn editing_moves_around_the_cursor() {
        let mut editor = typed("turnn");
        editor.move_left();
        editor.insert('i');
        assert_eq!(editor.cursor, 5);
        editor.move_home();
        editor.delete();
        editor.move_end();
        editor.backspace();
        assert_eq!(editor.into_string(), "urni");
    }

    #[test]
    fn backspace_at_start_is_a_noop() {
        let mut editor = typed("ab");
        editor.move_home();
        editor.backspace();
        editor.move_left();
        assert_eq!(editor.cursor, 0);
        assert_eq!(editor.into_string(), "ab");
    }

    #[test]
    fn visible_segment_follows_the_cursor() {
        let buffer: Vec<char> = "abcdefghij".chars().collect();
        assert_eq!(visible_buffer_segment(&buffer, 2, 20), ("abcdefghij".to_string(), 2));
        assert_eq!(visible_buffer_segment(&buffer, 10, 4), ("ghij".to_string(), 3));
        assert_eq!(visible_buffer_segment(&buffer, 1, 4), ("abcd".to_string(), 1));
        assert_eq!(visible_buffer_segment(&buffer, 5, 0), (String::new(), 0));
    }
}

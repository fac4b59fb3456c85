//! crossterm backed [`TerminalSurface`].

use crate::{Style, TerminalCapabilities, TerminalSurface};
use anyhow::Result;
use core_events::InputEvent;
use crossterm::{
    cursor::{Hide, MoveTo, Show},
    event::{
        DisableBracketedPaste, EnableBracketedPaste, KeyboardEnhancementFlags,
        PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
    },
    execute, queue,
    style::{Attribute, Color, Print, ResetColor, SetAttribute, SetBackgroundColor, SetForegroundColor},
    terminal::{
        Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode,
        enable_raw_mode,
    },
};
use std::io::{Stdout, Write, stdout};
use std::time::{Duration, Instant};
use unicode_width::UnicodeWidthChar;

pub struct CrosstermSurface {
    out: Stdout,
    entered: bool,
    caps: Option<TerminalCapabilities>,
}

impl Default for CrosstermSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl CrosstermSurface {
    pub fn new() -> Self {
        Self {
            out: stdout(),
            entered: false,
            caps: None,
        }
    }

    fn enhanced(&self) -> bool {
        self.caps.is_some_and(|c| c.keyboard_enhancement)
    }
}

/// Longest prefix of `text` whose display width fits in `cols` cells.
pub(crate) fn clip(text: &str, cols: usize) -> &str {
    let mut used = 0usize;
    for (idx, ch) in text.char_indices() {
        let w = ch.width().unwrap_or(0);
        if used + w > cols {
            return &text[..idx];
        }
        used += w;
    }
    text
}

impl TerminalSurface for CrosstermSurface {
    fn size(&self) -> Result<(u16, u16)> {
        Ok(crossterm::terminal::size()?)
    }

    fn clear(&mut self) -> Result<()> {
        queue!(self.out, Clear(ClearType::All))?;
        Ok(())
    }

    fn put_str(&mut self, row: u16, col: u16, text: &str, style: Style) -> Result<()> {
        let (cols, rows) = self.size()?;
        if row >= rows || col >= cols {
            return Ok(());
        }
        let text = clip(text, usize::from(cols - col));
        queue!(self.out, MoveTo(col, row))?;
        match style {
            Style::Normal => queue!(self.out, Print(text))?,
            Style::Input => queue!(
                self.out,
                SetForegroundColor(Color::Green),
                Print(text),
                ResetColor
            )?,
            Style::Selected => queue!(
                self.out,
                SetForegroundColor(Color::Black),
                SetBackgroundColor(Color::White),
                Print(text),
                ResetColor,
                SetAttribute(Attribute::Reset)
            )?,
        }
        Ok(())
    }

    fn set_cursor(&mut self, row: u16, col: u16) -> Result<()> {
        queue!(self.out, MoveTo(col, row), Show)?;
        Ok(())
    }

    fn present(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }

    fn poll_input(&mut self, timeout: Duration) -> Result<Option<InputEvent>> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if !crossterm::event::poll(remaining)? {
                return Ok(None);
            }
            // Events we do not map (mouse, focus, releases) do not count as input.
            if let Some(ev) = core_input::map_event(crossterm::event::read()?) {
                return Ok(Some(ev));
            }
            if remaining.is_zero() {
                return Ok(None);
            }
        }
    }

    fn suspend(&mut self) -> Result<()> {
        if self.entered {
            if self.enhanced() {
                execute!(self.out, PopKeyboardEnhancementFlags)?;
            }
            execute!(
                self.out,
                DisableBracketedPaste,
                LeaveAlternateScreen,
                Show
            )?;
            disable_raw_mode()?;
            self.entered = false;
        }
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        if !self.entered {
            enable_raw_mode()?;
            let caps = *self.caps.get_or_insert_with(TerminalCapabilities::detect);
            execute!(self.out, EnterAlternateScreen, EnableBracketedPaste, Hide)?;
            if caps.keyboard_enhancement {
                execute!(
                    self.out,
                    PushKeyboardEnhancementFlags(
                        KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES
                    )
                )?;
            }
            self.entered = true;
        }
        Ok(())
    }
}

impl Drop for CrosstermSurface {
    fn drop(&mut self) {
        let _ = self.suspend();
    }
}

//! In-memory [`TerminalSurface`] used by controller tests.
//!
//! The surface keeps a character grid plus a style grid, replays a scripted queue of input
//! events, and counts suspend/resume transitions. Clones share state, so a test keeps one
//! clone for inspection and hands another to a `TerminalSession`.
//!
//! Scripted input uses `None` entries for "the poll timed out". Once the script is exhausted
//! `poll_input` returns an error; a controller under test that runs past its script fails
//! loudly instead of spinning.

use crate::crossterm_surface::clip;
use crate::{Style, TerminalSurface};
use anyhow::{Result, anyhow};
use core_events::{InputEvent, KeyEvent};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;
use unicode_width::UnicodeWidthChar;

const WIDE_TAIL: char = '\0';

#[derive(Debug)]
struct Inner {
    cols: u16,
    rows: u16,
    cells: Vec<Vec<char>>,
    styles: Vec<Vec<Style>>,
    cursor: (u16, u16),
    input: VecDeque<Option<InputEvent>>,
    timeouts: Vec<Duration>,
    presents: usize,
    suspended: bool,
    suspends: usize,
    resumes: usize,
}

impl Inner {
    fn blank(&mut self) {
        let (c, r) = (usize::from(self.cols), usize::from(self.rows));
        self.cells = vec![vec![' '; c]; r];
        self.styles = vec![vec![Style::Normal; c]; r];
    }
}

#[derive(Debug, Clone)]
pub struct HeadlessSurface {
    inner: Rc<RefCell<Inner>>,
}

impl HeadlessSurface {
    pub fn new(cols: u16, rows: u16) -> Self {
        let mut inner = Inner {
            cols,
            rows,
            cells: Vec::new(),
            styles: Vec::new(),
            cursor: (0, 0),
            input: VecDeque::new(),
            timeouts: Vec::new(),
            presents: 0,
            suspended: true,
            suspends: 0,
            resumes: 0,
        };
        inner.blank();
        Self {
            inner: Rc::new(RefCell::new(inner)),
        }
    }

    pub fn push_event(&self, ev: impl Into<InputEvent>) -> &Self {
        self.inner.borrow_mut().input.push_back(Some(ev.into()));
        self
    }

    pub fn push_key(&self, key: KeyEvent) -> &Self {
        self.push_event(key)
    }

    /// Queue each character of `text` as a plain key press.
    pub fn push_text(&self, text: &str) -> &Self {
        for c in text.chars() {
            self.push_key(KeyEvent::char(c));
        }
        self
    }

    /// Queue a poll timeout (an idle tick).
    pub fn push_timeout(&self) -> &Self {
        self.inner.borrow_mut().input.push_back(None);
        self
    }

    pub fn pending_input(&self) -> usize {
        self.inner.borrow().input.len()
    }

    /// Text of one row with trailing blanks removed.
    pub fn row_text(&self, row: u16) -> String {
        let inner = self.inner.borrow();
        inner
            .cells
            .get(usize::from(row))
            .map(|r| {
                r.iter()
                    .filter(|c| **c != WIDE_TAIL)
                    .collect::<String>()
                    .trim_end()
                    .to_string()
            })
            .unwrap_or_default()
    }

    pub fn screen(&self) -> Vec<String> {
        let rows = self.inner.borrow().rows;
        (0..rows).map(|r| self.row_text(r)).collect()
    }

    /// Style of the first cell in `row`.
    pub fn row_style(&self, row: u16) -> Style {
        self.inner
            .borrow()
            .styles
            .get(usize::from(row))
            .and_then(|r| r.first().copied())
            .unwrap_or_default()
    }

    pub fn style_at(&self, row: u16, col: u16) -> Style {
        self.inner
            .borrow()
            .styles
            .get(usize::from(row))
            .and_then(|r| r.get(usize::from(col)).copied())
            .unwrap_or_default()
    }

    /// `(row, col)` of the cursor.
    pub fn cursor(&self) -> (u16, u16) {
        self.inner.borrow().cursor
    }

    /// Timeouts passed to `poll_input`, in call order.
    pub fn poll_timeouts(&self) -> Vec<Duration> {
        self.inner.borrow().timeouts.clone()
    }

    pub fn present_count(&self) -> usize {
        self.inner.borrow().presents
    }

    pub fn is_suspended(&self) -> bool {
        self.inner.borrow().suspended
    }

    pub fn suspend_count(&self) -> usize {
        self.inner.borrow().suspends
    }

    pub fn resume_count(&self) -> usize {
        self.inner.borrow().resumes
    }
}

impl TerminalSurface for HeadlessSurface {
    fn size(&self) -> Result<(u16, u16)> {
        let inner = self.inner.borrow();
        Ok((inner.cols, inner.rows))
    }

    fn clear(&mut self) -> Result<()> {
        self.inner.borrow_mut().blank();
        Ok(())
    }

    fn put_str(&mut self, row: u16, col: u16, text: &str, style: Style) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        if row >= inner.rows || col >= inner.cols {
            return Ok(());
        }
        let text = clip(text, usize::from(inner.cols - col));
        let r = usize::from(row);
        let mut c = usize::from(col);
        for ch in text.chars() {
            let w = ch.width().unwrap_or(0);
            if w == 0 {
                continue;
            }
            inner.cells[r][c] = ch;
            inner.styles[r][c] = style;
            for tail in 1..w {
                inner.cells[r][c + tail] = WIDE_TAIL;
                inner.styles[r][c + tail] = style;
            }
            c += w;
        }
        Ok(())
    }

    fn set_cursor(&mut self, row: u16, col: u16) -> Result<()> {
        self.inner.borrow_mut().cursor = (row, col);
        Ok(())
    }

    fn present(&mut self) -> Result<()> {
        self.inner.borrow_mut().presents += 1;
        Ok(())
    }

    fn poll_input(&mut self, timeout: Duration) -> Result<Option<InputEvent>> {
        let mut inner = self.inner.borrow_mut();
        inner.timeouts.push(timeout);
        let next = inner
            .input
            .pop_front()
            .ok_or_else(|| anyhow!("headless input script exhausted"))?;
        if let Some(InputEvent::Resize(cols, rows)) = next {
            inner.cols = cols;
            inner.rows = rows;
            inner.blank();
        }
        Ok(next)
    }

    fn suspend(&mut self) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        if !inner.suspended {
            inner.suspended = true;
            inner.suspends += 1;
        }
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        if inner.suspended {
            inner.suspended = false;
            inner.resumes += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_events::KeyCode;
    use pretty_assertions::assert_eq;

    #[test]
    fn draws_and_clips() {
        let mut s = HeadlessSurface::new(8, 3);
        s.put_str(0, 2, "hello world", Style::Selected).unwrap();
        s.put_str(1, 0, "abc", Style::Normal).unwrap();
        s.put_str(5, 0, "offscreen", Style::Normal).unwrap();
        assert_eq!(s.screen(), vec!["  hello ", "abc", ""].iter().map(|r| r.trim_end()).collect::<Vec<_>>());
        assert_eq!(s.style_at(0, 2), Style::Selected);
        assert_eq!(s.style_at(0, 0), Style::Normal);
        s.clear().unwrap();
        assert_eq!(s.row_text(0), "");
    }

    #[test]
    fn replays_script_then_errors() {
        let mut s = HeadlessSurface::new(8, 3);
        s.push_text("a").push_timeout().push_key(KeyEvent::plain(KeyCode::Enter));
        let t = Duration::from_millis(5);
        assert_eq!(s.poll_input(t).unwrap(), Some(InputEvent::Key(KeyEvent::char('a'))));
        assert_eq!(s.poll_input(t).unwrap(), None);
        assert_eq!(
            s.poll_input(Duration::ZERO).unwrap(),
            Some(InputEvent::Key(KeyEvent::plain(KeyCode::Enter)))
        );
        assert!(s.poll_input(t).is_err());
        assert_eq!(s.poll_timeouts(), vec![t, t, Duration::ZERO, t]);
    }

    #[test]
    fn resize_event_changes_size() {
        let mut s = HeadlessSurface::new(8, 3);
        s.push_event(InputEvent::Resize(20, 6));
        s.poll_input(Duration::ZERO).unwrap();
        assert_eq!(s.size().unwrap(), (20, 6));
        assert_eq!(s.screen().len(), 6);
    }
}

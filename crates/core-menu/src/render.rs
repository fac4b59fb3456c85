//! Frame drawing for [`Menu`].
//!
//! Screen layout, top to bottom:
//! - row 0: input line, `(selected/total)` counter right-aligned,
//! - row 1: status message,
//! - rows 2..list_rows: the current page of matches,
//! - remaining rows: delegate preview.

use crate::{Menu, MenuItem};
use anyhow::Result;
use core_terminal::{Style, TerminalSession, TerminalSurface};
use core_text::{display_width, truncate_to_width, wrap_to_width};
use tracing::trace;

const FIRST_ITEM_ROW: u16 = 2;
const MIN_LIST_ROWS: u16 = 5;

fn to_u16(n: usize) -> u16 {
    u16::try_from(n).unwrap_or(u16::MAX)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Layout {
    pub cols: u16,
    pub rows: u16,
    /// Rows owned by the list area (input and message rows included).
    pub list_rows: u16,
    pub items_per_page: usize,
}

impl Layout {
    pub(crate) fn compute(cols: u16, rows: u16, preview_lines: usize) -> Self {
        let list_rows = rows
            .saturating_sub(to_u16(preview_lines))
            .max(MIN_LIST_ROWS.min(rows));
        Self {
            cols,
            rows,
            list_rows,
            items_per_page: usize::from(list_rows.saturating_sub(FIRST_ITEM_ROW)).max(1),
        }
    }
}

impl<T: MenuItem, A: Clone> Menu<T, A> {
    pub(crate) fn draw(&mut self, term: &mut TerminalSession) -> Result<()> {
        let surface = term.surface();
        let (cols, rows) = surface.size()?;
        let layout = Layout::compute(cols, rows, self.preview.len());
        self.items_per_page = layout.items_per_page;

        surface.clear()?;
        if cols > 0 && rows > 0 {
            self.draw_items(surface, &layout)?;
            self.draw_chrome(surface, &layout)?;
        }
        surface.present()?;
        trace!(
            target: "menu.render",
            matches = self.match_count(),
            selected = self.selected_row(),
            "frame"
        );
        self.finish_draw();
        Ok(())
    }

    fn draw_items(&self, surface: &mut dyn TerminalSurface, layout: &Layout) -> Result<()> {
        let per_page = layout.items_per_page;
        let selected = self.selected_row();
        let start = selected / per_page * per_page;
        let width = usize::from(layout.cols);

        let mut row = FIRST_ITEM_ROW;
        for (offset, (pos, item)) in self.match_rows().skip(start).take(per_page).enumerate() {
            if row >= layout.list_rows {
                break;
            }
            let line = format!("{:>4} {}", pos + 1, item.label());
            if start + offset == selected {
                // The highlighted row wraps instead of being cut.
                for chunk in wrap_to_width(&line, width) {
                    if row >= layout.list_rows {
                        break;
                    }
                    surface.put_str(row, 0, chunk, Style::Selected)?;
                    let used = display_width(chunk);
                    if used < width {
                        surface.put_str(row, to_u16(used), &" ".repeat(width - used), Style::Selected)?;
                    }
                    row += 1;
                }
            } else {
                let (visible, cut) = truncate_to_width(&line, width);
                surface.put_str(row, 0, visible, Style::Normal)?;
                if cut {
                    surface.put_str(row, layout.cols - 1, ">", Style::Selected)?;
                }
                row += 1;
            }
        }
        Ok(())
    }

    fn draw_chrome(&self, surface: &mut dyn TerminalSurface, layout: &Layout) -> Result<()> {
        let width = usize::from(layout.cols);
        let total = self.match_count();
        let current = if total == 0 { 0 } else { self.selected_row() + 1 };
        let counter = format!("({current}/{total})");
        let col = layout.cols.saturating_sub(to_u16(display_width(&counter)));
        surface.put_str(0, col, &counter, Style::Normal)?;

        if let Some(message) = self.message() {
            surface.put_str(1, 0, truncate_to_width(message, width).0, Style::Normal)?;
        }

        for (i, line) in self.preview.iter().enumerate() {
            let row = usize::from(layout.list_rows) + i;
            if row >= usize::from(layout.rows) {
                break;
            }
            surface.put_str(to_u16(row), 0, truncate_to_width(line, width).0, Style::Normal)?;
        }

        // Input line last: the cursor must end up on it.
        let input = self.input();
        if !input.label().is_empty() {
            surface.put_str(0, 0, input.label(), Style::Normal)?;
        }
        surface.put_str(0, to_u16(input.text_col()), input.text(), Style::Input)?;
        let cursor = to_u16(input.cursor_col()).min(layout.cols - 1);
        surface.set_cursor(0, cursor)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_reserves_two_rows_without_preview() {
        let l = Layout::compute(80, 24, 0);
        assert_eq!(l.list_rows, 24);
        assert_eq!(l.items_per_page, 22);
    }

    #[test]
    fn preview_never_squeezes_list_below_minimum() {
        let l = Layout::compute(80, 10, 3);
        assert_eq!(l.list_rows, 7);
        assert_eq!(l.items_per_page, 5);
        let l = Layout::compute(80, 10, 40);
        assert_eq!(l.list_rows, 5);
        assert_eq!(l.items_per_page, 3);
        let l = Layout::compute(80, 3, 2);
        assert_eq!(l.list_rows, 3);
        assert_eq!(l.items_per_page, 1);
    }
}

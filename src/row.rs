//! # Row
//!
//! One logical line of the file: the authoritative bytes, the rendered form with tabs expanded,
//! and one highlight tag per rendered byte.

use crate::ansi_escape::RESET_COLOR;
use crate::syntax::{highlight_row, Highlight, Syntax};

pub struct Row {
    /// The content of the row, without the trailing newline.
    pub chars: Vec<u8>,
    /// The display form of the row: every tab is expanded to spaces so that the next column is a
    /// multiple of the tab stop.
    pub render: Vec<u8>,
    /// One highlight tag per byte of `render`.
    pub hl: Vec<Highlight>,
}

impl Row {
    pub fn new(chars: Vec<u8>) -> Self {
        Self { chars, render: Vec::new(), hl: Vec::new() }
    }

    /// Recompute `render` from `chars`, then recompute the highlighting. Must be called after
    /// every change to `chars` and after the active filetype changes.
    pub fn update(&mut self, syntax: Option<&Syntax>, tab_stop: usize) {
        self.render.clear();
        for &b in &self.chars {
            if b == b'\t' {
                self.render.push(b' ');
                while self.render.len() % tab_stop != 0 {
                    self.render.push(b' ');
                }
            } else {
                self.render.push(b);
            }
        }
        self.hl = match syntax {
            Some(syntax) => highlight_row(&self.render, syntax),
            None => vec![Highlight::Normal; self.render.len()],
        };
    }

    /// Convert a position in `chars` to the corresponding column of `render`.
    pub fn cx2rx(&self, cx: usize, tab_stop: usize) -> usize {
        let mut rx = 0;
        for &b in &self.chars[..cx] {
            if b == b'\t' {
                rx += tab_stop - (rx % tab_stop);
            } else {
                rx += 1;
            }
        }
        rx
    }

    /// Convert a column of `render` to the corresponding position in `chars`: the first position
    /// whose display column strictly exceeds `rx`, or the row length if there is none.
    pub fn rx2cx(&self, rx: usize, tab_stop: usize) -> usize {
        let mut current_rx = 0;
        for (cx, &b) in self.chars.iter().enumerate() {
            if b == b'\t' {
                current_rx += tab_stop - (current_rx % tab_stop);
            } else {
                current_rx += 1;
            }
            if current_rx > rx {
                return cx;
            }
        }
        self.chars.len()
    }

    /// Append the visible slice of the row to the frame buffer, switching the SGR color whenever
    /// the highlight class changes, and resetting to the default color at the end of the row.
    pub fn draw(&self, coff: usize, screen_cols: usize, buffer: &mut Vec<u8>) {
        let end = self.render.len().min(coff + screen_cols);
        let start = coff.min(end);
        let mut current_color: Option<u8> = None;
        for (&b, &hl) in self.render[start..end].iter().zip(&self.hl[start..end]) {
            if hl == Highlight::Normal {
                if current_color.is_some() {
                    buffer.extend_from_slice(RESET_COLOR);
                    current_color = None;
                }
                buffer.push(b);
            } else {
                let color = hl.color();
                if current_color != Some(color) {
                    buffer.extend_from_slice(format!("\x1b[{}m", color).as_bytes());
                    current_color = Some(color);
                }
                buffer.push(b);
            }
        }
        buffer.extend_from_slice(RESET_COLOR);
    }
}

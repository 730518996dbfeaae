#![allow(clippy::wildcard_imports)]

//! # Editor
//!
//! The editor state, the key decoder, the renderer and the main loop.

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::time::Instant;

use crate::ansi_escape::*;
use crate::row::Row;
use crate::syntax::{self, Highlight, Syntax};
use crate::{sys, terminal, Config, Error};

const fn ctrl_key(key: u8) -> u8 { key & 0x1f }

const EXIT: u8 = ctrl_key(b'Q');
const DELETE_BIS: u8 = ctrl_key(b'H');
const REFRESH_SCREEN: u8 = ctrl_key(b'L');
const SAVE: u8 = ctrl_key(b'S');
const FIND: u8 = ctrl_key(b'F');
const BACKSPACE: u8 = 127;

const HELP_MESSAGE: &str = "HELP: Ctrl-S = save | Ctrl-Q = quit | Ctrl-F = find";

/// `set_status!` sets a formatted status message for the editor.
/// Example usage: `set_status!(editor, "{} written to {}", file_size, file_name)`
macro_rules! set_status {
    ($editor:expr, $($arg:expr),*) => ($editor.status_msg = Some(StatusMessage::new(format!($($arg),*))))
}

/// Enum of input keys
#[derive(Debug, PartialEq)]
enum Key {
    Arrow(AKey),
    Page(PageKey),
    Home,
    End,
    Delete,
    Escape,
    Char(u8),
}

/// Enum of arrow keys
#[derive(Debug, PartialEq)]
enum AKey {
    Left,
    Right,
    Up,
    Down,
}

/// Enum of page keys
#[derive(Debug, PartialEq)]
enum PageKey {
    Up,
    Down,
}

#[derive(Debug, Default, Clone, PartialEq)]
struct CursorState {
    /// x position (indexing the bytes of the row)
    x: usize,
    /// y position (row number, 0-indexed); may be one past the last row
    y: usize,
    /// Row offset
    roff: usize,
    /// Column offset
    coff: usize,
}

impl CursorState {
    fn move_to_next_line(&mut self) {
        self.y += 1;
        self.x = 0;
    }

    /// Scroll the terminal window vertically and horizontally (i.e. adjusting the row offset and
    /// the column offset) so that the cursor can be shown.
    fn scroll(&mut self, rx: usize, screen_rows: usize, screen_cols: usize) {
        self.roff = self.roff.clamp(self.y.saturating_sub(screen_rows.saturating_sub(1)), self.y);
        self.coff = self.coff.clamp(rx.saturating_sub(screen_cols.saturating_sub(1)), rx);
    }
}

struct StatusMessage {
    msg: String,
    time: Instant,
}

impl StatusMessage {
    /// Create a new status message and set time to the current date/time.
    fn new(msg: String) -> Self { Self { msg, time: Instant::now() } }
}

/// `slice_find` returns the index of `needle` in slice `s` if `needle` is a subslice of `s`,
/// otherwise returns `None`.
fn slice_find<T: PartialEq>(s: &[T], needle: &[T]) -> Option<usize> {
    (0..(s.len() + 1).saturating_sub(needle.len())).find(|&i| s[i..].starts_with(needle))
}

/// Read the next byte from stdin. A timed-out read yields no byte.
fn next_byte(bytes: &mut io::Bytes<io::Stdin>) -> Result<Option<u8>, Error> {
    match bytes.next() {
        Some(Err(err)) if err.kind() == io::ErrorKind::WouldBlock => Ok(None),
        Some(result) => result.map(Some).map_err(|err| Error::Io("read", err)),
        None => Ok(None),
    }
}

/// The `Editor` struct, contains the state and configuration of the text editor.
#[derive(Default)]
pub struct Editor {
    /// If not `None`, the current prompt mode (Save or Find). If `None`, we are in regular
    /// edition mode.
    prompt_mode: Option<PromptMode>,
    /// The current state of the cursor.
    cursor: CursorState,
    /// The number of rows that can be used for the editor, excluding the status bar and the
    /// message bar
    screen_rows: usize,
    /// The number of columns of the window.
    screen_cols: usize,
    /// The collection of rows, including the rendered form and the syntax highlighting
    /// information.
    rows: Vec<Row>,
    /// The number of content mutations since the file was last loaded or saved. Zero means the
    /// buffer is in sync with the disk.
    dirty: u64,
    /// The configuration for the editor.
    config: Config,
    /// The number of warnings remaining before we can quit without saving. Defaults to
    /// `config.quit_times`, then decreases to 0.
    quit_times: usize,
    /// The file name. If None, the user will be prompted for a file name the first time they try
    /// to save.
    file_name: Option<String>,
    /// The current status message being shown.
    status_msg: Option<StatusMessage>,
    /// The filetype entry corresponding to the current file name, if any. `None` disables
    /// highlighting.
    syntax: Option<&'static Syntax>,
    /// The original terminal mode. It will be restored when the `Editor` instance is dropped.
    orig_term_mode: Option<sys::TermMode>,
}

impl Editor {
    /// Initialize the text editor.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an error occurs when enabling termios raw mode or when obtaining the
    /// terminal window size.
    #[allow(clippy::field_reassign_with_default)]
    pub fn new(config: Config) -> Result<Self, Error> {
        let mut editor = Self::default();
        editor.quit_times = config.quit_times;
        editor.config = config;

        // Enable raw mode and store the original (non-raw) terminal mode.
        editor.orig_term_mode = Some(sys::enable_raw_mode()?);
        let (rows, cols) = sys::get_window_size()?;
        // Make room for the status bar and the message bar.
        editor.screen_rows = rows.saturating_sub(2);
        editor.screen_cols = cols;

        Ok(editor)
    }

    /// Return the current row if the cursor points to an existing row, `None` otherwise.
    fn current_row(&self) -> Option<&Row> { self.rows.get(self.cursor.y) }

    /// Return the position of the cursor, in terms of rendered columns (as opposed to
    /// `self.cursor.x`, which is the position of the cursor in terms of bytes).
    fn rx(&self) -> usize {
        self.current_row().map_or(0, |row| row.cx2rx(self.cursor.x, self.config.tab_stop))
    }

    /// Move the cursor following an arrow key (← → ↑ ↓).
    fn move_cursor(&mut self, key: &AKey) {
        match (key, self.current_row()) {
            (AKey::Left, _) if self.cursor.x > 0 => self.cursor.x -= 1,
            (AKey::Left, _) if self.cursor.y > 0 => {
                // ← at the beginning of the line: move to the end of the previous line.
                self.cursor.y -= 1;
                self.cursor.x = self.rows[self.cursor.y].chars.len();
            }
            (AKey::Right, Some(row)) if self.cursor.x < row.chars.len() => self.cursor.x += 1,
            // → at the end of the line: move to the start of the next line.
            (AKey::Right, Some(_)) => self.cursor.move_to_next_line(),
            (AKey::Up, _) if self.cursor.y > 0 => self.cursor.y -= 1,
            (AKey::Down, _) if self.cursor.y < self.rows.len() => self.cursor.y += 1,
            _ => (),
        }
        self.update_cursor_x_position();
    }

    /// Update the cursor x position. If the cursor y position has changed, the current position
    /// might be illegal (x is further right than the last byte of the row). If that is the case,
    /// clamp `self.cursor.x`.
    fn update_cursor_x_position(&mut self) {
        self.cursor.x = self.cursor.x.min(self.current_row().map_or(0, |row| row.chars.len()));
    }

    /// Run a loop to obtain the key that was pressed. When bytes are received, we match to a
    /// corresponding `Key`. In particular, we handle ANSI escape codes to return `Key::Delete`,
    /// `Key::Home` etc. An unrecognized escape sequence yields `Key::Escape`, as does an escape
    /// byte whose continuation does not arrive in time.
    fn loop_until_keypress(&mut self) -> Result<Key, Error> {
        loop {
            let mut bytes = io::stdin().bytes();
            // Match on the next byte received or, if the first byte is <ESC> ('\x1b'), on the
            // next few bytes.
            match next_byte(&mut bytes)? {
                Some(b'\x1b') => {
                    return Ok(match next_byte(&mut bytes)? {
                        Some(b @ (b'[' | b'O')) => match (b, next_byte(&mut bytes)?) {
                            (b'[', Some(b'A')) => Key::Arrow(AKey::Up),
                            (b'[', Some(b'B')) => Key::Arrow(AKey::Down),
                            (b'[', Some(b'C')) => Key::Arrow(AKey::Right),
                            (b'[', Some(b'D')) => Key::Arrow(AKey::Left),
                            (b'[' | b'O', Some(b'H')) => Key::Home,
                            (b'[' | b'O', Some(b'F')) => Key::End,
                            (b'[', Some(c @ b'0'..=b'9')) => match next_byte(&mut bytes)? {
                                Some(b'~') => match c {
                                    b'1' | b'7' => Key::Home,
                                    b'3' => Key::Delete,
                                    b'4' | b'8' => Key::End,
                                    b'5' => Key::Page(PageKey::Up),
                                    b'6' => Key::Page(PageKey::Down),
                                    _ => Key::Escape,
                                },
                                _ => Key::Escape,
                            },
                            _ => Key::Escape,
                        },
                        _ => Key::Escape,
                    });
                }
                Some(b) => return Ok(Key::Char(b)),
                None => continue,
            }
        }
    }

    /// Look up the filetype entry matching the current file name and re-highlight every row with
    /// it. Highlighting is disabled when no entry matches.
    fn select_syntax(&mut self) {
        self.syntax = self.file_name.as_deref().and_then(syntax::select_syntax);
        if let Some(syntax) = self.syntax {
            let tab_stop = self.config.tab_stop;
            for row in &mut self.rows {
                row.update(Some(syntax), tab_stop);
            }
        }
    }

    /// Recompute the rendered form and the highlighting of a row, given its index.
    fn update_row(&mut self, y: usize) {
        let (syntax, tab_stop) = (self.syntax, self.config.tab_stop);
        if let Some(row) = self.rows.get_mut(y) {
            row.update(syntax, tab_stop);
        }
    }

    /// Insert a byte at the current cursor position. If the cursor is on the virtual row below
    /// the file, append a new empty row first.
    fn insert_byte(&mut self, c: u8) {
        if self.cursor.y == self.rows.len() {
            self.rows.push(Row::new(Vec::new()));
        }
        let row = &mut self.rows[self.cursor.y];
        let at = self.cursor.x.min(row.chars.len());
        row.chars.insert(at, c);
        self.update_row(self.cursor.y);
        self.cursor.x += 1;
        self.dirty += 1;
    }

    /// Insert a new line at the current cursor position and move the cursor to the start of the
    /// new line. If the cursor is in the middle of a row, split off that row.
    fn insert_new_line(&mut self) {
        if self.cursor.x == 0 {
            self.rows.insert(self.cursor.y, Row::new(Vec::new()));
            self.update_row(self.cursor.y);
        } else {
            // self.rows[self.cursor.y] must exist, since cursor.x = 0 for any cursor.y ≥
            // rows.len()
            let new_chars = self.rows[self.cursor.y].chars.split_off(self.cursor.x);
            self.update_row(self.cursor.y);
            self.rows.insert(self.cursor.y + 1, Row::new(new_chars));
            self.update_row(self.cursor.y + 1);
        }
        self.cursor.move_to_next_line();
        self.dirty += 1;
    }

    /// Delete the byte before the cursor. At the beginning of a row, merge the row into the
    /// previous one. A no-op at the origin and below the last row.
    fn delete_char(&mut self) {
        if self.cursor.y == self.rows.len() {
            return;
        }
        if self.cursor.x > 0 {
            self.rows[self.cursor.y].chars.remove(self.cursor.x - 1);
            self.update_row(self.cursor.y);
            self.cursor.x -= 1;
            self.dirty += 1;
        } else if self.cursor.y > 0 {
            let row = self.rows.remove(self.cursor.y);
            let previous_row = &mut self.rows[self.cursor.y - 1];
            self.cursor.x = previous_row.chars.len();
            previous_row.chars.extend_from_slice(&row.chars);
            self.update_row(self.cursor.y - 1);
            self.cursor.y -= 1;
            self.dirty += 1;
        }
    }

    /// Load a file into the rows. The file name has already been set and the filetype selected.
    fn load(&mut self, path: &Path) -> Result<(), Error> {
        let file = File::open(path).map_err(|err| Error::Io("open", err))?;
        for line in BufReader::new(file).split(b'\n') {
            let mut line = line.map_err(|err| Error::Io("read", err))?;
            while line.ends_with(b"\r") || line.ends_with(b"\n") {
                line.pop();
            }
            let mut row = Row::new(line);
            row.update(self.syntax, self.config.tab_stop);
            self.rows.push(row);
        }
        self.dirty = 0;
        Ok(())
    }

    /// Serialize the rows to a single byte block: each row's content followed by a newline.
    fn rows_to_bytes(&self) -> Vec<u8> {
        let size = self.rows.iter().map(|row| row.chars.len() + 1).sum();
        let mut block = Vec::with_capacity(size);
        for row in &self.rows {
            block.extend_from_slice(&row.chars);
            block.push(b'\n');
        }
        block
    }

    /// Save the text to a file, given its name. The file is created with mode 0644 if it does not
    /// exist, truncated to the exact serialized length, and written in full.
    fn save(&self, file_name: &str) -> Result<usize, io::Error> {
        let block = self.rows_to_bytes();
        let mut file =
            OpenOptions::new().write(true).create(true).mode(0o644).open(file_name)?;
        file.set_len(block.len() as u64)?;
        file.write_all(&block)?;
        Ok(block.len())
    }

    /// Save the text to a file and handle all errors. Errors and success messages will be printed
    /// to the status bar; a failed save leaves the in-memory state untouched.
    fn save_and_handle_io_errors(&mut self, file_name: &str) {
        match self.save(file_name) {
            Ok(written) => {
                set_status!(self, "{} bytes written to disk", written);
                self.dirty = 0;
            }
            Err(err) => set_status!(self, "Can't save! I/O error: {}", err),
        }
    }

    /// Save to a file after obtaining the file path from the prompt. The `file_name` attribute of
    /// the editor is set and the filetype reselected before writing.
    fn save_as(&mut self, file_name: String) {
        self.file_name = Some(file_name);
        self.select_syntax();
        if let Some(file_name) = self.file_name.take() {
            self.save_and_handle_io_errors(&file_name);
            self.file_name = Some(file_name);
        }
    }

    /// Try to find `query`, walking at most one full cycle over the rows starting after (or
    /// before, when searching backward) the last match. On a match, move the cursor there and
    /// paint the matched span, remembering the overwritten highlighting so the next call can
    /// restore it.
    fn find(&mut self, query: &[u8], state: &mut FindState, forward: bool) {
        let num_rows = self.rows.len();
        if num_rows == 0 {
            return;
        }
        let tab_stop = self.config.tab_stop;
        let mut current = state.last_match.unwrap_or(num_rows - 1);
        for _ in 0..num_rows {
            current = (current + if forward { 1 } else { num_rows - 1 }) % num_rows;
            let row = &mut self.rows[current];
            if let Some(rx) = slice_find(&row.render, query) {
                let cx = row.rx2cx(rx, tab_stop);
                state.saved_hl = Some((current, row.hl.clone()));
                for hl in &mut row.hl[rx..rx + query.len()] {
                    *hl = Highlight::Match;
                }
                state.last_match = Some(current);
                self.cursor.y = current;
                self.cursor.x = cx;
                // Push the row offset past the end of the file; the scroll clamp on the next
                // redraw brings it back so that the match row lands at the top of the screen.
                self.cursor.roff = num_rows;
                return;
            }
        }
    }

    /// Draw the rows of text and the tildes of the empty rows, by adding bytes to the frame
    /// buffer. An empty file gets the welcome banner a third of the way down.
    fn draw_rows(&self, buffer: &mut Vec<u8>) {
        for i in 0..self.screen_rows {
            let file_row = i + self.cursor.roff;
            if let Some(row) = self.rows.get(file_row) {
                row.draw(self.cursor.coff, self.screen_cols, buffer);
            } else if self.rows.is_empty() && i == self.screen_rows / 3 {
                self.draw_welcome_message(buffer);
            } else {
                buffer.push(b'~');
            }
            buffer.extend_from_slice(CLEAR_LINE_RIGHT_OF_CURSOR);
            buffer.extend_from_slice(b"\r\n");
        }
    }

    fn draw_welcome_message(&self, buffer: &mut Vec<u8>) {
        let mut welcome = concat!("Warm Editor -- version ", env!("CARGO_PKG_VERSION")).to_string();
        welcome.truncate(self.screen_cols);
        let mut padding = (self.screen_cols - welcome.len()) / 2;
        if padding > 0 {
            buffer.push(b'~');
            padding -= 1;
        }
        buffer.extend(std::iter::repeat(b' ').take(padding));
        buffer.extend_from_slice(welcome.as_bytes());
    }

    /// Draw the status bar on the terminal, by adding bytes to the frame buffer.
    fn draw_status_bar(&self, buffer: &mut Vec<u8>) {
        let modified = if self.dirty > 0 { "(modified)" } else { "" };
        let mut left = format!(
            "{:.20} - {} lines {}",
            self.file_name.as_deref().unwrap_or("[No Name]"),
            self.rows.len(),
            modified
        );
        left.truncate(self.screen_cols);
        let right = format!(
            "{} | {}/{}",
            self.syntax.map_or("no file type", |syntax| syntax.name),
            self.cursor.y + 1,
            self.rows.len()
        );

        buffer.extend_from_slice(REVERSE_VIDEO);
        buffer.extend_from_slice(left.as_bytes());
        // Pad with spaces so that the right part ends exactly at the last column.
        let mut len = left.len();
        while len < self.screen_cols {
            if self.screen_cols - len == right.len() {
                buffer.extend_from_slice(right.as_bytes());
                break;
            }
            buffer.push(b' ');
            len += 1;
        }
        buffer.extend_from_slice(RESET_FMT);
        buffer.extend_from_slice(b"\r\n");
    }

    /// Draw the message bar on the terminal, by adding bytes to the frame buffer.
    fn draw_message_bar(&self, buffer: &mut Vec<u8>) {
        buffer.extend_from_slice(CLEAR_LINE_RIGHT_OF_CURSOR);
        let msg_dur = self.config.message_dur;
        if let Some(sm) = self.status_msg.as_ref().filter(|sm| sm.time.elapsed() < msg_dur) {
            let len = sm.msg.len().min(self.screen_cols);
            buffer.extend_from_slice(&sm.msg.as_bytes()[..len]);
        }
    }

    /// Refresh the screen: update the offsets, draw the rows, the status bar, the message bar,
    /// and move the cursor to the correct position. The frame is composed in a single buffer and
    /// pushed to the terminal in one write.
    fn refresh_screen(&mut self) -> Result<(), Error> {
        let rx = self.rx();
        self.cursor.scroll(rx, self.screen_rows, self.screen_cols);
        let mut buffer = Vec::new();
        buffer.extend_from_slice(HIDE_CURSOR);
        buffer.extend_from_slice(MOVE_CURSOR_TO_START);
        self.draw_rows(&mut buffer);
        self.draw_status_bar(&mut buffer);
        self.draw_message_bar(&mut buffer);
        let (cursor_y, cursor_x) =
            (self.cursor.y - self.cursor.roff + 1, rx - self.cursor.coff + 1);
        buffer.extend_from_slice(format!("\x1b[{};{}H", cursor_y, cursor_x).as_bytes());
        buffer.extend_from_slice(SHOW_CURSOR);
        terminal::print_and_flush(&buffer)
    }

    /// Process a key that has been pressed, when not in prompt mode. Returns whether the program
    /// should exit, and optionally the prompt mode to switch to.
    fn process_keypress(&mut self, key: &Key) -> Result<(bool, Option<PromptMode>), Error> {
        // This won't be mutated, unless key is Key::Char(EXIT)
        let mut quit_times = self.config.quit_times;
        let mut prompt_mode = None;

        match key {
            Key::Arrow(arrow) => self.move_cursor(arrow),
            Key::Page(PageKey::Up) => {
                self.cursor.y = self.cursor.roff;
                self.update_cursor_x_position();
            }
            Key::Page(PageKey::Down) => {
                self.cursor.y = (self.cursor.roff + self.screen_rows - 1).min(self.rows.len());
                self.update_cursor_x_position();
            }
            Key::Home => self.cursor.x = 0,
            Key::End => self.cursor.x = self.current_row().map_or(0, |row| row.chars.len()),
            Key::Char(b'\r') => self.insert_new_line(), // Enter
            Key::Char(BACKSPACE | DELETE_BIS) => self.delete_char(), // Backspace or Ctrl-H
            Key::Delete => {
                self.move_cursor(&AKey::Right);
                self.delete_char();
            }
            Key::Escape | Key::Char(REFRESH_SCREEN) => (),
            Key::Char(EXIT) => {
                if self.dirty > 0 && self.quit_times > 0 {
                    set_status!(
                        self,
                        "WARNING! File has unsaved changes. Press Ctrl-Q {} more times to quit.",
                        self.quit_times
                    );
                    quit_times = self.quit_times - 1;
                } else {
                    terminal::clear_screen()?;
                    return Ok((true, None));
                }
            }
            Key::Char(SAVE) => match self.file_name.take() {
                Some(file_name) => {
                    self.save_and_handle_io_errors(&file_name);
                    self.file_name = Some(file_name);
                }
                None => prompt_mode = Some(PromptMode::Save(String::new())),
            },
            Key::Char(FIND) => {
                prompt_mode =
                    Some(PromptMode::Find(String::new(), self.cursor.clone(), FindState::default()));
            }
            Key::Char(c) => self.insert_byte(*c),
        }
        self.quit_times = quit_times;
        Ok((false, prompt_mode))
    }

    /// If `file_name` is not None, load the file. Then run the text editor.
    ///
    /// # Errors
    ///
    /// Will return `Err` if any fatal error occurs.
    pub fn run(&mut self, file_name: Option<String>) -> Result<(), Error> {
        self.file_name = file_name;
        self.select_syntax();
        if let Some(path) = self.file_name.clone() {
            self.load(Path::new(&path))?;
        }
        set_status!(self, "{}", HELP_MESSAGE);
        loop {
            if let Some(mode) = self.prompt_mode.as_ref() {
                set_status!(self, "{}", mode.status_msg());
            }
            self.refresh_screen()?;
            let key = self.loop_until_keypress()?;
            self.prompt_mode = match self.prompt_mode.take() {
                // process_keypress returns (should_quit, prompt_mode)
                None => match self.process_keypress(&key)? {
                    (true, _) => return Ok(()),
                    (false, prompt_mode) => prompt_mode,
                },
                Some(prompt_mode) => prompt_mode.process_keypress(self, &key),
            }
        }
    }
}

impl Drop for Editor {
    /// When the editor is dropped, restore the original terminal mode.
    fn drop(&mut self) {
        if let Some(orig_term_mode) = self.orig_term_mode.take() {
            sys::set_term_mode(&orig_term_mode).expect("Could not restore original terminal mode.");
        }
    }
}

/// The prompt mode.
enum PromptMode {
    /// Save(prompt buffer)
    Save(String),
    /// Find(prompt buffer, saved cursor state, search state)
    Find(String, CursorState, FindState),
}

/// The persistent state of an incremental search, carried through the prompt loop.
#[derive(Default)]
struct FindState {
    /// The row index of the last match, if any.
    last_match: Option<usize>,
    /// The highlighting overwritten by the previous match, restored on the next keypress.
    saved_hl: Option<(usize, Vec<Highlight>)>,
}

impl PromptMode {
    /// Return the status message to print for the selected `PromptMode`.
    fn status_msg(&self) -> String {
        match self {
            Self::Save(buffer) => format!("Save as: {} (ESC to cancel)", buffer),
            Self::Find(buffer, ..) => format!("Search: {} (Use ESC/Arrows/Enter)", buffer),
        }
    }

    /// Process a keypress event for the selected `PromptMode`.
    fn process_keypress(self, ed: &mut Editor, key: &Key) -> Option<Self> {
        ed.status_msg = None;
        match self {
            Self::Save(buffer) => match process_prompt_keypress(buffer, key) {
                PromptState::Active(buffer) => return Some(Self::Save(buffer)),
                PromptState::Cancelled => set_status!(ed, "Save aborted"),
                PromptState::Completed(file_name) => ed.save_as(file_name),
            },
            Self::Find(buffer, saved_cursor, mut state) => {
                // Undo the highlighting of the previous match before anything else.
                if let Some((row_idx, hl)) = state.saved_hl.take() {
                    ed.rows[row_idx].hl = hl;
                }
                match process_prompt_keypress(buffer, key) {
                    PromptState::Active(query) => {
                        let forward = match key {
                            Key::Arrow(AKey::Right | AKey::Down) => true,
                            Key::Arrow(AKey::Left | AKey::Up) => false,
                            // Any other key restarts the search from the top.
                            _ => {
                                state.last_match = None;
                                true
                            }
                        };
                        ed.find(query.as_bytes(), &mut state, forward);
                        return Some(Self::Find(query, saved_cursor, state));
                    }
                    // The prompt was cancelled. Restore the previous cursor position.
                    PromptState::Cancelled => ed.cursor = saved_cursor,
                    // The cursor stays on the match.
                    PromptState::Completed(_) => (),
                }
            }
        }
        None
    }
}

/// The state of the prompt after processing a keypress event.
enum PromptState {
    /// Active contains the current buffer
    Active(String),
    /// Completed contains the final string
    Completed(String),
    Cancelled,
}

/// Process a prompt keypress event and return the new state for the prompt. Pressing Enter on an
/// empty buffer is ignored.
fn process_prompt_keypress(mut buffer: String, key: &Key) -> PromptState {
    match key {
        Key::Char(b'\r') if !buffer.is_empty() => return PromptState::Completed(buffer),
        Key::Escape => return PromptState::Cancelled,
        Key::Delete | Key::Char(BACKSPACE | DELETE_BIS) => {
            buffer.pop();
        }
        Key::Char(c @ 0..=127) if !c.is_ascii_control() => buffer.push(*c as char),
        // No-op
        _ => (),
    }
    PromptState::Active(buffer)
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    fn editor() -> Editor {
        let mut editor = Editor::default();
        editor.quit_times = editor.config.quit_times;
        editor.screen_rows = 22;
        editor.screen_cols = 80;
        editor
    }

    fn editor_with_rows(lines: &[&[u8]]) -> Editor {
        let mut editor = editor();
        for line in lines {
            let mut row = Row::new(line.to_vec());
            row.update(None, editor.config.tab_stop);
            editor.rows.push(row);
        }
        editor
    }

    fn chars(editor: &Editor) -> Vec<Vec<u8>> {
        editor.rows.iter().map(|row| row.chars.clone()).collect()
    }

    fn status(editor: &Editor) -> &str {
        editor.status_msg.as_ref().map(|sm| sm.msg.as_str()).unwrap_or("")
    }

    #[test]
    fn insert_then_backspace_is_identity() {
        let mut ed = editor_with_rows(&[b"hello"]);
        ed.cursor.x = 2;
        ed.insert_byte(b'X');
        assert_eq!(chars(&ed), [b"heXllo".to_vec()]);
        assert_eq!(ed.cursor.x, 3);
        ed.delete_char();
        assert_eq!(chars(&ed), [b"hello".to_vec()]);
        assert_eq!(ed.cursor.x, 2);
        assert!(ed.dirty > 0);
    }

    #[test]
    fn split_then_join_round_trip() {
        for k in 0..=5 {
            let mut ed = editor_with_rows(&[b"hello"]);
            ed.cursor.x = k;
            ed.insert_new_line();
            assert_eq!(ed.rows.len(), 2);
            assert_eq!((ed.cursor.x, ed.cursor.y), (0, 1));
            ed.delete_char();
            assert_eq!(chars(&ed), [b"hello".to_vec()]);
            assert_eq!((ed.cursor.x, ed.cursor.y), (k, 0));
        }
    }

    #[test]
    fn insert_on_the_virtual_row_appends_a_row() {
        let mut ed = editor();
        assert_eq!(ed.cursor.y, ed.rows.len());
        ed.insert_byte(b'a');
        assert_eq!(chars(&ed), [b"a".to_vec()]);
        assert_eq!((ed.cursor.x, ed.cursor.y), (1, 0));
    }

    #[test]
    fn newline_at_line_start_inserts_an_empty_row_above() {
        let mut ed = editor_with_rows(&[b"abc"]);
        ed.insert_new_line();
        assert_eq!(chars(&ed), [b"".to_vec(), b"abc".to_vec()]);
        assert_eq!((ed.cursor.x, ed.cursor.y), (0, 1));
    }

    #[test]
    fn backspace_at_origin_and_below_the_file_is_a_noop() {
        let mut ed = editor_with_rows(&[b"abc"]);
        ed.delete_char();
        assert_eq!(chars(&ed), [b"abc".to_vec()]);
        assert_eq!(ed.dirty, 0);
        ed.cursor.y = 1;
        ed.delete_char();
        assert_eq!(chars(&ed), [b"abc".to_vec()]);
        assert_eq!(ed.dirty, 0);
    }

    #[test]
    fn arrows_wrap_at_line_edges() {
        let mut ed = editor_with_rows(&[b"abc", b"de"]);
        ed.cursor.x = 3;
        ed.move_cursor(&AKey::Right);
        assert_eq!((ed.cursor.x, ed.cursor.y), (0, 1));
        ed.move_cursor(&AKey::Left);
        assert_eq!((ed.cursor.x, ed.cursor.y), (3, 0));
    }

    #[test]
    fn vertical_moves_clamp_x_to_the_row_length() {
        let mut ed = editor_with_rows(&[b"abcdef", b"ab"]);
        ed.cursor.x = 5;
        ed.move_cursor(&AKey::Down);
        assert_eq!((ed.cursor.x, ed.cursor.y), (2, 1));
    }

    #[test]
    fn page_keys_jump_within_the_viewport() {
        let lines: Vec<Vec<u8>> = (0..100).map(|i| format!("line {}", i).into_bytes()).collect();
        let refs: Vec<&[u8]> = lines.iter().map(Vec::as_slice).collect();
        let mut ed = editor_with_rows(&refs);
        ed.cursor.roff = 30;
        ed.cursor.y = 40;
        ed.process_keypress(&Key::Page(PageKey::Up)).unwrap();
        assert_eq!(ed.cursor.y, 30);
        ed.process_keypress(&Key::Page(PageKey::Down)).unwrap();
        assert_eq!(ed.cursor.y, 30 + ed.screen_rows - 1);
    }

    #[test]
    fn home_and_end_move_within_the_row() {
        let mut ed = editor_with_rows(&[b"abcdef"]);
        ed.cursor.x = 3;
        ed.process_keypress(&Key::End).unwrap();
        assert_eq!(ed.cursor.x, 6);
        ed.process_keypress(&Key::Home).unwrap();
        assert_eq!(ed.cursor.x, 0);
    }

    #[test]
    fn scroll_keeps_the_cursor_inside_the_window() {
        let mut cursor = CursorState { x: 0, y: 50, roff: 0, coff: 0 };
        cursor.scroll(0, 22, 80);
        assert_eq!(cursor.roff, 50 - 22 + 1);
        assert!(cursor.roff <= cursor.y && cursor.y < cursor.roff + 22);
        cursor.y = 10;
        cursor.scroll(0, 22, 80);
        assert_eq!(cursor.roff, 10);
    }

    #[test]
    fn quit_warns_while_dirty_then_exits() {
        let mut ed = editor_with_rows(&[b"abc"]);
        ed.insert_byte(b'x');
        for remaining in [3, 2, 1] {
            let (quit, _) = ed.process_keypress(&Key::Char(EXIT)).unwrap();
            assert!(!quit);
            assert_eq!(
                status(&ed),
                format!(
                    "WARNING! File has unsaved changes. Press Ctrl-Q {} more times to quit.",
                    remaining
                )
            );
        }
        let (quit, _) = ed.process_keypress(&Key::Char(EXIT)).unwrap();
        assert!(quit);
    }

    #[test]
    fn any_other_key_resets_the_quit_countdown() {
        let mut ed = editor_with_rows(&[b"abc"]);
        ed.insert_byte(b'x');
        ed.process_keypress(&Key::Char(EXIT)).unwrap();
        assert!(status(&ed).contains("3 more times"));
        ed.process_keypress(&Key::Arrow(AKey::Left)).unwrap();
        ed.process_keypress(&Key::Char(EXIT)).unwrap();
        assert!(status(&ed).contains("3 more times"));
    }

    #[test]
    fn clean_quit_exits_immediately() {
        let mut ed = editor_with_rows(&[b"abc"]);
        let (quit, _) = ed.process_keypress(&Key::Char(EXIT)).unwrap();
        assert!(quit);
    }

    #[test]
    fn prompt_keypresses_edit_the_buffer() {
        let state = process_prompt_keypress(String::new(), &Key::Char(b'a'));
        let buffer = match state {
            PromptState::Active(buffer) => buffer,
            _ => panic!("expected the prompt to stay active"),
        };
        assert_eq!(buffer, "a");
        match process_prompt_keypress(buffer, &Key::Char(BACKSPACE)) {
            PromptState::Active(buffer) => assert_eq!(buffer, ""),
            _ => panic!("expected the prompt to stay active"),
        }
        // Enter on an empty buffer is ignored.
        match process_prompt_keypress(String::new(), &Key::Char(b'\r')) {
            PromptState::Active(buffer) => assert_eq!(buffer, ""),
            _ => panic!("expected the prompt to stay active"),
        }
        match process_prompt_keypress("q".to_string(), &Key::Char(b'\r')) {
            PromptState::Completed(buffer) => assert_eq!(buffer, "q"),
            _ => panic!("expected the prompt to complete"),
        }
        match process_prompt_keypress("q".to_string(), &Key::Escape) {
            PromptState::Cancelled => (),
            _ => panic!("expected the prompt to cancel"),
        }
        // Control bytes pass through.
        match process_prompt_keypress("q".to_string(), &Key::Char(EXIT)) {
            PromptState::Active(buffer) => assert_eq!(buffer, "q"),
            _ => panic!("expected the prompt to stay active"),
        }
    }

    #[test]
    fn find_moves_the_cursor_and_paints_the_match() {
        let mut ed = editor_with_rows(&[b"foo", b"bar", b"foobar"]);
        let mut mode =
            PromptMode::Find(String::new(), ed.cursor.clone(), FindState::default());
        for key in [Key::Char(b'b'), Key::Char(b'a'), Key::Char(b'r')] {
            mode = mode.process_keypress(&mut ed, &key).unwrap();
        }
        assert_eq!(ed.cursor.y, 1);
        assert_eq!(ed.cursor.x, 0);
        assert_eq!(&ed.rows[1].hl[..3], &[Highlight::Match; 3]);
        // Enter leaves the cursor on the match and clears the painted span.
        assert!(mode.process_keypress(&mut ed, &Key::Char(b'\r')).is_none());
        assert_eq!(ed.cursor.y, 1);
        assert_eq!(&ed.rows[1].hl[..3], &[Highlight::Normal; 3]);
    }

    #[test]
    fn cancelling_find_restores_cursor_and_highlighting() {
        let mut ed = editor_with_rows(&[b"foo", b"bar", b"foobar"]);
        ed.cursor.x = 2;
        let snapshot = ed.cursor.clone();
        let mut mode = PromptMode::Find(String::new(), ed.cursor.clone(), FindState::default());
        for key in [Key::Char(b'b'), Key::Char(b'a'), Key::Char(b'r')] {
            mode = mode.process_keypress(&mut ed, &key).unwrap();
        }
        assert_eq!(ed.cursor.y, 1);
        assert!(mode.process_keypress(&mut ed, &Key::Escape).is_none());
        assert_eq!(ed.cursor, snapshot);
        assert_eq!(&ed.rows[1].hl[..3], &[Highlight::Normal; 3]);
    }

    #[test]
    fn find_steps_through_matches_and_wraps() {
        let mut ed = editor_with_rows(&[b"ab", b"x", b"ab"]);
        let mut state = FindState::default();
        ed.find(b"ab", &mut state, true);
        assert_eq!(ed.cursor.y, 0);
        // Restore before the next step, as the prompt does.
        let (row_idx, hl) = state.saved_hl.take().unwrap();
        ed.rows[row_idx].hl = hl;
        ed.find(b"ab", &mut state, true);
        assert_eq!(ed.cursor.y, 2);
        let (row_idx, hl) = state.saved_hl.take().unwrap();
        ed.rows[row_idx].hl = hl;
        // Forward from the last row wraps around to the first.
        ed.find(b"ab", &mut state, true);
        assert_eq!(ed.cursor.y, 0);
        let (row_idx, hl) = state.saved_hl.take().unwrap();
        ed.rows[row_idx].hl = hl;
        // And backward wraps the other way.
        ed.find(b"ab", &mut state, false);
        assert_eq!(ed.cursor.y, 2);
    }

    #[test]
    fn find_match_column_accounts_for_tabs() {
        let mut ed = editor_with_rows(&[b"\tbar"]);
        let mut state = FindState::default();
        ed.find(b"bar", &mut state, true);
        // The match starts at rendered column 8, which is logical position 1.
        assert_eq!((ed.cursor.x, ed.cursor.y), (1, 0));
        assert_eq!(&ed.rows[0].hl[8..11], &[Highlight::Match; 3]);
    }

    #[test]
    fn banner_and_tildes_on_an_empty_file() {
        let ed = editor();
        let mut buffer = Vec::new();
        ed.draw_rows(&mut buffer);
        let frame = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = frame.split("\r\n").collect();
        assert!(lines[7].starts_with('~'));
        assert!(lines[7].contains("Warm Editor -- version 0.1.0"));
        for (i, line) in lines.iter().take(ed.screen_rows).enumerate() {
            if i != 7 {
                assert!(line.starts_with('~'), "row {} should be a tilde", i);
            }
        }
    }

    #[test]
    fn status_bar_shows_name_line_count_and_dirty_flag() {
        let mut ed = editor();
        let mut buffer = Vec::new();
        ed.draw_status_bar(&mut buffer);
        let bar = String::from_utf8(buffer).unwrap();
        assert!(bar.contains("[No Name] - 0 lines "));
        assert!(bar.contains("no file type | 1/0"));
        ed.insert_byte(b'a');
        let mut buffer = Vec::new();
        ed.draw_status_bar(&mut buffer);
        let bar = String::from_utf8(buffer).unwrap();
        assert!(bar.contains("(modified)"));
    }

    #[test]
    #[serial]
    fn save_writes_the_exact_serialized_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let mut ed = editor();
        for b in *b"abc" {
            ed.insert_byte(b);
        }
        ed.insert_new_line();
        for b in *b"de" {
            ed.insert_byte(b);
        }
        assert!(ed.dirty > 0);
        ed.save_and_handle_io_errors(path.to_str().unwrap());
        assert_eq!(std::fs::read(&path).unwrap(), b"abc\nde\n");
        assert_eq!(ed.dirty, 0);
        assert_eq!(status(&ed), "7 bytes written to disk");
    }

    #[test]
    #[serial]
    fn save_as_selects_the_filetype() {
        // The extension starts at the first dot of the whole file name, so save with a relative
        // path: the temporary directory itself contains a dot.
        let dir = tempfile::tempdir().unwrap();
        let cwd = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir.path()).unwrap();
        let mut ed = editor_with_rows(&[b"int x;"]);
        ed.save_as("main.c".to_string());
        std::env::set_current_dir(cwd).unwrap();
        assert_eq!(ed.syntax.map(|s| s.name), Some("c"));
        assert_eq!(&ed.rows[0].hl[..3], &[Highlight::Keyword2; 3]);
        assert_eq!(ed.file_name.as_deref(), Some("main.c"));
        assert_eq!(std::fs::read(dir.path().join("main.c")).unwrap(), b"int x;\n");
        assert_eq!(ed.dirty, 0);
    }

    #[test]
    #[serial]
    fn save_failure_is_reported_in_the_status_bar() {
        let mut ed = editor_with_rows(&[b"abc"]);
        ed.insert_byte(b'x');
        let dirty = ed.dirty;
        ed.save_and_handle_io_errors("/nonexistent-dir/out.txt");
        assert!(status(&ed).starts_with("Can't save! I/O error: "));
        assert_eq!(ed.dirty, dirty);
    }

    #[test]
    #[serial]
    fn load_strips_line_terminators() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.txt");
        std::fs::write(&path, b"a\r\nb\nc").unwrap();
        let mut ed = editor();
        ed.load(&path).unwrap();
        assert_eq!(chars(&ed), [b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
        assert_eq!(ed.dirty, 0);
    }

    #[test]
    #[serial]
    fn load_does_not_append_a_row_for_the_trailing_newline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.txt");
        std::fs::write(&path, b"abc\nde\n").unwrap();
        let mut ed = editor();
        ed.load(&path).unwrap();
        assert_eq!(ed.rows.len(), 2);
    }

    #[test]
    #[serial]
    fn loading_a_missing_file_is_an_error() {
        let mut ed = editor();
        assert!(ed.load(Path::new("/nonexistent-dir/in.txt")).is_err());
    }

    #[test]
    #[serial]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roundtrip.txt");
        let mut ed = editor_with_rows(&[b"alpha", b"", b"\tbeta"]);
        ed.save_and_handle_io_errors(path.to_str().unwrap());
        let mut reloaded = editor();
        reloaded.load(&path).unwrap();
        assert_eq!(chars(&reloaded), chars(&ed));
    }
}

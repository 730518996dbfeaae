//! # Terminal
//!
//! Helpers to write to the terminal. A whole frame is composed in memory and pushed to stdout
//! with a single write.

use std::io::{self, Write};

use crate::ansi_escape::{CLEAR_SCREEN, MOVE_CURSOR_TO_START};
use crate::Error;

/// Write a buffer to stdout in one write, then flush it.
pub fn print_and_flush(buffer: &[u8]) -> Result<(), Error> {
    let mut stdout = io::stdout();
    stdout.write_all(buffer).map_err(|err| Error::Io("write", err))?;
    stdout.flush().map_err(|err| Error::Io("write", err))
}

/// Clear the screen and move the cursor to the top-left corner.
pub fn clear_screen() -> Result<(), Error> {
    print_and_flush(&[CLEAR_SCREEN, MOVE_CURSOR_TO_START].concat())
}

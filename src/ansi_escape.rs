//! # ANSI Escape sequences
//!
//! The VT100 control sequences emitted by the renderer. See
//! <https://vt100.net/docs/vt100-ug/chapter3.html> for a reference.

/// Switch to invisible cursor mode.
pub const HIDE_CURSOR: &[u8] = b"\x1b[?25l";

/// Switch to visible cursor mode.
pub const SHOW_CURSOR: &[u8] = b"\x1b[?25h";

/// Move the cursor to the top-left corner of the screen.
pub const MOVE_CURSOR_TO_START: &[u8] = b"\x1b[H";

/// Clear the whole screen.
pub const CLEAR_SCREEN: &[u8] = b"\x1b[2J";

/// Clear the line right of the current position of the cursor.
pub const CLEAR_LINE_RIGHT_OF_CURSOR: &[u8] = b"\x1b[K";

/// Switch to reverse video mode.
pub const REVERSE_VIDEO: &[u8] = b"\x1b[7m";

/// Reset the formatting.
pub const RESET_FMT: &[u8] = b"\x1b[m";

/// Reset the foreground color to the default.
pub const RESET_COLOR: &[u8] = b"\x1b[39m";

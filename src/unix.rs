//! # sys (UNIX)
//!
//! UNIX-specific structs and functions. Will be imported as `sys` on UNIX systems.

use std::io;
use std::mem::MaybeUninit;

// On UNIX systems, termios represents the terminal mode.
pub use libc::termios as TermMode;
use libc::{c_int, ioctl, tcgetattr, tcsetattr, winsize};
use libc::{
    BRKINT, CS8, ECHO, ICANON, ICRNL, IEXTEN, INPCK, ISIG, ISTRIP, IXON, OPOST, STDERR_FILENO,
    STDIN_FILENO, TCSAFLUSH, TIOCGWINSZ, VMIN, VTIME,
};

use crate::Error;

fn cerr(context: &'static str, err: c_int) -> Result<(), Error> {
    match err {
        0..=c_int::MAX => Ok(()),
        _ => Err(Error::Io(context, io::Error::last_os_error())),
    }
}

/// Set the terminal mode.
pub fn set_term_mode(term: &TermMode) -> Result<(), Error> {
    cerr("tcsetattr", unsafe { tcsetattr(STDIN_FILENO, TCSAFLUSH, term) })
}

/// Setup the termios to enable raw mode, and return the original termios.
///
/// termios manual is available at: <http://man7.org/linux/man-pages/man3/termios.3.html>
pub fn enable_raw_mode() -> Result<TermMode, Error> {
    let mut maybe_term = MaybeUninit::<TermMode>::uninit();
    cerr("tcgetattr", unsafe { tcgetattr(STDIN_FILENO, maybe_term.as_mut_ptr()) })?;
    let orig_term_mode = unsafe { maybe_term.assume_init() };
    let mut term = orig_term_mode;
    // Disable CR-to-NL translation, software flow control, break-to-interrupt, 8th-bit
    // stripping and parity checking.
    term.c_iflag &= !(BRKINT | ICRNL | INPCK | ISTRIP | IXON);
    // Disable output processing (no NL-to-CRNL translation).
    term.c_oflag &= !OPOST;
    // 8 bits per byte.
    term.c_cflag |= CS8;
    // Disable echo, canonical mode, signal generation and extended input processing.
    term.c_lflag &= !(ECHO | ICANON | IEXTEN | ISIG);
    // A read returns as soon as a byte is available, or after a tenth of a second.
    term.c_cc[VMIN] = 0;
    term.c_cc[VTIME] = 1;
    set_term_mode(&term)?;
    Ok(orig_term_mode)
}

/// Return the screen size, in number of rows and columns, using the TIOCGWINSZ ioctl on stderr.
pub fn get_window_size() -> Result<(usize, usize), Error> {
    let mut ws = winsize { ws_row: 0, ws_col: 0, ws_xpixel: 0, ws_ypixel: 0 };
    cerr("ioctl", unsafe { ioctl(STDERR_FILENO, TIOCGWINSZ, &mut ws) })?;
    if ws.ws_col == 0 {
        return Err(Error::InvalidWindowSize);
    }
    Ok((ws.ws_row as usize, ws.ws_col as usize))
}

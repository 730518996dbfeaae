use std::io::{self, Write};
use std::process::exit;

use warm::{Config, Editor, Error};

fn main() {
    if let Err(err) = run() {
        // Raw mode has already been restored by the editor's Drop implementation, so the error
        // message lands on a sane terminal.
        let mut stdout = io::stdout();
        let _ = stdout.write_all(b"\x1b[2J\x1b[H").and_then(|()| stdout.flush());
        eprintln!("{}", err);
        exit(1);
    }
}

fn run() -> Result<(), Error> {
    let mut args = std::env::args().skip(1);
    let file_name = args.next();
    if args.next().is_some() {
        return Err(Error::TooManyArguments(std::env::args().count()));
    }
    Editor::new(Config::default())?.run(file_name)
}

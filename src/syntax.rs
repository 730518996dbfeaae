//! # Syntax highlighting
//!
//! The per-row highlight classifier and the compile-time filetype table.

/// The highlight class of one rendered byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Highlight {
    Normal,
    Comment,
    Keyword1,
    Keyword2,
    String,
    Number,
    /// A search match, painted by the find prompt.
    Match,
}

impl Highlight {
    /// The SGR color parameter for this class, on the default palette.
    pub fn color(self) -> u8 {
        match self {
            Self::Normal => 37,
            Self::Comment => 36,
            Self::Keyword1 => 33,
            Self::Keyword2 => 32,
            Self::String => 35,
            Self::Number => 31,
            Self::Match => 34,
        }
    }
}

/// A filetype entry. `file_match` patterns starting with a `.` are matched against the file
/// extension; any other pattern is matched as a substring of the file name. A keyword with a
/// trailing `|` belongs to the secondary class (the `|` is not part of the match text).
pub struct Syntax {
    pub name: &'static str,
    pub file_match: &'static [&'static str],
    pub keywords: &'static [&'static str],
    pub singleline_comment_start: Option<&'static str>,
    pub highlight_numbers: bool,
    pub highlight_strings: bool,
}

pub const SYNTAX_DB: &[Syntax] = &[
    Syntax {
        name: "c",
        file_match: &[".c", ".h", ".cpp"],
        keywords: &[
            "switch", "if", "while", "for", "break", "continue", "return", "else", "struct",
            "union", "typedef", "static", "enum", "class", "case", "int|", "long|", "double|",
            "float|", "char|", "unsigned|", "signed|", "void|",
        ],
        singleline_comment_start: Some("//"),
        highlight_numbers: true,
        highlight_strings: true,
    },
    Syntax {
        name: "rust",
        file_match: &[".rs"],
        keywords: &[
            "fn", "let", "mut", "pub", "impl", "struct", "enum", "trait", "match", "if", "else",
            "while", "for", "loop", "return", "use", "mod", "const", "static", "break", "continue",
            "ref", "move", "unsafe", "where", "bool|", "char|", "str|", "u8|", "u16|", "u32|",
            "u64|", "usize|", "i8|", "i16|", "i32|", "i64|", "isize|", "f32|", "f64|", "String|",
            "Vec|", "Option|", "Result|", "Self|",
        ],
        singleline_comment_start: Some("//"),
        highlight_numbers: true,
        highlight_strings: true,
    },
];

/// Find the filetype entry matching `file_name`, if any. The extension starts at the first `.`
/// of the file name, so `a.b.c` has extension `.b.c`.
pub fn select_syntax(file_name: &str) -> Option<&'static Syntax> {
    let extension = file_name.find('.').map(|i| &file_name[i..]);
    for syntax in SYNTAX_DB {
        for pattern in syntax.file_match {
            let matches = if pattern.starts_with('.') {
                extension == Some(pattern)
            } else {
                file_name.contains(pattern)
            };
            if matches {
                return Some(syntax);
            }
        }
    }
    None
}

/// Return whether `b` terminates a token.
pub fn is_separator(b: u8) -> bool {
    b.is_ascii_whitespace() || b == b'\0' || b",.()+-/*=~%<>[];".contains(&b)
}

/// Classify every byte of `render`, returning one tag per byte. The scan carries two pieces of
/// state left to right: whether the previous byte was a separator, and the quote character of
/// the string currently open.
pub fn highlight_row(render: &[u8], syntax: &Syntax) -> Vec<Highlight> {
    let mut hl = vec![Highlight::Normal; render.len()];
    let mut prev_sep = true;
    let mut in_string: Option<u8> = None;
    let mut i = 0;
    while i < render.len() {
        let b = render[i];
        let prev_hl = if i > 0 { hl[i - 1] } else { Highlight::Normal };

        if let Some(comment_start) = syntax.singleline_comment_start {
            if in_string.is_none() && render[i..].starts_with(comment_start.as_bytes()) {
                for h in &mut hl[i..] {
                    *h = Highlight::Comment;
                }
                break;
            }
        }

        if syntax.highlight_strings {
            if let Some(quote) = in_string {
                hl[i] = Highlight::String;
                if b == b'\\' {
                    // The escaped byte stays part of the string. A backslash as the last byte of
                    // the row advances past the missing next byte with no visible effect.
                    if let Some(h) = hl.get_mut(i + 1) {
                        *h = Highlight::String;
                    }
                    i += 2;
                    continue;
                }
                if b == quote {
                    in_string = None;
                }
                prev_sep = true;
                i += 1;
                continue;
            } else if b == b'"' || b == b'\'' {
                in_string = Some(b);
                hl[i] = Highlight::String;
                i += 1;
                continue;
            }
        }

        if syntax.highlight_numbers
            && ((b.is_ascii_digit() && (prev_sep || prev_hl == Highlight::Number))
                || (b == b'.' && prev_hl == Highlight::Number))
        {
            hl[i] = Highlight::Number;
            prev_sep = false;
            i += 1;
            continue;
        }

        if prev_sep {
            let keyword = syntax.keywords.iter().find_map(|keyword| {
                let (text, class) = match keyword.strip_suffix('|') {
                    Some(text) => (text.as_bytes(), Highlight::Keyword2),
                    None => (keyword.as_bytes(), Highlight::Keyword1),
                };
                // The byte after the keyword must be a separator; the end of the row counts.
                let followed_by_sep =
                    render.get(i + text.len()).map_or(true, |&next| is_separator(next));
                (render[i..].starts_with(text) && followed_by_sep).then(|| (text.len(), class))
            });
            if let Some((len, class)) = keyword {
                for h in &mut hl[i..i + len] {
                    *h = class;
                }
                prev_sep = false;
                i += len;
                continue;
            }
        }

        prev_sep = is_separator(b);
        i += 1;
    }
    hl
}

//! Mold storage and the byte-at-a-time frames the scanner reads through
//!
//! Every storage kind answers the same question, "next byte or end", so the
//! scanner in [`crate::element`] never needs to know where a mold lives.
//!
//! | Kind        | Backing                          | Released            |
//! |-------------|----------------------------------|---------------------|
//! | `Literal`   | caller text shared as `Arc<str>` | never (shared)      |
//! | `Embedded`  | `&'static str` in the binary     | never               |
//! | `Generated` | handler output owned by a frame  | when the frame ends |
//! | `File`      | file opened on first read        | at end of file      |

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::types::MOLD_FILE_PREFIX;

/// Storage kind of a mold or scan frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Literal,
    Embedded,
    Generated,
    File,
}

/// Template text of a [`crate::PageElement`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mold {
    /// Text managed by the caller
    Literal(Arc<str>),
    /// Text compiled into the program
    Embedded(&'static str),
    /// Text read lazily from a file
    File(PathBuf),
}

impl Mold {
    /// Caller-managed mold, or a file mold when `text` starts with `file:`
    pub fn literal<S: AsRef<str>>(text: S) -> Self {
        let text = text.as_ref();
        match text.strip_prefix(MOLD_FILE_PREFIX) {
            Some(path) => Mold::File(PathBuf::from(path)),
            None => Mold::Literal(Arc::from(text)),
        }
    }

    /// Program-resident mold, or a file mold when `text` starts with `file:`
    pub fn embedded(text: &'static str) -> Self {
        match text.strip_prefix(MOLD_FILE_PREFIX) {
            Some(path) => Mold::File(PathBuf::from(path)),
            None => Mold::Embedded(text),
        }
    }

    /// File mold for `path`, opened on first read
    pub fn file<P: AsRef<Path>>(path: P) -> Self {
        Mold::File(path.as_ref().to_path_buf())
    }

    pub fn kind(&self) -> StorageKind {
        match self {
            Mold::Literal(_) => StorageKind::Literal,
            Mold::Embedded(_) => StorageKind::Embedded,
            Mold::File(_) => StorageKind::File,
        }
    }

    /// Byte length of the mold text, substitutions excluded.
    ///
    /// File molds report the file length, or 0 when it cannot be read.
    pub fn approx_size(&self) -> usize {
        match self {
            Mold::Literal(text) => text.len(),
            Mold::Embedded(text) => text.len(),
            Mold::File(path) => std::fs::metadata(path)
                .map(|meta| meta.len() as usize)
                .unwrap_or(0),
        }
    }

    /// A frame positioned at the start of the mold
    pub(crate) fn open(&self) -> Frame {
        match self {
            Mold::Literal(text) => Frame::Literal {
                text: Arc::clone(text),
                pos: 0,
            },
            Mold::Embedded(text) => Frame::Embedded { text: *text, pos: 0 },
            Mold::File(path) => Frame::File {
                path: path.clone(),
                state: FileState::Unopened,
            },
        }
    }
}

impl From<&'static str> for Mold {
    fn from(text: &'static str) -> Self {
        Mold::embedded(text)
    }
}

impl From<String> for Mold {
    fn from(text: String) -> Self {
        Mold::literal(text)
    }
}

#[derive(Debug)]
pub(crate) enum FileState {
    Unopened,
    Open(BufReader<File>),
    Closed,
}

/// One position of the scan: a storage kind plus its cursor
#[derive(Debug)]
pub(crate) enum Frame {
    Literal { text: Arc<str>, pos: usize },
    Embedded { text: &'static str, pos: usize },
    Generated { text: String, pos: usize },
    File { path: PathBuf, state: FileState },
}

impl Frame {
    pub(crate) fn generated(text: String) -> Self {
        Frame::Generated { text, pos: 0 }
    }

    pub(crate) fn kind(&self) -> StorageKind {
        match self {
            Frame::Literal { .. } => StorageKind::Literal,
            Frame::Embedded { .. } => StorageKind::Embedded,
            Frame::Generated { .. } => StorageKind::Generated,
            Frame::File { .. } => StorageKind::File,
        }
    }

    /// Next raw byte, or `None` once the frame is exhausted.
    ///
    /// Keeps returning `None` after the end.
    pub(crate) fn read_byte(&mut self) -> Option<u8> {
        match self {
            Frame::Literal { text, pos } => next_in(text.as_bytes(), pos),
            Frame::Embedded { text, pos } => next_in(text.as_bytes(), pos),
            Frame::Generated { text, pos } => next_in(text.as_bytes(), pos),
            Frame::File { path, state } => read_file_byte(path, state),
        }
    }
}

fn next_in(bytes: &[u8], pos: &mut usize) -> Option<u8> {
    let byte = bytes.get(*pos).copied()?;
    *pos += 1;
    Some(byte)
}

fn read_file_byte(path: &Path, state: &mut FileState) -> Option<u8> {
    if let FileState::Unopened = state {
        *state = match File::open(path) {
            Ok(file) => {
                debug!(path = %path.display(), "mold file opened");
                FileState::Open(BufReader::new(file))
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "mold file cannot be opened");
                FileState::Closed
            }
        };
    }

    let reader = match state {
        FileState::Open(reader) => reader,
        _ => return None,
    };

    let mut byte = [0u8; 1];
    loop {
        match reader.read(&mut byte) {
            Ok(0) => break,
            Ok(_) => return Some(byte[0]),
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "mold file read failed");
                break;
            }
        }
    }

    // Dropping the reader closes the handle.
    *state = FileState::Closed;
    None
}

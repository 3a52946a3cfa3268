//! Interface to the host web server
//!
//! The crate does not route requests, authenticate clients or parse
//! uploads. A host server implements [`Server`] and calls into
//! [`crate::PageBuilder`] once it has decided a page should answer.

use std::io;

use crate::argument::PageArgument;

/// Length announced before a response body is written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentLength {
    /// The body is exactly this many bytes
    Known(usize),
    /// The body is streamed; its end is signalled by an empty
    /// [`Transport::send_content`] call.
    Unknown,
}

/// Write side of a response.
///
/// Calls happen in this order: any number of `send_header`, one
/// `set_content_length`, one `send`, then zero or more `send_content` when the
/// length is [`ContentLength::Unknown`].
pub trait Transport {
    fn send_header(&mut self, name: &str, value: &str);

    fn set_content_length(&mut self, length: ContentLength);

    /// Send the status line, headers and an initial body
    fn send(&mut self, code: u16, content_type: &str, body: &[u8]) -> io::Result<()>;

    /// Send more body after a streamed `send`
    fn send_content(&mut self, chunk: &[u8]) -> io::Result<()>;
}

/// A host server processing one request
pub trait Server: Transport {
    /// Request arguments as (name, value) pairs in arrival order
    fn arguments(&self) -> Vec<(String, String)>;

    /// Arguments of the current request as a [`PageArgument`]
    fn page_argument(&self) -> PageArgument {
        self.arguments().into_iter().collect()
    }
}

/// Progress of a multipart upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStatus {
    Start,
    Write,
    End,
    Aborted,
}

/// One step of an upload as delivered by the host server
#[derive(Debug, Clone)]
pub struct HttpUpload<'a> {
    pub status: UploadStatus,
    /// Form field name
    pub name: &'a str,
    pub filename: &'a str,
    pub content_type: &'a str,
    /// Bytes received so far, this chunk included
    pub total_size: usize,
    /// Data of this step; empty for `Start`, `End` and `Aborted`
    pub data: &'a [u8],
}

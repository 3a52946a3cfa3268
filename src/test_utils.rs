//! Test utilities for pages
//!
//! [`RecordingServer`] is an in-memory [`Server`] that keeps everything a
//! page sends, so tests can check headers, the declared length and each
//! chunk. The HTML helpers compare and inspect built pages structurally.

use std::io;

use dom_query::Document;
use indexmap::IndexMap;

use crate::builder::CancelHandle;
use crate::transport::{ContentLength, Server, Transport};

/// In-memory server recording one response
#[derive(Debug, Default)]
pub struct RecordingServer {
    arguments: Vec<(String, String)>,
    headers: IndexMap<String, String>,
    content_length: Option<ContentLength>,
    code: Option<u16>,
    content_type: Option<String>,
    initial_body: Vec<u8>,
    chunks: Vec<Vec<u8>>,
    cancel_after: Option<(usize, CancelHandle)>,
    failing: bool,
}

impl RecordingServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a request argument, in arrival order
    pub fn with_arg<N: Into<String>, V: Into<String>>(mut self, name: N, value: V) -> Self {
        self.arguments.push((name.into(), value.into()));
        self
    }

    /// Cancel `handle` once `count` non-empty chunks have been received
    pub fn cancel_after(mut self, count: usize, handle: CancelHandle) -> Self {
        self.cancel_after = Some((count, handle));
        self
    }

    /// Make every body write fail
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    pub fn headers(&self) -> &IndexMap<String, String> {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    pub fn code(&self) -> Option<u16> {
        self.code
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn content_length(&self) -> Option<ContentLength> {
        self.content_length
    }

    /// Every `send_content` call, the closing empty one included
    pub fn chunks(&self) -> &[Vec<u8>] {
        &self.chunks
    }

    /// Whether the response was closed with an empty chunk
    pub fn terminated(&self) -> bool {
        self.chunks.last().map_or(false, Vec::is_empty)
    }

    /// Body as the client would see it
    pub fn body(&self) -> Vec<u8> {
        let mut body = self.initial_body.clone();
        for chunk in &self.chunks {
            body.extend_from_slice(chunk);
        }
        body
    }

    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.body()).into_owned()
    }

    fn check_writable(&self) -> io::Result<()> {
        if self.failing {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "client disconnected"))
        } else {
            Ok(())
        }
    }
}

impl Transport for RecordingServer {
    fn send_header(&mut self, name: &str, value: &str) {
        self.headers.insert(name.to_string(), value.to_string());
    }

    fn set_content_length(&mut self, length: ContentLength) {
        self.content_length = Some(length);
    }

    fn send(&mut self, code: u16, content_type: &str, body: &[u8]) -> io::Result<()> {
        self.check_writable()?;
        self.code = Some(code);
        self.content_type = Some(content_type.to_string());
        self.initial_body = body.to_vec();
        Ok(())
    }

    fn send_content(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.check_writable()?;
        self.chunks.push(chunk.to_vec());

        if let Some((count, handle)) = &self.cancel_after {
            let received = self.chunks.iter().filter(|chunk| !chunk.is_empty()).count();
            if received >= *count {
                handle.cancel();
            }
        }
        Ok(())
    }
}

impl Server for RecordingServer {
    fn arguments(&self) -> Vec<(String, String)> {
        self.arguments.clone()
    }
}

/// Normalize HTML for comparison by parsing and re-serializing
///
/// ```
/// use page_builder::test_utils::normalize_html;
///
/// let html1 = "<div  class=\"test\"   id=\"main\" ><p>Hello</p></div>";
/// let html2 = "<div class=\"test\" id=\"main\"><p>Hello</p></div>";
///
/// assert_eq!(normalize_html(html1), normalize_html(html2));
/// ```
pub fn normalize_html(html: &str) -> String {
    let doc = Document::from(html);
    let normalized = doc.html();
    normalized.trim().to_string()
}

/// Assert that two HTML strings are structurally equivalent
#[macro_export]
macro_rules! assert_html_eq {
    ($left:expr, $right:expr) => {
        {
            let left_normalized = $crate::test_utils::normalize_html($left);
            let right_normalized = $crate::test_utils::normalize_html($right);

            if left_normalized != right_normalized {
                panic!(
                    "HTML assertion failed\n\nLeft (normalized):\n{}\n\nRight (normalized):\n{}\n\nOriginal left:\n{}\n\nOriginal right:\n{}",
                    left_normalized,
                    right_normalized,
                    $left,
                    $right
                );
            }
        }
    };
}

/// Like `assert_html_eq!` but returns a bool instead of panicking
pub fn html_eq(html1: &str, html2: &str) -> bool {
    normalize_html(html1) == normalize_html(html2)
}

/// Text content of a page with whitespace collapsed
pub fn extract_text(html: &str) -> String {
    let doc = Document::from(html);
    let body = doc.select("body");

    let text = if body.nodes().len() > 0 {
        body.text()
    } else {
        doc.text()
    };

    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Count elements matching a selector
pub fn count_elements(html: &str, selector: &str) -> usize {
    let doc = Document::from(html);
    doc.select(selector).nodes().len()
}

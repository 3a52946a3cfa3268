//! Pull-based template scanner
//!
//! A [`PageElement`] reads its mold one byte at a time and replaces every
//! `{{NAME}}` token with the text returned by the handler registered for
//! `NAME`. Replacement text is read through a second frame pushed over the
//! mold frame, so the scanner never loses its place in the mold and never
//! needs to hold more than one substitution in memory.
//!
//! ```rust,ignore
//! use page_builder::{PageArgument, PageElement};
//!
//! let mut element = PageElement::new("<p>Hello, {{NAME}}!</p>")
//!     .with_token("NAME", |args: &PageArgument| args.arg("name").unwrap_or("guest").to_string());
//!
//! assert_eq!(element.build(&PageArgument::new()), "<p>Hello, guest!</p>");
//! ```
//!
//! # Token syntax
//!
//! - `{{` opens and `}}` closes a token.
//! - A single `}` followed by anything other than `}` stays in the name, so
//!   `{{A}X}}` names the token `A}X`.
//! - `{{}}` produces nothing.
//! - A token with no registered handler produces nothing.
//! - Replacement text is emitted as-is; tokens inside it are not expanded.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, trace, warn};

use crate::argument::PageArgument;
use crate::handlers::{TokenHandler, TokenTable};
use crate::source::{Frame, Mold, StorageKind};
use crate::types::{TOKEN_CLOSE, TOKEN_OPEN};

/// Granularity of the default output reservation
const RESERVE_ALIGN: usize = 64;

/// Where an element is in its current render
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    /// Positioned at the start of the mold
    Rewound,
    /// Part of the output has been pulled
    Scanning,
    /// All output has been pulled; [`PageElement::rewind`] starts over
    Ended,
}

/// A mold plus the tokens that fill it
#[derive(Debug)]
pub struct PageElement {
    mold: Mold,
    tokens: TokenTable,
    reserve: usize,
    frame: Frame,
    stack: Vec<Frame>,
    lookahead: Option<u8>,
    started: bool,
    ended: bool,
}

impl PageElement {
    /// Create an element without tokens
    pub fn new<M: Into<Mold>>(mold: M) -> Self {
        Self::with_tokens(mold, TokenTable::new())
    }

    /// Create an element with a prepared token table
    pub fn with_tokens<M: Into<Mold>>(mold: M, tokens: TokenTable) -> Self {
        let mold = mold.into();
        let frame = mold.open();
        Self {
            mold,
            tokens,
            reserve: 0,
            frame,
            stack: Vec::new(),
            lookahead: None,
            started: false,
            ended: false,
        }
    }

    /// Render `mold` once with `tokens` and `args`
    pub fn render<M: Into<Mold>>(mold: M, tokens: &TokenTable, args: &PageArgument) -> String {
        Self::with_tokens(mold, tokens.clone()).build(args)
    }

    /// Register a token handler
    pub fn add_token<S, H>(&mut self, name: S, handler: H)
    where
        S: Into<String>,
        H: TokenHandler + 'static,
    {
        self.tokens.add_token(name, handler);
    }

    /// Builder-style [`PageElement::add_token`]
    pub fn with_token<S, H>(mut self, name: S, handler: H) -> Self
    where
        S: Into<String>,
        H: TokenHandler + 'static,
    {
        self.add_token(name, handler);
        self
    }

    pub fn mold(&self) -> &Mold {
        &self.mold
    }

    /// Replace the mold; the element is rewound onto it
    pub fn set_mold<M: Into<Mold>>(&mut self, mold: M) {
        self.mold = mold.into();
        self.rewind();
    }

    pub fn token_table(&self) -> &TokenTable {
        &self.tokens
    }

    /// Override the output reservation made by [`PageElement::build_into`]
    pub fn reserve(&mut self, size: usize) {
        self.reserve = size;
    }

    /// Byte length of the mold, substitutions excluded.
    ///
    /// Only a reservation hint; the output may be longer or shorter.
    pub fn approx_size(&self) -> usize {
        self.mold.approx_size()
    }

    pub fn state(&self) -> ScanState {
        if self.ended {
            ScanState::Ended
        } else if self.started {
            ScanState::Scanning
        } else {
            ScanState::Rewound
        }
    }

    /// Number of suspended frames; 1 while replacement text is being read
    pub fn scan_depth(&self) -> usize {
        self.stack.len()
    }

    /// Storage kind the next byte is read from
    pub fn active_storage(&self) -> StorageKind {
        self.frame.kind()
    }

    /// Return to the start of the mold.
    ///
    /// Drops suspended frames, held replacement text and any open mold file.
    pub fn rewind(&mut self) {
        self.stack.clear();
        self.frame = self.mold.open();
        self.lookahead = None;
        self.started = false;
        self.ended = false;
    }

    /// Pull the next output byte, or `None` once the element has ended
    pub fn next_byte(&mut self, args: &PageArgument) -> Option<u8> {
        if self.ended {
            return None;
        }
        if let Some(byte) = self.lookahead.take() {
            return Some(byte);
        }
        self.started = true;

        loop {
            let c = match self.frame.read_byte() {
                Some(c) => c,
                None if self.resume() => continue,
                None => return None,
            };

            // Replacement text is never scanned for tokens.
            if c != TOKEN_OPEN || self.frame.kind() == StorageKind::Generated {
                return Some(c);
            }

            match self.frame.read_byte() {
                Some(TOKEN_OPEN) => {}
                next => {
                    self.lookahead = next;
                    return Some(c);
                }
            }

            let name = self.extract_token();
            if name.is_empty() {
                continue;
            }

            match self.tokens.find_bytes(&name) {
                Some(handler) => {
                    let text = handler.handle(args);
                    trace!(
                        token = %String::from_utf8_lossy(&name),
                        len = text.len(),
                        "token substituted"
                    );
                    let suspended = std::mem::replace(&mut self.frame, Frame::generated(text));
                    self.stack.push(suspended);
                }
                None => {
                    trace!(token = %String::from_utf8_lossy(&name), "unmatched token discarded");
                }
            }
        }
    }

    /// Rewind and append the whole output to `out`.
    ///
    /// Returns the number of bytes appended. If `out` cannot grow, building
    /// stops and the shorter output is kept.
    pub fn build_into(&mut self, out: &mut Vec<u8>, args: &PageArgument) -> usize {
        self.rewind();

        let reservation = self.reservation();
        match out.try_reserve(reservation) {
            Ok(()) => debug!(size = reservation, "element buffer reserved"),
            Err(err) => warn!(size = reservation, error = %err, "element buffer cannot reserve"),
        }

        let start = out.len();
        while let Some(byte) = self.next_byte(args) {
            if let Err(err) = out.try_reserve(1) {
                warn!(written = out.len() - start, error = %err, "element content lost");
                break;
            }
            out.push(byte);
        }
        out.len() - start
    }

    /// Rewind and build the whole output as a string
    pub fn build(&mut self, args: &PageArgument) -> String {
        let mut out = Vec::new();
        self.build_into(&mut out, args);
        bytes_to_string(out)
    }

    /// Fill `buf` from the current scan position without rewinding.
    ///
    /// Returns the number of bytes written; fewer than `buf.len()` means the
    /// element has ended, and 0 is returned once nothing is left. Successive
    /// calls concatenate to the output of [`PageElement::build`].
    pub fn build_bounded(&mut self, buf: &mut [u8], args: &PageArgument) -> usize {
        let mut written = 0;
        for slot in buf.iter_mut() {
            match self.next_byte(args) {
                Some(byte) => {
                    *slot = byte;
                    written += 1;
                }
                None => break,
            }
        }
        written
    }

    /// Share this element between pages
    pub fn into_handle(self) -> ElementHandle {
        ElementHandle::new(self)
    }

    pub(crate) fn reservation(&self) -> usize {
        if self.reserve > 0 {
            self.reserve
        } else {
            self.approx_size().next_multiple_of(RESERVE_ALIGN)
        }
    }

    /// Read a token name up to the closing `}}`; the opening `{{` is consumed.
    fn extract_token(&mut self) -> Vec<u8> {
        let mut name = Vec::new();
        loop {
            match self.frame.read_byte() {
                None => break,
                Some(TOKEN_CLOSE) => match self.frame.read_byte() {
                    None | Some(TOKEN_CLOSE) => break,
                    Some(c3) => {
                        name.push(TOKEN_CLOSE);
                        name.push(c3);
                    }
                },
                Some(c) => name.push(c),
            }
        }
        name
    }

    /// Continue with the suspended frame, or end the element
    fn resume(&mut self) -> bool {
        match self.stack.pop() {
            Some(frame) => {
                self.frame = frame;
                true
            }
            None => {
                self.ended = true;
                false
            }
        }
    }
}

pub(crate) fn bytes_to_string(bytes: Vec<u8>) -> String {
    String::from_utf8(bytes).unwrap_or_else(|err| String::from_utf8_lossy(err.as_bytes()).into_owned())
}

/// Shared handle to a [`PageElement`].
///
/// Pages keep handles rather than elements so one element (a common header,
/// say) can appear in several pages. Renders of the same element are
/// serialized by the handle's lock.
#[derive(Clone)]
pub struct ElementHandle(Arc<Mutex<PageElement>>);

impl ElementHandle {
    pub fn new(element: PageElement) -> Self {
        Self(Arc::new(Mutex::new(element)))
    }

    /// Lock the element for a render.
    ///
    /// A lock poisoned by a panicking handler is recovered: every render
    /// begins with a rewind.
    pub fn lock(&self) -> MutexGuard<'_, PageElement> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether both handles refer to the same element
    pub fn ptr_eq(&self, other: &ElementHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl From<PageElement> for ElementHandle {
    fn from(element: PageElement) -> Self {
        ElementHandle::new(element)
    }
}

impl fmt::Debug for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_lock() {
            Ok(element) => f.debug_tuple("ElementHandle").field(&element.mold).finish(),
            Err(_) => f.write_str("ElementHandle(<locked>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::StaticText;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn no_args() -> PageArgument {
        PageArgument::new()
    }

    #[test]
    fn test_mold_without_tokens_is_identity() {
        let mold = "<html><body><p>plain { text } here</p></body></html>";
        let mut element = PageElement::new(mold);
        assert_eq!(element.build(&no_args()), mold);
    }

    #[test]
    fn test_token_substitution() {
        let mut element = PageElement::new("a{{X}}b").with_token("X", StaticText("V".into()));
        assert_eq!(element.build(&no_args()), "aVb");
    }

    #[test]
    fn test_unmatched_token_vanishes() {
        let mut element = PageElement::new("a{{X}}b");
        assert_eq!(element.build(&no_args()), "ab");
    }

    #[test]
    fn test_empty_token_vanishes() {
        let mut element = PageElement::new("a{{}}b");
        assert_eq!(element.build(&no_args()), "ab");

        let mut element = PageElement::new("{{}}{{}}");
        assert_eq!(element.build(&no_args()), "");
    }

    #[test]
    fn test_single_close_stays_in_token_name() {
        let mut element = PageElement::new("{{A}X}}").with_token("A}X", StaticText("ok".into()));
        assert_eq!(element.build(&no_args()), "ok");

        // Without the composite name registered nothing is emitted at all
        let mut element = PageElement::new("<{{A}X}}>").with_token("A", StaticText("no".into()));
        assert_eq!(element.build(&no_args()), "<>");
    }

    #[test]
    fn test_single_open_is_content() {
        let mut element = PageElement::new("{a}{ {b} {").with_token("a", StaticText("no".into()));
        assert_eq!(element.build(&no_args()), "{a}{ {b} {");
    }

    #[test]
    fn test_triple_open_brace() {
        // The third brace belongs to the name
        let mut element = PageElement::new("{{{X}}").with_token("{X", StaticText("v".into()));
        assert_eq!(element.build(&no_args()), "v");
    }

    #[test]
    fn test_unterminated_token_ends_at_end_of_mold() {
        let mut element = PageElement::new("head{{TAIL").with_token("TAIL", StaticText("!".into()));
        assert_eq!(element.build(&no_args()), "head!");

        let mut element = PageElement::new("head{{TAIL}");
        assert_eq!(element.build(&no_args()), "head");
    }

    #[test]
    fn test_adjacent_tokens() {
        let mut element = PageElement::new("{{A}}{{B}}-{{A}}")
            .with_token("A", StaticText("1".into()))
            .with_token("B", StaticText("2".into()));
        assert_eq!(element.build(&no_args()), "12-1");
    }

    #[test]
    fn test_replacement_text_is_not_rescanned() {
        let mut element = PageElement::new("[{{OUTER}}]")
            .with_token("OUTER", StaticText("{{INNER}}".into()))
            .with_token("INNER", StaticText("deep".into()));
        assert_eq!(element.build(&no_args()), "[{{INNER}}]");
    }

    #[test]
    fn test_empty_replacement() {
        let mut element = PageElement::new("a{{E}}b").with_token("E", StaticText(String::new()));
        assert_eq!(element.build(&no_args()), "ab");
    }

    #[test]
    fn test_handler_sees_arguments() {
        let mut element = PageElement::new("<p>{{SSID}}</p>").with_token("SSID", |args: &PageArgument| {
            args.arg("ssid").unwrap_or("none").to_string()
        });

        assert_eq!(element.build(&no_args()), "<p>none</p>");

        let mut args = PageArgument::new();
        args.push("ssid", "first");
        args.push("ssid", "second");
        assert_eq!(element.build(&args), "<p>second</p>");
    }

    #[test]
    fn test_multibyte_text_passes_through() {
        let mut element = PageElement::new("<p>温度: {{T}}℃</p>").with_token("T", StaticText("二十".into()));
        assert_eq!(element.build(&no_args()), "<p>温度: 二十℃</p>");
    }

    #[test]
    fn test_rewind_then_build_is_idempotent() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut element = PageElement::new("<a>{{N}}</a>").with_token("N", move |args: &PageArgument| {
            counter.fetch_add(1, Ordering::SeqCst);
            args.arg("n").unwrap_or("").to_string()
        });

        let args: PageArgument = vec![("n", "7")].into_iter().collect();
        let first = element.build(&args);
        element.rewind();
        let second = element.build(&args);

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_bounded_build_continuity() {
        let mold = "<ul>{{A}}<li>{x}</li>{{}}{{MISSING}}{{B}}</ul>";
        let make = || {
            PageElement::new(mold)
                .with_token("A", StaticText("<li>alpha</li>".into()))
                .with_token("B", StaticText("<li>beta</li>".into()))
        };
        let expected = make().build(&no_args());

        for capacity in 1..=expected.len() + 1 {
            let mut element = make();
            let mut out = Vec::new();
            let mut buf = vec![0u8; capacity];
            loop {
                let n = element.build_bounded(&mut buf, &no_args());
                out.extend_from_slice(&buf[..n]);
                if n < capacity {
                    break;
                }
            }
            assert_eq!(String::from_utf8(out).unwrap(), expected, "capacity {}", capacity);
            assert_eq!(element.build_bounded(&mut buf, &no_args()), 0);
        }
    }

    #[test]
    fn test_bounded_build_does_not_rewind() {
        let mut element = PageElement::new("abcdef");
        let mut buf = [0u8; 4];
        assert_eq!(element.build_bounded(&mut buf, &no_args()), 4);
        assert_eq!(&buf, b"abcd");
        assert_eq!(element.build_bounded(&mut buf, &no_args()), 2);
        assert_eq!(&buf[..2], b"ef");
        assert_eq!(element.build_bounded(&mut buf, &no_args()), 0);

        element.rewind();
        assert_eq!(element.build_bounded(&mut buf, &no_args()), 4);
    }

    #[test]
    fn test_scan_states_and_depth() {
        let mut element = PageElement::new("x{{T}}y").with_token("T", StaticText("12".into()));
        let args = no_args();
        assert_eq!(element.state(), ScanState::Rewound);

        assert_eq!(element.next_byte(&args), Some(b'x'));
        assert_eq!(element.state(), ScanState::Scanning);
        assert_eq!(element.scan_depth(), 0);

        assert_eq!(element.next_byte(&args), Some(b'1'));
        assert_eq!(element.scan_depth(), 1);
        assert_eq!(element.active_storage(), StorageKind::Generated);

        // Rewinding mid-substitution drops the replacement frame
        element.rewind();
        assert_eq!(element.state(), ScanState::Rewound);
        assert_eq!(element.scan_depth(), 0);
        assert_eq!(element.active_storage(), StorageKind::Embedded);

        assert_eq!(element.build(&args), "x12y");
        assert_eq!(element.state(), ScanState::Ended);
        assert_eq!(element.next_byte(&args), None);
    }

    #[test]
    fn test_set_mold_rewinds() {
        let mut element = PageElement::new("old");
        let mut buf = [0u8; 2];
        element.build_bounded(&mut buf, &no_args());
        element.set_mold(String::from("new {{N}}"));
        element.add_token("N", StaticText("mold".into()));
        assert_eq!(element.state(), ScanState::Rewound);
        assert_eq!(element.active_storage(), StorageKind::Literal);
        assert_eq!(element.build(&no_args()), "new mold");
    }

    #[test]
    fn test_reservation() {
        let mut element = PageElement::new("0123456789");
        assert_eq!(element.approx_size(), 10);
        assert_eq!(element.reservation(), 64);

        element.reserve(1000);
        assert_eq!(element.reservation(), 1000);
    }

    #[test]
    fn test_build_into_appends() {
        let mut element = PageElement::new("<b>{{V}}</b>").with_token("V", StaticText("1".into()));
        let mut out = b"prefix:".to_vec();
        let written = element.build_into(&mut out, &no_args());
        assert_eq!(written, 8);
        assert_eq!(out, b"prefix:<b>1</b>");
    }

    #[test]
    fn test_static_render() {
        let tokens = TokenTable::new().with_token("WHO", StaticText("world".into()));
        let out = PageElement::render("hello {{WHO}}", &tokens, &no_args());
        assert_eq!(out, "hello world");
    }

    #[test]
    fn test_missing_file_mold_renders_empty() {
        let mut element = PageElement::new("file:/nonexistent/page-builder/missing.htm");
        assert_eq!(element.build(&no_args()), "");
        assert_eq!(element.state(), ScanState::Ended);
    }

    #[test]
    fn test_rewind_mid_file_reopens_from_start() {
        use crate::source::FileState;

        let path = std::env::temp_dir().join(format!("page-builder-rewind-{}.htm", std::process::id()));
        std::fs::write(&path, "abcdef").unwrap();

        let mut element = PageElement::new(Mold::file(&path));
        let mut buf = [0u8; 3];
        assert_eq!(element.build_bounded(&mut buf, &no_args()), 3);
        assert_eq!(&buf, b"abc");
        assert!(matches!(element.frame, Frame::File { state: FileState::Open(_), .. }));

        element.rewind();
        assert!(matches!(element.frame, Frame::File { state: FileState::Unopened, .. }));
        assert_eq!(element.state(), ScanState::Rewound);

        assert_eq!(element.build(&no_args()), "abcdef");
        assert!(matches!(element.frame, Frame::File { state: FileState::Closed, .. }));

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_handle_is_shared() {
        let handle = PageElement::new("shared").into_handle();
        let other = handle.clone();
        assert!(handle.ptr_eq(&other));
        assert_eq!(other.lock().build(&no_args()), "shared");
    }
}

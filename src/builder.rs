//! Page assembly and response dispatch
//!
//! A [`PageBuilder`] is one page of a web application: a uri, the ordered
//! elements whose output makes up the page, and the way that output is sent.
//! The host server decides which page answers a request (optionally asking
//! [`PageBuilder::can_handle`]) and then calls [`PageBuilder::handle`].
//!
//! ```rust,ignore
//! use page_builder::{PageBuilder, PageElement, PageArgument, TransferEncoding};
//!
//! let header = PageElement::new("<html><body>").into_handle();
//! let body = PageElement::new("<p>{{NOW}}</p>")
//!     .with_token("NOW", |_: &PageArgument| uptime())
//!     .into_handle();
//! let footer = PageElement::new("</body></html>").into_handle();
//!
//! let mut page = PageBuilder::new("/")
//!     .with_element(header)
//!     .with_element(body)
//!     .with_element(footer);
//! page.set_transfer_encoding(TransferEncoding::Chunked)?;
//!
//! // inside the host's request loop
//! page.handle(&mut server, method, uri)?;
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::argument::PageArgument;
use crate::element::{bytes_to_string, ElementHandle};
use crate::error::{Error, Result};
use crate::streaming::{send_auto, send_byte_stream, send_chunked, SendReport};
use crate::transport::{HttpUpload, Server, Transport};
use crate::types::{HttpMethod, PageConfig, TransferEncoding, NO_CACHE_HEADERS};

/// Cooperative cancellation flag of a page.
///
/// Clones share the flag, so a token handler or the transport can stop the
/// response currently being sent. The flag is cleared when the next request
/// starts.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop the response in progress
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub(crate) fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

type CanHandleFn = dyn Fn(HttpMethod, &str) -> bool + Send + Sync;
type UploadFn = dyn FnMut(&str, &HttpUpload<'_>) + Send;

/// An HTML page assembled from [`crate::PageElement`]s
pub struct PageBuilder {
    uri: String,
    elements: Vec<ElementHandle>,
    config: PageConfig,
    cancel: CancelHandle,
    can_handle: Option<Box<CanHandleFn>>,
    upload: Option<Box<UploadFn>>,
}

impl PageBuilder {
    /// Create an empty page answering `uri`
    pub fn new<S: Into<String>>(uri: S) -> Self {
        Self {
            uri: uri.into(),
            elements: Vec::new(),
            config: PageConfig::default(),
            cancel: CancelHandle::new(),
            can_handle: None,
            upload: None,
        }
    }

    /// Create a page from its elements
    pub fn with_elements<S: Into<String>>(uri: S, elements: Vec<ElementHandle>) -> Self {
        let mut page = Self::new(uri);
        page.elements = elements;
        page
    }

    /// Apply a configuration, rejecting reserved transfer encodings
    pub fn with_config(mut self, config: PageConfig) -> Result<Self> {
        config.transfer_encoding.validate()?;
        self.config = config;
        Ok(self)
    }

    /// Builder-style [`PageBuilder::add_element`]
    pub fn with_element<E: Into<ElementHandle>>(mut self, element: E) -> Self {
        self.add_element(element);
        self
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn set_uri<S: Into<String>>(&mut self, uri: S) {
        self.uri = uri.into();
    }

    pub fn config(&self) -> &PageConfig {
        &self.config
    }

    /// Append an element; elements are emitted in the order added
    pub fn add_element<E: Into<ElementHandle>>(&mut self, element: E) {
        self.elements.push(element.into());
    }

    /// Forget every element
    pub fn clear_elements(&mut self) {
        self.elements.clear();
        self.elements.shrink_to_fit();
    }

    pub fn elements(&self) -> &[ElementHandle] {
        &self.elements
    }

    pub fn set_method(&mut self, method: HttpMethod) {
        self.config.method = method;
    }

    /// Send the no-cache headers with every response of this page
    pub fn set_no_cache(&mut self, enabled: bool) {
        self.config.no_cache = enabled;
    }

    /// Choose the transfer encoding; compression variants are rejected
    pub fn set_transfer_encoding(&mut self, encoding: TransferEncoding) -> Result<()> {
        self.config.transfer_encoding = encoding.validate()?;
        Ok(())
    }

    pub fn transfer_encoding(&self) -> TransferEncoding {
        self.config.transfer_encoding
    }

    /// Reserve `size` bytes before building the whole page
    pub fn reserve(&mut self, size: usize) {
        self.config.reserve = size;
    }

    /// Stop the response in progress
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Handle to this page's cancellation flag
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Replace the method and uri check with `predicate`
    pub fn exit_can_handle<F>(&mut self, predicate: F)
    where
        F: Fn(HttpMethod, &str) -> bool + Send + Sync + 'static,
    {
        self.can_handle = Some(Box::new(predicate));
    }

    /// Receive uploads posted to this page
    pub fn on_upload<F>(&mut self, callback: F)
    where
        F: FnMut(&str, &HttpUpload<'_>) + Send + 'static,
    {
        self.upload = Some(Box::new(callback));
    }

    /// Whether this page answers `method` on `uri`
    pub fn can_handle(&self, method: HttpMethod, uri: &str) -> bool {
        match &self.can_handle {
            Some(predicate) => predicate(method, uri),
            None => self.config.method.accepts(method) && uri == self.uri,
        }
    }

    /// Whether an upload to `uri` is delivered to this page
    pub fn can_upload(&self, uri: &str) -> bool {
        debug!(uri, "upload request");
        self.upload.is_some() && self.can_handle(HttpMethod::Post, uri)
    }

    /// Pass one upload step to the upload callback
    pub fn upload(&mut self, uri: &str, upload: &HttpUpload<'_>) {
        if !self.can_upload(uri) {
            return;
        }
        if let Some(callback) = self.upload.as_mut() {
            callback(uri, upload);
        }
    }

    /// Append the whole page to `out`, returning the bytes added.
    ///
    /// If `out` cannot grow to take an element, that element and the ones
    /// after it are left out.
    pub fn build_into(&self, out: &mut Vec<u8>, args: &PageArgument) -> usize {
        let start = out.len();
        self.assemble(out, args, None);
        out.len() - start
    }

    /// Append every element to `out`; `false` if `cancel` was set after an
    /// element.
    fn assemble(&self, out: &mut Vec<u8>, args: &PageArgument, cancel: Option<&CancelHandle>) -> bool {
        if self.config.reserve > 0 {
            match out.try_reserve(self.config.reserve) {
                Ok(()) => debug!(size = self.config.reserve, "content buffer reserved"),
                Err(err) => warn!(size = self.config.reserve, error = %err, "content buffer cannot reserve"),
            }
        }

        let mut segment = Vec::new();
        for handle in &self.elements {
            segment.clear();
            handle.lock().build_into(&mut segment, args);
            if !segment.is_empty() {
                if let Err(err) = out.try_reserve(segment.len()) {
                    warn!(len = segment.len(), error = %err, "content lost");
                    return true;
                }
                out.extend_from_slice(&segment);
            }
            if cancel.map_or(false, CancelHandle::is_cancelled) {
                return false;
            }
        }
        true
    }

    /// Build the whole page with `args`
    pub fn build(&self, args: &PageArgument) -> String {
        let mut out = Vec::new();
        self.build_into(&mut out, args);
        bytes_to_string(out)
    }

    /// Build the whole page without request arguments
    pub fn build_default(&self) -> String {
        self.build(&PageArgument::new())
    }

    /// Send the headers that stop clients from caching a response
    pub fn send_nocache_header<T: Transport + ?Sized>(server: &mut T) {
        for (name, value) in NO_CACHE_HEADERS {
            server.send_header(name, value);
        }
    }

    /// Answer a request if this page can handle it.
    ///
    /// Returns `Ok(false)` when the method or uri does not belong to this
    /// page; nothing is sent in that case.
    pub fn handle<S: Server + ?Sized>(&self, server: &mut S, method: HttpMethod, uri: &str) -> Result<bool> {
        if !self.can_handle(method, uri) {
            return Ok(false);
        }
        self.sink(200, server)?;
        Ok(true)
    }

    /// Answer with this page as a 404 response.
    ///
    /// Bind this as the host's not-found handler. The no-cache headers are
    /// switched on for this page from now on.
    pub fn exit_404<S: Server + ?Sized>(&mut self, server: &mut S) -> Result<SendReport> {
        self.config.no_cache = true;
        self.sink(404, server)
    }

    /// Build and send the page with status `code`
    pub fn sink<S: Server + ?Sized>(&self, code: u16, server: &mut S) -> Result<SendReport> {
        let args = server.page_argument();
        self.cancel.reset();

        if self.config.no_cache {
            Self::send_nocache_header(server);
        }

        let report = match self.config.transfer_encoding {
            TransferEncoding::Auto => {
                let mut content = Vec::new();
                if self.assemble(&mut content, &args, Some(&self.cancel)) {
                    send_auto(server, code, &content, &self.cancel)?
                } else {
                    debug!(built = content.len(), "page cancelled before sending");
                    SendReport {
                        cancelled: true,
                        ..SendReport::default()
                    }
                }
            }
            TransferEncoding::ByteStream => {
                send_byte_stream(server, code, &self.elements, &args, &self.cancel)?
            }
            TransferEncoding::Chunked => {
                send_chunked(server, code, &self.elements, &args, &self.cancel)?
            }
            unsupported => return Err(Error::UnsupportedEncoding(unsupported)),
        };

        debug!(
            uri = %self.uri,
            code,
            bytes = report.bytes,
            cancelled = report.cancelled,
            "page sent"
        );
        Ok(report)
    }

    /// Stream the page one element at a time.
    ///
    /// Starts a new request: the cancellation flag is cleared.
    #[cfg(feature = "async")]
    pub fn chunk_stream(&self, args: PageArgument) -> impl futures::Stream<Item = String> {
        self.cancel.reset();
        crate::streaming::chunk_stream(self.elements.clone(), args, self.cancel.clone())
    }
}

impl Default for PageBuilder {
    fn default() -> Self {
        Self::new("")
    }
}

impl fmt::Debug for PageBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageBuilder")
            .field("uri", &self.uri)
            .field("elements", &self.elements.len())
            .field("config", &self.config)
            .field("custom_can_handle", &self.can_handle.is_some())
            .field("upload", &self.upload.is_some())
            .finish()
    }
}

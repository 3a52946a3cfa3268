//! Core page types, constants and configuration
//!
//! # Key Types
//!
//! - [`TransferEncoding`] - How an assembled page reaches the transport
//! - [`HttpMethod`] - Request method a page answers to
//! - [`PageConfig`] - Per-page response configuration
//!
//! # Usage
//!
//! ```rust,ignore
//! use page_builder::{PageBuilder, PageConfig, TransferEncoding, HttpMethod};
//!
//! let config = PageConfig::default()
//!     .with_method(HttpMethod::Get)
//!     .with_transfer_encoding(TransferEncoding::Chunked)?
//!     .with_reserve(2048);
//!
//! let page = PageBuilder::new("/status").with_config(config);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Character that, doubled, opens a token
pub const TOKEN_OPEN: u8 = b'{';

/// Character that, doubled, closes a token
pub const TOKEN_CLOSE: u8 = b'}';

/// Mold prefix selecting file-backed storage
pub const MOLD_FILE_PREFIX: &str = "file:";

/// Largest page sent with a declared length in [`TransferEncoding::Auto`].
///
/// Also the size of the transfer buffer used by
/// [`TransferEncoding::ByteStream`] and the block size used when an
/// `Auto` page is streamed.
pub const BLOCK_SIZE: usize = 1270;

/// Content type of every page response
pub const CONTENT_TYPE_HTML: &str = "text/html";

/// Headers sent when a page must not be cached by the client
pub const NO_CACHE_HEADERS: [(&str, &str); 3] = [
    ("Cache-Control", "no-cache,no-store,must-revalidate"),
    ("Pragma", "nocache"),
    ("Expires", "-1"),
];

/// Strategy used to move an assembled page onto the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferEncoding {
    /// Build the whole page, then send it in one piece if it fits in
    /// [`BLOCK_SIZE`], otherwise stream it in `BLOCK_SIZE` blocks.
    #[default]
    Auto,
    /// Stream through one fixed `BLOCK_SIZE` buffer without materializing
    /// the page.
    ByteStream,
    /// Send each element as one chunk.
    Chunked,
    /// Reserved, not supported.
    Gzip,
    /// Reserved, not supported.
    Deflate,
}

impl TransferEncoding {
    /// Whether this encoding can actually be sent
    pub fn is_supported(&self) -> bool {
        !matches!(self, TransferEncoding::Gzip | TransferEncoding::Deflate)
    }

    /// Return `self` if supported, otherwise an [`Error::UnsupportedEncoding`]
    pub fn validate(self) -> Result<Self> {
        if self.is_supported() {
            Ok(self)
        } else {
            Err(Error::UnsupportedEncoding(self))
        }
    }
}

/// HTTP request method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// Matches every method
    #[default]
    Any,
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
}

impl HttpMethod {
    /// Whether a page registered for `self` answers a `request` method
    pub fn accepts(&self, request: HttpMethod) -> bool {
        *self == HttpMethod::Any || *self == request
    }
}

/// Response configuration of a page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageConfig {
    pub(crate) method: HttpMethod,
    pub(crate) no_cache: bool,
    pub(crate) transfer_encoding: TransferEncoding,
    pub(crate) reserve: usize,
}

impl PageConfig {
    /// Create a new page configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration from JSON, rejecting reserved encodings
    pub fn from_json(json: &str) -> Result<Self> {
        let config: PageConfig = serde_json::from_str(json)?;
        config.transfer_encoding.validate()?;
        Ok(config)
    }

    /// Set the request method the page answers to
    pub fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    /// Enable or disable the no-cache response headers
    pub fn with_no_cache(mut self, enabled: bool) -> Self {
        self.no_cache = enabled;
        self
    }

    /// Set the transfer encoding
    pub fn with_transfer_encoding(mut self, encoding: TransferEncoding) -> Result<Self> {
        self.transfer_encoding = encoding.validate()?;
        Ok(self)
    }

    /// Set the buffer reservation used when the whole page is built
    pub fn with_reserve(mut self, size: usize) -> Self {
        self.reserve = size;
        self
    }

    // Accessors
    pub fn method(&self) -> HttpMethod {
        self.method
    }
    pub fn no_cache(&self) -> bool {
        self.no_cache
    }
    pub fn transfer_encoding(&self) -> TransferEncoding {
        self.transfer_encoding
    }
    pub fn reserve(&self) -> usize {
        self.reserve
    }
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            method: HttpMethod::Any,
            no_cache: true,
            transfer_encoding: TransferEncoding::Auto,
            reserve: 0,
        }
    }
}

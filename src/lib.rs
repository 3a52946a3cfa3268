//! HTML page assembly from token-substituted molds
//!
//! A page is a sequence of [`PageElement`]s. Each element holds a mold, HTML
//! text containing `{{TOKEN}}` placeholders, and the handlers that produce
//! the text for those tokens from the request arguments. The
//! [`PageBuilder`] pulls the elements' output and sends it to the host
//! server in the way that best fits the available memory:
//!
//! - [`TransferEncoding::Auto`] builds the page, sending it in one piece
//!   when short and in blocks otherwise
//! - [`TransferEncoding::ByteStream`] streams through one fixed buffer
//! - [`TransferEncoding::Chunked`] sends one element at a time
//!
//! # Examples
//!
//! ```rust,ignore
//! use page_builder::{PageArgument, PageBuilder, PageElement};
//!
//! let page = PageBuilder::new("/hello")
//!     .with_element(PageElement::new("<html><body>"))
//!     .with_element(
//!         PageElement::new("<h1>Hello, {{NAME}}</h1>")
//!             .with_token("NAME", |args: &PageArgument| {
//!                 args.arg("name").unwrap_or("world").to_string()
//!             }),
//!     )
//!     .with_element(PageElement::new("</body></html>"));
//!
//! assert_eq!(
//!     page.build_default(),
//!     "<html><body><h1>Hello, world</h1></body></html>"
//! );
//! ```
//!
//! Molds beginning with `file:` are read from the named file on demand:
//!
//! ```rust,ignore
//! let element = PageElement::new("file:/www/index.htm");
//! ```

pub mod argument;
pub mod builder;
pub mod element;
pub mod error;
pub mod handlers;
pub mod source;
pub mod streaming;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod transport;
pub mod types;

// Re-export commonly used types
pub use argument::{IntoPageArgument, PageArgument, RequestArgument};
pub use builder::{CancelHandle, PageBuilder};
pub use element::{ElementHandle, PageElement, ScanState};
pub use error::{Error, Result};
pub use handlers::{ArgumentEcho, StaticText, TokenHandler, TokenTable};
pub use source::{Mold, StorageKind};
pub use streaming::SendReport;
pub use transport::{ContentLength, HttpUpload, Server, Transport, UploadStatus};
pub use types::{
    HttpMethod, PageConfig, TransferEncoding, BLOCK_SIZE, MOLD_FILE_PREFIX, NO_CACHE_HEADERS,
    TOKEN_CLOSE, TOKEN_OPEN,
};

#[cfg(feature = "derive")]
pub use page_builder_macros::PageArguments;

//! Error handling for page-builder
//!
//! Almost every failure inside the scanner and the assembler is soft: an
//! unmatched token vanishes, a file mold that cannot be opened reads as empty,
//! an allocation failure truncates the page. The [`Error`] type only covers
//! the edges of the crate where a caller can actually do something about it.
//!
//! # Error Types
//!
//! - [`Error::UnsupportedEncoding`] - a reserved transfer encoding was requested
//! - [`Error::ConfigError`] - configuration could not be applied
//! - [`Error::JsonError`] - JSON parsing and serialization errors
//! - [`Error::IoError`] - transport write failures
//!
//! # Usage
//!
//! ```rust,ignore
//! use page_builder::{PageBuilder, TransferEncoding, Error};
//!
//! let mut page = PageBuilder::new("/");
//! match page.set_transfer_encoding(TransferEncoding::Gzip) {
//!     Err(Error::UnsupportedEncoding(enc)) => println!("cannot send {enc:?}"),
//!     _ => {}
//! }
//! ```
//!
//! # Memory Efficiency
//!
//! Error messages use `Cow<'static, str>` so static messages never allocate.

use std::borrow::Cow;
use thiserror::Error;

use crate::types::TransferEncoding;

/// Error type for page-builder operations
#[derive(Error, Debug)]
pub enum Error {
    /// A compression variant of [`TransferEncoding`] was requested
    ///
    /// These variants are reserved. They are rejected when configured instead
    /// of being sent with an uncompressed body.
    #[error("Unsupported transfer encoding: {0:?}")]
    UnsupportedEncoding(TransferEncoding),

    /// Invalid page configuration
    #[error("Config error: {0}")]
    ConfigError(Cow<'static, str>),

    /// JSON parsing and serialization errors
    ///
    /// Automatically converted from `serde_json::Error`.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Transport and I/O errors
    ///
    /// Automatically converted from `std::io::Error` when a write to the
    /// host transport fails.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl Error {
    /// Create a config error with a static string
    pub fn config_static(msg: &'static str) -> Self {
        Error::ConfigError(Cow::Borrowed(msg))
    }

    /// Create a config error with an owned string
    pub fn config_owned(msg: String) -> Self {
        Error::ConfigError(Cow::Owned(msg))
    }
}

/// Result type alias for page-builder operations
pub type Result<T> = std::result::Result<T, Error>;

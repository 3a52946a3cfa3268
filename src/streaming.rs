//! Transfer strategies that move an assembled page onto a [`Transport`]
//!
//! Each strategy trades memory for latency differently:
//!
//! - [`send_auto`] materializes the whole page, then sends it in one piece or
//!   in [`BLOCK_SIZE`] blocks.
//! - [`send_byte_stream`] never holds more than one `BLOCK_SIZE` buffer.
//! - [`send_chunked`] holds one element's output at a time.
//!
//! All of them check the page's [`CancelHandle`] between units of output and
//! stop immediately once it is set, without sending the closing empty chunk.

use tracing::{debug, warn};

use crate::argument::PageArgument;
use crate::builder::CancelHandle;
use crate::element::ElementHandle;
use crate::error::Result;
use crate::transport::{ContentLength, Transport};
use crate::types::{BLOCK_SIZE, CONTENT_TYPE_HTML};

/// What a strategy put on the wire
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendReport {
    /// Body bytes sent
    pub bytes: usize,
    /// Non-empty body writes
    pub blocks: usize,
    /// Whether emission stopped on cancellation
    pub cancelled: bool,
}

impl SendReport {
    fn record(&mut self, len: usize) {
        self.bytes += len;
        self.blocks += 1;
    }

    fn cancel(mut self) -> Self {
        debug!(bytes = self.bytes, "transfer cancelled");
        self.cancelled = true;
        self
    }
}

/// Send a built page, streamed in blocks when longer than [`BLOCK_SIZE`]
pub fn send_auto<T>(server: &mut T, code: u16, content: &[u8], cancel: &CancelHandle) -> Result<SendReport>
where
    T: Transport + ?Sized,
{
    let mut report = SendReport::default();

    if content.len() <= BLOCK_SIZE {
        debug!(code, len = content.len(), "single response");
        server.set_content_length(ContentLength::Known(content.len()));
        server.send(code, CONTENT_TYPE_HTML, content)?;
        if !content.is_empty() {
            report.record(content.len());
        }
        return Ok(report);
    }

    debug!(code, len = content.len(), "streamed response");
    server.set_content_length(ContentLength::Unknown);
    server.send(code, CONTENT_TYPE_HTML, &[])?;

    for block in content.chunks(BLOCK_SIZE) {
        server.send_content(block)?;
        report.record(block.len());
        if cancel.is_cancelled() {
            return Ok(report.cancel());
        }
    }

    server.send_content(&[])?;
    Ok(report)
}

/// Stream elements through one reusable [`BLOCK_SIZE`] buffer
pub fn send_byte_stream<T>(
    server: &mut T,
    code: u16,
    elements: &[ElementHandle],
    args: &PageArgument,
    cancel: &CancelHandle,
) -> Result<SendReport>
where
    T: Transport + ?Sized,
{
    let mut report = SendReport::default();

    debug!(code, "byte stream response");
    server.set_content_length(ContentLength::Unknown);
    server.send(code, CONTENT_TYPE_HTML, &[])?;

    let mut buffer = Vec::new();
    if let Err(err) = buffer.try_reserve_exact(BLOCK_SIZE) {
        warn!(size = BLOCK_SIZE, error = %err, "transfer buffer cannot be allocated");
        server.send_content(&[])?;
        return Ok(report);
    }
    buffer.resize(BLOCK_SIZE, 0);

    let mut filled = 0;
    for handle in elements {
        let mut element = handle.lock();
        element.rewind();

        loop {
            let requested = BLOCK_SIZE - filled;
            let written = element.build_bounded(&mut buffer[filled..], args);
            filled += written;

            if filled == BLOCK_SIZE {
                server.send_content(&buffer)?;
                report.record(filled);
                filled = 0;
                if cancel.is_cancelled() {
                    return Ok(report.cancel());
                }
            }
            if written < requested {
                break;
            }
        }
    }

    if cancel.is_cancelled() {
        return Ok(report.cancel());
    }
    if filled > 0 {
        server.send_content(&buffer[..filled])?;
        report.record(filled);
    }
    server.send_content(&[])?;
    Ok(report)
}

/// Send each element's output as one chunk
pub fn send_chunked<T>(
    server: &mut T,
    code: u16,
    elements: &[ElementHandle],
    args: &PageArgument,
    cancel: &CancelHandle,
) -> Result<SendReport>
where
    T: Transport + ?Sized,
{
    let mut report = SendReport::default();

    debug!(code, elements = elements.len(), "chunked response");
    server.set_content_length(ContentLength::Unknown);
    server.send(code, CONTENT_TYPE_HTML, &[])?;

    let mut segment = Vec::new();
    for handle in elements {
        segment.clear();
        handle.lock().build_into(&mut segment, args);
        if !segment.is_empty() {
            server.send_content(&segment)?;
            report.record(segment.len());
        }
        if cancel.is_cancelled() {
            return Ok(report.cancel());
        }
    }

    server.send_content(&[])?;
    Ok(report)
}

/// Stream of page chunks, one per element with output.
///
/// Cancellation is checked before each element is built.
#[cfg(feature = "async")]
pub fn chunk_stream(
    elements: Vec<ElementHandle>,
    args: PageArgument,
    cancel: CancelHandle,
) -> impl futures::Stream<Item = String> {
    use futures::StreamExt;

    futures::stream::unfold(
        (elements.into_iter(), args, cancel),
        |(mut elements, args, cancel)| async move {
            if cancel.is_cancelled() {
                debug!("chunk stream cancelled");
                return None;
            }
            let handle = elements.next()?;
            let chunk = handle.lock().build(&args);
            Some((chunk, (elements, args, cancel)))
        },
    )
    .filter(|chunk| futures::future::ready(!chunk.is_empty()))
}

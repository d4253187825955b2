//! Streaming and paginated consumption of listing output.
//!
//! Records are produced in the exact order the external tool emitted them
//! and handed to a synchronous callback on the reading path, so a slow
//! callback backpressures the child instead of buffering an unbounded
//! listing in memory.

use tracing::debug;

use crate::error::Error;
use crate::listing::{parse_line, FileRecord};
use crate::runner::ToolStream;

/// Feed each parsed record to `callback` as lines arrive.
///
/// Blank lines and `total` summary lines are skipped, as are long-format
/// rows with too few columns. A callback error kills the child and surfaces
/// as [`Error::CallbackFailed`]; records already delivered are not
/// retracted. After EOF the child's exit is classified the same way as a
/// captured run.
pub async fn stream_records(
    mut stream: ToolStream,
    long_format: bool,
    mut callback: impl FnMut(FileRecord) -> anyhow::Result<()> + Send,
) -> Result<(), Error> {
    while let Some(line) = stream.next_line().await? {
        let line = line.trim();
        if line.is_empty() || line.starts_with("total") {
            continue;
        }
        let Some(record) = parse_line(line, long_format) else {
            debug!(line, "skipping unparsable listing line");
            continue;
        };
        if let Err(cause) = callback(record) {
            stream.abort();
            return Err(Error::CallbackFailed(cause));
        }
    }

    stream.finish().await
}

/// Batch records into fixed-size pages and invoke `page_callback` with each
/// full page and its 1-based page number. A non-empty partial final page is
/// flushed after the underlying process completes; an empty trailing page is
/// never delivered.
pub async fn stream_pages(
    stream: ToolStream,
    long_format: bool,
    page_size: usize,
    mut page_callback: impl FnMut(Vec<FileRecord>, usize) -> anyhow::Result<()> + Send,
) -> Result<(), Error> {
    let page_size = page_size.max(1);
    let mut page: Vec<FileRecord> = Vec::with_capacity(page_size);
    let mut page_number = 0usize;

    stream_records(stream, long_format, |record| {
        page.push(record);
        if page.len() >= page_size {
            page_number += 1;
            let full = std::mem::replace(&mut page, Vec::with_capacity(page_size));
            page_callback(full, page_number)?;
        }
        Ok(())
    })
    .await?;

    if !page.is_empty() {
        page_number += 1;
        page_callback(page, page_number).map_err(Error::CallbackFailed)?;
    }

    Ok(())
}

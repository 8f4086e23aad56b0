//! Line-oriented front end: one request per input line.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::error::FatalError;
use crate::ports::RequestApi;

/// Counts from one batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Non-empty lines sent as requests.
    pub requested: usize,
    /// Requests that got a real reply.
    pub delivered: usize,
    /// Empty lines passed straight through.
    pub blank: usize,
}

/// Read UTF-8 lines from `reader`, request each one, and write
/// `"{line}\t->\t{result}"` to `writer`.
///
/// Empty lines are written back as empty lines without a request, keeping
/// output line-for-line with input. Failed requests print their sentinel.
///
/// # Errors
///
/// I/O failures on either stream, or a fatal request failure.
pub async fn translate_lines<A, R, W>(
    requestor: &A,
    reader: R,
    mut writer: W,
) -> Result<BatchSummary, FatalError>
where
    A: RequestApi + ?Sized,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut summary = BatchSummary::default();
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        if line.is_empty() {
            summary.blank += 1;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
            continue;
        }

        let outcome = requestor.request(&line).await?;
        summary.requested += 1;
        if outcome.is_delivered() {
            summary.delivered += 1;
        }

        let output = format!("{line}\t->\t{}\n", outcome.into_text());
        writer.write_all(output.as_bytes()).await?;
        writer.flush().await?;
    }

    debug!(
        requested = summary.requested,
        delivered = summary.delivered,
        blank = summary.blank,
        "Input exhausted"
    );
    Ok(summary)
}

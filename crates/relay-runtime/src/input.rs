//! Line input for the relay process.
//!
//! `tokio::io::stdin` reads on the blocking pool, and a read in progress there
//! cannot be cancelled: the runtime waits for it on shutdown, so an
//! interrupted process would linger until the next line or EOF. Input is read
//! on a detached OS thread instead and piped into the runtime through an
//! in-memory duplex stream. Nothing waits for that thread at exit.

use std::io::{self, Read};
use std::thread;

use tokio::io::{AsyncWriteExt, DuplexStream};
use tokio::runtime::Handle;
use tracing::{debug, warn};

/// Read chunk size and duplex buffer capacity.
const INPUT_BUFFER: usize = 8 * 1024;

/// Pipe `source` into the runtime behind `handle`.
///
/// The returned stream reaches EOF when `source` does. Dropping it makes the
/// reader thread stop after its current read returns.
///
/// # Errors
///
/// Returns error if the reader thread cannot be spawned.
pub fn detached_reader<R>(mut source: R, handle: Handle) -> io::Result<DuplexStream>
where
    R: Read + Send + 'static,
{
    let (mut writer, reader) = tokio::io::duplex(INPUT_BUFFER);

    thread::Builder::new()
        .name("relay-input".into())
        .spawn(move || {
            let mut buf = vec![0u8; INPUT_BUFFER];
            loop {
                let n = match source.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => n,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        warn!(error = %e, "Input read failed");
                        break;
                    }
                };
                // Fails once the consuming side is gone.
                if handle.block_on(writer.write_all(&buf[..n])).is_err() {
                    break;
                }
            }
            debug!("Input reader finished");
        })?;

    Ok(reader)
}

/// Process stdin, read off the runtime.
///
/// # Errors
///
/// Returns error if the reader thread cannot be spawned.
pub fn stdin_reader() -> io::Result<DuplexStream> {
    detached_reader(io::stdin(), Handle::current())
}

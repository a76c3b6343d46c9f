//! Window-sized reads from the input stream.
//!
//! [`ChunkReader`] fills a [`WindowBuffer`] with up to one window of bytes and
//! reports whether the stream is exhausted after them. Exhaustion is decided
//! by peeking the buffered reader, not by waiting for a zero-length read, so
//! the window that ends the file knows it is last even when the file size is
//! an exact multiple of the window capacity.

use std::io;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};

use crate::window_buffer::{WindowBuffer, WINDOW_CAPACITY};

/// Result of one [`ChunkReader::read_window`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    /// Bytes loaded into the window buffer.
    pub len: usize,
    /// No bytes remain after this chunk.
    pub last: bool,
}

#[derive(Debug)]
pub struct ChunkReader<R> {
    inner: BufReader<R>,
    consumed: u64,
}

impl<R: AsyncRead + Unpin> ChunkReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner: BufReader::new(inner),
            consumed: 0,
        }
    }

    /// Bytes handed out so far.
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    /// Load the next chunk of up to [`WINDOW_CAPACITY`] bytes into `buffer`.
    pub async fn read_window(&mut self, buffer: &mut WindowBuffer) -> io::Result<Chunk> {
        let raw = &mut buffer.raw_mut()[..WINDOW_CAPACITY];
        let mut len = 0;
        while len < raw.len() {
            let n = self.inner.read(&mut raw[len..]).await?;
            if n == 0 {
                break;
            }
            len += n;
        }
        buffer
            .commit_contiguous(len)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        self.consumed += len as u64;

        let last = self.inner.fill_buf().await?.is_empty();
        Ok(Chunk { len, last })
    }
}

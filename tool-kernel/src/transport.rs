//! Newline-delimited framing over async byte streams.

use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// Default upper bound on a single inbound frame.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 1024 * 1024;

/// One line read from the input stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Frame payload without its line terminator.
    Message(Vec<u8>),
    /// Frame exceeded the size limit; its bytes were skipped.
    Oversized {
        /// Length of the skipped line.
        len: usize,
    },
}

/// Reads `\n`-terminated frames without buffering more than the limit.
#[derive(Debug)]
pub struct FrameReader<R> {
    inner: R,
    max_frame_bytes: usize,
    buf: Vec<u8>,
}

impl<R> FrameReader<R>
where
    R: AsyncBufRead + Unpin,
{
    /// Wraps a buffered reader.
    #[must_use]
    pub fn new(inner: R, max_frame_bytes: usize) -> Self {
        Self {
            inner,
            max_frame_bytes,
            buf: Vec::new(),
        }
    }

    /// Returns the next non-blank frame, or `None` at end of input.
    ///
    /// A trailing `\r` is stripped. An unterminated final line still counts
    /// as a frame.
    ///
    /// # Errors
    ///
    /// Propagates read failures from the underlying stream.
    pub async fn next_frame(&mut self) -> io::Result<Option<Frame>> {
        loop {
            self.buf.clear();
            let mut len = 0;
            let mut oversized = false;
            let mut saw_bytes = false;

            loop {
                let available = self.inner.fill_buf().await?;
                if available.is_empty() {
                    break;
                }
                saw_bytes = true;

                let newline = available.iter().position(|&byte| byte == b'\n');
                let (chunk, consumed) = match newline {
                    Some(pos) => (&available[..pos], pos + 1),
                    None => (available, available.len()),
                };

                len += chunk.len();
                if !oversized {
                    if self.buf.len() + chunk.len() > self.max_frame_bytes {
                        oversized = true;
                        self.buf.clear();
                    } else {
                        self.buf.extend_from_slice(chunk);
                    }
                }

                self.inner.consume(consumed);
                if newline.is_some() {
                    break;
                }
            }

            if !saw_bytes {
                return Ok(None);
            }
            if oversized {
                return Ok(Some(Frame::Oversized { len }));
            }

            if self.buf.last() == Some(&b'\r') {
                self.buf.pop();
            }
            if self.buf.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            return Ok(Some(Frame::Message(std::mem::take(&mut self.buf))));
        }
    }
}

/// Writes frames as single lines, flushing after each.
#[derive(Debug)]
pub struct FrameWriter<W> {
    inner: W,
}

impl<W> FrameWriter<W>
where
    W: AsyncWrite + Unpin,
{
    /// Wraps a writer.
    #[must_use]
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Writes one frame followed by `\n`.
    ///
    /// # Errors
    ///
    /// Propagates write or flush failures.
    pub async fn write_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        self.inner.write_all(frame).await?;
        self.inner.write_all(b"\n").await?;
        self.inner.flush().await
    }

    /// Returns the wrapped writer.
    #[must_use]
    pub fn into_inner(self) -> W {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    async fn collect(input: &[u8], limit: usize) -> Vec<Frame> {
        // A tiny buffer forces frames to span several fill_buf calls.
        let mut reader = FrameReader::new(BufReader::with_capacity(4, input), limit);
        let mut frames = Vec::new();
        while let Some(frame) = reader.next_frame().await.unwrap() {
            frames.push(frame);
        }
        frames
    }

    #[tokio::test]
    async fn splits_lines_and_skips_blanks() {
        let frames = collect(b"{\"a\":1}\n\n  \r\n{\"b\":2}\r\n{\"c\":3}", 1024).await;
        assert_eq!(
            frames,
            vec![
                Frame::Message(b"{\"a\":1}".to_vec()),
                Frame::Message(b"{\"b\":2}".to_vec()),
                Frame::Message(b"{\"c\":3}".to_vec()),
            ]
        );
    }

    #[tokio::test]
    async fn oversized_frames_are_skipped_whole() {
        let frames = collect(b"0123456789abcdef\nok\n", 8).await;
        assert_eq!(
            frames,
            vec![Frame::Oversized { len: 16 }, Frame::Message(b"ok".to_vec())]
        );
    }

    #[tokio::test]
    async fn empty_input_ends_immediately() {
        assert!(collect(b"", 8).await.is_empty());
        assert!(collect(b"\n\n", 8).await.is_empty());
    }

    #[tokio::test]
    async fn writer_terminates_each_frame() {
        let mut writer = FrameWriter::new(Vec::new());
        writer.write_frame(b"{}").await.unwrap();
        writer.write_frame(b"[]").await.unwrap();
        assert_eq!(writer.into_inner(), b"{}\n[]\n");
    }
}

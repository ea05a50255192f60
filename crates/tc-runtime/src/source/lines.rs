use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Physical lines of a record file. A line ends at `\n`, `\r`, or `\r\n`;
/// the terminator is not part of the returned line.
pub(crate) struct PhysicalLines<R> {
    reader: R,
    buf: Vec<u8>,
    /// Last terminator was `\r`; a directly following `\n` belongs to it.
    after_cr: bool,
}

impl<R: AsyncBufRead + Unpin> PhysicalLines<R> {
    pub(crate) fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            after_cr: false,
        }
    }

    /// Next line, or `None` at end of input. Invalid UTF-8 is an
    /// `InvalidData` error.
    pub(crate) async fn next_line(&mut self) -> io::Result<Option<String>> {
        self.buf.clear();
        loop {
            let available = self.reader.fill_buf().await?;
            if available.is_empty() {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                return self.take_line().map(Some);
            }

            let mut start = 0;
            if self.after_cr {
                self.after_cr = false;
                if available[0] == b'\n' {
                    start = 1;
                }
            }
            let rest = &available[start..];
            match rest.iter().position(|b| *b == b'\n' || *b == b'\r') {
                Some(i) => {
                    self.buf.extend_from_slice(&rest[..i]);
                    self.after_cr = rest[i] == b'\r';
                    self.reader.consume(start + i + 1);
                    return self.take_line().map(Some);
                }
                None => {
                    self.buf.extend_from_slice(rest);
                    let used = available.len();
                    self.reader.consume(used);
                }
            }
        }
    }

    fn take_line(&mut self) -> io::Result<String> {
        String::from_utf8(std::mem::take(&mut self.buf))
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

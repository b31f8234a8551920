use std::io::ErrorKind;

use tokio::io::{AsyncRead, AsyncReadExt, BufReader};

use crate::core::Result;

const BACKSPACE: u8 = 0x08;
const DELETE: u8 = 0x7f;

/// One line of operator input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleLine {
    Text(String),
    /// The line exceeded the reader's limit and was discarded
    Overlong { limit: usize },
}

/// Bounded line reader over a byte stream.
///
/// Lines end at CR or LF (a CR LF pair counts once). Backspace and delete
/// remove the previous byte. A line that grows past `limit` is consumed up to
/// its terminator and returned as [`ConsoleLine::Overlong`].
pub struct LineReader<R> {
    inner: BufReader<R>,
    limit: usize,
    after_cr: bool,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    pub fn new(inner: R, limit: usize) -> Self {
        LineReader {
            inner: BufReader::new(inner),
            limit,
            after_cr: false,
        }
    }

    /// Reads the next line; `None` at end of input
    pub async fn read_line(&mut self) -> Result<Option<ConsoleLine>> {
        let mut line = Vec::new();
        let mut overlong = false;
        let mut seen_any = false;

        loop {
            let byte = match self.inner.read_u8().await {
                Ok(byte) => byte,
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                    if !seen_any {
                        return Ok(None);
                    }
                    break;
                }
                Err(e) => return Err(e.into()),
            };

            if byte == b'\n' && self.after_cr {
                self.after_cr = false;
                continue;
            }
            self.after_cr = byte == b'\r';
            seen_any = true;

            match byte {
                b'\r' | b'\n' => break,
                BACKSPACE | DELETE => {
                    line.pop();
                }
                _ if line.len() < self.limit => line.push(byte),
                _ => overlong = true,
            }
        }

        if overlong {
            return Ok(Some(ConsoleLine::Overlong { limit: self.limit }));
        }
        Ok(Some(ConsoleLine::Text(String::from_utf8_lossy(&line).into_owned())))
    }
}

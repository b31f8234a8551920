//! Interactive operator console
//!
//! A reader task turns the input stream into bounded lines and forwards them
//! over a channel, so the node can wait for a line inside `select!` without
//! losing partial input. Prompts read from the same channel.

mod reader;

pub use self::reader::{ConsoleLine, LineReader};

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::core::{Error, Result};
use crate::util::parse_decimal_prefix;

/// Longest destination suffix the operator may type
pub const SUFFIX_INPUT_LIMIT: usize = 21;

/// Longest numeric answer the operator may type
pub const NUMERIC_INPUT_LIMIT: usize = 9;

/// Line-oriented operator console
pub struct Console<W> {
    lines: mpsc::Receiver<ConsoleLine>,
    out: W,
}

impl<W: AsyncWrite + Unpin> Console<W> {
    /// Creates a console fed by an existing line channel
    pub fn new(lines: mpsc::Receiver<ConsoleLine>, out: W) -> Self {
        Console { lines, out }
    }

    /// Spawns a reader task over `input` and returns the console
    pub fn spawn<R>(input: R, out: W, line_limit: usize) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(16);

        tokio::spawn(async move {
            let mut reader = LineReader::new(input, line_limit);
            loop {
                match reader.read_line().await {
                    Ok(Some(line)) => {
                        if tx.send(line).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => {
                        debug!("console input closed");
                        break;
                    }
                    Err(e) => {
                        warn!("console read failed: {}", e);
                        break;
                    }
                }
            }
        });

        Console::new(rx, out)
    }

    /// Writes text without a line break
    pub async fn write(&mut self, text: &str) -> Result<()> {
        self.out.write_all(text.as_bytes()).await?;
        self.out.flush().await?;
        Ok(())
    }

    pub async fn write_line(&mut self, text: &str) -> Result<()> {
        self.out.write_all(text.as_bytes()).await?;
        self.out.write_all(b"\n").await?;
        self.out.flush().await?;
        Ok(())
    }

    /// Next line typed by the operator; `None` once the input is closed.
    ///
    /// Cancel safe, so it can sit in a `select!` arm.
    pub async fn next_line(&mut self) -> Option<ConsoleLine> {
        self.lines.recv().await
    }

    /// Asks until the operator answers with at most `limit` bytes
    pub async fn prompt(&mut self, prompt: &str, limit: usize) -> Result<String> {
        loop {
            self.write(prompt).await?;
            match self.lines.recv().await {
                None => return Err(Error::console("console closed while waiting for input")),
                Some(ConsoleLine::Text(text)) if text.len() <= limit => return Ok(text),
                Some(_) => {
                    let err = Error::InputTooLong { limit };
                    warn!("{}", err);
                    self.write_line(&err.to_string()).await?;
                }
            }
        }
    }

    /// Asks for a decimal number; unparsable answers read as 0
    pub async fn prompt_number(&mut self, prompt: &str, limit: usize) -> Result<i64> {
        let answer = self.prompt(prompt, limit).await?;
        Ok(parse_decimal_prefix(answer.as_bytes()))
    }

    pub fn output(&self) -> &W {
        &self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn console_with(lines: &[ConsoleLine]) -> (Console<Vec<u8>>, mpsc::Sender<ConsoleLine>) {
        let (tx, rx) = mpsc::channel(16);
        for line in lines {
            tx.try_send(line.clone()).unwrap();
        }
        (Console::new(rx, Vec::new()), tx)
    }

    fn text(s: &str) -> ConsoleLine {
        ConsoleLine::Text(s.to_string())
    }

    #[tokio::test]
    async fn test_prompt_returns_answer() {
        let (mut console, _tx) = console_with(&[text("abc")]);
        let answer = console.prompt("name : ", 8).await.unwrap();
        assert_eq!(answer, "abc");
        assert_eq!(console.output().as_slice(), b"name : ");
    }

    #[tokio::test]
    async fn test_prompt_rejects_long_answers_and_asks_again() {
        let (mut console, _tx) = console_with(&[
            text("1234567890"),
            ConsoleLine::Overlong { limit: 128 },
            text("42"),
        ]);
        let answer = console.prompt_number("goal : ", NUMERIC_INPUT_LIMIT).await.unwrap();
        assert_eq!(answer, 42);

        let output = String::from_utf8(console.output().clone()).unwrap();
        assert_eq!(output.matches("goal : ").count(), 3);
        assert_eq!(output.matches("Input longer than 9 bytes").count(), 2);
    }

    #[tokio::test]
    async fn test_prompt_number_coerces_garbage_to_zero() {
        let (mut console, _tx) = console_with(&[text("abc")]);
        assert_eq!(console.prompt_number("n : ", 9).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_prompt_fails_when_closed() {
        let (mut console, tx) = console_with(&[]);
        drop(tx);
        let err = console.prompt("n : ", 9).await.unwrap_err();
        assert!(matches!(err, Error::Console(_)));
    }

    #[tokio::test]
    async fn test_spawned_reader_feeds_lines() {
        let input = tokio_test::io::Builder::new().read(b"1\r\n\r").build();
        let mut console = Console::spawn(input, Vec::new(), 128);

        assert_eq!(console.next_line().await, Some(text("1")));
        assert_eq!(console.next_line().await, Some(text("")));
        assert_eq!(console.next_line().await, None);
    }
}

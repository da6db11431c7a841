use std::time::Duration;

use postern_common::{error::SessionError, outgoing};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::reply::Reply;

use super::{Session, MAX_LINE_LENGTH};

/// One unit out of the line reader: either a complete line (terminated by
/// `\n`, which may or may not be preceded by `\r`), or a fragment cut off by
/// the buffer capacity or end of stream.
pub(super) struct Chunk {
    pub bytes: Vec<u8>,
    pub complete: bool,
}

/// A received command line. `overlong` means the line exceeded
/// [`MAX_LINE_LENGTH`] and its remainder has been consumed and discarded.
pub(super) struct CommandLine {
    pub bytes: Vec<u8>,
    pub overlong: bool,
}

impl<Stream: AsyncRead + AsyncWrite + Unpin + Send + Sync> Session<Stream> {
    /// Receive one command line, applying the idle deadline.
    ///
    /// `Ok(None)` means the peer closed the connection. A deferred flush
    /// from a pipelined reply is performed first once the input buffer has
    /// drained, so coalesced replies are never withheld from a waiting peer.
    pub(super) async fn receive(&mut self) -> Result<Option<CommandLine>, SessionError> {
        if self.needs_flush && self.reader.buffer().is_empty() {
            self.needs_flush = false;
            let write_secs = self.info.params.write_secs;
            tokio::time::timeout(Duration::from_secs(write_secs), self.writer.flush())
                .await
                .map_err(|_| SessionError::Timeout(write_secs))??;
        }

        let idle_secs = self.info.params.idle_secs;
        let idle = Duration::from_secs(idle_secs);

        let chunk = tokio::time::timeout(idle, self.read_chunk())
            .await
            .map_err(|_| SessionError::Timeout(idle_secs))??;
        let Some(chunk) = chunk else {
            return Ok(None);
        };

        if chunk.complete {
            return Ok(Some(CommandLine {
                bytes: chunk.bytes,
                overlong: false,
            }));
        }

        // Swallow the rest of the over-long line before replying.
        loop {
            let next = tokio::time::timeout(idle, self.read_chunk())
                .await
                .map_err(|_| SessionError::Timeout(idle_secs))??;
            match next {
                None => return Ok(None),
                Some(chunk) if chunk.complete => break,
                Some(_) => {}
            }
        }

        Ok(Some(CommandLine {
            bytes: Vec::new(),
            overlong: true,
        }))
    }

    /// Read up to and including the next `\n`, or up to [`MAX_LINE_LENGTH`]
    /// bytes if no newline arrives within the buffer, whichever comes first.
    ///
    /// `Ok(None)` is a clean end of stream at a line boundary; a partial
    /// line cut off by EOF comes back as an incomplete chunk.
    pub(super) async fn read_chunk(&mut self) -> Result<Option<Chunk>, SessionError> {
        let mut bytes: Vec<u8> = Vec::new();

        loop {
            let available = self.reader.fill_buf().await?;
            if available.is_empty() {
                return Ok(if bytes.is_empty() {
                    None
                } else {
                    Some(Chunk {
                        bytes,
                        complete: false,
                    })
                });
            }

            let window = available.len().min(MAX_LINE_LENGTH - bytes.len());
            if let Some(at) = available[..window].iter().position(|&b| b == b'\n') {
                bytes.extend_from_slice(&available[..=at]);
                self.reader.consume(at + 1);
                return Ok(Some(Chunk {
                    bytes,
                    complete: true,
                }));
            }

            bytes.extend_from_slice(&available[..window]);
            self.reader.consume(window);
            if bytes.len() == MAX_LINE_LENGTH {
                return Ok(Some(Chunk {
                    bytes,
                    complete: false,
                }));
            }
        }
    }

    /// Write a reply, applying the write deadline and the pipelining flush
    /// policy: a pipelinable reply is held back while the peer still has
    /// commands buffered, so a command batch gets its replies in one burst.
    pub(super) async fn send(&mut self, reply: &Reply) -> Result<(), SessionError> {
        let write_secs = self.info.params.write_secs;
        tokio::time::timeout(Duration::from_secs(write_secs), self.write_reply(reply))
            .await
            .map_err(|_| SessionError::Timeout(write_secs))?
    }

    async fn write_reply(&mut self, reply: &Reply) -> Result<(), SessionError> {
        let lines = reply.lines();
        for (index, line) in lines.iter().enumerate() {
            let separator = if index + 1 == lines.len() { ' ' } else { '-' };
            let wire = format!("{}{}{}\r\n", line.status, separator, line.text);

            outgoing!(level = DEBUG, "{}", wire.trim_end());
            self.writer.write_all(wire.as_bytes()).await?;
        }

        if reply.can_pipeline() && !self.reader.buffer().is_empty() {
            self.needs_flush = true;
        } else {
            self.writer.flush().await?;
            self.needs_flush = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use tokio::io::{AsyncWriteExt, DuplexStream};

    use crate::{
        processor::AcceptAll,
        session::{Session, SessionConfig, MAX_LINE_LENGTH},
    };

    fn session(stream: DuplexStream) -> Session<DuplexStream> {
        Session::create(
            stream,
            "127.0.0.1:2525".parse().unwrap(),
            SessionConfig::builder()
                .with_processor(Arc::new(AcceptAll))
                .build(),
        )
    }

    #[tokio::test]
    async fn reassembles_lines_across_writes() {
        let (server, mut client) = tokio::io::duplex(1024);
        let mut session = session(server);

        client.write_all(b"NO").await.unwrap();
        client.write_all(b"OP\r\n").await.unwrap();

        let chunk = session.read_chunk().await.unwrap().unwrap();
        assert!(chunk.complete);
        assert_eq!(chunk.bytes, b"NOOP\r\n");
    }

    #[tokio::test]
    async fn bare_lf_terminates_a_chunk() {
        let (server, mut client) = tokio::io::duplex(1024);
        let mut session = session(server);

        client.write_all(b"one\ntwo\r\n").await.unwrap();

        let chunk = session.read_chunk().await.unwrap().unwrap();
        assert!(chunk.complete);
        assert_eq!(chunk.bytes, b"one\n");

        let chunk = session.read_chunk().await.unwrap().unwrap();
        assert!(chunk.complete);
        assert_eq!(chunk.bytes, b"two\r\n");
    }

    #[tokio::test]
    async fn long_lines_come_back_as_fragments() {
        let (server, mut client) = tokio::io::duplex(MAX_LINE_LENGTH * 2);
        let mut session = session(server);

        let long = vec![b'x'; MAX_LINE_LENGTH + 100];
        client.write_all(&long).await.unwrap();
        client.write_all(b"\r\n").await.unwrap();

        let chunk = session.read_chunk().await.unwrap().unwrap();
        assert!(!chunk.complete);
        assert_eq!(chunk.bytes.len(), MAX_LINE_LENGTH);

        let chunk = session.read_chunk().await.unwrap().unwrap();
        assert!(chunk.complete);
        assert_eq!(chunk.bytes.len(), 102);
    }

    #[tokio::test]
    async fn eof_at_line_boundary_is_clean() {
        let (server, mut client) = tokio::io::duplex(1024);
        let mut session = session(server);

        client.write_all(b"QUIT\r\n").await.unwrap();
        drop(client);

        let chunk = session.read_chunk().await.unwrap().unwrap();
        assert!(chunk.complete);
        assert!(session.read_chunk().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn eof_mid_line_is_a_fragment() {
        let (server, mut client) = tokio::io::duplex(1024);
        let mut session = session(server);

        client.write_all(b"partial").await.unwrap();
        drop(client);

        let chunk = session.read_chunk().await.unwrap().unwrap();
        assert!(!chunk.complete);
        assert_eq!(chunk.bytes, b"partial");
    }
}

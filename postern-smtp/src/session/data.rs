use std::{io, time::Duration};

use postern_common::{error::SessionError, internal, status::Status};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::reply::Reply;

use super::Session;

/// Lee-way past the configured maximum before the body buffer is dropped;
/// the strict check happens at end of data.
const OVERSIZE_SLACK: usize = 1024;

impl<Stream: AsyncRead + AsyncWrite + Unpin + Send + Sync> Session<Stream> {
    /// Handle DATA: sequencing checks, the intermediate 354, the body
    /// sub-loop, and delivery through the processor.
    pub(super) async fn data(&mut self) -> Result<Reply, SessionError> {
        let Some(envelope) = self.transaction.take() else {
            // RFC 5321 s4.1.4
            return Ok(Reply::new(
                Status::InvalidCommandSequence,
                "5.5.1 Error: missing MAIL command before DATA",
            ));
        };
        if !envelope.has_recipients() {
            // A failed DATA attempt leaves the transaction open.
            self.transaction = Some(envelope);
            return Ok(Reply::new(
                Status::MailboxNotAllowed,
                "5.5.1 Error: no valid recipients",
            ));
        }

        // From here on the transaction stays cleared, so a client error
        // mid-body cannot leak state into the next transaction.
        let ready = Reply::new(Status::StartMailInput, "End data with <CR><LF>.<CR><LF>");
        self.send(&ready).await?;

        let Some(body) = self.read_body().await? else {
            // RFC 5321 s4.5.3.1.9
            return Ok(Reply::new(
                Status::ExceededStorage,
                "4.3.4 Error: message too big for system",
            ));
        };

        internal!(
            level = DEBUG,
            "Received {} byte message from '{}'",
            body.len(),
            envelope.reverse_path()
        );

        // The processor may supply its own reply, typically a 250 carrying a
        // real queue ID.
        match self.processor.process_mail(&self.info, &envelope, &body).await {
            Err(err) => Err(err.into()),
            Ok(Some(reply)) => Ok(reply),
            Ok(None) => Ok(Reply::new(Status::Ok, "2.0.0 OK: queued (ID unknown)")),
        }
    }

    /// Accumulate the message body until the `CRLF.CRLF` terminator,
    /// unstuffing leading dots. Returns `None` when the body exceeded the
    /// configured maximum (the remainder was drained but not stored).
    async fn read_body(&mut self) -> Result<Option<Vec<u8>>, SessionError> {
        let limit = self.info.params.max_message_size;
        let read_secs = self.info.params.read_secs;
        let read_timeout = Duration::from_secs(read_secs);

        let mut body: Vec<u8> = Vec::new();
        // True iff nothing has been accepted yet or the last accepted bytes
        // ended with CRLF.
        let mut start_of_line = true;
        let mut oversize = false;

        loop {
            let chunk = tokio::time::timeout(read_timeout, self.read_chunk())
                .await
                .map_err(|_| SessionError::Timeout(read_secs))??;
            let Some(chunk) = chunk else {
                return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
            };

            let mut line = chunk.bytes.as_slice();
            let dotted = start_of_line && line.first() == Some(&b'.');
            if dotted {
                line = &line[1..];
            }

            if !oversize && body.len() + line.len() > limit + OVERSIZE_SLACK {
                oversize = true;
                // release memory early, the peer is drained from here on
                body = Vec::new();
            }

            if !line.ends_with(b"\r\n") {
                // A fragment or a bare-LF line: appended as-is, and it does
                // not put us at a line boundary, since per RFC 5321
                // s4.1.1.4 <LF>.<LF> is not a terminator.
                if !oversize {
                    body.extend_from_slice(line);
                }
                start_of_line = false;
                continue;
            }

            // The line ends in CRLF, so a terminator is possible. The dot
            // has already been stripped, hence the terminator is a dotted
            // bare CRLF at a line boundary, with the body either empty (dot
            // on the first line ends the transfer even though such a
            // message is broken for other reasons) or itself CRLF-complete.
            let terminator = start_of_line
                && dotted
                && line == b"\r\n"
                && (body.ends_with(b"\r\n") || body.is_empty());

            if !terminator {
                if !oversize {
                    body.extend_from_slice(line);
                }
                start_of_line = true;
                continue;
            }

            // The stripped dot and the final CRLF are not part of the body.
            break;
        }

        if oversize || body.len() > limit {
            return Ok(None);
        }
        Ok(Some(body))
    }
}

use std::{net::SocketAddr, sync::Arc};

use postern_common::{
    address::Address, envelope::Envelope, error::SessionError, incoming, internal, status::Status,
    Signal,
};
use tokio::{
    io::{AsyncRead, AsyncWrite, BufReader, BufWriter, ReadHalf, WriteHalf},
    sync::broadcast,
};

use crate::{
    command::{self, Verb},
    extensions,
    processor::{AcceptAll, TransactionProcessor},
    reply::Reply,
    SessionParams,
};

mod data;
mod io;

/// Command lines longer than this are rejected and swallowed.
/// RFC 5321 s4.5.3.1.4 sets 512 octets; we allow slack for extensions.
pub const MAX_LINE_LENGTH: usize = 4096;

/// Past this many unknown commands the peer has almost certainly lost sync,
/// so the next 500 closes the session.
const MAX_UNRECOGNISED_COMMANDS: u32 = 20;

/// Read-only facts about a session, handed to the transaction processor.
#[derive(Clone, Debug)]
pub struct SessionInfo {
    pub peer: SocketAddr,
    pub params: SessionParams,
}

pub struct SessionConfig {
    params: SessionParams,
    processor: Arc<dyn TransactionProcessor>,
}

impl SessionConfig {
    /// Create a new `SessionConfig` builder
    #[must_use]
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::default()
    }
}

/// Builder for `SessionConfig`
pub struct SessionConfigBuilder {
    params: SessionParams,
    processor: Arc<dyn TransactionProcessor>,
}

impl Default for SessionConfigBuilder {
    fn default() -> Self {
        Self {
            params: SessionParams::default(),
            processor: Arc::new(AcceptAll),
        }
    }
}

impl SessionConfigBuilder {
    /// Set the tuning parameters for this session
    #[must_use]
    pub fn with_params(mut self, params: SessionParams) -> Self {
        self.params = params;
        self
    }

    /// Set the transaction processor consulted at each decision point
    #[must_use]
    pub fn with_processor(mut self, processor: Arc<dyn TransactionProcessor>) -> Self {
        self.processor = processor;
        self
    }

    /// Build the final `SessionConfig`
    #[must_use]
    pub fn build(self) -> SessionConfig {
        SessionConfig {
            params: self.params,
            processor: self.processor,
        }
    }
}

/// One inbound SMTP conversation over an accepted stream.
///
/// Owns the stream exclusively; dropping the session closes it, which is
/// also how cancellation propagates into in-flight reads and writes.
pub struct Session<Stream: AsyncRead + AsyncWrite + Unpin + Send + Sync> {
    reader: BufReader<ReadHalf<Stream>>,
    writer: BufWriter<WriteHalf<Stream>>,
    info: SessionInfo,
    transaction: Option<Envelope>,
    unrecognised: u32,
    needs_flush: bool,
    processor: Arc<dyn TransactionProcessor>,
}

impl<Stream: AsyncRead + AsyncWrite + Unpin + Send + Sync> Session<Stream> {
    pub fn create(stream: Stream, peer: SocketAddr, config: SessionConfig) -> Self {
        let (read, write) = tokio::io::split(stream);

        Self {
            reader: BufReader::with_capacity(MAX_LINE_LENGTH, read),
            writer: BufWriter::new(write),
            info: SessionInfo {
                peer,
                params: config.params,
            },
            transaction: None,
            unrecognised: 0,
            needs_flush: false,
            processor: config.processor,
        }
    }

    /// Drive the session to completion.
    ///
    /// Returns when the peer quits, the stream errors, a closing reply was
    /// sent, or the signal fires. The stream is closed on every exit path.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` on transport failure, an expired deadline, or
    /// an internal processor failure; none of these produce a reply.
    pub async fn serve(
        mut self,
        mut signal: broadcast::Receiver<Signal>,
    ) -> Result<(), SessionError> {
        internal!(level = INFO, "Connection from {}", self.info.peer);

        match self.processor.check_connection(&self.info).await {
            Err(err) => {
                internal!(level = ERROR, "Connection check failed: {err}");
                return Err(err.into());
            }
            Ok(Some(reply)) if reply.is_error() => {
                self.send(&reply).await?;
                internal!(level = INFO, "Connection rejected for {}", self.info.peer);
                return Ok(());
            }
            Ok(_) => {}
        }

        let greeting = Reply::new(
            Status::ServiceReady,
            format!(
                "{} ESMTP {}",
                self.info.params.hostname, self.info.params.banner
            ),
        );
        self.send(&greeting).await?;

        let result = loop {
            tokio::select! {
                _ = signal.recv() => {
                    internal!(level = INFO, "Cancelling session for {}", self.info.peer);
                    break Ok(());
                }
                step = self.step() => match step {
                    Ok(true) => break Ok(()),
                    Ok(false) => {}
                    Err(err) => break Err(err),
                }
            }
        };

        internal!(level = INFO, "Connection closed for {}", self.info.peer);
        result
    }

    /// One receive/dispatch/reply cycle. Returns `Ok(true)` when the session
    /// is over (peer disconnected or a closing reply went out).
    async fn step(&mut self) -> Result<bool, SessionError> {
        let Some(line) = self.receive().await? else {
            return Ok(true);
        };

        if line.overlong {
            // RFC 5321 s4.5.3.1.4
            let reply = Reply::new(Status::SyntaxError, "5.5.0 Error: invalid line length");
            self.send(&reply).await?;
            return Ok(false);
        }

        let reply = self.dispatch(&line.bytes).await?;
        self.send(&reply).await?;
        Ok(reply.is_closing())
    }

    async fn dispatch(&mut self, raw: &[u8]) -> Result<Reply, SessionError> {
        let Ok(text) = std::str::from_utf8(raw) else {
            return Ok(self.unrecognised());
        };
        let text = text.trim_matches(['\r', '\n']);

        incoming!(level = DEBUG, "{text}");

        let (word, params) = text.split_once(' ').unwrap_or((text, ""));
        let Some(verb) = Verb::parse(word) else {
            return Ok(self.unrecognised());
        };

        Ok(match verb {
            Verb::Helo => self.helo(),
            Verb::Ehlo => self.ehlo(),
            Verb::Mail => self.mail(params).await?,
            Verb::Rcpt => self.rcpt(params).await?,
            Verb::Data => self.data().await?,
            Verb::Rset => self.rset(),
            Verb::Vrfy | Verb::Expn => {
                Reply::new(Status::NotImplemented, "5.5.1 Error: command not implemented")
                    .pipelined()
            }
            Verb::Help => Reply::new(Status::Ok, "2.0.0 OK: but I currently have no help to give"),
            Verb::Noop => Reply::new(Status::Ok, "2.0.0 OK"),
            Verb::Quit => self.quit(),
        })
    }

    fn unrecognised(&mut self) -> Reply {
        self.unrecognised += 1;
        // RFC 5321 s4.2.4
        let reply = Reply::new(Status::SyntaxError, "5.5.2 Error: command unknown");
        if self.unrecognised > MAX_UNRECOGNISED_COMMANDS {
            reply.closing()
        } else {
            reply
        }
    }

    fn reset(&mut self) {
        self.transaction = None;
    }

    fn helo(&mut self) -> Reply {
        self.reset();
        Reply::new(Status::Ok, self.info.params.hostname.clone())
    }

    fn ehlo(&mut self) -> Reply {
        self.reset();
        let mut reply = Reply::new(Status::Ok, self.info.params.hostname.clone());
        for extension in extensions::advertised(self.info.params.max_message_size) {
            reply = reply.line(Status::Ok, extension.to_string());
        }
        reply
    }

    async fn mail(&mut self, params: &str) -> Result<Reply, SessionError> {
        if self.transaction.is_some() {
            // RFC 5321 s4.1.4
            return Ok(Reply::new(
                Status::InvalidCommandSequence,
                "5.5.1 Error: nested MAIL commands",
            ));
        }

        let Some(address) = command::mail_argument(params) else {
            return Ok(Reply::new(
                Status::Error,
                "5.1.7 Error: bad envelope sender address format",
            ));
        };
        let sender = Address::new(address);

        match self.processor.check_from_address(&self.info, &sender).await {
            Err(err) => return Err(err.into()),
            Ok(Some(reply)) if reply.is_error() => return Ok(reply),
            Ok(_) => {}
        }

        let text = format!("2.1.0 OK: mail is from '{sender}'");
        self.transaction = Some(Envelope::new(sender));
        Ok(Reply::new(Status::Ok, text).pipelined())
    }

    async fn rcpt(&mut self, params: &str) -> Result<Reply, SessionError> {
        if self.transaction.is_none() {
            // RFC 5321 s4.1.4
            return Ok(Reply::new(
                Status::InvalidCommandSequence,
                "5.5.1 Error: missing MAIL command before RCPT",
            ));
        }

        let Some(address) = command::rcpt_argument(params) else {
            return Ok(Reply::new(
                Status::Error,
                "5.1.3 Error: bad envelope recepient address component",
            ));
        };
        let Some(recipient) = Address::canonicalise(address) else {
            return Ok(Reply::new(
                Status::Error,
                "5.1.3 Error: bad envelope recepient address format",
            ));
        };

        match self
            .processor
            .check_recipient_address(&self.info, &recipient)
            .await
        {
            Err(err) => return Err(err.into()),
            Ok(Some(reply)) if reply.is_error() => return Ok(reply),
            Ok(_) => {}
        }

        let text = format!("2.1.5 OK: mail recipient '{recipient}'");
        if let Some(envelope) = self.transaction.as_mut() {
            envelope.add_recipient(recipient);
        }
        Ok(Reply::new(Status::Ok, text).pipelined())
    }

    fn rset(&mut self) -> Reply {
        self.reset();
        Reply::new(Status::Ok, "2.0.0 OK").pipelined()
    }

    fn quit(&mut self) -> Reply {
        self.reset();
        Reply::new(Status::GoodBye, "2.0.0 Bye").closing()
    }
}

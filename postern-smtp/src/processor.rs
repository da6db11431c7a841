use async_trait::async_trait;
use postern_common::{address::Address, envelope::Envelope, error::ProcessorError};

use crate::{reply::Reply, session::SessionInfo};

/// Outcome of a processor hook.
///
/// - `Ok(None)` accepts with the default reply.
/// - `Ok(Some(reply))` with an error-coded reply rejects the command (the
///   session survives unless the reply is marked closing); at the end of
///   DATA a non-error reply overrides the default `250`, so a processor can
///   report its own queue ID.
/// - `Err(_)` aborts the session with no reply.
pub type ProcessorResult = Result<Option<Reply>, ProcessorError>;

/// The inbound transaction processor: policy and disposition hooks invoked
/// at the four decision points of a session.
///
/// One instance is shared by every session on a listener, so implementations
/// must be callable concurrently (stateless or internally synchronised).
#[async_trait]
pub trait TransactionProcessor: Send + Sync {
    /// Called once per connection, before the 220 greeting.
    async fn check_connection(&self, session: &SessionInfo) -> ProcessorResult {
        let _ = session;
        Ok(None)
    }

    /// Called during MAIL with the reverse-path exactly as the peer sent it.
    async fn check_from_address(&self, session: &SessionInfo, address: &Address) -> ProcessorResult {
        let _ = (session, address);
        Ok(None)
    }

    /// Called during RCPT with the canonicalised recipient.
    async fn check_recipient_address(
        &self,
        session: &SessionInfo,
        address: &Address,
    ) -> ProcessorResult {
        let _ = (session, address);
        Ok(None)
    }

    /// Called after a completed DATA transfer with the decoded body.
    async fn process_mail(
        &self,
        session: &SessionInfo,
        envelope: &Envelope,
        body: &[u8],
    ) -> ProcessorResult {
        let _ = (session, envelope, body);
        Ok(None)
    }
}

/// A processor that accepts every connection, sender, recipient, and message,
/// and drops the mail on the floor.
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAll;

#[async_trait]
impl TransactionProcessor for AcceptAll {}

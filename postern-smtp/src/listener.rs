use std::{net::SocketAddr, sync::Arc};

use futures_util::future::join_all;
use postern_common::{error::ListenerError, internal, Signal};
use serde::Deserialize;
use tokio::{net::TcpListener, sync::broadcast};

use crate::{
    processor::TransactionProcessor,
    session::{Session, SessionConfig},
    SessionParams,
};

/// One listening socket: accepts connections and spawns a session task per
/// accepted stream.
#[derive(Debug, Deserialize)]
pub struct Listener {
    socket: SocketAddr,
    #[serde(default)]
    session: SessionParams,
}

impl Listener {
    #[must_use]
    pub fn socket(&self) -> SocketAddr {
        self.socket
    }

    #[must_use]
    pub fn session(&self) -> &SessionParams {
        &self.session
    }

    /// Accept connections until told to stop.
    ///
    /// `shutdown` stops this accept loop; `Signal::Shutdown` additionally
    /// waits for the spawned sessions (which observe their own channel,
    /// subscribed from `sessions`), while `Signal::Reload` leaves them
    /// running so a configuration reload never kills live conversations.
    ///
    /// # Errors
    ///
    /// Returns `ListenerError` if the socket cannot be bound or an accept
    /// fails.
    pub async fn serve(
        &self,
        processor: Arc<dyn TransactionProcessor>,
        mut shutdown: broadcast::Receiver<Signal>,
        sessions: broadcast::Sender<Signal>,
    ) -> Result<(), ListenerError> {
        let listener =
            TcpListener::bind(self.socket)
                .await
                .map_err(|source| ListenerError::BindFailed {
                    address: self.socket.to_string(),
                    source,
                })?;

        internal!(level = INFO, "Listening on {}", self.socket);
        let mut handles = Vec::new();

        loop {
            tokio::select! {
                sig = shutdown.recv() => {
                    match sig {
                        Ok(Signal::Reload) => {
                            internal!(level = INFO, "Listener {} stopping for reload, sessions continue", self.socket);
                            break;
                        }
                        Ok(Signal::Shutdown) | Err(_) => {
                            internal!(level = INFO, "Listener {} stopping, finishing sessions ...", self.socket);
                            join_all(handles).await;
                            break;
                        }
                    }
                }

                accepted = listener.accept() => {
                    let (stream, peer) = accepted.map_err(ListenerError::AcceptFailed)?;
                    tracing::debug!(target: "postern", "Connection received on {}", self.socket);

                    let session = Session::create(
                        stream,
                        peer,
                        SessionConfig::builder()
                            .with_params(self.session.clone())
                            .with_processor(Arc::clone(&processor))
                            .build(),
                    );
                    let signal = sessions.subscribe();

                    handles.push(tokio::spawn(async move {
                        if let Err(err) = session.serve(signal).await {
                            internal!(level = ERROR, "Session error: {err}");
                        }
                    }));
                }
            }
        }

        Ok(())
    }
}

impl From<SocketAddr> for Listener {
    fn from(socket: SocketAddr) -> Self {
        Self {
            socket,
            session: SessionParams::default(),
        }
    }
}

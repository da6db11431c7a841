use std::sync::Arc;

use futures_util::future::join_all;
use postern_common::Signal;
use serde::Deserialize;
use tokio::sync::broadcast;

use crate::{listener::Listener, processor::TransactionProcessor};

/// The configured set of listening sockets.
#[derive(Debug, Default, Deserialize)]
pub struct Server {
    #[serde(alias = "listener")]
    listeners: Vec<Listener>,
}

impl Server {
    #[must_use]
    pub fn new(listeners: Vec<Listener>) -> Self {
        Self { listeners }
    }

    #[must_use]
    pub fn listeners(&self) -> &[Listener] {
        &self.listeners
    }

    /// Drive every listener until it stops.
    ///
    /// # Errors
    ///
    /// Returns the first listener failure, after all listeners have
    /// finished.
    pub async fn serve(
        &self,
        processor: Arc<dyn TransactionProcessor>,
        shutdown: &broadcast::Sender<Signal>,
        sessions: &broadcast::Sender<Signal>,
    ) -> anyhow::Result<()> {
        let results = join_all(self.listeners.iter().map(|listener| {
            listener.serve(
                Arc::clone(&processor),
                shutdown.subscribe(),
                sessions.clone(),
            )
        }))
        .await;

        for result in results {
            result?;
        }

        Ok(())
    }
}

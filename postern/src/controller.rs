use std::{
    path::PathBuf,
    sync::{Arc, LazyLock},
};

use postern_common::{internal, logging, Signal};
use postern_smtp::{AcceptAll, TransactionProcessor};
use tokio::sync::broadcast;

use crate::config::Config;

/// Channel on which in-flight sessions are cancelled. Kept separate from the
/// per-generation listener channel so a reload can replace listeners without
/// touching live conversations.
pub static SESSION_BROADCAST: LazyLock<broadcast::Sender<Signal>> = LazyLock::new(|| {
    let (sender, _receiver) = broadcast::channel(64);
    sender
});

enum Outcome {
    Shutdown,
    Reload,
}

async fn wait_for_signal() -> anyhow::Result<Outcome> {
    let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    let mut hangup = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::hangup())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            internal!(level = INFO, "Interrupt received, shutting down");
            Ok(Outcome::Shutdown)
        }
        _ = terminate.recv() => {
            internal!(level = INFO, "Terminate signal received, shutting down");
            Ok(Outcome::Shutdown)
        }
        _ = hangup.recv() => {
            internal!(level = INFO, "Reload signal received; the new configuration applies to new connections");
            Ok(Outcome::Reload)
        }
    }
}

/// Runs the configured server, restarting listeners on SIGHUP and shutting
/// everything down on SIGINT/SIGTERM.
pub struct Controller {
    config_path: PathBuf,
    processor: Arc<dyn TransactionProcessor>,
}

impl Controller {
    #[must_use]
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            processor: Arc::new(AcceptAll),
        }
    }

    /// Replace the default accept-everything processor.
    #[must_use]
    pub fn with_processor(mut self, processor: Arc<dyn TransactionProcessor>) -> Self {
        self.processor = processor;
        self
    }

    /// Run this controller, and everything it controls.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be loaded, logging
    /// cannot be initialised, or a listener fails.
    pub async fn run(self) -> anyhow::Result<()> {
        let mut config = Config::load(&self.config_path)?;
        logging::init(&config.logging)?;

        internal!(level = INFO, "Controller running");

        loop {
            // One listener generation per configuration load.
            let (listeners, _) = broadcast::channel(64);

            {
                let serve = config.server.serve(
                    Arc::clone(&self.processor),
                    &listeners,
                    &SESSION_BROADCAST,
                );
                tokio::pin!(serve);

                let outcome = tokio::select! {
                    result = &mut serve => return result,
                    outcome = wait_for_signal() => outcome?,
                };

                match outcome {
                    Outcome::Shutdown => {
                        let _ = SESSION_BROADCAST.send(Signal::Shutdown);
                        let _ = listeners.send(Signal::Shutdown);
                        serve.await?;
                        internal!(level = INFO, "Shutdown complete");
                        return Ok(());
                    }
                    Outcome::Reload => {
                        let _ = listeners.send(Signal::Reload);
                        serve.await?;
                    }
                }
            }

            config = Config::load(&self.config_path)?;
            internal!(level = INFO, "Loaded configuration");
        }
    }
}

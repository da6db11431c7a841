pub mod command;
pub mod extensions;
pub mod listener;
pub mod processor;
pub mod reply;
pub mod server;
pub mod session;

use serde::Deserialize;

pub use listener::Listener;
pub use processor::{AcceptAll, TransactionProcessor};
pub use reply::Reply;
pub use server::Server;
pub use session::{Session, SessionConfig};

/// Per-session tuning, immutable once a session is created.
///
/// The defaults match what an unconfigured listener hands out: short
/// timeouts, a 20 MiB message cap, and a localhost greeting.
#[derive(Clone, Debug, Deserialize)]
pub struct SessionParams {
    /// Timeout waiting for the next command, in seconds.
    #[serde(default = "default_idle_secs")]
    pub idle_secs: u64,

    /// Timeout for reads other than at the command prompt, in seconds.
    #[serde(default = "default_read_secs")]
    pub read_secs: u64,

    /// Timeout for writes, in seconds.
    #[serde(default = "default_write_secs")]
    pub write_secs: u64,

    /// Hostname used in the greeting and in HELO/EHLO replies.
    #[serde(default = "default_hostname")]
    pub hostname: String,

    /// Mailserver name used in the greeting banner.
    #[serde(default = "default_banner")]
    pub banner: String,

    /// Maximum accepted message size in bytes, advertised via SIZE.
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
}

impl Default for SessionParams {
    fn default() -> Self {
        Self {
            idle_secs: default_idle_secs(),
            read_secs: default_read_secs(),
            write_secs: default_write_secs(),
            hostname: default_hostname(),
            banner: default_banner(),
            max_message_size: default_max_message_size(),
        }
    }
}

const fn default_idle_secs() -> u64 {
    30
}

const fn default_read_secs() -> u64 {
    15
}

const fn default_write_secs() -> u64 {
    15
}

fn default_hostname() -> String {
    "localhost".to_string()
}

fn default_banner() -> String {
    "postern".to_string()
}

const fn default_max_message_size() -> usize {
    20 * 1024 * 1024
}

#[cfg(test)]
mod test {
    use super::SessionParams;

    #[test]
    fn default_params() {
        let params = SessionParams::default();
        assert_eq!(params.idle_secs, 30);
        assert_eq!(params.read_secs, 15);
        assert_eq!(params.write_secs, 15);
        assert_eq!(params.hostname, "localhost");
        assert_eq!(params.banner, "postern");
        assert_eq!(params.max_message_size, 20 * 1024 * 1024);
    }
}

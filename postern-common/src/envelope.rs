use serde::{Deserialize, Serialize};

use crate::address::Address;

/// The envelope of one open mail transaction.
///
/// Only exists between an accepted MAIL command and the end of DATA (or a
/// reset); recipients keep insertion order, duplicates allowed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    reverse_path: Address,
    recipients: Vec<Address>,
}

impl Envelope {
    #[must_use]
    pub fn new(reverse_path: Address) -> Self {
        Self {
            reverse_path,
            recipients: Vec::new(),
        }
    }

    #[must_use]
    pub fn reverse_path(&self) -> &Address {
        &self.reverse_path
    }

    pub fn add_recipient(&mut self, recipient: Address) {
        self.recipients.push(recipient);
    }

    #[must_use]
    pub fn recipients(&self) -> &[Address] {
        &self.recipients
    }

    #[must_use]
    pub fn has_recipients(&self) -> bool {
        !self.recipients.is_empty()
    }
}

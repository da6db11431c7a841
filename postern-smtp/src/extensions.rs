use core::fmt::{self, Display, Formatter};

/// ESMTP keywords advertised in the EHLO reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extension {
    Pipelining,
    EnhancedStatusCodes,
    EightBitMime,
    SmtpUtf8,
    Size(usize),
}

impl Display for Extension {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pipelining => fmt.write_str("PIPELINING"),
            Self::EnhancedStatusCodes => fmt.write_str("ENHANCEDSTATUSCODES"),
            Self::EightBitMime => fmt.write_str("8BITMIME"),
            Self::SmtpUtf8 => fmt.write_str("SMTPUTF8"),
            Self::Size(max) => write!(fmt, "SIZE {max}"),
        }
    }
}

/// The advertised capability set, in the order it goes on the wire.
#[must_use]
pub fn advertised(max_message_size: usize) -> [Extension; 5] {
    [
        Extension::Pipelining,
        Extension::EnhancedStatusCodes,
        Extension::EightBitMime,
        Extension::SmtpUtf8,
        Extension::Size(max_message_size),
    ]
}

use postern_common::status::Status;

/// One line of an SMTP reply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplyLine {
    pub status: Status,
    pub text: String,
}

/// A complete, possibly multiline, SMTP reply.
///
/// Built by a verb handler (or a transaction processor), written once by the
/// session, then discarded. `closing` ends the session after the reply is
/// sent; `pipeline` lets the writer defer its flush while the peer still has
/// commands buffered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reply {
    lines: Vec<ReplyLine>,
    closing: bool,
    pipeline: bool,
}

impl Reply {
    #[must_use]
    pub fn new(status: Status, text: impl Into<String>) -> Self {
        Self {
            lines: vec![ReplyLine {
                status,
                text: text.into(),
            }],
            closing: false,
            pipeline: false,
        }
    }

    /// Append a continuation line.
    #[must_use]
    pub fn line(mut self, status: Status, text: impl Into<String>) -> Self {
        self.lines.push(ReplyLine {
            status,
            text: text.into(),
        });
        self
    }

    /// Close the session once this reply has been sent.
    #[must_use]
    pub fn closing(mut self) -> Self {
        self.closing = true;
        self
    }

    /// Allow the writer to defer its flush when the peer is pipelining.
    #[must_use]
    pub fn pipelined(mut self) -> Self {
        self.pipeline = true;
        self
    }

    #[must_use]
    pub fn lines(&self) -> &[ReplyLine] {
        &self.lines
    }

    /// A reply rejects iff its first line's code is in `[400, 599]`.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.lines
            .first()
            .is_some_and(|line| line.status.is_error())
    }

    #[must_use]
    pub fn is_closing(&self) -> bool {
        self.closing
    }

    #[must_use]
    pub fn can_pipeline(&self) -> bool {
        self.pipeline
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn error_classification_follows_first_line() {
        assert!(!Reply::new(Status::Ok, "fine").is_error());
        assert!(Reply::new(Status::Error, "no").is_error());
        assert!(Reply::new(Status::Unavailable, "later").is_error());
        assert!(!Reply::new(Status::StartMailInput, "go ahead").is_error());

        // continuation lines do not change the verdict
        let mixed = Reply::new(Status::Ok, "fine").line(Status::Error, "odd");
        assert!(!mixed.is_error());
    }

    #[test]
    fn flags_default_off() {
        let reply = Reply::new(Status::Ok, "fine");
        assert!(!reply.is_closing());
        assert!(!reply.can_pipeline());

        let reply = Reply::new(Status::GoodBye, "bye").closing();
        assert!(reply.is_closing());

        let reply = Reply::new(Status::Ok, "fine").pipelined();
        assert!(reply.can_pipeline());
    }
}

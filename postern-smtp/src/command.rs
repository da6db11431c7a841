use core::fmt::{self, Display, Formatter};

/// The SMTP verbs this server answers.
///
/// Lookup is case-insensitive; anything else is an unrecognised command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verb {
    Helo,
    Ehlo,
    Mail,
    Rcpt,
    Data,
    Rset,
    Vrfy,
    Expn,
    Help,
    Noop,
    Quit,
}

const VERBS: &[(&str, Verb)] = &[
    ("HELO", Verb::Helo),
    ("EHLO", Verb::Ehlo),
    ("MAIL", Verb::Mail),
    ("RCPT", Verb::Rcpt),
    ("DATA", Verb::Data),
    ("RSET", Verb::Rset),
    ("VRFY", Verb::Vrfy),
    ("EXPN", Verb::Expn),
    ("HELP", Verb::Help),
    ("NOOP", Verb::Noop),
    ("QUIT", Verb::Quit),
];

impl Verb {
    #[must_use]
    pub fn parse(word: &str) -> Option<Self> {
        VERBS
            .iter()
            .find(|(name, _)| word.eq_ignore_ascii_case(name))
            .map(|&(_, verb)| verb)
    }
}

impl Display for Verb {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        let name = VERBS
            .iter()
            .find(|&&(_, verb)| verb == *self)
            .map_or("", |&(name, _)| name);
        fmt.write_str(name)
    }
}

/// Extract the reverse-path argument of a MAIL command.
///
/// `params` is everything after the verb, e.g. `FROM:<user@example.org>`.
#[must_use]
pub fn mail_argument(params: &str) -> Option<&str> {
    argument(params, "from:")
}

/// Extract the forward-path argument of a RCPT command.
#[must_use]
pub fn rcpt_argument(params: &str) -> Option<&str> {
    argument(params, "to:")
}

/// Tolerant path extraction: the keyword and colon are mandatory, the angle
/// brackets are not (WinCE and friends omit them). With brackets, anything
/// after the closing `>` is ignored; without, the rest of the line is the
/// address.
fn argument<'a>(params: &'a str, keyword: &str) -> Option<&'a str> {
    let head = params.get(..keyword.len())?;
    if !head.eq_ignore_ascii_case(keyword) {
        return None;
    }

    let rest = params[keyword.len()..].trim_start();
    let rest = rest.strip_prefix('<').unwrap_or(rest);
    let end = rest.find(['<', '>']).unwrap_or(rest.len());
    Some(&rest[..end])
}

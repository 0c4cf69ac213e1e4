//! Wire codec for concentrator messages
//!
//! Wire format:
//!
//! ```text
//! TO:VERB:NOUN[:ARG1:ARG2:...]:FROM
//! ```
//!
//! At least 4 fields. First = TO, second = VERB, third = NOUN, last = FROM.
//! Everything between NOUN and FROM is a variable-length list of args.
//!
//! The separator is never escaped. An argument that needs structure of its
//! own must use a different delimiter (`.` or `|`), chosen by the
//! application and not by this codec.
//!
//! ```text
//! VERTEX:LAMP:OFF:LUCH
//! VERTEX:LED:BRIGHT:255:LUCH
//! ACHTUNG:NEW:TIMER:qwe:10s:LUCH
//! LUCH:OK:TIMER:qwe:ACHTUNG
//! ```

use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Primary field separator
pub const SEP: char = ':';

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("bad message (need at least TO:VERB:NOUN:FROM): {0:?}")]
    MalformedFrame(String),
}

#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    pub to: String,
    pub verb: String,
    pub noun: String,
    pub args: Vec<String>,
    pub from: String,
    /// The line this message was parsed from. Empty on constructed messages.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub raw: String,
}

impl Message {
    /// Build an outbound message. `raw` is left empty.
    pub fn new<S: Into<String>>(
        to: impl Into<String>,
        verb: impl Into<String>,
        noun: impl Into<String>,
        args: impl IntoIterator<Item = S>,
        from: impl Into<String>,
    ) -> Self {
        Self {
            to: to.into(),
            verb: verb.into(),
            noun: noun.into(),
            args: args.into_iter().map(Into::into).collect(),
            from: from.into(),
            raw: String::new(),
        }
    }

    /// Decode a raw wire string into a Message.
    ///
    /// The input is kept verbatim in `raw`; trimming is up to the caller.
    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        let parts: Vec<&str> = raw.split(SEP).collect();
        let [to, verb, noun, args @ .., from] = parts.as_slice() else {
            return Err(ParseError::MalformedFrame(raw.to_string()));
        };

        Ok(Self {
            to: (*to).to_string(),
            verb: (*verb).to_string(),
            noun: (*noun).to_string(),
            args: args.iter().map(|a| (*a).to_string()).collect(),
            from: (*from).to_string(),
            raw: raw.to_string(),
        })
    }

    /// Canonical wire encoding of this message's fields.
    pub fn to_wire(&self) -> String {
        encode(&self.to, &self.verb, &self.noun, &self.from, &self.args)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire())
    }
}

impl FromStr for Message {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Build a wire string from individual fields.
///
/// ```
/// let wire = concentrator::encode("ACHTUNG", "NEW", "TIMER", "LUCH", &["qwe", "10s"]);
/// assert_eq!(wire, "ACHTUNG:NEW:TIMER:qwe:10s:LUCH");
/// ```
pub fn encode<S: AsRef<str>>(to: &str, verb: &str, noun: &str, from: &str, args: &[S]) -> String {
    let len = to.len()
        + verb.len()
        + noun.len()
        + from.len()
        + args.iter().map(|a| a.as_ref().len() + 1).sum::<usize>()
        + 3;
    let mut wire = String::with_capacity(len);

    wire.push_str(to);
    wire.push(SEP);
    wire.push_str(verb);
    wire.push(SEP);
    wire.push_str(noun);
    for arg in args {
        wire.push(SEP);
        wire.push_str(arg.as_ref());
    }
    wire.push(SEP);
    wire.push_str(from);
    wire
}

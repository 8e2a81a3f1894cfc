use crate::{Algorithm, Error, Qop, Result};
use std::collections::HashMap;
use std::str::FromStr;

const SCHEME: &str = "Digest";

/// Digest challenge parsed from a `WWW-Authenticate` header value.
///
/// A challenge is good for exactly one authenticated attempt; it is never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    /// Authorization realm
    pub realm: String,
    /// Server nonce
    pub nonce: String,
    /// First quality-of-protection offered by the server, if any.
    /// None means legacy RFC 2069 mode.
    pub qop: Option<Qop>,
    /// Server opaque string, echoed back verbatim
    pub opaque: Option<String>,
    /// Hashing algo (MD5 when the server does not say)
    pub algorithm: Algorithm,
}

impl Challenge {
    /// Parse the value of a `WWW-Authenticate` header, failing with
    /// [`Error::ChallengeMissing`] if there is none.
    pub fn from_header(value: Option<&str>) -> Result<Self> {
        match value {
            Some(v) if !v.trim().is_empty() => Self::parse(v),
            _ => Err(Error::ChallengeMissing),
        }
    }

    /// Construct from the `WWW-Authenticate` header string
    ///
    /// # Errors
    /// `ChallengeIncomplete` if realm or nonce is missing; syntax errors for an unterminated
    /// quote, a non-Digest scheme, or unknown algorithm / qop values.
    pub fn parse(input: &str) -> Result<Self> {
        let input = strip_scheme(input.trim())?;
        let mut kv = parse_header_map(input)?;

        let realm = required(&mut kv, "realm")?;
        let nonce = required(&mut kv, "nonce")?;

        let algorithm = match kv.get("algorithm") {
            Some(a) => Algorithm::from_str(a.trim())?,
            None => Algorithm::default(),
        };

        // always degrade to the first offered option, no negotiation
        let qop = match kv.get("qop").and_then(|q| q.split(',').next()) {
            Some(first) if !first.trim().is_empty() => Some(Qop::from_str(first.trim())?),
            _ => None,
        };

        Ok(Self {
            realm,
            nonce,
            qop,
            opaque: kv.remove("opaque"),
            algorithm,
        })
    }
}

/// An empty directive counts as missing.
fn required(kv: &mut HashMap<String, String>, name: &'static str) -> Result<String> {
    kv.remove(name)
        .filter(|v| !v.is_empty())
        .ok_or(Error::ChallengeIncomplete(name))
}

impl FromStr for Challenge {
    type Err = Error;

    /// Parse HTTP header
    fn from_str(input: &str) -> Result<Self> {
        Self::parse(input)
    }
}

/// Strip the leading auth scheme token. A header without any scheme is accepted as-is,
/// any scheme other than Digest is rejected.
fn strip_scheme(input: &str) -> Result<&str> {
    let first = input.split_whitespace().next().unwrap_or("");
    if first.contains('=') || input[first.len()..].trim_start().starts_with('=') {
        return Ok(input);
    }

    if first.eq_ignore_ascii_case(SCHEME) {
        Ok(&input[first.len()..])
    } else {
        Err(Error::InvalidHeaderSyntax(format!(
            "unsupported auth scheme \"{}\"",
            first
        )))
    }
}

/// Helper func that parses the key-value string received from server.
/// Splits on commas outside of quotes; keys are lowercased.
pub(crate) fn parse_header_map(input: &str) -> Result<HashMap<String, String>> {
    #[derive(Debug)]
    #[allow(non_camel_case_types)]
    enum ParserState {
        P_WHITE,
        P_NAME(usize),
        P_NAME_END(usize, usize),
        P_VALUE_BEGIN,
        P_VALUE_QUOTED,
        P_VALUE_QUOTED_NEXTLITERAL,
        P_VALUE_PLAIN,
    }

    let mut state = ParserState::P_WHITE;

    let mut parsed = HashMap::<String, String>::new();
    let mut current_token = String::new();
    let mut current_value = String::new();

    for (pos, c) in input.char_indices() {
        match state {
            ParserState::P_WHITE => {
                if c.is_alphanumeric() {
                    state = ParserState::P_NAME(pos);
                }
            }
            ParserState::P_NAME(start) => {
                if c == '=' {
                    current_token = input[start..pos].to_ascii_lowercase();
                    state = ParserState::P_VALUE_BEGIN;
                } else if c.is_whitespace() {
                    state = ParserState::P_NAME_END(start, pos);
                } else if c == ',' {
                    // bare token without a value
                    state = ParserState::P_WHITE;
                }
            }
            ParserState::P_NAME_END(start, end) => {
                if c == '=' {
                    current_token = input[start..end].to_ascii_lowercase();
                    state = ParserState::P_VALUE_BEGIN;
                } else if c == ',' {
                    state = ParserState::P_WHITE;
                } else if !c.is_whitespace() {
                    state = ParserState::P_NAME(pos);
                }
            }
            ParserState::P_VALUE_BEGIN => {
                current_value.clear();
                state = match c {
                    '"' => ParserState::P_VALUE_QUOTED,
                    ',' => {
                        parsed.insert(current_token.clone(), String::new());
                        ParserState::P_WHITE
                    }
                    c if c.is_whitespace() => ParserState::P_VALUE_BEGIN,
                    _ => {
                        current_value.push(c);
                        ParserState::P_VALUE_PLAIN
                    }
                };
            }
            ParserState::P_VALUE_QUOTED => {
                match c {
                    '"' => {
                        parsed.insert(current_token.clone(), current_value.clone());
                        current_value.clear();
                        state = ParserState::P_WHITE;
                    }
                    '\\' => {
                        state = ParserState::P_VALUE_QUOTED_NEXTLITERAL;
                    }
                    _ => {
                        current_value.push(c);
                    }
                };
            }
            ParserState::P_VALUE_PLAIN => {
                if c == ',' || c.is_whitespace() {
                    parsed.insert(current_token.clone(), current_value.clone());
                    current_value.clear();
                    state = ParserState::P_WHITE;
                } else {
                    current_value.push(c);
                }
            }
            ParserState::P_VALUE_QUOTED_NEXTLITERAL => {
                current_value.push(c);
                state = ParserState::P_VALUE_QUOTED
            }
        }
    }

    match state {
        ParserState::P_VALUE_PLAIN => {
            parsed.insert(current_token, current_value);
        }
        ParserState::P_VALUE_BEGIN => {
            parsed.insert(current_token, String::new());
        }
        ParserState::P_WHITE | ParserState::P_NAME(_) | ParserState::P_NAME_END(..) => {}
        ParserState::P_VALUE_QUOTED | ParserState::P_VALUE_QUOTED_NEXTLITERAL => {
            return Err(Error::InvalidHeaderSyntax(format!(
                "unterminated quoted value in: {}",
                input
            )))
        }
    }

    Ok(parsed)
}

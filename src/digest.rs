use crate::utils::QuoteForDigest;
use crate::{AlgorithmType, Challenge, Qop};
use http::Method;
use rand::Rng;
use std::fmt;
use std::fmt::{Display, Formatter};

/// The nonce count sent with every response. Nonces are never reused across calls,
/// so the count always starts (and stays) at 1.
pub const NONCE_COUNT: u32 = 1;

/// Hub login. The identity is the hub serial number.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    identity: String,
    secret: String,
}

impl Credentials {
    pub fn new(identity: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            secret: secret.into(),
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("identity", &self.identity)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Client nonce and nonce count for a single authenticated attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientNonce {
    pub cnonce: String,
    pub nc: u32,
}

impl ClientNonce {
    /// Fresh random cnonce
    pub fn generate() -> Self {
        let bytes: [u8; 16] = rand::thread_rng().gen();
        Self::with_cnonce(hex::encode(bytes))
    }

    /// Use a fixed cnonce (tests and reference vectors)
    pub fn with_cnonce(cnonce: impl Into<String>) -> Self {
        Self {
            cnonce: cnonce.into(),
            nc: NONCE_COUNT,
        }
    }
}

/// Login attempt context
///
/// Meaningful only for the one request it was built for.
#[derive(Debug, Clone)]
pub struct AuthContext<'a> {
    pub credentials: &'a Credentials,
    /// Requested URI (path only, no query; should start with a slash)
    pub uri: &'a str,
    /// HTTP method used
    pub method: Method,
    /// Request payload body, hashed only for auth-int
    pub body: Option<&'a [u8]>,
}

impl<'a> AuthContext<'a> {
    /// Context for a GET request without a body
    pub fn new(credentials: &'a Credentials, uri: &'a str) -> Self {
        Self::new_with_method(credentials, uri, Method::GET, None)
    }

    pub fn new_with_method(
        credentials: &'a Credentials,
        uri: &'a str,
        method: Method,
        body: Option<&'a [u8]>,
    ) -> Self {
        Self {
            credentials,
            uri,
            method,
            body,
        }
    }
}

/// Value of the `Authorization` header sent with the authenticated retry.
/// Built once from a challenge, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationHeader {
    pub username: String,
    pub realm: String,
    pub nonce: String,
    pub uri: String,
    /// None in legacy compat mode (RFC 2069)
    pub qop: Option<Qop>,
    /// Present only together with `qop`
    pub client_nonce: Option<ClientNonce>,
    /// Computed digest
    pub response: String,
    pub opaque: Option<String>,
    /// Echoed only when not MD5
    pub algorithm: crate::Algorithm,
}

impl AuthorizationHeader {
    /// Compute the digest response for a challenge.
    ///
    /// ```text
    /// HA1 = H(identity:realm:secret)            [-sess: H(HA1:nonce:cnonce)]
    /// HA2 = H(method:uri)                       [auth-int: H(method:uri:H(body))]
    /// response = H(HA1:nonce:nc:cnonce:qop:HA2) when qop is present
    ///          = H(HA1:nonce:HA2)               otherwise
    /// ```
    pub fn from_challenge(
        challenge: &Challenge,
        context: &AuthContext<'_>,
        client_nonce: ClientNonce,
    ) -> AuthorizationHeader {
        let h = challenge.algorithm;
        let credentials = context.credentials;

        let ha1 = {
            let a1 = format!(
                "{name}:{realm}:{pw}",
                name = credentials.identity,
                realm = challenge.realm,
                pw = credentials.secret
            );
            let ha1 = h.hash_str(&a1);

            if h.sess {
                h.hash_str(&format!(
                    "{ha1}:{nonce}:{cnonce}",
                    ha1 = ha1,
                    nonce = challenge.nonce,
                    cnonce = client_nonce.cnonce
                ))
            } else {
                ha1
            }
        };

        let ha2 = match challenge.qop {
            Some(Qop::AUTH_INT) => h.hash_str(&format!(
                "{method}:{uri}:{bodyhash}",
                method = context.method,
                uri = context.uri,
                bodyhash = h.hash(context.body.unwrap_or_default())
            )),
            _ => h.hash_str(&format!(
                "{method}:{uri}",
                method = context.method,
                uri = context.uri
            )),
        };

        let response = match challenge.qop {
            Some(qop) => h.hash_str(&format!(
                "{ha1}:{nonce}:{nc:08x}:{cnonce}:{qop}:{ha2}",
                ha1 = ha1,
                nonce = challenge.nonce,
                nc = client_nonce.nc,
                cnonce = client_nonce.cnonce,
                qop = qop,
                ha2 = ha2
            )),
            None => h.hash_str(&format!(
                "{ha1}:{nonce}:{ha2}",
                ha1 = ha1,
                nonce = challenge.nonce,
                ha2 = ha2
            )),
        };

        AuthorizationHeader {
            username: credentials.identity.clone(),
            realm: challenge.realm.clone(),
            nonce: challenge.nonce.clone(),
            uri: context.uri.to_owned(),
            qop: challenge.qop,
            client_nonce: challenge.qop.map(|_| client_nonce),
            response,
            opaque: challenge.opaque.clone(),
            algorithm: challenge.algorithm,
        }
    }

    /// Produce a header string (also accessible through the Display trait)
    pub fn to_header_string(&self) -> String {
        self.to_string()
    }
}

impl Challenge {
    /// Answer this challenge with a freshly generated client nonce
    pub fn respond(&self, context: &AuthContext<'_>) -> AuthorizationHeader {
        AuthorizationHeader::from_challenge(self, context, ClientNonce::generate())
    }
}

impl Display for AuthorizationHeader {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "Digest username=\"{}\"", self.username.quote_for_digest())?;
        write!(f, ", realm=\"{}\"", self.realm.quote_for_digest())?;
        write!(f, ", nonce=\"{}\"", self.nonce.quote_for_digest())?;
        write!(f, ", uri=\"{}\"", self.uri)?;

        if let (Some(qop), Some(cn)) = (self.qop, &self.client_nonce) {
            write!(
                f,
                ", qop={qop}, nc={nc:08x}, cnonce=\"{cnonce}\"",
                qop = qop,
                nc = cn.nc,
                cnonce = cn.cnonce.quote_for_digest()
            )?;
        }

        write!(f, ", response=\"{}\"", self.response)?;

        if let Some(opaque) = &self.opaque {
            write!(f, ", opaque=\"{}\"", opaque.quote_for_digest())?;
        }

        if self.algorithm.algo != AlgorithmType::MD5 || self.algorithm.sess {
            write!(f, ", algorithm={}", self.algorithm)?;
        }

        Ok(())
    }
}

//! Hash and qop choices carried by a hub challenge.
//!
//! Hubs ask for plain MD5 without qop. The hash is still read from each challenge, so a
//! server that answers with `SHA-256` or a `-sess` variant (RFC 7616) needs no other code.

use crate::{Error, Error::*, Result};
use std::fmt;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use digest::{Digest, DynDigest};
use md5::Md5;
use sha2::{Sha256, Sha512_256};

/// Hash named by the challenge's `algorithm` directive
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[allow(non_camel_case_types)]
pub enum AlgorithmType {
    MD5,
    SHA2_256,
    SHA2_512_256,
}

/// Hash plus the `-sess` flag, which rehashes HA1 with both nonces
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Algorithm {
    pub algo: AlgorithmType,
    pub sess: bool,
}

impl Algorithm {
    /// Compose from algorithm type and the -sess flag
    pub fn new(algo: AlgorithmType, sess: bool) -> Algorithm {
        Algorithm { algo, sess }
    }

    /// Calculate a hash of bytes using the selected algorithm
    pub fn hash(self, bytes: &[u8]) -> String {
        let mut hash: Box<dyn DynDigest> = match self.algo {
            AlgorithmType::MD5 => Box::new(Md5::new()),
            AlgorithmType::SHA2_256 => Box::new(Sha256::new()),
            AlgorithmType::SHA2_512_256 => Box::new(Sha512_256::new()),
        };

        hash.update(bytes);
        hex::encode(hash.finalize())
    }

    /// Calculate a hash of string's bytes using the selected algorithm
    pub fn hash_str(self, bytes: &str) -> String {
        self.hash(bytes.as_bytes())
    }
}

impl FromStr for Algorithm {
    type Err = Error;

    /// Parse from the format used in WWW-Authenticate. Matching is case-insensitive,
    /// hub firmware has been seen sending `md5`.
    fn from_str(s: &str) -> Result<Self> {
        let cut = s.len().saturating_sub("-sess".len());
        let (name, sess) = match s.get(cut..) {
            Some(tail) if cut > 0 && tail.eq_ignore_ascii_case("-sess") => (&s[..cut], true),
            _ => (s, false),
        };

        let algo = match name.to_ascii_uppercase().as_str() {
            "MD5" => AlgorithmType::MD5,
            "SHA-256" => AlgorithmType::SHA2_256,
            "SHA-512-256" => AlgorithmType::SHA2_512_256,
            _ => return Err(UnknownAlgorithm(s.into())),
        };

        Ok(Algorithm::new(algo, sess))
    }
}

impl Default for Algorithm {
    /// Get a MD5 instance
    fn default() -> Self {
        Algorithm::new(AlgorithmType::MD5, false)
    }
}

impl Display for Algorithm {
    /// Format to the form used in HTTP headers
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(match self.algo {
            AlgorithmType::MD5 => "MD5",
            AlgorithmType::SHA2_256 => "SHA-256",
            AlgorithmType::SHA2_512_256 => "SHA-512-256",
        })?;

        if self.sess {
            f.write_str("-sess")?;
        }

        Ok(())
    }
}

/// QOP field values
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[allow(non_camel_case_types)]
pub enum Qop {
    AUTH,
    AUTH_INT,
}

impl FromStr for Qop {
    type Err = Error;

    /// Parse from "auth" or "auth-int" as used in HTTP headers
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "auth" => Ok(Qop::AUTH),
            "auth-int" => Ok(Qop::AUTH_INT),
            _ => Err(BadQop(s.into())),
        }
    }
}

impl Display for Qop {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Qop::AUTH => "auth",
            Qop::AUTH_INT => "auth-int",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_algorithm_parse() {
        assert_eq!(
            "MD5".parse::<Algorithm>().unwrap(),
            Algorithm::new(AlgorithmType::MD5, false)
        );
        assert_eq!(
            "md5-sess".parse::<Algorithm>().unwrap(),
            Algorithm::new(AlgorithmType::MD5, true)
        );
        assert_eq!(
            "SHA-512-256".parse::<Algorithm>().unwrap(),
            Algorithm::new(AlgorithmType::SHA2_512_256, false)
        );
        assert!(matches!(
            "SHA-1".parse::<Algorithm>(),
            Err(Error::UnknownAlgorithm(_))
        ));
    }

    #[test]
    fn test_algorithm_display() {
        assert_eq!(Algorithm::new(AlgorithmType::SHA2_256, true).to_string(), "SHA-256-sess");
        assert_eq!(Algorithm::default().to_string(), "MD5");
    }

    #[test]
    fn test_hashes() {
        // known empty-input digests
        assert_eq!(Algorithm::default().hash(b""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(
            Algorithm::new(AlgorithmType::SHA2_256, false).hash(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}

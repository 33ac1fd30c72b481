//! Password hashing in the RFC 2307 `{SCHEME}base64` format understood by LDAP servers.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use md5::Md5;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

const SALT_LEN: usize = 8;

/// Turns a clear-text password into the value stored in `userPassword`.
pub trait PasswordHasher {
    /// Hashes `password` and returns the tagged value.
    fn hash_password(&self, password: &str) -> String;
}

/// Supported `userPassword` schemes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PasswordScheme {
    /// `{MD5}`: unsalted MD5 digest.
    #[default]
    Md5,
    /// `{SMD5}`: MD5 digest with a random salt appended.
    Smd5,
    /// `{SHA256}`: unsalted SHA-256 digest.
    Sha256,
    /// `{SSHA256}`: SHA-256 digest with a random salt appended.
    Ssha256,
}

impl PasswordScheme {
    /// Tag prefixed to the encoded digest.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Md5 => "{MD5}",
            Self::Smd5 => "{SMD5}",
            Self::Sha256 => "{SHA256}",
            Self::Ssha256 => "{SSHA256}",
        }
    }

    /// Hashes with an explicit salt. Unsalted schemes ignore it.
    #[must_use]
    pub fn hash_with_salt(self, password: &str, salt: &[u8]) -> String {
        let raw = match self {
            Self::Md5 => Md5::digest(password.as_bytes()).to_vec(),
            Self::Sha256 => Sha256::digest(password.as_bytes()).to_vec(),
            Self::Smd5 => salted::<Md5>(password, salt),
            Self::Ssha256 => salted::<Sha256>(password, salt),
        };
        format!("{}{}", self.tag(), STANDARD.encode(raw))
    }
}

impl PasswordHasher for PasswordScheme {
    fn hash_password(&self, password: &str) -> String {
        let salt: [u8; SALT_LEN] = rand::thread_rng().gen();
        self.hash_with_salt(password, &salt)
    }
}

impl<F> PasswordHasher for F
where
    F: Fn(&str) -> String,
{
    fn hash_password(&self, password: &str) -> String {
        self(password)
    }
}

impl fmt::Display for PasswordScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Md5 => "md5",
            Self::Smd5 => "smd5",
            Self::Sha256 => "sha256",
            Self::Ssha256 => "ssha256",
        })
    }
}

impl FromStr for PasswordScheme {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "md5" => Ok(Self::Md5),
            "smd5" => Ok(Self::Smd5),
            "sha256" => Ok(Self::Sha256),
            "ssha256" => Ok(Self::Ssha256),
            other => Err(Error::ConfigError(format!(
                "unknown password scheme `{other}`"
            ))),
        }
    }
}

fn salted<D: Digest>(password: &str, salt: &[u8]) -> Vec<u8> {
    let mut hasher = D::new();
    hasher.update(password.as_bytes());
    hasher.update(salt);
    let mut out = hasher.finalize().to_vec();
    out.extend_from_slice(salt);
    out
}

//! # adduser-core
//!
//! Shared types for provisioning POSIX accounts in an LDAP directory.
//!
//! ## Modules
//!
//! - [`error`] - Error type, machine codes and exit codes
//! - [`config`] - Settings file model and account defaults
//! - [`password`] - `userPassword` hashing schemes

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod password;

// Re-export commonly used types
pub use config::{AccountDefaults, ConfigFile, TlsMode};
pub use error::{Error, Result};
pub use password::{PasswordHasher, PasswordScheme};

//! Directory access for provisioning POSIX accounts over LDAP.
//!
//! This crate provides distinguished-name primitives, the bound-session capability used by the
//! provisioning workflow, the lookups run before an add, and an in-memory directory for tests.

#![deny(missing_docs)]

mod client;
mod config;
mod dn;
mod entry;
mod filter;
mod lookup;
mod memory;

pub use client::{
    AttributeMap, DirectoryConnector, DirectorySession, LdapConnector, LdapEntry, SearchScope,
};
pub use config::{
    DirectoryConfig, DEFAULT_CONNECTION_TIMEOUT_SECS, DEFAULT_RDN_ATTRIBUTE, DEFAULT_SERVER,
};
pub use dn::{escape_value, DistinguishedName, DistinguishedNameError, RelativeDistinguishedName};
pub use entry::{split_full_name, DirectoryEntry, EntryBuilder, PosixAccount, OBJECT_CLASSES};
pub use filter::{escape_filter_value, Filter};
pub use lookup::{
    account_exists, account_filter, highest_uid_number, next_uid_number, UID_NUMBER_FILTER,
};
pub use memory::{InMemoryDirectory, InMemorySession};

/// Convenient result alias that reuses the core error type.
pub type Result<T> = adduser_core::Result<T>;

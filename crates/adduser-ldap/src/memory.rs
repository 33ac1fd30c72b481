//! In-memory directory used in place of a server in tests and dry runs.
//!
//! Entries are kept in insertion order and every search is a linear scan evaluated with
//! [`Filter`]. Uniqueness of uid numbers is not enforced; adding a DN twice fails the way a
//! server would.

use crate::client::{AttributeMap, DirectoryConnector, DirectorySession, LdapEntry, SearchScope};
use crate::dn::DistinguishedName;
use crate::filter::Filter;
use crate::Result;
use adduser_core::Error;
use secrecy::{ExposeSecret, SecretString};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct State {
    entries: Vec<LdapEntry>,
    adds: usize,
    binds: Vec<String>,
}

/// Shared in-memory directory. Clones see the same entries.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDirectory {
    state: Arc<Mutex<State>>,
    credentials: Option<(String, String)>,
}

impl InMemoryDirectory {
    /// Creates an empty directory accepting any bind.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Only accepts binds as `dn` with `password`.
    #[must_use]
    pub fn with_credentials(mut self, dn: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some((dn.into(), password.into()));
        self
    }

    /// Seeds an entry without counting it as an add.
    pub fn insert(&self, entry: LdapEntry) {
        if let Ok(mut state) = self.state.lock() {
            state.entries.push(entry);
        }
    }

    /// Snapshot of the stored entries.
    #[must_use]
    pub fn entries(&self) -> Vec<LdapEntry> {
        self.state
            .lock()
            .map(|state| state.entries.clone())
            .unwrap_or_default()
    }

    /// Number of add operations that succeeded.
    #[must_use]
    pub fn add_count(&self) -> usize {
        self.state.lock().map(|state| state.adds).unwrap_or_default()
    }

    /// DNs that bound successfully, in order.
    #[must_use]
    pub fn binds(&self) -> Vec<String> {
        self.state
            .lock()
            .map(|state| state.binds.clone())
            .unwrap_or_default()
    }

    /// Opens a session without binding.
    #[must_use]
    pub fn session(&self) -> InMemorySession {
        InMemorySession {
            state: Arc::clone(&self.state),
        }
    }
}

impl DirectoryConnector for InMemoryDirectory {
    fn bind(&self, dn: &str, password: &SecretString) -> Result<Box<dyn DirectorySession>> {
        if let Some((expected_dn, expected_password)) = &self.credentials {
            if !expected_dn.eq_ignore_ascii_case(dn) || expected_password != password.expose_secret()
            {
                return Err(Error::AuthError(format!("invalid credentials for `{dn}`")));
            }
        }
        lock(&self.state)?.binds.push(dn.to_string());
        Ok(Box::new(self.session()))
    }
}

/// Session on an [`InMemoryDirectory`].
#[derive(Debug)]
pub struct InMemorySession {
    state: Arc<Mutex<State>>,
}

impl DirectorySession for InMemorySession {
    fn search(
        &mut self,
        base_dn: &str,
        scope: SearchScope,
        filter: &str,
        _attributes: &[&'static str],
    ) -> Result<Vec<LdapEntry>> {
        let base = DistinguishedName::parse(base_dn).map_err(Error::directory)?;
        let filter = Filter::parse(filter)?;
        let state = lock(&self.state)?;

        Ok(state
            .entries
            .iter()
            .filter(|entry| in_scope(&entry.dn, &base, scope))
            .filter(|entry| filter.matches(entry))
            .cloned()
            .collect())
    }

    fn add(&mut self, dn: &str, attributes: &AttributeMap) -> Result<()> {
        let parsed = DistinguishedName::parse(dn).map_err(Error::directory)?;
        let mut state = lock(&self.state)?;

        let duplicate = state.entries.iter().any(|entry| {
            DistinguishedName::parse(&entry.dn).is_ok_and(|existing| {
                existing.depth() == parsed.depth() && existing.is_within(&parsed)
            })
        });
        if duplicate {
            return Err(Error::directory(format!("entryAlreadyExists: {dn}")));
        }

        let entry = attributes
            .iter()
            .fold(LdapEntry::new(parsed.as_str()), |entry, (name, values)| {
                entry.with_attribute(name.as_str(), values.iter().map(String::as_str))
            });
        state.entries.push(entry);
        state.adds += 1;
        Ok(())
    }

    fn unbind(&mut self) -> Result<()> {
        Ok(())
    }
}

fn lock(state: &Mutex<State>) -> Result<MutexGuard<'_, State>> {
    state
        .lock()
        .map_err(|_| Error::InternalError("in-memory directory lock poisoned".to_string()))
}

fn in_scope(dn: &str, base: &DistinguishedName, scope: SearchScope) -> bool {
    let Ok(dn) = DistinguishedName::parse(dn) else {
        return false;
    };
    if !dn.is_within(base) {
        return false;
    }
    match scope {
        SearchScope::Base => dn.depth() == base.depth(),
        SearchScope::OneLevel => dn.depth() == base.depth() + 1,
        SearchScope::Subtree => true,
    }
}

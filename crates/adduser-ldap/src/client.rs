//! Directory access capability and its `ldap3` implementation.

use crate::{config::DirectoryConfig, Result};
use adduser_core::{Error, TlsMode};
use ldap3::{LdapConn, LdapConnSettings, Scope, SearchEntry};
use native_tls::{Certificate, TlsConnector};
use secrecy::{ExposeSecret, SecretString};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use tracing::debug;

/// Attribute map written by an add operation, keyed by attribute name.
pub type AttributeMap = BTreeMap<String, Vec<String>>;

/// Represents the search scope for LDAP queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    /// Base object only.
    Base,
    /// One level below the base.
    OneLevel,
    /// Entire subtree.
    Subtree,
}

impl From<SearchScope> for Scope {
    fn from(scope: SearchScope) -> Self {
        match scope {
            SearchScope::Base => Scope::Base,
            SearchScope::OneLevel => Scope::OneLevel,
            SearchScope::Subtree => Scope::Subtree,
        }
    }
}

/// LDAP entry returned by a search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LdapEntry {
    /// Distinguished name of the entry.
    pub dn: String,
    /// Attribute map (values preserved order from server).
    pub attributes: HashMap<String, Vec<String>>,
}

impl LdapEntry {
    /// Creates an entry without attributes.
    #[must_use]
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attributes: HashMap::new(),
        }
    }

    /// Appends values to an attribute.
    #[must_use]
    pub fn with_attribute<I, V>(mut self, attribute: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.attributes
            .entry(attribute.into())
            .or_default()
            .extend(values.into_iter().map(Into::into));
        self
    }

    /// Returns all values for the attribute.
    ///
    /// Attribute names are case-insensitive in LDAP; an exact match is preferred.
    #[must_use]
    pub fn values(&self, attribute: &str) -> Option<&[String]> {
        self.attributes
            .get(attribute)
            .or_else(|| {
                self.attributes
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(attribute))
                    .map(|(_, values)| values)
            })
            .map(Vec::as_slice)
    }

    /// Returns the first value of the attribute if present.
    #[must_use]
    pub fn first(&self, attribute: &str) -> Option<&str> {
        self.values(attribute)
            .and_then(|values| values.first().map(String::as_str))
    }
}

impl From<SearchEntry> for LdapEntry {
    fn from(entry: SearchEntry) -> Self {
        Self {
            dn: entry.dn,
            attributes: entry.attrs,
        }
    }
}

/// Operations available on a bound directory connection.
#[cfg_attr(test, mockall::automock)]
pub trait DirectorySession {
    /// Searches below `base_dn` and collects every returned entry.
    fn search(
        &mut self,
        base_dn: &str,
        scope: SearchScope,
        filter: &str,
        attributes: &[&'static str],
    ) -> Result<Vec<LdapEntry>>;

    /// Creates the entry `dn` with `attributes`.
    fn add(&mut self, dn: &str, attributes: &AttributeMap) -> Result<()>;

    /// Ends the session.
    fn unbind(&mut self) -> Result<()>;
}

/// Opens bound sessions. Binding is the only way to obtain a [`DirectorySession`].
#[cfg_attr(test, mockall::automock)]
pub trait DirectoryConnector {
    /// Connects and binds as `dn`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AuthError`] when the server rejects the credentials and
    /// [`Error::DirectoryError`] for transport failures.
    fn bind(&self, dn: &str, password: &SecretString) -> Result<Box<dyn DirectorySession>>;
}

/// Real LDAP connector backed by `ldap3`.
#[derive(Debug, Clone)]
pub struct LdapConnector {
    config: DirectoryConfig,
}

impl LdapConnector {
    /// Creates a new connector instance.
    #[must_use]
    pub fn new(config: DirectoryConfig) -> Self {
        Self { config }
    }

}

impl DirectoryConnector for LdapConnector {
    fn bind(&self, dn: &str, password: &SecretString) -> Result<Box<dyn DirectorySession>> {
        let settings = build_ldap_settings(&self.config)?;
        let url = self.config.url();
        debug!(%url, bind_dn = dn, "connecting to directory");

        let mut conn = LdapConn::with_settings(settings, &url).map_err(map_ldap_error)?;
        let result = conn
            .simple_bind(dn, password.expose_secret())
            .map_err(map_ldap_error)?;
        if result.rc != 0 {
            return Err(Error::AuthError(format!(
                "bind as `{dn}` rejected (rc={}): {}",
                result.rc, result.text
            )));
        }

        Ok(Box::new(LdapSession { inner: conn }))
    }
}

struct LdapSession {
    inner: LdapConn,
}

impl DirectorySession for LdapSession {
    fn search(
        &mut self,
        base_dn: &str,
        scope: SearchScope,
        filter: &str,
        attributes: &[&'static str],
    ) -> Result<Vec<LdapEntry>> {
        debug!(base_dn, filter, "searching directory");
        let (entries, _) = self
            .inner
            .search(base_dn, scope.into(), filter, attributes.to_vec())
            .map_err(map_ldap_error)?
            .success()
            .map_err(map_ldap_error)?;
        Ok(entries
            .into_iter()
            .map(SearchEntry::construct)
            .map(LdapEntry::from)
            .collect())
    }

    fn add(&mut self, dn: &str, attributes: &AttributeMap) -> Result<()> {
        let attrs = attributes
            .iter()
            .map(|(name, values)| {
                (
                    name.as_str(),
                    values.iter().map(String::as_str).collect::<HashSet<_>>(),
                )
            })
            .collect::<Vec<_>>();

        self.inner
            .add(dn, attrs)
            .map_err(map_ldap_error)?
            .success()
            .map_err(map_ldap_error)?;
        Ok(())
    }

    fn unbind(&mut self) -> Result<()> {
        self.inner.unbind().map_err(map_ldap_error)
    }
}

fn build_ldap_settings(config: &DirectoryConfig) -> Result<LdapConnSettings> {
    let mut settings = LdapConnSettings::new()
        .set_conn_timeout(config.connection_timeout())
        .set_starttls(config.tls() == TlsMode::StartTls);

    if !config.tls_verify() {
        let connector = TlsConnector::builder()
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|err| {
                Error::ConfigError(format!("failed to construct TLS connector: {err}"))
            })?;
        settings = settings.set_connector(connector).set_no_tls_verify(true);
    } else if let Some(cert_path) = config.tls_ca_cert() {
        let pem = fs::read(cert_path).map_err(|err| {
            Error::ConfigError(format!(
                "failed to read CA certificate {}: {err}",
                cert_path.display()
            ))
        })?;
        let certificate = Certificate::from_pem(&pem)
            .map_err(|err| Error::ConfigError(format!("invalid CA certificate: {err}")))?;
        let connector = TlsConnector::builder()
            .add_root_certificate(certificate)
            .build()
            .map_err(|err| Error::ConfigError(format!("failed to load CA certificate: {err}")))?;
        settings = settings.set_connector(connector);
    }

    Ok(settings)
}

fn map_ldap_error(err: ldap3::LdapError) -> Error {
    Error::directory(err)
}

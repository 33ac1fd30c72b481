//! Configuration for the directory connection.

use crate::{dn::DistinguishedName, dn::RelativeDistinguishedName, Result};
use adduser_core::{ConfigFile, Error, TlsMode};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Default connection timeout (seconds).
pub const DEFAULT_CONNECTION_TIMEOUT_SECS: u64 = 10;
/// Default directory host.
pub const DEFAULT_SERVER: &str = "localhost";
/// Default naming attribute for account entries.
pub const DEFAULT_RDN_ATTRIBUTE: &str = "uid";

/// Fully resolved directory connection settings.
#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    server: String,
    port: Option<u16>,
    tls: TlsMode,
    base_dn: DistinguishedName,
    bind_dn: Option<String>,
    rdn_attribute: String,
    tls_verify: bool,
    tls_ca_cert: Option<PathBuf>,
    connection_timeout_secs: u64,
}

impl DirectoryConfig {
    /// Creates a configuration for `server` with accounts under `base_dn`.
    #[must_use]
    pub fn new(server: impl Into<String>, base_dn: DistinguishedName) -> Self {
        Self {
            server: server.into(),
            port: None,
            tls: TlsMode::None,
            base_dn,
            bind_dn: None,
            rdn_attribute: DEFAULT_RDN_ATTRIBUTE.to_string(),
            tls_verify: true,
            tls_ca_cert: None,
            connection_timeout_secs: DEFAULT_CONNECTION_TIMEOUT_SECS,
        }
    }

    /// Resolves merged settings into a connection configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] when no base DN is configured, a DN does not parse, or the
    /// server/port pair does not form a valid URL.
    pub fn from_settings(settings: &ConfigFile) -> Result<Self> {
        let base_dn = settings
            .basedn
            .as_deref()
            .ok_or_else(|| Error::ConfigError("You must specify a basedn!".to_string()))?;
        let base_dn = DistinguishedName::parse(base_dn)?;

        let mut config = Self::new(
            settings.server.as_deref().unwrap_or(DEFAULT_SERVER),
            base_dn,
        )
        .with_tls(settings.tls_mode());

        if let Some(port) = settings.port {
            config = config.with_port(port);
        }
        if let Some(bind_dn) = &settings.binddn {
            DistinguishedName::parse(bind_dn)?;
            config = config.with_bind_dn(bind_dn.clone());
        }
        if let Some(rdn) = &settings.rdn {
            config = config.with_rdn_attribute(rdn.clone());
        }
        if let Some(verify) = settings.tls_verify {
            config = config.with_tls_verification(verify);
        }
        if let Some(path) = &settings.tls_ca_cert {
            config = config.with_tls_ca_cert(path.clone());
        }
        if let Some(seconds) = settings.connection_timeout_secs {
            config = config.with_connection_timeout_secs(seconds);
        }

        Url::parse(&config.url())?;
        Ok(config)
    }

    /// Returns the `ldap://` or `ldaps://` endpoint.
    #[must_use]
    pub fn url(&self) -> String {
        let scheme = match self.tls {
            TlsMode::Ssl => "ldaps",
            TlsMode::None | TlsMode::StartTls => "ldap",
        };
        format!("{scheme}://{}:{}", self.server, self.port())
    }

    /// Returns the server host.
    #[must_use]
    pub fn server(&self) -> &str {
        &self.server
    }

    /// Returns the configured port or the default for the TLS mode.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.tls.default_port())
    }

    /// Returns the TLS mode.
    #[must_use]
    pub const fn tls(&self) -> TlsMode {
        self.tls
    }

    /// Returns the base distinguished name.
    #[must_use]
    pub const fn base_dn(&self) -> &DistinguishedName {
        &self.base_dn
    }

    /// Returns the naming attribute of account entries.
    #[must_use]
    pub fn rdn_attribute(&self) -> &str {
        &self.rdn_attribute
    }

    /// Returns the explicitly configured bind DN.
    #[must_use]
    pub fn bind_dn(&self) -> Option<&str> {
        self.bind_dn.as_deref()
    }

    /// Returns the DN to bind as.
    ///
    /// Without an explicit bind DN the operator is assumed to live under the base DN:
    /// `<rdn>=<login>,<base>`.
    #[must_use]
    pub fn bind_dn_for(&self, login: &str) -> String {
        self.bind_dn.clone().unwrap_or_else(|| {
            self.base_dn
                .child(RelativeDistinguishedName::new(&self.rdn_attribute, login))
                .to_string()
        })
    }

    /// Returns whether TLS certificate verification is enabled.
    #[must_use]
    pub const fn tls_verify(&self) -> bool {
        self.tls_verify
    }

    /// Optional custom CA certificate path.
    #[must_use]
    pub fn tls_ca_cert(&self) -> Option<&PathBuf> {
        self.tls_ca_cert.as_ref()
    }

    /// Returns the connection timeout duration.
    #[must_use]
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }

    /// Overrides the port.
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the TLS mode.
    #[must_use]
    pub const fn with_tls(mut self, tls: TlsMode) -> Self {
        self.tls = tls;
        self
    }

    /// Sets an explicit bind DN.
    #[must_use]
    pub fn with_bind_dn(mut self, dn: impl Into<String>) -> Self {
        self.bind_dn = Some(dn.into());
        self
    }

    /// Overrides the naming attribute.
    #[must_use]
    pub fn with_rdn_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.rdn_attribute = attribute.into();
        self
    }

    /// Enables or disables TLS certificate verification.
    #[must_use]
    pub const fn with_tls_verification(mut self, verify: bool) -> Self {
        self.tls_verify = verify;
        self
    }

    /// Sets the custom CA certificate path for TLS verification.
    #[must_use]
    pub fn with_tls_ca_cert(mut self, path: PathBuf) -> Self {
        self.tls_ca_cert = Some(path);
        self
    }

    /// Overrides the connection timeout in seconds.
    #[must_use]
    pub const fn with_connection_timeout_secs(mut self, seconds: u64) -> Self {
        self.connection_timeout_secs = seconds;
        self
    }
}

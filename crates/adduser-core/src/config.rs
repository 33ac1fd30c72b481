//! Settings file model.
//!
//! Settings come from a YAML file and from command-line flags. Both sources are represented by
//! [`ConfigFile`], where every field is optional; [`ConfigFile::merge`] lays the flag values over
//! the file values before the directory configuration is resolved.

use crate::password::PasswordScheme;
use crate::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use validator::Validate;

/// Default location of the shell allow-list.
pub const DEFAULT_SHELLS_FILE: &str = "/etc/shells";

/// Transport security used for the directory connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TlsMode {
    /// Plain LDAP.
    #[default]
    None,
    /// Plain LDAP upgraded with the StartTLS extended operation.
    StartTls,
    /// LDAP over TLS (`ldaps://`).
    Ssl,
}

impl TlsMode {
    /// Port used when none is configured.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::Ssl => 636,
            Self::None | Self::StartTls => 389,
        }
    }
}

impl fmt::Display for TlsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::StartTls => "starttls",
            Self::Ssl => "ssl",
        })
    }
}

impl FromStr for TlsMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "starttls" => Ok(Self::StartTls),
            "ssl" => Ok(Self::Ssl),
            other => Err(Error::ConfigError(format!("unknown TLS mode `{other}`"))),
        }
    }
}

/// Settings as read from the YAML file or collected from flags.
///
/// Keys not listed here are ignored, so files written for other tools (group settings, for
/// instance) still load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ConfigFile {
    /// Directory server host name
    #[validate(length(min = 1))]
    pub server: Option<String>,

    /// Directory server port
    #[validate(range(min = 1))]
    pub port: Option<u16>,

    /// Transport security mode
    pub tls: Option<TlsMode>,

    /// Older `ssl` switch, used when `tls` is absent
    #[serde(deserialize_with = "bool_or_string")]
    pub ssl: Option<bool>,

    /// Older `starttls` switch, used when `tls` is absent
    #[serde(deserialize_with = "bool_or_string")]
    pub starttls: Option<bool>,

    /// Base DN under which accounts are searched and created
    pub basedn: Option<String>,

    /// DN used for the bind
    pub binddn: Option<String>,

    /// Naming attribute of account entries
    #[validate(length(min = 1))]
    pub rdn: Option<String>,

    /// Base path that home directories are derived from
    pub homedir_base: Option<PathBuf>,

    /// Group id used when none is given
    #[serde(deserialize_with = "number_or_string")]
    pub gidnumber_default: Option<u32>,

    /// Shell pre-selected in the shell menu
    pub loginshell_default: Option<String>,

    /// Scheme used to hash new passwords
    pub password_scheme: Option<PasswordScheme>,

    /// Shell allow-list location
    pub shells_file: Option<PathBuf>,

    /// Whether TLS certificates are verified
    pub tls_verify: Option<bool>,

    /// Custom CA certificate for TLS verification
    pub tls_ca_cert: Option<PathBuf>,

    /// Connection timeout in seconds
    #[validate(range(min = 1, max = 300))]
    pub connection_timeout_secs: Option<u64>,
}

impl ConfigFile {
    /// Parses settings from YAML text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if the text is not valid YAML for this structure or a value
    /// is out of range.
    pub fn from_yaml(text: &str) -> Result<Self> {
        // An empty document deserializes to unit, not to a mapping.
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads settings from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|err| {
            Error::ConfigError(format!("failed to read {}: {err}", path.display()))
        })?;
        Self::from_yaml(&text)
    }

    /// Returns `self` with every value present in `overrides` replacing its own.
    #[must_use]
    pub fn merge(self, overrides: Self) -> Self {
        Self {
            server: overrides.server.or(self.server),
            port: overrides.port.or(self.port),
            tls: overrides.tls.or(self.tls),
            ssl: overrides.ssl.or(self.ssl),
            starttls: overrides.starttls.or(self.starttls),
            basedn: overrides.basedn.or(self.basedn),
            binddn: overrides.binddn.or(self.binddn),
            rdn: overrides.rdn.or(self.rdn),
            homedir_base: overrides.homedir_base.or(self.homedir_base),
            gidnumber_default: overrides.gidnumber_default.or(self.gidnumber_default),
            loginshell_default: overrides.loginshell_default.or(self.loginshell_default),
            password_scheme: overrides.password_scheme.or(self.password_scheme),
            shells_file: overrides.shells_file.or(self.shells_file),
            tls_verify: overrides.tls_verify.or(self.tls_verify),
            tls_ca_cert: overrides.tls_ca_cert.or(self.tls_ca_cert),
            connection_timeout_secs: overrides
                .connection_timeout_secs
                .or(self.connection_timeout_secs),
        }
    }

    /// Resolves the transport security mode.
    ///
    /// An explicit `tls` wins. Otherwise `ssl` selects LDAPS, upgraded with StartTLS instead when
    /// `starttls` is also set, and `starttls` alone selects StartTLS.
    #[must_use]
    pub fn tls_mode(&self) -> TlsMode {
        if let Some(tls) = self.tls {
            return tls;
        }
        match (self.ssl.unwrap_or(false), self.starttls.unwrap_or(false)) {
            (_, true) => TlsMode::StartTls,
            (true, false) => TlsMode::Ssl,
            (false, false) => TlsMode::None,
        }
    }

    /// Extracts the account defaults.
    #[must_use]
    pub fn account_defaults(&self) -> AccountDefaults {
        AccountDefaults {
            homedir_base: self.homedir_base.clone(),
            gid_number: self.gidnumber_default,
            login_shell: self.loginshell_default.clone(),
        }
    }

    /// Returns the configured password scheme or the default one.
    #[must_use]
    pub fn password_scheme(&self) -> PasswordScheme {
        self.password_scheme.unwrap_or_default()
    }

    /// Returns the shell allow-list location.
    #[must_use]
    pub fn shells_file(&self) -> PathBuf {
        self.shells_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SHELLS_FILE))
    }
}

/// Values used for account attributes the operator did not supply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountDefaults {
    /// Home directories are `<homedir_base>/<login>` when set.
    pub homedir_base: Option<PathBuf>,
    /// Group id assigned without prompting when set.
    pub gid_number: Option<u32>,
    /// Shell pre-selected in the shell menu.
    pub login_shell: Option<String>,
}

impl AccountDefaults {
    /// Derives the home directory for `login`, if a base path is configured.
    #[must_use]
    pub fn home_directory_for(&self, login: &str) -> Option<PathBuf> {
        self.homedir_base.as_ref().map(|base| base.join(login))
    }
}

// Older settings files quote numeric values.
fn number_or_string<'de, D>(deserializer: D) -> std::result::Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u32),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Number(value)) => Ok(Some(value)),
        Some(Raw::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("`{text}` is not a group id"))),
    }
}

// Older settings files quote booleans too.
fn bool_or_string<'de, D>(deserializer: D) -> std::result::Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Flag(bool),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Flag(value)) => Ok(Some(value)),
        Some(Raw::Text(text)) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" => Ok(Some(true)),
            "false" | "no" | "off" | "" => Ok(Some(false)),
            _ => Err(serde::de::Error::custom(format!("`{text}` is not a boolean"))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
server: ldap.example.com
port: 10389
basedn: ou=People,dc=example,dc=com
tls: starttls
gidnumber_default: "30000"
loginshell_default: /bin/bash
homedir_base: /var/rhome/
rdn: uid
add_group: "true"
groupdn: ou=Groups,dc=example,dc=com
"#;

    #[test]
    fn parses_sample_file() {
        let config = ConfigFile::from_yaml(SAMPLE).unwrap();
        assert_eq!(config.server.as_deref(), Some("ldap.example.com"));
        assert_eq!(config.port, Some(10389));
        assert_eq!(config.tls, Some(TlsMode::StartTls));
        assert_eq!(config.gidnumber_default, Some(30000));
        assert_eq!(
            config.basedn.as_deref(),
            Some("ou=People,dc=example,dc=com")
        );
        assert_eq!(config.password_scheme(), PasswordScheme::Md5);
    }

    // Settings written for the earlier tool, unchanged.
    const LEGACY: &str = r#"
server: ldap.odd-e.com
port: 10389
basedn: ou=People,dc=odd-e,dc=com
ssl: "true"
starttls: "false"
gidnumber_default: "30000"
loginshell_default: /bin/bash
homedir_base: /var/rhome/
rdn: uid
add_group: "true"
groupdn: ou=Groups,dc=odd-e,dc=com
"#;

    #[test]
    fn legacy_tls_switches_select_mode() {
        let config = ConfigFile::from_yaml(LEGACY).unwrap();
        assert_eq!(config.ssl, Some(true));
        assert_eq!(config.starttls, Some(false));
        assert_eq!(config.tls, None);
        assert_eq!(config.tls_mode(), TlsMode::Ssl);
        assert_eq!(config.port, Some(10389));
        assert_eq!(config.gidnumber_default, Some(30000));

        let both = ConfigFile::from_yaml("ssl: true\nstarttls: \"true\"\n").unwrap();
        assert_eq!(both.tls_mode(), TlsMode::StartTls);

        let plain = ConfigFile::from_yaml("ssl: \"False\"\n").unwrap();
        assert_eq!(plain.tls_mode(), TlsMode::None);
        assert_eq!(ConfigFile::default().tls_mode(), TlsMode::None);
    }

    #[test]
    fn explicit_tls_beats_legacy_switches() {
        let config = ConfigFile::from_yaml("tls: none\nssl: \"true\"\n").unwrap();
        assert_eq!(config.tls_mode(), TlsMode::None);

        let flags = ConfigFile {
            tls: Some(TlsMode::StartTls),
            ..ConfigFile::default()
        };
        let merged = ConfigFile::from_yaml(LEGACY).unwrap().merge(flags);
        assert_eq!(merged.tls_mode(), TlsMode::StartTls);
    }

    #[test]
    fn rejects_unknown_boolean_text() {
        let err = ConfigFile::from_yaml("ssl: maybe\n").unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[test]
    fn empty_file_is_default() {
        assert_eq!(ConfigFile::from_yaml("\n").unwrap(), ConfigFile::default());
    }

    #[test]
    fn rejects_out_of_range_values() {
        let err = ConfigFile::from_yaml("port: 0\n").unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));

        let err = ConfigFile::from_yaml("gidnumber_default: staff\n").unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[test]
    fn overrides_win_over_file_values() {
        let file = ConfigFile::from_yaml(SAMPLE).unwrap();
        let flags = ConfigFile {
            server: Some("ldap2.example.com".to_string()),
            gidnumber_default: Some(100),
            ..ConfigFile::default()
        };

        let merged = file.merge(flags);
        assert_eq!(merged.server.as_deref(), Some("ldap2.example.com"));
        assert_eq!(merged.gidnumber_default, Some(100));
        assert_eq!(merged.port, Some(10389));
        assert_eq!(merged.rdn.as_deref(), Some("uid"));
    }

    #[test]
    fn home_directory_joins_login() {
        let defaults = ConfigFile::from_yaml(SAMPLE).unwrap().account_defaults();
        assert_eq!(
            defaults.home_directory_for("test_user"),
            Some(PathBuf::from("/var/rhome/test_user"))
        );
        assert_eq!(AccountDefaults::default().home_directory_for("x"), None);
    }

    #[test]
    fn tls_mode_parsing() {
        assert_eq!("SSL".parse::<TlsMode>().unwrap(), TlsMode::Ssl);
        assert_eq!(TlsMode::Ssl.default_port(), 636);
        assert_eq!(TlsMode::StartTls.default_port(), 389);
        assert!("tls13".parse::<TlsMode>().is_err());
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("adduser.yml");
        fs::write(&path, "basedn: dc=example,dc=com\n").unwrap();

        let config = ConfigFile::load(&path).unwrap();
        assert_eq!(config.basedn.as_deref(), Some("dc=example,dc=com"));

        let missing = ConfigFile::load(&dir.path().join("missing.yml")).unwrap_err();
        assert!(matches!(missing, Error::ConfigError(_)));
    }
}

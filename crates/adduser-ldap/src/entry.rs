//! Mapping a resolved account onto a new directory entry.

use crate::client::AttributeMap;
use crate::config::DirectoryConfig;
use crate::dn::{DistinguishedName, RelativeDistinguishedName};
use crate::Result;
use adduser_core::Error;
use std::fmt;

/// Object classes of every account entry.
pub const OBJECT_CLASSES: [&str; 3] = ["posixAccount", "top", "inetOrgPerson"];

/// Account with every attribute resolved.
#[derive(Clone, PartialEq, Eq)]
pub struct PosixAccount {
    /// Login name.
    pub login: String,
    /// Full name, "Given Surname".
    pub full_name: String,
    /// Numeric user id.
    pub uid_number: u32,
    /// Numeric primary group id.
    pub gid_number: u32,
    /// Home directory path.
    pub home_directory: String,
    /// Login shell path.
    pub login_shell: String,
    /// Hashed `userPassword` value.
    pub password_hash: String,
}

impl fmt::Debug for PosixAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PosixAccount")
            .field("login", &self.login)
            .field("full_name", &self.full_name)
            .field("uid_number", &self.uid_number)
            .field("gid_number", &self.gid_number)
            .field("home_directory", &self.home_directory)
            .field("login_shell", &self.login_shell)
            .field("password_hash", &"[REDACTED]")
            .finish()
    }
}

/// Entry ready to be added to the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// Distinguished name of the new entry.
    pub dn: DistinguishedName,
    /// Attributes written by the add.
    pub attributes: AttributeMap,
}

impl DirectoryEntry {
    /// First value of `attribute`.
    #[must_use]
    pub fn first(&self, attribute: &str) -> Option<&str> {
        self.attributes
            .get(attribute)
            .and_then(|values| values.first())
            .map(String::as_str)
    }
}

/// Splits a full name on its first whitespace run into given name and surname.
///
/// Returns `None` unless both parts are non-empty.
#[must_use]
pub fn split_full_name(full_name: &str) -> Option<(&str, &str)> {
    let trimmed = full_name.trim();
    let idx = trimmed.find(char::is_whitespace)?;
    let (given, rest) = trimmed.split_at(idx);
    let surname = rest.trim_start();
    (!given.is_empty() && !surname.is_empty()).then_some((given, surname))
}

/// Builds account entries below a base DN.
#[derive(Debug, Clone)]
pub struct EntryBuilder {
    rdn_attribute: String,
    base_dn: DistinguishedName,
}

impl EntryBuilder {
    /// Creates a builder naming entries `<rdn_attribute>=<login>,<base_dn>`.
    #[must_use]
    pub fn new(rdn_attribute: impl Into<String>, base_dn: DistinguishedName) -> Self {
        Self {
            rdn_attribute: rdn_attribute.into(),
            base_dn,
        }
    }

    /// Creates a builder from the directory configuration.
    #[must_use]
    pub fn from_config(config: &DirectoryConfig) -> Self {
        Self::new(config.rdn_attribute(), config.base_dn().clone())
    }

    /// Naming attribute.
    #[must_use]
    pub fn rdn_attribute(&self) -> &str {
        &self.rdn_attribute
    }

    /// Base DN entries are created under.
    #[must_use]
    pub const fn base_dn(&self) -> &DistinguishedName {
        &self.base_dn
    }

    /// DN of the entry for `login`.
    #[must_use]
    pub fn dn_for(&self, login: &str) -> DistinguishedName {
        self.base_dn
            .child(RelativeDistinguishedName::new(&self.rdn_attribute, login))
    }

    /// Builds the entry for `account`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ValidationError`] when the full name does not split into a given name
    /// and a surname.
    pub fn build(&self, account: &PosixAccount) -> Result<DirectoryEntry> {
        let full_name = account.full_name.trim();
        let (given_name, surname) = split_full_name(full_name).ok_or_else(|| {
            Error::ValidationError(format!(
                "full name `{full_name}` must be \"First Last\""
            ))
        })?;

        let mut attributes = AttributeMap::new();
        let mut set = |name: &str, value: &str| {
            attributes.insert(name.to_string(), vec![value.to_string()]);
        };
        set("uid", &account.login);
        set("sn", surname);
        set("givenname", given_name);
        set("cn", full_name);
        set("loginshell", &account.login_shell);
        set("uidnumber", &account.uid_number.to_string());
        set("gidnumber", &account.gid_number.to_string());
        set("gecos", full_name);
        set("homedirectory", &account.home_directory);
        set("userpassword", &account.password_hash);
        attributes.insert(
            "objectclass".to_string(),
            OBJECT_CLASSES.iter().map(ToString::to_string).collect(),
        );

        // The naming value must be present in the entry itself.
        let naming = attributes
            .entry(self.rdn_attribute.to_ascii_lowercase())
            .or_default();
        if !naming.contains(&account.login) {
            naming.push(account.login.clone());
        }

        Ok(DirectoryEntry {
            dn: self.dn_for(&account.login),
            attributes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder(rdn: &str) -> EntryBuilder {
        EntryBuilder::new(
            rdn,
            DistinguishedName::parse("ou=People,dc=example,dc=com").unwrap(),
        )
    }

    fn account() -> PosixAccount {
        PosixAccount {
            login: "test_user".to_string(),
            full_name: "Test User".to_string(),
            uid_number: 5001,
            gid_number: 30000,
            home_directory: "/var/rhome/test_user".to_string(),
            login_shell: "/bin/bash".to_string(),
            password_hash: "{MD5}Gh3JHJBzJcaScd3wyUS8cg==".to_string(),
        }
    }

    #[test]
    fn splits_on_first_whitespace_run() {
        assert_eq!(split_full_name("Test User"), Some(("Test", "User")));
        assert_eq!(split_full_name("  Mary\tAnn  Smith "), Some(("Mary", "Ann  Smith")));
        assert_eq!(split_full_name("Cher"), None);
        assert_eq!(split_full_name("   "), None);
    }

    #[test]
    fn builds_posix_account_entry() {
        let entry = builder("uid").build(&account()).unwrap();

        assert_eq!(
            entry.dn.as_str(),
            "uid=test_user,ou=People,dc=example,dc=com"
        );
        assert_eq!(entry.first("uid"), Some("test_user"));
        assert_eq!(entry.first("givenname"), Some("Test"));
        assert_eq!(entry.first("sn"), Some("User"));
        assert_eq!(entry.first("cn"), Some("Test User"));
        assert_eq!(entry.first("gecos"), Some("Test User"));
        assert_eq!(entry.first("uidnumber"), Some("5001"));
        assert_eq!(entry.first("gidnumber"), Some("30000"));
        assert_eq!(entry.first("homedirectory"), Some("/var/rhome/test_user"));
        assert_eq!(entry.first("loginshell"), Some("/bin/bash"));
        assert_eq!(
            entry.first("userpassword"),
            Some("{MD5}Gh3JHJBzJcaScd3wyUS8cg==")
        );
        assert_eq!(
            entry.attributes["objectclass"],
            ["posixAccount", "top", "inetOrgPerson"]
        );
        assert_eq!(entry.attributes["uid"].len(), 1);
    }

    #[test]
    fn non_uid_rdn_adds_naming_value() {
        let entry = builder("cn").build(&account()).unwrap();
        assert_eq!(entry.dn.as_str(), "cn=test_user,ou=People,dc=example,dc=com");
        assert_eq!(entry.attributes["cn"], ["Test User", "test_user"]);
    }

    #[test]
    fn single_token_name_is_rejected() {
        let mut account = account();
        account.full_name = "Test".to_string();
        let err = builder("uid").build(&account).unwrap_err();
        assert!(matches!(err, Error::ValidationError(_)));
    }

    #[test]
    fn debug_output_hides_password_hash() {
        let rendered = format!("{:?}", account());
        assert!(!rendered.contains("Gh3JHJ"));
        assert!(rendered.contains("test_user"));
    }
}

//! Command-line flags.

use crate::request::AccountRequest;
use adduser_core::{ConfigFile, Error, PasswordScheme, Result, TlsMode};
use adduser_ldap::DirectoryConfig;
use clap::Parser;
use std::path::PathBuf;

/// Create a POSIX account in an LDAP directory.
#[derive(Parser, Debug)]
#[command(name = "adduser-ldap", version, about)]
pub struct Cli {
    /// Login name of the new account
    pub username: String,

    /// YAML settings file
    #[arg(short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory server host
    #[arg(short = 'l', long = "ldapserver", value_name = "HOST")]
    pub server: Option<String>,

    /// Directory server port (389, or 636 with --ssl)
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Upgrade the connection with StartTLS
    #[arg(short = 't', long, conflicts_with = "ssl")]
    pub starttls: bool,

    /// Connect over LDAPS
    #[arg(long)]
    pub ssl: bool,

    /// Base DN accounts are searched and created under
    #[arg(short = 'b', long, value_name = "DN")]
    pub basedn: Option<String>,

    /// Naming attribute of account entries
    #[arg(short = 'r', long, value_name = "ATTRIBUTE")]
    pub rdn: Option<String>,

    /// DN to bind as (default: <rdn>=<bind user>,<basedn>)
    #[arg(short = 'D', long, value_name = "DN")]
    pub binddn: Option<String>,

    /// Login the bind DN is derived from
    #[arg(long, env = "USER", value_name = "LOGIN")]
    pub bind_user: Option<String>,

    /// Home directory of the new account
    #[arg(short = 'd', long = "home", value_name = "PATH")]
    pub home: Option<String>,

    /// Login shell of the new account
    #[arg(short = 's', long, value_name = "PATH")]
    pub shell: Option<String>,

    /// Numeric user id (default: highest in use + 1)
    #[arg(short = 'u', long)]
    pub uid: Option<u32>,

    /// Numeric primary group id
    #[arg(short = 'g', long)]
    pub gid: Option<u32>,

    /// Full name, "First Last"
    #[arg(short = 'f', long = "fullname", value_name = "NAME")]
    pub full_name: Option<String>,

    /// userPassword scheme: md5, smd5, sha256 or ssha256
    #[arg(long, value_name = "SCHEME")]
    pub password_scheme: Option<PasswordScheme>,

    /// Log directory traffic and computed values
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

impl Cli {
    /// TLS mode selected by flags, if any.
    #[must_use]
    pub const fn tls(&self) -> Option<TlsMode> {
        if self.ssl {
            Some(TlsMode::Ssl)
        } else if self.starttls {
            Some(TlsMode::StartTls)
        } else {
            None
        }
    }

    /// Settings given on the command line, to be merged over the settings file.
    #[must_use]
    pub fn overrides(&self) -> ConfigFile {
        ConfigFile {
            server: self.server.clone(),
            port: self.port,
            tls: self.tls(),
            basedn: self.basedn.clone(),
            binddn: self.binddn.clone(),
            rdn: self.rdn.clone(),
            password_scheme: self.password_scheme,
            ..ConfigFile::default()
        }
    }

    /// Account attributes given on the command line.
    #[must_use]
    pub fn request(&self) -> AccountRequest {
        AccountRequest {
            login: self.username.clone(),
            full_name: self.full_name.clone(),
            uid_number: self.uid,
            gid_number: self.gid,
            home_directory: self.home.clone(),
            login_shell: self.shell.clone(),
        }
    }

    /// DN to bind as.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] when there is neither an explicit bind DN nor a bind user.
    pub fn bind_dn(&self, config: &DirectoryConfig) -> Result<String> {
        if let Some(dn) = config.bind_dn() {
            return Ok(dn.to_string());
        }
        let login = self
            .bind_user
            .as_deref()
            .filter(|login| !login.is_empty())
            .ok_or_else(|| {
                Error::ConfigError("set --binddn or --bind-user to choose a bind DN".to_string())
            })?;
        Ok(config.bind_dn_for(login))
    }
}

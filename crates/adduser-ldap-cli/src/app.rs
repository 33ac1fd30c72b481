//! Wiring from parsed flags to a finished account.

use crate::cli::Cli;
use crate::prompt::Prompter;
use crate::shells::load_shells;
use crate::workflow::{CreatedAccount, Provisioner};
use adduser_core::{ConfigFile, Result};
use adduser_ldap::{DirectoryConfig, DirectoryConnector, EntryBuilder};
use tracing::{debug, warn};

/// Prompt for the operator's own bind password.
pub const BIND_PASSWORD_PROMPT: &str = "Enter Your LDAP Password";

/// Settings file merged with command-line overrides, and the connection derived from them.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Merged settings.
    pub file: ConfigFile,
    /// Resolved connection.
    pub directory: DirectoryConfig,
}

impl Settings {
    /// Loads the settings file named by `--config`, if any, and applies the flags over it.
    ///
    /// # Errors
    ///
    /// Returns [`adduser_core::Error::ConfigError`] if the file is unreadable or invalid, or no
    /// base DN is configured.
    pub fn resolve(cli: &Cli) -> Result<Self> {
        let file = match &cli.config {
            Some(path) => {
                debug!(path = %path.display(), "loading settings");
                ConfigFile::load(path)?
            }
            None => ConfigFile::default(),
        }
        .merge(cli.overrides());
        let directory = DirectoryConfig::from_settings(&file)?;
        Ok(Self { file, directory })
    }
}

/// Binds with the operator's password, provisions the requested account and unbinds.
///
/// # Errors
///
/// Propagates configuration, bind, prompt, directory and workflow errors.
pub fn provision(
    cli: &Cli,
    settings: &Settings,
    connector: &dyn DirectoryConnector,
    prompter: &mut dyn Prompter,
) -> Result<CreatedAccount> {
    let request = cli.request();
    let shells = if request.login_shell.is_some() {
        Vec::new()
    } else {
        load_shells(&settings.file.shells_file())?
    };
    let bind_dn = cli.bind_dn(&settings.directory)?;

    let password = prompter.ask_masked(BIND_PASSWORD_PROMPT)?;
    let mut session = connector.bind(&bind_dn, &password)?;
    debug!(bind_dn = %bind_dn, "bound");

    let result = Provisioner::new(
        session.as_mut(),
        prompter,
        EntryBuilder::from_config(&settings.directory),
    )
    .with_defaults(settings.file.account_defaults())
    .with_shells(shells)
    .with_hasher(Box::new(settings.file.password_scheme()))
    .run(request);

    if let Err(err) = session.unbind() {
        warn!(error = %err, "unbind failed");
    }
    result
}

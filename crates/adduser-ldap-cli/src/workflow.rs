//! Account provisioning workflow.
//!
//! A [`Provisioner`] drives one bound session through
//! `Bound → ExistenceChecked → AttributesResolved → PasswordCollected → Confirmed → Created`.
//! Any error moves it to [`Stage::Aborted`]; the directory is only written in the last step.

use crate::prompt::Prompter;
use crate::request::AccountRequest;
use adduser_core::{AccountDefaults, Error, PasswordHasher, PasswordScheme, Result};
use adduser_ldap::{
    account_exists, next_uid_number, split_full_name, DirectoryEntry, DirectorySession,
    DistinguishedName, EntryBuilder, PosixAccount,
};
use regex::Regex;
use secrecy::ExposeSecret;
use std::fmt;
use tracing::{debug, info, warn};

/// A first and a last name separated by whitespace.
pub const FULL_NAME_PATTERN: &str = r"^\S+\s+\S";
/// Decimal group id.
pub const GID_PATTERN: &str = r"^\d+$";
/// Single-letter confirmation.
pub const CONFIRM_PATTERN: &str = r"(?i)^[yn]$";

/// Message shown when the two password entries differ.
pub const PASSWORD_MISMATCH_MESSAGE: &str = "Passwords don't match, try again!";

/// Progress of a [`Provisioner`]. Stages only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Holding a bound session, nothing checked yet.
    Bound,
    /// No account with the login exists.
    ExistenceChecked,
    /// Every attribute except the password is known.
    AttributesResolved,
    /// Password entered twice and hashed.
    PasswordCollected,
    /// Operator accepted the summary.
    Confirmed,
    /// Entry added to the directory.
    Created,
    /// Stopped by an error. Nothing was written.
    Aborted,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bound => "bound",
            Self::ExistenceChecked => "existence-checked",
            Self::AttributesResolved => "attributes-resolved",
            Self::PasswordCollected => "password-collected",
            Self::Confirmed => "confirmed",
            Self::Created => "created",
            Self::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedAccount {
    /// DN of the new entry.
    pub dn: DistinguishedName,
    /// Entry as it was added.
    pub entry: DirectoryEntry,
}

struct ResolvedAttributes {
    uid_number: u32,
    full_name: String,
    login_shell: String,
    gid_number: u32,
    home_directory: String,
}

/// Provisions one account over a bound session.
pub struct Provisioner<'a> {
    session: &'a mut dyn DirectorySession,
    prompter: &'a mut dyn Prompter,
    builder: EntryBuilder,
    defaults: AccountDefaults,
    shells: Vec<String>,
    hasher: Box<dyn PasswordHasher>,
    stage: Stage,
}

impl<'a> Provisioner<'a> {
    /// Creates a provisioner. Entries are named and placed by `builder`.
    #[must_use]
    pub fn new(
        session: &'a mut dyn DirectorySession,
        prompter: &'a mut dyn Prompter,
        builder: EntryBuilder,
    ) -> Self {
        Self {
            session,
            prompter,
            builder,
            defaults: AccountDefaults::default(),
            shells: Vec::new(),
            hasher: Box::new(PasswordScheme::default()),
            stage: Stage::Bound,
        }
    }

    /// Sets the values used for attributes missing from the request.
    #[must_use]
    pub fn with_defaults(mut self, defaults: AccountDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Sets the shells offered when the request has none.
    #[must_use]
    pub fn with_shells(mut self, shells: Vec<String>) -> Self {
        self.shells = shells;
        self
    }

    /// Replaces the password hasher.
    #[must_use]
    pub fn with_hasher(mut self, hasher: Box<dyn PasswordHasher>) -> Self {
        self.hasher = hasher;
        self
    }

    /// Current stage.
    #[must_use]
    pub const fn stage(&self) -> Stage {
        self.stage
    }

    /// Runs the workflow for `request`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AccountAlreadyExists`] if the login is taken, [`Error::UserCancelled`]
    /// if the operator declines, [`Error::ConfigError`] if a shell must be chosen from an empty
    /// list, and propagates directory and prompt failures. A provisioner runs at most once.
    pub fn run(&mut self, request: AccountRequest) -> Result<CreatedAccount> {
        if self.stage != Stage::Bound {
            return Err(Error::InternalError(format!(
                "provisioner cannot run again from stage {}",
                self.stage
            )));
        }

        let result = self.provision(&request);
        if let Err(err) = &result {
            self.stage = Stage::Aborted;
            if err.should_log() {
                warn!(login = %request.login, code = err.error_code(), "provisioning aborted: {err}");
            } else {
                debug!(login = %request.login, code = err.error_code(), "provisioning aborted");
            }
        }
        result
    }

    fn provision(&mut self, request: &AccountRequest) -> Result<CreatedAccount> {
        let login = request.login.trim();
        if login.is_empty() {
            return Err(Error::ValidationError(
                "login name must not be empty".to_string(),
            ));
        }

        if account_exists(
            &mut *self.session,
            self.builder.base_dn(),
            self.builder.rdn_attribute(),
            login,
        )? {
            return Err(Error::AccountAlreadyExists(login.to_string()));
        }
        self.advance(Stage::ExistenceChecked);

        let attributes = self.resolve_attributes(login, request)?;
        self.advance(Stage::AttributesResolved);

        let password_hash = self.collect_password()?;
        self.advance(Stage::PasswordCollected);

        let account = PosixAccount {
            login: login.to_string(),
            full_name: attributes.full_name,
            uid_number: attributes.uid_number,
            gid_number: attributes.gid_number,
            home_directory: attributes.home_directory,
            login_shell: attributes.login_shell,
            password_hash,
        };
        self.confirm(&account)?;
        self.advance(Stage::Confirmed);

        let entry = self.builder.build(&account)?;
        self.session.add(entry.dn.as_str(), &entry.attributes)?;
        info!(dn = %entry.dn, uid_number = account.uid_number, "created account");
        self.advance(Stage::Created);

        Ok(CreatedAccount {
            dn: entry.dn.clone(),
            entry,
        })
    }

    fn advance(&mut self, next: Stage) {
        debug!(from = %self.stage, to = %next, "workflow stage");
        self.stage = next;
    }

    fn resolve_attributes(
        &mut self,
        login: &str,
        request: &AccountRequest,
    ) -> Result<ResolvedAttributes> {
        let uid_number = match request.uid_number {
            Some(uid_number) => uid_number,
            None => next_uid_number(&mut *self.session, self.builder.base_dn())?,
        };
        let full_name = self.resolve_full_name(request.full_name.as_deref())?;
        let login_shell = self.resolve_shell(request.login_shell.as_deref())?;
        let gid_number = self.resolve_gid(request.gid_number)?;
        let home_directory = self.resolve_home(login, request.home_directory.as_deref())?;

        Ok(ResolvedAttributes {
            uid_number,
            full_name,
            login_shell,
            gid_number,
            home_directory,
        })
    }

    fn resolve_full_name(&mut self, given: Option<&str>) -> Result<String> {
        if let Some(name) = given {
            if split_full_name(name).is_some() {
                return Ok(name.trim().to_string());
            }
            warn!(full_name = name, "full name needs a first and a last name");
            self.prompter
                .show(&format!("`{name}` is not a full name (First Last)"))?;
        }
        let pattern = compile(FULL_NAME_PATTERN)?;
        self.prompter.ask_validated("Full Name (First Last)", &pattern)
    }

    fn resolve_shell(&mut self, given: Option<&str>) -> Result<String> {
        if let Some(shell) = given {
            return Ok(shell.to_string());
        }
        if self.shells.is_empty() {
            return Err(Error::ConfigError(
                "no login shells to choose from".to_string(),
            ));
        }

        let default = self
            .defaults
            .login_shell
            .as_ref()
            .and_then(|shell| self.shells.iter().position(|candidate| candidate == shell));
        let index = self
            .prompter
            .choose_one("Select Login Shell", &self.shells, default)?;
        self.shells
            .get(index)
            .cloned()
            .ok_or_else(|| Error::InternalError(format!("shell choice {index} out of range")))
    }

    fn resolve_gid(&mut self, given: Option<u32>) -> Result<u32> {
        if let Some(gid_number) = given.or(self.defaults.gid_number) {
            return Ok(gid_number);
        }
        let pattern = compile(GID_PATTERN)?;
        loop {
            let answer = self.prompter.ask_validated("Default Group", &pattern)?;
            match answer.parse::<u32>() {
                Ok(gid_number) => return Ok(gid_number),
                Err(_) => self
                    .prompter
                    .show(&format!("{answer} is not a valid group id"))?,
            }
        }
    }

    fn resolve_home(&mut self, login: &str, given: Option<&str>) -> Result<String> {
        if let Some(home) = given {
            return Ok(home.to_string());
        }
        if let Some(home) = self.defaults.home_directory_for(login) {
            return Ok(home.to_string_lossy().into_owned());
        }
        loop {
            let answer = self.prompter.ask_text("Home Directory")?;
            let answer = answer.trim();
            if !answer.is_empty() {
                return Ok(answer.to_string());
            }
        }
    }

    fn collect_password(&mut self) -> Result<String> {
        loop {
            let first = self.prompter.ask_masked("New Password")?;
            let second = self.prompter.ask_masked("Verify Password")?;
            if first.expose_secret() == second.expose_secret() {
                return Ok(self.hasher.hash_password(first.expose_secret()));
            }
            debug!(error = %Error::PasswordMismatch, "asking for the password again");
            self.prompter.show(PASSWORD_MISMATCH_MESSAGE)?;
        }
    }

    fn confirm(&mut self, account: &PosixAccount) -> Result<()> {
        for line in summary(account) {
            self.prompter.show(&line)?;
        }
        let pattern = compile(CONFIRM_PATTERN)?;
        let answer = self.prompter.ask_validated("Create (y/n)", &pattern)?;
        if answer.eq_ignore_ascii_case("y") {
            Ok(())
        } else {
            Err(Error::UserCancelled)
        }
    }
}

/// Summary lines shown before confirmation.
#[must_use]
pub fn summary(account: &PosixAccount) -> Vec<String> {
    vec![
        format!("Username: {}", account.login),
        format!("Full Name: {}", account.full_name),
        format!("UID: {}", account.uid_number),
        format!("GID: {}", account.gid_number),
        format!("Shell: {}", account.login_shell),
        format!("Home Directory: {}", account.home_directory),
    ]
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|err| Error::InternalError(format!("bad pattern: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::ScriptedPrompter;
    use adduser_ldap::{AttributeMap, InMemoryDirectory, LdapEntry, SearchScope};
    use std::path::PathBuf;

    const BASE: &str = "ou=People,dc=example,dc=com";
    const PASS_HASH: &str = "{MD5}Gh3JHJBzJcaScd3wyUS8cg==";

    mockall::mock! {
        Session {}
        impl DirectorySession for Session {
            fn search(
                &mut self,
                base_dn: &str,
                scope: SearchScope,
                filter: &str,
                attributes: &[&'static str],
            ) -> Result<Vec<LdapEntry>>;
            fn add(&mut self, dn: &str, attributes: &AttributeMap) -> Result<()>;
            fn unbind(&mut self) -> Result<()>;
        }
    }

    fn builder() -> EntryBuilder {
        EntryBuilder::new("uid", DistinguishedName::parse(BASE).unwrap())
    }

    fn directory_with_dummy() -> InMemoryDirectory {
        let directory = InMemoryDirectory::new();
        directory.insert(
            LdapEntry::new(format!("uid=dummy,{BASE}"))
                .with_attribute("objectClass", ["posixAccount", "top", "inetOrgPerson"])
                .with_attribute("uid", ["dummy"])
                .with_attribute("uidNumber", ["5000"]),
        );
        directory
    }

    fn complete_request() -> AccountRequest {
        AccountRequest::new("test_user")
            .with_full_name("Test User")
            .with_uid_number(6000)
            .with_gid_number(30000)
            .with_home_directory("/var/rhome/test_user")
            .with_login_shell("/bin/bash")
    }

    fn run_with(
        directory: &InMemoryDirectory,
        prompter: &mut ScriptedPrompter,
        defaults: AccountDefaults,
        shells: &[&str],
        request: AccountRequest,
    ) -> Result<CreatedAccount> {
        let mut session = directory.session();
        Provisioner::new(&mut session, prompter, builder())
            .with_defaults(defaults)
            .with_shells(shells.iter().map(ToString::to_string).collect())
            .run(request)
    }

    #[test]
    fn existing_login_aborts_without_writing() {
        let directory = directory_with_dummy();
        let mut session = directory.session();
        let mut prompter = ScriptedPrompter::new(Vec::<String>::new());

        let mut provisioner = Provisioner::new(&mut session, &mut prompter, builder());
        let err = provisioner.run(AccountRequest::new("dummy")).unwrap_err();

        assert_eq!(err, Error::AccountAlreadyExists("dummy".to_string()));
        assert_eq!(provisioner.stage(), Stage::Aborted);
        drop(provisioner);
        assert!(prompter.asked().is_empty());
        assert_eq!(directory.add_count(), 0);
    }

    #[test]
    fn declined_confirmation_never_adds() {
        let mut session = MockSession::new();
        session
            .expect_search()
            .times(1)
            .returning(|_, _, _, _| Ok(Vec::new()));
        session.expect_add().never();
        let mut prompter = ScriptedPrompter::new(["pass", "pass", "n"]);

        let err = Provisioner::new(&mut session, &mut prompter, builder())
            .run(complete_request())
            .unwrap_err();

        assert_eq!(err, Error::UserCancelled);
        assert_eq!(
            prompter.shown(),
            [
                "Username: test_user",
                "Full Name: Test User",
                "UID: 6000",
                "GID: 30000",
                "Shell: /bin/bash",
                "Home Directory: /var/rhome/test_user",
            ]
        );
    }

    #[test]
    fn mismatched_passwords_are_asked_again() {
        let directory = directory_with_dummy();
        let mut prompter = ScriptedPrompter::new(["pass1", "pass2", "pass", "pass", "y"]);

        let created = run_with(
            &directory,
            &mut prompter,
            AccountDefaults::default(),
            &[],
            complete_request(),
        )
        .unwrap();

        assert_eq!(created.entry.first("userpassword"), Some(PASS_HASH));
        assert_eq!(prompter.shown()[0], PASSWORD_MISMATCH_MESSAGE);
        assert_eq!(
            prompter.asked(),
            [
                "New Password",
                "Verify Password",
                "New Password",
                "Verify Password",
                "Create (y/n)",
            ]
        );
    }

    #[test]
    fn allocates_next_uid_and_splits_full_name() {
        let directory = directory_with_dummy();
        let mut prompter = ScriptedPrompter::new(["pass", "pass", "Y"]);
        let request = AccountRequest::new("test_user")
            .with_full_name("Test User")
            .with_gid_number(30000)
            .with_home_directory("/var/rhome/test_user")
            .with_login_shell("/bin/bash");

        let created = run_with(
            &directory,
            &mut prompter,
            AccountDefaults::default(),
            &[],
            request,
        )
        .unwrap();

        assert_eq!(created.dn.as_str(), format!("uid=test_user,{BASE}"));
        assert_eq!(created.entry.first("uidnumber"), Some("5001"));
        assert_eq!(created.entry.first("givenname"), Some("Test"));
        assert_eq!(created.entry.first("sn"), Some("User"));
        assert_eq!(directory.add_count(), 1);

        let stored = directory
            .entries()
            .into_iter()
            .find(|entry| entry.dn == created.dn.as_str())
            .unwrap();
        assert_eq!(stored.first("uidNumber"), Some("5001"));
    }

    #[test]
    fn single_token_full_name_is_prompted_again() {
        let directory = directory_with_dummy();
        let mut prompter =
            ScriptedPrompter::new(["Cher", "Test User", "pass", "pass", "y"]);
        let request = AccountRequest {
            full_name: Some("Test".to_string()),
            ..complete_request()
        };

        let created = run_with(
            &directory,
            &mut prompter,
            AccountDefaults::default(),
            &[],
            request,
        )
        .unwrap();

        assert_eq!(created.entry.first("cn"), Some("Test User"));
        assert_eq!(
            &prompter.asked()[..2],
            ["Full Name (First Last)", "Full Name (First Last)"]
        );
    }

    #[test]
    fn unresolved_attributes_are_prompted_in_order() {
        let directory = directory_with_dummy();
        let mut prompter = ScriptedPrompter::new([
            "Test User",
            "/bin/zsh",
            "staff",
            "99999999999",
            "100",
            "  ",
            "/home/test_user",
            "pass",
            "pass",
            "y",
        ]);

        let created = run_with(
            &directory,
            &mut prompter,
            AccountDefaults::default(),
            &["/bin/bash", "/bin/zsh"],
            AccountRequest::new("test_user"),
        )
        .unwrap();

        assert_eq!(created.entry.first("loginshell"), Some("/bin/zsh"));
        assert_eq!(created.entry.first("gidnumber"), Some("100"));
        assert_eq!(created.entry.first("homedirectory"), Some("/home/test_user"));
        assert_eq!(
            prompter.asked(),
            [
                "Full Name (First Last)",
                "Select Login Shell",
                "Default Group",
                "Default Group",
                "Default Group",
                "Home Directory",
                "Home Directory",
                "New Password",
                "Verify Password",
                "Create (y/n)",
            ]
        );
        assert_eq!(prompter.shown()[0], "99999999999 is not a valid group id");
    }

    #[test]
    fn defaults_fill_gid_home_and_preselect_shell() {
        let directory = directory_with_dummy();
        let mut prompter = ScriptedPrompter::new(["", "pass", "pass", "y"]);
        let defaults = AccountDefaults {
            homedir_base: Some(PathBuf::from("/var/rhome")),
            gid_number: Some(30000),
            login_shell: Some("/bin/bash".to_string()),
        };
        let request = AccountRequest::new("test_user").with_full_name("Test User");

        let created = run_with(
            &directory,
            &mut prompter,
            defaults,
            &["/bin/sh", "/bin/bash"],
            request,
        )
        .unwrap();

        assert_eq!(created.entry.first("loginshell"), Some("/bin/bash"));
        assert_eq!(created.entry.first("gidnumber"), Some("30000"));
        assert_eq!(
            created.entry.first("homedirectory"),
            Some("/var/rhome/test_user")
        );
    }

    #[test]
    fn empty_shell_list_is_config_error() {
        let directory = directory_with_dummy();
        let mut prompter = ScriptedPrompter::new(Vec::<String>::new());
        let request = AccountRequest::new("test_user").with_full_name("Test User");

        let err = run_with(
            &directory,
            &mut prompter,
            AccountDefaults::default(),
            &[],
            request,
        )
        .unwrap_err();

        assert!(matches!(err, Error::ConfigError(_)));
        assert_eq!(directory.add_count(), 0);
    }

    #[test]
    fn directory_add_failure_is_surfaced() {
        let mut session = MockSession::new();
        session
            .expect_search()
            .returning(|_, _, _, _| Ok(Vec::new()));
        session
            .expect_add()
            .times(1)
            .returning(|_, _| Err(Error::directory("insufficientAccessRights")));
        let mut prompter = ScriptedPrompter::new(["pass", "pass", "y"]);

        let mut provisioner = Provisioner::new(&mut session, &mut prompter, builder());
        let err = provisioner.run(complete_request()).unwrap_err();

        assert_eq!(err, Error::directory("insufficientAccessRights"));
        assert_eq!(provisioner.stage(), Stage::Aborted);
    }

    #[test]
    fn provisioner_runs_once() {
        let directory = directory_with_dummy();
        let mut session = directory.session();
        let mut prompter = ScriptedPrompter::new(["pass", "pass", "y"]);

        let mut provisioner = Provisioner::new(&mut session, &mut prompter, builder());
        provisioner.run(complete_request()).unwrap();
        assert_eq!(provisioner.stage(), Stage::Created);

        let err = provisioner.run(complete_request()).unwrap_err();
        assert!(matches!(err, Error::InternalError(_)));
        drop(provisioner);
        assert_eq!(directory.add_count(), 1);
    }
}

//! Account attributes supplied up front.

/// What the operator asked for. Anything left `None` is resolved by the workflow.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountRequest {
    /// Login name of the new account.
    pub login: String,
    /// Full name, "First Last".
    pub full_name: Option<String>,
    /// Numeric user id.
    pub uid_number: Option<u32>,
    /// Numeric primary group id.
    pub gid_number: Option<u32>,
    /// Home directory path.
    pub home_directory: Option<String>,
    /// Login shell path.
    pub login_shell: Option<String>,
}

impl AccountRequest {
    /// Request for `login` with every other attribute unresolved.
    #[must_use]
    pub fn new(login: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            ..Self::default()
        }
    }

    /// Sets the full name.
    #[must_use]
    pub fn with_full_name(mut self, full_name: impl Into<String>) -> Self {
        self.full_name = Some(full_name.into());
        self
    }

    /// Sets the uid number.
    #[must_use]
    pub const fn with_uid_number(mut self, uid_number: u32) -> Self {
        self.uid_number = Some(uid_number);
        self
    }

    /// Sets the gid number.
    #[must_use]
    pub const fn with_gid_number(mut self, gid_number: u32) -> Self {
        self.gid_number = Some(gid_number);
        self
    }

    /// Sets the home directory.
    #[must_use]
    pub fn with_home_directory(mut self, home_directory: impl Into<String>) -> Self {
        self.home_directory = Some(home_directory.into());
        self
    }

    /// Sets the login shell.
    #[must_use]
    pub fn with_login_shell(mut self, login_shell: impl Into<String>) -> Self {
        self.login_shell = Some(login_shell.into());
        self
    }
}

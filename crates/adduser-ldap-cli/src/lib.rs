//! Interactive provisioning of POSIX accounts in an LDAP directory.
//!
//! The `adduser-ldap` binary parses [`Cli`], resolves [`Settings`], binds through an
//! [`adduser_ldap::DirectoryConnector`] and drives a [`Provisioner`] with a [`Prompter`].

#![deny(missing_docs)]

pub mod app;
pub mod cli;
pub mod prompt;
pub mod request;
pub mod shells;
pub mod workflow;

pub use app::{provision, Settings, BIND_PASSWORD_PROMPT};
pub use cli::Cli;
pub use prompt::{Prompter, ScriptedPrompter, TerminalPrompter};
pub use request::AccountRequest;
pub use shells::{load_shells, parse_shells};
pub use workflow::{summary, CreatedAccount, Provisioner, Stage};

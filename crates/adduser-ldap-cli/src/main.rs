use adduser_ldap::LdapConnector;
use adduser_ldap_cli::{provision, Cli, Settings, TerminalPrompter};
use clap::Parser;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if err.should_log() {
                error!(code = err.error_code(), "{err}");
            }
            eprintln!("error: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: &Cli) -> adduser_core::Result<()> {
    let settings = Settings::resolve(cli)?;
    let connector = LdapConnector::new(settings.directory.clone());
    let mut prompter = TerminalPrompter::new();

    let created = provision(cli, &settings, &connector, &mut prompter)?;
    println!("Created {}", created.dn);
    Ok(())
}

//! Command dispatch and exit-code mapping
//!
//! Verbs: `add`, `remove`, `login`, `test`, `list`. The core never
//! terminates the process; every failure is converted here into a
//! [`CliError`] carrying a distinct exit code.

use crate::args::ArgList;
use crate::error::{ArgsError, StoreError, TokpinError, UnlockError};
use crate::protect::{Scope, ScopedProtector, SecretProtector};
use crate::store::{self, CredentialStore};
use crate::unlock::{CommandUnlocker, TokenSession, TokenUnlocker, DEFAULT_HELPER};
use colored::Colorize;
use std::path::Path;
use thiserror::Error;

/// Exit code for missing or malformed command parameters
pub const EXIT_WRONG_PARAMETERS: i32 = 1;
/// Exit code for an unrecognized command verb
pub const EXIT_UNKNOWN_COMMAND: i32 = 2;
/// Exit code when the token container cannot be opened
pub const EXIT_OPEN_FAILED: i32 = 3;
/// Exit code when the container rejects the submitted secret
pub const EXIT_SUBMIT_FAILED: i32 = 4;
/// Exit code when no record matches the given id or alias
pub const EXIT_RECORD_NOT_FOUND: i32 = 5;
/// Exit code when a stored secret cannot be decrypted
pub const EXIT_DECRYPT_FAILED: i32 = 6;
/// Exit code for any other failure
pub const EXIT_FAILURE: i32 = 7;

/// A dispatcher-level failure with its process exit code
#[derive(Error, Debug)]
pub enum CliError {
    #[error("{0}")]
    WrongParameters(String),

    #[error("Unknown command '{0}'")]
    UnknownCommand(String),

    #[error("Unable to open token '{0}'")]
    OpenFailed(String),

    #[error("Failed to set secret for token '{0}'")]
    SubmitFailed(String),

    #[error("Token '{0}' not found in config")]
    RecordNotFound(String),

    #[error("Failed to decrypt secret for token '{0}'")]
    DecryptFailed(String),

    #[error(transparent)]
    Failure(#[from] TokpinError),
}

impl CliError {
    /// The process exit code for this failure
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::WrongParameters(_) => EXIT_WRONG_PARAMETERS,
            CliError::UnknownCommand(_) => EXIT_UNKNOWN_COMMAND,
            CliError::OpenFailed(_) => EXIT_OPEN_FAILED,
            CliError::SubmitFailed(_) => EXIT_SUBMIT_FAILED,
            CliError::RecordNotFound(_) => EXIT_RECORD_NOT_FOUND,
            CliError::DecryptFailed(_) => EXIT_DECRYPT_FAILED,
            CliError::Failure(_) => EXIT_FAILURE,
        }
    }
}

impl From<ArgsError> for CliError {
    fn from(e: ArgsError) -> Self {
        CliError::Failure(e.into())
    }
}

impl From<StoreError> for CliError {
    fn from(e: StoreError) -> Self {
        CliError::Failure(e.into())
    }
}

/// Run the CLI with the raw process arguments (program name first)
pub fn run(raw_args: Vec<String>) -> Result<(), CliError> {
    let args = ArgList::from_tokens(raw_args, true);

    // we need at least one token: the command verb
    if args.is_empty() {
        print_usage(&args);
        return Ok(());
    }

    let config_path = store::resolve_config_path(&args)?;
    let mut registry = CredentialStore::load(&config_path)?;
    let protector = ScopedProtector::from_environment();

    let command = args.token_at(0).unwrap_or_default().to_lowercase();
    match command.as_str() {
        "add" => cmd_add(&args, &mut registry, &protector, &config_path),
        "remove" => cmd_remove(&args, &mut registry, &config_path),
        "login" => access_tokens(&args, &registry, &protector, &unlocker_from(&args)?, true),
        "test" => access_tokens(&args, &registry, &protector, &unlocker_from(&args)?, false),
        "list" => {
            cmd_list(&registry);
            Ok(())
        }
        _ => Err(CliError::UnknownCommand(command)),
    }
}

/// Build the unlocker from the `-provider` switch
fn unlocker_from(args: &ArgList) -> Result<CommandUnlocker, CliError> {
    Ok(CommandUnlocker::new(
        args.switch_value_or("provider", DEFAULT_HELPER)?,
    ))
}

/// `add`: register a container with its secret and optional alias
fn cmd_add(
    args: &ArgList,
    registry: &mut CredentialStore,
    protector: &dyn SecretProtector,
    config_path: &Path,
) -> Result<(), CliError> {
    let container = require_value(args, "token", "add")?;
    let secret = require_value(args, "password", "add")?;
    let alias = args.switch_value("alias")?;

    let scope = if args.has_switch("machine")? {
        Scope::Machine
    } else {
        Scope::User
    };

    registry.add_entry(container, secret, alias, protector, scope)?;
    registry.save(config_path)?;
    Ok(())
}

/// `remove`: drop a record by container id or alias
fn cmd_remove(
    args: &ArgList,
    registry: &mut CredentialStore,
    config_path: &Path,
) -> Result<(), CliError> {
    let id = require_value(args, "id", "remove")?;

    if registry.remove_entry(id) {
        registry.save(config_path)?;
        Ok(())
    } else {
        Err(CliError::RecordNotFound(id.to_string()))
    }
}

/// `login`/`test`: open containers, submitting the secret only for login
///
/// Without `-id` every registered container is accessed in turn.
fn access_tokens<U: TokenUnlocker>(
    args: &ArgList,
    registry: &CredentialStore,
    protector: &dyn SecretProtector,
    unlocker: &U,
    submit: bool,
) -> Result<(), CliError> {
    match args.switch_value("id")? {
        Some(id) => access_token(registry, protector, unlocker, id, submit),
        None => {
            for container in registry.container_ids() {
                access_token(registry, protector, unlocker, &container, submit)?;
            }
            Ok(())
        }
    }
}

fn access_token<U: TokenUnlocker>(
    registry: &CredentialStore,
    protector: &dyn SecretProtector,
    unlocker: &U,
    id_or_alias: &str,
    submit: bool,
) -> Result<(), CliError> {
    let (container_id, protected) = registry
        .get_entry(id_or_alias)
        .map(|(c, p)| (c.to_string(), p.to_string()))
        .ok_or_else(|| CliError::RecordNotFound(id_or_alias.to_string()))?;

    let mut session = unlocker.open(&container_id).map_err(|e| match e {
        UnlockError::OpenFailed(container) => CliError::OpenFailed(container),
        other => CliError::Failure(other.into()),
    })?;

    if !submit {
        return Ok(());
    }

    let secret = registry
        .decrypt_secret(&protected, protector)
        .map_err(|_| CliError::DecryptFailed(container_id.clone()))?;

    session.set_secret(&secret).map_err(|e| match e {
        UnlockError::SubmitFailed(container) => CliError::SubmitFailed(container),
        other => CliError::Failure(other.into()),
    })?;

    // secret buffer is zeroed on drop here
    Ok(())
}

/// `list`: print every record with its alias
fn cmd_list(registry: &CredentialStore) {
    println!("{} entries found:", registry.len());
    for record in registry.entries() {
        match &record.alias {
            Some(alias) => println!("  {} as '{}'", record.container_id, alias.cyan()),
            None => println!("  {}", record.container_id),
        }
    }
}

/// Fetch a required switch value, rejecting blank input
fn require_value<'a>(
    args: &'a ArgList,
    switch: &str,
    command: &str,
) -> Result<&'a str, CliError> {
    match args.switch_value(switch)? {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(CliError::WrongParameters(format!(
            "The '{}' command requires a non-empty '-{}' value",
            command, switch
        ))),
    }
}

fn print_usage(args: &ArgList) {
    let program = args
        .program_name()
        .map(Path::new)
        .and_then(Path::file_stem)
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "tokpin".to_string());

    println!("{} {}", program, crate::VERSION);
    println!();
    println!("usage:");
    println!("  {program} add [-config <file>] -token <container-id> -password <secret> [-alias <name>] [-machine]");
    println!("  {program} remove [-config <file>] -id <container-id | alias>");
    println!("  {program} login [-config <file>] [-id <container-id | alias>] [-provider <helper>]");
    println!("  {program} test [-config <file>] [-id <container-id | alias>] [-provider <helper>]");
    println!("  {program} list [-config <file>]");
}

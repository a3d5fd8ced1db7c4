// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Tally Operator Console
//!
//! Entry point for the `tally` binary. Parses CLI arguments, initializes
//! logging, resolves the engine configuration, opens the sled store and
//! hands one explicitly built [`Engine`] to whichever subcommand asked.
//!
//! Results go to stdout, logs to stderr:
//!
//! - create / update print the record's public identifier
//! - get prints the sealed payload
//! - delete prints a one-line confirmation
//! - `locate` prints the private id, `open` the decrypted JSON

mod cli;
mod logging;

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tally_contracts::{Contract, ContractDesk, NewContract};
use tally_protocol::config::ENV_GLOBAL_SALT;
use tally_protocol::crypto::{EncryptedPayload, Envelope};
use tally_protocol::records::{Card, NewProfile, NewUser, PartySignatures, PaymentProfile, User};
use tally_protocol::storage::{LedgerDb, RecordKind};
use tally_protocol::transaction::{NewTransaction, Transaction};
use tally_protocol::{Engine, EngineConfig};

use cli::{
    CardCommand, Commands, ContractCommand, InitArgs, ProfileCommand, TallyCli, TxCommand,
    UserCommand,
};

/// Config file name inside the data directory.
const CONFIG_FILE_NAME: &str = "tally.json";

/// Store directory inside the data directory.
const STORE_DIR_NAME: &str = "db";

fn main() -> Result<()> {
    let cli = TallyCli::parse();
    logging::init_logging(&cli.log_level, cli.log_format);

    match cli.command {
        Commands::Init(args) => init_config(cli.config.as_deref(), &cli.data_dir, args),
        Commands::Open { payload } => {
            let config = load_config(cli.config.as_deref(), &cli.data_dir)?;
            open_payload(&config, &payload)
        }
        command => {
            let config = load_config(cli.config.as_deref(), &cli.data_dir)?;
            let engine = open_engine(config, &cli.data_dir)?;
            let result = run(&engine, command);
            engine.store().flush().context("failed to flush the record store")?;
            result
        }
    }
}

// ---------------------------------------------------------------------------
// Setup
// ---------------------------------------------------------------------------

fn config_path(explicit: Option<&Path>, data_dir: &Path) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| data_dir.join(CONFIG_FILE_NAME))
}

/// Writes a freshly generated configuration. Refuses to clobber an existing
/// one unless forced: losing the key means losing every sealed payload.
fn init_config(explicit: Option<&Path>, data_dir: &Path, args: InitArgs) -> Result<()> {
    let path = config_path(explicit, data_dir);
    if path.exists() && !args.force {
        bail!(
            "{} already exists; pass --force to replace it (sealed payloads will no longer open)",
            path.display()
        );
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory: {}", parent.display()))?;
    }

    let config = EngineConfig::generate();
    config
        .save(&path)
        .with_context(|| format!("failed to write config to {}", path.display()))?;
    tracing::info!(path = %path.display(), "configuration written");

    println!("Tally initialized.");
    println!("  Config     : {}", path.display());
    println!("  Data dir   : {}", data_dir.display());
    println!("  Card length: {}", config.card_number_length());
    Ok(())
}

/// `--config` wins, then the environment, then `<data-dir>/tally.json`.
fn load_config(explicit: Option<&Path>, data_dir: &Path) -> Result<EngineConfig> {
    if explicit.is_none() && std::env::var_os(ENV_GLOBAL_SALT).is_some() {
        return EngineConfig::from_env().context("invalid configuration in environment");
    }
    let path = config_path(explicit, data_dir);
    if !path.exists() {
        bail!("no configuration at {}; run `tally init` first", path.display());
    }
    EngineConfig::load(&path).with_context(|| format!("failed to load {}", path.display()))
}

fn open_engine(config: EngineConfig, data_dir: &Path) -> Result<Engine<LedgerDb>> {
    let db_path = data_dir.join(STORE_DIR_NAME);
    std::fs::create_dir_all(&db_path)
        .with_context(|| format!("failed to create database directory: {}", db_path.display()))?;
    let db = LedgerDb::open(&db_path)
        .with_context(|| format!("failed to open database at {}", db_path.display()))?;
    tracing::debug!(path = %db_path.display(), "database opened");
    Ok(Engine::new(Arc::new(config), db))
}

fn open_payload(config: &EngineConfig, payload: &EncryptedPayload) -> Result<()> {
    let envelope = Envelope::new(config.symmetric_key());
    let value: serde_json::Value = envelope
        .open_json(payload)
        .context("payload does not open with this configuration")?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

fn run(engine: &Engine<LedgerDb>, command: Commands) -> Result<()> {
    match command {
        Commands::User(cmd) => run_user(engine, cmd),
        Commands::Card(cmd) => run_card(engine, cmd),
        Commands::Profile(cmd) => run_profile(engine, cmd),
        Commands::Tx(cmd) => run_tx(engine, cmd),
        Commands::Contract(cmd) => run_contract(engine, cmd),
        Commands::Locate { kind, identifier } => {
            let id = match kind {
                RecordKind::User => engine.locate::<User>(&identifier)?,
                RecordKind::Card => engine.locate::<Card>(&identifier)?,
                RecordKind::PaymentProfile => engine.locate::<PaymentProfile>(&identifier)?,
                RecordKind::Transaction => engine.locate::<Transaction>(&identifier)?,
                RecordKind::Contract => engine.locate::<Contract>(&identifier)?,
            };
            println!("{id}");
            Ok(())
        }
        Commands::Init(_) | Commands::Open { .. } => {
            bail!("command does not need the record store")
        }
    }
}

fn run_user(engine: &Engine<LedgerDb>, cmd: UserCommand) -> Result<()> {
    match cmd {
        UserCommand::Create {
            email,
            password,
            first_name,
            last_name,
            mobile_number,
            country,
            language,
        } => {
            let input = NewUser {
                email,
                password,
                first_name,
                last_name,
                mobile_number,
                country,
                language,
            };
            println!("{}", engine.create_user(&input)?);
        }
        UserCommand::Get { identifier } => println!("{}", engine.get_user(&identifier)?),
        UserCommand::Update { id, set } => {
            println!("{}", engine.update_user(id, set.into_changes())?)
        }
        UserCommand::Delete { id } => println!("{}", engine.delete_user(id)?),
    }
    Ok(())
}

fn run_card(engine: &Engine<LedgerDb>, cmd: CardCommand) -> Result<()> {
    match cmd {
        CardCommand::Issue { card_type } => println!("{}", engine.issue_card(card_type)?),
        CardCommand::Get { identifier } => println!("{}", engine.get_card(&identifier)?),
        CardCommand::Update { id, set } => {
            println!("{}", engine.update_card(id, set.into_changes())?)
        }
        CardCommand::Delete { id } => println!("{}", engine.delete_card(id)?),
    }
    Ok(())
}

fn run_profile(engine: &Engine<LedgerDb>, cmd: ProfileCommand) -> Result<()> {
    match cmd {
        ProfileCommand::Create {
            user,
            card_type,
            currency,
            alias,
        } => {
            let input = NewProfile {
                user,
                card_type,
                currency,
                alias,
            };
            println!("{}", engine.create_profile(&input)?);
        }
        ProfileCommand::Get { identifier } => println!("{}", engine.get_profile(&identifier)?),
        ProfileCommand::Update { id, set } => {
            println!("{}", engine.update_profile(id, set.into_changes())?)
        }
        ProfileCommand::Delete { id } => println!("{}", engine.delete_profile(id)?),
    }
    Ok(())
}

fn run_tx(engine: &Engine<LedgerDb>, cmd: TxCommand) -> Result<()> {
    match cmd {
        TxCommand::Create {
            sender,
            receiver,
            amount,
            currency,
            description,
        } => {
            let input = NewTransaction {
                sender,
                receiver,
                amount,
                currency,
                description,
            };
            println!("{}", engine.create_transaction(&input)?);
        }
        TxCommand::Get { identifier } => println!("{}", engine.get_transaction(&identifier)?),
        TxCommand::Update {
            id,
            sender_signature,
            receiver_signature,
            set,
        } => {
            let signatures = PartySignatures {
                initiator: sender_signature,
                counterparty: receiver_signature,
            };
            println!(
                "{}",
                engine.update_transaction(id, &signatures, set.into_changes())?
            );
        }
        TxCommand::Delete { id } => println!("{}", engine.delete_transaction(id)?),
    }
    Ok(())
}

fn run_contract(engine: &Engine<LedgerDb>, cmd: ContractCommand) -> Result<()> {
    let desk = ContractDesk::new(engine);
    match cmd {
        ContractCommand::Create {
            contractor,
            contractee,
            title,
            description,
            body,
        } => {
            let input = NewContract {
                contractor,
                contractee,
                title,
                description,
                body,
            };
            println!("{}", desk.create_contract(&input)?);
        }
        ContractCommand::Get { identifier } => println!("{}", desk.get_contract(&identifier)?),
        ContractCommand::Update {
            id,
            contractor_signature,
            contractee_signature,
            set,
        } => {
            let signatures = PartySignatures {
                initiator: contractor_signature,
                counterparty: contractee_signature,
            };
            println!(
                "{}",
                desk.update_contract(id, &signatures, set.into_changes())?
            );
        }
        ContractCommand::Delete { id } => println!("{}", desk.delete_contract(id)?),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        init_config(None, dir.path(), InitArgs { force: false }).unwrap();

        let loaded = EngineConfig::load(dir.path().join(CONFIG_FILE_NAME)).unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        let again = load_config(Some(path.as_path()), dir.path()).unwrap();
        assert_eq!(loaded.global_salt(), again.global_salt());
    }

    #[test]
    fn init_refuses_to_clobber_without_force() {
        let dir = tempfile::tempdir().unwrap();
        init_config(None, dir.path(), InitArgs { force: false }).unwrap();
        let first = EngineConfig::load(dir.path().join(CONFIG_FILE_NAME)).unwrap();

        assert!(init_config(None, dir.path(), InitArgs { force: false }).is_err());

        init_config(None, dir.path(), InitArgs { force: true }).unwrap();
        let second = EngineConfig::load(dir.path().join(CONFIG_FILE_NAME)).unwrap();
        assert_ne!(first.global_salt(), second.global_salt());
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        assert!(load_config(Some(missing.as_path()), dir.path()).is_err());
    }

    #[test]
    fn engine_opens_inside_the_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let engine = open_engine(EngineConfig::generate(), dir.path()).unwrap();
        assert!(dir.path().join(STORE_DIR_NAME).is_dir());
        assert_eq!(engine.store().count::<User>(), 0);
    }
}

//! # CLI Interface
//!
//! Defines the command-line argument structure for `tally` using `clap`
//! derive. One subcommand group per record kind, plus `init`, `locate` and
//! `open` for the operator chores in between.
//!
//! Updates take repeated `--set field=value` pairs. The value is read as
//! JSON when it parses (`42`, `true`, `null`, `"0042"`) and as plain text
//! otherwise, so `--set status=Approved` works without quoting but a
//! numeric-looking PIN must be quoted: `--set 'pin="2468"'`.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

use tally_protocol::allocation::CardType;
use tally_protocol::crypto::{ContentHash, EncryptedPayload};
use tally_protocol::storage::RecordKind;
use tally_protocol::validation::{Changes, FieldValue};

use crate::logging::LogFormat;

/// Tally operator console.
///
/// Creates, reads, updates and deletes ledger records directly against a
/// local store. Every read comes back sealed; use `tally open` to look
/// inside.
#[derive(Parser, Debug)]
#[command(name = "tally", about = "Tally ledger operator console", version, propagate_version = true)]
pub struct TallyCli {
    /// Engine configuration file (JSON).
    ///
    /// When omitted, `TALLY_GLOBAL_SALT` / `TALLY_SYMMETRIC_KEY` are used if
    /// set, otherwise `<data-dir>/tally.json`.
    #[arg(long, short = 'c', env = "TALLY_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding the record store.
    #[arg(long, short = 'd', env = "TALLY_DATA_DIR", default_value = "tally-data", global = true)]
    pub data_dir: PathBuf,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty, global = true)]
    pub log_format: LogFormat,

    /// Default log directive when `RUST_LOG` is not set.
    #[arg(long, default_value = "tally=info,tally_protocol=info,tally_contracts=info", global = true)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a fresh engine configuration (new salt, new key).
    Init(InitArgs),
    /// Users.
    #[command(subcommand)]
    User(UserCommand),
    /// Standalone cards.
    #[command(subcommand)]
    Card(CardCommand),
    /// Payment profiles (each issues its own card).
    #[command(subcommand)]
    Profile(ProfileCommand),
    /// Transactions.
    #[command(subcommand)]
    Tx(TxCommand),
    /// Contracts.
    #[command(subcommand)]
    Contract(ContractCommand),
    /// Look up a record's private id from its public identifier.
    Locate {
        /// user, card, profile, transaction or contract.
        kind: RecordKind,
        identifier: ContentHash,
    },
    /// Decrypt a sealed payload and pretty-print it.
    Open {
        payload: EncryptedPayload,
    },
}

/// Arguments for the `init` subcommand.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing configuration file.
    #[arg(long)]
    pub force: bool,
}

/// `--set field=value`, repeatable.
#[derive(Args, Debug)]
pub struct SetArgs {
    #[arg(long = "set", value_name = "FIELD=VALUE", value_parser = parse_assignment, required = true)]
    pub assignments: Vec<(String, FieldValue)>,
}

impl SetArgs {
    /// Later assignments to the same field win.
    pub fn into_changes(self) -> Changes {
        self.assignments.into_iter().collect()
    }
}

#[derive(Subcommand, Debug)]
pub enum UserCommand {
    Create {
        #[arg(long)]
        email: String,
        /// Read from `TALLY_PASSWORD` when not given, to keep it out of
        /// shell history.
        #[arg(long, env = "TALLY_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        mobile_number: Option<String>,
        #[arg(long)]
        country: Option<String>,
        #[arg(long)]
        language: Option<String>,
    },
    Get {
        identifier: ContentHash,
    },
    Update {
        id: Uuid,
        #[command(flatten)]
        set: SetArgs,
    },
    Delete {
        id: Uuid,
    },
}

#[derive(Subcommand, Debug)]
pub enum CardCommand {
    Issue {
        /// debit, credit or prepaid.
        #[arg(long = "type", default_value = "debit")]
        card_type: CardType,
    },
    Get {
        identifier: ContentHash,
    },
    Update {
        id: Uuid,
        #[command(flatten)]
        set: SetArgs,
    },
    Delete {
        id: Uuid,
    },
}

#[derive(Subcommand, Debug)]
pub enum ProfileCommand {
    Create {
        /// Owning user's identifier.
        #[arg(long)]
        user: ContentHash,
        #[arg(long, default_value = "debit")]
        card_type: CardType,
        #[arg(long)]
        currency: String,
        #[arg(long)]
        alias: Option<String>,
    },
    Get {
        identifier: ContentHash,
    },
    Update {
        id: Uuid,
        #[command(flatten)]
        set: SetArgs,
    },
    Delete {
        id: Uuid,
    },
}

#[derive(Subcommand, Debug)]
pub enum TxCommand {
    Create {
        /// Sender's profile identifier.
        #[arg(long)]
        sender: ContentHash,
        /// Receiver's profile identifier.
        #[arg(long)]
        receiver: ContentHash,
        /// Minor units.
        #[arg(long)]
        amount: u64,
        #[arg(long)]
        currency: String,
        #[arg(long)]
        description: Option<String>,
    },
    Get {
        identifier: ContentHash,
    },
    Update {
        id: Uuid,
        #[arg(long)]
        sender_signature: ContentHash,
        #[arg(long)]
        receiver_signature: ContentHash,
        #[command(flatten)]
        set: SetArgs,
    },
    Delete {
        id: Uuid,
    },
}

#[derive(Subcommand, Debug)]
pub enum ContractCommand {
    Create {
        /// Contractor's profile identifier.
        #[arg(long)]
        contractor: ContentHash,
        /// Contractee's profile identifier.
        #[arg(long)]
        contractee: ContentHash,
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: Option<String>,
        /// The agreement text.
        #[arg(long)]
        body: String,
    },
    Get {
        identifier: ContentHash,
    },
    Update {
        id: Uuid,
        #[arg(long)]
        contractor_signature: ContentHash,
        #[arg(long)]
        contractee_signature: ContentHash,
        #[command(flatten)]
        set: SetArgs,
    },
    Delete {
        id: Uuid,
    },
}

/// Parse one `field=value` assignment.
pub fn parse_assignment(raw: &str) -> Result<(String, FieldValue), String> {
    let (field, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected FIELD=VALUE, got '{raw}'"))?;
    let field = field.trim();
    if field.is_empty() {
        return Err(format!("missing field name in '{raw}'"));
    }
    Ok((field.to_string(), parse_value(value)))
}

fn parse_value(raw: &str) -> FieldValue {
    use serde_json::Value;

    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Null) => FieldValue::Null,
        Ok(Value::Bool(b)) => FieldValue::Boolean(b),
        Ok(Value::Number(n)) => match (n.as_u64(), n.as_i64()) {
            (Some(u), _) => FieldValue::Unsigned(u),
            (None, Some(i)) => FieldValue::Integer(i),
            // Fractions have no field to land in; let the gateway say so.
            _ => FieldValue::Text(raw.to_string()),
        },
        Ok(Value::String(s)) => FieldValue::Text(s),
        Ok(_) | Err(_) => FieldValue::Text(raw.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        TallyCli::command().debug_assert();
    }

    #[test]
    fn assignment_values_prefer_json() {
        assert_eq!(
            parse_assignment("amount=2500").unwrap(),
            ("amount".to_string(), FieldValue::Unsigned(2500))
        );
        assert_eq!(parse_assignment("alias=null").unwrap().1, FieldValue::Null);
        assert_eq!(parse_assignment("flag=true").unwrap().1, FieldValue::Boolean(true));
        assert_eq!(parse_assignment("delta=-3").unwrap().1, FieldValue::Integer(-3));
        assert_eq!(
            parse_assignment("pin=\"0420\"").unwrap().1,
            FieldValue::Text("0420".into())
        );
    }

    #[test]
    fn assignment_values_fall_back_to_text() {
        assert_eq!(
            parse_assignment("status=Approved").unwrap().1,
            FieldValue::Text("Approved".into())
        );
        // Leading zeros are not JSON.
        assert_eq!(parse_assignment("pin=0420").unwrap().1, FieldValue::Text("0420".into()));
        assert_eq!(
            parse_assignment("description=a=b").unwrap(),
            ("description".to_string(), FieldValue::Text("a=b".into()))
        );
    }

    #[test]
    fn malformed_assignments_are_rejected() {
        assert!(parse_assignment("no-equals-sign").is_err());
        assert!(parse_assignment("=value").is_err());
    }

    #[test]
    fn tx_update_parses() {
        let sig = "a".repeat(64);
        let cli = TallyCli::try_parse_from([
            "tally",
            "tx",
            "update",
            "6f1c2a1e-8d1b-4c3e-9f3a-1b2c3d4e5f60",
            "--sender-signature",
            &sig,
            "--receiver-signature",
            &sig,
            "--set",
            "status=Approved",
            "--set",
            "amount=10",
        ])
        .unwrap();
        match cli.command {
            Commands::Tx(TxCommand::Update { set, .. }) => {
                let changes = set.into_changes();
                assert_eq!(changes.len(), 2);
                assert_eq!(changes["amount"], FieldValue::Unsigned(10));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn bad_identifier_is_a_parse_error() {
        let result = TallyCli::try_parse_from(["tally", "user", "get", "not-a-hash"]);
        assert!(result.is_err());
    }
}

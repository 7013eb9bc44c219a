//! CSV format handling for command files and ledger output
//!
//! This module centralizes all CSV format concerns, providing:
//! - CsvRecord structure for deserialization
//! - Conversion from CSV records to rows and commands
//! - Grouping of tagged transfer rows into batch commands
//! - Account and ledger output serialization
//!
//! All functions are pure (no file I/O) for easy testing.

use crate::types::{Account, AccountId, Command, Credential, LedgerRecord, TransferLeg};
use anyhow::{anyhow, bail, Context, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Write;
use std::str::FromStr;

/// CSV record structure for deserialization
///
/// Matches the input CSV format with columns:
/// `type, account, to, amount, credential, batch`.
/// Every column except `type` is optional; which ones are required depends
/// on the command type.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CsvRecord {
    #[serde(rename = "type")]
    pub kind: String,
    pub account: Option<AccountId>,
    pub to: Option<AccountId>,
    pub amount: Option<String>,
    pub credential: Option<String>,
    pub batch: Option<String>,
}

/// One converted command-file row
#[derive(Debug, Clone)]
pub enum Row {
    /// A row that is a command on its own
    Command(Command),

    /// A transfer row tagged as part of a batch
    BatchLeg {
        tag: String,
        from: AccountId,
        leg: TransferLeg,
        credential: Credential,
    },
}

/// Convert a CsvRecord to a Row
///
/// This function:
/// - Parses the command type (case insensitive)
/// - Checks that the columns the type needs are present
/// - Parses the amount into a Decimal
///
/// Amount sign and precision are left to the executor.
///
/// # Errors
///
/// Returns an error describing the first problem found. The message never
/// contains the credential.
pub fn convert_csv_record(record: CsvRecord) -> Result<Row> {
    let kind = record.kind.to_lowercase();
    let row = match kind.as_str() {
        "open" => Row::Command(Command::Open {
            account: required(record.account, "account", &kind)?,
            credential: credential(record.credential, &kind)?,
        }),
        "deactivate" => Row::Command(Command::Deactivate {
            account: required(record.account, "account", &kind)?,
        }),
        "deposit" => Row::Command(Command::Deposit {
            to: required(record.to, "to", &kind)?,
            amount: parse_amount(record.amount, &kind)?,
            credential: credential(record.credential, &kind)?,
        }),
        "transfer" => {
            let from = required(record.account, "account", &kind)?;
            let to = required(record.to, "to", &kind)?;
            let amount = parse_amount(record.amount, &kind)?;
            let credential = credential(record.credential, &kind)?;
            match record.batch.filter(|tag| !tag.trim().is_empty()) {
                Some(tag) => Row::BatchLeg {
                    tag,
                    from,
                    leg: TransferLeg::new(to, amount),
                    credential,
                },
                None => Row::Command(Command::Transfer {
                    from,
                    to,
                    amount,
                    credential,
                }),
            }
        }
        _ => bail!("invalid command type '{}'", record.kind),
    };
    Ok(row)
}

fn required<T>(value: Option<T>, field: &str, kind: &str) -> Result<T> {
    value.ok_or_else(|| anyhow!("{} command requires '{}'", kind, field))
}

fn credential(value: Option<String>, kind: &str) -> Result<Credential> {
    required(value, "credential", kind).map(Credential::new)
}

fn parse_amount(value: Option<String>, kind: &str) -> Result<Decimal> {
    let raw = value
        .filter(|amount| !amount.trim().is_empty())
        .ok_or_else(|| anyhow!("{} command requires 'amount'", kind))?;
    Decimal::from_str(raw.trim()).with_context(|| format!("invalid amount '{}'", raw))
}

/// Groups consecutive tagged transfer rows into batch commands
///
/// Rows with the same tag form one batch for as long as they follow each
/// other. A batch is emitted as soon as a row with a different tag, an
/// untagged row, or the end of input arrives.
#[derive(Debug, Default)]
pub struct BatchAssembler {
    pending: Option<PendingBatch>,
}

#[derive(Debug)]
struct PendingBatch {
    tag: String,
    from: AccountId,
    legs: Vec<TransferLeg>,
    credential: Credential,
}

impl PendingBatch {
    fn into_command(self) -> Command {
        Command::Batch {
            from: self.from,
            legs: self.legs,
            credential: self.credential,
        }
    }
}

impl BatchAssembler {
    /// Create an assembler with no open batch
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one row, returning the commands that are now complete, in order
    ///
    /// # Errors
    ///
    /// A row continuing a batch with a different source account or credential
    /// is rejected; the open batch is kept.
    pub fn push(&mut self, row: Row) -> Result<Vec<Command>> {
        match row {
            Row::Command(command) => {
                let mut ready: Vec<Command> = self.finish().into_iter().collect();
                ready.push(command);
                Ok(ready)
            }
            Row::BatchLeg {
                tag,
                from,
                leg,
                credential,
            } => {
                if let Some(open) = self.pending.as_mut().filter(|open| open.tag == tag) {
                    if open.from != from || open.credential.expose() != credential.expose() {
                        bail!(
                            "batch '{}' row does not match the batch's account and credential",
                            tag
                        );
                    }
                    open.legs.push(leg);
                    return Ok(Vec::new());
                }

                let ready = self.finish().into_iter().collect();
                self.pending = Some(PendingBatch {
                    tag,
                    from,
                    legs: vec![leg],
                    credential,
                });
                Ok(ready)
            }
        }
    }

    /// Close the open batch, if any
    pub fn finish(&mut self) -> Option<Command> {
        self.pending.take().map(PendingBatch::into_command)
    }
}

/// Write account states to CSV format
///
/// Writes accounts in CSV format with columns: account, balance, status.
/// Accounts are sorted by id for deterministic output.
pub fn write_accounts_csv(accounts: &[Account], output: &mut dyn Write) -> Result<()> {
    use csv::Writer;

    let mut writer = Writer::from_writer(output);

    writer
        .write_record(["account", "balance", "status"])
        .context("failed to write CSV header")?;

    let mut sorted_accounts = accounts.to_vec();
    sorted_accounts.sort_by_key(|account| account.id);

    for account in sorted_accounts {
        writer
            .write_record(&[
                account.id.to_string(),
                format!("{:.4}", account.balance),
                account.status.to_string(),
            ])
            .context("failed to write account record")?;
    }

    writer.flush().context("failed to flush output")?;

    Ok(())
}

/// Write ledger records to CSV format
///
/// Columns: sequence, source, destination, amount, timestamp, batch.
/// Deposits have an empty source; single transfers an empty batch.
pub fn write_ledger_csv<I>(records: I, output: &mut dyn Write) -> Result<()>
where
    I: IntoIterator<Item = LedgerRecord>,
{
    use csv::Writer;

    let mut writer = Writer::from_writer(output);

    writer
        .write_record(["sequence", "source", "destination", "amount", "timestamp", "batch"])
        .context("failed to write CSV header")?;

    for record in records {
        writer
            .write_record(&[
                record.sequence.to_string(),
                record.source.map(|id| id.to_string()).unwrap_or_default(),
                record.destination.to_string(),
                format!("{:.4}", record.amount),
                record.timestamp.to_rfc3339(),
                record.batch.map(|id| id.to_string()).unwrap_or_default(),
            ])
            .context("failed to write ledger record")?;
    }

    writer.flush().context("failed to flush output")?;

    Ok(())
}

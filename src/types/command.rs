//! Commands read from a command file
//!
//! Each variant maps onto one operation of the account store or the transfer
//! executor.

use super::account::AccountId;
use super::credential::Credential;
use super::transaction::TransferLeg;
use rust_decimal::Decimal;

/// An operation requested by one row (or one batch of rows) of a command file
#[derive(Debug, Clone)]
pub enum Command {
    /// Provision a new account protected by `credential`
    Open {
        account: AccountId,
        credential: Credential,
    },

    /// Mark an account inactive
    Deactivate { account: AccountId },

    /// Credit external funds, authorized by the destination's credential
    Deposit {
        to: AccountId,
        amount: Decimal,
        credential: Credential,
    },

    /// Move funds between two accounts
    Transfer {
        from: AccountId,
        to: AccountId,
        amount: Decimal,
        credential: Credential,
    },

    /// Move funds from one account to several destinations atomically
    Batch {
        from: AccountId,
        legs: Vec<TransferLeg>,
        credential: Credential,
    },
}

impl Command {
    /// Account whose commands must stay in file order relative to each other
    ///
    /// The source for transfers and batches, the credited account for
    /// deposits, the affected account for lifecycle commands.
    pub fn primary_account(&self) -> AccountId {
        match self {
            Command::Open { account, .. } | Command::Deactivate { account } => *account,
            Command::Deposit { to, .. } => *to,
            Command::Transfer { from, .. } | Command::Batch { from, .. } => *from,
        }
    }

    /// Whether the command changes the set or status of accounts
    pub fn is_lifecycle(&self) -> bool {
        matches!(self, Command::Open { .. } | Command::Deactivate { .. })
    }

    /// Short lowercase name, as written in command files
    pub fn kind(&self) -> &'static str {
        match self {
            Command::Open { .. } => "open",
            Command::Deactivate { .. } => "deactivate",
            Command::Deposit { .. } => "deposit",
            Command::Transfer { .. } => "transfer",
            Command::Batch { .. } => "batch",
        }
    }
}

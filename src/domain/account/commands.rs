use super::aggregate::Account;
use super::errors::AccountError;
use super::value_objects::AccountId;

// ============================================================================
// Account Commands - Represent user intent
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum AccountCommand {
    OpenAccount {
        account_id: AccountId,
        initial_balance: u64,
    },
    Deposit {
        amount: u64,
    },
    Withdraw {
        amount: u64,
    },
    Suspend,
    Activate,
    Close,
}

impl AccountCommand {
    /// Apply a command against an already-open account.
    pub fn execute(&self, account: &mut Account) -> Result<(), AccountError> {
        match self {
            AccountCommand::OpenAccount { .. } => Err(AccountError::AlreadyOpen(account.id())),
            AccountCommand::Deposit { amount } => account.deposit(*amount),
            AccountCommand::Withdraw { amount } => account.withdraw(*amount),
            AccountCommand::Suspend => account.suspend(),
            AccountCommand::Activate => account.activate(),
            AccountCommand::Close => account.close(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AccountCommand::OpenAccount { .. } => "OpenAccount",
            AccountCommand::Deposit { .. } => "Deposit",
            AccountCommand::Withdraw { .. } => "Withdraw",
            AccountCommand::Suspend => "Suspend",
            AccountCommand::Activate => "Activate",
            AccountCommand::Close => "Close",
        }
    }
}

use crate::core::models::expense::SplitStrategy;
use crate::core::money::Money;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Serialize)]
pub struct FieldError {
    pub field: String,
    pub title: String,
    pub description: String,
}

/// Why a split was rejected. `code()` is the machine-readable reason handed
/// back to the expense intake.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
pub enum SplitRejection {
    #[error("Total amount must be greater than zero")]
    NonPositiveTotal,
    #[error("No participants to split between")]
    NoParticipants,
    #[error("User {user_id} is not an active member of the group")]
    NonMemberParticipant { user_id: String },
    #[error("User {user_id} appears more than once in the split")]
    DuplicateParticipant { user_id: String },
    #[error("Share of user {user_id} cannot be negative")]
    NegativeShare { user_id: String },
    #[error("Share of user {user_id} is {found}, expected about {expected}")]
    EqualMismatch {
        user_id: String,
        expected: Decimal,
        found: Money,
    },
    #[error("Percentages sum to {total}, expected 100")]
    PercentageSumInvalid { total: Decimal },
    #[error("Percentage of user {user_id} must be in (0, 100], got {percentage}")]
    PercentageOutOfRange { user_id: String, percentage: Decimal },
    #[error("Share of user {user_id} is {found}, expected about {expected} from its percentage")]
    PercentageAmountMismatch {
        user_id: String,
        expected: Decimal,
        found: Money,
    },
    #[error("Share count of user {user_id} must be a positive integer")]
    SharesInvalid { user_id: String },
    #[error("Share of user {user_id} is {found}, expected about {expected} from its share count")]
    SharesAmountMismatch {
        user_id: String,
        expected: Decimal,
        found: Money,
    },
    #[error("{strategy} splits sum to {found}, expected {expected}")]
    SumMismatch {
        strategy: SplitStrategy,
        expected: Money,
        found: Money,
    },
}

impl SplitRejection {
    pub fn code(&self) -> &'static str {
        match self {
            SplitRejection::NonPositiveTotal => "non-positive-total",
            SplitRejection::NoParticipants => "no-participants",
            SplitRejection::NonMemberParticipant { .. } => "non-member-participant",
            SplitRejection::DuplicateParticipant { .. } => "duplicate-participant",
            SplitRejection::NegativeShare { .. } => "negative-share",
            SplitRejection::EqualMismatch { .. } => "equal-mismatch",
            SplitRejection::PercentageSumInvalid { .. } | SplitRejection::PercentageOutOfRange { .. } => {
                "percentage-sum-invalid"
            }
            SplitRejection::PercentageAmountMismatch { .. } => "percentage-amount-mismatch",
            SplitRejection::SharesInvalid { .. } | SplitRejection::SharesAmountMismatch { .. } => "shares-invalid",
            SplitRejection::SumMismatch { strategy, .. } => match strategy {
                SplitStrategy::Equal => "equal-mismatch",
                SplitStrategy::Percentage => "percentage-sum-invalid",
                SplitStrategy::Shares => "shares-invalid",
                SplitStrategy::Exact => "exact-sum-mismatch",
            },
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Forbidden,
    Consistency,
    Infrastructure,
}

#[derive(Error, Debug, Serialize)]
pub enum LedgerError {
    #[error("Invalid split: {0}")]
    InvalidSplit(SplitRejection),
    #[error("Invalid input for field `{0}`: {1:?}")]
    InvalidInput(String, FieldError),
    #[error("Payment of {amount} from {from} to {to} exceeds the outstanding debt of {outstanding}")]
    PaymentExceedsDebt {
        from: String,
        to: String,
        amount: Money,
        outstanding: Money,
    },
    #[error("Cannot record a payment to self")]
    SelfPayment,
    #[error("Group {0} must keep at least one admin")]
    LastAdmin(String),
    #[error("Member {0} still has an outstanding balance of {1}")]
    OutstandingBalance(String, Money),
    #[error("User {0} is already a group member")]
    AlreadyGroupMember(String),
    #[error("Changing the amount of expense {0} requires explicit splits")]
    SplitsRequired(String),
    #[error("Currency {found} does not match ledger currency {expected}")]
    CurrencyMismatch { expected: String, found: String },
    #[error("Expense {0} already deleted")]
    ExpenseAlreadyDeleted(String),
    #[error("Payment {0} already confirmed")]
    PaymentAlreadyConfirmed(String),
    #[error("Payment {0} was voided")]
    PaymentVoided(String),

    #[error("Group {0} not found")]
    GroupNotFound(String),
    #[error("User {1} is not a member of group {0}")]
    MemberNotFound(String, String),
    #[error("Expense {0} not found")]
    ExpenseNotFound(String),
    #[error("Payment {0} not found")]
    PaymentNotFound(String),
    #[error("Counterparty {0} not found")]
    CounterpartyNotFound(String),
    #[error("Transaction {0} not found")]
    TransactionNotFound(String),

    #[error("User {0} is not an active group member")]
    NotGroupMember(String),
    #[error("User {0} is not a group admin")]
    NotGroupAdmin(String),
    #[error("User {0} may not edit this expense")]
    NotExpenseEditor(String),
    #[error("User {0} does not own this ledger")]
    NotLedgerOwner(String),
    #[error("User {0} not authorized to confirm or void payment")]
    UnauthorizedPaymentConfirmation(String),

    #[error("Group {group_id} balances sum to {imbalance} instead of zero")]
    ZeroSumViolation { group_id: String, imbalance: Money },
    #[error("Balance of {user_id} in group {group_id} is {stored} but its history implies {expected}")]
    BalanceDrift {
        group_id: String,
        user_id: String,
        stored: Money,
        expected: Money,
    },
    #[error("Transaction {transaction_id} caches {stored} but its history implies {expected}")]
    RunningBalanceDrift {
        transaction_id: String,
        stored: Money,
        expected: Money,
    },

    #[error("Storage error: {0}")]
    StorageError(String),
    #[error("Logging error: {0}")]
    LoggingError(String),
}

impl From<SplitRejection> for LedgerError {
    fn from(rejection: SplitRejection) -> Self {
        LedgerError::InvalidSplit(rejection)
    }
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        use LedgerError::*;
        match self {
            InvalidSplit(_)
            | InvalidInput(..)
            | PaymentExceedsDebt { .. }
            | SelfPayment
            | LastAdmin(_)
            | OutstandingBalance(..)
            | AlreadyGroupMember(_)
            | SplitsRequired(_)
            | CurrencyMismatch { .. }
            | ExpenseAlreadyDeleted(_)
            | PaymentAlreadyConfirmed(_)
            | PaymentVoided(_) => ErrorKind::Validation,
            GroupNotFound(_)
            | MemberNotFound(..)
            | ExpenseNotFound(_)
            | PaymentNotFound(_)
            | CounterpartyNotFound(_)
            | TransactionNotFound(_) => ErrorKind::NotFound,
            NotGroupMember(_)
            | NotGroupAdmin(_)
            | NotExpenseEditor(_)
            | NotLedgerOwner(_)
            | UnauthorizedPaymentConfirmation(_) => ErrorKind::Forbidden,
            ZeroSumViolation { .. } | BalanceDrift { .. } | RunningBalanceDrift { .. } => ErrorKind::Consistency,
            StorageError(_) | LoggingError(_) => ErrorKind::Infrastructure,
        }
    }

    /// Stable kebab-case code for the collaborator layer.
    pub fn reason(&self) -> &'static str {
        use LedgerError::*;
        match self {
            InvalidSplit(rejection) => rejection.code(),
            InvalidInput(..) => "invalid-input",
            PaymentExceedsDebt { .. } => "payment-exceeds-debt",
            SelfPayment => "self-payment",
            LastAdmin(_) => "last-admin",
            OutstandingBalance(..) => "outstanding-balance",
            AlreadyGroupMember(_) => "already-member",
            SplitsRequired(_) => "splits-required",
            CurrencyMismatch { .. } => "currency-mismatch",
            ExpenseAlreadyDeleted(_) => "expense-already-deleted",
            PaymentAlreadyConfirmed(_) => "payment-already-confirmed",
            PaymentVoided(_) => "payment-voided",
            GroupNotFound(_) => "group-not-found",
            MemberNotFound(..) => "member-not-found",
            ExpenseNotFound(_) => "expense-not-found",
            PaymentNotFound(_) => "payment-not-found",
            CounterpartyNotFound(_) => "counterparty-not-found",
            TransactionNotFound(_) => "transaction-not-found",
            NotGroupMember(_) => "not-group-member",
            NotGroupAdmin(_) => "not-group-admin",
            NotExpenseEditor(_) => "not-expense-editor",
            NotLedgerOwner(_) => "not-ledger-owner",
            UnauthorizedPaymentConfirmation(_) => "unauthorized-payment-confirmation",
            ZeroSumViolation { .. } => "zero-sum-violation",
            BalanceDrift { .. } => "balance-drift",
            RunningBalanceDrift { .. } => "running-balance-drift",
            StorageError(_) => "storage-error",
            LoggingError(_) => "logging-error",
        }
    }

    pub fn is_consistency(&self) -> bool {
        self.kind() == ErrorKind::Consistency
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sum_mismatch_reports_strategy_specific_code() {
        let rejection = SplitRejection::SumMismatch {
            strategy: SplitStrategy::Exact,
            expected: Money::from_major(10),
            found: Money::from_major(9),
        };
        assert_eq!(rejection.code(), "exact-sum-mismatch");
        let err: LedgerError = rejection.into();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.reason(), "exact-sum-mismatch");
    }

    #[test]
    fn consistency_errors_are_classified_apart_from_validation() {
        let err = LedgerError::ZeroSumViolation {
            group_id: "g".to_string(),
            imbalance: Money::from_minor(1),
        };
        assert!(err.is_consistency());
        assert_eq!(LedgerError::NotGroupAdmin("u".into()).kind(), ErrorKind::Forbidden);
    }
}

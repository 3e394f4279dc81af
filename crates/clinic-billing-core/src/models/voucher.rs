//! Account voucher models (append-only ledger lines).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::money::Money;

/// Side of a ledger line.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum VoucherType {
    Debit,
    Credit,
}

impl VoucherType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoucherType::Debit => "Debit",
            VoucherType::Credit => "Credit",
        }
    }

    /// The side that cancels this one.
    pub fn opposite(&self) -> Self {
        match self {
            VoucherType::Debit => VoucherType::Credit,
            VoucherType::Credit => VoucherType::Debit,
        }
    }
}

/// Operating account a voucher is posted against. Also the visit's service line.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SourceAccount {
    #[default]
    Hospital,
    Medicine,
    Optics,
}

impl SourceAccount {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceAccount::Hospital => "hospital",
            SourceAccount::Medicine => "medicine",
            SourceAccount::Optics => "optics",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "hospital" => Some(SourceAccount::Hospital),
            "medicine" => Some(SourceAccount::Medicine),
            "optics" => Some(SourceAccount::Optics),
            _ => None,
        }
    }

    /// Prefix used for sequential voucher numbers.
    pub fn voucher_prefix(&self) -> &'static str {
        match self {
            SourceAccount::Hospital => "HSP",
            SourceAccount::Medicine => "MED",
            SourceAccount::Optics => "OPT",
        }
    }
}

/// What kind of money movement a voucher records.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Income,
    Expense,
    FundIn,
    FundOut,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Income => "income",
            TransactionType::Expense => "expense",
            TransactionType::FundIn => "fund_in",
            TransactionType::FundOut => "fund_out",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "income" => Some(TransactionType::Income),
            "expense" => Some(TransactionType::Expense),
            "fund_in" => Some(TransactionType::FundIn),
            "fund_out" => Some(TransactionType::FundOut),
            _ => None,
        }
    }
}

/// A single-sided ledger entry. Never updated or deleted once written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccountVoucher {
    pub id: String,
    /// Sequential per account, e.g. `HSP-000042`
    pub voucher_no: String,
    pub voucher_type: VoucherType,
    pub amount: Money,
    pub narration: String,
    pub source_account: SourceAccount,
    pub source_transaction_type: TransactionType,
    /// Voucher number this one offsets, for reversals
    pub source_voucher_no: Option<String>,
    /// Payment (or visit) that generated the voucher
    pub source_reference_id: Option<String>,
    pub created_at: String,
}

impl AccountVoucher {
    /// Credits count positive, debits negative.
    pub fn signed_amount(&self) -> Decimal {
        match self.voucher_type {
            VoucherType::Credit => self.amount,
            VoucherType::Debit => -self.amount,
        }
    }
}

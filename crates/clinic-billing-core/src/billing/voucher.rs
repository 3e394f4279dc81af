//! Voucher posting.
//!
//! The poster formats a narration and inserts exactly one voucher. It does no
//! balancing of its own: callers post single legs for money entering or leaving
//! the clinic and matched pairs for transfers between tracked accounts.

use rust_decimal::Decimal;

use super::{BillingError, BillingResult};
use crate::db::Database;
use crate::models::{AccountVoucher, SourceAccount, TransactionType, VoucherType};
use crate::money::{self, Money};

/// A voucher to be posted.
#[derive(Debug, Clone)]
pub struct VoucherRequest {
    pub voucher_type: VoucherType,
    pub amount: Money,
    pub narration: String,
    pub source_account: SourceAccount,
    pub source_transaction_type: TransactionType,
    pub source_voucher_no: Option<String>,
    pub source_reference_id: Option<String>,
}

/// Human-readable account name. Unknown accounts are capitalized as-is.
pub fn account_display_name(account: &str) -> String {
    match account {
        "hospital" => "Hospital".to_string(),
        "medicine" => "Medicine".to_string(),
        "optics" => "Optics".to_string(),
        other => capitalize(other),
    }
}

/// Human-readable transaction type. Unknown types get underscores turned into
/// spaces and are capitalized.
pub fn transaction_type_display(transaction_type: &str) -> String {
    match transaction_type {
        "income" => "Income".to_string(),
        "expense" => "Expense".to_string(),
        "fund_in" => "Fund In".to_string(),
        "fund_out" => "Fund Out".to_string(),
        other => capitalize(&other.replace('_', " ")),
    }
}

/// `"{Account} {TransactionType} - {category}: {description}"`
pub fn narration(
    account: SourceAccount,
    transaction_type: TransactionType,
    category: &str,
    description: &str,
) -> String {
    format!(
        "{} {} - {}: {}",
        account_display_name(account.as_str()),
        transaction_type_display(transaction_type.as_str()),
        category,
        description
    )
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Posts vouchers to the append-only ledger.
pub struct VoucherPoster<'a> {
    db: &'a Database,
}

impl<'a> VoucherPoster<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Insert a single voucher. Runs inside the caller's transaction.
    pub fn post(&self, request: VoucherRequest) -> BillingResult<AccountVoucher> {
        if request.amount <= Decimal::ZERO {
            return Err(BillingError::InvalidAmount(format!(
                "Voucher amount must be positive, got {}",
                request.amount
            )));
        }

        let voucher = AccountVoucher {
            id: uuid::Uuid::new_v4().to_string(),
            voucher_no: self.db.next_voucher_no(request.source_account)?,
            voucher_type: request.voucher_type,
            amount: money::round_money(request.amount),
            narration: request.narration,
            source_account: request.source_account,
            source_transaction_type: request.source_transaction_type,
            source_voucher_no: request.source_voucher_no,
            source_reference_id: request.source_reference_id,
            created_at: chrono::Utc::now().to_rfc3339(),
        };
        self.db.insert_voucher(&voucher)?;

        tracing::debug!(
            voucher_no = %voucher.voucher_no,
            voucher_type = voucher.voucher_type.as_str(),
            amount = %voucher.amount,
            reference = ?voucher.source_reference_id,
            "Posted voucher"
        );
        Ok(voucher)
    }

    /// Post the opposite side of an existing voucher, referencing it.
    pub fn counter_post(&self, original: &AccountVoucher, narration: String) -> BillingResult<AccountVoucher> {
        self.post(VoucherRequest {
            voucher_type: original.voucher_type.opposite(),
            amount: original.amount,
            narration,
            source_account: original.source_account,
            source_transaction_type: original.source_transaction_type,
            source_voucher_no: Some(original.voucher_no.clone()),
            source_reference_id: original.source_reference_id.clone(),
        })
    }
}

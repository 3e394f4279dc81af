//! Account voucher database operations (append-only).

use rust_decimal::Decimal;
use rusqlite::{params, Row};

use super::{money_from_sql, money_to_sql, Database, DbError, DbResult};
use crate::models::{AccountVoucher, SourceAccount, TransactionType, VoucherType};
use crate::money;

const VOUCHER_COLUMNS: &str = r#"
    id, voucher_no, voucher_type, amount, narration, source_account,
    source_transaction_type, source_voucher_no, source_reference_id, created_at
"#;

impl Database {
    /// Append a voucher.
    pub fn insert_voucher(&self, voucher: &AccountVoucher) -> DbResult<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO account_vouchers ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                VOUCHER_COLUMNS
            ),
            params![
                voucher.id,
                voucher.voucher_no,
                voucher.voucher_type.as_str(),
                money_to_sql(voucher.amount),
                voucher.narration,
                voucher.source_account.as_str(),
                voucher.source_transaction_type.as_str(),
                voucher.source_voucher_no,
                voucher.source_reference_id,
                voucher.created_at,
            ],
        )?;
        Ok(())
    }

    /// Next sequential voucher number for an account, e.g. `HSP-000007`.
    ///
    /// Must be called inside the write transaction that inserts the voucher.
    pub fn next_voucher_no(&self, account: SourceAccount) -> DbResult<String> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM account_vouchers WHERE source_account = ?",
            [account.as_str()],
            |row| row.get(0),
        )?;
        Ok(format!("{}-{:06}", account.voucher_prefix(), count + 1))
    }

    /// All vouchers posted for a reference (payment or visit), oldest first.
    pub fn list_vouchers_for_reference(&self, reference_id: &str) -> DbResult<Vec<AccountVoucher>> {
        self.query_vouchers(
            &format!(
                "SELECT {} FROM account_vouchers WHERE source_reference_id = ? ORDER BY rowid",
                VOUCHER_COLUMNS
            ),
            [reference_id],
        )
    }

    /// All vouchers for an account, oldest first.
    pub fn list_vouchers_for_account(&self, account: SourceAccount) -> DbResult<Vec<AccountVoucher>> {
        self.query_vouchers(
            &format!(
                "SELECT {} FROM account_vouchers WHERE source_account = ? ORDER BY rowid",
                VOUCHER_COLUMNS
            ),
            [account.as_str()],
        )
    }

    /// Credits minus debits for a reference.
    pub fn net_balance_for_reference(&self, reference_id: &str) -> DbResult<Decimal> {
        let vouchers = self.list_vouchers_for_reference(reference_id)?;
        money::checked_sum(vouchers.iter().map(AccountVoucher::signed_amount))
            .ok_or_else(|| DbError::Constraint(format!("ledger balance for {} overflows", reference_id)))
    }

    fn query_vouchers<P: rusqlite::Params>(&self, sql: &str, params: P) -> DbResult<Vec<AccountVoucher>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, voucher_row)?;

        let mut vouchers = Vec::new();
        for row in rows {
            vouchers.push(row?.try_into()?);
        }
        Ok(vouchers)
    }
}

fn voucher_row(row: &Row<'_>) -> rusqlite::Result<VoucherRow> {
    Ok(VoucherRow {
        id: row.get(0)?,
        voucher_no: row.get(1)?,
        voucher_type: row.get(2)?,
        amount: row.get(3)?,
        narration: row.get(4)?,
        source_account: row.get(5)?,
        source_transaction_type: row.get(6)?,
        source_voucher_no: row.get(7)?,
        source_reference_id: row.get(8)?,
        created_at: row.get(9)?,
    })
}

/// Intermediate row struct for database mapping.
struct VoucherRow {
    id: String,
    voucher_no: String,
    voucher_type: String,
    amount: String,
    narration: String,
    source_account: String,
    source_transaction_type: String,
    source_voucher_no: Option<String>,
    source_reference_id: Option<String>,
    created_at: String,
}

impl TryFrom<VoucherRow> for AccountVoucher {
    type Error = DbError;

    fn try_from(row: VoucherRow) -> Result<Self, Self::Error> {
        let voucher_type = match row.voucher_type.as_str() {
            "Debit" => VoucherType::Debit,
            "Credit" => VoucherType::Credit,
            other => return Err(DbError::Constraint(format!("Unknown voucher type: {}", other))),
        };

        Ok(AccountVoucher {
            id: row.id,
            voucher_no: row.voucher_no,
            voucher_type,
            amount: money_from_sql("amount", &row.amount)?,
            narration: row.narration,
            source_account: SourceAccount::parse(&row.source_account).ok_or_else(|| {
                DbError::Constraint(format!("Unknown source account: {}", row.source_account))
            })?,
            source_transaction_type: TransactionType::parse(&row.source_transaction_type)
                .ok_or_else(|| {
                    DbError::Constraint(format!(
                        "Unknown transaction type: {}",
                        row.source_transaction_type
                    ))
                })?,
            source_voucher_no: row.source_voucher_no,
            source_reference_id: row.source_reference_id,
            created_at: row.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_voucher(db: &Database, voucher_type: VoucherType, amount: i64, reference: &str) -> AccountVoucher {
        AccountVoucher {
            id: uuid::Uuid::new_v4().to_string(),
            voucher_no: db.next_voucher_no(SourceAccount::Hospital).unwrap(),
            voucher_type,
            amount: Decimal::new(amount, 0),
            narration: "Hospital Income - Test: test".into(),
            source_account: SourceAccount::Hospital,
            source_transaction_type: TransactionType::Income,
            source_voucher_no: None,
            source_reference_id: Some(reference.into()),
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    #[test]
    fn test_sequential_voucher_numbers() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.next_voucher_no(SourceAccount::Hospital).unwrap(), "HSP-000001");

        let v = make_voucher(&db, VoucherType::Credit, 100, "ref-1");
        db.insert_voucher(&v).unwrap();

        assert_eq!(db.next_voucher_no(SourceAccount::Hospital).unwrap(), "HSP-000002");
        assert_eq!(db.next_voucher_no(SourceAccount::Optics).unwrap(), "OPT-000001");
    }

    #[test]
    fn test_net_balance_for_reference() {
        let db = Database::open_in_memory().unwrap();
        let credit = make_voucher(&db, VoucherType::Credit, 300, "ref-1");
        db.insert_voucher(&credit).unwrap();
        assert_eq!(db.net_balance_for_reference("ref-1").unwrap(), Decimal::new(300, 0));

        let debit = make_voucher(&db, VoucherType::Debit, 300, "ref-1");
        db.insert_voucher(&debit).unwrap();
        assert_eq!(db.net_balance_for_reference("ref-1").unwrap(), Decimal::ZERO);

        let listed = db.list_vouchers_for_reference("ref-1").unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0], credit);
        assert_eq!(db.list_vouchers_for_account(SourceAccount::Hospital).unwrap().len(), 2);
    }
}

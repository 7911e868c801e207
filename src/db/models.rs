use std::fmt;
use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Category recorded for peer-to-peer transfers. Bill payments use the bill
/// type itself as category.
pub const CATEGORY_TRANSFER: &str = "Transfer";

/// A registered account row. The balance is only ever mutated by the
/// transaction engine; everything else is display identity.
#[derive(Debug, Clone, Serialize)]
pub struct Account {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub full_name: String,
    pub phone: String,
    pub account_no: String,
    pub balance: Decimal,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    Sent,
    Received,
    BillPayment,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Sent => "SENT",
            TransactionKind::Received => "RECEIVED",
            TransactionKind::BillPayment => "BILL_PAYMENT",
        }
    }

    /// Money leaving the account (debits count towards "spent" totals).
    pub fn is_outgoing(&self) -> bool {
        matches!(self, TransactionKind::Sent | TransactionKind::BillPayment)
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SENT" => Ok(TransactionKind::Sent),
            "RECEIVED" => Ok(TransactionKind::Received),
            "BILL_PAYMENT" => Ok(TransactionKind::BillPayment),
            other => Err(format!("unknown transaction kind: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Success,
    /// Reserved; the engine never persists failed rows today.
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Success => "SUCCESS",
            TransactionStatus::Failed => "FAILED",
        }
    }
}

impl FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SUCCESS" => Ok(TransactionStatus::Success),
            "FAILED" => Ok(TransactionStatus::Failed),
            other => Err(format!("unknown transaction status: {other}")),
        }
    }
}

/// An immutable ledger entry. Rows are appended by the engine when a transfer
/// or bill payment completes and are never updated or deleted afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionRecord {
    pub id: i64,
    pub user_id: i64,
    pub kind: TransactionKind,
    pub category: Option<String>,
    pub amount: Decimal,
    pub description: Option<String>,
    pub counterparty_name: Option<String>,
    pub counterparty_phone: Option<String>,
    /// "YYYY-MM-DD HH:MM:SS", local time.
    pub date_time: String,
    pub latitude: f64,
    pub longitude: f64,
    pub status: TransactionStatus,
}

impl TransactionRecord {
    /// Signed, display-ready amount string. Presentation concern only; the
    /// engine and the aggregates never look at this.
    pub fn display_amount(&self) -> String {
        if self.kind.is_outgoing() {
            format!("- ₹ {:.2}", self.amount)
        } else {
            format!("+ ₹ {:.2}", self.amount)
        }
    }
}

/// Fields the engine supplies when appending a ledger entry; id, timestamp
/// and status are filled in by the store.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub user_id: i64,
    pub kind: TransactionKind,
    pub category: String,
    pub amount: Decimal,
    pub description: String,
    pub counterparty_name: Option<String>,
    pub counterparty_phone: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillStatus {
    Paid,
    /// Reserved; the engine only ever writes PAID.
    Pending,
}

impl BillStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillStatus::Paid => "PAID",
            BillStatus::Pending => "PENDING",
        }
    }
}

impl FromStr for BillStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PAID" => Ok(BillStatus::Paid),
            "PENDING" => Ok(BillStatus::Pending),
            other => Err(format!("unknown bill status: {other}")),
        }
    }
}

/// One row per successful bill payment, written alongside the matching
/// BILL_PAYMENT transaction.
#[derive(Debug, Clone, Serialize)]
pub struct Bill {
    pub id: i64,
    pub user_id: i64,
    pub bill_type: String,
    pub amount: Decimal,
    pub paid_at: String,
    pub status: BillStatus,
}

/// Savings goal owned by an account. The current amount is maintained by the
/// goals collaborator, never by the transaction engine.
#[derive(Debug, Clone, Serialize)]
pub struct SavingsGoal {
    pub id: i64,
    pub user_id: i64,
    pub goal_name: String,
    pub target_amount: Decimal,
    pub current_amount: Decimal,
    pub created_at: String,
}

impl SavingsGoal {
    /// Progress towards the target, 0..=100.
    pub fn progress_percent(&self) -> u8 {
        if self.target_amount <= Decimal::ZERO {
            return 0;
        }
        let pct = (self.current_amount * Decimal::from(100)) / self.target_amount;
        pct.min(Decimal::from(100))
            .max(Decimal::ZERO)
            .floor()
            .to_u8()
            .unwrap_or(100)
    }
}
